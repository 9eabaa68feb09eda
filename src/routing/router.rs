//! Path resolution against the route table.
//!
//! # Responsibilities
//! - Normalize raw request paths (base path, slashes, case)
//! - Find the first matching route and rewrite the path
//! - Split the canonical path into controller/action/parameters
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Resolution never fails: an unmatched path is its own canonical path
//! - Empty path consults the root route before any ordered scan
//! - First match wins; declaration order is the only tie-break

use crate::config::{AppConfig, ApplicationConfig};
use crate::routing::table::{RouteError, RouteTable};

/// Result of resolving a request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoute {
    path: String,
    segments: Vec<String>,
    matched: Option<String>,
}

impl ResolvedRoute {
    fn new(path: String, matched: Option<String>) -> Self {
        let segments = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        Self {
            path,
            segments,
            matched,
        }
    }

    /// Canonical path after rewriting.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Pattern of the route that matched, if any.
    pub fn matched_pattern(&self) -> Option<&str> {
        self.matched.as_deref()
    }

    /// First segment with its first letter upper-cased.
    pub fn controller(&self) -> Option<String> {
        self.segments.first().map(|s| capitalize(s))
    }

    /// Second segment, lower-cased.
    pub fn action(&self) -> Option<String> {
        self.segments.get(1).map(|s| s.to_lowercase())
    }

    /// Positional parameters (segments after the action).
    pub fn params(&self) -> &[String] {
        self.segments.get(2..).unwrap_or(&[])
    }
}

/// Upper-case the first character, leaving the rest untouched.
pub fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Resolves raw paths to canonical routes.
#[derive(Debug, Clone)]
pub struct Router {
    table: RouteTable,
    base_segments: Vec<String>,
    case_sensitive: bool,
}

impl Router {
    pub fn new(table: RouteTable, app: &ApplicationConfig) -> Self {
        let case_sensitive = app.url_case_sensitive;
        let base_segments = split_segments(&app.base_path)
            .map(|s| if case_sensitive { s.to_string() } else { s.to_lowercase() })
            .collect();
        Self {
            table,
            base_segments,
            case_sensitive,
        }
    }

    /// Compile the route table and build a router from a full config.
    pub fn from_config(config: &AppConfig) -> Result<Self, RouteError> {
        let table = RouteTable::compile(&config.routes)?;
        Ok(Self::new(table, &config.application))
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    /// Strip the base path, collapse slashes and apply the case policy.
    pub fn normalize(&self, raw: &str) -> String {
        let path = raw.split(['?', '#']).next().unwrap_or_default();
        let path = if self.case_sensitive {
            path.to_string()
        } else {
            path.to_lowercase()
        };

        let segments: Vec<&str> = split_segments(&path).collect();
        let rest = if segments.starts_with(&self.base_segments_ref()) {
            &segments[self.base_segments.len()..]
        } else {
            &segments[..]
        };
        rest.join("/")
    }

    fn base_segments_ref(&self) -> Vec<&str> {
        self.base_segments.iter().map(String::as_str).collect()
    }

    /// Resolve a raw request path. Never fails.
    pub fn resolve(&self, raw: &str) -> ResolvedRoute {
        let path = self.normalize(raw);

        if path.is_empty() {
            return match self.table.root() {
                Some(root) => {
                    let canonical = root.apply("").unwrap_or_else(|| root.target().to_string());
                    tracing::debug!(canonical = %canonical, "Resolved root route");
                    ResolvedRoute::new(canonical, Some(root.pattern().to_string()))
                }
                None => ResolvedRoute::new(path, None),
            };
        }

        for route in self.table.iter() {
            if let Some(canonical) = route.apply(&path) {
                tracing::debug!(
                    path = %path,
                    pattern = %route.pattern(),
                    canonical = %canonical,
                    "Route matched"
                );
                return ResolvedRoute::new(canonical, Some(route.pattern().to_string()));
            }
        }

        tracing::trace!(path = %path, "No route matched, using raw path");
        ResolvedRoute::new(path, None)
    }
}

fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}
