//! Compiled, ordered route table.

use regex::Regex;

use crate::config::RouteConfig;
use crate::routing::matcher::{expand_pattern, rewrite_target};

/// Error raised when a configured route cannot be compiled.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("invalid route pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// A single route with its pattern compiled.
#[derive(Debug, Clone)]
pub struct CompiledRoute {
    pattern: String,
    regex: Regex,
    target: String,
}

impl CompiledRoute {
    fn compile(config: &RouteConfig) -> Result<Self, RouteError> {
        let regex = Regex::new(&expand_pattern(&config.pattern)).map_err(|source| {
            RouteError::InvalidPattern {
                pattern: config.pattern.clone(),
                source,
            }
        })?;
        Ok(Self {
            pattern: config.pattern.clone(),
            regex,
            target: config.target.clone(),
        })
    }

    /// The pattern as written in configuration.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Rewrite `path` through this route, or `None` if it does not match.
    pub fn apply(&self, path: &str) -> Option<String> {
        self.regex
            .captures(path)
            .map(|caps| rewrite_target(&self.target, &caps))
    }
}

/// Ordered list of routes. Immutable after construction.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    root: Option<CompiledRoute>,
    routes: Vec<CompiledRoute>,
}

impl RouteTable {
    /// Compile routes in declaration order.
    ///
    /// The first `"/"` (or empty) pattern becomes the root route; it is kept
    /// out of the ordered scan and consulted only for the empty path.
    pub fn compile(configs: &[RouteConfig]) -> Result<Self, RouteError> {
        let mut table = Self::default();
        for config in configs {
            let route = CompiledRoute::compile(config)?;
            if config.pattern.trim_matches('/').is_empty() {
                if table.root.is_none() {
                    table.root = Some(route);
                } else {
                    tracing::warn!(route_target = %config.target, "Duplicate root route ignored");
                }
            } else {
                table.routes.push(route);
            }
        }
        Ok(table)
    }

    /// Target of the root route, if configured.
    pub fn root(&self) -> Option<&CompiledRoute> {
        self.root.as_ref()
    }

    /// Non-root routes in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &CompiledRoute> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len() + usize::from(self.root.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
