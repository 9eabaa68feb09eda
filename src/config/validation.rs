//! Configuration validation.
//!
//! Serde handles syntax; this checks semantics. All errors are collected so
//! an operator sees every problem in one pass.

use crate::config::schema::AppConfig;
use crate::routing::matcher::expand_pattern;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("route {index} pattern {pattern:?} does not compile: {reason}")]
    InvalidRoutePattern {
        index: usize,
        pattern: String,
        reason: String,
    },

    #[error("route {index} has an empty target")]
    EmptyRouteTarget { index: usize },

    #[error("cache.{field} must be greater than zero")]
    ZeroBucket { field: &'static str },

    #[error("application.default_action must not be empty")]
    EmptyDefaultAction,

    #[error("application.{field} must not be empty when set")]
    EmptyControllerName { field: &'static str },

    #[error("listener.max_body_bytes must be greater than zero")]
    ZeroBodyLimit,
}

/// Validate a parsed configuration.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for (index, route) in config.routes.iter().enumerate() {
        if let Err(e) = regex::Regex::new(&expand_pattern(&route.pattern)) {
            errors.push(ValidationError::InvalidRoutePattern {
                index,
                pattern: route.pattern.clone(),
                reason: e.to_string(),
            });
        }
        // The root route may legitimately rewrite to the empty path.
        if route.target.trim().is_empty() && !is_root(&route.pattern) {
            errors.push(ValidationError::EmptyRouteTarget { index });
        }
    }

    if config.cache.page_bucket_secs == 0 {
        errors.push(ValidationError::ZeroBucket { field: "page_bucket_secs" });
    }
    if config.cache.asset_bucket_secs == 0 {
        errors.push(ValidationError::ZeroBucket { field: "asset_bucket_secs" });
    }

    let app = &config.application;
    if app.default_action.trim().is_empty() {
        errors.push(ValidationError::EmptyDefaultAction);
    }
    if matches!(app.default_controller.as_deref(), Some(name) if name.trim().is_empty()) {
        errors.push(ValidationError::EmptyControllerName { field: "default_controller" });
    }
    if matches!(app.error_controller.as_deref(), Some(name) if name.trim().is_empty()) {
        errors.push(ValidationError::EmptyControllerName { field: "error_controller" });
    }

    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_root(pattern: &str) -> bool {
    pattern.trim_matches('/').is_empty()
}
