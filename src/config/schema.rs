//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration for the dispatcher service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Application settings consumed by the router and dispatcher.
    pub application: ApplicationConfig,

    /// Response cache settings.
    pub cache: CacheConfig,

    /// Ordered route table. Declaration order is match order.
    pub routes: Vec<RouteConfig>,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum accepted request body in bytes (posted form data).
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_bytes: 1024 * 1024,
        }
    }
}

/// Application-level routing and dispatch settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// URL prefix the application is mounted under (e.g. "/app").
    pub base_path: String,

    /// Absolute URL prefix used when writing `Location` headers.
    pub base_url: String,

    /// When false, request paths are lower-cased before routing.
    pub url_case_sensitive: bool,

    /// Debug mode surfaces typed failures instead of the static fallback page.
    pub debug: bool,

    /// Controller used when the path has no first segment.
    pub default_controller: Option<String>,

    /// Action used when the path has no second segment.
    pub default_action: String,

    /// Controller whose `notFound` action handles dispatch failures.
    pub error_controller: Option<String>,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            base_path: String::new(),
            base_url: String::new(),
            url_case_sensitive: false,
            debug: true,
            default_controller: None,
            default_action: "index".to_string(),
            error_controller: None,
        }
    }
}

/// Filesystem response cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding cached artifacts. Owned exclusively by the cache.
    pub dir: PathBuf,

    /// Cache ordinary pages.
    pub use_cache: bool,

    /// Cache long-lived assets (images, thumbnails).
    pub use_asset_cache: bool,

    /// Bucket width for pages, in seconds.
    pub page_bucket_secs: u64,

    /// Bucket width for assets, in seconds.
    pub asset_bucket_secs: u64,

    /// Path substrings that classify a request as a long-lived asset.
    pub asset_markers: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("cache"),
            use_cache: false,
            use_asset_cache: true,
            page_bucket_secs: 60 * 60,
            asset_bucket_secs: 60 * 60 * 24 * 30,
            asset_markers: vec!["thumbnail".to_string()],
        }
    }
}

impl CacheConfig {
    /// True if any cache class is enabled.
    pub fn enabled(&self) -> bool {
        self.use_cache || self.use_asset_cache
    }
}

/// One route table entry: a shorthand pattern and its rewrite target.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RouteConfig {
    /// Pattern with `:num`, `:alpha`, `:alphanum` tokens. `"/"` is the root key.
    pub pattern: String,

    /// Target template with `$1`, `$2`, ... references.
    pub target: String,
}

impl RouteConfig {
    pub fn new(pattern: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            target: target.into(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for dispatch and capture) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines instead of the pretty format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
