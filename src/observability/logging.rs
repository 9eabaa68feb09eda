//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once at startup
//! - Honor `RUST_LOG` over the configured level
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - Pretty format for development, JSON when asked for

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the filter: `RUST_LOG` if set, otherwise `level` for this crate
/// and `tower_http`.
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("route_cache={level},tower_http={level}"))
    })
}

/// Install the global subscriber. Later calls are ignored.
pub fn init_logging(level: &str, json: bool) {
    let registry = tracing_subscriber::registry().with(env_filter(level));
    let result = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer()).try_init()
    };
    if result.is_err() {
        tracing::debug!("Logging already initialized");
    }
}
