//! Route table, controller dispatcher and bucketed response cache.

pub mod app;
pub mod cache;
pub mod config;
pub mod dispatch;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;

pub use cache::CacheStore;
pub use config::schema::AppConfig;
pub use dispatch::{DispatchOutcome, Dispatcher, HandlerRegistry};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use routing::Router;
