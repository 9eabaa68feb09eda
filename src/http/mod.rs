//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum setup, middleware)
//!     → request.rs (request ID, body limit, form decoding)
//!     → Dispatcher (cache, routing, handlers)
//!     → response.rs (outcome → status, headers, body)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::HttpServer;
