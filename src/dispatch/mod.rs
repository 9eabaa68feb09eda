//! Dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! DispatchRequest
//!     → dispatcher.rs (cache lookup, route resolution, fallback chain)
//!     → registry.rs (controller + declared arity)
//!     → Controller::call writes into sink.rs
//!     → HandlerOutput committed to the cache capture
//!     → DispatchOutcome
//! ```

pub mod dispatcher;
pub mod error;
pub mod registry;
pub mod request;
pub mod sink;

pub use dispatcher::{fallback_page, DispatchOutcome, Dispatcher};
pub use error::{DispatchError, DispatchFailure, ErrorCode, HandlerError};
pub use registry::{ActionContext, ActionFuture, Arity, Controller, HandlerRegistry};
pub use request::DispatchRequest;
pub use sink::{HandlerOutput, ResponseSink};
