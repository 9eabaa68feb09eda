//! Bucketed response cache.
//!
//! # Data Flow
//! ```text
//! request uri
//!     → key.rs (class, bucket, identifier)
//!     → store.rs (validator check, file lookup)
//!     → inflight.rs (one builder per key)
//!     → CacheCapture::commit (temp file, rename)
//! ```
//!
//! # Design Decisions
//! - The identifier is both the file name and the ETag
//! - Expiry is implicit: a new bucket means a new identifier
//! - Old bucket files are never read again; pruning them is left to the operator

pub mod inflight;
pub mod key;
pub mod store;

pub use key::{CacheClass, CacheKey};
pub use store::{CacheCapture, CacheError, CacheLookup, CacheStore, CachedArtifact};
