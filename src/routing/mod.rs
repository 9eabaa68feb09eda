//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Raw request path
//!     → router.rs (normalize: base path, slashes, case)
//!     → table.rs (ordered scan, root route for the empty path)
//!     → matcher.rs (shorthand expansion, placeholder rewrite)
//!     → Return: ResolvedRoute (canonical path + segments)
//!
//! Route Compilation (at startup and on reload):
//!     RouteConfig[]
//!     → Expand shorthand tokens to anchored regexes
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled once, immutable at runtime
//! - Deterministic: same input always resolves to the same route
//! - First match wins (declaration order)

pub mod matcher;
pub mod router;
pub mod table;

pub use router::{capitalize, ResolvedRoute, Router};
pub use table::{RouteError, RouteTable};
