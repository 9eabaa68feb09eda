//! Built-in controllers served by the binary.
//!
//! Embedders build their own [`HandlerRegistry`]; this one exists so a bare
//! `route-cache serve` has pages to answer with.

pub mod errors;
pub mod pages;

use crate::dispatch::{Arity, HandlerRegistry};

pub use errors::Errors;
pub use pages::Pages;

/// Registry with the `Pages` and `Errors` controllers.
pub fn registry() -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry
        .register(
            "Pages",
            &[
                ("index", Arity::none()),
                ("show", Arity::new(1, 2)),
                ("about", Arity::none()),
                ("contact", Arity::none()),
            ],
            |_| Pages,
        )
        .register("Errors", &[("notFound", Arity::none())], |_| Errors);
    registry
}
