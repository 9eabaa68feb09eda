//! Shorthand pattern expansion and target rewriting.
//!
//! # Responsibilities
//! - Expand `:num`, `:alphanum`, `:alpha` into capture groups
//! - Anchor patterns so a route matches the whole path
//! - Substitute captures into `$n` target placeholders
//!
//! # Design Decisions
//! - `:alphanum` is expanded before `:alpha` (prefix overlap)
//! - Patterns are otherwise passed to the regex engine verbatim
//! - Placeholders without a capture are removed with one trailing slash

use std::sync::LazyLock;

use regex::{Captures, Regex};

const NUM: &str = r"(\d+)";
const ALPHANUM: &str = r"([a-zA-Z0-9+_-]+)";
const ALPHA: &str = r"([a-zA-Z+_-]+)";

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$(\d+)(/?)").expect("placeholder regex is valid"));

/// Expand a shorthand route pattern into an anchored regex source.
pub fn expand_pattern(pattern: &str) -> String {
    let body = pattern
        .trim_matches('/')
        .replace(":num", NUM)
        .replace(":alphanum", ALPHANUM)
        .replace(":alpha", ALPHA);
    format!("^{}$", body)
}

/// Substitute captures into a target template.
///
/// `$n` is replaced by capture group `n`. A placeholder with no matching
/// group is dropped together with the slash that follows it.
pub fn rewrite_target(target: &str, captures: &Captures<'_>) -> String {
    let rewritten = PLACEHOLDER.replace_all(target, |ph: &Captures<'_>| {
        let value = ph[1]
            .parse::<usize>()
            .ok()
            .filter(|&n| n > 0)
            .and_then(|n| captures.get(n))
            .map(|m| m.as_str());

        match value {
            Some(v) => format!("{}{}", v, &ph[2]),
            None => String::new(),
        }
    });
    rewritten.trim_matches('/').to_string()
}
