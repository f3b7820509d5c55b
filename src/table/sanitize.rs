//! Column identifier sanitization.

use regex::Regex;
use std::sync::OnceLock;

/// Identifier used when sanitization leaves nothing behind.
const FALLBACK_IDENTIFIER: &str = "col";

fn unsafe_run() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^a-zA-Z0-9_]+").expect("valid identifier pattern"))
}

/// Turns raw header text into a column identifier.
///
/// Every run of characters outside `[a-zA-Z0-9_]` becomes a single `_` and
/// the result is lowercased. Uniqueness is not enforced here.
pub fn sanitize_identifier(raw: &str) -> String {
    let replaced = unsafe_run().replace_all(raw, "_").to_ascii_lowercase();
    if replaced.is_empty() {
        FALLBACK_IDENTIFIER.to_string()
    } else {
        replaced
    }
}

/// Synthesizes `c1..cN` for a headerless source of the given width.
pub fn positional_identifiers(width: usize) -> Vec<String> {
    (1..=width).map(|i| format!("c{i}")).collect()
}
