//! Read-only query guard for external stores.
//!
//! The gate is lexical: a normalized copy of the query must start with
//! `select` and must not contain any denylisted keyword anywhere, even
//! inside string literals or identifiers. It can reject harmless queries
//! (`SELECT created_at ...` contains `create`) and it is not a defence
//! against a hostile caller; `SELECT ... INTO` or side-effecting functions
//! pass it. The optional strict mode adds a parsed statement check on top.

mod parser;

pub use parser::{check_single_statement, check_statement};

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;
use tracing::{debug, warn};

use crate::db::DatabaseBackend;
use crate::error::{GatewayError, Result};

/// Default row cap for guarded queries.
pub const DEFAULT_QUERY_LIMIT: usize = 500;

/// Upper bound on any requested row cap.
pub const MAX_QUERY_LIMIT: usize = 5000;

/// Keywords that reject a query when they appear anywhere in it.
pub const DENYLIST: [&str; 10] = [
    "insert", "update", "delete", "drop", "alter", "create", "truncate", "replace", "exec",
    "execute",
];

fn whitespace_run() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\s+").expect("valid whitespace pattern"))
}

fn limit_clause() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)\bLIMIT\s+\d+").expect("valid limit pattern"))
}

/// A query that passed the guard, ready to execute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuardedQuery {
    /// Text to execute, in the caller's original case.
    pub sql: String,
    /// Row cap in effect for this call.
    pub limit: usize,
    /// Whether ` LIMIT <cap>` was appended.
    pub limit_injected: bool,
}

/// Validates read-only queries and bounds their result size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOnlyGuard {
    default_limit: usize,
    max_limit: usize,
    strict: bool,
}

impl Default for ReadOnlyGuard {
    fn default() -> Self {
        Self::new(DEFAULT_QUERY_LIMIT, MAX_QUERY_LIMIT)
    }
}

impl ReadOnlyGuard {
    /// Creates a lexical-only guard with the given limits.
    pub fn new(default_limit: usize, max_limit: usize) -> Self {
        Self {
            default_limit: default_limit.min(max_limit),
            max_limit,
            strict: false,
        }
    }

    /// Enables or disables the parsed statement check.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Returns true if the parsed statement check is enabled.
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Resolves the caller's requested cap against the configured bounds.
    pub fn resolve_limit(&self, requested: Option<usize>) -> Result<usize> {
        match requested {
            None => Ok(self.default_limit),
            Some(0) => Err(GatewayError::malformed("limit must be at least 1")),
            Some(limit) if limit > self.max_limit => {
                warn!(
                    "Requested limit {} exceeds maximum, using {}",
                    limit, self.max_limit
                );
                Ok(self.max_limit)
            }
            Some(limit) => Ok(limit),
        }
    }

    /// Validates `sql` and rewrites it with a row cap.
    ///
    /// `backend` selects the dialect for the strict check and is otherwise unused.
    pub fn guard(
        &self,
        sql: &str,
        requested_limit: Option<usize>,
        backend: DatabaseBackend,
    ) -> Result<GuardedQuery> {
        let limit = self.resolve_limit(requested_limit)?;
        let sql = sql.trim();

        check_lexical(sql)?;
        if self.strict {
            check_statement(sql, backend)?;
        }

        let rewritten = inject_limit(sql, limit);
        let limit_injected = rewritten.len() != sql.len();
        debug!("Guarded query: {}", rewritten);

        Ok(GuardedQuery {
            sql: rewritten,
            limit,
            limit_injected,
        })
    }
}

/// Collapses whitespace runs, trims and lowercases a copy for inspection.
pub fn normalize_for_inspection(sql: &str) -> String {
    whitespace_run()
        .replace_all(sql, " ")
        .trim()
        .to_lowercase()
}

/// The lexical read-only gate.
pub fn check_lexical(sql: &str) -> Result<()> {
    let normalized = normalize_for_inspection(sql);

    if !normalized.starts_with("select") {
        return Err(GatewayError::unsafe_query(
            "Only SELECT queries are allowed. Detected non-read operation.",
        ));
    }

    if let Some(keyword) = DENYLIST.iter().find(|k| normalized.contains(*k)) {
        return Err(GatewayError::unsafe_query(format!(
            "Only SELECT queries are allowed. Query contains forbidden keyword '{keyword}'."
        )));
    }

    Ok(())
}

/// Appends ` LIMIT <cap>` unless the query already has a numeric LIMIT.
pub fn inject_limit(sql: &str, cap: usize) -> String {
    if limit_clause().is_match(sql) {
        return sql.to_string();
    }
    let body = sql.trim_end_matches(|c: char| c == ';' || c.is_whitespace());
    format!("{body} LIMIT {cap}")
}
