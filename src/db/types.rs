//! Result and cell types shared by every query path.

use crate::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Tabular output of one executed statement, already capped.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResultSet {
    /// Column names in result order.
    pub columns: Vec<String>,

    /// Rows of data, never more than the output cap.
    pub rows: Vec<Row>,

    /// Number of rows returned.
    pub row_count: usize,

    /// True when the returned row count reached the cap.
    ///
    /// This is a heuristic: a result whose true size equals the cap is also
    /// reported as truncated.
    pub truncated: bool,

    /// Time taken to execute the statement and collect its rows.
    #[serde(skip)]
    pub execution_time: Duration,
}

impl ResultSet {
    /// Builds a result set from rows collected under `cap`.
    pub fn capped(columns: Vec<String>, rows: Vec<Row>, cap: usize) -> Self {
        let row_count = rows.len();
        Self {
            columns,
            rows,
            row_count,
            truncated: row_count >= cap,
            execution_time: Duration::ZERO,
        }
    }

    /// Sets the execution time.
    pub fn with_execution_time(mut self, duration: Duration) -> Self {
        self.execution_time = duration;
        self
    }
}

/// A row of data from a query result.
pub type Row = Vec<Value>;

/// A single cell, or a scalar binding.
///
/// Serializes untagged, so a row renders as a plain JSON array.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Value {
    /// NULL value.
    #[default]
    Null,

    /// Boolean value.
    Bool(bool),

    /// Signed integer (up to i64).
    Int(i64),

    /// Floating point number.
    Float(f64),

    /// Text/string value.
    String(String),

    /// Binary data.
    Bytes(Vec<u8>),
}

impl Value {
    /// Returns the value as an integer when it is one.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Attempts to convert the value to a string representation.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => s.clone(),
            Value::Bytes(b) => format!("<{} bytes>", b.len()),
        }
    }
}

impl Value {
    /// Parses a scalar binding given as text.
    ///
    /// JSON scalars keep their type (`42`, `1.5`, `true`, `null`, `"x"`);
    /// anything that is not JSON is taken as a plain string. Arrays and
    /// objects are rejected.
    pub fn parse_binding(raw: &str) -> Result<Self> {
        match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(serde_json::Value::Null) => Ok(Value::Null),
            Ok(serde_json::Value::Bool(b)) => Ok(Value::Bool(b)),
            Ok(serde_json::Value::Number(n)) => Ok(match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            }),
            Ok(serde_json::Value::String(s)) => Ok(Value::String(s)),
            Ok(_) => Err(GatewayError::malformed(format!(
                "Binding must be a scalar, got {raw}"
            ))),
            Err(_) => Ok(Value::String(raw.to_string())),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}
