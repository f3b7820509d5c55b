//! Runs one statement and shapes its rows into a [`ResultSet`].

use std::time::Instant;

use futures::{Stream, TryStreamExt};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column as _, Executor, Row as _, Statement as _, ValueRef as _};
use tracing::debug;

use crate::db::{bind_values, DatabaseBackend, ResultSet, Row, Value};
use crate::error::{GatewayError, Result};
use crate::safety::check_single_statement;
use crate::table::EphemeralRelation;

/// One statement to execute, with its bindings and output cap.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySpec {
    pub text: String,
    pub bindings: Vec<Value>,
    pub limit: usize,
}

impl QuerySpec {
    /// Creates a spec with no bindings.
    pub fn new(text: impl Into<String>, limit: usize) -> Self {
        Self {
            text: text.into(),
            bindings: Vec::new(),
            limit,
        }
    }

    /// Sets the positional bindings.
    pub fn with_bindings(mut self, bindings: Vec<Value>) -> Self {
        self.bindings = bindings;
        self
    }
}

/// Turns reported column names into result headers, using `colN` for any
/// column the backend leaves unnamed.
pub fn column_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    names
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            if name.is_empty() {
                format!("col{}", i + 1)
            } else {
                name.to_string()
            }
        })
        .collect()
}

/// Pulls rows from `stream` until it ends or `cap` rows have been taken.
///
/// Rows past the cap are never requested.
pub async fn collect_capped<R, S, F>(mut stream: S, cap: usize, convert: F) -> Result<Vec<Row>>
where
    S: Stream<Item = std::result::Result<R, sqlx::Error>> + Unpin,
    F: Fn(&R) -> Row,
{
    let mut rows = Vec::with_capacity(cap.min(1024));
    while rows.len() < cap {
        match stream.try_next().await? {
            Some(row) => rows.push(convert(&row)),
            None => break,
        }
    }
    Ok(rows)
}

/// Executes `spec` against a loaded ephemeral relation.
///
/// Every non-null cell comes back as text, whatever SQLite computed.
/// Text holding more than one statement is refused before anything runs.
pub async fn execute_on_relation(
    relation: &mut EphemeralRelation,
    spec: &QuerySpec,
) -> Result<ResultSet> {
    if spec.limit == 0 {
        return Err(GatewayError::malformed("limit_output must be at least 1"));
    }

    check_single_statement(&spec.text, DatabaseBackend::Sqlite)?;

    let start = Instant::now();
    let conn = relation.connection();

    let statement = (&mut *conn).prepare(&spec.text).await?;
    let columns = column_names(statement.columns().iter().map(|c| c.name()));

    let query = bind_values(statement.query(), &spec.bindings);
    let rows = collect_capped(query.fetch(&mut *conn), spec.limit, text_row).await?;

    let result = ResultSet::capped(columns, rows, spec.limit).with_execution_time(start.elapsed());
    debug!(
        "Query returned {} rows in {:?} (truncated: {})",
        result.row_count, result.execution_time, result.truncated
    );
    Ok(result)
}

/// Converts a SQLite row to text cells, keeping NULL as NULL.
fn text_row(row: &SqliteRow) -> Row {
    (0..row.len())
        .map(|i| {
            let is_null = row
                .try_get_raw(i)
                .map(|raw| raw.is_null())
                .unwrap_or(true);
            if is_null {
                return Value::Null;
            }
            match row.try_get_unchecked::<String, _>(i) {
                Ok(text) => Value::String(text),
                Err(_) => row
                    .try_get_unchecked::<Vec<u8>, _>(i)
                    .map(|bytes| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
                    .unwrap_or(Value::Null),
            }
        })
        .collect()
}
