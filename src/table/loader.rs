//! Materializes delimited records into an in-memory SQLite table.
//!
//! The relation lives on a private `sqlite::memory:` connection owned by
//! [`EphemeralRelation`]. Dropping the relation releases the store, so every
//! early return below frees it without extra bookkeeping.

use std::collections::HashSet;

use serde::Serialize;
use sqlx::sqlite::SqliteConnection;
use sqlx::{Connection, Sqlite, Transaction};
use tracing::{debug, info};

use super::sanitize::{positional_identifiers, sanitize_identifier};
use crate::db::DatabaseBackend;
use crate::error::{GatewayError, Result};

/// Default ingestion cap.
pub const DEFAULT_MAX_ROWS: usize = 200_000;

/// Default relation name.
pub const DEFAULT_TABLE_NAME: &str = "t";

/// A column of the ephemeral relation. Every column stores text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationColumn {
    pub name: String,
    pub position: usize,
}

/// Options controlling a single load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    /// Name of the created table.
    pub table: String,
    /// Whether the first record is a header.
    pub has_header: bool,
    /// Maximum number of data rows to insert.
    pub max_rows: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            table: DEFAULT_TABLE_NAME.to_string(),
            has_header: true,
            max_rows: DEFAULT_MAX_ROWS,
        }
    }
}

/// A loaded, per-call relation.
pub struct EphemeralRelation {
    conn: SqliteConnection,
    table: String,
    columns: Vec<RelationColumn>,
    loaded_rows: usize,
}

impl EphemeralRelation {
    /// Name of the backing table.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Schema, fixed once the first record was seen.
    pub fn columns(&self) -> &[RelationColumn] {
        &self.columns
    }

    /// Column names in position order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Number of data rows inserted.
    pub fn loaded_rows(&self) -> usize {
        self.loaded_rows
    }

    pub(crate) fn connection(&mut self) -> &mut SqliteConnection {
        &mut self.conn
    }

    /// Closes the in-memory store.
    pub async fn close(self) -> Result<()> {
        self.conn.close().await?;
        Ok(())
    }
}

impl std::fmt::Debug for EphemeralRelation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EphemeralRelation")
            .field("table", &self.table)
            .field("columns", &self.columns)
            .field("loaded_rows", &self.loaded_rows)
            .finish()
    }
}

/// Loads `records` into a fresh relation.
///
/// The first record fixes the column count. With a header it only names
/// the columns; without one it also becomes the first data row. Later
/// records are padded with NULL or cut to that width, never rejected.
/// Loading stops silently once `max_rows` rows are stored.
pub async fn load_relation<I>(records: I, options: &LoadOptions) -> Result<EphemeralRelation>
where
    I: IntoIterator<Item = Result<Vec<String>>>,
{
    validate_table_name(&options.table)?;

    let mut records = records.into_iter();
    let first = records
        .next()
        .transpose()?
        .ok_or_else(|| GatewayError::malformed("Source contains no records"))?;

    let names = if options.has_header {
        unique_identifiers(first.iter().map(|raw| sanitize_identifier(raw)).collect())
    } else {
        positional_identifiers(first.len())
    };
    if names.is_empty() {
        return Err(GatewayError::malformed("First record has no fields"));
    }

    let columns: Vec<RelationColumn> = names
        .into_iter()
        .enumerate()
        .map(|(position, name)| RelationColumn { name, position })
        .collect();

    let mut conn = SqliteConnection::connect("sqlite::memory:").await?;

    let loaded_rows = {
        let mut tx = conn.begin().await?;
        create_table(&mut tx, &options.table, &columns).await?;

        let insert_sql = insert_statement(&options.table, &columns);
        let leading = (!options.has_header).then_some(Ok(first));
        let mut loaded = 0usize;
        let mut reshaped = 0usize;

        for record in leading.into_iter().chain(records) {
            if loaded >= options.max_rows {
                info!(
                    "Ingestion cap of {} rows reached, discarding remaining input",
                    options.max_rows
                );
                break;
            }
            let record = record?;
            if record.len() != columns.len() {
                reshaped += 1;
            }
            let mut query = sqlx::query(&insert_sql);
            for cell in normalize_record(record, columns.len()) {
                query = query.bind(cell);
            }
            query.execute(&mut *tx).await?;
            loaded += 1;
        }

        tx.commit().await?;
        if reshaped > 0 {
            debug!("Normalized {} records to {} columns", reshaped, columns.len());
        }
        loaded
    };

    sqlx::query("PRAGMA query_only = ON")
        .execute(&mut conn)
        .await?;

    debug!(
        "Loaded {} rows into \"{}\" ({} columns)",
        loaded_rows,
        options.table,
        columns.len()
    );

    Ok(EphemeralRelation {
        conn,
        table: options.table.clone(),
        columns,
        loaded_rows,
    })
}

/// Pads with `None` or truncates so the row has exactly `width` cells.
pub fn normalize_record(record: Vec<String>, width: usize) -> Vec<Option<String>> {
    let mut cells: Vec<Option<String>> = record.into_iter().take(width).map(Some).collect();
    cells.resize(width, None);
    cells
}

/// Suffixes repeated identifiers as `name_2`, `name_3`, ... in order of appearance.
pub fn unique_identifiers(names: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::with_capacity(names.len());
    names
        .into_iter()
        .map(|name| {
            let mut candidate = name.clone();
            let mut suffix = 2;
            while seen.contains(&candidate) {
                candidate = format!("{name}_{suffix}");
                suffix += 1;
            }
            seen.insert(candidate.clone());
            candidate
        })
        .collect()
}

fn validate_table_name(table: &str) -> Result<()> {
    let mut chars = table.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(GatewayError::malformed(format!(
            "Invalid table name '{table}'. Use letters, digits and underscores"
        )))
    }
}

async fn create_table(
    tx: &mut Transaction<'_, Sqlite>,
    table: &str,
    columns: &[RelationColumn],
) -> Result<()> {
    let quote = |ident: &str| DatabaseBackend::Sqlite.quote_identifier(ident);
    let definitions = columns
        .iter()
        .map(|c| format!("{} TEXT", quote(&c.name)))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!("CREATE TABLE {} ({})", quote(table), definitions);
    sqlx::query(&sql).execute(&mut **tx).await?;
    Ok(())
}

fn insert_statement(table: &str, columns: &[RelationColumn]) -> String {
    let quote = |ident: &str| DatabaseBackend::Sqlite.quote_identifier(ident);
    let names = columns
        .iter()
        .map(|c| quote(&c.name))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = vec!["?"; columns.len()].join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote(table),
        names,
        placeholders
    )
}
