//! SQLite client for database files on disk.

use crate::config::ConnectionConfig;
use crate::db::{
    bind_values, Column, DatabaseBackend, DatabaseClient, ForeignKey, Index, ResultSet, Row, Value,
};
use crate::error::{GatewayError, Result};
use crate::query::{collect_capped, column_names};
use crate::safety::check_single_statement;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column as _, Executor, Row as _, Statement as _, TypeInfo, ValueRef as _};
use std::str::FromStr;
use std::time::Instant;
use tracing::debug;

/// SQLite database client.
#[derive(Debug)]
pub struct SqliteClient {
    pool: SqlitePool,
}

impl SqliteClient {
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens the database file read-only. Missing files are not created.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let conn_str = config.to_connection_string()?;
        let in_memory = conn_str.contains(":memory:");

        let options = SqliteConnectOptions::from_str(&conn_str)
            .map_err(|e| GatewayError::config(format!("Invalid SQLite location: {e}")))?
            .create_if_missing(false)
            .read_only(!in_memory);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| {
                GatewayError::source_unavailable(format!(
                    "Cannot open {}: {e}",
                    config.display_string()
                ))
            })?;

        debug!("Opened {}", config.display_string());
        Ok(Self { pool })
    }
}

#[async_trait]
impl DatabaseClient for SqliteClient {
    fn backend(&self) -> DatabaseBackend {
        DatabaseBackend::Sqlite
    }

    async fn run_query(&self, sql: &str, bindings: &[Value], cap: usize) -> Result<ResultSet> {
        check_single_statement(sql, DatabaseBackend::Sqlite)?;
        let start = Instant::now();

        let statement = (&self.pool).prepare(sql).await?;
        let columns = column_names(statement.columns().iter().map(|c| c.name()));
        let query = bind_values(statement.query(), bindings);
        let rows = collect_capped(query.fetch(&self.pool), cap, convert_row).await?;

        Ok(ResultSet::capped(columns, rows, cap).with_execution_time(start.elapsed()))
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        sqlx::query_scalar(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
             ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| GatewayError::execution(format!("Failed to fetch tables: {e}")))
    }

    async fn describe_columns(&self, table: &str) -> Result<Vec<Column>> {
        let rows: Vec<(String, String, i64, Option<String>, i64)> = sqlx::query_as(
            r#"SELECT name, type, "notnull", dflt_value, pk FROM pragma_table_info(?) ORDER BY cid"#,
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| GatewayError::execution(format!("Failed to fetch columns for {table}: {e}")))?;

        Ok(rows
            .into_iter()
            .map(|(name, data_type, not_null, default, pk)| Column {
                name,
                data_type,
                nullable: not_null == 0,
                default,
                primary_key: pk > 0,
            })
            .collect())
    }

    async fn describe_indexes(&self, table: &str) -> Result<Vec<Index>> {
        let rows: Vec<(String, Option<String>, i64)> = sqlx::query_as(
            r#"
            SELECT il.name, ii.name, il."unique"
            FROM pragma_index_list(?) AS il
            JOIN pragma_index_info(il.name) AS ii
            WHERE il.origin <> 'pk'
            ORDER BY il.name, ii.seqno
            "#,
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| GatewayError::execution(format!("Failed to fetch indexes for {table}: {e}")))?;

        // Expression index members have no column name.
        Ok(super::group_ordered(rows.into_iter().filter_map(
            |(name, column, unique)| column.map(|column| ((name, unique != 0), column)),
        ))
        .into_iter()
        .map(|((name, unique), columns)| Index {
            name,
            columns,
            unique,
        })
        .collect())
    }

    async fn describe_foreign_keys(&self, table: &str) -> Result<Vec<ForeignKey>> {
        let rows: Vec<(i64, String, String, Option<String>)> = sqlx::query_as(
            r#"SELECT id, "table", "from", "to" FROM pragma_foreign_key_list(?) ORDER BY id, seq"#,
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            GatewayError::execution(format!("Failed to fetch foreign keys for {table}: {e}"))
        })?;

        Ok(super::group_ordered(
            rows.into_iter()
                .map(|(id, to_table, from, to)| ((id, to_table), (from, to.unwrap_or_default()))),
        )
        .into_iter()
        .map(|((_, references_table), pairs)| {
            let (columns, references_columns) = pairs.into_iter().unzip();
            ForeignKey {
                name: None,
                columns,
                references_table,
                references_columns,
            }
        })
        .collect())
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

/// Converts a row by each value's storage class rather than the declared
/// column type, which SQLite does not enforce.
fn convert_row(row: &SqliteRow) -> Row {
    (0..row.len())
        .map(|i| {
            let Ok(raw) = row.try_get_raw(i) else {
                return Value::Null;
            };
            if raw.is_null() {
                return Value::Null;
            }
            let storage = raw.type_info().name().to_string();
            match storage.as_str() {
                "INTEGER" => row.try_get_unchecked::<i64, _>(i).map(Value::Int),
                "REAL" => row.try_get_unchecked::<f64, _>(i).map(Value::Float),
                "BLOB" => row.try_get_unchecked::<Vec<u8>, _>(i).map(Value::Bytes),
                _ => row.try_get_unchecked::<String, _>(i).map(Value::String),
            }
            .unwrap_or(Value::Null)
        })
        .collect()
}
