//! MySQL / MariaDB client.

use crate::config::ConnectionConfig;
use crate::db::{
    bind_values, Column, DatabaseBackend, DatabaseClient, ForeignKey, Index, ResultSet, Row, Value,
};
use crate::error::{GatewayError, Result};
use crate::query::{collect_capped, column_names};
use async_trait::async_trait;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{Column as _, Executor, Row as _, Statement as _, TypeInfo, ValueRef as _};
use std::time::{Duration, Instant};
use tracing::debug;

const QUERY_TIMEOUT_SECS: u64 = 30;

/// MySQL database client.
#[derive(Debug)]
pub struct MySqlClient {
    pool: MySqlPool,
}

impl MySqlClient {
    pub fn from_pool(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let conn_str = config.to_connection_string()?;

        let pool = MySqlPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(Duration::from_secs(10))
            .connect(&conn_str)
            .await
            .map_err(|e| {
                GatewayError::source_unavailable(format!(
                    "Cannot connect to {}: {e}",
                    config.display_string()
                ))
            })?;

        debug!("Connected to {}", config.display_string());
        Ok(Self { pool })
    }
}

#[async_trait]
impl DatabaseClient for MySqlClient {
    fn backend(&self) -> DatabaseBackend {
        DatabaseBackend::MySql
    }

    async fn run_query(&self, sql: &str, bindings: &[Value], cap: usize) -> Result<ResultSet> {
        let start = Instant::now();

        let run = async {
            let statement = (&self.pool).prepare(sql).await?;
            let columns = column_names(statement.columns().iter().map(|c| c.name()));
            let query = bind_values(statement.query(), bindings);
            let rows = collect_capped(query.fetch(&self.pool), cap, convert_row).await?;
            Ok::<_, GatewayError>(ResultSet::capped(columns, rows, cap))
        };

        let result = tokio::time::timeout(Duration::from_secs(QUERY_TIMEOUT_SECS), run)
            .await
            .map_err(|_| {
                GatewayError::execution(format!(
                    "Query timed out after {QUERY_TIMEOUT_SECS} seconds"
                ))
            })??;

        Ok(result.with_execution_time(start.elapsed()))
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        sqlx::query_scalar(
            r#"
            SELECT CAST(table_name AS CHAR)
            FROM information_schema.tables
            WHERE table_schema = DATABASE() AND table_type = 'BASE TABLE'
            ORDER BY table_name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| GatewayError::execution(format!("Failed to fetch tables: {e}")))
    }

    async fn describe_columns(&self, table: &str) -> Result<Vec<Column>> {
        let rows: Vec<(String, String, String, Option<String>, String)> = sqlx::query_as(
            r#"
            SELECT
                CAST(column_name AS CHAR),
                CAST(column_type AS CHAR),
                CAST(is_nullable AS CHAR),
                CAST(column_default AS CHAR),
                CAST(column_key AS CHAR)
            FROM information_schema.columns
            WHERE table_schema = DATABASE() AND table_name = ?
            ORDER BY ordinal_position
            "#,
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| GatewayError::execution(format!("Failed to fetch columns for {table}: {e}")))?;

        Ok(rows
            .into_iter()
            .map(|(name, data_type, is_nullable, default, key)| Column {
                name,
                data_type,
                nullable: is_nullable == "YES",
                default,
                primary_key: key == "PRI",
            })
            .collect())
    }

    async fn describe_indexes(&self, table: &str) -> Result<Vec<Index>> {
        let rows: Vec<(String, String, i64)> = sqlx::query_as(
            r#"
            SELECT
                CAST(index_name AS CHAR),
                CAST(column_name AS CHAR),
                CAST(non_unique AS SIGNED)
            FROM information_schema.statistics
            WHERE table_schema = DATABASE()
                AND table_name = ?
                AND index_name <> 'PRIMARY'
            ORDER BY index_name, seq_in_index
            "#,
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| GatewayError::execution(format!("Failed to fetch indexes for {table}: {e}")))?;

        Ok(super::group_ordered(
            rows.into_iter()
                .map(|(name, column, non_unique)| ((name, non_unique == 0), column)),
        )
        .into_iter()
        .map(|((name, unique), columns)| Index {
            name,
            columns,
            unique,
        })
        .collect())
    }

    async fn describe_foreign_keys(&self, table: &str) -> Result<Vec<ForeignKey>> {
        let rows: Vec<(String, String, String, String)> = sqlx::query_as(
            r#"
            SELECT
                CAST(constraint_name AS CHAR),
                CAST(column_name AS CHAR),
                CAST(referenced_table_name AS CHAR),
                CAST(referenced_column_name AS CHAR)
            FROM information_schema.key_column_usage
            WHERE table_schema = DATABASE()
                AND table_name = ?
                AND referenced_table_name IS NOT NULL
            ORDER BY constraint_name, ordinal_position
            "#,
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            GatewayError::execution(format!("Failed to fetch foreign keys for {table}: {e}"))
        })?;

        Ok(super::group_ordered(
            rows.into_iter()
                .map(|(name, column, to_table, to_column)| ((name, to_table), (column, to_column))),
        )
        .into_iter()
        .map(|((name, references_table), pairs)| {
            let (columns, references_columns) = pairs.into_iter().unzip();
            ForeignKey {
                name: Some(name),
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

fn convert_row(row: &MySqlRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| convert_value(row, i, col.type_info().name()))
        .collect()
}

/// Converts one MySQL cell. Unknown types and DECIMAL come back as text.
fn convert_value(row: &MySqlRow, index: usize, type_name: &str) -> Value {
    fn get<'r, T>(row: &'r MySqlRow, index: usize) -> Option<T>
    where
        T: sqlx::Decode<'r, sqlx::MySql> + sqlx::Type<sqlx::MySql>,
    {
        row.try_get::<Option<T>, _>(index).ok().flatten()
    }

    let is_null = row.try_get_raw(index).map(|raw| raw.is_null()).unwrap_or(true);
    if is_null {
        return Value::Null;
    }

    let upper = type_name.to_uppercase();
    let converted = match upper.as_str() {
        "BOOLEAN" => get::<bool>(row, index).map(Value::Bool),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            get::<i64>(row, index).map(Value::Int)
        }
        t if t.ends_with("UNSIGNED") => get::<u64>(row, index).map(|v| match i64::try_from(v) {
            Ok(v) => Value::Int(v),
            Err(_) => Value::String(v.to_string()),
        }),
        "FLOAT" => get::<f32>(row, index).map(|v| Value::Float(v as f64)),
        "DOUBLE" => get::<f64>(row, index).map(Value::Float),
        "DATE" => get::<chrono::NaiveDate>(row, index).map(|v| Value::String(v.to_string())),
        "TIME" => get::<chrono::NaiveTime>(row, index).map(|v| Value::String(v.to_string())),
        "DATETIME" => {
            get::<chrono::NaiveDateTime>(row, index).map(|v| Value::String(v.to_string()))
        }
        "TIMESTAMP" => get::<chrono::DateTime<chrono::Utc>>(row, index)
            .map(|v| Value::String(v.to_rfc3339())),
        "JSON" => get::<serde_json::Value>(row, index).map(|v| Value::String(v.to_string())),
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" => {
            get::<Vec<u8>>(row, index).map(Value::Bytes)
        }
        _ => None,
    };

    converted
        .or_else(|| {
            row.try_get_unchecked::<String, _>(index)
                .ok()
                .map(Value::String)
        })
        .unwrap_or(Value::Null)
}
