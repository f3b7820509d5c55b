//! The two query paths and schema inspection.
//!
//! Callers describe one request, the gateway runs it to completion and hands
//! back a payload ready to serialize. Nothing survives between calls.

use serde::Serialize;
use tracing::{info, warn};

use crate::config::{Config, LimitsConfig};
use crate::connection::{ConnectionResolver, OpenConnection};
use crate::db::{Column, DatabaseBackend, DatabaseClient, ForeignKey, Index, Row, Value};
use crate::error::{GatewayError, Result};
use crate::query::{execute_on_relation, QuerySpec};
use crate::safety::{GuardedQuery, ReadOnlyGuard};
use crate::table::{load_relation, open_records, DelimiterSpec, LoadOptions, TableSource};

/// Default output cap for queries over delimited text.
pub const DEFAULT_LIMIT_OUTPUT: usize = 500;

/// A query over delimited text.
#[derive(Debug, Clone, PartialEq)]
pub struct TableQueryRequest {
    pub source: TableSource,
    pub sql: String,
    pub delimiter: DelimiterSpec,
    pub has_header: bool,
    /// Relation name; `t` when unset.
    pub table: Option<String>,
    /// Ingestion cap; the configured default when unset.
    pub max_rows: Option<usize>,
    /// Output cap; the configured default when unset.
    pub limit_output: Option<usize>,
}

impl TableQueryRequest {
    pub fn new(source: TableSource, sql: impl Into<String>) -> Self {
        Self {
            source,
            sql: sql.into(),
            delimiter: DelimiterSpec::Auto,
            has_header: true,
            table: None,
            max_rows: None,
            limit_output: None,
        }
    }
}

/// Result of a query over delimited text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableQueryResponse {
    pub table: String,
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub loaded_rows: usize,
    pub truncated: bool,
    pub delimiter: String,
}

/// A read-only query over a named connection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DbQueryRequest {
    pub sql: String,
    pub bindings: Vec<Value>,
    /// Row cap; the configured default when unset.
    pub limit: Option<usize>,
    /// Forces the parsed statement check for this call.
    pub strict: bool,
}

impl DbQueryRequest {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            ..Default::default()
        }
    }
}

/// Result of a query over a named connection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DbQueryResponse {
    pub connection: String,
    /// Text actually executed, after the row cap was applied.
    pub sql: String,
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub count: usize,
    pub limited: bool,
}

/// What to describe about a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectRequest {
    pub table: Option<String>,
    pub show_columns: bool,
    pub show_indexes: bool,
    pub show_foreign_keys: bool,
}

impl Default for InspectRequest {
    fn default() -> Self {
        Self {
            table: None,
            show_columns: true,
            show_indexes: true,
            show_foreign_keys: true,
        }
    }
}

/// Schema description of a connection or one of its tables.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InspectResponse {
    pub connection: String,
    pub driver: DatabaseBackend,
    #[serde(flatten)]
    pub detail: InspectDetail,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum InspectDetail {
    Tables { tables: Vec<TableSummary> },
    Table(TableDetail),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSummary {
    pub name: String,
    pub row_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<Column>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableDetail {
    pub table: String,
    pub row_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<Column>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indexes: Option<Vec<Index>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub foreign_keys: Option<Vec<ForeignKey>>,
}

/// Stateless entry point for both query paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryGateway {
    limits: LimitsConfig,
    guard: ReadOnlyGuard,
}

impl Default for QueryGateway {
    fn default() -> Self {
        Self::new(LimitsConfig::default(), false)
    }
}

impl QueryGateway {
    pub fn new(limits: LimitsConfig, strict: bool) -> Self {
        Self {
            guard: ReadOnlyGuard::new(limits.query_limit, limits.max_query_limit)
                .with_strict(strict),
            limits,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.limits, config.guard.strict)
    }

    /// The guard used for connection queries.
    pub fn guard(&self) -> &ReadOnlyGuard {
        &self.guard
    }

    /// Loads delimited text into a private relation and runs `request.sql`
    /// against it.
    ///
    /// The relation is closed before returning. On error it is dropped,
    /// which releases it as well.
    pub async fn query_table(&self, request: TableQueryRequest) -> Result<TableQueryResponse> {
        let limit_output = request.limit_output.unwrap_or(self.limits.limit_output);
        if limit_output == 0 {
            return Err(GatewayError::malformed("limit_output must be at least 1"));
        }

        let (delimiter, records) = open_records(&request.source, request.delimiter)?;

        let options = LoadOptions {
            table: request
                .table
                .unwrap_or_else(|| crate::table::DEFAULT_TABLE_NAME.to_string()),
            has_header: request.has_header,
            max_rows: request.max_rows.unwrap_or(self.limits.max_rows),
        };
        let mut relation = load_relation(records, &options).await?;

        let spec = QuerySpec::new(request.sql, limit_output);
        let result = execute_on_relation(&mut relation, &spec).await?;

        let table = relation.table().to_string();
        let loaded_rows = relation.loaded_rows();
        if let Err(e) = relation.close().await {
            warn!("Failed to close ephemeral relation: {}", e);
        }

        info!(
            "Queried {} ({} rows loaded, {} returned)",
            request.source.describe(),
            loaded_rows,
            result.row_count
        );

        Ok(TableQueryResponse {
            table,
            columns: result.columns,
            rows: result.rows,
            loaded_rows,
            truncated: result.truncated,
            delimiter: delimiter.to_string(),
        })
    }

    /// Guards `request.sql` for `backend` without executing it.
    pub fn check(&self, request: &DbQueryRequest, backend: DatabaseBackend) -> Result<GuardedQuery> {
        let guard = if request.strict {
            self.guard.clone().with_strict(true)
        } else {
            self.guard.clone()
        };
        guard.guard(&request.sql, request.limit, backend)
    }

    /// Runs a guarded read-only query on a borrowed client.
    pub async fn query_database(
        &self,
        client: &dyn DatabaseClient,
        connection: &str,
        request: &DbQueryRequest,
    ) -> Result<DbQueryResponse> {
        let guarded = self.check(request, client.backend())?;
        let result = client
            .run_query(&guarded.sql, &request.bindings, guarded.limit)
            .await?;

        info!(
            "Query on '{}' returned {} rows in {:?}",
            connection, result.row_count, result.execution_time
        );

        Ok(DbQueryResponse {
            connection: connection.to_string(),
            sql: guarded.sql,
            columns: result.columns,
            count: result.row_count,
            limited: result.truncated,
            rows: result.rows,
        })
    }

    /// Describes tables of a borrowed client.
    pub async fn inspect_database(
        &self,
        client: &dyn DatabaseClient,
        connection: &str,
        request: &InspectRequest,
    ) -> Result<InspectResponse> {
        let detail = match &request.table {
            Some(table) => InspectDetail::Table(inspect_table(client, table, request).await?),
            None => {
                let mut tables = Vec::new();
                for name in client.list_tables().await? {
                    let row_count = client.count_rows(&name).await;
                    let columns = if request.show_columns {
                        Some(client.describe_columns(&name).await?)
                    } else {
                        None
                    };
                    tables.push(TableSummary {
                        name,
                        row_count,
                        columns,
                    });
                }
                InspectDetail::Tables { tables }
            }
        };

        Ok(InspectResponse {
            connection: connection.to_string(),
            driver: client.backend(),
            detail,
        })
    }

    /// Opens `name`, runs one query and closes the connection.
    pub async fn query_named(
        &self,
        resolver: &ConnectionResolver,
        name: Option<&str>,
        request: &DbQueryRequest,
    ) -> Result<DbQueryResponse> {
        let conn = resolver.open(name).await?;
        let result = self.query_database(conn.client(), conn.name(), request).await;
        conn.close().await;
        result
    }

    /// Opens `name`, inspects it and closes the connection.
    pub async fn inspect_named(
        &self,
        resolver: &ConnectionResolver,
        name: Option<&str>,
        request: &InspectRequest,
    ) -> Result<InspectResponse> {
        let conn: OpenConnection = resolver.open(name).await?;
        let result = self.inspect_database(conn.client(), conn.name(), request).await;
        conn.close().await;
        result
    }
}

async fn inspect_table(
    client: &dyn DatabaseClient,
    table: &str,
    request: &InspectRequest,
) -> Result<TableDetail> {
    let columns = if request.show_columns {
        Some(client.describe_columns(table).await?)
    } else {
        None
    };

    let indexes = if request.show_indexes {
        Some(client.describe_indexes(table).await.unwrap_or_else(|e| {
            warn!("Index lookup for {} failed: {}", table, e);
            Vec::new()
        }))
    } else {
        None
    };

    let foreign_keys = if request.show_foreign_keys {
        Some(client.describe_foreign_keys(table).await.unwrap_or_else(|e| {
            warn!("Foreign key lookup for {} failed: {}", table, e);
            Vec::new()
        }))
    } else {
        None
    };

    Ok(TableDetail {
        table: table.to_string(),
        row_count: client.count_rows(table).await,
        columns,
        indexes,
        foreign_keys,
    })
}
