//! External relational stores.
//!
//! Each supported dialect has its own client behind the [`DatabaseClient`]
//! capability trait. The dialect is picked once, when connecting, and
//! nothing downstream branches on driver names again.

mod mysql;
mod postgres;
mod schema;
mod sqlite;
mod types;

pub use mysql::MySqlClient;
pub use postgres::PostgresClient;
pub use schema::{Column, ForeignKey, Index};
pub use sqlite::SqliteClient;
pub use types::{ResultSet, Row, Value};

pub(crate) use schema::group_ordered;

use crate::config::ConnectionConfig;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::query::Query;
use sqlx::{Database, Encode, Type};

/// Supported database backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    #[default]
    Postgres,
    MySql,
    Sqlite,
}

impl DatabaseBackend {
    /// Returns the backend name as reported in responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::MySql => "mysql",
            Self::Sqlite => "sqlite",
        }
    }

    /// Parses a backend from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" | "pgsql" => Some(Self::Postgres),
            "mysql" | "mariadb" => Some(Self::MySql),
            "sqlite" | "sqlite3" => Some(Self::Sqlite),
            _ => None,
        }
    }

    /// Returns the default port for this backend (0 for file-based stores).
    pub fn default_port(&self) -> u16 {
        match self {
            Self::Postgres => 5432,
            Self::MySql => 3306,
            Self::Sqlite => 0,
        }
    }

    /// Returns the URL scheme for this backend.
    pub fn url_scheme(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::MySql => "mysql",
            Self::Sqlite => "sqlite",
        }
    }

    /// Quotes an identifier for this dialect, escaping embedded quote characters.
    pub fn quote_identifier(&self, ident: &str) -> String {
        match self {
            Self::MySql => format!("`{}`", ident.replace('`', "``")),
            Self::Postgres | Self::Sqlite => format!("\"{}\"", ident.replace('"', "\"\"")),
        }
    }
}

/// Creates a database client for the given backend and configuration.
///
/// This is the central factory function for database connections.
pub async fn connect(config: &ConnectionConfig) -> Result<Box<dyn DatabaseClient>> {
    match config.backend {
        DatabaseBackend::Postgres => Ok(Box::new(PostgresClient::connect(config).await?)),
        DatabaseBackend::MySql => Ok(Box::new(MySqlClient::connect(config).await?)),
        DatabaseBackend::Sqlite => Ok(Box::new(SqliteClient::connect(config).await?)),
    }
}

/// Capability interface of a ready external connection.
///
/// The gateway borrows a client for the length of one call; it never closes
/// or stores it.
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// The dialect this client speaks.
    fn backend(&self) -> DatabaseBackend;

    /// Executes one statement with driver-side bindings, returning at most
    /// `cap` rows.
    async fn run_query(&self, sql: &str, bindings: &[Value], cap: usize) -> Result<ResultSet>;

    /// Lists user tables, sorted by name.
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Describes the columns of a table in ordinal order.
    async fn describe_columns(&self, table: &str) -> Result<Vec<Column>>;

    /// Describes the secondary indexes of a table.
    async fn describe_indexes(&self, table: &str) -> Result<Vec<Index>>;

    /// Describes the foreign keys owned by a table.
    async fn describe_foreign_keys(&self, table: &str) -> Result<Vec<ForeignKey>>;

    /// Counts the rows of a table, or `None` if the count fails.
    async fn count_rows(&self, table: &str) -> Option<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {}",
            self.backend().quote_identifier(table)
        );
        let result = self.run_query(&sql, &[], 1).await.ok()?;
        result.rows.first()?.first()?.as_i64()
    }

    /// Closes the database connection.
    async fn close(&self) -> Result<()>;
}

/// Binds scalar values positionally, letting the driver encode them.
pub(crate) fn bind_values<'q, DB>(
    mut query: Query<'q, DB, <DB as Database>::Arguments<'q>>,
    values: &[Value],
) -> Query<'q, DB, <DB as Database>::Arguments<'q>>
where
    DB: Database,
    bool: Encode<'q, DB> + Type<DB>,
    i64: Encode<'q, DB> + Type<DB>,
    f64: Encode<'q, DB> + Type<DB>,
    String: Encode<'q, DB> + Type<DB>,
    Option<String>: Encode<'q, DB> + Type<DB>,
    Vec<u8>: Encode<'q, DB> + Type<DB>,
{
    for value in values {
        query = match value {
            Value::Null => query.bind(None::<String>),
            Value::Bool(b) => query.bind(*b),
            Value::Int(i) => query.bind(*i),
            Value::Float(f) => query.bind(*f),
            Value::String(s) => query.bind(s.clone()),
            Value::Bytes(b) => query.bind(b.clone()),
        };
    }
    query
}
