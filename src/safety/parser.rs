//! Parsed read-only check.
//!
//! Uses sqlparser-rs with the connection's dialect. A statement passes only
//! if it is a single query whose CTEs, set operations and derived tables
//! contain no data-modifying statement and no `SELECT ... INTO`.

use sqlparser::ast::{Query, Select, SetExpr, Statement, TableFactor, TableWithJoins};
use sqlparser::dialect::{Dialect, MySqlDialect, PostgreSqlDialect, SQLiteDialect};
use sqlparser::parser::Parser;

use crate::db::DatabaseBackend;
use crate::error::{GatewayError, Result};

fn dialect_for(backend: DatabaseBackend) -> Box<dyn Dialect> {
    match backend {
        DatabaseBackend::Postgres => Box::new(PostgreSqlDialect {}),
        DatabaseBackend::MySql => Box::new(MySqlDialect {}),
        DatabaseBackend::Sqlite => Box::new(SQLiteDialect {}),
    }
}

/// Rejects anything but a single pure read statement.
pub fn check_statement(sql: &str, backend: DatabaseBackend) -> Result<()> {
    let dialect = dialect_for(backend);
    let statements = Parser::parse_sql(dialect.as_ref(), sql)
        .map_err(|e| GatewayError::unsafe_query(format!("Could not parse SQL: {e}")))?;

    match statements.as_slice() {
        [] => Err(GatewayError::unsafe_query("Empty SQL statement")),
        [Statement::Query(query)] => match write_in_query(query) {
            Some(kind) => Err(GatewayError::unsafe_query(format!(
                "Query contains a {kind} operation"
            ))),
            None => Ok(()),
        },
        [_] => Err(GatewayError::unsafe_query(
            "Only a single SELECT statement is allowed",
        )),
        _ => Err(GatewayError::unsafe_query(format!(
            "Expected one statement, found {}",
            statements.len()
        ))),
    }
}

/// Fails unless `sql` is exactly one statement.
///
/// SQLite runs every `;`-separated statement of a string it is handed, so
/// callers executing on SQLite check this first.
pub fn check_single_statement(sql: &str, backend: DatabaseBackend) -> Result<()> {
    let dialect = dialect_for(backend);
    let statements = Parser::parse_sql(dialect.as_ref(), sql)
        .map_err(|e| GatewayError::execution(format!("Could not parse SQL: {e}")))?;

    match statements.len() {
        1 => Ok(()),
        0 => Err(GatewayError::malformed("Empty SQL statement")),
        n => Err(GatewayError::unsafe_query(format!(
            "Expected one statement, found {n}"
        ))),
    }
}

/// Returns the first write construct found in a query, if any.
fn write_in_query(query: &Query) -> Option<&'static str> {
    if let Some(with) = &query.with {
        if let Some(kind) = with.cte_tables.iter().find_map(|cte| write_in_query(&cte.query)) {
            return Some(kind);
        }
    }
    write_in_set_expr(&query.body)
}

fn write_in_set_expr(set_expr: &SetExpr) -> Option<&'static str> {
    match set_expr {
        SetExpr::Select(select) => write_in_select(select),
        SetExpr::Query(query) => write_in_query(query),
        SetExpr::SetOperation { left, right, .. } => {
            write_in_set_expr(left).or_else(|| write_in_set_expr(right))
        }
        SetExpr::Values(_) | SetExpr::Table(_) => None,
        SetExpr::Insert(_) => Some("INSERT"),
        SetExpr::Update(_) => Some("UPDATE"),
        // Anything newer than this list is a statement body, not a read
        #[allow(unreachable_patterns)]
        _ => Some("data-modifying"),
    }
}

fn write_in_select(select: &Select) -> Option<&'static str> {
    if select.into.is_some() {
        return Some("SELECT INTO");
    }
    select.from.iter().find_map(write_in_table_with_joins)
}

fn write_in_table_with_joins(twj: &TableWithJoins) -> Option<&'static str> {
    write_in_table_factor(&twj.relation)
        .or_else(|| twj.joins.iter().find_map(|join| write_in_table_factor(&join.relation)))
}

fn write_in_table_factor(factor: &TableFactor) -> Option<&'static str> {
    match factor {
        TableFactor::Derived { subquery, .. } => write_in_query(subquery),
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => write_in_table_with_joins(table_with_joins),
        _ => None,
    }
}
