//! Connection-path tests against a SQLite database file.

use pretty_assertions::assert_eq;
use query_gateway::config::Config;
use query_gateway::connection::ConnectionResolver;
use query_gateway::db::Value;
use query_gateway::gateway::{DbQueryRequest, InspectDetail, InspectRequest, QueryGateway};
use serde_json::json;
use tempfile::TempDir;

/// Creates a database file with a small schema and returns a resolver
/// whose `default` connection points at it.
async fn seeded_resolver() -> (TempDir, ConnectionResolver) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.db");

    let options = sqlx::sqlite::SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true);
    let pool = sqlx::SqlitePool::connect_with(options).await.unwrap();
    sqlx::raw_sql(
        "CREATE TABLE users (id INTEGER PRIMARY KEY, email TEXT NOT NULL, active BOOLEAN DEFAULT 1);
         CREATE UNIQUE INDEX users_email ON users (email);
         CREATE TABLE orders (
             id INTEGER PRIMARY KEY,
             user_id INTEGER NOT NULL REFERENCES users(id),
             total REAL
         );
         INSERT INTO users (email, active) VALUES ('ada@example.com', 1), ('bob@example.com', 0);
         INSERT INTO orders (user_id, total) VALUES (1, 9.5), (1, 20.0), (2, 3.25);",
    )
    .execute(&pool)
    .await
    .unwrap();
    pool.close().await;

    let toml = format!(
        r#"
[connections.default]
backend = "sqlite"
database = "{}"
"#,
        path.display()
    );
    let config: Config = toml::from_str(&toml).unwrap();
    (dir, ConnectionResolver::new(config))
}

#[tokio::test]
async fn test_query_named_connection() {
    let (_dir, resolver) = seeded_resolver().await;
    let gateway = QueryGateway::default();

    let response = gateway
        .query_named(
            &resolver,
            None,
            &DbQueryRequest::new("SELECT id, email FROM users ORDER BY id"),
        )
        .await
        .unwrap();

    assert_eq!(
        serde_json::to_value(&response).unwrap(),
        json!({
            "connection": "default",
            "sql": "SELECT id, email FROM users ORDER BY id LIMIT 500",
            "columns": ["id", "email"],
            "rows": [[1, "ada@example.com"], [2, "bob@example.com"]],
            "count": 2,
            "limited": false
        })
    );
}

#[tokio::test]
async fn test_bindings_reach_the_driver() {
    let (_dir, resolver) = seeded_resolver().await;
    let request = DbQueryRequest {
        bindings: vec![Value::Int(1), Value::Float(5.0)],
        ..DbQueryRequest::new("SELECT total FROM orders WHERE user_id = ? AND total > ? ORDER BY total")
    };

    let response = QueryGateway::default()
        .query_named(&resolver, None, &request)
        .await
        .unwrap();

    assert_eq!(
        response.rows,
        vec![vec![Value::Float(9.5)], vec![Value::Float(20.0)]]
    );
}

#[tokio::test]
async fn test_cap_reports_limited() {
    let (_dir, resolver) = seeded_resolver().await;
    let request = DbQueryRequest {
        limit: Some(2),
        ..DbQueryRequest::new("SELECT id FROM orders")
    };

    let response = QueryGateway::default()
        .query_named(&resolver, None, &request)
        .await
        .unwrap();

    assert_eq!(response.sql, "SELECT id FROM orders LIMIT 2");
    assert_eq!(response.count, 2);
    assert!(response.limited);
}

#[tokio::test]
async fn test_result_of_exactly_the_cap_reports_limited() {
    let (_dir, resolver) = seeded_resolver().await;
    let request = DbQueryRequest {
        limit: Some(3),
        ..DbQueryRequest::new("SELECT id FROM orders")
    };

    let response = QueryGateway::default()
        .query_named(&resolver, None, &request)
        .await
        .unwrap();

    // orders holds exactly three rows.
    assert_eq!(response.count, 3);
    assert!(response.limited);
}

#[tokio::test]
async fn test_unsafe_query_is_rejected() {
    let (_dir, resolver) = seeded_resolver().await;

    let err = QueryGateway::default()
        .query_named(&resolver, None, &DbQueryRequest::new("DELETE FROM users"))
        .await
        .unwrap_err();

    assert_eq!(err.category(), "Unsafe Query");
}

#[tokio::test]
async fn test_database_file_is_opened_read_only() {
    let (_dir, resolver) = seeded_resolver().await;
    let conn = resolver.open(None).await.unwrap();

    // Bypasses the guard on purpose.
    let result = conn
        .client()
        .run_query("INSERT INTO users (email) VALUES ('x@example.com')", &[], 1)
        .await;
    conn.close().await;

    assert_eq!(result.unwrap_err().category(), "Execution Failed");
}

#[tokio::test]
async fn test_backend_error_is_execution_failed() {
    let (_dir, resolver) = seeded_resolver().await;

    let err = QueryGateway::default()
        .query_named(&resolver, None, &DbQueryRequest::new("SELECT nope FROM users"))
        .await
        .unwrap_err();

    assert_eq!(err.category(), "Execution Failed");
    assert!(err.to_string().contains("no such column"));
}

#[tokio::test]
async fn test_inspect_all_tables() {
    let (_dir, resolver) = seeded_resolver().await;

    let response = QueryGateway::default()
        .inspect_named(&resolver, None, &InspectRequest::default())
        .await
        .unwrap();

    let InspectDetail::Tables { tables } = response.detail else {
        panic!("expected table list");
    };
    let names: Vec<_> = tables.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["orders", "users"]);
    assert_eq!(tables[0].row_count, Some(3));
    assert_eq!(tables[1].row_count, Some(2));
    assert_eq!(tables[1].columns.as_ref().map(Vec::len), Some(3));
}

#[tokio::test]
async fn test_inspect_single_table() {
    let (_dir, resolver) = seeded_resolver().await;
    let request = InspectRequest {
        table: Some("orders".to_string()),
        ..Default::default()
    };

    let response = QueryGateway::default()
        .inspect_named(&resolver, Some("default"), &request)
        .await
        .unwrap();

    assert_eq!(
        serde_json::to_value(&response).unwrap(),
        json!({
            "connection": "default",
            "driver": "sqlite",
            "table": "orders",
            "row_count": 3,
            "columns": [
                {"name": "id", "type": "INTEGER", "nullable": true, "default": null, "primary_key": true},
                {"name": "user_id", "type": "INTEGER", "nullable": false, "default": null, "primary_key": false},
                {"name": "total", "type": "REAL", "nullable": true, "default": null, "primary_key": false}
            ],
            "indexes": [],
            "foreign_keys": [
                {"columns": ["user_id"], "references_table": "users", "references_columns": ["id"]}
            ]
        })
    );
}

#[tokio::test]
async fn test_inspect_unknown_table_has_null_count() {
    let (_dir, resolver) = seeded_resolver().await;
    let request = InspectRequest {
        table: Some("ghosts".to_string()),
        show_columns: false,
        ..Default::default()
    };

    let response = QueryGateway::default()
        .inspect_named(&resolver, None, &request)
        .await
        .unwrap();

    let InspectDetail::Table(detail) = response.detail else {
        panic!("expected table detail");
    };
    assert_eq!(detail.row_count, None);
    assert_eq!(detail.columns, None);
    assert_eq!(detail.indexes, Some(Vec::new()));
}
