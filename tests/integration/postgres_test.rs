//! Postgres tests.
//!
//! These tests require a running PostgreSQL database.
//! Set DATABASE_URL environment variable to run them.

use query_gateway::config::ConnectionConfig;
use query_gateway::db::{DatabaseClient, PostgresClient, Value};
use query_gateway::gateway::{DbQueryRequest, InspectRequest, QueryGateway};

/// Helper to create a test client.
async fn get_test_client() -> Option<PostgresClient> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let config = ConnectionConfig::from_connection_string(&url).ok()?;
    PostgresClient::connect(&config).await.ok()
}

#[tokio::test]
async fn test_simple_select_keeps_types() {
    let Some(client) = get_test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let result = client
        .run_query(
            "SELECT 1::int4 AS num, 'hello' AS greeting, true AS flag, NULL::text AS nothing",
            &[],
            10,
        )
        .await
        .unwrap();

    assert_eq!(result.columns, vec!["num", "greeting", "flag", "nothing"]);
    assert_eq!(
        result.rows,
        vec![vec![
            Value::Int(1),
            Value::String("hello".to_string()),
            Value::Bool(true),
            Value::Null,
        ]]
    );
    assert!(!result.truncated);

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_bindings_and_temporal_values() {
    let Some(client) = get_test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let result = client
        .run_query(
            "SELECT $1::int8 + 1 AS next, DATE '2024-02-29' AS day, '{\"a\": 1}'::jsonb AS doc",
            &[Value::Int(41)],
            10,
        )
        .await
        .unwrap();

    assert_eq!(result.rows[0][0], Value::Int(42));
    assert_eq!(result.rows[0][1], Value::String("2024-02-29".to_string()));
    assert_eq!(result.rows[0][2], Value::String(r#"{"a":1}"#.to_string()));

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_guarded_query_is_capped() {
    let Some(client) = get_test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let request = DbQueryRequest {
        limit: Some(5),
        ..DbQueryRequest::new("SELECT n FROM generate_series(1, 100) AS n")
    };
    let response = QueryGateway::default()
        .query_database(&client, "default", &request)
        .await
        .unwrap();

    assert_eq!(response.count, 5);
    assert!(response.limited);
    assert_eq!(response.sql, "SELECT n FROM generate_series(1, 100) AS n LIMIT 5");

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_server_error_is_kept_verbatim() {
    let Some(client) = get_test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let err = client
        .run_query("SELECT * FROM definitely_not_a_table_xyz", &[], 10)
        .await
        .unwrap_err();

    assert_eq!(err.category(), "Execution Failed");
    assert!(err.to_string().contains("definitely_not_a_table_xyz"));

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_inspect_lists_tables() {
    let Some(client) = get_test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let request = InspectRequest {
        show_columns: false,
        ..Default::default()
    };
    let response = QueryGateway::default()
        .inspect_database(&client, "default", &request)
        .await
        .unwrap();

    assert_eq!(response.connection, "default");
    assert_eq!(response.driver.as_str(), "postgres");

    client.close().await.unwrap();
}
