//! File-path queries end to end: source, detection, load, query.

use pretty_assertions::assert_eq;
use query_gateway::db::Value;
use query_gateway::gateway::{QueryGateway, TableQueryRequest};
use query_gateway::table::{Delimiter, DelimiterSpec, TableSource};
use std::io::Write;
use tempfile::NamedTempFile;

fn write_source(content: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content).unwrap();
    file.flush().unwrap();
    file
}

fn text_rows(rows: &[&[&str]]) -> Vec<Vec<Value>> {
    rows.iter()
        .map(|row| row.iter().map(|cell| Value::from(*cell)).collect())
        .collect()
}

#[tokio::test]
async fn test_scenario_a_header_row() {
    let file = write_source(b"a,b\n1,2\n3,4\n");
    let request = TableQueryRequest::new(TableSource::Path(file.path().into()), "SELECT * FROM t");

    let response = QueryGateway::default().query_table(request).await.unwrap();

    assert_eq!(response.delimiter, ",");
    assert_eq!(response.columns, vec!["a", "b"]);
    assert_eq!(response.rows, text_rows(&[&["1", "2"], &["3", "4"]]));
    assert_eq!(response.loaded_rows, 2);
    assert!(!response.truncated);
}

#[tokio::test]
async fn test_scenario_b_without_header() {
    let file = write_source(b"a,b\n1,2\n3,4\n");
    let mut request =
        TableQueryRequest::new(TableSource::Path(file.path().into()), "SELECT * FROM t");
    request.has_header = false;

    let response = QueryGateway::default().query_table(request).await.unwrap();

    assert_eq!(response.columns, vec!["c1", "c2"]);
    assert_eq!(response.loaded_rows, 3);
    assert_eq!(
        response.rows,
        text_rows(&[&["a", "b"], &["1", "2"], &["3", "4"]])
    );
}

#[tokio::test]
async fn test_tab_detection_and_sanitized_headers() {
    let file = write_source(b"First Name\tAge (yrs)\nada\t36\ngrace\t45\n");
    let request = TableQueryRequest::new(
        TableSource::Path(file.path().into()),
        "SELECT first_name FROM t WHERE CAST(age_yrs_ AS INTEGER) > 40",
    );

    let response = QueryGateway::default().query_table(request).await.unwrap();

    assert_eq!(response.delimiter, "\t");
    assert_eq!(response.columns, vec!["first_name"]);
    assert_eq!(response.rows, text_rows(&[&["grace"]]));
}

#[tokio::test]
async fn test_explicit_semicolon_and_quoted_fields() {
    let file = write_source(b"name;note\n\"Smith; J\";\"line one\nline two\"\n");
    let mut request =
        TableQueryRequest::new(TableSource::Path(file.path().into()), "SELECT * FROM t");
    request.delimiter = DelimiterSpec::Explicit(Delimiter::SEMICOLON);

    let response = QueryGateway::default().query_table(request).await.unwrap();

    assert_eq!(response.delimiter, ";");
    assert_eq!(
        response.rows,
        text_rows(&[&["Smith; J", "line one\nline two"]])
    );
}

#[tokio::test]
async fn test_ingestion_cap() {
    let mut content = String::from("n\n");
    for i in 0..50 {
        content.push_str(&format!("{i}\n"));
    }
    let file = write_source(content.as_bytes());
    let mut request = TableQueryRequest::new(
        TableSource::Path(file.path().into()),
        "SELECT COUNT(*) AS total FROM t",
    );
    request.max_rows = Some(20);

    let response = QueryGateway::default().query_table(request).await.unwrap();

    assert_eq!(response.loaded_rows, 20);
    assert_eq!(response.rows, text_rows(&[&["20"]]));
}

#[tokio::test]
async fn test_output_cap_sets_truncated() {
    let file = write_source(b"n\n1\n2\n3\n4\n5\n");
    let mut request =
        TableQueryRequest::new(TableSource::Path(file.path().into()), "SELECT n FROM t");
    request.limit_output = Some(3);

    let response = QueryGateway::default().query_table(request).await.unwrap();

    assert_eq!(response.rows.len(), 3);
    assert_eq!(response.loaded_rows, 5);
    assert!(response.truncated);
}

#[tokio::test]
async fn test_ragged_rows_are_normalized() {
    let file = write_source(b"a,b,c\n1,2\n4,5,6,7\n");
    let request = TableQueryRequest::new(
        TableSource::Path(file.path().into()),
        "SELECT a, b, c FROM t",
    );

    let response = QueryGateway::default().query_table(request).await.unwrap();

    assert_eq!(
        response.rows,
        vec![
            vec![Value::from("1"), Value::from("2"), Value::Null],
            vec![Value::from("4"), Value::from("5"), Value::from("6")],
        ]
    );
}

#[tokio::test]
async fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nope.csv");
    let request = TableQueryRequest::new(TableSource::Path(path.clone()), "SELECT * FROM t");

    let err = QueryGateway::default()
        .query_table(request)
        .await
        .unwrap_err();

    assert_eq!(err.category(), "Source Unavailable");
    assert!(err.to_string().contains("File not found"));
}

#[tokio::test]
async fn test_empty_file() {
    let file = write_source(b"");
    let request = TableQueryRequest::new(TableSource::Path(file.path().into()), "SELECT * FROM t");

    let err = QueryGateway::default()
        .query_table(request)
        .await
        .unwrap_err();

    assert_eq!(err.category(), "Malformed Input");
}

#[tokio::test]
async fn test_writes_to_relation_fail() {
    let file = write_source(b"a\n1\n");
    let request = TableQueryRequest::new(
        TableSource::Path(file.path().into()),
        "INSERT INTO t VALUES ('2')",
    );

    let err = QueryGateway::default()
        .query_table(request)
        .await
        .unwrap_err();

    assert_eq!(err.category(), "Execution Failed");
}

#[tokio::test]
async fn test_query_referencing_unknown_column() {
    let file = write_source(b"a\n1\n");
    let request = TableQueryRequest::new(
        TableSource::Path(file.path().into()),
        "SELECT missing FROM t",
    );

    let err = QueryGateway::default()
        .query_table(request)
        .await
        .unwrap_err();

    assert_eq!(err.category(), "Execution Failed");
    assert!(err.to_string().contains("missing"));
}

#[tokio::test]
async fn test_custom_table_name() {
    let mut request = TableQueryRequest::new(
        TableSource::Inline("id\n1\n".to_string()),
        "SELECT id FROM people",
    );
    request.table = Some("people".to_string());

    let response = QueryGateway::default().query_table(request).await.unwrap();
    assert_eq!(response.table, "people");
    assert_eq!(response.rows, text_rows(&[&["1"]]));
}

#[tokio::test]
async fn test_statement_batches_are_refused() {
    let gateway = QueryGateway::default();

    let request = TableQueryRequest::new(
        TableSource::Inline("a,b\n1,2\n3,4\n".to_string()),
        "PRAGMA query_only = 0; DELETE FROM t; SELECT * FROM t",
    );
    let err = gateway.query_table(request).await.unwrap_err();
    assert_eq!(err.category(), "Unsafe Query");

    let request = TableQueryRequest::new(
        TableSource::Inline("a,b\n1,2\n3,4\n".to_string()),
        "PRAGMA query_only = OFF; DELETE FROM t; SELECT * FROM t",
    );
    assert!(gateway.query_table(request).await.is_err());
}

#[tokio::test]
async fn test_result_of_exactly_the_cap_reports_truncated() {
    let file = write_source(b"n\n1\n2\n");
    let mut request =
        TableQueryRequest::new(TableSource::Path(file.path().into()), "SELECT n FROM t");
    request.limit_output = Some(2);

    let response = QueryGateway::default().query_table(request).await.unwrap();

    // Nothing was cut off, but the count reached the cap.
    assert_eq!(response.rows.len(), 2);
    assert_eq!(response.loaded_rows, 2);
    assert!(response.truncated);
}
