//! Read-only guard behavior on its own.

use pretty_assertions::assert_eq;
use query_gateway::db::DatabaseBackend;
use query_gateway::safety::ReadOnlyGuard;

fn guard(sql: &str) -> query_gateway::Result<String> {
    ReadOnlyGuard::default()
        .guard(sql, None, DatabaseBackend::Postgres)
        .map(|g| g.sql)
}

#[test]
fn test_scenario_c() {
    assert_eq!(
        guard("  select * from users  ").unwrap(),
        "select * from users LIMIT 500"
    );

    let err = guard("update users set x=1").unwrap_err();
    assert_eq!(err.category(), "Unsafe Query");
}

#[test]
fn test_guard_table() {
    let cases: &[(&str, Option<&str>)] = &[
        ("SELECT 1", Some("SELECT 1 LIMIT 500")),
        ("SELECT * FROM t;", Some("SELECT * FROM t LIMIT 500")),
        ("SELECT * FROM t;  \n", Some("SELECT * FROM t LIMIT 500")),
        ("SELECT * FROM t LIMIT 10", Some("SELECT * FROM t LIMIT 10")),
        ("select * from t limit   3;", Some("select * from t limit   3;")),
        ("\n\tSELECT\n  id\nFROM t", Some("SELECT\n  id\nFROM t LIMIT 500")),
        ("DELETE FROM t", None),
        ("INSERT INTO t VALUES (1)", None),
        ("DROP TABLE t", None),
        ("WITH x AS (SELECT 1) SELECT * FROM x", None),
        ("SELECT 1; DROP TABLE t", None),
        ("SELECT created_at FROM t", None),
        ("SELECT * FROM t WHERE note = 'please update'", None),
        ("", None),
        ("   ", None),
    ];

    for (input, expected) in cases {
        let actual = guard(input).ok();
        assert_eq!(
            actual.as_deref(),
            *expected,
            "unexpected guard result for {input:?}"
        );
    }
}

#[test]
fn test_requested_cap_is_clamped() {
    let guarded = ReadOnlyGuard::default()
        .guard("SELECT 1", Some(100_000), DatabaseBackend::Sqlite)
        .unwrap();
    assert_eq!(guarded.limit, 5000);
    assert_eq!(guarded.sql, "SELECT 1 LIMIT 5000");
    assert!(guarded.limit_injected);
}

#[test]
fn test_zero_cap_is_malformed() {
    let err = ReadOnlyGuard::default()
        .guard("SELECT 1", Some(0), DatabaseBackend::Sqlite)
        .unwrap_err();
    assert_eq!(err.category(), "Malformed Input");
}

#[test]
fn test_strict_mode_closes_lexical_gaps() {
    let lexical = ReadOnlyGuard::default();
    let strict = ReadOnlyGuard::default().with_strict(true);

    for sql in ["SELECT 1; SELECT 2", "SELECT * INTO backup FROM users"] {
        assert!(lexical.guard(sql, None, DatabaseBackend::Postgres).is_ok());
        let err = strict
            .guard(sql, None, DatabaseBackend::Postgres)
            .unwrap_err();
        assert_eq!(err.category(), "Unsafe Query", "{sql}");
    }

    assert!(strict
        .guard("SELECT id FROM users WHERE id = 1", None, DatabaseBackend::MySql)
        .is_ok());
}
