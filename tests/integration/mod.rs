//! Integration tests for Query Gateway.

pub mod guard_test;
pub mod postgres_test;
pub mod sqlite_connection_test;
pub mod table_query_test;
