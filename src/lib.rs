//! Query Gateway - read-only SQL over delimited text and named databases.
//!
//! This library exposes the core modules for use by the binary and in
//! integration tests.

pub mod cli;
pub mod config;
pub mod connection;
pub mod db;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod query;
pub mod safety;
pub mod table;

pub use error::{GatewayError, Result};
pub use gateway::QueryGateway;
