//! Command-line argument parsing.

use crate::config::Config;
use crate::db::Value;
use crate::error::{GatewayError, Result};
use crate::gateway::{DbQueryRequest, InspectRequest, TableQueryRequest};
use crate::table::{DelimiterSpec, TableSource};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Read-only SQL over delimited files and named database connections.
#[derive(Parser, Debug)]
#[command(name = "query-gateway")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Log debug detail to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Pretty-print the JSON result
    #[arg(long, global = true)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Query a delimited text file as a table
    Table(TableArgs),
    /// Run a read-only query on a named connection
    Db(DbArgs),
    /// Describe tables, columns, indexes and foreign keys
    Inspect(InspectArgs),
    /// Validate a query and print the SQL that would run
    Guard(GuardArgs),
}

#[derive(Args, Debug)]
pub struct TableArgs {
    /// Path to the delimited file
    #[arg(value_name = "FILE", required_unless_present = "inline", conflicts_with = "inline")]
    pub file: Option<PathBuf>,

    /// Delimited text given directly instead of a file
    #[arg(long, value_name = "TEXT")]
    pub inline: Option<String>,

    /// SQL to run against the loaded table
    #[arg(long, value_name = "SQL")]
    pub sql: String,

    /// auto, comma, tab, semicolon, or a single character
    #[arg(long, value_name = "D", default_value = "auto")]
    pub delimiter: String,

    /// Treat the first line as data; columns are named c1..cN
    #[arg(long)]
    pub no_header: bool,

    /// Table name to load into
    #[arg(long, value_name = "NAME")]
    pub table: Option<String>,

    /// Maximum data rows to load
    #[arg(long, value_name = "N")]
    pub max_rows: Option<usize>,

    /// Maximum rows to return
    #[arg(long, value_name = "N")]
    pub limit_output: Option<usize>,
}

impl TableArgs {
    pub fn to_request(&self) -> Result<TableQueryRequest> {
        let source = match (&self.file, &self.inline) {
            (_, Some(text)) => TableSource::Inline(text.clone()),
            (Some(path), None) => TableSource::Path(path.clone()),
            (None, None) => return Err(GatewayError::malformed("No file or inline text given")),
        };

        Ok(TableQueryRequest {
            source,
            sql: self.sql.clone(),
            delimiter: DelimiterSpec::parse(&self.delimiter)?,
            has_header: !self.no_header,
            table: self.table.clone(),
            max_rows: self.max_rows,
            limit_output: self.limit_output,
        })
    }
}

#[derive(Args, Debug)]
pub struct DbArgs {
    /// SQL to run (SELECT only)
    #[arg(long, value_name = "SQL")]
    pub sql: String,

    /// Named connection from config
    #[arg(short, long, value_name = "NAME")]
    pub connection: Option<String>,

    /// Connection URL, bypassing the config file
    #[arg(long, value_name = "URL", env = "QUERY_GATEWAY_URL")]
    pub url: Option<String>,

    /// Maximum rows to return
    #[arg(long, value_name = "N")]
    pub limit: Option<usize>,

    /// Positional binding; JSON scalars keep their type
    #[arg(long = "bind", value_name = "VALUE")]
    pub bindings: Vec<String>,

    /// Also parse the statement and reject anything but a single query
    #[arg(long)]
    pub strict: bool,
}

impl DbArgs {
    pub fn to_request(&self) -> Result<DbQueryRequest> {
        Ok(DbQueryRequest {
            sql: self.sql.clone(),
            bindings: self
                .bindings
                .iter()
                .map(|raw| Value::parse_binding(raw))
                .collect::<Result<_>>()?,
            limit: self.limit,
            strict: self.strict,
        })
    }
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Named connection from config
    #[arg(short, long, value_name = "NAME")]
    pub connection: Option<String>,

    /// Connection URL, bypassing the config file
    #[arg(long, value_name = "URL", env = "QUERY_GATEWAY_URL")]
    pub url: Option<String>,

    /// Table to describe; all tables when omitted
    #[arg(long, value_name = "TABLE")]
    pub table: Option<String>,

    #[arg(long)]
    pub no_columns: bool,

    #[arg(long)]
    pub no_indexes: bool,

    #[arg(long)]
    pub no_foreign_keys: bool,
}

impl InspectArgs {
    pub fn to_request(&self) -> InspectRequest {
        InspectRequest {
            table: self.table.clone(),
            show_columns: !self.no_columns,
            show_indexes: !self.no_indexes,
            show_foreign_keys: !self.no_foreign_keys,
        }
    }
}

#[derive(Args, Debug)]
pub struct GuardArgs {
    /// SQL to check
    #[arg(long, value_name = "SQL")]
    pub sql: String,

    /// Row cap to apply
    #[arg(long, value_name = "N")]
    pub limit: Option<usize>,

    /// Dialect used by the strict check
    #[arg(long, value_name = "BACKEND", default_value = "postgres")]
    pub backend: String,

    /// Also parse the statement and reject anything but a single query
    #[arg(long)]
    pub strict: bool,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path to use.
    ///
    /// Uses the --config argument if provided, otherwise the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }
}
