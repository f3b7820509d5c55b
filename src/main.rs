//! Query Gateway command-line entry point.

use query_gateway::cli::{Cli, Command};
use query_gateway::config::Config;
use query_gateway::connection::ConnectionResolver;
use query_gateway::db::DatabaseBackend;
use query_gateway::error::{GatewayError, Result};
use query_gateway::{logging, QueryGateway};
use serde::Serialize;
use tracing::{debug, error};

#[tokio::main]
async fn main() {
    // A missing .env is fine.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse_args();
    logging::init_stderr_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        error!("{}: {}", e.category(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config_path();
    debug!("Loading config from: {}", config_path.display());
    let config = Config::load_from_file(&config_path)?;
    let gateway = QueryGateway::from_config(&config);

    match &cli.command {
        Command::Table(args) => {
            let response = gateway.query_table(args.to_request()?).await?;
            print_json(&response, cli.pretty)
        }
        Command::Db(args) => {
            let resolver = ConnectionResolver::from_env(config).with_url(args.url.clone());
            let response = gateway
                .query_named(&resolver, args.connection.as_deref(), &args.to_request()?)
                .await?;
            print_json(&response, cli.pretty)
        }
        Command::Inspect(args) => {
            let resolver = ConnectionResolver::from_env(config).with_url(args.url.clone());
            let response = gateway
                .inspect_named(&resolver, args.connection.as_deref(), &args.to_request())
                .await?;
            print_json(&response, cli.pretty)
        }
        Command::Guard(args) => {
            let backend = DatabaseBackend::parse(&args.backend).ok_or_else(|| {
                GatewayError::malformed(format!("Unknown backend '{}'", args.backend))
            })?;
            let request = query_gateway::gateway::DbQueryRequest {
                limit: args.limit,
                strict: args.strict,
                ..query_gateway::gateway::DbQueryRequest::new(args.sql.clone())
            };
            let guarded = gateway.check(&request, backend)?;
            print_json(&guarded, cli.pretty)
        }
    }
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| GatewayError::internal(format!("Failed to serialize result: {e}")))?;
    println!("{json}");
    Ok(())
}
