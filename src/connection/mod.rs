//! Named connection resolution.
//!
//! Turns a connection name (or the `"default"` sentinel) into a
//! [`ConnectionConfig`] and owns the client it opens for a single call.

use crate::config::{Config, ConnectionConfig};
use crate::db::DatabaseClient;
use crate::error::{GatewayError, Result};
use tracing::{debug, warn};

/// Name that resolves to the configured default connection.
pub const DEFAULT_CONNECTION: &str = "default";

/// A connection name paired with its resolved configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConnection {
    pub name: String,
    pub config: ConnectionConfig,
}

/// Resolves connection names against the config file and environment.
#[derive(Debug, Clone, Default)]
pub struct ConnectionResolver {
    config: Config,
    url_override: Option<String>,
    database_url: Option<String>,
}

impl ConnectionResolver {
    /// Creates a resolver that only consults the config file.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            url_override: None,
            database_url: None,
        }
    }

    /// Creates a resolver that also falls back to `DATABASE_URL`.
    pub fn from_env(config: Config) -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL").ok(),
            ..Self::new(config)
        }
    }

    /// Uses `url` for every name, bypassing the config file.
    pub fn with_url(mut self, url: Option<String>) -> Self {
        self.url_override = url;
        self
    }

    /// Resolves `name` (default: `"default"`) to a connection config.
    pub fn resolve(&self, name: Option<&str>) -> Result<ResolvedConnection> {
        let name = name.unwrap_or(DEFAULT_CONNECTION);

        let mut config = if let Some(url) = &self.url_override {
            ConnectionConfig::from_connection_string(url)?
        } else if name == DEFAULT_CONNECTION {
            self.resolve_default()?
        } else {
            self.config.get_connection(name).cloned().ok_or_else(|| {
                GatewayError::config(format!("Connection '{name}' not found in config file"))
            })?
        };

        config.apply_env_defaults();
        debug!("Resolved connection '{}' to {}", name, config.display_string());

        Ok(ResolvedConnection {
            name: name.to_string(),
            config,
        })
    }

    fn resolve_default(&self) -> Result<ConnectionConfig> {
        if let Some(target) = &self.config.default_connection {
            return self.config.get_connection(target).cloned().ok_or_else(|| {
                GatewayError::config(format!(
                    "Default connection '{target}' not found in config file"
                ))
            });
        }

        if let Some(config) = self.config.get_connection(DEFAULT_CONNECTION) {
            return Ok(config.clone());
        }

        match &self.database_url {
            Some(url) => ConnectionConfig::from_connection_string(url),
            None => Err(GatewayError::config(
                "No default connection configured. Set default_connection, add \
                 [connections.default] or set DATABASE_URL",
            )),
        }
    }

    /// Resolves and connects.
    pub async fn open(&self, name: Option<&str>) -> Result<OpenConnection> {
        let resolved = self.resolve(name)?;
        let client = crate::db::connect(&resolved.config).await?;
        Ok(OpenConnection {
            name: resolved.name,
            client,
        })
    }
}

/// A client opened for one call. Close it when the call returns.
pub struct OpenConnection {
    name: String,
    client: Box<dyn DatabaseClient>,
}

impl OpenConnection {
    /// The name the caller asked for.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn client(&self) -> &dyn DatabaseClient {
        self.client.as_ref()
    }

    /// Closes the client. Close failures are logged, not returned.
    pub async fn close(self) {
        if let Err(e) = self.client.close().await {
            warn!("Failed to close connection '{}': {}", self.name, e);
        }
    }
}

impl std::fmt::Debug for OpenConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenConnection")
            .field("name", &self.name)
            .field("backend", &self.client.backend())
            .finish()
    }
}
