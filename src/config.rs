//! Configuration handling for the `sails-db2` command line tool.
//!
//! The adapter itself receives its configuration from the ORM runtime as
//! [`ConnectionConfig`] values; this module only covers the pool defaults
//! shared by both and the CLI arguments / environment variables.

use crate::error::{DbError, DbResult};
use crate::models::{CollectionSchema, ConnectionConfig, Dialect, FindOptions};
use clap::{Parser, Subcommand, ValueEnum};
use std::collections::HashMap;
use std::path::PathBuf;

pub const DEFAULT_IDENTITY: &str = "default";
pub const DEFAULT_HOST: &str = "localhost";

// Pool configuration defaults
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_MIN_CONNECTIONS: u32 = 0;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// Connection pool configuration options.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolOptions {
    /// Maximum connections in pool (default: 10)
    pub max_connections: Option<u32>,
    /// Minimum connections in pool (default: 0)
    pub min_connections: Option<u32>,
    /// Idle timeout in seconds (default: 600)
    pub idle_timeout_secs: Option<u64>,
    /// Connection acquire timeout in seconds (default: 30)
    pub acquire_timeout_secs: Option<u64>,
    /// Whether to test connections before use (default: true)
    pub test_before_acquire: Option<bool>,
}

impl PoolOptions {
    /// Get max_connections with default value.
    pub fn max_connections_or_default(&self) -> u32 {
        self.max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS)
    }

    /// Get min_connections with default value.
    pub fn min_connections_or_default(&self) -> u32 {
        self.min_connections.unwrap_or(DEFAULT_MIN_CONNECTIONS)
    }

    /// Get idle_timeout with default value.
    pub fn idle_timeout_or_default(&self) -> u64 {
        self.idle_timeout_secs.unwrap_or(DEFAULT_IDLE_TIMEOUT_SECS)
    }

    /// Get acquire_timeout with default value.
    pub fn acquire_timeout_or_default(&self) -> u64 {
        self.acquire_timeout_secs
            .unwrap_or(DEFAULT_ACQUIRE_TIMEOUT_SECS)
    }

    /// Get test_before_acquire with default value.
    pub fn test_before_acquire_or_default(&self) -> bool {
        self.test_before_acquire.unwrap_or(true)
    }

    /// Validate pool options and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(max) = self.max_connections {
            if max == 0 {
                return Err("max_connections must be greater than 0".to_string());
            }
        }
        if let (Some(min), Some(max)) = (self.min_connections, self.max_connections) {
            if min > max {
                return Err(format!(
                    "min_connections ({}) cannot exceed max_connections ({})",
                    min, max
                ));
            }
        }
        if self.acquire_timeout_secs == Some(0) {
            return Err("acquire_timeout must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Operations that `plan` can render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PlanOperation {
    Find,
    Create,
    Update,
    Destroy,
    Define,
    Drop,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Print the SQL and parameters for an operation without connecting
    Plan {
        /// Collection name (must exist in the schema file)
        collection: String,
        #[arg(value_enum)]
        operation: PlanOperation,
        /// Criteria object as JSON: {"where": {...}, "sort": {...}, "limit": n}
        #[arg(long)]
        criteria: Option<String>,
        /// Values object as JSON, for create and update
        #[arg(long)]
        values: Option<String>,
    },
    /// Describe a table
    Describe { collection: String },
    /// Run a raw SQL statement and print the rows
    Query {
        sql: String,
        /// Positional parameter as JSON; may be repeated
        #[arg(long = "param", value_name = "JSON")]
        params: Vec<String>,
    },
}

/// Configuration for the `sails-db2` tool.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "sails-db2",
    about = "Inspect and exercise the DB2 Waterline adapter from the command line",
    version,
    author
)]
pub struct Config {
    /// Connection identity to register
    #[arg(long, default_value = DEFAULT_IDENTITY, env = "SAILS_DB2_IDENTITY")]
    pub identity: String,

    /// SQL dialect (db2 or postgres)
    #[arg(long, default_value = "db2", env = "SAILS_DB2_DIALECT")]
    pub dialect: Dialect,

    #[arg(long, default_value = DEFAULT_HOST, env = "SAILS_DB2_HOST")]
    pub host: String,

    /// Defaults to 50000 for DB2 and 5432 for PostgreSQL
    #[arg(long, env = "SAILS_DB2_PORT")]
    pub port: Option<u16>,

    #[arg(long, default_value = "", env = "SAILS_DB2_DATABASE")]
    pub database: String,

    #[arg(long, default_value = "", env = "SAILS_DB2_USER")]
    pub user: String,

    #[arg(long, default_value = "", env = "SAILS_DB2_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Share a connection pool across operations
    #[arg(long, env = "SAILS_DB2_POOL")]
    pub pool: bool,

    #[arg(long, env = "SAILS_DB2_MAX_CONNECTIONS")]
    pub max_connections: Option<u32>,

    #[arg(long, env = "SAILS_DB2_ACQUIRE_TIMEOUT")]
    pub acquire_timeout: Option<u64>,

    /// JSON file mapping collection names to schemas
    #[arg(long, env = "SAILS_DB2_SCHEMA")]
    pub schema: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "SAILS_DB2_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "SAILS_DB2_JSON_LOGS")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Config {
    /// Parse configuration from command line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            max_connections: self.max_connections,
            acquire_timeout_secs: self.acquire_timeout,
            ..PoolOptions::default()
        }
    }

    /// Build the connection configuration described by the arguments.
    pub fn connection_config(&self) -> ConnectionConfig {
        let mut config = ConnectionConfig::new(
            &self.identity,
            self.dialect,
            &self.database,
            &self.user,
            &self.password,
        )
        .with_host(&self.host);

        if let Some(port) = self.port {
            config = config.with_port(port);
        }
        if self.pool {
            config = config.with_pool(self.pool_options());
        }
        config
    }

    /// Load collection schemas from the `--schema` file, if any.
    pub fn load_collections(&self) -> DbResult<HashMap<String, CollectionSchema>> {
        match &self.schema {
            Some(path) => load_collections(path),
            None => Ok(HashMap::new()),
        }
    }
}

/// Read a JSON file of `{collection: {tableName?, attributes}}`.
pub fn load_collections(path: &std::path::Path) -> DbResult<HashMap<String, CollectionSchema>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        DbError::configuration(format!("Cannot read schema file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        DbError::configuration(format!("Invalid schema file {}: {}", path.display(), e))
    })
}

/// Parse a `--criteria` argument.
pub fn parse_criteria(raw: Option<&str>) -> DbResult<FindOptions> {
    match raw {
        Some(raw) => serde_json::from_str(raw)
            .map_err(|e| DbError::invalid_input(format!("Invalid criteria JSON: {}", e))),
        None => Ok(FindOptions::default()),
    }
}

/// Parse a `--values` argument into a JSON object.
pub fn parse_values(raw: Option<&str>) -> DbResult<serde_json::Map<String, serde_json::Value>> {
    match raw {
        Some(raw) => serde_json::from_str(raw)
            .map_err(|e| DbError::invalid_input(format!("Invalid values JSON: {}", e))),
        None => Ok(serde_json::Map::new()),
    }
}
