//! Connection-related data models.
//!
//! This module defines the backend dialects and the per-identity connection
//! configuration handed over by the ORM runtime.

use crate::config::PoolOptions;
use crate::error::{DbError, DbResult};
use serde::{Deserialize, Serialize};
use url::Url;

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Db2,
    /// Legacy variant of the adapter
    Postgres,
}

impl Dialect {
    /// Get the display name for this dialect.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Db2 => "DB2",
            Self::Postgres => "PostgreSQL",
        }
    }

    /// Get the default port for this dialect.
    pub fn default_port(&self) -> u16 {
        match self {
            Self::Db2 => 50000,
            Self::Postgres => 5432,
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl std::str::FromStr for Dialect {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "db2" | "ibm_db" => Ok(Self::Db2),
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            other => Err(DbError::configuration(format!("Unknown dialect: {}", other))),
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

/// Configuration for one registered connection identity.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    #[serde(default)]
    pub identity: String,
    #[serde(default)]
    pub dialect: Dialect,
    #[serde(default = "default_host")]
    pub host: String,
    /// Defaults to the dialect's port when absent
    #[serde(default)]
    pub port: Option<u16>,
    pub database: String,
    #[serde(default, alias = "user")]
    pub username: String,
    /// Contains sensitive data - never log
    #[serde(default, skip_serializing)]
    pub password: String,
    #[serde(default, alias = "pool")]
    pub use_pool: bool,
    #[serde(default)]
    pub pool_options: PoolOptions,
}

impl ConnectionConfig {
    /// Create a configuration with default host, port and no pool.
    pub fn new(
        identity: impl Into<String>,
        dialect: Dialect,
        database: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            identity: identity.into(),
            dialect,
            host: default_host(),
            port: None,
            database: database.into(),
            username: username.into(),
            password: password.into(),
            use_pool: false,
            pool_options: PoolOptions::default(),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Enable the shared pool for this identity.
    pub fn with_pool(mut self, pool_options: PoolOptions) -> Self {
        self.use_pool = true;
        self.pool_options = pool_options;
        self
    }

    /// Port to connect to, falling back to the dialect default.
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.dialect.default_port())
    }

    /// Check the configuration before it enters the registry.
    pub fn validate(&self) -> DbResult<()> {
        if self.identity.trim().is_empty() {
            return Err(DbError::IdentityMissing);
        }
        if self.use_pool {
            self.pool_options.validate().map_err(DbError::configuration)?;
        }
        Ok(())
    }

    /// Assemble the backend-specific connection string.
    ///
    /// Built fresh for every acquisition; contains credentials.
    pub fn connection_string(&self) -> DbResult<String> {
        match self.dialect {
            Dialect::Db2 => Ok(self.db2_connection_string(&self.password)),
            Dialect::Postgres => self.postgres_url(&self.password),
        }
    }

    /// Get a display-safe version of the connection string (password masked).
    pub fn masked_connection_string(&self) -> String {
        match self.dialect {
            Dialect::Db2 => self.db2_connection_string("****"),
            Dialect::Postgres => self
                .postgres_url("****")
                .unwrap_or_else(|_| format!("postgres://{}@{}", self.username, self.host)),
        }
    }

    fn db2_connection_string(&self, password: &str) -> String {
        [
            format!("DATABASE={}", self.database),
            format!("HOSTNAME={}", self.host),
            format!("UID={}", self.username),
            format!("PWD={}", password),
            format!("PORT={}", self.effective_port()),
            "PROTOCOL=TCPIP".to_string(),
        ]
        .join(";")
    }

    fn postgres_url(&self, password: &str) -> DbResult<String> {
        let mut url = Url::parse(&format!(
            "postgres://{}:{}",
            self.host,
            self.effective_port()
        ))
        .map_err(|e| DbError::configuration(format!("Invalid host '{}': {}", self.host, e)))?;

        url.set_path(&self.database);
        if !self.username.is_empty() {
            url.set_username(&self.username)
                .map_err(|_| DbError::configuration("Username cannot be set on this URL"))?;
            if !password.is_empty() {
                url.set_password(Some(password))
                    .map_err(|_| DbError::configuration("Password cannot be set on this URL"))?;
            }
        }
        Ok(url.to_string())
    }
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("identity", &self.identity)
            .field("dialect", &self.dialect)
            .field("host", &self.host)
            .field("port", &self.effective_port())
            .field("database", &self.database)
            .field("username", &self.username)
            .field("use_pool", &self.use_pool)
            .finish_non_exhaustive()
    }
}
