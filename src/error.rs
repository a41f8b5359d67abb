//! Error types for the adapter.
//!
//! Every failure the ORM runtime can observe is a [`DbError`]. Configuration
//! errors are raised before any I/O; driver errors are carried through with
//! their SQLSTATE so the executor can recognize "object does not exist".

use thiserror::Error;

/// DB2 SQLSTATE for an undefined object name (SQLCODE -204).
pub const DB2_UNDEFINED_OBJECT: &str = "42704";

/// DB2 SQLCODE for an undefined object name.
pub const DB2_UNDEFINED_OBJECT_CODE: i64 = -204;

/// PostgreSQL SQLSTATE for `undefined_table`.
pub const PG_UNDEFINED_TABLE: &str = "42P01";

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Connection is missing an identity")]
    IdentityMissing,

    #[error("Connection '{identity}' is already registered")]
    IdentityDuplicate { identity: String },

    #[error("Invalid connection: '{identity}' is not registered")]
    InvalidConnection { identity: String },

    #[error("Unknown collection '{collection}' in connection '{identity}'")]
    UnknownCollection {
        identity: String,
        collection: String,
    },

    #[error("Invalid identifier '{name}': expected letters, digits and underscores")]
    InvalidIdentifier { name: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Database error: {message}")]
    Database {
        message: String,
        /// e.g. "42704" for an undefined object on DB2
        sql_state: Option<String>,
        /// Native vendor code (SQLCODE on DB2)
        code: Option<i64>,
    },

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u32,
    },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a duplicate identity error.
    pub fn identity_duplicate(identity: impl Into<String>) -> Self {
        Self::IdentityDuplicate {
            identity: identity.into(),
        }
    }

    /// Create an invalid connection error.
    pub fn invalid_connection(identity: impl Into<String>) -> Self {
        Self::InvalidConnection {
            identity: identity.into(),
        }
    }

    /// Create an unknown collection error.
    pub fn unknown_collection(identity: impl Into<String>, collection: impl Into<String>) -> Self {
        Self::UnknownCollection {
            identity: identity.into(),
            collection: collection.into(),
        }
    }

    pub fn invalid_identifier(name: impl Into<String>) -> Self {
        Self::InvalidIdentifier { name: name.into() }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a statement error as reported by the backend.
    pub fn database(message: impl Into<String>, sql_state: Option<String>, code: Option<i64>) -> Self {
        Self::Database {
            message: message.into(),
            sql_state,
            code,
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed_secs: u32) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }

    /// True when the backend reported that the table (or other object) does
    /// not exist.
    pub fn is_object_not_found(&self) -> bool {
        match self {
            Self::Database {
                sql_state, code, ..
            } => {
                matches!(
                    sql_state.as_deref(),
                    Some(DB2_UNDEFINED_OBJECT) | Some(PG_UNDEFINED_TABLE)
                ) || *code == Some(DB2_UNDEFINED_OBJECT_CODE)
            }
            _ => false,
        }
    }

    /// Configuration errors are raised before any I/O is attempted.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::IdentityMissing
                | Self::IdentityDuplicate { .. }
                | Self::InvalidIdentifier { .. }
                | Self::Configuration { .. }
        )
    }
}

/// Convert sqlx errors to DbError.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::connection(
                msg.to_string(),
                "Check the host, port, database and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let sql_state = db_err.code().map(|c| c.to_string());
                DbError::database(db_err.message(), sql_state, None)
            }
            sqlx::Error::RowNotFound => DbError::database("No rows returned", None, None),
            sqlx::Error::PoolTimedOut => DbError::timeout("connection pool acquire", 30),
            sqlx::Error::PoolClosed => DbError::connection(
                "Connection pool is closed",
                "The connection was torn down; register it again",
            ),
            sqlx::Error::Io(io_err) => DbError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => DbError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => DbError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => DbError::internal(format!("Decode error: {}", source)),
            sqlx::Error::WorkerCrashed => DbError::internal("Database worker crashed"),
            _ => DbError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Result type alias for adapter operations.
pub type DbResult<T> = Result<T, DbError>;
