//! Error types for sqlnb

use thiserror::Error;

/// Core error type for sqlnb operations
///
/// Payloads are plain strings so the error is `Clone`: a single failed dial
/// is handed to every caller that was waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SqlnbError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Stale connection: {0}")]
    StaleConnection(String),

    /// A statement was rejected by the server
    #[error("Query error: {message}")]
    Query {
        message: String,
        /// SQLSTATE or other server error code, when the driver reports one
        code: Option<String>,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Security error: {0}")]
    Security(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("{0}")]
    Other(String),
}

impl SqlnbError {
    pub fn query(message: impl Into<String>) -> Self {
        SqlnbError::Query {
            message: message.into(),
            code: None,
        }
    }

    pub fn query_with_code(message: impl Into<String>, code: impl Into<String>) -> Self {
        SqlnbError::Query {
            message: message.into(),
            code: Some(code.into()),
        }
    }

    /// Server error code, if any
    pub fn code(&self) -> Option<&str> {
        match self {
            SqlnbError::Query { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Whether this error means a connection could not be established
    pub fn is_dial_failure(&self) -> bool {
        matches!(self, SqlnbError::Connection(_) | SqlnbError::Timeout(_))
    }

    /// Whether this error means an established connection has gone away
    pub fn is_stale_connection(&self) -> bool {
        matches!(self, SqlnbError::StaleConnection(_))
    }
}

impl From<std::io::Error> for SqlnbError {
    fn from(err: std::io::Error) -> Self {
        SqlnbError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for SqlnbError {
    fn from(err: serde_json::Error) -> Self {
        SqlnbError::Serialization(err.to_string())
    }
}

/// Result type alias for sqlnb operations
pub type Result<T> = std::result::Result<T, SqlnbError>;
