//! Connection identity types

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Result, SqlnbError};

/// Describes the connection a caller wants
///
/// `id` identifies a saved connection; one saved connection fans out into
/// one live client per database the user browses into, so `id` and
/// `database` together select a cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Saved connection identifier
    pub id: String,
    /// Host name or address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Login role
    pub username: String,
    /// Target database
    pub database: String,
    /// Display name
    pub name: String,
}

impl ConnectionConfig {
    /// Create a configuration for `database` on a saved connection
    pub fn new(id: impl Into<String>, database: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            host: "localhost".to_string(),
            port: 5432,
            username: String::new(),
            database: database.into(),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Same saved connection, different database
    pub fn for_database(&self, database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            ..self.clone()
        }
    }

    /// Check the fields the cache key is built from
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(SqlnbError::Configuration(
                "connection id must not be empty".into(),
            ));
        }
        if self.database.trim().is_empty() {
            return Err(SqlnbError::Configuration(format!(
                "database must not be empty for connection '{}'",
                self.id
            )));
        }
        Ok(())
    }

    /// The cache key for this configuration
    pub fn key(&self) -> ConnectionKey {
        ConnectionKey::new(&self.id, &self.database)
    }
}

/// Cache key: saved connection id plus database name
///
/// Compared field by field, so ids or database names containing the
/// display separator can never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionKey {
    id: String,
    database: String,
}

impl ConnectionKey {
    pub fn new(id: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            database: database.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn database(&self) -> &str {
        &self.database
    }
}

impl fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.id, self.database)
    }
}

impl From<&ConnectionConfig> for ConnectionKey {
    fn from(config: &ConnectionConfig) -> Self {
        config.key()
    }
}
