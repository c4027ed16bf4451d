//! Database driver trait definition

use crate::{Connection, ConnectionConfig, EventSink, Result};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Everything a driver needs to open a session
#[derive(Clone)]
pub struct DialParams {
    pub host: String,
    pub port: u16,
    pub username: String,
    /// Resolved from the secret store, never from the saved configuration
    pub password: Option<String>,
    pub database: String,
    /// Upper bound for establishing the session
    pub connect_timeout: Duration,
}

impl DialParams {
    /// Build dial parameters from a connection configuration
    pub fn from_config(
        config: &ConnectionConfig,
        password: Option<String>,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            username: config.username.clone(),
            password,
            database: config.database.clone(),
            connect_timeout,
        }
    }
}

impl fmt::Debug for DialParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("database", &self.database)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

/// A database driver that can open sessions
#[async_trait]
pub trait DatabaseDriver: Send + Sync {
    /// Get the driver name (e.g. "postgres")
    fn name(&self) -> &'static str;

    /// Open a session
    ///
    /// Once this returns `Ok`, anything that later happens to the session
    /// on its own (server notices, the server terminating it, the socket
    /// dropping) must be reported through `events`.
    async fn connect(
        &self,
        params: &DialParams,
        events: EventSink,
    ) -> Result<Arc<dyn Connection>>;
}
