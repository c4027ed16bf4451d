//! PostgreSQL driver implementation

use std::sync::Arc;

use async_trait::async_trait;
use sqlnb_core::{Connection, DatabaseDriver, DialParams, EventSink, Result};

use crate::PostgresConnection;

/// PostgreSQL database driver
pub struct PostgresDriver;

impl PostgresDriver {
    /// Create a new PostgreSQL driver instance
    pub fn new() -> Self {
        tracing::debug!("PostgreSQL driver initialized");
        Self
    }
}

impl Default for PostgresDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseDriver for PostgresDriver {
    fn name(&self) -> &'static str {
        "postgres"
    }

    #[tracing::instrument(skip(self, params, events), fields(host = %params.host, database = %params.database))]
    async fn connect(
        &self,
        params: &DialParams,
        events: EventSink,
    ) -> Result<Arc<dyn Connection>> {
        let conn = PostgresConnection::connect(params, events)
            .await
            .inspect_err(|e| {
                tracing::error!(error = %e, "failed to connect to PostgreSQL database");
            })?;
        Ok(Arc::new(conn))
    }
}
