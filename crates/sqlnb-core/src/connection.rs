//! Connection trait

use crate::{QueryResult, Result};
use async_trait::async_trait;

/// A live database session
///
/// Handed out as `Arc<dyn Connection>` and shared by every caller that asks
/// the connection manager for the same key. Implementations must tolerate
/// concurrent calls; ordering between statements is the caller's concern.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Get the driver name (e.g. "postgres")
    fn driver_name(&self) -> &str;

    /// Run one statement and return whatever it produced
    ///
    /// Commands without a row set return a result with no columns and the
    /// affected row count filled in.
    async fn query(&self, sql: &str) -> Result<QueryResult>;

    /// End the session
    ///
    /// Calling this more than once is a no-op.
    async fn close(&self) -> Result<()>;

    /// Check if the session has ended, either through `close` or because
    /// the server went away
    fn is_closed(&self) -> bool;
}
