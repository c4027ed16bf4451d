//! Cache slot state machine

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use futures::future::{BoxFuture, Shared};
use serde::{Deserialize, Serialize};
use sqlnb_core::{Connection, ConnectionKey, Result};

/// A dial every concurrent requester of the same key awaits together
pub(crate) type DialFuture = Shared<BoxFuture<'static, Result<PooledConnection>>>;

/// Lifecycle state of a pooled connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Cached and handed out on request
    Live,
    /// Torn down and evicted
    Closed,
}

/// A cached connection and the metadata the manager keeps about it
///
/// Clones share their lifecycle state: once the manager closes or evicts
/// the entry, every clone (including snapshots handed out by
/// [`ConnectionManager::connections`](crate::ConnectionManager::connections))
/// reports [`ConnectionState::Closed`].
#[derive(Clone)]
pub struct PooledConnection {
    key: ConnectionKey,
    client: Arc<dyn Connection>,
    /// Distinguishes this connection from earlier or later ones under the same key
    generation: u64,
    closed: Arc<AtomicBool>,
    created_at: Instant,
}

impl PooledConnection {
    pub(crate) fn new(key: ConnectionKey, client: Arc<dyn Connection>, generation: u64) -> Self {
        Self {
            key,
            client,
            generation,
            closed: Arc::new(AtomicBool::new(false)),
            created_at: Instant::now(),
        }
    }

    pub fn key(&self) -> &ConnectionKey {
        &self.key
    }

    pub fn client(&self) -> &Arc<dyn Connection> {
        &self.client
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn state(&self) -> ConnectionState {
        if self.closed.load(Ordering::SeqCst) {
            ConnectionState::Closed
        } else {
            ConnectionState::Live
        }
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// End the underlying session and mark the entry closed
    ///
    /// Only the first call reaches the client; later calls on this entry
    /// or any of its clones return `Ok(())`.
    pub(crate) async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::debug!(key = %self.key, generation = self.generation, "closing pooled connection");
        self.client.close().await
    }
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("key", &self.key)
            .field("driver", &self.client.driver_name())
            .field("generation", &self.generation)
            .field("state", &self.state())
            .finish()
    }
}

/// One entry in the connection cache
pub(crate) enum Slot {
    /// A dial is in flight; every requester joins it
    Pending { generation: u64, dial: DialFuture },
    /// The connection is established and reused as-is
    Live(PooledConnection),
}

impl Slot {
    pub(crate) fn generation(&self) -> u64 {
        match self {
            Slot::Pending { generation, .. } => *generation,
            Slot::Live(pooled) => pooled.generation(),
        }
    }

    pub(crate) fn is_pending(&self) -> bool {
        matches!(self, Slot::Pending { .. })
    }

    /// Tear the slot down
    ///
    /// Returns `None` when there was no connection to close, i.e. the slot
    /// was pending and its dial failed.
    pub(crate) async fn close(self) -> Option<Result<()>> {
        let pooled = match self {
            Slot::Live(pooled) => pooled,
            Slot::Pending { dial, .. } => match dial.await {
                Ok(pooled) => pooled,
                Err(_) => return None,
            },
        };
        Some(pooled.close().await)
    }
}
