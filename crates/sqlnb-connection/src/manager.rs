//! Connection manager for handling live connections
//!
//! One cache entry per [`ConnectionKey`]. The first request for a key dials;
//! requests that arrive while that dial is in flight join it; every later
//! request gets the cached client back untouched. Entries leave the cache
//! only through [`ConnectionManager::close_connection`],
//! [`ConnectionManager::close_all`], or when the driver reports that the
//! session died.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures::FutureExt;
use futures::future::join_all;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sqlnb_core::{
    Connection, ConnectionConfig, ConnectionEvent, ConnectionKey, DatabaseDriver, DialParams,
    EventSink, Notice, Result, SqlnbError,
};
use tokio::sync::{broadcast, mpsc};

use crate::pool::{CacheStats, DialFuture, PooledConnection, Slot};
use crate::{ManagerSettings, SecretStore};


/// A server notice tagged with the connection it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyedNotice {
    pub key: ConnectionKey,
    pub notice: Notice,
}

struct Inner {
    driver: Arc<dyn DatabaseDriver>,
    secrets: Arc<dyn SecretStore>,
    settings: ManagerSettings,
    /// Only shared mutable state; never held across an await
    slots: Mutex<HashMap<ConnectionKey, Slot>>,
    next_generation: AtomicU64,
    notices: broadcast::Sender<KeyedNotice>,
}

/// Manages live database connections
///
/// Cloning is cheap and every clone shares the same cache. There is no
/// global instance: the host creates one, hands it to whatever needs to
/// run queries, and calls [`close_all`](Self::close_all) on teardown.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    /// Create a new connection manager
    pub fn new(
        driver: Arc<dyn DatabaseDriver>,
        secrets: Arc<dyn SecretStore>,
        settings: ManagerSettings,
    ) -> Self {
        let (notices, _) = broadcast::channel(settings.notice_buffer());
        tracing::debug!(
            driver = driver.name(),
            connect_timeout_ms = settings.connect_timeout().as_millis() as u64,
            "connection manager created"
        );
        Self {
            inner: Arc::new(Inner {
                driver,
                secrets,
                settings,
                slots: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(0),
                notices,
            }),
        }
    }

    pub fn settings(&self) -> &ManagerSettings {
        &self.inner.settings
    }

    /// Get a ready client for `config`, dialing if nothing is cached
    ///
    /// A cached client is returned without checking that it is still
    /// alive; a session that died silently surfaces on its next query.
    #[tracing::instrument(skip(self, config), fields(key = %config.key()))]
    pub async fn get_connection(&self, config: &ConnectionConfig) -> Result<Arc<dyn Connection>> {
        config.validate()?;
        let key = config.key();

        let dial = {
            let mut slots = self.inner.slots.lock();
            match slots.get(&key) {
                Some(Slot::Live(pooled)) => {
                    tracing::debug!(generation = pooled.generation(), "reusing cached connection");
                    return Ok(pooled.client().clone());
                }
                Some(Slot::Pending { generation, dial }) => {
                    tracing::debug!(generation = *generation, "joining in-flight dial");
                    dial.clone()
                }
                None => {
                    let generation = self.inner.next_generation.fetch_add(1, Ordering::SeqCst);
                    let dial = self.start_dial(config.clone(), generation);
                    slots.insert(
                        key,
                        Slot::Pending {
                            generation,
                            dial: dial.clone(),
                        },
                    );
                    dial
                }
            }
        };

        dial.await.map(|pooled| pooled.client().clone())
    }

    /// Close and evict the connection for `config`
    ///
    /// Does nothing if no connection is cached. Queries still running on
    /// the client are not waited for.
    #[tracing::instrument(skip(self, config), fields(key = %config.key()))]
    pub async fn close_connection(&self, config: &ConnectionConfig) -> Result<()> {
        let slot = self.inner.slots.lock().remove(&config.key());
        let Some(slot) = slot else {
            tracing::debug!("no cached connection to close");
            return Ok(());
        };

        tracing::info!(generation = slot.generation(), "closing connection");
        match slot.close().await {
            Some(result) => result.inspect_err(|e| {
                tracing::error!(error = %e, "failed to close connection");
            }),
            None => Ok(()),
        }
    }

    /// Close every cached connection and empty the cache
    ///
    /// Best effort: a client that fails to close is logged and skipped.
    /// Returns the number of clients that were torn down.
    #[tracing::instrument(skip(self))]
    pub async fn close_all(&self) -> usize {
        let slots: Vec<(ConnectionKey, Slot)> = self.inner.slots.lock().drain().collect();
        if slots.is_empty() {
            tracing::debug!("no cached connections to close");
            return 0;
        }

        let outcomes = join_all(
            slots
                .into_iter()
                .map(|(key, slot)| async move { (key, slot.close().await) }),
        )
        .await;

        let mut closed = 0;
        for (key, outcome) in outcomes {
            match outcome {
                Some(Ok(())) => closed += 1,
                Some(Err(e)) => {
                    closed += 1;
                    tracing::warn!(key = %key, error = %e, "failed to close connection, ignoring");
                }
                None => {}
            }
        }

        tracing::info!(closed, "closed all connections");
        closed
    }

    /// Check if a live connection is cached for `config`
    pub fn is_cached(&self, config: &ConnectionConfig) -> bool {
        matches!(
            self.inner.slots.lock().get(&config.key()),
            Some(Slot::Live(_))
        )
    }

    /// Snapshot of every live connection in the cache
    ///
    /// The entries share state with the cache, so an entry that is later
    /// closed or evicted reports [`ConnectionState::Closed`](crate::ConnectionState::Closed).
    pub fn connections(&self) -> Vec<PooledConnection> {
        let mut live: Vec<PooledConnection> = self
            .inner
            .slots
            .lock()
            .values()
            .filter_map(|slot| match slot {
                Slot::Live(pooled) => Some(pooled.clone()),
                Slot::Pending { .. } => None,
            })
            .collect();
        live.sort_by(|a, b| a.key().cmp(b.key()));
        live
    }

    /// Get current cache statistics
    pub fn stats(&self) -> CacheStats {
        let slots = self.inner.slots.lock();
        let pending = slots.values().filter(|slot| slot.is_pending()).count();
        CacheStats::new(slots.len() - pending, pending)
    }

    /// Receive notices from every connection this manager owns
    pub fn subscribe_notices(&self) -> broadcast::Receiver<KeyedNotice> {
        self.inner.notices.subscribe()
    }

    /// Start a dial on its own task
    ///
    /// The task settles the slot even if every caller awaiting it is
    /// dropped, so an abandoned dial never stays pending.
    fn start_dial(&self, config: ConnectionConfig, generation: u64) -> DialFuture {
        let inner = Arc::downgrade(&self.inner);
        let driver = self.inner.driver.clone();
        let secrets = self.inner.secrets.clone();
        let settings = self.inner.settings.clone();

        let key = config.key();
        let task = tokio::spawn({
            let inner = inner.clone();
            let key = key.clone();
            async move {
                let result =
                    dial(driver, secrets, &settings, &config, generation, inner.clone()).await;

                // The slot may have been closed or replaced while dialing
                if let Some(inner) = inner.upgrade() {
                    inner.settle(&key, generation, &result);
                }
                result
            }
        });

        async move {
            match task.await {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(key = %key, generation, error = %e, "dial task failed");
                    let result = Err(SqlnbError::Other(format!("dial task failed: {e}")));
                    if let Some(inner) = inner.upgrade() {
                        inner.settle(&key, generation, &result);
                    }
                    result
                }
            }
        }
        .boxed()
        .shared()
    }
}

impl Inner {
    /// Record the outcome of a dial in its slot
    fn settle(&self, key: &ConnectionKey, generation: u64, result: &Result<PooledConnection>) {
        let mut slots = self.slots.lock();
        let still_pending = matches!(
            slots.get(key),
            Some(Slot::Pending { generation: g, .. }) if *g == generation
        );
        if !still_pending {
            tracing::debug!(key = %key, generation, "dial finished for a slot that is gone");
            return;
        }

        match result {
            Ok(pooled) => {
                slots.insert(key.clone(), Slot::Live(pooled.clone()));
            }
            Err(_) => {
                slots.remove(key);
            }
        }
    }

    /// Remove `key` if it still belongs to `generation`
    fn evict(&self, key: &ConnectionKey, generation: u64) -> Option<Slot> {
        let mut slots = self.slots.lock();
        match slots.get(key) {
            Some(slot) if slot.generation() == generation => slots.remove(key),
            _ => None,
        }
    }

    fn publish_notice(&self, key: &ConnectionKey, notice: Notice) {
        tracing::debug!(key = %key, notice = %notice, "server notice");
        // No subscribers is fine
        let _ = self.notices.send(KeyedNotice {
            key: key.clone(),
            notice,
        });
    }
}

/// Open a session for `config` and start listening to its events
async fn dial(
    driver: Arc<dyn DatabaseDriver>,
    secrets: Arc<dyn SecretStore>,
    settings: &ManagerSettings,
    config: &ConnectionConfig,
    generation: u64,
    inner: Weak<Inner>,
) -> Result<PooledConnection> {
    let key = config.key();
    let password = secrets.get_password(&config.id)?;
    let params = DialParams::from_config(config, password, settings.connect_timeout());
    let (events, receiver) = EventSink::channel();

    tracing::info!(
        host = %params.host,
        port = params.port,
        database = %params.database,
        generation,
        "dialing database"
    );

    let client = match tokio::time::timeout(params.connect_timeout, driver.connect(&params, events))
        .await
    {
        Ok(Ok(client)) => client,
        Ok(Err(e)) => {
            tracing::error!(error = %e, "failed to connect");
            return Err(e);
        }
        Err(_) => {
            tracing::error!(timeout = ?params.connect_timeout, "connect timed out");
            return Err(SqlnbError::Timeout(format!(
                "Connecting to {}:{} timed out after {:?}",
                params.host, params.port, params.connect_timeout
            )));
        }
    };

    spawn_event_listener(inner, key.clone(), generation, receiver);
    tracing::info!(generation, "connection established");
    Ok(PooledConnection::new(key, client, generation))
}

/// React to what the driver reports about one session
///
/// Notices are re-broadcast; a fatal or closing event evicts the entry so
/// the next request dials again. The query that was running when the
/// session died fails on its own and is not retried here.
fn spawn_event_listener(
    inner: Weak<Inner>,
    key: ConnectionKey,
    generation: u64,
    mut events: mpsc::UnboundedReceiver<ConnectionEvent>,
) {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let Some(manager) = inner.upgrade() else {
                return;
            };

            match event {
                ConnectionEvent::Notice(notice) => manager.publish_notice(&key, notice),
                ConnectionEvent::Fatal(reason) => {
                    tracing::warn!(key = %key, generation, reason = %reason, "connection lost, evicting");
                    evict_and_close(&manager, &key, generation).await;
                    return;
                }
                ConnectionEvent::Closed => {
                    tracing::debug!(key = %key, generation, "connection ended, evicting");
                    evict_and_close(&manager, &key, generation).await;
                    return;
                }
            }
        }
    });
}

async fn evict_and_close(inner: &Inner, key: &ConnectionKey, generation: u64) {
    let Some(slot) = inner.evict(key, generation) else {
        return;
    };
    if let Some(Err(e)) = slot.close().await {
        tracing::debug!(key = %key, error = %e, "closing a dead connection failed");
    }
}
