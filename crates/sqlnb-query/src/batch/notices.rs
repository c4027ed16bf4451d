//! Per-cell view of the manager's notice stream

use sqlnb_connection::KeyedNotice;
use sqlnb_core::{ConnectionKey, Notice};
use tokio::sync::broadcast::{self, error::TryRecvError};

/// Notices for one connection, collected between statements
pub struct NoticeFeed {
    key: ConnectionKey,
    receiver: broadcast::Receiver<KeyedNotice>,
}

impl NoticeFeed {
    pub fn new(key: ConnectionKey, receiver: broadcast::Receiver<KeyedNotice>) -> Self {
        Self { key, receiver }
    }

    pub fn key(&self) -> &ConnectionKey {
        &self.key
    }

    /// Take every notice received so far without waiting
    ///
    /// Notices from other connections are discarded.
    pub fn drain(&mut self) -> Vec<Notice> {
        let mut notices = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(keyed) if keyed.key == self.key => notices.push(keyed.notice),
                Ok(_) => {}
                Err(TryRecvError::Lagged(missed)) => {
                    tracing::warn!(key = %self.key, missed, "notice feed fell behind, notices lost");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        notices
    }
}
