//! Cache statistics types

use serde::{Deserialize, Serialize};

/// Snapshot of the connection cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CacheStats {
    /// Number of established, cached connections
    live: usize,
    /// Number of keys with a dial in flight
    pending: usize,
}

impl CacheStats {
    pub fn new(live: usize, pending: usize) -> Self {
        Self { live, pending }
    }

    /// Get the number of live connections
    pub fn live(&self) -> usize {
        self.live
    }

    /// Get the number of in-flight dials
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Get the number of occupied cache slots
    pub fn total(&self) -> usize {
        self.live + self.pending
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}
