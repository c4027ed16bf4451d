//! Connection manager settings

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables for [`ConnectionManager`](crate::ConnectionManager)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerSettings {
    /// How long a single dial may take before it fails, in milliseconds
    connect_timeout_ms: u64,
    /// Capacity of the notice broadcast channel; slow subscribers that fall
    /// further behind than this lose the oldest notices
    notice_buffer: usize,
}

impl ManagerSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the dial timeout in milliseconds
    pub fn with_connect_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.connect_timeout_ms = timeout_ms;
        self
    }

    /// Set the notice channel capacity (at least 1)
    pub fn with_notice_buffer(mut self, capacity: usize) -> Self {
        self.notice_buffer = capacity.max(1);
        self
    }

    /// Get the dial timeout as a Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn notice_buffer(&self) -> usize {
        self.notice_buffer.max(1)
    }
}

impl Default for ManagerSettings {
    /// Defaults:
    /// - connect_timeout: 5 seconds
    /// - notice_buffer: 256
    fn default() -> Self {
        Self {
            connect_timeout_ms: 5_000,
            notice_buffer: 256,
        }
    }
}
