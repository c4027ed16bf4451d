//! Cache entries for live connections
//!
//! A cache slot is either waiting on a dial that is still in flight or
//! holds a live connection. Callers never see slots directly; they go
//! through [`ConnectionManager`](crate::ConnectionManager).

mod slot;
mod stats;

#[cfg(test)]
mod tests;

pub use slot::{ConnectionState, PooledConnection};
pub(crate) use slot::{DialFuture, Slot};
pub use stats::CacheStats;
