//! sqlnb Connection - Keyed connection cache
//!
//! This crate owns the live database sessions of a notebook: one per
//! saved connection and database, dialed on first use, shared by every
//! concurrent requester, and evicted when the server ends the session.

mod manager;
pub mod pool;
mod settings;
mod storage;

pub use manager::{ConnectionManager, KeyedNotice};
pub use pool::{CacheStats, ConnectionState, PooledConnection};
pub use settings::ManagerSettings;
pub use storage::{InMemorySecretStore, KeyringSecretStore, SecretStore};
