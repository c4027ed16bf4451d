//! sqlnb core - shared abstractions for the SQL notebook backend
//!
//! This crate provides the types every other sqlnb crate depends on:
//!
//! - `ConnectionConfig` / `ConnectionKey` - which database a caller wants
//! - `DatabaseDriver` - trait for opening sessions
//! - `Connection` - trait for a live session
//! - `ConnectionEvent` / `EventSink` - what a session reports after it opens
//! - `Value`, `Row`, `QueryResult` - opaque results handed back to callers
//! - `SqlnbError` - the error taxonomy

mod config;
mod connection;
mod driver;
mod error;
mod events;
mod types;

pub use config::*;
pub use connection::*;
pub use driver::*;
pub use error::*;
pub use events::*;
pub use types::*;
