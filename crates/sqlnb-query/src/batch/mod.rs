//! Batch query execution module
//!
//! This module runs the statements of a cell serially against one
//! connection and collects a result, error and notices per statement.

mod executor;
mod notices;
#[cfg(test)]
mod tests;

pub use executor::{
    BatchExecutionResult, BatchExecutor, BatchOptions, BatchResult, StatementError,
    StatementStatus,
};
pub use notices::NoticeFeed;
