//! sqlnb Query - statement splitting and serial execution
//!
//! This crate turns the text of a notebook cell into individual
//! statements and runs them one at a time on a managed connection.

pub mod batch;
mod cell;
mod splitter;

pub use batch::{
    BatchExecutionResult, BatchExecutor, BatchOptions, BatchResult, NoticeFeed, StatementError,
    StatementStatus,
};
pub use cell::run_cell;
pub use splitter::split_statements;
