//! Batch query executor implementation
//!
//! Runs the statements of one cell strictly one after another on a single
//! connection. Every statement gets its own result, so a failure is
//! reported against the statement that caused it and the rest of the cell
//! still runs.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use sqlnb_core::{Connection, Notice, QueryResult, SqlnbError};

use super::notices::NoticeFeed;

/// Configuration options for batch execution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchOptions {
    /// Stop at the first failed statement and skip the rest.
    /// Off by default: each statement reports independently.
    pub stop_on_error: bool,
}

impl BatchOptions {
    /// Create new batch options with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable stop on error behavior
    pub fn with_stop_on_error(mut self, stop: bool) -> Self {
        self.stop_on_error = stop;
        self
    }
}

/// Status of a single statement in the batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatementStatus {
    /// Statement executed successfully
    Success,
    /// Statement failed with an error
    Failed,
    /// Statement was skipped (due to stop_on_error)
    Skipped,
}

/// Error information for a failed statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementError {
    /// Error message
    pub message: String,
    /// Error code (if available from database)
    pub code: Option<String>,
}

impl StatementError {
    /// Create a new statement error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    /// Create a statement error with a code
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl From<SqlnbError> for StatementError {
    fn from(err: SqlnbError) -> Self {
        let error = Self::new(err.to_string());
        match err.code() {
            Some(code) => error.with_code(code),
            None => error,
        }
    }
}

impl std::fmt::Display for StatementError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(code) = &self.code {
            write!(f, "[{}] {}", code, self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

/// Result of executing a single statement in the batch
#[derive(Debug, Clone)]
pub struct BatchResult {
    /// Index of this statement in the batch (0-based)
    pub index: usize,
    /// The SQL that was executed
    pub sql: String,
    /// Status of execution
    pub status: StatementStatus,
    /// What the server returned, for statements that succeeded
    pub query_result: Option<QueryResult>,
    /// Error details (if status is Failed)
    pub error: Option<StatementError>,
    /// Server notices raised while the statement ran
    pub notices: Vec<Notice>,
    /// Execution time for this statement
    pub execution_time: Duration,
}

impl BatchResult {
    /// Create a successful result
    pub fn success(index: usize, sql: String, result: QueryResult, duration: Duration) -> Self {
        Self {
            index,
            sql,
            status: StatementStatus::Success,
            query_result: Some(result),
            error: None,
            notices: Vec::new(),
            execution_time: duration,
        }
    }

    /// Create a failed result
    pub fn failed(index: usize, sql: String, error: StatementError, duration: Duration) -> Self {
        Self {
            index,
            sql,
            status: StatementStatus::Failed,
            query_result: None,
            error: Some(error),
            notices: Vec::new(),
            execution_time: duration,
        }
    }

    /// Create a skipped result
    pub fn skipped(index: usize, sql: String) -> Self {
        Self {
            index,
            sql,
            status: StatementStatus::Skipped,
            query_result: None,
            error: None,
            notices: Vec::new(),
            execution_time: Duration::ZERO,
        }
    }

    pub fn with_notices(mut self, notices: Vec<Notice>) -> Self {
        self.notices = notices;
        self
    }

    /// Rows affected, for statements that report a count
    pub fn affected_rows(&self) -> u64 {
        self.query_result
            .as_ref()
            .map(|result| result.affected_rows)
            .unwrap_or(0)
    }

    /// Check if this result represents a successful execution
    pub fn is_success(&self) -> bool {
        self.status == StatementStatus::Success
    }

    /// Check if this result represents a failed execution
    pub fn is_failed(&self) -> bool {
        self.status == StatementStatus::Failed
    }

    /// Check if this statement was skipped
    pub fn is_skipped(&self) -> bool {
        self.status == StatementStatus::Skipped
    }
}

/// Result of batch execution containing all statement results
#[derive(Debug, Clone)]
pub struct BatchExecutionResult {
    /// Results for each statement in order
    pub results: Vec<BatchResult>,
    /// Total execution time for the entire batch
    pub total_execution_time: Duration,
    /// Number of successful statements
    pub success_count: usize,
    /// Number of failed statements
    pub failure_count: usize,
    /// Number of skipped statements
    pub skipped_count: usize,
}

impl BatchExecutionResult {
    /// Create a new batch execution result
    pub fn new(results: Vec<BatchResult>, total_time: Duration) -> Self {
        let success_count = results.iter().filter(|r| r.is_success()).count();
        let failure_count = results.iter().filter(|r| r.is_failed()).count();
        let skipped_count = results.iter().filter(|r| r.is_skipped()).count();

        Self {
            results,
            total_execution_time: total_time,
            success_count,
            failure_count,
            skipped_count,
        }
    }

    /// Check if all statements executed successfully
    pub fn all_succeeded(&self) -> bool {
        self.failure_count == 0 && self.skipped_count == 0
    }

    /// Check if any statement failed
    pub fn has_failures(&self) -> bool {
        self.failure_count > 0
    }

    /// Get the total number of rows affected across all statements
    pub fn total_affected_rows(&self) -> u64 {
        self.results.iter().map(|r| r.affected_rows()).sum()
    }

    /// Get all failed results
    pub fn failed_results(&self) -> Vec<&BatchResult> {
        self.results.iter().filter(|r| r.is_failed()).collect()
    }

    /// Get all successful results
    pub fn successful_results(&self) -> Vec<&BatchResult> {
        self.results.iter().filter(|r| r.is_success()).collect()
    }

    /// Get the number of statements
    pub fn statement_count(&self) -> usize {
        self.results.len()
    }
}

/// Batch query executor for running multiple SQL statements
#[derive(Debug, Clone, Default)]
pub struct BatchExecutor {
    options: BatchOptions,
}

impl BatchExecutor {
    /// Create a new batch executor with the given options
    pub fn new(options: BatchOptions) -> Self {
        Self { options }
    }

    /// Get the current options
    pub fn options(&self) -> &BatchOptions {
        &self.options
    }

    /// Execute a batch of SQL statements in order
    ///
    /// When a [`NoticeFeed`] is given, notices that arrived while a
    /// statement ran are attached to that statement's result.
    pub async fn execute(
        &self,
        conn: &Arc<dyn Connection>,
        statements: Vec<String>,
        mut notices: Option<&mut NoticeFeed>,
    ) -> BatchExecutionResult {
        let batch_start = Instant::now();
        let mut results = Vec::with_capacity(statements.len());
        let mut should_stop = false;

        for (index, sql) in statements.into_iter().enumerate() {
            if should_stop {
                results.push(BatchResult::skipped(index, sql));
                continue;
            }

            let mut result = execute_single(conn, index, sql).await;
            if let Some(feed) = notices.as_deref_mut() {
                // Let the connection's event listener forward what it has
                tokio::task::yield_now().await;
                result = result.with_notices(feed.drain());
            }

            if result.is_failed() && self.options.stop_on_error {
                tracing::debug!(index, "stopping batch after failed statement");
                should_stop = true;
            }
            results.push(result);
        }

        let batch = BatchExecutionResult::new(results, batch_start.elapsed());
        tracing::info!(
            statements = batch.statement_count(),
            succeeded = batch.success_count,
            failed = batch.failure_count,
            skipped = batch.skipped_count,
            elapsed_ms = batch.total_execution_time.as_millis() as u64,
            "batch finished"
        );
        batch
    }
}

/// Execute a single statement
async fn execute_single(conn: &Arc<dyn Connection>, index: usize, sql: String) -> BatchResult {
    let start = Instant::now();
    let result = conn.query(&sql).await;
    let duration = start.elapsed();

    match result {
        Ok(mut query_result) => {
            query_result.execution_time_ms = duration.as_millis() as u64;
            tracing::debug!(
                index,
                rows = query_result.row_count(),
                affected_rows = query_result.affected_rows,
                "statement succeeded"
            );
            BatchResult::success(index, sql, query_result, duration)
        }
        Err(e) => {
            tracing::debug!(index, error = %e, "statement failed");
            BatchResult::failed(index, sql, e.into(), duration)
        }
    }
}
