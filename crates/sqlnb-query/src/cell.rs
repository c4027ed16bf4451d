//! Running a notebook cell end to end

use sqlnb_connection::ConnectionManager;
use sqlnb_core::{ConnectionConfig, Result};

use crate::batch::{BatchExecutionResult, BatchExecutor, BatchOptions, NoticeFeed};
use crate::split_statements;

/// Run every statement of `script` against the database `config` names
///
/// The connection comes from `manager`, so consecutive cells on the same
/// database share one session. Only failing to obtain that connection is
/// an error; statement failures are reported per statement in the result.
#[tracing::instrument(skip_all, fields(key = %config.key()))]
pub async fn run_cell(
    manager: &ConnectionManager,
    config: &ConnectionConfig,
    script: &str,
    options: &BatchOptions,
) -> Result<BatchExecutionResult> {
    // Subscribe before dialing so notices raised by the first statement
    // are not missed
    let mut notices = NoticeFeed::new(config.key(), manager.subscribe_notices());
    let conn = manager.get_connection(config).await?;

    let statements = split_statements(script);
    tracing::debug!(statements = statements.len(), "split cell");

    let executor = BatchExecutor::new(options.clone());
    Ok(executor.execute(&conn, statements, Some(&mut notices)).await)
}
