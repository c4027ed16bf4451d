//! Tests for batch query execution

use super::*;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use sqlnb_connection::KeyedNotice;
use sqlnb_core::{
    ColumnMeta, Connection, ConnectionKey, Notice, QueryResult, Result, Row, SqlnbError, Value,
};
use tokio::sync::broadcast;

/// Mock connection that records every statement it is given
///
/// Statements containing `FAIL` are rejected, `RAISE` emits a notice on
/// the attached channel, and `SELECT` returns one row.
#[derive(Default)]
struct ScriptedConnection {
    executed: Mutex<Vec<String>>,
    notices: Option<(ConnectionKey, broadcast::Sender<KeyedNotice>)>,
}

impl ScriptedConnection {
    fn with_notices(key: ConnectionKey, sender: broadcast::Sender<KeyedNotice>) -> Self {
        Self {
            executed: Mutex::new(Vec::new()),
            notices: Some((key, sender)),
        }
    }

    fn executed(&self) -> Vec<String> {
        self.executed.lock().clone()
    }
}

#[async_trait]
impl Connection for ScriptedConnection {
    fn driver_name(&self) -> &str {
        "scripted"
    }

    async fn query(&self, sql: &str) -> Result<QueryResult> {
        self.executed.lock().push(sql.to_string());

        if sql.contains("RAISE") {
            if let Some((key, sender)) = &self.notices {
                let _ = sender.send(KeyedNotice {
                    key: key.clone(),
                    notice: Notice::new("NOTICE", format!("from {sql}")),
                });
            }
        }

        if sql.contains("FAIL") {
            return Err(SqlnbError::query_with_code(
                "syntax error at or near \"FAIL\"",
                "42601",
            ));
        }

        if sql.starts_with("SELECT") {
            let columns = vec!["?column?".to_string()];
            return Ok(QueryResult {
                columns: vec![ColumnMeta::new("?column?", 0)],
                rows: vec![Row::new(columns, vec![Value::String("1".into())])],
                ..QueryResult::default()
            });
        }

        Ok(QueryResult::command(1))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    fn is_closed(&self) -> bool {
        false
    }
}

fn statements(sql: &[&str]) -> Vec<String> {
    sql.iter().map(|s| s.to_string()).collect()
}

mod batch_options_tests {
    use super::*;

    #[test]
    fn test_batch_options_default_continues_on_error() {
        let options = BatchOptions::default();

        assert!(!options.stop_on_error);
        assert_eq!(options, BatchOptions::new());
    }

    #[test]
    fn test_batch_options_builder() {
        let options = BatchOptions::new().with_stop_on_error(true);

        assert!(options.stop_on_error);
    }

    #[test]
    fn test_batch_options_from_empty_json() {
        let options: BatchOptions = serde_json::from_str("{}").expect("deserialize");

        assert_eq!(options, BatchOptions::default());
    }
}

mod statement_error_tests {
    use super::*;

    #[test]
    fn test_statement_error_new() {
        let error = StatementError::new("test error");

        assert_eq!(error.message, "test error");
        assert!(error.code.is_none());
    }

    #[test]
    fn test_statement_error_display_without_code() {
        let error = StatementError::new("test error");

        assert_eq!(error.to_string(), "test error");
    }

    #[test]
    fn test_statement_error_display_with_code() {
        let error = StatementError::new("test error").with_code("E001");

        assert_eq!(error.to_string(), "[E001] test error");
    }

    #[test]
    fn test_statement_error_keeps_server_code() {
        let error: StatementError =
            SqlnbError::query_with_code("division by zero", "22012").into();

        assert_eq!(error.code.as_deref(), Some("22012"));
        assert!(error.message.contains("division by zero"));
    }

    #[test]
    fn test_statement_error_from_stale_connection() {
        let error: StatementError =
            SqlnbError::StaleConnection("connection closed".into()).into();

        assert!(error.code.is_none());
        assert_eq!(error.message, "Stale connection: connection closed");
    }
}

mod batch_result_tests {
    use super::*;

    #[test]
    fn test_batch_result_success() {
        let result = BatchResult::success(
            0,
            "DELETE FROM t".to_string(),
            QueryResult::command(4),
            Duration::from_millis(100),
        );

        assert_eq!(result.index, 0);
        assert_eq!(result.sql, "DELETE FROM t");
        assert!(result.is_success());
        assert!(!result.is_failed());
        assert!(!result.is_skipped());
        assert_eq!(result.affected_rows(), 4);
        assert!(result.error.is_none());
        assert!(result.notices.is_empty());
        assert_eq!(result.execution_time, Duration::from_millis(100));
    }

    #[test]
    fn test_batch_result_failed() {
        let result = BatchResult::failed(
            2,
            "INVALID SQL".to_string(),
            StatementError::new("syntax error"),
            Duration::from_millis(10),
        );

        assert_eq!(result.index, 2);
        assert!(result.is_failed());
        assert!(result.query_result.is_none());
        assert_eq!(result.affected_rows(), 0);
    }

    #[test]
    fn test_batch_result_skipped() {
        let result = BatchResult::skipped(3, "SELECT * FROM t".to_string());

        assert!(result.is_skipped());
        assert_eq!(result.execution_time, Duration::ZERO);
    }
}

mod batch_execution_result_tests {
    use super::*;

    fn create_test_results() -> Vec<BatchResult> {
        vec![
            BatchResult::success(0, "INSERT 1".into(), QueryResult::command(1), Duration::ZERO),
            BatchResult::success(1, "INSERT 2".into(), QueryResult::command(2), Duration::ZERO),
            BatchResult::failed(
                2,
                "INVALID".into(),
                StatementError::new("error"),
                Duration::from_millis(5),
            ),
            BatchResult::skipped(3, "INSERT 3".into()),
        ]
    }

    #[test]
    fn test_batch_execution_result_counts() {
        let batch = BatchExecutionResult::new(create_test_results(), Duration::from_millis(100));

        assert_eq!(batch.success_count, 2);
        assert_eq!(batch.failure_count, 1);
        assert_eq!(batch.skipped_count, 1);
        assert_eq!(batch.statement_count(), 4);
        assert_eq!(batch.total_affected_rows(), 3);
        assert!(!batch.all_succeeded());
        assert!(batch.has_failures());
    }

    #[test]
    fn test_batch_execution_result_failed_results() {
        let batch = BatchExecutionResult::new(create_test_results(), Duration::from_millis(100));

        let failed = batch.failed_results();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].index, 2);
        assert_eq!(batch.successful_results().len(), 2);
    }

    #[test]
    fn test_empty_batch_succeeds() {
        let batch = BatchExecutionResult::new(vec![], Duration::ZERO);

        assert!(batch.all_succeeded());
        assert!(!batch.has_failures());
    }
}

mod batch_executor_tests {
    use super::*;

    #[tokio::test]
    async fn test_statements_run_in_order() {
        let conn = Arc::new(ScriptedConnection::default());
        let dyn_conn: Arc<dyn Connection> = conn.clone();
        let sql = statements(&["CREATE TABLE t (v int);", "INSERT INTO t VALUES (1);", "SELECT v FROM t;"]);

        let batch = BatchExecutor::default()
            .execute(&dyn_conn, sql.clone(), None)
            .await;

        assert_eq!(conn.executed(), sql);
        assert!(batch.all_succeeded());
        let indexes: Vec<usize> = batch.results.iter().map(|r| r.index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
        let last = batch.results[2].query_result.as_ref().expect("rows");
        assert_eq!(last.row_count(), 1);
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_the_batch() {
        let conn = Arc::new(ScriptedConnection::default());
        let dyn_conn: Arc<dyn Connection> = conn.clone();

        let batch = BatchExecutor::default()
            .execute(
                &dyn_conn,
                statements(&["SELECT 1;", "FAIL;", "INSERT INTO t VALUES (2);"]),
                None,
            )
            .await;

        assert_eq!(conn.executed().len(), 3);
        assert_eq!(batch.success_count, 2);
        assert_eq!(batch.failure_count, 1);
        let failed = &batch.results[1];
        assert!(failed.is_failed());
        assert_eq!(
            failed.error.as_ref().and_then(|e| e.code.as_deref()),
            Some("42601")
        );
        assert!(batch.results[2].is_success());
    }

    #[tokio::test]
    async fn test_stop_on_error_skips_the_rest() {
        let conn = Arc::new(ScriptedConnection::default());
        let dyn_conn: Arc<dyn Connection> = conn.clone();
        let executor = BatchExecutor::new(BatchOptions::new().with_stop_on_error(true));

        let batch = executor
            .execute(
                &dyn_conn,
                statements(&["SELECT 1;", "FAIL;", "SELECT 2;", "SELECT 3;"]),
                None,
            )
            .await;

        assert_eq!(conn.executed(), statements(&["SELECT 1;", "FAIL;"]));
        assert_eq!(batch.skipped_count, 2);
        assert!(batch.results[3].is_skipped());
    }

    #[tokio::test]
    async fn test_empty_batch_runs_nothing() {
        let conn = Arc::new(ScriptedConnection::default());
        let dyn_conn: Arc<dyn Connection> = conn.clone();

        let batch = BatchExecutor::default().execute(&dyn_conn, vec![], None).await;

        assert_eq!(batch.statement_count(), 0);
        assert!(conn.executed().is_empty());
    }

    #[tokio::test]
    async fn test_notices_attach_to_their_statement() {
        let key = ConnectionKey::new("conn-1", "app");
        let (sender, receiver) = broadcast::channel(16);
        let conn = Arc::new(ScriptedConnection::with_notices(key.clone(), sender.clone()));
        let dyn_conn: Arc<dyn Connection> = conn;
        let mut feed = NoticeFeed::new(key, receiver);

        // Notice from another connection sharing the manager
        let _ = sender.send(KeyedNotice {
            key: ConnectionKey::new("conn-1", "other"),
            notice: Notice::new("NOTICE", "not ours"),
        });

        let batch = BatchExecutor::default()
            .execute(
                &dyn_conn,
                statements(&["SELECT 1;", "DO RAISE;", "SELECT 2;"]),
                Some(&mut feed),
            )
            .await;

        assert!(batch.results[0].notices.is_empty());
        assert_eq!(batch.results[1].notices.len(), 1);
        assert_eq!(batch.results[1].notices[0].message, "from DO RAISE;");
        assert!(batch.results[2].notices.is_empty());
    }
}

mod notice_feed_tests {
    use super::*;

    #[test]
    fn test_drain_filters_by_key_and_empties() {
        let key = ConnectionKey::new("conn-1", "app");
        let (sender, receiver) = broadcast::channel(8);
        let mut feed = NoticeFeed::new(key.clone(), receiver);

        for (database, message) in [("app", "one"), ("other", "skip"), ("app", "two")] {
            let _ = sender.send(KeyedNotice {
                key: ConnectionKey::new("conn-1", database),
                notice: Notice::new("NOTICE", message),
            });
        }

        let messages: Vec<String> = feed.drain().into_iter().map(|n| n.message).collect();
        assert_eq!(messages, vec!["one", "two"]);
        assert!(feed.drain().is_empty());
        assert_eq!(feed.key(), &key);
    }

    #[test]
    fn test_drain_survives_lag() {
        let key = ConnectionKey::new("conn-1", "app");
        let (sender, receiver) = broadcast::channel(2);
        let mut feed = NoticeFeed::new(key.clone(), receiver);

        for i in 0..5 {
            let _ = sender.send(KeyedNotice {
                key: key.clone(),
                notice: Notice::new("NOTICE", format!("n{i}")),
            });
        }

        let messages: Vec<String> = feed.drain().into_iter().map(|n| n.message).collect();
        assert_eq!(messages, vec!["n3", "n4"]);
    }
}
