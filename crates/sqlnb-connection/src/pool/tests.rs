//! Tests for cache slots and statistics

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::FutureExt;
use sqlnb_core::{Connection, ConnectionKey, QueryResult, Result, SqlnbError};

use super::slot::{ConnectionState, DialFuture, PooledConnection, Slot};
use super::stats::CacheStats;

/// Mock connection for testing
#[derive(Default)]
struct MockConnection {
    close_calls: AtomicUsize,
}

#[async_trait]
impl Connection for MockConnection {
    fn driver_name(&self) -> &str {
        "mock"
    }

    async fn query(&self, _sql: &str) -> Result<QueryResult> {
        Ok(QueryResult::empty())
    }

    async fn close(&self) -> Result<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.close_calls.load(Ordering::SeqCst) > 0
    }
}

fn pooled(conn: Arc<MockConnection>, generation: u64) -> PooledConnection {
    PooledConnection::new(ConnectionKey::new("conn-1", "app"), conn, generation)
}

// =============================================================================
// CacheStats tests
// =============================================================================

mod stats_tests {
    use super::*;

    #[test]
    fn test_default_stats_are_empty() {
        let stats = CacheStats::default();
        assert!(stats.is_empty());
        assert_eq!(stats.total(), 0);
    }

    #[test]
    fn test_total_counts_live_and_pending() {
        let stats = CacheStats::new(2, 1);
        assert_eq!(stats.live(), 2);
        assert_eq!(stats.pending(), 1);
        assert_eq!(stats.total(), 3);
        assert!(!stats.is_empty());
    }
}

// =============================================================================
// Slot tests
// =============================================================================

mod slot_tests {
    use super::*;

    #[test]
    fn test_new_pooled_connection_is_live() {
        let conn = Arc::new(MockConnection::default());
        let entry = pooled(conn, 7);

        assert_eq!(entry.state(), ConnectionState::Live);
        assert_eq!(entry.generation(), 7);
        assert_eq!(entry.key().database(), "app");
        assert!(format!("{:?}", entry).contains("mock"));
    }

    #[tokio::test]
    async fn test_clones_share_closed_state() {
        let conn = Arc::new(MockConnection::default());
        let entry = pooled(conn.clone(), 2);
        let snapshot = entry.clone();

        entry.close().await.expect("close");

        assert_eq!(snapshot.state(), ConnectionState::Closed);
        assert_eq!(entry.state(), ConnectionState::Closed);
        assert!(format!("{:?}", snapshot).contains("Closed"));
    }

    #[tokio::test]
    async fn test_close_reaches_client_once() {
        let conn = Arc::new(MockConnection::default());
        let entry = pooled(conn.clone(), 4);

        entry.close().await.expect("close");
        entry.clone().close().await.expect("second close");

        assert_eq!(conn.close_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_live_slot_close_closes_client() {
        let conn = Arc::new(MockConnection::default());
        let slot = Slot::Live(pooled(conn.clone(), 1));

        assert!(!slot.is_pending());
        assert_eq!(slot.generation(), 1);
        assert!(matches!(slot.close().await, Some(Ok(()))));
        assert_eq!(conn.close_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_pending_slot_close_waits_for_dial() {
        let conn = Arc::new(MockConnection::default());
        let entry = pooled(conn.clone(), 3);
        let dial: DialFuture = async move { Ok(entry) }.boxed().shared();
        let slot = Slot::Pending { generation: 3, dial };

        assert!(slot.is_pending());
        assert_eq!(slot.generation(), 3);
        assert!(matches!(slot.close().await, Some(Ok(()))));
        assert!(conn.is_closed());
    }

    #[tokio::test]
    async fn test_pending_slot_with_failed_dial_has_nothing_to_close() {
        let dial: DialFuture = async { Err(SqlnbError::Connection("refused".into())) }
            .boxed()
            .shared();
        let slot = Slot::Pending { generation: 0, dial };

        assert!(slot.close().await.is_none());
    }
}
