//! Shared mocks for notebook integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use sqlnb_connection::{ConnectionManager, InMemorySecretStore, ManagerSettings};
use sqlnb_core::{
    ColumnMeta, Connection, ConnectionConfig, DatabaseDriver, DialParams, EventSink, Notice,
    QueryResult, Result, Row, SqlnbError, Value,
};

/// Connection whose behaviour is driven by keywords in the SQL
///
/// - `RAISE` sends a notice through the event sink
/// - `FAIL` is rejected with a syntax error
/// - `TERMINATE` reports a fatal event, as if the server killed the session
/// - `SELECT` returns a single row
pub struct MockConnection {
    events: EventSink,
    closed: AtomicBool,
    executed: Mutex<Vec<String>>,
}

impl MockConnection {
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().clone()
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn driver_name(&self) -> &str {
        "mock"
    }

    async fn query(&self, sql: &str) -> Result<QueryResult> {
        if self.is_closed() {
            return Err(SqlnbError::StaleConnection("connection is closed".into()));
        }
        self.executed.lock().push(sql.to_string());

        if sql.contains("RAISE") {
            self.events
                .notice(Notice::new("NOTICE", "relation \"t\" already exists, skipping").with_code("42P07"));
        }
        if sql.contains("TERMINATE") {
            self.events
                .fatal("terminating connection due to administrator command");
            return Err(SqlnbError::StaleConnection(
                "terminating connection due to administrator command".into(),
            ));
        }
        if sql.contains("FAIL") {
            return Err(SqlnbError::query_with_code(
                "syntax error at or near \"FAIL\"",
                "42601",
            ));
        }
        if sql.starts_with("SELECT") {
            return Ok(QueryResult {
                columns: vec![ColumnMeta::new("n", 0)],
                rows: vec![Row::new(vec!["n".into()], vec![Value::String("1".into())])],
                ..QueryResult::default()
            });
        }
        Ok(QueryResult::command(1))
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct MockDriver {
    dials: AtomicUsize,
    refuse: AtomicBool,
    connections: Mutex<Vec<Arc<MockConnection>>>,
}

impl MockDriver {
    pub fn refusing() -> Self {
        let driver = Self::default();
        driver.refuse.store(true, Ordering::SeqCst);
        driver
    }

    pub fn dials(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }

    pub fn connection(&self, index: usize) -> Arc<MockConnection> {
        self.connections.lock()[index].clone()
    }
}

#[async_trait]
impl DatabaseDriver for MockDriver {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn connect(
        &self,
        params: &DialParams,
        events: EventSink,
    ) -> Result<Arc<dyn Connection>> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        if self.refuse.load(Ordering::SeqCst) {
            return Err(SqlnbError::Connection(format!(
                "could not connect to {}:{}",
                params.host, params.port
            )));
        }

        let conn = Arc::new(MockConnection {
            events,
            closed: AtomicBool::new(false),
            executed: Mutex::new(Vec::new()),
        });
        self.connections.lock().push(conn.clone());
        Ok(conn)
    }
}

pub fn manager(driver: Arc<MockDriver>) -> ConnectionManager {
    ConnectionManager::new(
        driver,
        Arc::new(InMemorySecretStore::new()),
        ManagerSettings::default(),
    )
}

pub fn notebook_config() -> ConnectionConfig {
    ConnectionConfig::new("local-pg", "notebook").with_username("postgres")
}
