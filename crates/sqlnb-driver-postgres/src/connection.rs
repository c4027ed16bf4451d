//! PostgreSQL connection implementation

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use parking_lot::Mutex;
use sqlnb_core::{
    ColumnMeta, Connection, DialParams, EventSink, Notice, QueryResult, Result, Row, SqlnbError,
    Value,
};
use tokio_postgres::error::DbError;
use tokio_postgres::{AsyncMessage, Client, NoTls, SimpleQueryMessage};

/// Name reported to the server in `pg_stat_activity`
pub(crate) const APPLICATION_NAME: &str = "sqlnb";

/// Fallback role when the saved connection has none
const DEFAULT_USER: &str = "postgres";

fn format_postgres_error(db_error: &DbError) -> String {
    let mut message = db_error.message().to_string();

    if let Some(detail) = db_error.detail() {
        if !detail.trim().is_empty() {
            message.push_str(&format!(" (detail: {})", detail));
        }
    }

    if let Some(hint) = db_error.hint() {
        if !hint.trim().is_empty() {
            message.push_str(&format!(" (hint: {})", hint));
        }
    }

    if let Some(column) = db_error.column() {
        if !column.trim().is_empty() {
            message.push_str(&format!(" (column: {})", column));
        }
    }

    message
}

/// Map an error from a running session
fn map_query_error(error: tokio_postgres::Error) -> SqlnbError {
    if error.is_closed() {
        return SqlnbError::StaleConnection(error.to_string());
    }
    match error.as_db_error() {
        Some(db_error) => {
            SqlnbError::query_with_code(format_postgres_error(db_error), db_error.code().code())
        }
        None => SqlnbError::query(error.to_string()),
    }
}

fn notice_from_db_error(db_error: &DbError) -> Notice {
    Notice::new(db_error.severity(), format_postgres_error(db_error))
        .with_code(db_error.code().code())
}

/// Build the client configuration for a dial
pub(crate) fn build_config(params: &DialParams) -> tokio_postgres::Config {
    let mut config = tokio_postgres::Config::new();
    config
        .host(&params.host)
        .port(params.port)
        .dbname(&params.database)
        .application_name(APPLICATION_NAME)
        .connect_timeout(params.connect_timeout);

    if params.username.is_empty() {
        config.user(DEFAULT_USER);
    } else {
        config.user(&params.username);
    }
    if let Some(password) = &params.password {
        config.password(password);
    }
    config
}

/// PostgreSQL connection wrapper
///
/// Statements go through the simple query protocol, so anything the
/// server accepts (DDL, `DO` blocks, several statements at once) can run
/// and every value comes back as text.
pub struct PostgresConnection {
    /// Taken on close; in-flight queries keep their own handle
    client: Mutex<Option<Arc<Client>>>,
    closed: AtomicBool,
}

impl PostgresConnection {
    /// Connect to a PostgreSQL database
    ///
    /// Server notices, a broken socket and the end of the session are
    /// reported through `events` for as long as the session lives.
    pub async fn connect(params: &DialParams, events: EventSink) -> Result<Self> {
        tracing::info!(
            host = %params.host,
            port = params.port,
            database = %params.database,
            "connecting to PostgreSQL database"
        );

        let config = build_config(params);
        let (client, mut connection) = config.connect(NoTls).await.map_err(|e| {
            let message = match e.as_db_error() {
                Some(db_error) => format_postgres_error(db_error),
                None => e.to_string(),
            };
            SqlnbError::Connection(format!(
                "Failed to connect to PostgreSQL at {}:{}: {}",
                params.host, params.port, message
            ))
        })?;

        // Drive the session and forward what it reports
        tokio::spawn(async move {
            let mut messages = stream::poll_fn(move |cx| connection.poll_message(cx));
            while let Some(message) = messages.next().await {
                match message {
                    Ok(AsyncMessage::Notice(notice)) => {
                        events.notice(notice_from_db_error(&notice));
                    }
                    Ok(AsyncMessage::Notification(notification)) => {
                        tracing::debug!(
                            channel = notification.channel(),
                            "ignoring notification"
                        );
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(error = %e, "PostgreSQL connection error");
                        events.fatal(e.to_string());
                        return;
                    }
                }
            }
            tracing::debug!("PostgreSQL session ended");
            events.closed();
        });

        tracing::info!(
            host = %params.host,
            port = params.port,
            database = %params.database,
            "PostgreSQL connection established"
        );
        Ok(Self {
            client: Mutex::new(Some(Arc::new(client))),
            closed: AtomicBool::new(false),
        })
    }

    fn client(&self) -> Result<Arc<Client>> {
        self.client
            .lock()
            .clone()
            .ok_or_else(|| SqlnbError::StaleConnection("connection is closed".into()))
    }
}

#[async_trait]
impl Connection for PostgresConnection {
    fn driver_name(&self) -> &str {
        "postgres"
    }

    #[tracing::instrument(skip(self, sql), fields(sql = %sql.chars().take(100).collect::<String>()))]
    async fn query(&self, sql: &str) -> Result<QueryResult> {
        let client = self.client()?;
        let messages = client.simple_query(sql).await.map_err(|e| {
            let error = map_query_error(e);
            tracing::debug!(error = %error, "statement failed");
            error
        })?;
        Ok(collect_result(messages))
    }

    async fn close(&self) -> Result<()> {
        // Dropping the last client handle terminates the session
        let client = self.client.lock().take();
        if client.is_some() {
            tracing::info!("closing PostgreSQL connection");
        }
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
            || self
                .client
                .lock()
                .as_ref()
                .is_none_or(|client| client.is_closed())
    }
}

/// Fold simple-query responses into one result
///
/// When the text held several statements, the last row set wins and the
/// affected count is the one reported by the last command.
fn collect_result(messages: Vec<SimpleQueryMessage>) -> QueryResult {
    let mut result = QueryResult::empty();
    let mut names: Vec<String> = Vec::new();

    for message in messages {
        match message {
            SimpleQueryMessage::RowDescription(columns) => {
                names = columns.iter().map(|c| c.name().to_string()).collect();
                result.columns = names
                    .iter()
                    .enumerate()
                    .map(|(ordinal, name)| ColumnMeta::new(name.clone(), ordinal))
                    .collect();
                result.rows.clear();
            }
            SimpleQueryMessage::Row(row) => {
                if names.is_empty() {
                    names = row.columns().iter().map(|c| c.name().to_string()).collect();
                }
                let values = (0..row.len())
                    .map(|i| match row.get(i) {
                        Some(text) => Value::String(text.to_string()),
                        None => Value::Null,
                    })
                    .collect();
                result.rows.push(Row::new(names.clone(), values));
            }
            SimpleQueryMessage::CommandComplete(count) => {
                result.affected_rows = count;
            }
            _ => {}
        }
    }

    result
}
