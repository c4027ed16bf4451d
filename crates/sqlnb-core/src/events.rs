//! Asynchronous connection events
//!
//! Drivers report what happens to a session after it is established by
//! sending [`ConnectionEvent`]s through an [`EventSink`]. The connection
//! manager owns the receiving half and decides what to do with them.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// A notice or warning raised by the server while a session is open
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    /// Severity as reported by the server (NOTICE, WARNING, INFO, ...)
    pub severity: String,
    /// Server-specific condition code, if any
    pub code: Option<String>,
    /// Human readable message
    pub message: String,
}

impl Notice {
    pub fn new(severity: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: severity.into(),
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} [{}]: {}", self.severity, code, self.message),
            None => write!(f, "{}: {}", self.severity, self.message),
        }
    }
}

/// Something that happened to an established session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Informational message from the server
    Notice(Notice),
    /// The session failed (server terminated it, network dropped, ...)
    Fatal(String),
    /// The session ended without an error
    Closed,
}

impl ConnectionEvent {
    /// Whether the session can no longer be used after this event
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionEvent::Fatal(_) | ConnectionEvent::Closed)
    }
}

/// Sending half of a connection's event channel
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<ConnectionEvent>,
}

impl EventSink {
    /// Create a sink and the receiver its events arrive on
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ConnectionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// A sink whose events go nowhere
    pub fn detached() -> Self {
        Self::channel().0
    }

    /// Emit an event; a listener that has gone away is not an error
    pub fn send(&self, event: ConnectionEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("connection event dropped, no listener");
        }
    }

    pub fn notice(&self, notice: Notice) {
        self.send(ConnectionEvent::Notice(notice));
    }

    pub fn fatal(&self, message: impl Into<String>) {
        self.send(ConnectionEvent::Fatal(message.into()));
    }

    pub fn closed(&self) {
        self.send(ConnectionEvent::Closed);
    }
}
