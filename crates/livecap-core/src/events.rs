use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

/// A participant's connection to the session, as reported by the SDK.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub connection_id: String,
    /// Epoch milliseconds at which the SDK created the connection.
    pub creation_time: u64,
}

impl Connection {
    pub fn new(connection_id: impl Into<String>, creation_time: u64) -> Self {
        Self {
            connection_id: connection_id.into(),
            creation_time,
        }
    }

    /// A connection created right now.
    pub fn now(connection_id: impl Into<String>) -> Self {
        let millis = chrono::Utc::now().timestamp_millis().max(0) as u64;
        Self::new(connection_id, millis)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stream {
    pub stream_id: String,
    pub connection: Connection,
}

/// A subscription to a remote stream. Caption events are delivered per subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub stream: Stream,
}

impl Subscription {
    pub fn new(stream: Stream) -> Self {
        Self { stream }
    }

    pub fn connection(&self) -> &Connection {
        &self.stream.connection
    }
}

/// Payload of the SDK's `captionsReceived` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionReceived {
    pub stream_id: String,
    pub caption: String,
}

/// A session-level `signal:<type>` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    pub signal_type: Option<String>,
    /// Connection id of the sender.
    pub from: String,
    pub data: String,
}

impl Signal {
    pub fn name(from: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            signal_type: Some(crate::names::NAME_SIGNAL_TYPE.to_string()),
            from: from.into(),
            data: name.into(),
        }
    }
}

/// Events emitted by a live session to UI listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    ConnectionCreated(Connection),
    ConnectionDestroyed(String), // connection id
    StreamCreated(Stream),
    StreamDestroyed(String), // stream id
    SessionDisconnected,
    NameSignalled { connection_id: String, name: String },
    CaptionsRendered(String),
}

/// Trait for receiving events from a live session.
/// Implementations must be Send + Sync (called from the session task).
pub trait SessionEventListener: Send + Sync {
    fn on_event(&self, event: SessionEvent);
}

/// Dispatches session events to registered listeners.
#[derive(Clone, Default)]
pub struct EventEmitter {
    listeners: Arc<RwLock<Vec<Arc<dyn SessionEventListener>>>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&self, listener: Arc<dyn SessionEventListener>) {
        self.listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(listener);
    }

    pub fn emit(&self, event: SessionEvent) {
        let listeners = self.listeners.read().unwrap_or_else(|e| e.into_inner());
        for listener in listeners.iter() {
            listener.on_event(event.clone());
        }
    }
}
