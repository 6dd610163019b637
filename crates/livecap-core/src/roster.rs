use crate::events::{Connection, Stream};

/// Streams and connections currently present in a session.
///
/// Updated by the session event loop. Read by UI layers through snapshots.
#[derive(Debug, Clone, Default)]
pub struct SessionRoster {
    streams: Vec<Stream>,
    connections: Vec<Connection>,
}

impl SessionRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_stream(&mut self, stream: Stream) -> bool {
        if self.streams.iter().any(|s| s.stream_id == stream.stream_id) {
            return false;
        }
        self.streams.push(stream);
        true
    }

    pub fn remove_stream(&mut self, stream_id: &str) -> Option<Stream> {
        let index = self.streams.iter().position(|s| s.stream_id == stream_id)?;
        Some(self.streams.remove(index))
    }

    pub fn add_connection(&mut self, connection: Connection) -> bool {
        if self
            .connections
            .iter()
            .any(|c| c.connection_id == connection.connection_id)
        {
            return false;
        }
        self.connections.push(connection);
        true
    }

    pub fn remove_connection(&mut self, connection_id: &str) -> Option<Connection> {
        let index = self
            .connections
            .iter()
            .position(|c| c.connection_id == connection_id)?;
        Some(self.connections.remove(index))
    }

    pub fn streams(&self) -> &[Stream] {
        &self.streams
    }

    pub fn stream(&self, stream_id: &str) -> Option<&Stream> {
        self.streams.iter().find(|s| s.stream_id == stream_id)
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn connection(&self, connection_id: &str) -> Option<&Connection> {
        self.connections
            .iter()
            .find(|c| c.connection_id == connection_id)
    }

    pub fn clear(&mut self) {
        self.streams.clear();
        self.connections.clear();
    }
}
