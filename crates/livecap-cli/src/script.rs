use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use livecap_core::{
    CaptionReceived, Connection, LivecapError, SessionInput, SessionSender, Signal, Stream,
    Subscription,
};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("usage: {0}")]
    Usage(String),
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("script line {line}: {source}")]
    Parse {
        line: usize,
        source: serde_json::Error,
    },
    #[error("caption for unknown stream {0}")]
    UnknownStream(String),
    #[error("stream created for unknown connection {0}")]
    UnknownConnection(String),
    #[error(transparent)]
    Session(#[from] LivecapError),
}

/// One line of a session script: an SDK event and when it happens.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScriptLine {
    /// Milliseconds after the start of the replay.
    #[serde(default)]
    pub at_ms: u64,
    #[serde(flatten)]
    pub event: ScriptEvent,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScriptEvent {
    ConnectionCreated {
        connection_id: String,
        creation_time: Option<u64>,
    },
    ConnectionDestroyed {
        connection_id: String,
    },
    StreamCreated {
        stream_id: String,
        connection_id: String,
    },
    StreamDestroyed {
        stream_id: String,
    },
    Signal {
        #[serde(rename = "type")]
        signal_type: Option<String>,
        from: String,
        data: String,
    },
    Caption {
        stream_id: String,
        caption: String,
    },
    Disconnected,
    CaptionsEnabled {
        enabled: bool,
    },
}

/// Parse a JSON-lines script. Blank lines and `#` comments are skipped.
pub fn parse_script(text: &str) -> Result<Vec<ScriptLine>, CliError> {
    let mut lines = Vec::new();
    for (index, raw) in text.lines().enumerate() {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let line = serde_json::from_str(trimmed).map_err(|source| CliError::Parse {
            line: index + 1,
            source,
        })?;
        lines.push(line);
    }
    lines.sort_by_key(|l: &ScriptLine| l.at_ms);
    Ok(lines)
}

/// Turns script events into session inputs, keeping the SDK-side view of
/// connections and streams that caption subscriptions are built from.
#[derive(Debug, Default)]
pub struct ScriptBinder {
    connections: HashMap<String, Connection>,
    streams: HashMap<String, Stream>,
}

impl ScriptBinder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn translate(&mut self, event: ScriptEvent) -> Result<SessionInput, CliError> {
        let input = match event {
            ScriptEvent::ConnectionCreated {
                connection_id,
                creation_time,
            } => {
                let connection = match creation_time {
                    Some(time) => Connection::new(connection_id, time),
                    None => Connection::now(connection_id),
                };
                self.connections
                    .insert(connection.connection_id.clone(), connection.clone());
                SessionInput::ConnectionCreated(connection)
            }
            ScriptEvent::ConnectionDestroyed { connection_id } => {
                self.connections.remove(&connection_id);
                SessionInput::ConnectionDestroyed(connection_id)
            }
            ScriptEvent::StreamCreated {
                stream_id,
                connection_id,
            } => {
                let connection = self
                    .connections
                    .get(&connection_id)
                    .cloned()
                    .ok_or(CliError::UnknownConnection(connection_id))?;
                let stream = Stream {
                    stream_id,
                    connection,
                };
                self.streams.insert(stream.stream_id.clone(), stream.clone());
                SessionInput::StreamCreated(stream)
            }
            ScriptEvent::StreamDestroyed { stream_id } => {
                self.streams.remove(&stream_id);
                SessionInput::StreamDestroyed(stream_id)
            }
            ScriptEvent::Signal {
                signal_type,
                from,
                data,
            } => SessionInput::Signal(Signal {
                signal_type,
                from,
                data,
            }),
            ScriptEvent::Caption { stream_id, caption } => {
                let stream = self
                    .streams
                    .get(&stream_id)
                    .cloned()
                    .ok_or_else(|| CliError::UnknownStream(stream_id.clone()))?;
                SessionInput::CaptionsReceived {
                    event: CaptionReceived { stream_id, caption },
                    subscription: Subscription::new(stream),
                }
            }
            ScriptEvent::Disconnected => {
                self.streams.clear();
                self.connections.clear();
                SessionInput::Disconnected
            }
            ScriptEvent::CaptionsEnabled { enabled } => SessionInput::SetCaptionsEnabled(enabled),
        };
        Ok(input)
    }
}

/// Deliver every script line to the session at its scheduled offset.
pub async fn replay(lines: Vec<ScriptLine>, sender: &SessionSender) -> Result<(), CliError> {
    let start = tokio::time::Instant::now();
    let mut binder = ScriptBinder::new();
    for line in lines {
        tokio::time::sleep_until(start + Duration::from_millis(line.at_ms)).await;
        tracing::debug!("replay t={}ms {:?}", line.at_ms, line.event);
        sender.send(binder.translate(line.event)?)?;
    }
    Ok(())
}
