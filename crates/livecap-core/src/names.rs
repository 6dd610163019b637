use std::collections::HashMap;

use crate::events::Connection;

/// Signal type carrying a participant's chosen display name (`signal:name`).
pub const NAME_SIGNAL_TYPE: &str = "name";

/// Label prefixed to names synthesized from a connection's creation time.
pub const GUEST_LABEL: &str = "Guest";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NameSource {
    Signalled,
    Synthesized,
}

#[derive(Debug, Clone)]
struct CachedName {
    name: String,
    source: NameSource,
}

/// Display names by connection id, kept for the lifetime of a session.
///
/// Names come from `name` signals, or are synthesized from the connection's
/// creation time the first time a name is needed. A synthesized name is
/// sticky: later signals for that connection leave it in place, so the label
/// a speaker was first shown with stays stable.
#[derive(Debug, Clone, Default)]
pub struct NameCache {
    names: HashMap<String, CachedName>,
}

impl NameCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a name signalled by `connection_id`.
    ///
    /// Returns `false` if the connection already has a synthesized name, in
    /// which case the signal is ignored.
    pub fn record_signal(&mut self, connection_id: &str, name: &str) -> bool {
        match self.names.get_mut(connection_id) {
            Some(cached) if cached.source == NameSource::Synthesized => false,
            Some(cached) => {
                cached.name = name.to_string();
                true
            }
            None => {
                self.names.insert(
                    connection_id.to_string(),
                    CachedName {
                        name: name.to_string(),
                        source: NameSource::Signalled,
                    },
                );
                true
            }
        }
    }

    /// Name for `connection`, synthesizing and caching a guest label if none is known.
    ///
    /// An empty signalled name counts as unknown.
    pub fn resolve(&mut self, connection: &Connection) -> &str {
        let synthesized = || CachedName {
            name: guest_name(connection.creation_time),
            source: NameSource::Synthesized,
        };
        let cached = self
            .names
            .entry(connection.connection_id.clone())
            .or_insert_with(synthesized);
        if cached.name.is_empty() {
            *cached = synthesized();
        }
        &cached.name
    }

    pub fn get(&self, connection_id: &str) -> Option<&str> {
        self.names.get(connection_id).map(|c| c.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Guest label for a connection created at `creation_time` (epoch millis).
///
/// Uses the five digits preceding the final digit of the timestamp, so two
/// clients that derive the label independently agree on it.
pub fn guest_name(creation_time: u64) -> String {
    let digits = creation_time.to_string();
    let end = digits.len().saturating_sub(1);
    let start = digits.len().saturating_sub(6);
    format!("{GUEST_LABEL}{}", &digits[start..end])
}
