//! Event — the universal message type for the relay.
//!
//! ARCHITECTURE
//! ============
//! Every communication in the relay is an Event: clients send request events
//! over WebSocket, the server dispatches by event name, and notifications fan
//! out to room peers as events of the same shape.
//!
//! DESIGN
//! ======
//! - Flat data: payload is always `Map<String, Value>`, never nested structs.
//! - The WS handler routes on `event` name and never inspects `data`.
//! - Event names are constants below so handlers and tests share one spelling.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// =============================================================================
// EVENT NAMES
// =============================================================================

/// Client requests to join a room under a display name.
pub const JOIN: &str = "join";

/// Notifies existing members of a new joiner. Sent before the roster.
pub const CONNECTED: &str = "connected";

/// Full presence roster, sent to everyone in the room including the joiner.
pub const USERDATA: &str = "userdata";

/// Room-join confirmation with roster snapshot and the joiner's connection id.
pub const JOINED: &str = "joined";

/// Live document buffer relay. Server strips the sender from the fan-out.
pub const CODE_CHANGE: &str = "code-change";

/// Current document buffer, sent to a late joiner only.
pub const SYNC_CODE: &str = "sync-code";

/// Cursor/selection broadcast with the sender's color and name injected.
pub const SELECTION: &str = "selection";

/// A user's last connection left the room, or a duplicate was evicted.
pub const EXIT: &str = "exit";

// =============================================================================
// TYPES
// =============================================================================

/// Flat key-value payload. Alias to reduce noise in signatures.
pub type Data = HashMap<String, serde_json::Value>;

/// The universal message type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event: String,
    #[serde(default)]
    pub data: Data,
}

// =============================================================================
// CONSTRUCTORS
// =============================================================================

impl Event {
    /// Create an event with an empty payload.
    pub fn new(event: impl Into<String>) -> Self {
        Self { event: event.into(), data: Data::new() }
    }

    /// Create an event carrying an existing payload.
    pub fn with_payload(event: impl Into<String>, data: Data) -> Self {
        Self { event: event.into(), data }
    }

    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Fetch a payload field as a string slice.
    #[must_use]
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(serde_json::Value::as_str)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let ev = Event::new(CONNECTED)
            .with_data("user", "alice")
            .with_data("color", "#f94144");
        assert_eq!(ev.event, "connected");
        assert_eq!(ev.str_field("user"), Some("alice"));
        assert_eq!(ev.str_field("color"), Some("#f94144"));
    }

    #[test]
    fn json_round_trip() {
        let original = Event::new(CODE_CHANGE)
            .with_data("room", "r1")
            .with_data("code", "print(1)");

        let json = serde_json::to_string(&original).expect("serialize");
        let restored: Event = serde_json::from_str(&json).expect("deserialize");

        assert_eq!(restored.event, "code-change");
        assert_eq!(restored.str_field("room"), Some("r1"));
        assert_eq!(restored.str_field("code"), Some("print(1)"));
    }

    #[test]
    fn missing_data_defaults_to_empty() {
        let restored: Event = serde_json::from_str(r#"{"event":"join"}"#).expect("deserialize");
        assert_eq!(restored.event, "join");
        assert!(restored.data.is_empty());
    }

    #[test]
    fn str_field_ignores_non_strings() {
        let ev = Event::new(SELECTION).with_data("line", 42);
        assert_eq!(ev.str_field("line"), None);
        assert_eq!(ev.str_field("absent"), None);
    }
}
