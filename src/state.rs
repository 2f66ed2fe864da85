//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds the document store handle and a map of live room states. Each room
//! has its connected clients, per-connection presence metadata, a monotonic
//! join counter for color assignment, and the latest document buffer pending
//! persistence.
//!
//! The client sender map is the single source of truth for room membership;
//! `presences` carries only metadata keyed by connection id, so the two can
//! never diverge into the stale-roster class of bug.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::event::Event;
use crate::services::persistence::DocumentStore;

// =============================================================================
// PRESENCE
// =============================================================================

/// Per-connection presence metadata. The roster sent to clients is the list
/// of these records for a room, so the wire shape is the struct itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Presence {
    pub user: String,
    pub color: String,
    pub room: String,
}

// =============================================================================
// ROOM STATE
// =============================================================================

/// Per-room live state. Exists only while the room has at least one client;
/// evicted from the map on last disconnect.
pub struct RoomState {
    /// Connected clients: connection id -> sender for outgoing events.
    /// Authoritative room membership.
    pub clients: HashMap<Uuid, mpsc::Sender<Event>>,
    /// Presence metadata keyed by connection id.
    pub presences: HashMap<Uuid, Presence>,
    /// Monotonic join counter. Never decremented on leave, so the k-th join
    /// in a room's history always lands on the same palette slot.
    pub joins: u64,
    /// Latest raw document buffer received from any client.
    pub content: Option<String>,
    /// Whether `content` has changed since the last flush.
    pub dirty: bool,
}

impl RoomState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            clients: HashMap::new(),
            presences: HashMap::new(),
            joins: 0,
            content: None,
            dirty: false,
        }
    }

    /// Roster snapshot for wire payloads.
    #[must_use]
    pub fn roster(&self) -> Vec<Presence> {
        self.presences.values().cloned().collect()
    }
}

impl Default for RoomState {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum — all inner fields are Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    pub rooms: Arc<RwLock<HashMap<String, RoomState>>>,
    pub store: Arc<dyn DocumentStore>,
}

impl AppState {
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { rooms: Arc::new(RwLock::new(HashMap::new())), store }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
pub mod test_helpers {
    use super::*;
    use crate::services::persistence::test_store::MemoryStore;

    /// Create a test `AppState` backed by an in-memory store, returning the
    /// store handle so tests can inspect what got persisted.
    #[must_use]
    pub fn test_app_state() -> (AppState, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (AppState::new(store.clone()), store)
    }

    /// Create a test `AppState` over an arbitrary store implementation.
    #[must_use]
    pub fn test_app_state_with_store(store: Arc<dyn DocumentStore>) -> AppState {
        AppState::new(store)
    }

    /// Register a fake client in a room and return its connection id and
    /// receiving end. Bypasses the join protocol: no presence is created.
    pub async fn attach_client(state: &AppState, room: &str) -> (Uuid, mpsc::Receiver<Event>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(16);
        let mut rooms = state.rooms.write().await;
        rooms
            .entry(room.to_string())
            .or_default()
            .clients
            .insert(conn_id, tx);
        (conn_id, rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_state_new_is_empty() {
        let room = RoomState::new();
        assert!(room.clients.is_empty());
        assert!(room.presences.is_empty());
        assert_eq!(room.joins, 0);
        assert!(room.content.is_none());
        assert!(!room.dirty);
    }

    #[test]
    fn presence_serde_round_trip() {
        let p = Presence { user: "alice".into(), color: "#f94144".into(), room: "r1".into() };
        let json = serde_json::to_string(&p).unwrap();
        let restored: Presence = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.user, "alice");
        assert_eq!(restored.color, "#f94144");
        assert_eq!(restored.room, "r1");
    }

    #[test]
    fn roster_reflects_presences() {
        let mut room = RoomState::new();
        room.presences.insert(
            Uuid::new_v4(),
            Presence { user: "bob".into(), color: "#577590".into(), room: "r1".into() },
        );
        let roster = room.roster();
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].user, "bob");
    }
}
