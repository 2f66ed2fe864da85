//! Editor service — code-change and selection fan-out.
//!
//! DESIGN
//! ======
//! `code-change` is the latency-critical path: the buffer is relayed to
//! peers immediately and the raw content is only recorded for the flush
//! task, so the broadcast never waits on storage. Selections are purely
//! ephemeral: broadcast to room peers and immediately forgotten.

use uuid::Uuid;

use crate::event::{self, Data, Event};
use crate::services::room;
use crate::state::AppState;

/// Relay a code change to all room peers except the sender, recording the
/// raw buffer for asynchronous persistence when present.
pub async fn code_change(
    state: &AppState,
    room_id: &str,
    conn_id: Uuid,
    code: &str,
    raw_content: Option<&str>,
) {
    let mut rooms = state.rooms.write().await;
    let Some(room_state) = rooms.get_mut(room_id) else {
        return;
    };

    let ev = Event::new(event::CODE_CHANGE).with_data("code", code);
    room::send_to_room(room_state, &ev, Some(conn_id));

    if let Some(raw) = raw_content {
        room_state.content = Some(raw.to_string());
        room_state.dirty = true;
    }
}

/// Relay a selection to all room peers except the sender, with the sender's
/// color and display name injected. Dropped silently when the sender has no
/// presence (never joined, or evicted by a duplicate reconnect).
pub async fn selection(state: &AppState, room_id: &str, conn_id: Uuid, cursor: Data) {
    let rooms = state.rooms.read().await;
    let Some(room_state) = rooms.get(room_id) else {
        return;
    };
    let Some(presence) = room_state.presences.get(&conn_id) else {
        return;
    };

    let mut data = cursor;
    data.insert("color".into(), serde_json::json!(presence.color));
    data.insert("user".into(), serde_json::json!(presence.user));

    let ev = Event::with_payload(event::SELECTION, data);
    room::send_to_room(room_state, &ev, Some(conn_id));
}

#[cfg(test)]
#[path = "editor_test.rs"]
mod tests;
