//! Room service — join protocol, duplicate reconciliation, leave, fan-out.
//!
//! DESIGN
//! ======
//! Rooms are created lazily on first join and evicted from memory on last
//! disconnect. The client sender map is authoritative membership; presence
//! metadata rides alongside it keyed by connection id.
//!
//! The join protocol runs entirely under the room write lock so roster
//! snapshots are consistent: a stale duplicate is evicted and its exit
//! broadcast before the joiner enters the group, which means the joiner
//! never observes the stale entry and the evictee never sees its own exit.
//!
//! COLOR ASSIGNMENT
//! ================
//! Each room keeps a monotonic join counter; the k-th join in the room's
//! history gets `PALETTE[(k-1) % N]`. The counter never decrements, so
//! colors stay stable under churn. Colors repeat past the palette size.

use tracing::info;
use uuid::Uuid;

use crate::event::{self, Event};
use crate::services::persistence;
use crate::state::{AppState, Presence, RoomState};

/// Fixed cursor-color palette, cycled per room join order.
pub const PALETTE: &[&str] = &[
    "#f94144", "#f3722c", "#f9c74f", "#90be6d", "#43aa8b", "#577590",
];

// =============================================================================
// JOIN
// =============================================================================

/// Run the join protocol for a connection.
///
/// Evicts a stale presence for the same display name (page refresh or a
/// duplicate tab), assigns the next palette color, installs the presence,
/// and broadcasts `exit` / `connected` / `userdata` / `joined` in that
/// order. A room holding buffered content additionally syncs it to the
/// joiner so a late arrival sees the current document immediately.
pub async fn join(
    state: &AppState,
    room_id: &str,
    conn_id: Uuid,
    user: &str,
    tx: tokio::sync::mpsc::Sender<Event>,
) {
    let mut rooms = state.rooms.write().await;
    let room = rooms.entry(room_id.to_string()).or_default();

    // Reconcile a duplicate: same display name on a different connection.
    let stale = room
        .presences
        .iter()
        .find(|(id, p)| **id != conn_id && p.user == user)
        .map(|(id, _)| *id);
    if let Some(stale_id) = stale {
        room.presences.remove(&stale_id);
        let exit = Event::new(event::EXIT)
            .with_data("connection_id", stale_id.to_string())
            .with_data("user", user);
        // Before the joiner enters the group: the evictee must not see its
        // own exit, and the joiner must not see the stale entry at all.
        send_to_room(room, &exit, Some(stale_id));
        info!(%room_id, %stale_id, user, "evicted stale duplicate presence");
    }

    let color = PALETTE[usize::try_from(room.joins).unwrap_or(0) % PALETTE.len()];
    room.joins += 1;

    room.presences.insert(
        conn_id,
        Presence { user: user.to_string(), color: color.to_string(), room: room_id.to_string() },
    );
    room.clients.insert(conn_id, tx);

    let connected = Event::new(event::CONNECTED)
        .with_data("user", user)
        .with_data("color", color);
    send_to_room(room, &connected, Some(conn_id));

    let roster = serde_json::to_value(room.roster()).unwrap_or_default();
    let userdata = Event::new(event::USERDATA).with_data("clients", roster.clone());
    send_to_room(room, &userdata, None);

    let joined = Event::new(event::JOINED)
        .with_data("clients", roster)
        .with_data("user", serde_json::json!({ "user": user }))
        .with_data("connection_id", conn_id.to_string());
    send_to_room(room, &joined, None);

    if let Some(content) = &room.content {
        let sync = Event::new(event::SYNC_CODE).with_data("content", content.as_str());
        if let Some(joiner) = room.clients.get(&conn_id) {
            let _ = joiner.try_send(sync);
        }
    }

    info!(%room_id, %conn_id, user, color, clients = room.clients.len(), "client joined room");
}

// =============================================================================
// DISCONNECT
// =============================================================================

/// Tear down a connection's room state.
///
/// Broadcasts `exit` only when this was the user's last connection in the
/// room; a second tab keeps the user present. Evicts the room on last
/// disconnect, firing a final save if unsaved content remains.
pub async fn disconnect(state: &AppState, room_id: &str, conn_id: Uuid) {
    let mut rooms = state.rooms.write().await;
    let Some(room) = rooms.get_mut(room_id) else {
        return;
    };

    room.clients.remove(&conn_id);

    if let Some(presence) = room.presences.remove(&conn_id) {
        let still_present = room.presences.values().any(|p| p.user == presence.user);
        if still_present {
            info!(%room_id, %conn_id, user = presence.user, "connection closed, user still present");
        } else {
            let exit = Event::new(event::EXIT)
                .with_data("connection_id", conn_id.to_string())
                .with_data("user", presence.user.as_str());
            send_to_room(room, &exit, None);
            info!(%room_id, %conn_id, user = presence.user, "user left room");
        }
    }

    if room.clients.is_empty() {
        let unsaved = room.dirty.then(|| room.content.clone()).flatten();
        rooms.remove(room_id);
        info!(%room_id, "evicted room from memory");

        if let Some(content) = unsaved {
            persistence::save_fire_and_forget(state.store.clone(), room_id.to_string(), content);
        }
    }
}

// =============================================================================
// BROADCAST
// =============================================================================

/// Fan an event out to every client sender, skipping `exclude`.
/// Best-effort: a client with a full channel is skipped, never awaited.
pub fn send_to_room(room: &RoomState, ev: &Event, exclude: Option<Uuid>) {
    for (conn_id, tx) in &room.clients {
        if exclude == Some(*conn_id) {
            continue;
        }
        let _ = tx.try_send(ev.clone());
    }
}

#[cfg(test)]
#[path = "room_test.rs"]
mod tests;
