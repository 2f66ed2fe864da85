//! WebSocket handler — bidirectional event relay.
//!
//! DESIGN
//! ======
//! On upgrade, generates a connection ID and enters a `select!` loop:
//! - Incoming client events → parse + dispatch by event name
//! - Broadcast events from room peers → forward to client
//!
//! Dispatch is per-event fault-isolated: a malformed or unknown message is
//! logged and dropped, and only that event is lost. Handlers validate and
//! drop rather than error back to the client; the relay has no user-visible
//! error channel.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → connection id assigned
//! 2. Client sends `join` → join protocol → roster broadcasts
//! 3. `code-change` / `selection` → fan-out to room peers
//! 4. Close → disconnect protocol → `exit` broadcast when last connection

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::event::{self, Event};
use crate::services::{editor, room};
use crate::state::AppState;

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState) {
    let conn_id = Uuid::new_v4();

    // Per-connection channel for receiving broadcast events from peers.
    let (client_tx, mut client_rx) = mpsc::channel::<Event>(256);

    info!(%conn_id, "ws: client connected");

    // Room this connection has joined, if any.
    let mut current_room: Option<String> = None;

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        dispatch_event(&state, &mut current_room, conn_id, &client_tx, &text).await;
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(ev) = client_rx.recv() => {
                if send_event(&mut socket, &ev).await.is_err() {
                    break;
                }
            }
        }
    }

    if let Some(room_id) = current_room {
        room::disconnect(&state, &room_id, conn_id).await;
    }
    info!(%conn_id, "ws: client disconnected");
}

// =============================================================================
// EVENT DISPATCH
// =============================================================================

/// Parse one inbound text frame and dispatch by event name. Invalid input
/// is logged and dropped so one bad message never tears down the relay.
async fn dispatch_event(
    state: &AppState,
    current_room: &mut Option<String>,
    conn_id: Uuid,
    client_tx: &mpsc::Sender<Event>,
    text: &str,
) {
    let ev: Event = match serde_json::from_str(text) {
        Ok(ev) => ev,
        Err(e) => {
            warn!(%conn_id, error = %e, "ws: invalid inbound event");
            return;
        }
    };

    match ev.event.as_str() {
        event::JOIN => {
            let room_id = ev.str_field("room").unwrap_or_default();
            let user = ev.str_field("user").unwrap_or_default();
            if room_id.is_empty() || user.is_empty() {
                warn!(%conn_id, "ws: join missing room or user");
                return;
            }

            // Leave the previous room first; a connection is in one room.
            if let Some(old_room) = current_room.take() {
                if old_room != room_id {
                    room::disconnect(state, &old_room, conn_id).await;
                }
            }

            room::join(state, room_id, conn_id, user, client_tx.clone()).await;
            *current_room = Some(room_id.to_string());
        }
        event::CODE_CHANGE => {
            let Some(room_id) = ev.str_field("room") else {
                warn!(%conn_id, "ws: code-change missing room");
                return;
            };
            let code = ev.str_field("code").unwrap_or_default();
            let raw_content = ev.str_field("raw_content");
            editor::code_change(state, room_id, conn_id, code, raw_content).await;
        }
        event::SELECTION => {
            let Some(room_id) = current_room.as_deref() else {
                // Selection before join: drop silently.
                return;
            };
            editor::selection(state, room_id, conn_id, ev.data).await;
        }
        other => {
            warn!(%conn_id, event = other, "ws: unknown event");
        }
    }
}

// =============================================================================
// HELPERS
// =============================================================================

async fn send_event(socket: &mut WebSocket, ev: &Event) -> Result<(), ()> {
    let json = match serde_json::to_string(ev) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize event");
            return Err(());
        }
    };
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
