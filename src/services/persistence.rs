//! Persistence service — debounced flush of dirty room buffers.
//!
//! DESIGN
//! ======
//! A background task wakes every second, collects the latest buffer from
//! every dirty room, clears the dirty flags, releases the lock, then saves
//! each buffer through the document store. Broadcasts never touch storage
//! I/O: a hung or failing gateway delays nothing on the relay path.
//!
//! ERROR HANDLING
//! ==============
//! Save failures are logged and dropped. The live session is best-effort
//! durable: the next edit re-dirties the room and the next tick retries with
//! newer content. Nothing is ever surfaced to an editing client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::state::AppState;

// =============================================================================
// DOCUMENT STORE
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("gateway request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("gateway returned status {0}")]
    Status(reqwest::StatusCode),
}

/// Write-only handle to the persistence gateway. The relay forwards the
/// latest buffer for a session and never reads documents back mid-session.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn save_document(&self, session_id: &str, content: &str) -> Result<(), StoreError>;
}

/// Production store: POSTs buffers to the persistence gateway over HTTP.
pub struct HttpDocumentStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDocumentStore {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), base_url: base_url.into() }
    }
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    async fn save_document(&self, session_id: &str, content: &str) -> Result<(), StoreError> {
        let url = format!("{}/session/{session_id}/save", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "content": content }))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(StoreError::Status(resp.status()));
        }
        Ok(())
    }
}

// =============================================================================
// FLUSH TASK
// =============================================================================

/// Spawn the background flush task. Returns a handle for shutdown.
pub fn spawn_flush_task(state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        loop {
            interval.tick().await;
            flush_dirty_rooms(&state).await;
        }
    })
}

/// Collect and save the latest buffer of every dirty room.
pub async fn flush_dirty_rooms(state: &AppState) {
    // Snapshot dirty buffers under the lock, then release before any I/O.
    let pending: Vec<(String, String)> = {
        let mut rooms = state.rooms.write().await;
        rooms
            .iter_mut()
            .filter(|(_, room)| room.dirty)
            .filter_map(|(room_id, room)| {
                room.dirty = false;
                room.content.clone().map(|content| (room_id.clone(), content))
            })
            .collect()
    };

    for (room_id, content) in pending {
        match state.store.save_document(&room_id, &content).await {
            Ok(()) => debug!(%room_id, bytes = content.len(), "session buffer persisted"),
            Err(e) => error!(error = %e, %room_id, "session save failed"),
        }
    }
}

/// Fire-and-forget save of one buffer, used when a room is evicted with
/// unsaved content. Detached so leave handling never waits on the gateway.
pub fn save_fire_and_forget(store: Arc<dyn DocumentStore>, room_id: String, content: String) {
    tokio::spawn(async move {
        if let Err(e) = store.save_document(&room_id, &content).await {
            error!(error = %e, %room_id, "final session save failed");
        }
    });
}

// =============================================================================
// TEST STORES
// =============================================================================


#[cfg(test)]
#[path = "persistence_test.rs"]
mod tests;
