//! Queue persistence through the host settings store.
//!
//! Only the ordered track list is stored, as one JSON array under a single
//! key, rewritten in full on every queue mutation. Writes happen on a
//! background task fed by a `watch` channel: `save` never waits, and a burst
//! of mutations collapses into the latest list.

use crate::error::Result;
use crate::model::Track;
use bridge_traits::SettingsStore;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Clone, Default)]
struct PendingWrite {
    generation: u64,
    tracks: Arc<Vec<Track>>,
}

/// Handle to the queue writer task.
pub struct QueuePersistence {
    store: Arc<dyn SettingsStore>,
    key: String,
    pending: watch::Sender<PendingWrite>,
    written: watch::Receiver<u64>,
    writer: JoinHandle<()>,
}

impl QueuePersistence {
    /// Start the writer task. Must be called from within a Tokio runtime.
    pub fn spawn(store: Arc<dyn SettingsStore>, key: impl Into<String>) -> Self {
        let key = key.into();
        let (pending, pending_rx) = watch::channel(PendingWrite::default());
        let (written_tx, written) = watch::channel(0u64);

        let writer = tokio::spawn(run_writer(
            Arc::clone(&store),
            key.clone(),
            pending_rx,
            written_tx,
        ));

        Self {
            store,
            key,
            pending,
            written,
            writer,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Schedule a full rewrite of the stored queue. Never blocks.
    pub fn save(&self, tracks: Vec<Track>) {
        let tracks = Arc::new(tracks);
        self.pending.send_modify(|pending| {
            pending.generation += 1;
            pending.tracks = tracks;
        });
    }

    /// Wait until the most recently scheduled list has been written (or its
    /// write has failed and been logged).
    pub async fn flush(&self) {
        let target = self.pending.borrow().generation;
        let mut written = self.written.clone();
        if written.wait_for(|done| *done >= target).await.is_err() {
            warn!("Queue writer stopped before flushing");
        }
    }

    /// Read the stored track list. A missing, unreadable or corrupt value
    /// yields an empty list.
    pub async fn load(&self) -> Vec<Track> {
        match self.read_stored().await {
            Ok(tracks) => tracks,
            Err(e) => {
                warn!(key = %self.key, error = %e, "Discarding unreadable stored queue");
                Vec::new()
            }
        }
    }

    async fn read_stored(&self) -> Result<Vec<Track>> {
        let Some(raw) = self.store.get_string(&self.key).await? else {
            debug!(key = %self.key, "No stored queue");
            return Ok(Vec::new());
        };

        let tracks: Vec<Track> = serde_json::from_str(&raw)?;
        debug!(key = %self.key, count = tracks.len(), "Loaded stored queue");
        Ok(tracks)
    }

    /// Flush outstanding writes and stop the writer task.
    pub async fn shutdown(&self) {
        self.flush().await;
        self.writer.abort();
    }
}

impl Drop for QueuePersistence {
    fn drop(&mut self) {
        self.writer.abort();
    }
}

async fn run_writer(
    store: Arc<dyn SettingsStore>,
    key: String,
    mut pending: watch::Receiver<PendingWrite>,
    written: watch::Sender<u64>,
) {
    while pending.changed().await.is_ok() {
        let PendingWrite { generation, tracks } = pending.borrow_and_update().clone();

        match serde_json::to_string(tracks.as_slice()) {
            Ok(json) => match store.set_string(&key, &json).await {
                Ok(()) => debug!(key = %key, count = tracks.len(), generation, "Persisted queue"),
                Err(e) => warn!(key = %key, error = %e, "Failed to persist queue"),
            },
            Err(e) => warn!(key = %key, error = %e, "Failed to serialize queue"),
        }

        written.send_replace(generation);
    }
}
