//! # Transport Controller
//!
//! Composes the queue manager and the playback engine into the operations
//! a player UI issues: set a queue, skip, go back, toggle play, seek. Queue
//! changes are announced on the event bus; engine changes are announced by
//! the engine itself.

use crate::engine::{LoadOutcome, PlaybackEngine};
use crate::error::Result;
use crate::model::{QueueSnapshot, RepeatMode, Track};
use crate::queue::{PrevAction, QueueManager, Removal};
use crate::status::PlaybackStatus;
use core_runtime::events::{CoreEvent, EventBus, QueueEvent};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, instrument};

pub struct TransportController {
    queue: Arc<QueueManager>,
    engine: Arc<PlaybackEngine>,
    events: EventBus,
}

impl TransportController {
    pub fn new(queue: Arc<QueueManager>, engine: Arc<PlaybackEngine>, events: EventBus) -> Self {
        Self {
            queue,
            engine,
            events,
        }
    }

    pub fn queue_manager(&self) -> &Arc<QueueManager> {
        &self.queue
    }

    pub fn engine(&self) -> &Arc<PlaybackEngine> {
        &self.engine
    }

    fn emit(&self, event: QueueEvent) {
        let _ = self.events.emit(CoreEvent::Queue(event));
    }

    async fn load_selected(&self, index: usize, track: Track) -> Result<LoadOutcome> {
        self.emit(QueueEvent::CursorMoved {
            index,
            track_id: track.id.clone(),
        });
        self.engine.load_track(track).await
    }

    /// Replace the queue and start playing the entry at `start_index`.
    /// Returns `None` when the new queue is empty.
    #[instrument(skip(self, tracks), fields(length = tracks.len()))]
    pub async fn set_queue(
        &self,
        tracks: Vec<Track>,
        start_index: usize,
    ) -> Result<Option<LoadOutcome>> {
        let selected = self.queue.set_queue(tracks, start_index);
        let index = self.queue.current_index();
        self.emit(QueueEvent::Replaced {
            length: self.queue.len(),
            index,
        });

        match (index, selected) {
            (Some(index), Some(track)) => self.load_selected(index, track).await.map(Some),
            _ => Ok(None),
        }
    }

    /// Advance per shuffle/repeat. Returns `None`, leaving playback
    /// untouched, when there is nowhere to go.
    pub async fn next(&self) -> Result<Option<LoadOutcome>> {
        let Some((index, track)) = self.queue.advance() else {
            debug!("next: end of queue");
            return Ok(None);
        };
        self.load_selected(index, track).await.map(Some)
    }

    /// Advance after the track decided under `epoch` completed. Superseded
    /// when playback was stopped in between, so a stop is never undone by
    /// a late completion.
    pub async fn advance_after_completion(&self, epoch: u64) -> Result<Option<LoadOutcome>> {
        if self.engine.stop_epoch() != epoch {
            debug!("Stopped since completion, not advancing");
            return Ok(Some(LoadOutcome::Superseded));
        }
        let Some((index, track)) = self.queue.advance() else {
            return Ok(None);
        };
        self.emit(QueueEvent::CursorMoved {
            index,
            track_id: track.id.clone(),
        });
        self.engine
            .load_track_unless_stopped(track, epoch)
            .await
            .map(Some)
    }

    /// Restart the current track, or step back one entry when near its start.
    pub async fn prev(&self) -> Result<()> {
        let position = self.engine.status().position_seconds;
        match self.queue.compute_prev(position) {
            Some(PrevAction::Restart) => {
                self.engine.restart().await?;
            }
            Some(PrevAction::Jump(index)) => {
                if let Some(track) = self.queue.select(index) {
                    self.load_selected(index, track).await?;
                }
            }
            None => debug!("prev: empty queue"),
        }
        Ok(())
    }

    /// Play the entry at `index`.
    pub async fn skip_to(&self, index: usize) -> Result<Option<LoadOutcome>> {
        match self.queue.select(index) {
            Some(track) => self.load_selected(index, track).await.map(Some),
            None => Ok(None),
        }
    }

    /// Play a single track without touching the queue.
    pub async fn play_now(&self, track: Track) -> Result<LoadOutcome> {
        self.engine.load_track(track).await
    }

    pub async fn play_pause(&self) -> Result<()> {
        self.engine.play_pause().await
    }

    pub async fn seek(&self, position_seconds: f64) -> Result<Option<f64>> {
        self.engine.seek(position_seconds).await
    }

    pub async fn stop(&self) {
        self.engine.stop().await
    }

    /// Publish a host-reported position and duration.
    pub fn update_position(&self, position_seconds: f64, duration_seconds: f64) -> PlaybackStatus {
        self.engine.update_position(position_seconds, duration_seconds)
    }

    pub fn toggle_shuffle(&self) -> bool {
        let enabled = self.queue.toggle_shuffle();
        self.emit(QueueEvent::ShuffleChanged { enabled });
        enabled
    }

    pub fn cycle_repeat(&self) -> RepeatMode {
        let mode = self.queue.cycle_repeat();
        self.emit(QueueEvent::RepeatChanged {
            mode: mode.as_str().to_string(),
        });
        mode
    }

    /// Add to the end of the queue; returns the new length.
    pub fn append(&self, track: Track) -> usize {
        let track_id = track.id.clone();
        let length = self.queue.append(track);
        self.emit(QueueEvent::Appended { track_id, length });
        length
    }

    /// Remove a queue entry. Removing the playing entry does not interrupt
    /// playback; the cursor simply moves to its neighbour.
    pub fn remove_at(&self, index: usize) -> Option<Removal> {
        let removal = self.queue.remove_at(index)?;
        self.emit(QueueEvent::Removed {
            index,
            track_id: removal.track.id.clone(),
            current_index: removal.current_index,
        });
        Some(removal)
    }

    /// Move a queue entry; the selection follows the selected track.
    pub fn reorder(&self, from: usize, to: usize) -> Option<Option<usize>> {
        let current_index = self.queue.reorder(from, to)?;
        self.emit(QueueEvent::Reordered {
            from,
            to,
            current_index,
        });
        Some(current_index)
    }

    pub fn queue(&self) -> QueueSnapshot {
        self.queue.snapshot()
    }

    pub fn status(&self) -> PlaybackStatus {
        self.engine.status()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<PlaybackStatus> {
        self.engine.status_board().subscribe()
    }

    /// The track handed to the engine most recently (queue entry or `play_now`).
    pub fn current_track(&self) -> Option<Track> {
        self.engine.current_track()
    }

    pub fn current_artwork(&self) -> Option<String> {
        self.engine.current_artwork()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.queue.current_index()
    }
}

impl std::fmt::Debug for TransportController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportController")
            .field("queue", &self.queue)
            .field("engine", &self.engine)
            .finish()
    }
}
