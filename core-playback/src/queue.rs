//! # Queue Manager
//!
//! Owns the ordered track list, the cursor and the selection policy
//! (shuffle, repeat). All mutations happen under one `parking_lot` mutex
//! that is never held across an `.await`; every mutation of the track list
//! schedules a persistence write after the lock is released.
//!
//! The cursor is `Option<usize>`. `None` means nothing is selected and
//! behaves like a position before the first entry when stepping.

use crate::model::{QueueSnapshot, RepeatMode, Track};
use crate::persistence::QueuePersistence;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// What "previous" should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrevAction {
    /// Seek the current track back to the start.
    Restart,
    /// Select and load the entry at this index.
    Jump(usize),
}

/// Result of removing an entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Removal {
    pub track: Track,
    pub index: usize,
    /// The removed entry was the selected one.
    pub was_current: bool,
    pub current_index: Option<usize>,
}

#[derive(Debug, Default)]
struct QueueState {
    tracks: Vec<Track>,
    current: Option<usize>,
    shuffle: bool,
    repeat: RepeatMode,
}

impl QueueState {
    fn next_index(&self, rng: &mut StdRng) -> Option<usize> {
        let len = self.tracks.len();
        if len == 0 {
            return None;
        }

        if self.shuffle {
            // May pick the current entry again.
            return Some(rng.gen_range(0..len));
        }

        let candidate = self.current.map_or(0, |current| current + 1);
        if candidate < len {
            Some(candidate)
        } else if self.repeat == RepeatMode::All {
            Some(0)
        } else {
            None
        }
    }

    fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            tracks: self.tracks.clone(),
            current_index: self.current,
            shuffle: self.shuffle,
            repeat: self.repeat,
        }
    }
}

pub struct QueueManager {
    state: Mutex<QueueState>,
    rng: Mutex<StdRng>,
    persistence: Option<Arc<QueuePersistence>>,
    restart_threshold: Duration,
}

impl QueueManager {
    pub fn new(restart_threshold: Duration) -> Self {
        Self::with_rng(restart_threshold, StdRng::from_entropy())
    }

    /// Construct with a fixed RNG (deterministic shuffle in tests).
    pub fn with_rng(restart_threshold: Duration, rng: StdRng) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            rng: Mutex::new(rng),
            persistence: None,
            restart_threshold,
        }
    }

    /// Write the track list through `persistence` after every mutation.
    pub fn with_persistence(mut self, persistence: Arc<QueuePersistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    fn persist(&self, tracks: Vec<Track>) {
        if let Some(persistence) = &self.persistence {
            persistence.save(tracks);
        }
    }

    /// Replace the queue wholesale and select `start_index` (clamped into
    /// range). Returns the selected track.
    pub fn set_queue(&self, tracks: Vec<Track>, start_index: usize) -> Option<Track> {
        let (selected, saved) = {
            let mut state = self.state.lock();
            state.tracks = tracks;
            state.current = if state.tracks.is_empty() {
                None
            } else {
                Some(start_index.min(state.tracks.len() - 1))
            };
            let selected = state.current.map(|index| state.tracks[index].clone());
            (selected, state.tracks.clone())
        };

        debug!(length = saved.len(), start_index, "Queue replaced");
        self.persist(saved);
        selected
    }

    /// Add to the tail; the cursor does not move. Returns the new length.
    pub fn append(&self, track: Track) -> usize {
        let saved = {
            let mut state = self.state.lock();
            state.tracks.push(track);
            state.tracks.clone()
        };

        let length = saved.len();
        self.persist(saved);
        length
    }

    /// Remove the entry at `index`. Out of range is a no-op returning `None`.
    ///
    /// Removing an entry before the cursor shifts the cursor down. Removing
    /// the selected entry leaves the cursor on the same slot (clamped to the
    /// new last index, or `None` if the queue is now empty).
    pub fn remove_at(&self, index: usize) -> Option<Removal> {
        let (removal, saved) = {
            let mut state = self.state.lock();
            if index >= state.tracks.len() {
                return None;
            }

            let track = state.tracks.remove(index);
            let len = state.tracks.len();
            let was_current = state.current == Some(index);

            state.current = match state.current {
                Some(current) if index < current => Some(current - 1),
                Some(current) if index == current => {
                    if len == 0 {
                        None
                    } else {
                        Some(current.min(len - 1))
                    }
                }
                other => other,
            };

            let removal = Removal {
                track,
                index,
                was_current,
                current_index: state.current,
            };
            (removal, state.tracks.clone())
        };

        self.persist(saved);
        Some(removal)
    }

    /// Move the entry at `from` to `to` (clamped into range). The cursor
    /// follows the selected entry. Returns the new cursor, or `None` when
    /// `from` is out of range.
    pub fn reorder(&self, from: usize, to: usize) -> Option<Option<usize>> {
        let (current, saved) = {
            let mut state = self.state.lock();
            let len = state.tracks.len();
            if from >= len {
                return None;
            }
            let to = to.min(len - 1);

            let track = state.tracks.remove(from);
            state.tracks.insert(to, track);

            state.current = state.current.map(|current| {
                if current == from {
                    to
                } else if from < current && current <= to {
                    current - 1
                } else if to <= current && current < from {
                    current + 1
                } else {
                    current
                }
            });

            (state.current, state.tracks.clone())
        };

        self.persist(saved);
        Some(current)
    }

    /// Index `next` would select, without moving the cursor.
    pub fn compute_next(&self) -> Option<usize> {
        let state = self.state.lock();
        let mut rng = self.rng.lock();
        state.next_index(&mut rng)
    }

    /// Compute the next index and select it in one step.
    pub fn advance(&self) -> Option<(usize, Track)> {
        let mut state = self.state.lock();
        let index = {
            let mut rng = self.rng.lock();
            state.next_index(&mut rng)?
        };
        state.current = Some(index);
        Some((index, state.tracks[index].clone()))
    }

    /// Decide what "previous" does given the current playback position.
    pub fn compute_prev(&self, position_seconds: f64) -> Option<PrevAction> {
        let state = self.state.lock();
        if state.tracks.is_empty() {
            return None;
        }

        if position_seconds > self.restart_threshold.as_secs_f64() {
            return Some(PrevAction::Restart);
        }

        let index = state.current.map_or(0, |current| current.saturating_sub(1));
        Some(PrevAction::Jump(index))
    }

    /// Move the cursor to `index`. Out of range is a no-op returning `None`.
    pub fn select(&self, index: usize) -> Option<Track> {
        let mut state = self.state.lock();
        let track = state.tracks.get(index)?.clone();
        state.current = Some(index);
        Some(track)
    }

    /// Flip shuffle; returns the new value.
    pub fn toggle_shuffle(&self) -> bool {
        let mut state = self.state.lock();
        state.shuffle = !state.shuffle;
        state.shuffle
    }

    /// Advance `Off → All → One → Off`; returns the new mode.
    pub fn cycle_repeat(&self) -> RepeatMode {
        let mut state = self.state.lock();
        state.repeat = state.repeat.cycle();
        state.repeat
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.state.lock().repeat
    }

    pub fn shuffle(&self) -> bool {
        self.state.lock().shuffle
    }

    /// Cold start: install a stored track list with no selection and
    /// without writing it back.
    pub fn restore(&self, tracks: Vec<Track>) {
        let mut state = self.state.lock();
        state.tracks = tracks;
        state.current = None;
    }

    pub fn current_index(&self) -> Option<usize> {
        self.state.lock().current
    }

    pub fn current_track(&self) -> Option<Track> {
        let state = self.state.lock();
        state.current.and_then(|index| state.tracks.get(index).cloned())
    }

    pub fn len(&self) -> usize {
        self.state.lock().tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().tracks.is_empty()
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        self.state.lock().snapshot()
    }
}

impl std::fmt::Debug for QueueManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("QueueManager")
            .field("length", &state.tracks.len())
            .field("current", &state.current)
            .field("shuffle", &state.shuffle)
            .field("repeat", &state.repeat)
            .finish()
    }
}
