//! Playback status and its single-writer board.
//!
//! Every status write goes through [`StatusBoard::update`], which applies the
//! position clamp before publishing. Readers either copy the latest value or
//! hold a `watch::Receiver`, so they never observe a half-written status.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

/// Why the engine entered [`PlaybackState::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The track has no usable audio candidate.
    NoPlayableSource,
    /// The backend failed to provision the resource.
    ResourceAcquisitionFailure,
    /// The load did not finish within the configured bound.
    LoadTimeout,
    /// The live resource failed mid-playback.
    StreamInterrupted,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::NoPlayableSource => "no_playable_source",
            FailureReason::ResourceAcquisitionFailure => "resource_acquisition_failure",
            FailureReason::LoadTimeout => "load_timeout",
            FailureReason::StreamInterrupted => "stream_interrupted",
        }
    }

    /// Whether re-issuing a load for the same track may succeed.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, FailureReason::NoPlayableSource)
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum PlaybackState {
    #[default]
    Idle,
    Loading,
    Playing,
    Paused,
    Error(FailureReason),
}

impl PlaybackState {
    /// `Playing` or `Paused`: a live session exists and accepts commands.
    pub fn is_active(&self) -> bool {
        matches!(self, PlaybackState::Playing | PlaybackState::Paused)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PlaybackStatus {
    pub state: PlaybackState,
    pub position_seconds: f64,
    pub duration_seconds: f64,
    pub is_playing: bool,
}

impl PlaybackStatus {
    /// Clamp `position` into `[0, duration]` (only non-negative when the
    /// duration is still unknown).
    pub fn clamp_position(position: f64, duration: f64) -> f64 {
        let position = if position.is_finite() { position.max(0.0) } else { 0.0 };
        if duration > 0.0 {
            position.min(duration)
        } else {
            position
        }
    }

    /// Bound a user seek to `[0, duration]`. Until a duration is known the
    /// only reachable position is the start.
    pub fn clamp_seek(target: f64, duration: f64) -> f64 {
        let duration = if duration.is_finite() { duration.max(0.0) } else { 0.0 };
        Self::clamp_position(target, duration).min(duration)
    }

    fn normalize(&mut self) {
        if !self.duration_seconds.is_finite() || self.duration_seconds < 0.0 {
            self.duration_seconds = 0.0;
        }
        self.position_seconds =
            Self::clamp_position(self.position_seconds, self.duration_seconds);
    }
}

/// Shared, serialized holder of the current [`PlaybackStatus`].
#[derive(Clone)]
pub struct StatusBoard {
    tx: Arc<watch::Sender<PlaybackStatus>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(PlaybackStatus::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> PlaybackStatus {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackStatus> {
        self.tx.subscribe()
    }

    /// Apply `f` to the status and publish the clamped result.
    pub fn update<F>(&self, f: F) -> PlaybackStatus
    where
        F: FnOnce(&mut PlaybackStatus),
    {
        let mut published = PlaybackStatus::default();
        self.tx.send_modify(|status| {
            f(status);
            status.normalize();
            published = *status;
        });
        published
    }

    /// Back to zeroed `Idle`.
    pub fn reset(&self) {
        self.tx.send_replace(PlaybackStatus::default());
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StatusBoard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusBoard")
            .field("status", &self.current())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_clamps_position() {
        let board = StatusBoard::new();

        let status = board.update(|s| {
            s.duration_seconds = 100.0;
            s.position_seconds = 250.0;
        });
        assert_eq!(status.position_seconds, 100.0);

        let status = board.update(|s| s.position_seconds = -4.0);
        assert_eq!(status.position_seconds, 0.0);

        let status = board.update(|s| s.position_seconds = f64::NAN);
        assert_eq!(status.position_seconds, 0.0);
    }

    #[test]
    fn unknown_duration_only_floors_position() {
        let board = StatusBoard::new();
        let status = board.update(|s| s.position_seconds = 42.0);
        assert_eq!(status.position_seconds, 42.0);
        assert_eq!(status.duration_seconds, 0.0);
    }

    #[test]
    fn seek_targets_are_bounded_by_duration() {
        assert_eq!(PlaybackStatus::clamp_seek(50.0, 0.0), 0.0);
        assert_eq!(PlaybackStatus::clamp_seek(50.0, f64::NAN), 0.0);
        assert_eq!(PlaybackStatus::clamp_seek(250.0, 180.0), 180.0);
        assert_eq!(PlaybackStatus::clamp_seek(-1.0, 180.0), 0.0);
        assert_eq!(PlaybackStatus::clamp_seek(42.5, 180.0), 42.5);
    }

    #[tokio::test]
    async fn subscribers_see_updates_and_reset() {
        let board = StatusBoard::new();
        let mut rx = board.subscribe();

        board.update(|s| {
            s.state = PlaybackState::Playing;
            s.is_playing = true;
        });
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().state, PlaybackState::Playing);

        board.reset();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), PlaybackStatus::default());
    }

    #[test]
    fn failure_reasons() {
        assert!(!FailureReason::NoPlayableSource.is_recoverable());
        assert!(FailureReason::LoadTimeout.is_recoverable());
        assert_eq!(
            FailureReason::ResourceAcquisitionFailure.to_string(),
            "resource_acquisition_failure"
        );
        assert!(PlaybackState::Paused.is_active());
        assert!(!PlaybackState::Error(FailureReason::LoadTimeout).is_active());
    }
}
