//! # Playback Error Types

use bridge_traits::BridgeError;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during playback and queue operations.
///
/// None of these are fatal to the process: the engine records the failure
/// in its status and callers may log or ignore the returned error.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Load Errors
    // ========================================================================
    /// The track has no audio candidate at all.
    #[error("No playable source for track {0}")]
    NoPlayableSource(String),

    /// The backend could not provision the audio resource.
    #[error("Failed to acquire audio resource for track {track_id}: {source}")]
    ResourceAcquisition {
        track_id: String,
        #[source]
        source: BridgeError,
    },

    /// The whole load, retries included, exceeded the configured bound.
    #[error("Loading track {track_id} timed out after {timeout:?}")]
    LoadTimeout { track_id: String, timeout: Duration },

    // ========================================================================
    // Session Errors
    // ========================================================================
    /// The live resource failed after it started playing.
    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    /// A control call on the live session failed.
    #[error("Session error: {0}")]
    Session(#[from] BridgeError),

    // ========================================================================
    // Persistence Errors
    // ========================================================================
    #[error("Queue serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    /// Returns `true` if re-issuing the load may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            PlaybackError::ResourceAcquisition { source, .. } => source.is_transient(),
            PlaybackError::LoadTimeout { .. } | PlaybackError::StreamInterrupted(_) => true,
            PlaybackError::Session(source) => source.is_transient(),
            _ => false,
        }
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        let timeout = PlaybackError::LoadTimeout {
            track_id: "a".into(),
            timeout: Duration::from_secs(15),
        };
        assert!(timeout.is_transient());
        assert!(!PlaybackError::NoPlayableSource("a".into()).is_transient());

        let refused = PlaybackError::ResourceAcquisition {
            track_id: "a".into(),
            source: BridgeError::NotAvailable("codec".into()),
        };
        assert!(!refused.is_transient());
        assert!(refused.to_string().contains("track a"));
    }
}
