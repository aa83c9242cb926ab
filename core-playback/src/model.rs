//! Track and queue data model.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One labelled URI for a track (a stream quality or an artwork size).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaCandidate {
    /// Quality or resolution label, e.g. `96kbps` or `500x500`.
    pub label: String,
    /// Remote URL, or a `file://` URI for downloaded content.
    pub uri: String,
}

impl MediaCandidate {
    pub fn new(label: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            uri: uri.into(),
        }
    }
}

/// Immutable metadata plus candidate URIs for one playable item.
///
/// Identity is `id`; the same track may appear more than once in a queue.
/// This is also the persisted record shape, so fields only ever get added
/// with `#[serde(default)]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub artist_display: String,
    #[serde(default)]
    pub duration_seconds: f64,
    #[serde(default)]
    pub audio_candidates: Vec<MediaCandidate>,
    #[serde(default)]
    pub artwork_candidates: Vec<MediaCandidate>,
}

impl Track {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist_display: String::new(),
            duration_seconds: 0.0,
            audio_candidates: Vec::new(),
            artwork_candidates: Vec::new(),
        }
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist_display = artist.into();
        self
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration_seconds = seconds.max(0.0);
        self
    }

    pub fn with_audio(mut self, label: impl Into<String>, uri: impl Into<String>) -> Self {
        self.audio_candidates.push(MediaCandidate::new(label, uri));
        self
    }

    pub fn with_artwork(mut self, label: impl Into<String>, uri: impl Into<String>) -> Self {
        self.artwork_candidates.push(MediaCandidate::new(label, uri));
        self
    }
}

/// Policy at queue end and on track completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    #[default]
    Off,
    All,
    One,
}

impl RepeatMode {
    /// `Off → All → One → Off`
    pub fn cycle(self) -> Self {
        match self {
            RepeatMode::Off => RepeatMode::All,
            RepeatMode::All => RepeatMode::One,
            RepeatMode::One => RepeatMode::Off,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RepeatMode::Off => "off",
            RepeatMode::All => "all",
            RepeatMode::One => "one",
        }
    }
}

impl fmt::Display for RepeatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time copy of the queue and its selection policy.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct QueueSnapshot {
    pub tracks: Vec<Track>,
    /// `None` when nothing is selected.
    pub current_index: Option<usize>,
    pub shuffle: bool,
    pub repeat: RepeatMode,
}

impl QueueSnapshot {
    pub fn current_track(&self) -> Option<&Track> {
        self.current_index.and_then(|index| self.tracks.get(index))
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeat_cycles_through_all_modes() {
        assert_eq!(RepeatMode::Off.cycle(), RepeatMode::All);
        assert_eq!(RepeatMode::All.cycle(), RepeatMode::One);
        assert_eq!(RepeatMode::One.cycle(), RepeatMode::Off);
        assert_eq!(RepeatMode::default(), RepeatMode::Off);
    }

    #[test]
    fn track_deserializes_with_missing_optional_fields() {
        let track: Track = serde_json::from_str(r#"{"id":"a","title":"Song"}"#).unwrap();
        assert_eq!(track.id, "a");
        assert!(track.audio_candidates.is_empty());
        assert_eq!(track.duration_seconds, 0.0);
    }

    #[test]
    fn snapshot_current_track() {
        let snapshot = QueueSnapshot {
            tracks: vec![Track::new("a", "A"), Track::new("b", "B")],
            current_index: Some(1),
            ..Default::default()
        };
        assert_eq!(snapshot.current_track().map(|t| t.id.as_str()), Some("b"));

        let cleared = QueueSnapshot {
            current_index: None,
            ..snapshot
        };
        assert!(cleared.current_track().is_none());
        assert_eq!(cleared.len(), 2);
    }
}
