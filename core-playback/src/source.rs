//! Candidate selection for audio streams and artwork.
//!
//! A candidate whose label equals the preferred label wins. Otherwise the
//! last listed candidate with a non-empty URI is used.

use crate::model::{MediaCandidate, Track};
use bridge_traits::AudioSource;

/// Pick the preferred candidate, falling back to the last entry.
pub fn select_candidate<'a>(
    candidates: &'a [MediaCandidate],
    preferred_label: &str,
) -> Option<&'a MediaCandidate> {
    candidates
        .iter()
        .find(|candidate| candidate.label == preferred_label && !candidate.uri.is_empty())
        .or_else(|| candidates.iter().rev().find(|candidate| !candidate.uri.is_empty()))
}

/// A playable source chosen for a track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    pub label: String,
    pub uri: String,
    pub source: AudioSource,
}

/// Resolve the audio source for `track`, or `None` when it has no usable candidate.
pub fn resolve_audio_source(track: &Track, preferred_quality: &str) -> Option<ResolvedSource> {
    select_candidate(&track.audio_candidates, preferred_quality).map(|candidate| ResolvedSource {
        label: candidate.label.clone(),
        uri: candidate.uri.clone(),
        source: AudioSource::from_uri(&candidate.uri),
    })
}

/// Artwork URI for `track` at the preferred resolution.
pub fn select_artwork<'a>(track: &'a Track, preferred_resolution: &str) -> Option<&'a str> {
    select_candidate(&track.artwork_candidates, preferred_resolution)
        .map(|candidate| candidate.uri.as_str())
}
