//! # Playback & Queue Engine
//!
//! The heart of the player core: queue state, source selection, the single
//! audio session and the rules that move between tracks.
//!
//! ## Overview
//!
//! - [`QueueManager`](queue::QueueManager): ordered tracks, cursor, shuffle and repeat
//! - [`PlaybackEngine`](engine::PlaybackEngine): owns the one live session; load,
//!   pause/resume, seek, stop, bounded timeout and retry
//! - [`StatusBoard`](status::StatusBoard): serialized, clamped [`PlaybackStatus`](status::PlaybackStatus)
//! - [`TransportController`](transport::TransportController): next/prev/set-queue
//!   operations composed from the two above
//! - [`StatusReporter`](reporter::StatusReporter): consumes session
//!   notifications, applies repeat/advance policy on completion
//! - [`QueuePersistence`](persistence::QueuePersistence): background,
//!   last-write-wins storage of the track list
//!
//! Hosts normally use these through `core_service::PlayerService`, which
//! wires them together.

pub mod engine;
pub mod error;
pub mod model;
pub mod persistence;
pub mod queue;
pub mod reporter;
pub mod source;
pub mod status;
pub mod transport;

pub use engine::{EngineSettings, LoadOutcome, PlaybackEngine};
pub use error::{PlaybackError, Result};
pub use model::{MediaCandidate, QueueSnapshot, RepeatMode, Track};
pub use persistence::QueuePersistence;
pub use queue::{PrevAction, QueueManager, Removal};
pub use reporter::StatusReporter;
pub use status::{FailureReason, PlaybackState, PlaybackStatus, StatusBoard};
pub use transport::TransportController;
