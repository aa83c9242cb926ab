//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the player core and
//! platform-specific implementations. Each trait represents a capability the
//! core requires but that must be implemented differently per platform
//! (desktop, iOS, Android).
//!
//! ## Traits
//!
//! ### Audio
//! - [`AudioBackend`](playback::AudioBackend) - Provisions one audio resource per request
//! - [`AudioSession`](playback::AudioSession) - Controls and releases an acquired resource
//! - [`SessionEventSink`](playback::SessionEventSink) - Bounded channel for position/finish/failure notifications
//!
//! ### Storage
//! - [`SettingsStore`](storage::SettingsStore) - Key-value preferences storage (queue persistence)
//!
//! ### Utilities
//! - [`LoggerSink`](logging::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop`    | ✅ SettingsStore |
//! | iOS      | host app            | 📋 Planned |
//! | Android  | host app            | 📋 Planned |
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should convert platform errors into it and keep messages actionable.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so implementations can be shared
//! across async tasks behind `Arc`.

pub mod error;
pub mod logging;
pub mod playback;
pub mod storage;

pub use error::BridgeError;

pub use logging::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use playback::{
    AudioBackend, AudioMode, AudioSession, AudioSource, PlaybackMetadata, PlaybackOptions,
    PlaybackRequest, PlaybackSessionId, SessionEvent, SessionEventSink, SessionNotification,
};
pub use storage::SettingsStore;
