//! Playback bridge traits and supporting audio types.
//!
//! The host owns the real audio stack (AVPlayer, ExoPlayer, a desktop output
//! device). The core only sees two things: an [`AudioBackend`] that turns a
//! [`PlaybackRequest`] into a live [`AudioSession`], and a bounded notification
//! channel through which the session pushes position, completion and failure
//! back to the core at whatever cadence the native player uses.

use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::trace;
use uuid::Uuid;

/// High-level audio source descriptor provided to playback backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioSource {
    /// Local file accessible to the host runtime (downloaded tracks).
    LocalFile { path: PathBuf },
    /// Remote HTTP(S) stream to be fetched by the host.
    RemoteStream {
        url: String,
        headers: HashMap<String, String>,
    },
}

impl AudioSource {
    /// Classify a candidate URI. `file://` URIs and absolute paths map to
    /// [`AudioSource::LocalFile`], everything else is streamed.
    pub fn from_uri(uri: &str) -> Self {
        if let Some(path) = uri.strip_prefix("file://") {
            return AudioSource::LocalFile {
                path: PathBuf::from(path),
            };
        }

        if uri.starts_with('/') {
            return AudioSource::LocalFile {
                path: PathBuf::from(uri),
            };
        }

        AudioSource::RemoteStream {
            url: uri.to_string(),
            headers: HashMap::new(),
        }
    }

    /// Determine whether the source represents remote content.
    pub fn is_remote(&self) -> bool {
        matches!(self, AudioSource::RemoteStream { .. })
    }
}

/// Host audio-session mode, applied by the backend before it provisions a
/// resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioMode {
    /// Keep playing when the ringer/silent switch is off (iOS).
    pub play_in_silent_mode: bool,
    /// Keep the session alive while the app is in the background.
    pub stay_active_in_background: bool,
    /// Lower our volume for other apps' audio instead of pausing (Android).
    pub duck_others: bool,
}

impl Default for AudioMode {
    fn default() -> Self {
        Self {
            play_in_silent_mode: true,
            stay_active_in_background: true,
            duck_others: false,
        }
    }
}

/// Additional playback options supplied alongside a request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackOptions {
    /// Initial playback position (defaults to start of stream).
    pub start_position: Duration,
    /// Initial volume (0.0 = muted, 1.0 = unity gain).
    pub initial_volume: f32,
    pub audio_mode: AudioMode,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            start_position: Duration::from_secs(0),
            initial_volume: 1.0,
            audio_mode: AudioMode::default(),
        }
    }
}

/// Unique identifier for a playback session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaybackSessionId(Uuid);

impl PlaybackSessionId {
    /// Generate a new session identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Borrow the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PlaybackSessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PlaybackSessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Metadata surfaced to platform media sessions / lock-screen controls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackMetadata {
    pub track_id: Option<String>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub artwork_uri: Option<String>,
    pub duration: Option<Duration>,
}

/// Request describing the session a backend should provision.
#[derive(Debug, Clone)]
pub struct PlaybackRequest {
    /// Identifier the core will use for every notification of this session.
    pub session: PlaybackSessionId,
    pub source: AudioSource,
    pub options: PlaybackOptions,
    pub metadata: PlaybackMetadata,
}

impl PlaybackRequest {
    pub fn new(session: PlaybackSessionId, source: AudioSource) -> Self {
        Self {
            session,
            source,
            options: PlaybackOptions::default(),
            metadata: PlaybackMetadata::default(),
        }
    }

    pub fn with_options(mut self, options: PlaybackOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_metadata(mut self, metadata: PlaybackMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Notification pushed by a live session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Periodic status tick.
    Status {
        position: Duration,
        /// `None` while the native player has not determined the length.
        duration: Option<Duration>,
        is_playing: bool,
    },
    /// The resource reached end-of-media.
    Finished,
    /// The resource failed after it was acquired (network drop, decoder error).
    Failed { message: String },
}

impl SessionEvent {
    /// Terminal events must not be dropped under backpressure.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionEvent::Finished | SessionEvent::Failed { .. })
    }
}

/// A [`SessionEvent`] tagged with the session that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionNotification {
    pub session: PlaybackSessionId,
    pub event: SessionEvent,
}

/// Sending half of the core's bounded notification channel, bound to one session.
///
/// Drop policy: status ticks go through [`notify`](Self::notify) and are
/// discarded when the channel is full (the next tick supersedes them).
/// Completion and failure must go through [`deliver`](Self::deliver), which
/// waits for capacity.
#[derive(Debug, Clone)]
pub struct SessionEventSink {
    session: PlaybackSessionId,
    tx: mpsc::Sender<SessionNotification>,
}

impl SessionEventSink {
    pub fn new(session: PlaybackSessionId, tx: mpsc::Sender<SessionNotification>) -> Self {
        Self { session, tx }
    }

    pub fn session(&self) -> PlaybackSessionId {
        self.session
    }

    /// Non-blocking, lossy send. Returns `false` if the event was dropped.
    pub fn notify(&self, event: SessionEvent) -> bool {
        match self.tx.try_send(SessionNotification {
            session: self.session,
            event,
        }) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                trace!(session = %self.session, event = ?dropped.event, "Notification channel full, dropping event");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Reliable send; waits for channel capacity. Returns `false` once the
    /// core has shut down.
    pub async fn deliver(&self, event: SessionEvent) -> bool {
        self.tx
            .send(SessionNotification {
                session: self.session,
                event,
            })
            .await
            .is_ok()
    }
}

/// Handle to one acquired audio resource.
///
/// The core holds at most one of these at a time and always calls
/// [`unload`](AudioSession::unload) before acquiring the next one.
#[async_trait]
pub trait AudioSession: Send + Sync {
    /// Begin or resume playback.
    async fn play(&self) -> Result<()>;

    /// Pause playback without releasing the resource.
    async fn pause(&self) -> Result<()>;

    /// Seek to an absolute position within the stream.
    async fn seek(&self, position: Duration) -> Result<()>;

    /// Stop playback and reset position to the start of the stream.
    async fn stop(&self) -> Result<()>;

    /// Release the native resource. The session must not emit afterwards.
    async fn unload(self: Box<Self>) -> Result<()>;
}

/// Trait for platform-specific backends that provision audio resources.
#[async_trait]
pub trait AudioBackend: Send + Sync {
    /// Acquire a resource for `request` and wire its notifications to `events`.
    ///
    /// Dropping the returned future before it resolves abandons the
    /// acquisition; implementations must release anything partially created.
    async fn acquire(
        &self,
        request: PlaybackRequest,
        events: SessionEventSink,
    ) -> Result<Box<dyn AudioSession>>;
}
