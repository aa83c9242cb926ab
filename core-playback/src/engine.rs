//! # Playback Engine
//!
//! Owns the single live [`AudioSession`] and drives the state machine
//!
//! ```text
//! Idle ──load──▶ Loading ──acquired──▶ Playing ◀──▶ Paused
//!                   │                     │           │
//!                   ▼                     ▼           ▼
//!                 Error ◀─────── stream failure ──────┘
//! ```
//!
//! ## Session ownership
//!
//! The session lives in one slot guarded by an async mutex, which doubles
//! as the load critical section. A load first cancels whatever load is in
//! flight, then takes the slot, releases the old session (stop + unload) and
//! only then acquires the new one. An acquisition that is cancelled is
//! dropped mid-flight, so there is never more than one session alive or
//! being acquired.
//!
//! Control commands (`play_pause`, `seek`, `replay`) never wait on a load:
//! while the slot is held they are no-ops.
//!
//! Every `stop` bumps a stop epoch. Loads started on the engine's own
//! initiative (advancing after a completed track) carry the epoch they were
//! decided under and are dropped once a stop has happened since.
//!
//! ## Notifications
//!
//! Sessions report through a bounded channel, tagged with their
//! [`PlaybackSessionId`]. The engine only remembers the id of the session in
//! the slot; the status reporter asks [`PlaybackEngine::is_current_session`]
//! and the `apply_*` methods ignore anything from older sessions.

use crate::error::{PlaybackError, Result};
use crate::model::Track;
use crate::source::{resolve_audio_source, select_artwork, ResolvedSource};
use crate::status::{FailureReason, PlaybackState, PlaybackStatus, StatusBoard};
use bridge_traits::{
    AudioBackend, AudioMode, AudioSession, BridgeError, PlaybackMetadata, PlaybackOptions,
    PlaybackRequest, PlaybackSessionId, SessionEventSink, SessionNotification,
};
use core_runtime::config::{PlayerConfig, RetryPolicy};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use core_runtime::logging::redact_uri;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// How a load ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The resource was acquired and playback started.
    Playing,
    /// A newer load or a stop cancelled this one. State was left to the newer call.
    Superseded,
}

/// Engine tunables, usually taken from [`PlayerConfig`].
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub preferred_audio_quality: String,
    pub preferred_artwork_resolution: String,
    pub load_timeout: Duration,
    pub retry_policy: RetryPolicy,
    pub audio_mode: AudioMode,
}

impl From<&PlayerConfig> for EngineSettings {
    fn from(config: &PlayerConfig) -> Self {
        Self {
            preferred_audio_quality: config.preferred_audio_quality.clone(),
            preferred_artwork_resolution: config.preferred_artwork_resolution.clone(),
            load_timeout: config.load_timeout,
            retry_policy: config.retry_policy,
            audio_mode: config.audio_mode,
        }
    }
}

/// Bookkeeping for the newest load request.
struct LoadTicket {
    track: Option<Track>,
    session: Option<PlaybackSessionId>,
    cancel: CancellationToken,
    stops: u64,
}

pub struct PlaybackEngine {
    backend: Arc<dyn AudioBackend>,
    settings: EngineSettings,
    slot: AsyncMutex<Option<Box<dyn AudioSession>>>,
    ticket: Mutex<LoadTicket>,
    status: StatusBoard,
    notifications: mpsc::Sender<SessionNotification>,
    events: EventBus,
}

impl PlaybackEngine {
    /// Create an engine. Session notifications are sent into `notifications`;
    /// the caller owns the receiving half (normally a `StatusReporter`).
    pub fn new(
        backend: Arc<dyn AudioBackend>,
        settings: EngineSettings,
        status: StatusBoard,
        notifications: mpsc::Sender<SessionNotification>,
        events: EventBus,
    ) -> Self {
        Self {
            backend,
            settings,
            slot: AsyncMutex::new(None),
            ticket: Mutex::new(LoadTicket {
                track: None,
                session: None,
                cancel: CancellationToken::new(),
                stops: 0,
            }),
            status,
            notifications,
            events,
        }
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status.current()
    }

    pub fn status_board(&self) -> &StatusBoard {
        &self.status
    }

    /// The track most recently handed to [`load_track`](Self::load_track),
    /// kept even when its load failed.
    pub fn current_track(&self) -> Option<Track> {
        self.ticket.lock().track.clone()
    }

    /// Artwork URI of the current track at the preferred resolution.
    pub fn current_artwork(&self) -> Option<String> {
        let ticket = self.ticket.lock();
        ticket.track.as_ref().and_then(|track| {
            select_artwork(track, &self.settings.preferred_artwork_resolution).map(str::to_string)
        })
    }

    pub fn is_current_session(&self, session: PlaybackSessionId) -> bool {
        self.ticket.lock().session == Some(session)
    }

    /// Stop epoch, if `session` is still the live one. Read under one lock so
    /// a completion is never paired with an epoch from after a stop.
    pub fn completion_epoch(&self, session: PlaybackSessionId) -> Option<u64> {
        let ticket = self.ticket.lock();
        (ticket.session == Some(session)).then_some(ticket.stops)
    }

    pub fn stop_epoch(&self) -> u64 {
        self.ticket.lock().stops
    }

    fn emit(&self, event: PlaybackEvent) {
        // No subscribers is fine.
        let _ = self.events.emit(CoreEvent::Playback(event));
    }

    fn current_track_id(&self) -> Option<String> {
        self.ticket.lock().track.as_ref().map(|track| track.id.clone())
    }

    /// Load `track` and start playing it, replacing whatever was loaded.
    pub async fn load_track(&self, track: Track) -> Result<LoadOutcome> {
        self.load(track, None).await
    }

    /// Like [`load_track`](Self::load_track), but superseded up front when
    /// `stop` has run since `epoch` was read.
    pub async fn load_track_unless_stopped(&self, track: Track, epoch: u64) -> Result<LoadOutcome> {
        self.load(track, Some(epoch)).await
    }

    #[instrument(skip(self, track), fields(track_id = %track.id))]
    async fn load(&self, track: Track, epoch: Option<u64>) -> Result<LoadOutcome> {
        let cancel = CancellationToken::new();
        {
            let mut ticket = self.ticket.lock();
            if epoch.is_some_and(|epoch| epoch != ticket.stops) {
                debug!("Playback was stopped, not loading");
                return Ok(LoadOutcome::Superseded);
            }
            ticket.cancel.cancel();
            ticket.cancel = cancel.clone();
            ticket.session = None;
            ticket.track = Some(track.clone());
        }

        let mut slot = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(LoadOutcome::Superseded),
            slot = self.slot.lock() => slot,
        };

        if let Some(previous) = slot.take() {
            release(previous).await;
        }

        if cancel.is_cancelled() {
            return Ok(LoadOutcome::Superseded);
        }

        self.status.update(|status| {
            *status = PlaybackStatus {
                state: PlaybackState::Loading,
                position_seconds: 0.0,
                duration_seconds: track.duration_seconds,
                is_playing: false,
            };
        });

        let Some(resolved) = resolve_audio_source(&track, &self.settings.preferred_audio_quality)
        else {
            warn!("Track has no playable source");
            self.fail(&track.id, FailureReason::NoPlayableSource, "no audio candidates");
            return Err(PlaybackError::NoPlayableSource(track.id.clone()));
        };

        self.emit(PlaybackEvent::Loading {
            track_id: track.id.clone(),
        });

        let session_id = PlaybackSessionId::new();
        let acquisition = tokio::time::timeout(
            self.settings.load_timeout,
            self.acquire_with_retry(&track, &resolved, session_id),
        );

        let acquired = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Load superseded during acquisition");
                return Ok(LoadOutcome::Superseded);
            }
            result = acquisition => result,
        };

        let session = match acquired {
            Ok(Ok(session)) => session,
            Ok(Err(source)) => {
                warn!(error = %source, "Resource acquisition failed");
                self.fail(
                    &track.id,
                    FailureReason::ResourceAcquisitionFailure,
                    &source.to_string(),
                );
                return Err(PlaybackError::ResourceAcquisition {
                    track_id: track.id.clone(),
                    source,
                });
            }
            Err(_elapsed) => {
                warn!(timeout = ?self.settings.load_timeout, "Load timed out");
                self.fail(&track.id, FailureReason::LoadTimeout, "load timed out");
                return Err(PlaybackError::LoadTimeout {
                    track_id: track.id.clone(),
                    timeout: self.settings.load_timeout,
                });
            }
        };

        if let Err(source) = session.play().await {
            warn!(error = %source, "Acquired session refused to start");
            release(session).await;
            self.fail(
                &track.id,
                FailureReason::ResourceAcquisitionFailure,
                &source.to_string(),
            );
            return Err(PlaybackError::ResourceAcquisition {
                track_id: track.id.clone(),
                source,
            });
        }

        *slot = Some(session);

        {
            let mut ticket = self.ticket.lock();
            if ticket.cancel.is_cancelled() {
                // A newer load is waiting for the slot and will release this session.
                return Ok(LoadOutcome::Superseded);
            }
            ticket.session = Some(session_id);
        }

        self.status.update(|status| {
            status.state = PlaybackState::Playing;
            status.is_playing = true;
        });
        info!(session = %session_id, quality = %resolved.label, "Playback started");
        self.emit(PlaybackEvent::Started {
            track_id: track.id.clone(),
            title: track.title.clone(),
        });

        Ok(LoadOutcome::Playing)
    }

    async fn acquire_with_retry(
        &self,
        track: &Track,
        resolved: &ResolvedSource,
        session_id: PlaybackSessionId,
    ) -> std::result::Result<Box<dyn AudioSession>, BridgeError> {
        let policy = self.settings.retry_policy;
        let options = PlaybackOptions {
            audio_mode: self.settings.audio_mode,
            ..PlaybackOptions::default()
        };
        let metadata = PlaybackMetadata {
            track_id: Some(track.id.clone()),
            title: Some(track.title.clone()),
            artist: Some(track.artist_display.clone()).filter(|artist| !artist.is_empty()),
            artwork_uri: select_artwork(track, &self.settings.preferred_artwork_resolution)
                .map(str::to_string),
            duration: Some(Duration::from_secs_f64(track.duration_seconds.max(0.0)))
                .filter(|duration| !duration.is_zero()),
        };

        let mut attempt = 1;
        loop {
            debug!(
                attempt,
                uri = %redact_uri(&resolved.uri),
                "Acquiring audio resource"
            );

            let request = PlaybackRequest::new(session_id, resolved.source.clone())
                .with_options(options)
                .with_metadata(metadata.clone());
            let sink = SessionEventSink::new(session_id, self.notifications.clone());

            match self.backend.acquire(request, sink).await {
                Ok(session) => return Ok(session),
                Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                    let delay = policy.delay_for_attempt(attempt);
                    warn!(attempt, error = %e, delay_ms = delay.as_millis() as u64, "Acquisition failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn fail(&self, track_id: &str, reason: FailureReason, message: &str) {
        self.status.update(|status| {
            status.state = PlaybackState::Error(reason);
            status.is_playing = false;
        });
        self.emit(PlaybackEvent::Error {
            track_id: Some(track_id.to_string()),
            reason: reason.as_str().to_string(),
            message: message.to_string(),
            recoverable: reason.is_recoverable(),
        });
    }

    /// Toggle `Playing ⇄ Paused`. No-op in any other state.
    pub async fn play_pause(&self) -> Result<()> {
        let state = self.status.current().state;
        if !state.is_active() {
            debug!(?state, "play_pause ignored");
            return Ok(());
        }

        let Ok(slot) = self.slot.try_lock() else {
            debug!("play_pause ignored while loading");
            return Ok(());
        };
        let Some(session) = slot.as_ref() else {
            return Ok(());
        };

        let track_id = self.current_track_id().unwrap_or_default();
        match self.status.current().state {
            PlaybackState::Playing => {
                session.pause().await?;
                let status = self.status.update(|status| {
                    status.state = PlaybackState::Paused;
                    status.is_playing = false;
                });
                self.emit(PlaybackEvent::Paused {
                    track_id,
                    position_ms: seconds_to_ms(status.position_seconds),
                });
            }
            PlaybackState::Paused => {
                session.play().await?;
                let status = self.status.update(|status| {
                    status.state = PlaybackState::Playing;
                    status.is_playing = true;
                });
                self.emit(PlaybackEvent::Resumed {
                    track_id,
                    position_ms: seconds_to_ms(status.position_seconds),
                });
            }
            _ => {}
        }

        Ok(())
    }

    /// Seek within the live session, clamping into `[0, duration]` (the
    /// start, while the duration is unknown). Returns the position actually
    /// applied, or `None` when there was nothing to seek.
    pub async fn seek(&self, target_seconds: f64) -> Result<Option<f64>> {
        if !self.status.current().state.is_active() {
            return Ok(None);
        }

        let Ok(slot) = self.slot.try_lock() else {
            return Ok(None);
        };
        let Some(session) = slot.as_ref() else {
            return Ok(None);
        };

        let duration = self.status.current().duration_seconds;
        let clamped = PlaybackStatus::clamp_seek(target_seconds, duration);
        session.seek(Duration::from_secs_f64(clamped)).await?;

        self.status.update(|status| status.position_seconds = clamped);
        self.emit(PlaybackEvent::Seeked {
            track_id: self.current_track_id().unwrap_or_default(),
            position_ms: seconds_to_ms(clamped),
        });

        Ok(Some(clamped))
    }

    /// Rewind to the start of the current track. Without a live session only
    /// the published position is zeroed, so the next `prev` steps back.
    pub async fn restart(&self) -> Result<()> {
        if self.seek(0.0).await?.is_none() {
            self.status.update(|status| status.position_seconds = 0.0);
        }
        Ok(())
    }

    /// Publish a position reported by the host outside the session channel
    /// (lock-screen scrubbing, a native player that polls). Clamped like a
    /// status tick.
    pub fn update_position(&self, position_seconds: f64, duration_seconds: f64) -> PlaybackStatus {
        let status = self.status.update(|status| {
            status.duration_seconds = duration_seconds;
            status.position_seconds = position_seconds;
        });
        self.emit(PlaybackEvent::PositionChanged {
            track_id: self.current_track_id().unwrap_or_default(),
            position_ms: seconds_to_ms(status.position_seconds),
            duration_ms: seconds_to_ms(status.duration_seconds),
        });
        status
    }

    /// Restart the current session from zero without reacquiring it.
    pub async fn replay(&self) -> Result<()> {
        let Ok(slot) = self.slot.try_lock() else {
            return Ok(());
        };
        let Some(session) = slot.as_ref() else {
            return Ok(());
        };

        session.seek(Duration::ZERO).await?;
        session.play().await?;

        self.status.update(|status| {
            status.state = PlaybackState::Playing;
            status.position_seconds = 0.0;
            status.is_playing = true;
        });
        debug!("Replaying current track");
        self.emit(PlaybackEvent::Started {
            track_id: self.current_track_id().unwrap_or_default(),
            title: self
                .current_track()
                .map(|track| track.title)
                .unwrap_or_default(),
        });

        Ok(())
    }

    /// Release the session, clear the current track and return to zeroed `Idle`.
    pub async fn stop(&self) {
        let track_id = {
            let mut ticket = self.ticket.lock();
            ticket.cancel.cancel();
            ticket.cancel = CancellationToken::new();
            ticket.session = None;
            ticket.stops += 1;
            ticket.track.take().map(|track| track.id)
        };

        let mut slot = self.slot.lock().await;
        if let Some(session) = slot.take() {
            release(session).await;
        }

        self.status.reset();
        info!("Playback stopped");
        self.emit(PlaybackEvent::Stopped { track_id });
    }

    // ------------------------------------------------------------------------
    // Notification handling (called by the status reporter)
    // ------------------------------------------------------------------------

    /// Apply a status tick. Returns the published status, or `None` for a
    /// stale session.
    pub fn apply_status(
        &self,
        session: PlaybackSessionId,
        position: Duration,
        duration: Option<Duration>,
        is_playing: bool,
    ) -> Option<PlaybackStatus> {
        if !self.is_current_session(session) {
            return None;
        }

        Some(self.status.update(|status| {
            if let Some(duration) = duration {
                status.duration_seconds = duration.as_secs_f64();
            }
            status.position_seconds = position.as_secs_f64();
            status.is_playing = is_playing;
        }))
    }

    /// Leave the finished session paused at its end.
    pub fn settle_at_end(&self, session: PlaybackSessionId) {
        if !self.is_current_session(session) {
            return;
        }

        self.status.update(|status| {
            status.state = PlaybackState::Paused;
            status.position_seconds = status.duration_seconds;
            status.is_playing = false;
        });
    }

    /// The live resource failed: release it and enter `Error(StreamInterrupted)`.
    pub async fn interrupt(&self, session: PlaybackSessionId, message: &str) {
        if !self.is_current_session(session) {
            return;
        }

        let mut slot = self.slot.lock().await;
        let track_id = {
            let mut ticket = self.ticket.lock();
            if ticket.session != Some(session) {
                return;
            }
            ticket.session = None;
            ticket.track.as_ref().map(|track| track.id.clone())
        };

        if let Some(broken) = slot.take() {
            release(broken).await;
        }

        warn!(session = %session, message, "Stream interrupted");
        self.fail(
            track_id.as_deref().unwrap_or_default(),
            FailureReason::StreamInterrupted,
            message,
        );
    }
}

impl std::fmt::Debug for PlaybackEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackEngine")
            .field("settings", &self.settings)
            .field("status", &self.status.current())
            .field("track", &self.current_track_id())
            .finish()
    }
}

/// Stop and unload a session, logging failures.
async fn release(session: Box<dyn AudioSession>) {
    if let Err(e) = session.stop().await {
        debug!(error = %e, "Session stop failed during release");
    }
    if let Err(e) = session.unload().await {
        warn!(error = %e, "Session unload failed");
    }
}

fn seconds_to_ms(seconds: f64) -> u64 {
    (seconds.max(0.0) * 1000.0).round() as u64
}
