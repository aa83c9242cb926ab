//! # Status Reporter
//!
//! Drains the session notification channel and turns each notification
//! into status updates and policy decisions:
//!
//! - status ticks republish the clamped status and a `PositionChanged` event
//! - end-of-media replays under repeat-one, otherwise advances the queue;
//!   when the queue cannot advance the engine is left paused at the end
//! - a mid-playback failure moves the engine to `Error(StreamInterrupted)`
//!
//! Notifications from sessions that are no longer current are dropped.
//!
//! Advancing after a completion runs on a task of its own so notifications
//! keep draining while the next track loads. Those tasks are owned by the
//! reporter and joined before [`StatusReporter::run`] returns.

use crate::model::RepeatMode;
use crate::transport::TransportController;
use bridge_traits::{PlaybackSessionId, SessionEvent, SessionNotification};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

pub struct StatusReporter {
    transport: Arc<TransportController>,
    notifications: mpsc::Receiver<SessionNotification>,
    events: EventBus,
    shutdown: CancellationToken,
}

impl StatusReporter {
    pub fn new(
        transport: Arc<TransportController>,
        notifications: mpsc::Receiver<SessionNotification>,
        events: EventBus,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            transport,
            notifications,
            events,
            shutdown,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Process notifications until shutdown or until every sender is gone.
    pub async fn run(mut self) {
        debug!("Status reporter started");
        let mut advances = JoinSet::new();
        loop {
            let notification = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                Some(joined) = advances.join_next(), if !advances.is_empty() => {
                    if let Err(e) = joined {
                        warn!(error = %e, "Advance task failed");
                    }
                    continue;
                }
                received = self.notifications.recv() => match received {
                    Some(notification) => notification,
                    None => break,
                },
            };
            self.handle(notification, &mut advances).await;
        }

        while let Some(joined) = advances.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "Advance task failed");
            }
        }
        debug!("Status reporter stopped");
    }

    fn emit(&self, event: PlaybackEvent) {
        let _ = self.events.emit(CoreEvent::Playback(event));
    }

    async fn handle(&self, notification: SessionNotification, advances: &mut JoinSet<()>) {
        let SessionNotification { session, event } = notification;
        let engine = self.transport.engine();

        match event {
            SessionEvent::Status {
                position,
                duration,
                is_playing,
            } => {
                let Some(status) = engine.apply_status(session, position, duration, is_playing)
                else {
                    trace!(session = %session, "Ignoring status from stale session");
                    return;
                };
                self.emit(PlaybackEvent::PositionChanged {
                    track_id: engine
                        .current_track()
                        .map(|track| track.id)
                        .unwrap_or_default(),
                    position_ms: (status.position_seconds * 1000.0).round() as u64,
                    duration_ms: (status.duration_seconds * 1000.0).round() as u64,
                });
            }
            SessionEvent::Finished => self.on_finished(session, advances).await,
            SessionEvent::Failed { message } => {
                if engine.is_current_session(session) {
                    engine.interrupt(session, &message).await;
                } else {
                    debug!(session = %session, "Ignoring failure from stale session");
                }
            }
        }
    }

    async fn on_finished(&self, session: PlaybackSessionId, advances: &mut JoinSet<()>) {
        let engine = self.transport.engine();
        let Some(epoch) = engine.completion_epoch(session) else {
            debug!(session = %session, "Ignoring completion from stale session");
            return;
        };

        let track_id = engine
            .current_track()
            .map(|track| track.id)
            .unwrap_or_default();
        info!(track_id = %track_id, "Track completed");
        self.emit(PlaybackEvent::Completed { track_id });

        if self.transport.queue_manager().repeat_mode() == RepeatMode::One {
            if let Err(e) = engine.replay().await {
                warn!(error = %e, "Replay failed");
            }
            return;
        }

        let transport = Arc::clone(&self.transport);
        advances.spawn(async move {
            match transport.advance_after_completion(epoch).await {
                Ok(Some(_)) => {}
                Ok(None) => transport.engine().settle_at_end(session),
                Err(e) => warn!(error = %e, "Advancing after completion failed"),
            }
        });
    }
}
