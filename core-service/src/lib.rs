//! Core service façade and bootstrap helpers.
//!
//! [`PlayerService`] is the owned context a host constructs once and passes
//! to whatever needs the player. It wires the host-provided bridges (an
//! [`AudioBackend`] and the configured settings store) into the playback
//! crate, restores the stored queue, and runs the status reporter until
//! [`PlayerService::shutdown`].
//!
//! ```no_run
//! # use std::sync::Arc;
//! # async fn example(backend: Arc<dyn bridge_traits::AudioBackend>) -> core_service::Result<()> {
//! use core_runtime::config::PlayerConfig;
//! use core_service::PlayerService;
//!
//! let config = PlayerConfig::builder()
//!     .settings_path("/var/lib/player/settings.db")
//!     .build()?;
//! let player = PlayerService::new(config, backend).await?;
//!
//! let queue = player.transport().queue();
//! if !queue.is_empty() {
//!     player.transport().skip_to(0).await?;
//! }
//!
//! player.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use bridge_traits::AudioBackend;
use core_playback::{
    EngineSettings, PlaybackEngine, PlaybackStatus, QueueManager, QueuePersistence, StatusBoard,
    StatusReporter, TransportController,
};
use core_runtime::config::PlayerConfig;
use core_runtime::events::{CoreEvent, EventBus, EventStream, QueueEvent};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Primary façade exposed to host applications.
pub struct PlayerService {
    config: PlayerConfig,
    transport: Arc<TransportController>,
    persistence: Arc<QueuePersistence>,
    events: EventBus,
    shutdown: CancellationToken,
    reporter: Mutex<Option<JoinHandle<()>>>,
}

impl PlayerService {
    /// Create a player from `config`, playing through `backend`.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn new(config: PlayerConfig, backend: Arc<dyn AudioBackend>) -> Result<Self> {
        let events = EventBus::new(config.event_buffer_size);
        Self::with_event_bus(config, backend, events).await
    }

    /// Like [`new`](Self::new), publishing on an existing bus so that
    /// subscribers also see the start-up events.
    pub async fn with_event_bus(
        config: PlayerConfig,
        backend: Arc<dyn AudioBackend>,
        events: EventBus,
    ) -> Result<Self> {
        config.validate()?;

        let persistence = Arc::new(QueuePersistence::spawn(
            Arc::clone(&config.settings_store),
            config.queue_storage_key.clone(),
        ));

        let queue = QueueManager::new(config.restart_threshold)
            .with_persistence(Arc::clone(&persistence));
        let stored = persistence.load().await;
        let length = stored.len();
        queue.restore(stored);
        info!(length, key = %config.queue_storage_key, "Queue restored");
        let _ = events.emit(CoreEvent::Queue(QueueEvent::Restored { length }));

        let (notifications_tx, notifications_rx) = mpsc::channel(config.notification_capacity);
        let engine = PlaybackEngine::new(
            backend,
            EngineSettings::from(&config),
            StatusBoard::new(),
            notifications_tx,
            events.clone(),
        );

        let transport = Arc::new(TransportController::new(
            Arc::new(queue),
            Arc::new(engine),
            events.clone(),
        ));

        let shutdown = CancellationToken::new();
        let reporter = StatusReporter::new(
            Arc::clone(&transport),
            notifications_rx,
            events.clone(),
            shutdown.clone(),
        )
        .spawn();

        debug!(?config, "Player service started");

        Ok(Self {
            config,
            transport,
            persistence,
            events,
            shutdown,
            reporter: Mutex::new(Some(reporter)),
        })
    }

    /// Queue and transport operations.
    pub fn transport(&self) -> &Arc<TransportController> {
        &self.transport
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe_events(&self) -> EventStream {
        EventStream::new(self.events.subscribe())
    }

    pub fn status(&self) -> PlaybackStatus {
        self.transport.status()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<PlaybackStatus> {
        self.transport.subscribe_status()
    }

    /// Release the audio session, stop the reporter and flush pending queue
    /// writes. Calling it twice is harmless.
    pub async fn shutdown(&self) {
        self.transport.stop().await;
        self.shutdown.cancel();

        if let Some(reporter) = self.reporter.lock().await.take() {
            if let Err(e) = reporter.await {
                warn!(error = %e, "Status reporter ended abnormally");
            }
        }

        self.persistence.shutdown().await;
        info!("Player service shut down");
    }
}

impl Drop for PlayerService {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl std::fmt::Debug for PlayerService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerService")
            .field("config", &self.config)
            .field("transport", &self.transport)
            .finish()
    }
}
