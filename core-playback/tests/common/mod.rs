//! Shared fakes for the playback integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::{
    AudioBackend, AudioMode, AudioSession, PlaybackRequest, SessionEvent, SessionEventSink, SettingsStore,
};
use core_playback::{
    EngineSettings, PlaybackEngine, PlaybackStatus, QueueManager, QueuePersistence, StatusBoard,
    StatusReporter, Track, TransportController,
};
use core_runtime::config::RetryPolicy;
use core_runtime::events::EventBus;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Fake audio backend
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Play,
    Pause,
    Seek(Duration),
    Stop,
    Unload,
}

#[derive(Default)]
struct Counters {
    live: AtomicUsize,
    peak: AtomicUsize,
    attempts: AtomicUsize,
}

impl Counters {
    fn enter(&self) {
        let now = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Releases the live count of an acquisition that fails or is abandoned.
struct PendingAcquire {
    counters: Arc<Counters>,
    armed: bool,
}

impl Drop for PendingAcquire {
    fn drop(&mut self) {
        if self.armed {
            self.counters.leave();
        }
    }
}

/// Audio backend double. An acquisition counts as live from the moment it
/// starts until it fails, is dropped, or its session is unloaded.
#[derive(Default)]
pub struct FakeBackend {
    counters: Arc<Counters>,
    failures: Mutex<VecDeque<BridgeError>>,
    delay: Mutex<Option<Duration>>,
    requests: Mutex<Vec<PlaybackRequest>>,
    sinks: Mutex<Vec<SessionEventSink>>,
    commands: Arc<Mutex<Vec<SessionCommand>>>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fail the next acquisitions with these errors, in order.
    pub fn fail_next(&self, errors: impl IntoIterator<Item = BridgeError>) {
        self.failures.lock().extend(errors);
    }

    /// Make every acquisition take this long.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock() = delay;
    }

    pub fn live(&self) -> usize {
        self.counters.live.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.counters.peak.load(Ordering::SeqCst)
    }

    pub fn attempts(&self) -> usize {
        self.counters.attempts.load(Ordering::SeqCst)
    }

    /// Number of successful acquisitions.
    pub fn acquisitions(&self) -> usize {
        self.sinks.lock().len()
    }

    pub fn requests(&self) -> Vec<PlaybackRequest> {
        self.requests.lock().clone()
    }

    pub fn commands(&self) -> Vec<SessionCommand> {
        self.commands.lock().clone()
    }

    pub fn clear_commands(&self) {
        self.commands.lock().clear();
    }

    /// Sink of the n-th successfully acquired session.
    pub fn sink(&self, n: usize) -> SessionEventSink {
        self.sinks.lock()[n].clone()
    }

    pub fn latest_sink(&self) -> SessionEventSink {
        let sinks = self.sinks.lock();
        sinks[sinks.len() - 1].clone()
    }

    pub fn tick(&self, position_secs: f64, duration_secs: f64, is_playing: bool) -> bool {
        self.latest_sink().notify(SessionEvent::Status {
            position: Duration::from_secs_f64(position_secs),
            duration: Some(Duration::from_secs_f64(duration_secs)),
            is_playing,
        })
    }

    pub async fn finish(&self) -> bool {
        self.latest_sink().deliver(SessionEvent::Finished).await
    }

    pub async fn break_stream(&self, message: &str) -> bool {
        self.latest_sink()
            .deliver(SessionEvent::Failed {
                message: message.to_string(),
            })
            .await
    }
}

#[async_trait]
impl AudioBackend for FakeBackend {
    async fn acquire(
        &self,
        request: PlaybackRequest,
        events: SessionEventSink,
    ) -> BridgeResult<Box<dyn AudioSession>> {
        self.counters.attempts.fetch_add(1, Ordering::SeqCst);
        self.counters.enter();
        let mut pending = PendingAcquire {
            counters: Arc::clone(&self.counters),
            armed: true,
        };
        self.requests.lock().push(request);

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self.failures.lock().pop_front();
        if let Some(error) = failure {
            return Err(error);
        }

        self.sinks.lock().push(events);
        pending.armed = false;
        Ok(Box::new(FakeSession {
            counters: Arc::clone(&self.counters),
            commands: Arc::clone(&self.commands),
        }))
    }
}

struct FakeSession {
    counters: Arc<Counters>,
    commands: Arc<Mutex<Vec<SessionCommand>>>,
}

#[async_trait]
impl AudioSession for FakeSession {
    async fn play(&self) -> BridgeResult<()> {
        self.commands.lock().push(SessionCommand::Play);
        Ok(())
    }

    async fn pause(&self) -> BridgeResult<()> {
        self.commands.lock().push(SessionCommand::Pause);
        Ok(())
    }

    async fn seek(&self, position: Duration) -> BridgeResult<()> {
        self.commands.lock().push(SessionCommand::Seek(position));
        Ok(())
    }

    async fn stop(&self) -> BridgeResult<()> {
        self.commands.lock().push(SessionCommand::Stop);
        Ok(())
    }

    async fn unload(self: Box<Self>) -> BridgeResult<()> {
        self.commands.lock().push(SessionCommand::Unload);
        self.counters.leave();
        Ok(())
    }
}

// ============================================================================
// In-memory settings store
// ============================================================================

#[derive(Default)]
pub struct MemorySettingsStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySettingsStore {
    pub fn raw(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn set_string(&self, key: &str, value: &str) -> BridgeResult<()> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get_string(&self, key: &str) -> BridgeResult<Option<String>> {
        Ok(self.values.lock().get(key).cloned())
    }

    async fn set_bool(&self, key: &str, value: bool) -> BridgeResult<()> {
        self.set_string(key, &value.to_string()).await
    }

    async fn get_bool(&self, key: &str) -> BridgeResult<Option<bool>> {
        Ok(self.raw(key).and_then(|v| v.parse().ok()))
    }

    async fn set_i64(&self, key: &str, value: i64) -> BridgeResult<()> {
        self.set_string(key, &value.to_string()).await
    }

    async fn get_i64(&self, key: &str) -> BridgeResult<Option<i64>> {
        Ok(self.raw(key).and_then(|v| v.parse().ok()))
    }

    async fn set_f64(&self, key: &str, value: f64) -> BridgeResult<()> {
        self.set_string(key, &value.to_string()).await
    }

    async fn get_f64(&self, key: &str) -> BridgeResult<Option<f64>> {
        Ok(self.raw(key).and_then(|v| v.parse().ok()))
    }

    async fn delete(&self, key: &str) -> BridgeResult<()> {
        self.values.lock().remove(key);
        Ok(())
    }

    async fn has_key(&self, key: &str) -> BridgeResult<bool> {
        Ok(self.values.lock().contains_key(key))
    }

    async fn list_keys(&self) -> BridgeResult<Vec<String>> {
        Ok(self.values.lock().keys().cloned().collect())
    }

    async fn clear_all(&self) -> BridgeResult<()> {
        self.values.lock().clear();
        Ok(())
    }
}

// ============================================================================
// Wiring
// ============================================================================

pub fn settings() -> EngineSettings {
    EngineSettings {
        preferred_audio_quality: "96kbps".to_string(),
        preferred_artwork_resolution: "500x500".to_string(),
        load_timeout: Duration::from_secs(15),
        retry_policy: RetryPolicy::none(),
        audio_mode: AudioMode::default(),
    }
}

pub struct Harness {
    pub backend: Arc<FakeBackend>,
    pub store: Arc<MemorySettingsStore>,
    pub persistence: Arc<QueuePersistence>,
    pub transport: Arc<TransportController>,
    pub events: EventBus,
    shutdown: CancellationToken,
    reporter: JoinHandle<()>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(settings())
    }

    pub fn with_settings(settings: EngineSettings) -> Self {
        let backend = FakeBackend::new();
        let store = Arc::new(MemorySettingsStore::default());
        let persistence = Arc::new(QueuePersistence::spawn(store.clone(), "player_queue"));
        let events = EventBus::new(256);
        let (tx, rx) = mpsc::channel(64);

        let queue = Arc::new(
            QueueManager::with_rng(Duration::from_secs(3), StdRng::seed_from_u64(42))
                .with_persistence(persistence.clone()),
        );
        let engine = Arc::new(PlaybackEngine::new(
            backend.clone(),
            settings,
            StatusBoard::new(),
            tx,
            events.clone(),
        ));
        let transport = Arc::new(TransportController::new(queue, engine, events.clone()));

        let shutdown = CancellationToken::new();
        let reporter = StatusReporter::new(transport.clone(), rx, events.clone(), shutdown.clone())
            .spawn();

        Self {
            backend,
            store,
            persistence,
            transport,
            events,
            shutdown,
            reporter,
        }
    }

    pub fn status(&self) -> PlaybackStatus {
        self.transport.status()
    }

    /// Wait (bounded) until the published status satisfies `predicate`.
    pub async fn wait_for_status<F>(&self, predicate: F) -> PlaybackStatus
    where
        F: Fn(&PlaybackStatus) -> bool,
    {
        let mut rx = self.transport.subscribe_status();
        let status = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| predicate(s)))
            .await
            .expect("timed out waiting for status")
            .expect("status channel closed");
        *status
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.shutdown.cancel();
        self.reporter.abort();
    }
}

/// Poll `condition` until it holds or a bounded wait elapses.
pub async fn eventually<F>(condition: F)
where
    F: Fn() -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

pub fn track(id: &str) -> Track {
    Track::new(id, id.to_uppercase())
        .with_artist("Artist")
        .with_duration(180.0)
        .with_audio("12kbps", format!("https://cdn.example.com/{}_12.mp4", id))
        .with_audio("96kbps", format!("https://cdn.example.com/{}_96.mp4", id))
        .with_audio("320kbps", format!("https://cdn.example.com/{}_320.mp4", id))
        .with_artwork("500x500", format!("https://img.example.com/{}_500.jpg", id))
}

pub fn tracks(ids: &[&str]) -> Vec<Track> {
    ids.iter().map(|id| track(id)).collect()
}

pub fn transient() -> BridgeError {
    BridgeError::OperationFailed("connection reset".to_string())
}
