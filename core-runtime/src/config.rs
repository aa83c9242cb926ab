//! # Player Configuration
//!
//! Builder-based configuration for the player core.
//!
//! ## Overview
//!
//! [`PlayerConfig`] carries the one required bridge (a [`SettingsStore`] for
//! queue persistence) and the tunables of the playback engine: preferred
//! stream quality and artwork size, the load timeout, the acquisition
//! [`RetryPolicy`], the restart-vs-previous threshold, channel sizes and the
//! host [`AudioMode`] requested before each load.
//! Validation is fail-fast; [`PlayerConfigBuilder::build`] rejects values the
//! engine cannot run with.
//!
//! When the `desktop-shims` feature is enabled and no settings store is
//! injected, a SQLite-backed store is opened at `settings_path`.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::PlayerConfig;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let config = PlayerConfig::builder()
//!     .settings_store(Arc::new(MySettingsStore))
//!     .preferred_audio_quality("320kbps")
//!     .load_timeout(Duration::from_secs(10))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{AudioMode, SettingsStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Default stream quality label picked from a track's candidates.
pub const DEFAULT_AUDIO_QUALITY: &str = "96kbps";
/// Default artwork resolution label.
pub const DEFAULT_ARTWORK_RESOLUTION: &str = "500x500";
/// Storage key holding the serialized queue.
pub const DEFAULT_QUEUE_STORAGE_KEY: &str = "player_queue";
pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(15);
/// Position past which "previous" restarts the current track.
pub const DEFAULT_RESTART_THRESHOLD: Duration = Duration::from_secs(3);
pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 64;
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = crate::events::DEFAULT_EVENT_BUFFER_SIZE;

/// Bounded retry with exponential backoff for resource acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    ///
    /// Doubles from `base_delay` and saturates at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::Config(
                "Retry policy must allow at least one attempt".to_string(),
            ));
        }
        if self.base_delay > self.max_delay {
            return Err(Error::Config(
                "Retry base delay cannot exceed max delay".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration for the player core. Use [`PlayerConfig::builder`].
#[derive(Clone)]
pub struct PlayerConfig {
    /// Preferences storage used for queue persistence (required)
    pub settings_store: Arc<dyn SettingsStore>,
    pub preferred_audio_quality: String,
    pub preferred_artwork_resolution: String,
    /// Upper bound on a whole load, retries included
    pub load_timeout: Duration,
    pub retry_policy: RetryPolicy,
    pub restart_threshold: Duration,
    /// Capacity of the session notification channel
    pub notification_capacity: usize,
    pub event_buffer_size: usize,
    pub queue_storage_key: String,
    /// Host audio-session mode requested on every load
    pub audio_mode: AudioMode,
}

impl std::fmt::Debug for PlayerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerConfig")
            .field("settings_store", &"SettingsStore { ... }")
            .field("preferred_audio_quality", &self.preferred_audio_quality)
            .field(
                "preferred_artwork_resolution",
                &self.preferred_artwork_resolution,
            )
            .field("load_timeout", &self.load_timeout)
            .field("retry_policy", &self.retry_policy)
            .field("restart_threshold", &self.restart_threshold)
            .field("notification_capacity", &self.notification_capacity)
            .field("event_buffer_size", &self.event_buffer_size)
            .field("queue_storage_key", &self.queue_storage_key)
            .field("audio_mode", &self.audio_mode)
            .finish()
    }
}

impl PlayerConfig {
    pub fn builder() -> PlayerConfigBuilder {
        PlayerConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.preferred_audio_quality.trim().is_empty() {
            return Err(Error::Config(
                "Preferred audio quality cannot be empty".to_string(),
            ));
        }

        if self.preferred_artwork_resolution.trim().is_empty() {
            return Err(Error::Config(
                "Preferred artwork resolution cannot be empty".to_string(),
            ));
        }

        if self.queue_storage_key.is_empty() {
            return Err(Error::Config("Queue storage key cannot be empty".to_string()));
        }

        if self.load_timeout.is_zero() {
            return Err(Error::Config(
                "Load timeout must be greater than zero".to_string(),
            ));
        }

        if self.notification_capacity == 0 {
            return Err(Error::Config(
                "Notification capacity must be greater than 0".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        self.retry_policy.validate()
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn settings_store_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "SettingsStore".to_string(),
        message: "SettingsStore implementation is required for queue persistence. \
                 Desktop: enable the 'desktop-shims' feature to use the default SqliteSettingsStore. \
                 Mobile: inject platform-native settings (UserDefaults/DataStore)."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_settings_store(settings_path: Option<PathBuf>) -> Result<Arc<dyn SettingsStore>> {
    use bridge_desktop::SqliteSettingsStore;
    use std::thread;
    use tokio::runtime::{Builder, Handle};

    let path = settings_path.ok_or_else(|| {
        Error::Config(
            "No SettingsStore provided. Use .settings_store() or .settings_path() to set one."
                .to_string(),
        )
    })?;

    let init_store = |path: PathBuf| -> Result<SqliteSettingsStore> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                Error::Internal(format!(
                    "Failed to create Tokio runtime for default settings store: {}",
                    e
                ))
            })?;

        runtime
            .block_on(SqliteSettingsStore::new(path))
            .map_err(|e| {
                Error::Internal(format!("Failed to initialize default SettingsStore: {}", e))
            })
    };

    // block_on cannot run on a runtime worker, so hop to a plain thread.
    let store = match Handle::try_current() {
        Ok(_) => thread::spawn(move || init_store(path))
            .join()
            .map_err(|_| {
                Error::Internal(
                    "Worker thread panicked while creating default SettingsStore".to_string(),
                )
            })??,
        Err(_) => init_store(path)?,
    };

    let store: Arc<dyn SettingsStore> = Arc::new(store);
    Ok(store)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_settings_store(_settings_path: Option<PathBuf>) -> Result<Arc<dyn SettingsStore>> {
    Err(settings_store_missing_error())
}

/// Builder for [`PlayerConfig`].
#[derive(Default)]
pub struct PlayerConfigBuilder {
    settings_store: Option<Arc<dyn SettingsStore>>,
    settings_path: Option<PathBuf>,
    preferred_audio_quality: Option<String>,
    preferred_artwork_resolution: Option<String>,
    load_timeout: Option<Duration>,
    retry_policy: Option<RetryPolicy>,
    restart_threshold: Option<Duration>,
    notification_capacity: Option<usize>,
    event_buffer_size: Option<usize>,
    queue_storage_key: Option<String>,
    audio_mode: Option<AudioMode>,
}

impl PlayerConfigBuilder {
    /// Sets the settings store implementation (required unless
    /// `desktop-shims` provides one from `settings_path`).
    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    /// Location of the SQLite settings file used by the desktop default store.
    pub fn settings_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.settings_path = Some(path.into());
        self
    }

    /// Candidate label preferred when picking a stream (e.g. "96kbps", "320kbps").
    pub fn preferred_audio_quality(mut self, label: impl Into<String>) -> Self {
        self.preferred_audio_quality = Some(label.into());
        self
    }

    pub fn preferred_artwork_resolution(mut self, label: impl Into<String>) -> Self {
        self.preferred_artwork_resolution = Some(label.into());
        self
    }

    pub fn load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = Some(timeout);
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    pub fn restart_threshold(mut self, threshold: Duration) -> Self {
        self.restart_threshold = Some(threshold);
        self
    }

    pub fn notification_capacity(mut self, capacity: usize) -> Self {
        self.notification_capacity = Some(capacity);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    pub fn queue_storage_key(mut self, key: impl Into<String>) -> Self {
        self.queue_storage_key = Some(key.into());
        self
    }

    pub fn audio_mode(mut self, mode: AudioMode) -> Self {
        self.audio_mode = Some(mode);
        self
    }

    /// Builds and validates the configuration.
    ///
    /// Fails when no settings store is available or a value is out of range.
    pub fn build(self) -> Result<PlayerConfig> {
        let settings_store = match self.settings_store {
            Some(store) => store,
            None => provide_default_settings_store(self.settings_path)?,
        };

        let config = PlayerConfig {
            settings_store,
            preferred_audio_quality: self
                .preferred_audio_quality
                .unwrap_or_else(|| DEFAULT_AUDIO_QUALITY.to_string()),
            preferred_artwork_resolution: self
                .preferred_artwork_resolution
                .unwrap_or_else(|| DEFAULT_ARTWORK_RESOLUTION.to_string()),
            load_timeout: self.load_timeout.unwrap_or(DEFAULT_LOAD_TIMEOUT),
            retry_policy: self.retry_policy.unwrap_or_default(),
            restart_threshold: self.restart_threshold.unwrap_or(DEFAULT_RESTART_THRESHOLD),
            notification_capacity: self
                .notification_capacity
                .unwrap_or(DEFAULT_NOTIFICATION_CAPACITY),
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            queue_storage_key: self
                .queue_storage_key
                .unwrap_or_else(|| DEFAULT_QUEUE_STORAGE_KEY.to_string()),
            audio_mode: self.audio_mode.unwrap_or_default(),
        };

        config.validate()?;

        Ok(config)
    }
}
