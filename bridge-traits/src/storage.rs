//! Key-Value Storage Abstraction
//!
//! The player persists its queue through the host's preferences store so the
//! same core works against UserDefaults, SharedPreferences/DataStore, a desktop
//! SQLite file, or an in-memory map in tests.

use async_trait::async_trait;

use crate::error::Result;

/// Host preferences store.
///
/// Platform mapping: UserDefaults on iOS, SharedPreferences or DataStore on
/// Android, the SQLite store from `bridge-desktop` on desktop.
///
/// Writes replace the whole value; the store never merges or diffs. The
/// player only needs the string pair (the queue is one JSON document); the
/// typed accessors exist so hosts can keep player preferences in the same
/// store.
///
/// ```ignore
/// use bridge_traits::storage::SettingsStore;
///
/// async fn save_queue(store: &dyn SettingsStore, json: &str) -> Result<()> {
///     store.set_string("player_queue", json).await
/// }
/// ```
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn set_string(&self, key: &str, value: &str) -> Result<()>;

    /// `Ok(None)` when the key was never written or has been deleted.
    async fn get_string(&self, key: &str) -> Result<Option<String>>;

    async fn set_bool(&self, key: &str, value: bool) -> Result<()>;

    async fn get_bool(&self, key: &str) -> Result<Option<bool>>;

    async fn set_i64(&self, key: &str, value: i64) -> Result<()>;

    async fn get_i64(&self, key: &str) -> Result<Option<i64>>;

    async fn set_f64(&self, key: &str, value: f64) -> Result<()>;

    async fn get_f64(&self, key: &str) -> Result<Option<f64>>;

    /// Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    async fn has_key(&self, key: &str) -> Result<bool>;

    async fn list_keys(&self) -> Result<Vec<String>>;

    /// Wipe every key, the stored queue included.
    async fn clear_all(&self) -> Result<()>;
}
