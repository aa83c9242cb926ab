//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `SettingsStore` using a SQLite-backed key-value table
//!
//! Audio output is always supplied by the host application; this crate only
//! ships the storage default the player core needs for queue persistence.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::SqliteSettingsStore;
//! use bridge_traits::SettingsStore;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = SqliteSettingsStore::new("/tmp/player/settings.db".into()).await.unwrap();
//!     store.set_string("player_queue", "[]").await.unwrap();
//! }
//! ```

mod settings;

pub use settings::SqliteSettingsStore;
