//! Workspace placeholder crate.
//!
//! This crate exposes feature flags that map to the individual workspace
//! crates (`core-service`, `core-playback`). Host applications can depend on
//! `player-workspace` and enable `desktop-shims` (SQLite-backed settings) or
//! `headless` (host injects every bridge) without wiring each crate
//! individually.

#[cfg(any(feature = "desktop-shims", feature = "headless"))]
pub use core_playback as playback;
#[cfg(any(feature = "desktop-shims", feature = "headless"))]
pub use core_service as service;
