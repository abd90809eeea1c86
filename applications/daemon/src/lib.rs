//! Breeze Daemon Library
//!
//! Home media controller: a playback engine over mpv, yt-dlp track
//! resolution, weather-aware autoplay and a status broadcaster.
//!
//! This library exposes the daemon components for testing purposes.

pub mod config;
pub mod error;
pub mod notifier;
pub mod runtime;
pub mod services;

pub use config::DaemonConfig;
pub use error::{DaemonError, Result};
pub use notifier::{ContextStatus, Notifier, PlaybackStatus, StatusProvider};
pub use services::{MpvPlayer, OpenWeatherSource, YtDlpResolver};
