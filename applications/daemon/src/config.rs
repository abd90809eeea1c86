/// Daemon configuration
use crate::error::{DaemonError, Result};
use breeze_ambient::AutoplayConfig;
use breeze_playback::EngineConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Files tried in order when no `--config` is given
pub const DEFAULT_CONFIG_FILES: &[&str] = &["breeze.toml", "config.yaml"];

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DaemonConfig {
    #[serde(default = "default_playback")]
    pub playback: PlaybackSettings,

    #[serde(default = "default_autoplay")]
    pub autoplay: AutoplaySettings,

    #[serde(default = "default_weather")]
    pub weather: WeatherSettings,

    #[serde(default = "default_catalog")]
    pub catalog: CatalogSettings,

    #[serde(default = "default_player")]
    pub player: PlayerSettings,

    #[serde(default = "default_resolver")]
    pub resolver: ResolverSettings,

    #[serde(default = "default_notifier")]
    pub notifier: NotifierSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlaybackSettings {
    #[serde(default = "default_volume")]
    pub volume: u8,

    /// Start playing when a track lands in an idle player
    #[serde(default = "default_true")]
    pub autostart: bool,

    #[serde(default = "default_watchdog_interval_ms")]
    pub watchdog_interval_ms: u64,

    #[serde(default = "default_stuck_threshold_secs")]
    pub stuck_threshold_secs: u64,

    #[serde(default = "default_resolve_timeout_secs")]
    pub resolve_timeout_secs: u64,

    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AutoplaySettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_target_depth")]
    pub target_depth: usize,

    #[serde(default = "default_autoplay_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_autoplay_interval_ms")]
    pub interval_ms: u64,

    #[serde(default = "default_shortlist_size")]
    pub shortlist_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WeatherSettings {
    /// OpenWeather API key; without one the built-in clear-day context is used
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_latitude")]
    pub latitude: f64,

    #[serde(default = "default_longitude")]
    pub longitude: f64,

    /// Geocoded into latitude/longitude when set together with `country`
    #[serde(default)]
    pub city: Option<String>,

    #[serde(default)]
    pub country: Option<String>,

    #[serde(default = "default_weather_poll_secs")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_weather_base_url")]
    pub base_url: String,

    /// Nested `location` table; its values win over the flat keys
    #[serde(default, skip_serializing)]
    pub location: Option<LocationSettings>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LocationSettings {
    #[serde(default)]
    pub latitude: Option<f64>,

    #[serde(default)]
    pub longitude: Option<f64>,

    #[serde(default)]
    pub city: Option<String>,

    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogSettings {
    #[serde(default = "default_catalog_path")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlayerSettings {
    #[serde(default = "default_mpv_path")]
    pub mpv_path: PathBuf,

    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResolverSettings {
    #[serde(default = "default_ytdlp_path")]
    pub ytdlp_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotifierSettings {
    #[serde(default = "default_notifier_interval_ms")]
    pub interval_ms: u64,

    #[serde(default = "default_notifier_capacity")]
    pub capacity: usize,
}

impl DaemonConfig {
    /// Load configuration from file and environment
    ///
    /// `path` must exist when given; otherwise the first existing file of
    /// [`DEFAULT_CONFIG_FILES`] is read, if any. Environment variables
    /// prefixed `BREEZE_` override the file, with `__` between section and
    /// key (`BREEZE_WEATHER__API_KEY`).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, None)
    }

    /// Like [`load`](Self::load) with an explicit environment map in place of
    /// the process environment
    pub fn load_with_env(
        path: Option<&Path>,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(DaemonError::Config(format!(
                        "config file not found: {}",
                        path.display()
                    )));
                }
                settings = settings.add_source(config::File::from(path.to_path_buf()));
            }
            None => {
                if let Some(default_path) = DEFAULT_CONFIG_FILES
                    .iter()
                    .map(PathBuf::from)
                    .find(|p| p.exists())
                {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        settings = settings.add_source(
            config::Environment::with_prefix("BREEZE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(env),
        );

        let mut config: Self = settings.build()?.try_deserialize()?;
        config.weather.apply_location();
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.playback.volume > 100 {
            return Err(DaemonError::Config(format!(
                "playback.volume must be 0-100, got {}",
                self.playback.volume
            )));
        }

        let intervals = [
            ("playback.watchdog_interval_ms", self.playback.watchdog_interval_ms),
            ("playback.stuck_threshold_secs", self.playback.stuck_threshold_secs),
            ("playback.resolve_timeout_secs", self.playback.resolve_timeout_secs),
            ("playback.command_timeout_secs", self.playback.command_timeout_secs),
            ("autoplay.interval_ms", self.autoplay.interval_ms),
            ("weather.poll_interval_secs", self.weather.poll_interval_secs),
            ("weather.request_timeout_secs", self.weather.request_timeout_secs),
            ("notifier.interval_ms", self.notifier.interval_ms),
        ];
        if let Some((name, _)) = intervals.iter().find(|(_, value)| *value == 0) {
            return Err(DaemonError::Config(format!("{name} must be greater than 0")));
        }

        if self.autoplay.shortlist_size == 0 {
            return Err(DaemonError::Config(
                "autoplay.shortlist_size must be greater than 0".to_string(),
            ));
        }

        if self.autoplay.target_depth == 0 {
            return Err(DaemonError::Config(
                "autoplay.target_depth must be greater than 0".to_string(),
            ));
        }

        if self.notifier.capacity == 0 {
            return Err(DaemonError::Config(
                "notifier.capacity must be greater than 0".to_string(),
            ));
        }

        if self.weather.city.is_some() != self.weather.country.is_some() {
            return Err(DaemonError::Config(
                "weather.city and weather.country must be set together".to_string(),
            ));
        }

        Ok(())
    }
}

impl WeatherSettings {
    /// Fold the nested `location` table into the flat keys
    fn apply_location(&mut self) {
        let Some(location) = self.location.take() else {
            return;
        };
        if let Some(latitude) = location.latitude {
            self.latitude = latitude;
        }
        if let Some(longitude) = location.longitude {
            self.longitude = longitude;
        }
        if location.city.is_some() {
            self.city = location.city;
        }
        if location.country.is_some() {
            self.country = location.country;
        }
    }
}

impl PlaybackSettings {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            volume: self.volume,
            autostart: self.autostart,
            watchdog_interval: Duration::from_millis(self.watchdog_interval_ms),
            stuck_threshold: Duration::from_secs(self.stuck_threshold_secs),
            resolve_timeout: Duration::from_secs(self.resolve_timeout_secs),
            command_timeout: Duration::from_secs(self.command_timeout_secs),
            ..EngineConfig::default()
        }
    }
}

impl AutoplaySettings {
    pub fn autoplay_config(&self) -> AutoplayConfig {
        AutoplayConfig {
            target_depth: self.target_depth,
            timeout: Duration::from_secs(self.timeout_secs),
            interval: Duration::from_millis(self.interval_ms),
            shortlist_size: self.shortlist_size,
        }
    }
}

// Default value functions
fn default_playback() -> PlaybackSettings {
    PlaybackSettings {
        volume: default_volume(),
        autostart: true,
        watchdog_interval_ms: default_watchdog_interval_ms(),
        stuck_threshold_secs: default_stuck_threshold_secs(),
        resolve_timeout_secs: default_resolve_timeout_secs(),
        command_timeout_secs: default_command_timeout_secs(),
    }
}

fn default_autoplay() -> AutoplaySettings {
    AutoplaySettings {
        enabled: true,
        target_depth: default_target_depth(),
        timeout_secs: default_autoplay_timeout_secs(),
        interval_ms: default_autoplay_interval_ms(),
        shortlist_size: default_shortlist_size(),
    }
}

fn default_weather() -> WeatherSettings {
    WeatherSettings {
        api_key: None,
        latitude: default_latitude(),
        longitude: default_longitude(),
        city: None,
        country: None,
        poll_interval_secs: default_weather_poll_secs(),
        request_timeout_secs: default_request_timeout_secs(),
        base_url: default_weather_base_url(),
        location: None,
    }
}

fn default_catalog() -> CatalogSettings {
    CatalogSettings {
        path: default_catalog_path(),
    }
}

fn default_player() -> PlayerSettings {
    PlayerSettings {
        mpv_path: default_mpv_path(),
        socket_path: default_socket_path(),
    }
}

fn default_resolver() -> ResolverSettings {
    ResolverSettings {
        ytdlp_path: default_ytdlp_path(),
    }
}

fn default_notifier() -> NotifierSettings {
    NotifierSettings {
        interval_ms: default_notifier_interval_ms(),
        capacity: default_notifier_capacity(),
    }
}

fn default_true() -> bool {
    true
}

fn default_volume() -> u8 {
    80
}

fn default_watchdog_interval_ms() -> u64 {
    500
}

fn default_stuck_threshold_secs() -> u64 {
    10
}

fn default_resolve_timeout_secs() -> u64 {
    30
}

fn default_command_timeout_secs() -> u64 {
    5
}

fn default_target_depth() -> usize {
    1
}

fn default_autoplay_timeout_secs() -> u64 {
    20
}

fn default_autoplay_interval_ms() -> u64 {
    1000
}

fn default_shortlist_size() -> usize {
    breeze_ambient::SHORTLIST_SIZE
}

// London
fn default_latitude() -> f64 {
    51.5073219
}

fn default_longitude() -> f64 {
    -0.1276474
}

fn default_weather_poll_secs() -> u64 {
    600
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_weather_base_url() -> String {
    "https://api.openweathermap.org".to_string()
}

fn default_catalog_path() -> PathBuf {
    PathBuf::from("catalog.json")
}

fn default_mpv_path() -> PathBuf {
    PathBuf::from("mpv")
}

fn default_socket_path() -> PathBuf {
    std::env::temp_dir().join("breeze-mpv.sock")
}

fn default_ytdlp_path() -> PathBuf {
    PathBuf::from("yt-dlp")
}

fn default_notifier_interval_ms() -> u64 {
    1000
}

fn default_notifier_capacity() -> usize {
    64
}
