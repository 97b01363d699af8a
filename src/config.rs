//! Application configuration
//!
//! Loaded from a TOML file, falling back to defaults for every missing
//! section or field.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::*;
use crate::error::{Error, Result};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub game: GameConfig,
    pub lookup: LookupConfig,
    pub catalog: CatalogConfig,
    pub playback: PlaybackConfig,
    pub ui: UiConfig,
}

/// Round and timer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub total_rounds: usize,
    pub songs_per_round: usize,
    pub ceiling_ms: u64,
    pub settle_ms: u64,
    pub failure_advance_ms: u64,
    pub notification_ms: u64,
    pub progress_tick_ms: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            total_rounds: TOTAL_ROUNDS,
            songs_per_round: SONGS_PER_ROUND,
            ceiling_ms: CEILING_MS,
            settle_ms: TRANSITION_SETTLE_MS,
            failure_advance_ms: FAILURE_ADVANCE_MS,
            notification_ms: NOTIFICATION_MS,
            progress_tick_ms: PROGRESS_TICK_MS,
        }
    }
}

impl GameConfig {
    pub fn ceiling(&self) -> Duration {
        Duration::from_millis(self.ceiling_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn failure_advance(&self) -> Duration {
        Duration::from_millis(self.failure_advance_ms)
    }

    pub fn notification_lifetime(&self) -> Duration {
        Duration::from_millis(self.notification_ms)
    }

    pub fn progress_tick(&self) -> Duration {
        Duration::from_millis(self.progress_tick_ms)
    }

    /// Unique candidates one full session consumes
    pub fn candidates_needed(&self) -> usize {
        self.total_rounds * self.songs_per_round
    }
}

/// Metadata lookup settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub artwork_size: u32,
    pub country: Option<String>,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            base_url: ITUNES_SEARCH_URL.to_string(),
            timeout_secs: 8,
            artwork_size: ARTWORK_SIZE,
            country: None,
        }
    }
}

/// Catalog location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub data_dir: PathBuf,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

/// Output device settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Output volume (0.0 - 1.0)
    pub volume: f32,
    /// Length after which the headless device reports a natural end
    pub clip_length_ms: u64,
    /// Headless device refuses playback until unlocked by a gesture
    pub require_gesture: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            volume: 1.0,
            clip_length_ms: 30_000,
            require_gesture: false,
        }
    }
}

/// Presentation API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub bind_address: String,
    pub http_port: u16,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            http_port: DEFAULT_HTTP_PORT,
        }
    }
}

impl AppConfig {
    /// Platform default location of `config.toml`
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "square-savior").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, or from the platform default, or fall back to defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }

        match Self::default_path() {
            Some(path) if path.exists() => {
                tracing::info!(path = %path.display(), "Loading configuration");
                Self::load(&path)
            }
            _ => {
                tracing::debug!("No configuration file, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Write configuration as TOML, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.game.total_rounds == 0 {
            return Err(Error::Config("total_rounds must be at least 1".into()));
        }
        if self.game.songs_per_round == 0 {
            return Err(Error::Config("songs_per_round must be at least 1".into()));
        }
        if self.game.ceiling_ms == 0 {
            return Err(Error::Config("ceiling_ms must be positive".into()));
        }
        if self.game.progress_tick_ms == 0 {
            return Err(Error::Config("progress_tick_ms must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.playback.volume) {
            return Err(Error::Config(format!(
                "volume {} outside 0.0 - 1.0",
                self.playback.volume
            )));
        }
        Ok(())
    }
}
