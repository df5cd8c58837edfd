//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::Duration;
use cradle_core::{MAX_TREND_DAYS, SubjectId, TimelineConfig, TrendConfig, VolumeUnit};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,
    /// Baby whose logs are shown and recorded; unset means all logs.
    #[serde(default)]
    pub active_baby: Option<String>,
    /// Unit for entering and showing volumes.
    pub volume_unit: VolumeUnit,
    /// Fraction of a rolling timeline kept ahead of now.
    pub forward_buffer: f64,
    /// Narrowest timeline bar, in percent of the window.
    pub min_bar_width: f64,
    /// Days covered by `trend`.
    pub trend_days: u32,
    /// Lowest scale of the sleep and nursing trends, in minutes.
    pub sleep_trend_floor_minutes: f64,
    /// Lowest scale of the milk trend, in the configured unit.
    pub milk_trend_floor: f64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("active_baby", &self.active_baby)
            .field("volume_unit", &self.volume_unit)
            .finish_non_exhaustive()
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("cradle.db"),
            active_baby: None,
            volume_unit: VolumeUnit::Ml,
            forward_buffer: 0.1,
            min_bar_width: 1.5,
            trend_days: 7,
            sleep_trend_floor_minutes: 60.0,
            milk_trend_floor: 100.0,
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // CRADLE_DATABASE_PATH, CRADLE_ACTIVE_BABY, ...
        figment = figment.merge(Env::prefixed("CRADLE_"));

        figment.extract()
    }

    /// Resolves the subject scope: the `--baby` flag wins over `active_baby`.
    ///
    /// A blank name falls back to unscoped access.
    pub fn subject(&self, flag: Option<&str>) -> Option<SubjectId> {
        let name = flag.or(self.active_baby.as_deref())?;
        match SubjectId::new(name) {
            Ok(id) => Some(id),
            Err(err) => {
                tracing::warn!(%err, "ignoring baby name, showing all logs");
                None
            }
        }
    }

    pub fn timeline(&self) -> TimelineConfig {
        TimelineConfig {
            span: Duration::hours(24),
            forward_buffer: self.forward_buffer,
            min_width: self.min_bar_width,
        }
    }

    pub fn trend(&self, days: Option<u32>, floor: f64) -> TrendConfig {
        TrendConfig {
            days: days.unwrap_or(self.trend_days).clamp(1, MAX_TREND_DAYS),
            floor,
        }
    }
}

/// Returns the platform-specific config directory for cradle.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("cradle"))
}

/// Returns the platform-specific data directory for cradle.
///
/// On Linux: `~/.local/share/cradle`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("cradle"))
}
