//! Runtime configuration
//!
//! Layering: built-in defaults → TOML file → `COACHLINE_*` environment
//! variables → validation.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use crate::{
    BUFFER_CAPACITY, CATEGORY_CONFIDENCE_FLOOR, ENGAGEMENT_TREND_THRESHOLD,
    HIGH_CONFIDENCE_RATIO, LOOKBACK_SECS, SILENCE_THRESHOLD_SECS, STALE_WORD_MAX_AGE_SECS,
    TOP_N_CATEGORIES, TREND_THRESHOLD, WINDOW_DURATION_SECS,
};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Tuning for one session's aggregation pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Interval length in seconds
    pub window_duration_secs: f64,
    /// Rolling buffer capacity (intervals)
    pub buffer_capacity: usize,
    /// Periodic trigger cadence; `None` means capacity × window
    pub update_interval_secs: Option<f64>,
    /// Late-word tolerance before an interval start
    pub lookback_secs: f64,
    /// Inter-word gap that marks silence
    pub silence_threshold_secs: f64,
    /// Pending words older than this are dropped on tick
    pub stale_word_max_age_secs: f64,
    /// Ranked categories per interval
    pub top_n: usize,
    /// Per-interval and per-buffer trend threshold
    pub trend_threshold: f64,
    /// Detected-sample ratio for `high_confidence`
    pub high_confidence_ratio: f64,
    /// Minimum weighted sum for a non-baseline category
    pub category_floor: f64,
    /// Engagement ordinal delta for a non-stable trend
    pub engagement_trend_threshold: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_duration_secs: WINDOW_DURATION_SECS,
            buffer_capacity: BUFFER_CAPACITY,
            update_interval_secs: None,
            lookback_secs: LOOKBACK_SECS,
            silence_threshold_secs: SILENCE_THRESHOLD_SECS,
            stale_word_max_age_secs: STALE_WORD_MAX_AGE_SECS,
            top_n: TOP_N_CATEGORIES,
            trend_threshold: TREND_THRESHOLD,
            high_confidence_ratio: HIGH_CONFIDENCE_RATIO,
            category_floor: CATEGORY_CONFIDENCE_FLOOR,
            engagement_trend_threshold: ENGAGEMENT_TREND_THRESHOLD,
        }
    }
}

impl PipelineConfig {
    /// Effective periodic trigger cadence in seconds
    pub fn update_interval(&self) -> f64 {
        self.update_interval_secs
            .unwrap_or(self.buffer_capacity as f64 * self.window_duration_secs)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.window_duration_secs > 0.0) {
            return Err(ConfigError::Validation(
                "window_duration_secs must be > 0".to_string(),
            ));
        }
        if self.buffer_capacity < 2 {
            return Err(ConfigError::Validation(
                "buffer_capacity must be >= 2".to_string(),
            ));
        }
        if let Some(secs) = self.update_interval_secs {
            if !(secs > 0.0) {
                return Err(ConfigError::Validation(
                    "update_interval_secs must be > 0".to_string(),
                ));
            }
        }
        if self.lookback_secs < 0.0 {
            return Err(ConfigError::Validation(
                "lookback_secs must be >= 0".to_string(),
            ));
        }
        if !(self.silence_threshold_secs > 0.0) {
            return Err(ConfigError::Validation(
                "silence_threshold_secs must be > 0".to_string(),
            ));
        }
        if self.stale_word_max_age_secs < self.lookback_secs {
            return Err(ConfigError::Validation(
                "stale_word_max_age_secs must be >= lookback_secs".to_string(),
            ));
        }
        if self.top_n == 0 {
            return Err(ConfigError::Validation("top_n must be >= 1".to_string()));
        }
        if !(0.0..=1.0).contains(&self.high_confidence_ratio) {
            return Err(ConfigError::Validation(
                "high_confidence_ratio must be in [0, 1]".to_string(),
            ));
        }
        if self.trend_threshold < 0.0 || self.engagement_trend_threshold < 0.0 {
            return Err(ConfigError::Validation(
                "trend thresholds must be >= 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Transport-side settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
    pub max_sessions: usize,
    pub advice_cache_enabled: bool,
    pub advice_cache_ttl_secs: u64,
    pub advice_cache_max_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:3000".to_string(),
            max_sessions: 100,
            advice_cache_enabled: true,
            advice_cache_ttl_secs: 300,
            advice_cache_max_size: 1000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub pipeline: PipelineConfig,
    pub server: ServerConfig,
}

impl FromStr for AppConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}

impl AppConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        content.parse()
    }

    /// Defaults, optional file, then environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `COACHLINE_*` environment variable overrides
    pub(crate) fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        let p = &mut self.pipeline;
        env_override("COACHLINE_WINDOW_DURATION_SECS", &mut p.window_duration_secs)?;
        env_override("COACHLINE_BUFFER_CAPACITY", &mut p.buffer_capacity)?;
        env_override("COACHLINE_LOOKBACK_SECS", &mut p.lookback_secs)?;
        env_override("COACHLINE_SILENCE_THRESHOLD_SECS", &mut p.silence_threshold_secs)?;
        env_override("COACHLINE_STALE_WORD_MAX_AGE_SECS", &mut p.stale_word_max_age_secs)?;
        if let Ok(val) = std::env::var("COACHLINE_UPDATE_INTERVAL_SECS") {
            p.update_interval_secs = Some(val.parse().map_err(|_| {
                ConfigError::Validation("Invalid COACHLINE_UPDATE_INTERVAL_SECS".to_string())
            })?);
        }

        let s = &mut self.server;
        env_override("COACHLINE_ADDR", &mut s.addr)?;
        env_override("COACHLINE_MAX_SESSIONS", &mut s.max_sessions)?;
        env_override("COACHLINE_ADVICE_CACHE_ENABLED", &mut s.advice_cache_enabled)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pipeline.validate()?;
        if self.server.max_sessions == 0 {
            return Err(ConfigError::Validation(
                "max_sessions must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_override<T: FromStr>(key: &str, target: &mut T) -> Result<(), ConfigError> {
    if let Ok(val) = std::env::var(key) {
        *target = val
            .parse()
            .map_err(|_| ConfigError::Validation(format!("Invalid {}", key)))?;
    }
    Ok(())
}
