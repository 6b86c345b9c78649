//! Typed configuration from environment variables.
//!
//! Loads once at startup, fails fast if a value is present but malformed.
//! Every variable is optional; absent ones fall back to defaults.

use crate::error::{Error, Result};
use crate::playback::stage::{MAX_SPEED, MIN_SPEED};
use crate::sequencer::SequencerConfig;
use std::str::FromStr;
use std::time::Duration;

/// Default number of back-to-back soft failures before the sequencer warns.
pub const DEFAULT_SOFT_FAILURE_WARN_AFTER: u32 = 8;

#[derive(Debug, Clone)]
pub struct Config {
    pub otel_endpoint: Option<String>,
    pub log_level: String,
    /// Upper bound on a single effect's playback. `None` waits forever.
    pub effect_timeout: Option<Duration>,
    pub soft_failure_warn_after: u32,
    /// Playback speed multiplier for the stage backend (2.0 = twice as fast).
    pub speed: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            otel_endpoint: None,
            log_level: "info".to_string(),
            effect_timeout: None,
            soft_failure_warn_after: DEFAULT_SOFT_FAILURE_WARN_AFTER,
            speed: 1.0,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let speed = optional_var::<f64>("CARDFX_SPEED")?.unwrap_or(defaults.speed);
        if !(MIN_SPEED..=MAX_SPEED).contains(&speed) {
            return Err(Error::Config(format!(
                "CARDFX_SPEED must be between {MIN_SPEED} and {MAX_SPEED}, got {speed}"
            )));
        }

        Ok(Self {
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            effect_timeout: optional_var::<u64>("CARDFX_EFFECT_TIMEOUT_MS")?
                .map(Duration::from_millis),
            soft_failure_warn_after: optional_var("CARDFX_SOFT_FAILURE_WARN_AFTER")?
                .unwrap_or(defaults.soft_failure_warn_after),
            speed,
        })
    }

    /// The subset of configuration the sequencer consumes.
    pub fn sequencer(&self) -> SequencerConfig {
        SequencerConfig {
            effect_timeout: self.effect_timeout,
            soft_failure_warn_after: self.soft_failure_warn_after,
        }
    }
}

fn optional_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("invalid value for {name} ({raw:?}): {e}"))),
        Err(_) => Ok(None),
    }
}
