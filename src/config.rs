//! Runtime configuration.
//!
//! Values are layered with `figment`, highest priority last:
//!   1. Built-in defaults.
//!   2. Optional TOML (see [`Config::from_toml`]).
//!   3. Environment variables prefixed `FLUENT_ROUTINE_`, nested with `__`,
//!      e.g. `FLUENT_ROUTINE_HOST__TIME_SCALE=0.5`.
//!
//! ```toml
//! [host]
//! tick_seconds = 0.02
//! time_scale = 1.0
//! max_failures = 64
//!
//! [pool]
//! max_retained = 256
//! ```

use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const ENV_PREFIX: &str = "FLUENT_ROUTINE_";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub host: HostConfig,
    pub pool: PoolConfig,
}

/// Clock settings of the reference [`TickScheduler`](crate::TickScheduler).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Real time advanced by each `tick()`.
    pub tick_seconds: f64,
    /// Multiplier from real to scaled time. `0.0` freezes scaled waits.
    pub time_scale: f64,
    /// Failed tasks kept for `take_failures`; the oldest are dropped first.
    pub max_failures: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            tick_seconds: 1.0 / 60.0,
            time_scale: 1.0,
            max_failures: 64,
        }
    }
}

impl HostConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_non_negative("host.tick_seconds", self.tick_seconds)?;
        check_non_negative("host.time_scale", self.time_scale)
    }

    pub fn tick(&self) -> Duration {
        Duration::try_from_secs_f64(self.tick_seconds).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Idle records kept for reuse; releases beyond this are dropped.
    pub max_retained: usize,
    /// Records allocated up front.
    pub prewarm: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_retained: 1024,
            prewarm: 0,
        }
    }
}

impl Config {
    /// Defaults overlaid with `FLUENT_ROUTINE_*` environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::extract(Self::figment())
    }

    /// Defaults, then `toml`, then the environment.
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::string(toml))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));
        Self::extract(figment)
    }

    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: Config = figment.extract()?;
        config.host.validate()?;
        Ok(config)
    }
}

fn check_non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange { field, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.pool.max_retained, 1024);
        assert_eq!(config.host.time_scale, 1.0);
        assert_eq!(config.host.max_failures, 64);
        assert!(config.host.validate().is_ok());
        assert_eq!(config.host.tick(), Duration::from_secs_f64(1.0 / 60.0));
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let config = Config::from_toml(
            r#"
            [host]
            time_scale = 0.5

            [pool]
            prewarm = 8
            "#,
        )
        .expect("valid config");

        assert_eq!(config.host.time_scale, 0.5);
        assert_eq!(config.host.tick_seconds, 1.0 / 60.0);
        assert_eq!(config.pool.prewarm, 8);
        assert_eq!(config.pool.max_retained, 1024);
    }

    #[test]
    fn test_negative_time_scale_rejected() {
        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Serialized::default("host.time_scale", -1.0));
        let err = Config::extract(figment).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::OutOfRange {
                field: "host.time_scale",
                ..
            }
        ));
    }
}
