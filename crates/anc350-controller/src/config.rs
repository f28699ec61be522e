use std::path::Path;
use std::time::Duration;

use anc350_telegram::address::MAX_AXIS_INDEX;
use serde::{Deserialize, Serialize};

use crate::error::{ControllerError, Result};

/// Highest number of axes one controller drives.
pub const MAX_AXES: usize = MAX_AXIS_INDEX as usize + 1;

/// Transaction engine timing and retry policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Timeout for each read from the controller. Default: 100 ms.
    #[serde(rename = "read_timeout_ms", with = "duration_ms")]
    pub read_timeout: Duration,
    /// Timeout for writing a request. Default: 500 ms.
    #[serde(rename = "write_timeout_ms", with = "duration_ms")]
    pub write_timeout: Duration,
    /// Timed-out reads tolerated while waiting for the length prefix.
    pub prefix_attempts: u32,
    /// Timed-out reads tolerated while waiting for the reply body.
    pub body_attempts: u32,
    /// Extra replies read after one with the wrong correlation number.
    pub mismatch_retries: u32,
    /// Drop unread receive data before each request.
    pub discard_before_send: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_millis(100),
            write_timeout: Duration::from_millis(500),
            prefix_attempts: 1,
            body_attempts: 3,
            mismatch_retries: 1,
            discard_before_send: true,
        }
    }
}

/// Poll periods for the background status poller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    /// Period while any axis is moving. Default: 500 ms.
    #[serde(rename = "moving_period_ms", with = "duration_ms")]
    pub moving_period: Duration,
    /// Period for axes at rest. Default: 1000 ms.
    #[serde(rename = "idle_period_ms", with = "duration_ms")]
    pub idle_period: Duration,
}

impl PollerConfig {
    /// Moving polls per idle poll, at least 1.
    pub fn idle_ratio(&self) -> u32 {
        let moving = self.moving_period.as_secs_f64();
        if moving <= 0.0 {
            return 1;
        }
        let ratio = (self.idle_period.as_secs_f64() / moving).round();
        if ratio < 1.0 {
            1
        } else {
            ratio as u32
        }
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            moving_period: Duration::from_millis(500),
            idle_period: Duration::from_millis(1000),
        }
    }
}

/// Communication health thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Consecutive failed transactions tolerated before the persistent
    /// comm-error flag is raised. Default: 200.
    pub comm_error_threshold: u32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            comm_error_threshold: 200,
        }
    }
}

/// Configuration for one controller session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Number of axes in use, 1..=7. Default: 3.
    pub axes: usize,
    /// TCP connect timeout. Default: 5 s.
    #[serde(rename = "connect_timeout_ms", with = "duration_ms")]
    pub connect_timeout: Duration,
    pub engine: EngineConfig,
    pub poller: PollerConfig,
    pub health: HealthConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            axes: 3,
            connect_timeout: Duration::from_secs(5),
            engine: EngineConfig::default(),
            poller: PollerConfig::default(),
            health: HealthConfig::default(),
        }
    }
}

impl ControllerConfig {
    /// Load a configuration from a JSON file. Missing keys keep defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the controller or poller cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.axes == 0 || self.axes > MAX_AXES {
            return Err(ControllerError::InvalidConfig(format!(
                "axes must be between 1 and {MAX_AXES}, got {}",
                self.axes
            )));
        }
        if self.engine.read_timeout.is_zero() {
            return Err(ControllerError::InvalidConfig(
                "read timeout must be non-zero".to_string(),
            ));
        }
        if self.poller.moving_period.is_zero() || self.poller.idle_period.is_zero() {
            return Err(ControllerError::InvalidConfig(
                "poll periods must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
