//! Agent configuration.
//!
//! Loaded once from TOML at startup. Every section and field has a default, so a
//! missing file or a partial file is valid. There is no runtime reconfiguration.

use bin_remote_protocol::DEFAULT_NAMESPACE;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AgentError, Result};

const DEFAULT_CONFIG_RELATIVE_PATH: &str = ".bin-agent/agent.toml";

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 3_000;
pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 100;
pub const DEFAULT_ECHO_TIMEOUT_MS: u64 = 30;
pub const DEFAULT_WALL_DISTANCE_CM: f64 = 12.0;
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;
pub const DEFAULT_SESSION_TIMEOUT_MS: u64 = 120_000;
pub const DEFAULT_TICK_MS: u64 = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub namespace: String,
    pub poll_interval_ms: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub sample_interval_ms: u64,
    /// Upper bound on one blocking measurement.
    pub echo_timeout_ms: u64,
    /// Anything closer than this is inside the drop zone.
    pub wall_distance_cm: f64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: DEFAULT_SAMPLE_INTERVAL_MS,
            echo_timeout_ms: DEFAULT_ECHO_TIMEOUT_MS,
            wall_distance_cm: DEFAULT_WALL_DISTANCE_CM,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub debounce_ms: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }
}

/// What the session timeout is measured from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutPolicy {
    /// Idle timeout: every confirmed drop extends the session.
    #[default]
    SinceLastDrop,
    /// Fixed-length sessions.
    SinceStart,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub timeout_ms: u64,
    pub timeout_policy: TimeoutPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_SESSION_TIMEOUT_MS,
            timeout_policy: TimeoutPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub tick_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_ms: DEFAULT_TICK_MS,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub remote: RemoteConfig,
    pub sensor: SensorConfig,
    pub detector: DetectorConfig,
    pub session: SessionConfig,
    pub scheduler: SchedulerConfig,
}

impl AgentConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.remote.poll_interval_ms)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sensor.sample_interval_ms)
    }

    pub fn echo_timeout(&self) -> Duration {
        Duration::from_millis(self.sensor.echo_timeout_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.detector.debounce_ms)
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session.timeout_ms)
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.scheduler.tick_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.remote.namespace.trim_matches('/').trim().is_empty() {
            return Err(invalid("remote.namespace", "must not be empty"));
        }
        if self.remote.poll_interval_ms == 0 {
            return Err(invalid("remote.poll_interval_ms", "must be positive"));
        }
        if self.sensor.sample_interval_ms == 0 {
            return Err(invalid("sensor.sample_interval_ms", "must be positive"));
        }
        if self.sensor.echo_timeout_ms == 0 {
            return Err(invalid("sensor.echo_timeout_ms", "must be positive"));
        }
        if !(self.sensor.wall_distance_cm.is_finite() && self.sensor.wall_distance_cm > 0.0) {
            return Err(invalid(
                "sensor.wall_distance_cm",
                "must be a positive distance",
            ));
        }
        if self.session.timeout_ms == 0 {
            return Err(invalid("session.timeout_ms", "must be positive"));
        }
        if self.scheduler.tick_ms == 0 {
            return Err(invalid("scheduler.tick_ms", "must be positive"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> AgentError {
    AgentError::InvalidConfig {
        field,
        reason: reason.to_string(),
    }
}

/// Returns `~/.bin-agent/agent.toml`.
pub fn default_config_path() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or(AgentError::HomeDirNotFound)?;
    Ok(home.join(DEFAULT_CONFIG_RELATIVE_PATH))
}

/// Loads and validates the agent config. A missing file yields defaults.
pub fn load_config(path: Option<PathBuf>) -> Result<AgentConfig> {
    let config_path = match path {
        Some(path) => path,
        None => default_config_path()?,
    };

    let config = if config_path.exists() {
        parse_config_file(&config_path)?
    } else {
        tracing::debug!(path = %config_path.display(), "No config file; using defaults");
        AgentConfig::default()
    };

    config.validate()?;
    Ok(config)
}

fn parse_config_file(path: &Path) -> Result<AgentConfig> {
    let content = fs_err::read_to_string(path)
        .map_err(|err| AgentError::io(format!("reading config {}", path.display()), err))?;
    toml::from_str::<AgentConfig>(&content).map_err(|err| AgentError::ConfigMalformed {
        path: path.to_path_buf(),
        details: err.to_string(),
    })
}
