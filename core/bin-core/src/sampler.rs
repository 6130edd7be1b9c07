//! Distance sampling.
//!
//! A sampler performs one bounded measurement per call. Raw pulse timing stays
//! behind [`EchoPulse`]; this module only turns an echo duration into a distance.

use std::collections::VecDeque;
use std::path::Path;
use std::time::Duration;

use crate::config::AgentConfig;
use crate::error::{AgentError, Result};
use crate::types::{Distance, Reading};

/// Speed of sound at room temperature, in centimetres per microsecond.
pub const SPEED_OF_SOUND_CM_PER_US: f64 = 0.0343;

pub trait DistanceSampler {
    /// Blocks for at most the sampler's echo timeout.
    fn sample(&mut self) -> Reading;
}

/// Hardware boundary: emit a trigger pulse and time the echo.
pub trait EchoPulse {
    /// Round-trip echo duration, or `None` if nothing came back within `timeout`.
    fn measure_echo(&mut self, timeout: Duration) -> Option<Duration>;
}

/// Converts a round-trip echo duration into a one-way distance.
pub fn echo_to_distance(echo: Duration) -> Distance {
    let micros = echo.as_secs_f64() * 1_000_000.0;
    Distance::from_cm(micros * SPEED_OF_SOUND_CM_PER_US / 2.0)
}

#[derive(Debug)]
pub struct EchoSampler<P: EchoPulse> {
    pulse: P,
    timeout: Duration,
}

impl<P: EchoPulse> EchoSampler<P> {
    pub fn new(pulse: P, timeout: Duration) -> Self {
        Self { pulse, timeout }
    }

    /// Bounds every measurement by `sensor.echo_timeout_ms`.
    pub fn from_config(pulse: P, config: &AgentConfig) -> Self {
        Self::new(pulse, config.echo_timeout())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl<P: EchoPulse> DistanceSampler for EchoSampler<P> {
    fn sample(&mut self) -> Reading {
        match self.pulse.measure_echo(self.timeout) {
            // A late echo is as good as none.
            Some(echo) if echo <= self.timeout => Reading::Range(echo_to_distance(echo)),
            _ => Reading::Unavailable,
        }
    }
}

/// Plays back a fixed list of readings, then reports `Unavailable` forever.
#[derive(Debug, Clone, Default)]
pub struct ReplaySampler {
    readings: VecDeque<Reading>,
}

impl ReplaySampler {
    pub fn new(readings: impl IntoIterator<Item = Reading>) -> Self {
        Self {
            readings: readings.into_iter().collect(),
        }
    }

    /// Loads a sample script: one reading per line, in centimetres.
    ///
    /// `-` marks a timed-out measurement. Blank lines and `#` comments are skipped.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs_err::read_to_string(path)
            .map_err(|err| AgentError::io(format!("reading samples {}", path.display()), err))?;
        Ok(Self::new(parse_script(&content, path)?))
    }

    pub fn remaining(&self) -> usize {
        self.readings.len()
    }
}

impl DistanceSampler for ReplaySampler {
    fn sample(&mut self) -> Reading {
        self.readings.pop_front().unwrap_or(Reading::Unavailable)
    }
}

fn parse_script(content: &str, path: &Path) -> Result<Vec<Reading>> {
    let mut readings = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let value = line.split('#').next().unwrap_or("").trim();
        if value.is_empty() {
            continue;
        }
        if value == "-" {
            readings.push(Reading::Unavailable);
            continue;
        }
        match value.parse::<f64>() {
            Ok(cm) if cm.is_finite() && cm >= 0.0 => {
                readings.push(Reading::Range(Distance::from_cm(cm)))
            }
            _ => {
                return Err(AgentError::InvalidSample {
                    path: path.to_path_buf(),
                    line: index + 1,
                    value: value.to_string(),
                })
            }
        }
    }
    Ok(readings)
}
