//! Core data types shared by the detector, the session controller and the agent.

use bin_remote_protocol::FlagValue;
use serde::{Deserialize, Serialize};
use std::ops::Add;
use std::time::Duration;

// ═══════════════════════════════════════════════════════════════════════════════
// Time and distance
// ═══════════════════════════════════════════════════════════════════════════════

/// Monotonic milliseconds since the agent started.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(0);

    pub const fn from_millis(millis: u64) -> Self {
        Timestamp(millis)
    }

    pub const fn as_millis(&self) -> u64 {
        self.0
    }

    /// Time elapsed since `earlier`, zero if `earlier` is in the future.
    pub fn saturating_since(&self, earlier: Timestamp) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Duration) -> Timestamp {
        let millis = u64::try_from(rhs.as_millis()).unwrap_or(u64::MAX);
        Timestamp(self.0.saturating_add(millis))
    }
}

/// Distance in centimetres. Never negative.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Distance(f64);

impl Distance {
    /// Negative and non-finite inputs clamp to zero.
    pub fn from_cm(cm: f64) -> Self {
        if cm.is_finite() && cm > 0.0 {
            Distance(cm)
        } else {
            Distance(0.0)
        }
    }

    pub fn as_cm(&self) -> f64 {
        self.0
    }
}

/// One sensor measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    Range(Distance),
    /// No echo inside the timeout window; nothing in range.
    Unavailable,
}

impl Reading {
    pub fn distance(&self) -> Option<Distance> {
        match self {
            Reading::Range(distance) => Some(*distance),
            Reading::Unavailable => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Owned state
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionState {
    pub active: bool,
    pub started_at: Timestamp,
    pub last_drop_at: Timestamp,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DropCounter {
    pub count: u32,
    /// The current count has not been handed to the remote store yet.
    pub pending_sync: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DetectionState {
    pub last_measurement: Option<Distance>,
    pub trash_present: bool,
    pub last_drop_at: Option<Timestamp>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Events
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteFlagObservation {
    pub value: FlagValue,
    pub observed_at: Timestamp,
}

impl RemoteFlagObservation {
    pub fn new(value: FlagValue, observed_at: Timestamp) -> Self {
        Self { value, observed_at }
    }

    pub fn from_payload(payload: &str, observed_at: Timestamp) -> Self {
        Self::new(FlagValue::parse(payload), observed_at)
    }
}

/// Emitted by the detector on a counted drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropConfirmed {
    pub at: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Remote,
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionTransition {
    Started,
    Stopped(StopReason),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_elapsed_saturates() {
        let early = Timestamp::from_millis(100);
        let late = Timestamp::from_millis(350);
        assert_eq!(late.saturating_since(early), Duration::from_millis(250));
        assert_eq!(early.saturating_since(late), Duration::ZERO);
    }

    #[test]
    fn distance_clamps_negative_and_nan() {
        assert_eq!(Distance::from_cm(-3.0).as_cm(), 0.0);
        assert_eq!(Distance::from_cm(f64::NAN).as_cm(), 0.0);
        assert_eq!(Distance::from_cm(8.5).as_cm(), 8.5);
    }
}
