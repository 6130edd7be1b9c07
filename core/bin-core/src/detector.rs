//! Turns distance readings into discrete drop events.
//!
//! Edge-triggered: an object must leave the zone before it can be counted again.
//! The debounce window additionally suppresses re-entries caused by sensor ringing
//! at the threshold boundary.
//!
//! ```text
//! Clear    --in range, debounce elapsed-->  Occupied  (DropConfirmed)
//! Clear    --in range, inside debounce-->   Occupied  (no event)
//! Occupied --unavailable or >= wall-->      Clear
//! Occupied --in range-->                    Occupied
//! ```

use std::time::Duration;

use crate::types::{DetectionState, Distance, DropConfirmed, Reading, Timestamp};

#[derive(Debug, Clone)]
pub struct DropDetector {
    wall_distance: Distance,
    debounce: Duration,
    state: DetectionState,
}

impl DropDetector {
    pub fn new(wall_distance: Distance, debounce: Duration) -> Self {
        Self {
            wall_distance,
            debounce,
            state: DetectionState::default(),
        }
    }

    pub fn state(&self) -> &DetectionState {
        &self.state
    }

    pub fn reset(&mut self) {
        self.state = DetectionState::default();
    }

    pub fn observe(&mut self, reading: Reading, now: Timestamp) -> Option<DropConfirmed> {
        self.state.last_measurement = reading.distance();

        if !self.in_zone(reading) {
            self.state.trash_present = false;
            return None;
        }

        if self.state.trash_present {
            return None;
        }
        self.state.trash_present = true;

        if !self.debounce_elapsed(now) {
            tracing::debug!(
                at_ms = now.as_millis(),
                "Re-entry inside debounce window; not counted"
            );
            return None;
        }

        self.state.last_drop_at = Some(now);
        Some(DropConfirmed { at: now })
    }

    fn in_zone(&self, reading: Reading) -> bool {
        match reading {
            Reading::Range(distance) => {
                distance.as_cm() > 0.0 && distance.as_cm() < self.wall_distance.as_cm()
            }
            Reading::Unavailable => false,
        }
    }

    fn debounce_elapsed(&self, now: Timestamp) -> bool {
        match self.state.last_drop_at {
            Some(last) => now.saturating_since(last) >= self.debounce,
            None => true,
        }
    }
}
