use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::types::Timestamp;

pub trait Clock {
    fn now(&self) -> Timestamp;
}

/// Milliseconds since construction, backed by `Instant`.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Timestamp {
        let millis = u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX);
        Timestamp::from_millis(millis)
    }
}

/// Hand-driven clock. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Rc::new(Cell::new(start.as_millis())),
        }
    }

    pub fn set(&self, at: Timestamp) {
        self.now.set(at.as_millis());
    }

    pub fn advance(&self, by: Duration) {
        let next = Timestamp::from_millis(self.now.get()) + by;
        self.now.set(next.as_millis());
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.now.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new(Timestamp::from_millis(10));
        let handle = clock.clone();
        handle.advance(Duration::from_millis(40));
        assert_eq!(clock.now(), Timestamp::from_millis(50));
        clock.set(Timestamp::from_millis(5));
        assert_eq!(handle.now(), Timestamp::from_millis(5));
    }

    #[test]
    fn monotonic_clock_never_goes_back() {
        let clock = MonotonicClock::new();
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first);
    }
}
