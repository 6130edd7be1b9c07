//! Session state machine.
//!
//! Reconciles the remote session flag with local drop detection and decides
//! which remote writes to request. Local state is authoritative between polls:
//! write failures are logged upstream and never roll anything back here.
//!
//! # Transitions
//!
//! ```text
//! inactive --remote "true"-->  active    reset counter, clear detection, defer counter write
//! active   --remote "false"--> inactive  counter kept
//! active   --timeout-->        inactive  request flag write "false", latch stale "true"
//! ```
//!
//! # Stale-restart latch
//!
//! After a local timeout the remote flag still reads `true` until our write lands.
//! A poll already in flight would otherwise restart the session and zero the
//! counter. While latched, `true` observations are ignored. The latch releases on
//! an accepted `false` observation or once the flag write completes, either way.
//! From then on the remote value is trusted again; reads issued before the write
//! are filtered out upstream by [`RemoteSync`](crate::remote::RemoteSync).

use bin_remote_protocol::{Channel, RemoteValue};
use std::time::Duration;

use crate::config::{AgentConfig, TimeoutPolicy};
use crate::detector::DropDetector;
use crate::types::{
    DetectionState, Distance, DropConfirmed, DropCounter, Reading, RemoteFlagObservation,
    SessionState, SessionTransition, StopReason, Timestamp,
};

/// A remote write the controller wants issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteRequest {
    Counter(u32),
    SessionFlag(bool),
}

impl WriteRequest {
    pub fn channel(&self) -> Channel {
        match self {
            WriteRequest::Counter(_) => Channel::CounterWrite,
            WriteRequest::SessionFlag(_) => Channel::FlagWrite,
        }
    }

    pub fn value(&self) -> RemoteValue {
        match self {
            WriteRequest::Counter(count) => RemoteValue::Count(*count),
            WriteRequest::SessionFlag(flag) => RemoteValue::Flag(*flag),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionController {
    timeout: Duration,
    policy: TimeoutPolicy,
    session: SessionState,
    counter: DropCounter,
    detector: DropDetector,
    outbox: Vec<WriteRequest>,
    deferred_counter_write: bool,
    awaiting_remote_stop: bool,
}

impl SessionController {
    pub fn new(detector: DropDetector, timeout: Duration, policy: TimeoutPolicy) -> Self {
        Self {
            timeout,
            policy,
            session: SessionState::default(),
            counter: DropCounter::default(),
            detector,
            outbox: Vec::new(),
            deferred_counter_write: false,
            awaiting_remote_stop: false,
        }
    }

    pub fn from_config(config: &AgentConfig) -> Self {
        let detector = DropDetector::new(
            Distance::from_cm(config.sensor.wall_distance_cm),
            config.debounce(),
        );
        Self::new(
            detector,
            config.session_timeout(),
            config.session.timeout_policy,
        )
    }

    pub fn is_active(&self) -> bool {
        self.session.active
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn counter(&self) -> &DropCounter {
        &self.counter
    }

    pub fn detection(&self) -> &DetectionState {
        self.detector.state()
    }

    pub fn awaiting_remote_stop(&self) -> bool {
        self.awaiting_remote_stop
    }

    pub fn on_remote_flag_observed(
        &mut self,
        obs: RemoteFlagObservation,
    ) -> Option<SessionTransition> {
        let Some(requested) = obs.value.as_bool() else {
            tracing::debug!(value = ?obs.value, "Ignoring unrecognized session flag value");
            return None;
        };

        if self.awaiting_remote_stop {
            if requested {
                tracing::debug!("Ignoring stale session flag while timeout write is pending");
                return None;
            }
            self.awaiting_remote_stop = false;
        }

        if requested == self.session.active {
            return None;
        }

        if requested {
            self.start(obs.observed_at);
            Some(SessionTransition::Started)
        } else {
            self.session.active = false;
            tracing::info!(
                count = self.counter.count,
                at_ms = obs.observed_at.as_millis(),
                "Session stopped remotely"
            );
            Some(SessionTransition::Stopped(StopReason::Remote))
        }
    }

    /// Feeds one reading to the detector. Readings outside a session are dropped.
    pub fn on_sample(&mut self, reading: Reading, now: Timestamp) -> Option<DropConfirmed> {
        if !self.session.active {
            return None;
        }
        let event = self.detector.observe(reading, now)?;
        self.on_drop_confirmed(event.at);
        Some(event)
    }

    pub fn on_drop_confirmed(&mut self, now: Timestamp) {
        if !self.session.active {
            tracing::warn!("Drop confirmed outside an active session; ignoring");
            return;
        }
        self.counter.count = self.counter.count.saturating_add(1);
        self.counter.pending_sync = true;
        self.session.last_drop_at = now;
        self.outbox.push(WriteRequest::Counter(self.counter.count));
        tracing::info!(
            count = self.counter.count,
            at_ms = now.as_millis(),
            "Drop confirmed"
        );
    }

    pub fn tick(&mut self, now: Timestamp) -> Option<SessionTransition> {
        if !self.session.active {
            return None;
        }

        let reference = match self.policy {
            TimeoutPolicy::SinceLastDrop => self.session.last_drop_at,
            TimeoutPolicy::SinceStart => self.session.started_at,
        };
        if now.saturating_since(reference) <= self.timeout {
            return None;
        }

        self.session.active = false;
        self.awaiting_remote_stop = true;
        self.outbox.push(WriteRequest::SessionFlag(false));
        tracing::info!(
            count = self.counter.count,
            policy = ?self.policy,
            timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            "Session timed out"
        );
        Some(SessionTransition::Stopped(StopReason::Timeout))
    }

    /// Our `false` write landed; a later `true` is the operator starting a new session.
    pub fn on_flag_write_acknowledged(&mut self) {
        if self.awaiting_remote_stop {
            tracing::debug!("Releasing stale-restart latch after acknowledged flag write");
            self.awaiting_remote_stop = false;
        }
    }

    /// Our `false` write never reached the store; stop shielding against `true`.
    pub fn on_flag_write_failed(&mut self) {
        if self.awaiting_remote_stop {
            tracing::debug!("Releasing stale-restart latch after failed flag write");
            self.awaiting_remote_stop = false;
        }
    }

    /// Drains requested writes. Counter writes count as handed off once taken.
    pub fn take_requests(&mut self) -> Vec<WriteRequest> {
        let requests = std::mem::take(&mut self.outbox);
        if requests
            .iter()
            .any(|request| matches!(request, WriteRequest::Counter(_)))
        {
            self.counter.pending_sync = false;
        }
        requests
    }

    /// The post-start counter write, unless a drop write already covered it.
    pub fn take_deferred_counter_write(&mut self) -> Option<WriteRequest> {
        if !std::mem::take(&mut self.deferred_counter_write) || !self.counter.pending_sync {
            return None;
        }
        self.counter.pending_sync = false;
        Some(WriteRequest::Counter(self.counter.count))
    }

    fn start(&mut self, now: Timestamp) {
        self.session = SessionState {
            active: true,
            started_at: now,
            last_drop_at: now,
        };
        self.counter = DropCounter {
            count: 0,
            pending_sync: true,
        };
        self.detector.reset();
        self.deferred_counter_write = true;
        tracing::info!(at_ms = now.as_millis(), "Session started");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bin_remote_protocol::FlagValue;

    const TIMEOUT_MS: u64 = 10_000;

    fn controller(policy: TimeoutPolicy) -> SessionController {
        let detector = DropDetector::new(Distance::from_cm(12.0), Duration::from_millis(300));
        SessionController::new(detector, Duration::from_millis(TIMEOUT_MS), policy)
    }

    fn at(millis: u64) -> Timestamp {
        Timestamp::from_millis(millis)
    }

    fn flag(value: &str, millis: u64) -> RemoteFlagObservation {
        RemoteFlagObservation::from_payload(value, at(millis))
    }

    fn cm(value: f64) -> Reading {
        Reading::Range(Distance::from_cm(value))
    }

    #[test]
    fn starts_with_inactive_zeroed_state() {
        let controller = controller(TimeoutPolicy::SinceLastDrop);
        assert!(!controller.is_active());
        assert_eq!(controller.counter(), &DropCounter::default());
    }

    #[test]
    fn remote_true_starts_session_and_defers_zero_write() {
        let mut controller = controller(TimeoutPolicy::SinceLastDrop);
        let transition = controller.on_remote_flag_observed(flag("true", 500));

        assert_eq!(transition, Some(SessionTransition::Started));
        assert!(controller.is_active());
        assert_eq!(controller.session().started_at, at(500));
        assert_eq!(controller.counter().count, 0);
        assert!(controller.counter().pending_sync);
        assert!(controller.take_requests().is_empty());
        assert_eq!(
            controller.take_deferred_counter_write(),
            Some(WriteRequest::Counter(0))
        );
        assert!(!controller.counter().pending_sync);
        assert_eq!(controller.take_deferred_counter_write(), None);
    }

    #[test]
    fn repeated_true_is_not_a_restart() {
        let mut controller = controller(TimeoutPolicy::SinceLastDrop);
        controller.on_remote_flag_observed(flag("true", 0));
        controller.on_sample(cm(8.0), at(100));

        assert_eq!(controller.on_remote_flag_observed(flag("true", 3_000)), None);
        assert_eq!(controller.counter().count, 1);
        assert_eq!(controller.session().started_at, at(0));
    }

    #[test]
    fn remote_false_stops_and_keeps_counter() {
        let mut controller = controller(TimeoutPolicy::SinceLastDrop);
        controller.on_remote_flag_observed(flag("true", 0));
        controller.on_sample(cm(8.0), at(100));
        controller.take_requests();

        let transition = controller.on_remote_flag_observed(flag("false", 3_000));
        assert_eq!(
            transition,
            Some(SessionTransition::Stopped(StopReason::Remote))
        );
        assert!(!controller.is_active());
        assert_eq!(controller.counter().count, 1);
        assert!(controller.take_requests().is_empty());
    }

    #[test]
    fn restart_resets_counter_to_zero() {
        let mut controller = controller(TimeoutPolicy::SinceLastDrop);
        controller.on_remote_flag_observed(flag("true", 0));
        controller.on_sample(cm(8.0), at(100));
        controller.on_sample(cm(20.0), at(500));
        controller.on_sample(cm(8.0), at(900));
        assert_eq!(controller.counter().count, 2);

        controller.on_remote_flag_observed(flag("false", 3_000));
        controller.on_remote_flag_observed(flag("true", 6_000));

        assert!(controller.is_active());
        assert_eq!(controller.counter().count, 0);
        assert_eq!(controller.detection(), &DetectionState::default());
    }

    #[test]
    fn unrecognized_values_change_nothing() {
        let mut controller = controller(TimeoutPolicy::SinceLastDrop);
        controller.on_remote_flag_observed(flag("true", 0));
        controller.on_sample(cm(8.0), at(100));
        let session = *controller.session();
        let counter = *controller.counter();

        for payload in ["maybe", "1", "0", "null", "TRUE", "42"] {
            assert_eq!(controller.on_remote_flag_observed(flag(payload, 200)), None);
        }
        assert_eq!(controller.session(), &session);
        assert_eq!(controller.counter(), &counter);
    }

    #[test]
    fn drop_requests_counter_write_and_extends_session() {
        let mut controller = controller(TimeoutPolicy::SinceLastDrop);
        controller.on_remote_flag_observed(flag("true", 0));
        controller.on_drop_confirmed(at(4_000));

        assert_eq!(controller.session().last_drop_at, at(4_000));
        assert_eq!(controller.take_requests(), vec![WriteRequest::Counter(1)]);
        assert!(!controller.counter().pending_sync);
        // Covered by the drop write.
        assert_eq!(controller.take_deferred_counter_write(), None);
    }

    #[test]
    fn drop_outside_session_is_ignored() {
        let mut controller = controller(TimeoutPolicy::SinceLastDrop);
        controller.on_drop_confirmed(at(100));
        assert_eq!(controller.on_sample(cm(8.0), at(200)), None);
        assert_eq!(controller.counter().count, 0);
        assert!(controller.take_requests().is_empty());
    }

    #[test]
    fn idle_timeout_fires_once_just_past_limit() {
        let mut controller = controller(TimeoutPolicy::SinceLastDrop);
        controller.on_remote_flag_observed(flag("true", 1_000));

        assert_eq!(controller.tick(at(1_000 + TIMEOUT_MS - 1)), None);
        assert_eq!(controller.tick(at(1_000 + TIMEOUT_MS)), None);
        assert!(controller.is_active());

        assert_eq!(
            controller.tick(at(1_000 + TIMEOUT_MS + 1)),
            Some(SessionTransition::Stopped(StopReason::Timeout))
        );
        assert!(!controller.is_active());
        assert_eq!(controller.tick(at(1_000 + TIMEOUT_MS + 500)), None);
        assert_eq!(
            controller.take_requests(),
            vec![WriteRequest::SessionFlag(false)]
        );
    }

    #[test]
    fn idle_policy_measures_from_last_drop() {
        let mut controller = controller(TimeoutPolicy::SinceLastDrop);
        controller.on_remote_flag_observed(flag("true", 0));
        controller.on_drop_confirmed(at(8_000));

        assert_eq!(controller.tick(at(TIMEOUT_MS + 1)), None);
        assert!(controller.tick(at(8_000 + TIMEOUT_MS + 1)).is_some());
    }

    #[test]
    fn fixed_policy_ignores_drops() {
        let mut controller = controller(TimeoutPolicy::SinceStart);
        controller.on_remote_flag_observed(flag("true", 0));
        controller.on_drop_confirmed(at(8_000));

        assert!(controller.tick(at(TIMEOUT_MS + 1)).is_some());
    }

    #[test]
    fn stale_true_after_timeout_is_ignored_until_remote_false() {
        let mut controller = controller(TimeoutPolicy::SinceLastDrop);
        controller.on_remote_flag_observed(flag("true", 0));
        controller.on_drop_confirmed(at(100));
        controller.tick(at(100 + TIMEOUT_MS + 1));
        assert!(controller.awaiting_remote_stop());

        assert_eq!(controller.on_remote_flag_observed(flag("true", 10_200)), None);
        assert!(!controller.is_active());
        assert_eq!(controller.counter().count, 1);

        assert_eq!(controller.on_remote_flag_observed(flag("false", 13_000)), None);
        assert!(!controller.awaiting_remote_stop());

        assert_eq!(
            controller.on_remote_flag_observed(flag("true", 16_000)),
            Some(SessionTransition::Started)
        );
        assert_eq!(controller.counter().count, 0);
    }

    #[test]
    fn acknowledged_flag_write_releases_latch() {
        let mut controller = controller(TimeoutPolicy::SinceLastDrop);
        controller.on_remote_flag_observed(flag("true", 0));
        controller.tick(at(TIMEOUT_MS + 1));
        assert!(controller.awaiting_remote_stop());

        controller.on_flag_write_acknowledged();
        assert!(!controller.awaiting_remote_stop());
        assert_eq!(
            controller.on_remote_flag_observed(flag("true", 12_000)),
            Some(SessionTransition::Started)
        );
        assert_eq!(controller.counter().count, 0);
    }

    #[test]
    fn failed_flag_write_releases_latch() {
        let mut controller = controller(TimeoutPolicy::SinceLastDrop);
        controller.on_remote_flag_observed(flag("true", 0));
        controller.tick(at(TIMEOUT_MS + 1));
        controller.on_flag_write_failed();

        assert_eq!(
            controller.on_remote_flag_observed(flag("true", 12_000)),
            Some(SessionTransition::Started)
        );
    }

    #[test]
    fn unrecognized_value_does_not_release_latch() {
        let mut controller = controller(TimeoutPolicy::SinceLastDrop);
        controller.on_remote_flag_observed(flag("true", 0));
        controller.tick(at(TIMEOUT_MS + 1));
        controller.on_remote_flag_observed(RemoteFlagObservation::new(
            FlagValue::Unrecognized,
            at(11_000),
        ));
        assert!(controller.awaiting_remote_stop());
    }
}
