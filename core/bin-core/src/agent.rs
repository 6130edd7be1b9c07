//! One cooperative tick of the bin agent.
//!
//! Each tick runs, in order:
//!
//! 1. service transport I/O and route completions;
//! 2. resolve identity, then poll the session flag when the interval elapsed;
//! 3. while a session is active and the sample interval elapsed, take one reading;
//!    then evaluate the session timeout;
//! 4. flush requested writes, then the deferred post-start counter write.
//!
//! Every step is local: a failure in one is logged and never aborts the others.

use bin_remote_protocol::RemotePaths;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

use crate::clock::Clock;
use crate::config::AgentConfig;
use crate::indicator::{LogIndicator, SessionIndicator};
use crate::remote::{IdentityProvider, RemoteStore, RemoteSync, SyncStats};
use crate::sampler::DistanceSampler;
use crate::session::SessionController;
use crate::types::{
    DetectionState, DropConfirmed, DropCounter, Reading, SessionState, SessionTransition,
    Timestamp,
};

/// What happened during one tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub transitions: Vec<SessionTransition>,
    pub reading: Option<Reading>,
    pub drop: Option<DropConfirmed>,
    pub polled: bool,
    pub writes: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentSnapshot {
    pub captured_at: DateTime<Utc>,
    pub uptime_ms: u64,
    pub ticks: u64,
    pub session: SessionState,
    pub counter: DropCounter,
    pub detection: DetectionState,
    pub awaiting_remote_stop: bool,
    pub paths: Option<RemotePaths>,
    pub sync: SyncStats,
}

pub struct Agent<S, R, I, C> {
    controller: SessionController,
    sync: RemoteSync,
    sampler: S,
    store: R,
    identity: I,
    clock: C,
    indicator: Box<dyn SessionIndicator>,
    sample_interval: Duration,
    last_sample: Option<Timestamp>,
    ticks: u64,
}

impl<S, R, I, C> Agent<S, R, I, C>
where
    S: DistanceSampler,
    R: RemoteStore,
    I: IdentityProvider,
    C: Clock,
{
    pub fn new(config: &AgentConfig, sampler: S, store: R, identity: I, clock: C) -> Self {
        let mut indicator: Box<dyn SessionIndicator> = Box::new(LogIndicator::default());
        indicator.show(false);
        Self {
            controller: SessionController::from_config(config),
            sync: RemoteSync::new(config.remote.namespace.clone(), config.poll_interval()),
            sampler,
            store,
            identity,
            clock,
            indicator,
            sample_interval: config.sample_interval(),
            last_sample: None,
            ticks: 0,
        }
    }

    pub fn with_indicator(mut self, indicator: impl SessionIndicator + 'static) -> Self {
        self.indicator = Box::new(indicator);
        self.indicator.show(self.controller.is_active());
        self
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    pub fn sync(&self) -> &RemoteSync {
        &self.sync
    }

    pub fn store(&self) -> &R {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut R {
        &mut self.store
    }

    pub fn sampler(&self) -> &S {
        &self.sampler
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();
        let now = self.clock.now();
        self.ticks += 1;

        for completion in self.store.service() {
            if let Some(transition) = self.sync.dispatch(completion, &mut self.controller, now) {
                self.apply(transition, &mut report);
            }
        }

        if self.sync.resolve(&mut self.identity) && self.sync.poll_due(now) {
            self.sync.poll(&mut self.store, now);
            report.polled = true;
        }

        if self.controller.is_active() && self.sample_due(now) {
            self.last_sample = Some(now);
            let reading = self.sampler.sample();
            let sampled_at = self.clock.now();
            tracing::debug!(reading = ?reading, at_ms = sampled_at.as_millis(), "Sampled");
            report.reading = Some(reading);
            report.drop = self.controller.on_sample(reading, sampled_at);
        }

        if let Some(transition) = self.controller.tick(self.clock.now()) {
            self.apply(transition, &mut report);
        }

        for request in self.controller.take_requests() {
            if self.sync.write(&mut self.store, request) {
                report.writes += 1;
            }
        }
        if let Some(request) = self.controller.take_deferred_counter_write() {
            if self.sync.write(&mut self.store, request) {
                report.writes += 1;
            }
        }

        report
    }

    pub fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            captured_at: Utc::now(),
            uptime_ms: self.clock.now().as_millis(),
            ticks: self.ticks,
            session: *self.controller.session(),
            counter: *self.controller.counter(),
            detection: *self.controller.detection(),
            awaiting_remote_stop: self.controller.awaiting_remote_stop(),
            paths: self.sync.paths().cloned(),
            sync: self.sync.stats(),
        }
    }

    fn sample_due(&self, now: Timestamp) -> bool {
        self.last_sample
            .map(|last| now.saturating_since(last) >= self.sample_interval)
            .unwrap_or(true)
    }

    fn apply(&mut self, transition: SessionTransition, report: &mut TickReport) {
        self.indicator.show(self.controller.is_active());
        report.transitions.push(transition);
    }
}
