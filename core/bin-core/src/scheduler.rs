//! Fixed-period driver for [`Agent::tick`].
//!
//! Sleeps out the remainder of each period. A tick that overruns its budget
//! (usually a slow echo) counts as a deadline miss and the next tick starts
//! immediately; there is no catch-up.

use serde::Serialize;
use std::time::{Duration, Instant};

use crate::agent::{Agent, TickReport};
use crate::clock::Clock;
use crate::remote::{IdentityProvider, RemoteStore};
use crate::sampler::DistanceSampler;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    pub total_ticks: u64,
    pub deadline_misses: u64,
    pub worst_case_us: u64,
}

pub struct Scheduler<S, R, I, C> {
    agent: Agent<S, R, I, C>,
    period: Duration,
    deadline_misses: u64,
    worst_case: Duration,
    total_ticks: u64,
}

impl<S, R, I, C> Scheduler<S, R, I, C>
where
    S: DistanceSampler,
    R: RemoteStore,
    I: IdentityProvider,
    C: Clock,
{
    pub fn new(agent: Agent<S, R, I, C>, period: Duration) -> Self {
        Self {
            agent,
            period,
            deadline_misses: 0,
            worst_case: Duration::ZERO,
            total_ticks: 0,
        }
    }

    pub fn agent(&self) -> &Agent<S, R, I, C> {
        &self.agent
    }

    pub fn into_agent(self) -> Agent<S, R, I, C> {
        self.agent
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            total_ticks: self.total_ticks,
            deadline_misses: self.deadline_misses,
            worst_case_us: micros(self.worst_case),
        }
    }

    pub fn tick(&mut self) -> TickReport {
        let start = Instant::now();

        let report = self.agent.tick();

        let elapsed = start.elapsed();
        if elapsed > self.period {
            self.deadline_misses += 1;
            tracing::debug!(
                elapsed_us = micros(elapsed),
                budget_us = micros(self.period),
                "Tick overran its period"
            );
        }
        if elapsed > self.worst_case {
            self.worst_case = elapsed;
        }
        self.total_ticks += 1;

        report
    }

    /// Runs until `max_ticks` ticks have completed, or forever when `None`.
    pub fn run(&mut self, max_ticks: Option<u64>) {
        loop {
            if max_ticks.is_some_and(|max| self.total_ticks >= max) {
                break;
            }

            let cycle_start = Instant::now();
            self.tick();
            let elapsed = cycle_start.elapsed();

            if elapsed < self.period {
                std::thread::sleep(self.period - elapsed);
            }
        }

        let stats = self.stats();
        tracing::info!(
            ticks = stats.total_ticks,
            deadline_misses = stats.deadline_misses,
            worst_case_us = stats.worst_case_us,
            "Scheduler stopped"
        );
    }
}

fn micros(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}
