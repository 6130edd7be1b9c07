use bin_remote_protocol::{Channel, Completion, FlagValue, RemotePaths, RequestId};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{IdentityProvider, RemoteStore};
use crate::session::{SessionController, WriteRequest};
use crate::types::{RemoteFlagObservation, SessionTransition, Timestamp};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    pub polls_issued: u64,
    pub writes_issued: u64,
    pub writes_skipped: u64,
    pub completions: u64,
    pub failures: u64,
    pub ignored_observations: u64,
}

/// Issues polls and writes, and routes completions back by channel.
///
/// The last session flag write acts as a fence: polls issued before it read a
/// value the write has since replaced, so their completions are discarded.
#[derive(Debug, Clone)]
pub struct RemoteSync {
    namespace: String,
    poll_interval: Duration,
    paths: Option<RemotePaths>,
    last_poll: Option<Timestamp>,
    flag_fence: Option<RequestId>,
    stats: SyncStats,
}

impl RemoteSync {
    pub fn new(namespace: impl Into<String>, poll_interval: Duration) -> Self {
        Self {
            namespace: namespace.into(),
            poll_interval,
            paths: None,
            last_poll: None,
            flag_fence: None,
            stats: SyncStats::default(),
        }
    }

    pub fn paths(&self) -> Option<&RemotePaths> {
        self.paths.as_ref()
    }

    pub fn stats(&self) -> SyncStats {
        self.stats
    }

    /// Resolves remote paths once. Returns whether they are available.
    pub fn resolve(&mut self, identity: &mut impl IdentityProvider) -> bool {
        if self.paths.is_some() {
            return true;
        }
        let Some(id) = identity.poll_ready() else {
            return false;
        };
        let id = id.trim();
        if id.is_empty() {
            warn!("Identity resolved to an empty id; remote sync stays disabled");
            return false;
        }

        let paths = RemotePaths::new(&self.namespace, id);
        info!(
            session_flag = %paths.session_flag,
            counter = %paths.counter,
            "Remote paths resolved"
        );
        self.paths = Some(paths);
        true
    }

    pub fn poll_due(&self, now: Timestamp) -> bool {
        if self.paths.is_none() {
            return false;
        }
        self.last_poll
            .map(|last| now.saturating_since(last) >= self.poll_interval)
            .unwrap_or(true)
    }

    pub fn poll(&mut self, store: &mut impl RemoteStore, now: Timestamp) {
        let Some(paths) = self.paths.as_ref() else {
            return;
        };
        store.get(&paths.session_flag, Channel::FlagPoll);
        self.last_poll = Some(now);
        self.stats.polls_issued += 1;
        debug!(path = %paths.session_flag, "Session flag poll issued");
    }

    /// Issues a fire-and-forget write. Skipped, not queued, before identity resolves.
    pub fn write(&mut self, store: &mut impl RemoteStore, request: WriteRequest) -> bool {
        let Some(paths) = self.paths.as_ref() else {
            self.stats.writes_skipped += 1;
            debug!(request = ?request, "Remote write skipped; identity unresolved");
            return false;
        };
        let path = match request {
            WriteRequest::Counter(_) => &paths.counter,
            WriteRequest::SessionFlag(_) => &paths.session_flag,
        };
        let id = store.set(path, request.value(), request.channel());
        if let WriteRequest::SessionFlag(_) = request {
            self.flag_fence = Some(id);
        }
        self.stats.writes_issued += 1;
        debug!(path = %path, value = %request.value(), "Remote write issued");
        true
    }

    pub fn dispatch(
        &mut self,
        completion: Completion,
        controller: &mut SessionController,
        now: Timestamp,
    ) -> Option<SessionTransition> {
        self.stats.completions += 1;
        if completion.result.is_err() {
            self.stats.failures += 1;
        }

        match completion.channel {
            Channel::FlagPoll => self.on_flag_poll(completion, controller, now),
            Channel::FlagWrite => {
                self.on_flag_write(completion, controller);
                None
            }
            Channel::CounterWrite => {
                noop(completion);
                None
            }
        }
    }

    fn on_flag_poll(
        &mut self,
        completion: Completion,
        controller: &mut SessionController,
        now: Timestamp,
    ) -> Option<SessionTransition> {
        let expected = self.paths.as_ref().map(|paths| paths.session_flag.as_str());
        if expected != Some(completion.path.as_str()) {
            warn!(path = %completion.path, "Flag poll completed for an unexpected path");
            self.stats.ignored_observations += 1;
            return None;
        }

        if self.flag_fence.is_some_and(|fence| completion.request < fence) {
            debug!(
                request = %completion.request,
                "Discarding session flag read issued before the last flag write"
            );
            self.stats.ignored_observations += 1;
            return None;
        }

        match completion.result {
            Ok(payload) => {
                debug!(path = %completion.path, value = %payload.trim(), "Session flag read");
                let observation = RemoteFlagObservation::from_payload(&payload, now);
                if observation.value == FlagValue::Unrecognized {
                    self.stats.ignored_observations += 1;
                }
                controller.on_remote_flag_observed(observation)
            }
            Err(err) => {
                warn!(path = %completion.path, error = %err, "Session flag poll failed");
                None
            }
        }
    }

    /// Flag write acknowledgements never carry session intent.
    fn on_flag_write(&mut self, completion: Completion, controller: &mut SessionController) {
        match completion.result {
            Ok(_) => {
                debug!(path = %completion.path, "Session flag write acknowledged");
                controller.on_flag_write_acknowledged();
            }
            Err(err) => {
                warn!(path = %completion.path, error = %err, "Session flag write failed");
                // The old remote value still stands; earlier reads are current again.
                if self.flag_fence == Some(completion.request) {
                    self.flag_fence = None;
                }
                controller.on_flag_write_failed();
            }
        }
    }
}

fn noop(completion: Completion) {
    if let Err(err) = completion.result {
        warn!(
            channel = %completion.channel,
            path = %completion.path,
            error = %err,
            "Remote write failed"
        );
    }
}
