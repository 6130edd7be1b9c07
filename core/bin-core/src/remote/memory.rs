//! In-process store for tests and dry runs.
//!
//! Completions are produced on the `service` call after the request, like a real
//! transport. `hold` delays them further and `lose_in_flight` drops them, which
//! covers acks that arrive ticks later or never.

use bin_remote_protocol::{Channel, Completion, RemoteError, RemoteValue, RequestId};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

use super::{payload_for, PendingRequest, RemoteStore, RequestQueue};

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: BTreeMap<String, Value>,
    pending: RequestQueue,
    issued: Vec<PendingRequest>,
    failing: HashSet<Channel>,
    held: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, path: &str, value: impl Into<Value>) -> Self {
        self.insert(path, value);
        self
    }

    /// Sets a value directly, as another writer of the store would.
    pub fn insert(&mut self, path: &str, value: impl Into<Value>) {
        self.values.insert(path.to_string(), value.into());
    }

    pub fn value(&self, path: &str) -> Option<&Value> {
        self.values.get(path)
    }

    /// Every request ever issued, in order.
    pub fn issued(&self) -> &[PendingRequest] {
        &self.issued
    }

    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    pub fn fail_channel(&mut self, channel: Channel) {
        self.failing.insert(channel);
    }

    pub fn heal_channel(&mut self, channel: Channel) {
        self.failing.remove(&channel);
    }

    pub fn hold(&mut self) {
        self.held = true;
    }

    pub fn release(&mut self) {
        self.held = false;
    }

    /// Drops everything in flight without completing it.
    pub fn lose_in_flight(&mut self) -> usize {
        let lost = self.pending.len();
        self.pending.clear();
        lost
    }

    fn complete(&mut self, id: RequestId, request: PendingRequest) -> Completion {
        let channel = request.channel();
        if self.failing.contains(&channel) {
            return Completion::failed(
                id,
                channel,
                request.path(),
                RemoteError::new("unavailable", "simulated transport failure"),
            );
        }

        match request {
            PendingRequest::Get { path, channel } => {
                let payload = payload_for(self.values.get(&path));
                Completion::ok(id, channel, path, payload)
            }
            PendingRequest::Set {
                path,
                value,
                channel,
            } => {
                self.values.insert(path.clone(), value.encode());
                Completion::ok(id, channel, path, value.to_string())
            }
        }
    }

    fn enqueue(&mut self, request: PendingRequest) -> RequestId {
        self.issued.push(request.clone());
        self.pending.push(request)
    }
}

impl RemoteStore for MemoryStore {
    fn get(&mut self, path: &str, channel: Channel) -> RequestId {
        self.enqueue(PendingRequest::Get {
            path: path.to_string(),
            channel,
        })
    }

    fn set(&mut self, path: &str, value: RemoteValue, channel: Channel) -> RequestId {
        self.enqueue(PendingRequest::Set {
            path: path.to_string(),
            value,
            channel,
        })
    }

    fn service(&mut self) -> Vec<Completion> {
        if self.held {
            return Vec::new();
        }
        self.pending
            .drain()
            .into_iter()
            .map(|(id, request)| self.complete(id, request))
            .collect()
    }
}
