//! Remote key-value store boundary.
//!
//! Requests are fire-and-forget: `get`/`set` only enqueue, and results come back
//! as tagged [`Completion`]s from a later [`RemoteStore::service`] call, possibly
//! several ticks later or never. [`RemoteSync`] decides when to issue requests
//! and routes each completion to the single handler its [`Channel`] names.
//!
//! # Module Structure
//!
//! - [`sync`]: poll scheduling, identity gating, completion routing
//! - [`file_store`]: JSON-file store used by the agent binary
//! - [`memory`]: in-process store with latency and failure controls

pub mod file_store;
pub mod memory;
mod sync;

use bin_remote_protocol::{Channel, Completion, RemoteValue, RequestId};
use serde_json::Value;
use std::collections::VecDeque;

pub use file_store::FileStore;
pub use memory::MemoryStore;
pub use sync::{RemoteSync, SyncStats};

pub trait RemoteStore {
    /// Queues a read. The returned id comes back on the matching completion.
    fn get(&mut self, path: &str, channel: Channel) -> RequestId;
    fn set(&mut self, path: &str, value: RemoteValue, channel: Channel) -> RequestId;
    /// Runs pending transport work and returns whatever finished.
    fn service(&mut self) -> Vec<Completion>;
}

/// Source of the session identifier used to build remote paths.
pub trait IdentityProvider {
    /// `None` until the identity is ready.
    fn poll_ready(&mut self) -> Option<String>;
}

/// Identity known up front, optionally reported ready only after some polls.
#[derive(Debug, Clone)]
pub struct StaticIdentity {
    id: String,
    polls_until_ready: u32,
}

impl StaticIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self::after_polls(id, 0)
    }

    pub fn after_polls(id: impl Into<String>, polls: u32) -> Self {
        Self {
            id: id.into(),
            polls_until_ready: polls,
        }
    }
}

impl IdentityProvider for StaticIdentity {
    fn poll_ready(&mut self) -> Option<String> {
        if self.polls_until_ready > 0 {
            self.polls_until_ready -= 1;
            return None;
        }
        Some(self.id.clone())
    }
}

/// A request queued inside a store until its next `service` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingRequest {
    Get {
        path: String,
        channel: Channel,
    },
    Set {
        path: String,
        value: RemoteValue,
        channel: Channel,
    },
}

impl PendingRequest {
    pub fn channel(&self) -> Channel {
        match self {
            PendingRequest::Get { channel, .. } | PendingRequest::Set { channel, .. } => *channel,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            PendingRequest::Get { path, .. } | PendingRequest::Set { path, .. } => path,
        }
    }
}

/// Hands out request ids in issue order.
#[derive(Debug, Default)]
pub(crate) struct RequestQueue {
    next_id: RequestId,
    pending: VecDeque<(RequestId, PendingRequest)>,
}

impl RequestQueue {
    pub(crate) fn push(&mut self, request: PendingRequest) -> RequestId {
        let id = self.next_id;
        self.next_id = id.next();
        self.pending.push_back((id, request));
        id
    }

    pub(crate) fn drain(&mut self) -> Vec<(RequestId, PendingRequest)> {
        self.pending.drain(..).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn clear(&mut self) {
        self.pending.clear();
    }
}

/// Renders a stored value the way a read returns it: strings unquoted,
/// everything else as JSON, and a missing key as `null`.
pub(crate) fn payload_for(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
        None => Value::Null.to_string(),
    }
}
