//! Remote key-value layout shared by the bin agent and its store adapters.
//!
//! The agent writes the counter path and, on timeout, the session path. The
//! operator backend owns the session path otherwise. Store adapters reuse these
//! types so path layout and value encoding cannot drift between them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

pub const DEFAULT_NAMESPACE: &str = "BinsData";
pub const SESSION_FLAG_KEY: &str = "isSessionStarted";
pub const COUNTER_KEY: &str = "trashUnitsCounter";

/// Both remote paths for one resolved session identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotePaths {
    pub session_flag: String,
    pub counter: String,
}

impl RemotePaths {
    pub fn new(namespace: &str, session_id: &str) -> Self {
        let namespace = namespace.trim_matches('/');
        let session_id = session_id.trim_matches('/');
        let base = format!("/{}/{}", namespace, session_id);
        Self {
            session_flag: format!("{}/{}", base, SESSION_FLAG_KEY),
            counter: format!("{}/{}", base, COUNTER_KEY),
        }
    }
}

/// Tags a remote request so its completion reaches exactly one handler.
///
/// Only `FlagPoll` completions may be read as session-flag observations.
/// Write acknowledgements carry whatever the store echoes back, and that
/// payload must never be mistaken for the remote session intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    FlagPoll,
    FlagWrite,
    CounterWrite,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::FlagPoll => "flag_poll",
            Channel::FlagWrite => "flag_write",
            Channel::CounterWrite => "counter_write",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value the agent writes remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RemoteValue {
    /// Session flag, stored as the string `"true"` or `"false"`.
    Flag(bool),
    /// Drop counter, stored as an integer.
    Count(u32),
}

impl RemoteValue {
    pub fn encode(&self) -> Value {
        match self {
            RemoteValue::Flag(value) => Value::String(flag_str(*value).to_string()),
            RemoteValue::Count(count) => Value::from(*count),
        }
    }
}

impl fmt::Display for RemoteValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteValue::Flag(value) => f.write_str(flag_str(*value)),
            RemoteValue::Count(count) => write!(f, "{}", count),
        }
    }
}

fn flag_str(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

/// Interpretation of a payload read from the session path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagValue {
    True,
    False,
    Unrecognized,
}

impl FlagValue {
    /// Parses a session-path payload.
    ///
    /// Surrounding whitespace and one layer of JSON string quoting are removed,
    /// then only the exact strings `true` and `false` are accepted. Numbers,
    /// `"1"`, mixed case and anything else are `Unrecognized`.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let unquoted = trimmed
            .strip_prefix('"')
            .and_then(|value| value.strip_suffix('"'))
            .unwrap_or(trimmed);
        match unquoted {
            "true" => FlagValue::True,
            "false" => FlagValue::False,
            _ => FlagValue::Unrecognized,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FlagValue::True => Some(true),
            FlagValue::False => Some(false),
            FlagValue::Unrecognized => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    pub code: String,
    pub message: String,
}

impl RemoteError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for RemoteError {}

/// Store-assigned request id. Ids grow in issue order across all channels of one
/// store, so comparing two ids tells which request was issued first.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct RequestId(pub u64);

impl RequestId {
    pub fn next(self) -> RequestId {
        RequestId(self.0.saturating_add(1))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Result of one remote request, delivered on a later transport service call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub request: RequestId,
    pub channel: Channel,
    pub path: String,
    pub result: Result<String, RemoteError>,
}

impl Completion {
    pub fn ok(
        request: RequestId,
        channel: Channel,
        path: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            request,
            channel,
            path: path.into(),
            result: Ok(payload.into()),
        }
    }

    pub fn failed(
        request: RequestId,
        channel: Channel,
        path: impl Into<String>,
        error: RemoteError,
    ) -> Self {
        Self {
            request,
            channel,
            path: path.into(),
            result: Err(error),
        }
    }
}
