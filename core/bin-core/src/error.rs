//! Error types for bin-core operations.
//!
//! Nothing here crosses the tick boundary: the agent loop logs and continues.
//! These errors surface from startup paths (config, sample scripts) and from the
//! file-backed store, where the store turns them into remote completions.

use std::path::PathBuf;

/// All errors that can occur in bin-core operations.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    #[error("Home directory not found")]
    HomeDirNotFound,

    // ─────────────────────────────────────────────────────────────────────
    // Sample Script Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Invalid sample at {path}:{line}: {value:?}")]
    InvalidSample {
        path: PathBuf,
        line: usize,
        value: String,
    },

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON parsing error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

impl AgentError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        AgentError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        AgentError::Json {
            context: context.into(),
            source,
        }
    }

    /// Short machine-readable code, used when an error becomes a remote completion.
    pub fn code(&self) -> &'static str {
        match self {
            AgentError::ConfigMalformed { .. } | AgentError::InvalidConfig { .. } => "config",
            AgentError::HomeDirNotFound => "home_dir",
            AgentError::InvalidSample { .. } => "invalid_sample",
            AgentError::Io { .. } => "io_error",
            AgentError::Json { .. } => "invalid_json",
        }
    }
}

/// Convenience type alias for Results using AgentError.
pub type Result<T> = std::result::Result<T, AgentError>;
