//! # bin-core
//!
//! Session and drop-detection logic for the smart bin agent.
//!
//! ## Design Principles
//!
//! - **Single-threaded**: one owner mutates all state from the tick loop. Callers
//!   that move ticks and completions onto different threads must add their own
//!   `Mutex` around the [`Agent`].
//! - **Local state is authoritative** between polls. Remote writes are
//!   fire-and-forget and never roll anything back.
//! - **Nothing is fatal inside a tick**: transport errors, garbage remote values
//!   and sensor timeouts are logged or treated as "clear", never propagated.
//! - **Narrow seams**: the sensor, the remote store, identity, the clock and the
//!   indicator are traits so the core runs the same against hardware or fakes.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use bin_core::{load_config, Agent, FileStore, MonotonicClock, ReplaySampler, Scheduler, StaticIdentity};
//!
//! let config = load_config(None)?;
//! let agent = Agent::new(&config, ReplaySampler::default(), FileStore::new("remote.json"),
//!     StaticIdentity::new("bin-1"), MonotonicClock::new());
//! Scheduler::new(agent, config.tick_period()).run(None);
//! ```

pub mod agent;
pub mod clock;
pub mod config;
pub mod detector;
pub mod error;
pub mod indicator;
pub mod remote;
pub mod sampler;
pub mod scheduler;
pub mod session;
pub mod types;

pub use agent::{Agent, AgentSnapshot, TickReport};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{load_config, AgentConfig, TimeoutPolicy};
pub use detector::DropDetector;
pub use error::{AgentError, Result};
pub use indicator::{LogIndicator, SessionIndicator};
pub use remote::{
    FileStore, IdentityProvider, MemoryStore, RemoteStore, RemoteSync, StaticIdentity, SyncStats,
};
pub use sampler::{DistanceSampler, EchoPulse, EchoSampler, ReplaySampler};
pub use scheduler::{Scheduler, SchedulerStats};
pub use session::{SessionController, WriteRequest};
pub use types::*;
