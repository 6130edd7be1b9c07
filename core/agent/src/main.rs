//! bin-agent: smart bin monitoring agent.
//!
//! Polls the remote session flag, counts drops through the distance sensor while
//! a session is active, and mirrors the counter back to the remote store.
//!
//! ## Subcommands
//!
//! - `run`: start the tick loop (forever, or for `--max-ticks` ticks)
//! - `config`: print the effective configuration as JSON
//!
//! Without hardware, the sensor is a replayed sample script and the remote store
//! is a JSON file that an operator can edit to start and stop sessions.

mod logging;

use bin_core::{
    load_config, Agent, AgentError, FileStore, MonotonicClock, ReplaySampler, Scheduler,
    StaticIdentity,
};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info, warn};

const DEFAULT_SESSION_ID: &str = "local-bin";
const DEFAULT_STORE_RELATIVE_PATH: &str = ".bin-agent/remote.json";

#[derive(Parser)]
#[command(name = "bin-agent")]
#[command(about = "Smart bin session tracker and drop counter")]
#[command(version)]
struct Cli {
    /// Also write logs to a daily rolling file in this directory
    #[arg(long, global = true, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the agent loop
    Run(RunArgs),

    /// Print the effective configuration
    Config {
        /// Config file (defaults to ~/.bin-agent/agent.toml)
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Config file (defaults to ~/.bin-agent/agent.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// JSON file acting as the remote store (defaults to ~/.bin-agent/remote.json)
    #[arg(long, value_name = "PATH")]
    store: Option<PathBuf>,

    /// Sample script replayed as sensor readings, one distance in cm per line
    #[arg(long, value_name = "PATH")]
    samples: Option<PathBuf>,

    /// Session identifier used to build the remote paths
    #[arg(long, default_value = DEFAULT_SESSION_ID)]
    session_id: String,

    /// Stop after this many ticks and print a JSON snapshot
    #[arg(long, value_name = "N")]
    max_ticks: Option<u64>,
}

fn main() {
    let cli = Cli::parse();
    let _logging_guard = logging::init(cli.log_dir.as_deref());

    let result = match cli.command {
        Commands::Run(args) => run(args),
        Commands::Config { config } => print_config(config),
    };

    if let Err(err) = result {
        error!(error = %err, "bin-agent failed");
        std::process::exit(1);
    }
}

fn run(args: RunArgs) -> Result<(), AgentError> {
    let config = load_config(args.config)?;
    let store_path = match args.store {
        Some(path) => path,
        None => default_store_path()?,
    };
    let sampler = match args.samples.as_deref() {
        Some(path) => ReplaySampler::from_file(path)?,
        None => {
            warn!("No sample script given; the sensor will read as clear");
            ReplaySampler::default()
        }
    };

    info!(
        store = %store_path.display(),
        session_id = %args.session_id,
        namespace = %config.remote.namespace,
        poll_interval_ms = config.remote.poll_interval_ms,
        sample_interval_ms = config.sensor.sample_interval_ms,
        wall_distance_cm = config.sensor.wall_distance_cm,
        debounce_ms = config.detector.debounce_ms,
        timeout_ms = config.session.timeout_ms,
        timeout_policy = ?config.session.timeout_policy,
        "Bin agent started"
    );

    let agent = Agent::new(
        &config,
        sampler,
        FileStore::new(store_path),
        StaticIdentity::new(args.session_id),
        MonotonicClock::new(),
    );
    let mut scheduler = Scheduler::new(agent, config.tick_period());
    scheduler.run(args.max_ticks);

    let report = serde_json::json!({
        "agent": scheduler.agent().snapshot(),
        "scheduler": scheduler.stats(),
    });
    let rendered = serde_json::to_string_pretty(&report)
        .map_err(|err| AgentError::json("serializing snapshot", err))?;
    println!("{}", rendered);
    Ok(())
}

fn print_config(path: Option<PathBuf>) -> Result<(), AgentError> {
    let config = load_config(path)?;
    let rendered = serde_json::to_string_pretty(&config)
        .map_err(|err| AgentError::json("serializing config", err))?;
    println!("{}", rendered);
    Ok(())
}

fn default_store_path() -> Result<PathBuf, AgentError> {
    let home = dirs::home_dir().ok_or(AgentError::HomeDirNotFound)?;
    Ok(home.join(DEFAULT_STORE_RELATIVE_PATH))
}
