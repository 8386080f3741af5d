//! Lifeline simulator binary.
//!
//! Plays a scripted platform lifecycle against the bridge with fake windows
//! and a small animating application.
//!
//! # Usage
//!
//! ```bash
//! # Full lifecycle with default channel sizes
//! lifeline-sim --scenario lifecycle
//!
//! # Save and restore across two instances, verbose
//! lifeline-sim --scenario restart --log-level debug
//! ```

#![forbid(unsafe_code)]

mod demo;
mod error;
mod scenario;

use std::time::Duration;

use clap::Parser;
use lifeline_core::{
    BridgeConfig, DEFAULT_COMMAND_CAPACITY, DEFAULT_HANDOFF_TIMEOUT, DEFAULT_POLL_TIMEOUT,
    DEFAULT_TIMER_CAPACITY,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::scenario::{RunSettings, Scenario};

/// Lifeline activity simulator
#[derive(Parser, Debug)]
#[command(name = "lifeline-sim")]
#[command(about = "Drive the lifeline bridge through a scripted platform lifecycle")]
#[command(version)]
struct Args {
    /// Script to play
    #[arg(short, long, value_enum, default_value_t = Scenario::Lifecycle)]
    scenario: Scenario,

    /// Command channel capacity
    #[arg(long, default_value_t = DEFAULT_COMMAND_CAPACITY)]
    command_capacity: usize,

    /// Timer channel capacity
    #[arg(long, default_value_t = DEFAULT_TIMER_CAPACITY)]
    timer_capacity: usize,

    /// Longest a platform callback waits for the application, in milliseconds
    #[arg(long, default_value_t = DEFAULT_HANDOFF_TIMEOUT.as_millis() as u64)]
    handoff_timeout_ms: u64,

    /// Poll wait before an idle cycle in milliseconds; 0 waits indefinitely
    #[arg(long, default_value_t = DEFAULT_POLL_TIMEOUT.as_millis() as u64)]
    poll_timeout_ms: u64,

    /// Demo animation tick in milliseconds
    #[arg(long, default_value = "16")]
    tick_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn settings(&self) -> RunSettings {
        let poll_timeout =
            (self.poll_timeout_ms > 0).then(|| Duration::from_millis(self.poll_timeout_ms));
        RunSettings {
            config: BridgeConfig {
                command_capacity: self.command_capacity,
                timer_capacity: self.timer_capacity,
                handoff_timeout: Duration::from_millis(self.handoff_timeout_ms),
                poll_timeout,
            },
            tick: Duration::from_millis(self.tick_ms.max(1)),
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Lifeline simulator starting");

    let summary = scenario::run(args.scenario, &args.settings())?;

    tracing::info!(
        scenario = ?args.scenario,
        instances = summary.instances,
        frames = summary.frames,
        saved_states = summary.saved_states.len(),
        "done"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_map_onto_the_bridge_defaults() {
        let args = Args::parse_from(["lifeline-sim"]);
        assert_eq!(args.scenario, Scenario::Lifecycle);
        assert_eq!(args.settings().config, BridgeConfig::default());
    }

    #[test]
    fn zero_poll_timeout_waits_indefinitely() {
        let args = Args::parse_from([
            "lifeline-sim",
            "--scenario",
            "restart",
            "--poll-timeout-ms",
            "0",
            "--handoff-timeout-ms",
            "250",
        ]);
        let settings = args.settings();
        assert_eq!(args.scenario, Scenario::Restart);
        assert_eq!(settings.config.poll_timeout, None);
        assert_eq!(settings.config.handoff_timeout, Duration::from_millis(250));
    }
}
