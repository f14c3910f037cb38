//! Clap derive structures for the `aquadata` binary.

use std::path::PathBuf;

use aquadata_core::OperationMode;
use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// aquadata -- water-quality telemetry agent
#[derive(Debug, Parser)]
#[command(
    name = "aquadata",
    version,
    about = "Water-quality telemetry agent",
    long_about = "Reads pH, dissolved oxygen and temperature on a fixed cycle and\n\
        delivers each snapshot to an MQTT broker and to peers on the local\n\
        peripheral bridge. Peers can reconfigure WiFi, switch the operation\n\
        mode and restart the agent with JSON commands.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, short = 'c', env = "AQUADATA_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Operation mode at start: hybrid, ble_only or mqtt_only
    #[arg(long, short = 'm', global = true)]
    pub mode: Option<OperationMode>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log output format
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per event
    Json,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the agent until interrupted
    Run,

    /// Print telemetry lines from the simulated sensor, no transports
    #[command(alias = "sim")]
    Simulate(SimulateArgs),

    /// Inspect the configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct SimulateArgs {
    /// Number of cycles to print
    #[arg(
        long,
        short = 'n',
        default_value_t = 10,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub cycles: u64,

    /// RNG seed (overrides simulation.seed)
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the resolved configuration with passwords masked
    Show,

    /// Print the config file path
    Path,

    /// Load and validate the configuration
    Check,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
