//! Clap derive structures for the `rfidmon` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// rfidmon -- watch and control an RFID access/alarm sensor
#[derive(Debug, Parser)]
#[command(
    name = "rfidmon",
    version,
    about = "Watch and control an RFID access/alarm sensor",
    long_about = "Realtime client for an RFID access/alarm sensor.\n\n\
        Connects to the sensor's WebSocket endpoint, follows its state\n\
        (SENSING, COUNTDOWN, ALARM, AUTHORIZED), keeps a transition history,\n\
        and can remotely deactivate a running alarm.",
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
    /// Sensor profile to use
    #[arg(long, short = 'p', env = "RFIDMON_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Sensor IP address or host name (overrides profile)
    #[arg(long, short = 'd', env = "RFIDMON_DEVICE", global = true)]
    pub device: Option<String>,

    /// Sensor WebSocket port (overrides profile)
    #[arg(long, env = "RFIDMON_PORT", global = true)]
    pub port: Option<u16>,

    /// Delay before reconnecting, in milliseconds (overrides profile)
    #[arg(long, env = "RFIDMON_RECONNECT_INTERVAL_MS", global = true)]
    pub reconnect_interval_ms: Option<u64>,

    /// Config file to use instead of the platform default
    #[arg(long, env = "RFIDMON_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "RFIDMON_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Follow the sensor live: events, state changes, connection status
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Wait for the first event and print the sensor's current state
    #[command(alias = "st")]
    Status(StatusArgs),

    /// Tell the sensor to deactivate a running alarm
    #[command(alias = "off")]
    Deactivate(DeactivateArgs),

    /// Play the built-in demo script without any hardware
    Demo(DemoArgs),

    /// Manage the configuration file
    #[command(alias = "cfg")]
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  WATCH / STATUS / DEACTIVATE
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Stop after this many seconds (default: until Ctrl-C)
    #[arg(long)]
    pub duration: Option<u64>,

    /// Skip the history and totals summary on exit
    #[arg(long)]
    pub no_summary: bool,
}

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Seconds to wait for the sensor (default: config `defaults.timeout`)
    #[arg(long, short = 't')]
    pub timeout: Option<u64>,
}

#[derive(Debug, Args)]
pub struct DeactivateArgs {
    /// Seconds to wait for the connection (default: config `defaults.timeout`)
    #[arg(long, short = 't')]
    pub timeout: Option<u64>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  DEMO
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct DemoArgs {
    /// Stop after this many seconds (default: until Ctrl-C)
    #[arg(long)]
    pub duration: Option<u64>,

    /// Issue a simulated deactivate after this many seconds
    #[arg(long)]
    pub deactivate_after: Option<u64>,

    /// Skip the history and totals summary on exit
    #[arg(long)]
    pub no_summary: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Write a config file with a single profile
    Init {
        /// Profile name
        #[arg(long, default_value = "default")]
        name: String,

        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Display the resolved configuration
    Show,

    /// Print the config file path
    Path,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
