//! Clap derive structures for the `poolside` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// poolside -- OmniLogic pool control from the command line
#[derive(Debug, Parser)]
#[command(
    name = "poolside",
    version,
    about = "Inspect and control Hayward OmniLogic pool equipment",
    long_about = "Connects to the OmniLogic cloud service, derives the set of\n\
        controllable equipment from live telemetry, and lets you read values\n\
        and send commands from the command line.",
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
    /// Config file path (default: platform config dir)
    #[arg(long, env = "POOLSIDE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "POOLSIDE_OUTPUT",
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

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one unique id per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
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
    /// List derived equipment entities and their current values
    #[command(alias = "ls", alias = "e")]
    Entities(EntitiesArgs),

    /// Poll on the configured interval and print value changes
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Send an equipment command
    Set(SetArgs),
}

// ── entities ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct EntitiesArgs {
    /// Only show entities of this category (e.g. "pump", "alarm")
    #[arg(long, short = 'c')]
    pub category: Option<String>,

    /// Include unavailable entities
    #[arg(long)]
    pub all: bool,
}

// ── watch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Stop after this many polls (0 = run until interrupted)
    #[arg(long, short = 'n', default_value = "0")]
    pub count: u64,
}

// ── set ──────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SetArgs {
    #[command(subcommand)]
    pub command: SetCommand,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OnOff {
    On,
    Off,
}

impl OnOff {
    pub fn is_on(self) -> bool {
        matches!(self, Self::On)
    }
}

#[derive(Debug, Subcommand)]
pub enum SetCommand {
    /// Switch a relay, valve, or pump circuit on or off
    Switch {
        /// Entity unique id (see `poolside entities`)
        unique_id: String,
        state: OnOff,
    },

    /// Set a variable or dual-speed pump's speed percentage
    Speed {
        /// Entity unique id of the pump switch
        unique_id: String,
        percent: u32,
    },

    /// Control a heater: set point and enable state
    Heater {
        /// Entity unique id of the heater
        unique_id: String,

        /// Target temperature (controller-native unit)
        #[arg(long, short = 't')]
        temperature: Option<f64>,

        /// Enable or disable heating
        #[arg(long)]
        state: Option<OnOff>,
    },

    /// Control a color light: power, show, speed, brightness
    Light {
        /// Entity unique id of the light
        unique_id: String,

        /// Switch the light on or off
        state: Option<OnOff>,

        /// Select a show by name (e.g. "deep_blue_sea")
        #[arg(long, short = 'e')]
        effect: Option<String>,

        /// Show speed, 0..=8 (V2 lights)
        #[arg(long)]
        speed: Option<u8>,

        /// Show brightness, 0..=4 (V2 lights)
        #[arg(long)]
        brightness: Option<u8>,
    },

    /// Control a chlorinator: enable state and timed output percentage
    Chlorinator {
        /// Entity unique id of the chlorinator switch
        unique_id: String,

        /// Enable or disable chlorination
        state: Option<OnOff>,

        /// Timed output percentage, 0..=100
        #[arg(long, short = 'p')]
        percent: Option<u8>,
    },

    /// Toggle superchlorination
    Superchlorinate {
        /// Entity unique id of the superchlorinate switch
        unique_id: String,
        state: OnOff,
    },
}
