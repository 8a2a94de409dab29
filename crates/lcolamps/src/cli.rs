//! Clap derive structures for the `lcolamps` CLI.
//!
//! Defines the command tree, global flags, and shared enums.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// lcolamps -- command the LCO calibration lamps
#[derive(Debug, Parser)]
#[command(
    name = "lcolamps",
    version,
    about = "Control the LCO calibration lamps from the command line",
    long_about = "Switches and reports the calibration lamps at Las Campanas.\n\n\
        Lamps on the M2 relay box are commanded directly over TCP; the\n\
        remaining lamps are delegated to their device actor.",
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
    /// Path to the configuration file
    #[arg(long, short = 'c', env = "LCOLAMPS_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'o', default_value = "table", global = true)]
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
    /// Plain text, one lamp per line (scripting)
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
    /// Report the state of every configured lamp
    #[command(alias = "st")]
    Status,

    /// Turn lamps on, holding until they have warmed up
    On(OnArgs),

    /// Turn lamps off
    Off(OffArgs),
}

#[derive(Debug, Args)]
pub struct OnArgs {
    /// Lamp names to turn on
    #[arg(required_unless_present = "all")]
    pub lamps: Vec<String>,

    /// Turn on every configured lamp
    #[arg(long, short = 'a', conflicts_with = "lamps")]
    pub all: bool,

    /// Override the configured warm-up time, in seconds
    #[arg(long, short = 'w')]
    pub warmup: Option<f64>,
}

#[derive(Debug, Args)]
pub struct OffArgs {
    /// Lamp names to turn off
    #[arg(required_unless_present = "all")]
    pub lamps: Vec<String>,

    /// Turn off every configured lamp
    #[arg(long, short = 'a', conflicts_with = "lamps")]
    pub all: bool,
}
