//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "airsense", version, about = "Air-quality sensing node")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/airsense.toml")]
    pub config: PathBuf,

    /// Log as JSON lines instead of pretty; errors and command results as JSON
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); overrides [logging] level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Bootstrap, calibrate and run the sensing loop
    Run {
        /// Stop after this many cycles (default: run until Ctrl-C)
        #[arg(long, value_name = "N")]
        cycles: Option<u64>,
        /// Override control.period_ms
        #[arg(long = "period-ms", value_name = "MS")]
        period_ms: Option<u64>,
        /// Re-measure the clean-air baseline every SECS seconds
        #[arg(long = "recalibrate-every-s", value_name = "SECS")]
        recalibrate_every_s: Option<u64>,
    },
    /// Run the clean-air calibration only and print the baseline resistance
    Calibrate,
    /// Read every collaborator once and report
    SelfCheck,
}
