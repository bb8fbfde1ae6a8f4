//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(
    name = "cartpole",
    version,
    about = "Cart-pole controller: simulated rig, line protocol over stdio"
)]
pub struct Cli {
    /// Path to config TOML [default: etc/cartpole.toml]; compiled-in
    /// defaults are used when no file is given and the default path does
    /// not exist
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log as JSON lines instead of pretty (stderr; stdout carries the
    /// protocol)
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); overrides the config
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Distance between the simulated endstops, in steps
    #[arg(long, value_name = "STEPS")]
    pub sim_span_steps: Option<i32>,

    /// Initial simulated cart position as a fraction of the span
    #[arg(long, value_name = "FRAC")]
    pub sim_start_frac: Option<f64>,
}
