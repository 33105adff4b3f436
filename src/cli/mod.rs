//! Command-line interface for swe-resolve.
//!
//! Provides the `run` command (full agent pipeline) and the `metrics`
//! command (recompute `result.json` from existing artifacts).

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli, Commands, MetricsArgs, RunArgs};
