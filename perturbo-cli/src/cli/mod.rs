//! Command-line interface orchestration for the perturbo disturbance runner.

mod commands;

pub use commands::{Cli, CliError, Command, ExecutionSummary, RunCommand, run_cli};
