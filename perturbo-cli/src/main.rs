//! CLI entry point for the perturbo disturbance runner.
//!
//! Parses command-line arguments with clap, runs the disturbance sequence,
//! renders the round reports to stdout, and maps errors to appropriate exit
//! codes. Logging is initialized eagerly so subsequent operations can emit
//! structured diagnostics via `tracing`.

use std::io::{self, BufWriter, Write};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use perturbo_cli::{
    cli::{Cli, CliError, run_cli},
    logging::{self, LoggingError},
    report::render_report,
};
use tracing::{error, field};

/// Parse CLI arguments, execute the command, render the report, and flush
/// the output stream.
fn try_main() -> Result<()> {
    let cli = Cli::parse();
    let summary = run_cli(cli).context("failed to execute command")?;
    let stdout = io::stdout();
    let mut writer = BufWriter::new(stdout.lock());
    render_report(&summary.report, summary.route_flows, &mut writer)
        .context("failed to render report")?;
    writer.flush().context("failed to flush output")?;
    Ok(())
}

fn main() -> ExitCode {
    if let Err(err) = logging::init_logging() {
        report_logging_init_error(&err);
        return ExitCode::FAILURE;
    }

    if let Err(err) = try_main() {
        let (code, evaluator_code) = err
            .downcast_ref::<CliError>()
            .and_then(|cli_error| match cli_error {
                CliError::Core(core) => Some((Some(core.code()), core.evaluator_code())),
                _ => None,
            })
            .unwrap_or((None, None));

        let code_field = code.map(|code| field::display(code.as_str()));
        let evaluator_code_field = evaluator_code.map(|code| field::display(code.as_str()));

        error!(
            error = %err,
            code = code_field,
            evaluator_code = evaluator_code_field,
            "command execution failed"
        );
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

#[expect(
    clippy::print_stderr,
    reason = "Emit one-off diagnostic before tracing is initialized"
)]
fn report_logging_init_error(err: &LoggingError) {
    eprintln!("failed to initialize logging: {err}");
}
