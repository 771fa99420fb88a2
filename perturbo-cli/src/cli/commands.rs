//! Command implementations and argument parsing for the perturbo CLI.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use thiserror::Error;
use tracing::{info, instrument};

use perturbo_core::{
    CancelToken, DisturbanceBuilder, DisturbanceReport, PerturbationMode, PerturboError,
    ReportDetail,
};
use perturbo_solvers_msa::{KspCoupling, MsaEvaluator};

use crate::netfile::{self, NetFileError};
use crate::report;

const DEFAULT_EPISODES: usize = 1000;
const DEFAULT_CHANGES: usize = 1;
const DEFAULT_MAX_RETRIES: usize = 1000;

/// Top-level CLI options parsed by [`clap`].
#[derive(Debug, Parser, Clone)]
#[command(
    name = "perturbo",
    about = "Perturb a traffic network's topology and track its equilibrium."
)]
pub struct Cli {
    /// Command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Supported CLI commands.
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run a disturbance sequence over a network definition file.
    Run(RunCommand),
}

/// Options accepted by the `run` command.
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to the network definition file.
    pub path: PathBuf,

    /// Iteration budget per equilibrium evaluation.
    #[arg(short = 'e', long, default_value_t = DEFAULT_EPISODES)]
    pub episodes: usize,

    /// Number of perturbation rounds.
    #[arg(short = 'c', long, default_value_t = DEFAULT_CHANGES)]
    pub changes: usize,

    /// Extra top-flow edges shielded from random perturbation, beyond the
    /// single busiest edge that is always shielded.
    #[arg(long, default_value_t = 0)]
    pub protect: usize,

    /// Rewire the reverse edge of a bidirectional pair in lockstep.
    #[arg(long, conflicts_with = "remove_only")]
    pub complementary: bool,

    /// Remove edges instead of rewiring them.
    #[arg(long)]
    pub remove_only: bool,

    /// Target a specific edge by name instead of drawing randomly.
    #[arg(long)]
    pub edge: Option<String>,

    /// Route budget for the per-round coupling report; 0 disables it.
    #[arg(long, default_value_t = 0)]
    pub coupling_k: usize,

    /// Print per-route per-demand-pair flows under each round line.
    #[arg(long)]
    pub route_flows: bool,

    /// Report mean edge betweenness instead of per-edge flows.
    #[arg(long, conflicts_with = "export_graphs")]
    pub betweenness: bool,

    /// Seed for the perturbation RNG; omit for an entropy seed.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Attempt budget for the engine's bounded random searches.
    #[arg(long, default_value_t = DEFAULT_MAX_RETRIES)]
    pub max_retries: usize,

    /// Write one `<name>.edges` edge-list file per round into this directory.
    #[arg(long)]
    pub export_graphs: Option<PathBuf>,
}

impl RunCommand {
    /// Maps the flag combination onto the engine's perturbation mode.
    #[must_use]
    pub fn mode(&self) -> PerturbationMode {
        match (&self.edge, self.remove_only) {
            (Some(edge), true) => PerturbationMode::RemoveNamed { edge: edge.clone() },
            (None, true) => PerturbationMode::RemoveRandom,
            (target, false) => PerturbationMode::Rewire {
                target: target.clone(),
                complementary: self.complementary,
            },
        }
    }
}

/// Errors surfaced while executing CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// File I/O failed while loading an input or writing an export.
    #[error("failed to access `{path}`: {source}")]
    Io {
        /// Path that triggered the failure.
        path: PathBuf,
        /// Underlying operating system error.
        #[source]
        source: io::Error,
    },
    /// The network definition failed to parse.
    #[error(transparent)]
    NetFile(#[from] NetFileError),
    /// The disturbance run failed.
    #[error(transparent)]
    Core(#[from] PerturboError),
}

/// Summarises the outcome of executing a CLI command.
#[derive(Debug, Clone)]
pub struct ExecutionSummary {
    /// The disturbance report produced by the run.
    pub report: DisturbanceReport,
    /// Whether per-route flows should be rendered.
    pub route_flows: bool,
}

/// Executes the CLI command represented by `cli`.
///
/// # Errors
/// Returns [`CliError`] when loading, parsing, or execution fails.
pub fn run_cli(cli: Cli) -> Result<ExecutionSummary, CliError> {
    match cli.command {
        Command::Run(command) => run(command),
    }
}

#[instrument(name = "cli.run", err, skip(command), fields(path = %command.path.display()))]
fn run(command: RunCommand) -> Result<ExecutionSummary, CliError> {
    let file = File::open(&command.path).map_err(|source| CliError::Io {
        path: command.path.clone(),
        source,
    })?;
    let network = netfile::parse_network(BufReader::new(file))?;
    info!(
        network = %network.name(),
        nodes = network.node_count(),
        edges = network.edge_count(),
        demand_pairs = network.od().len(),
        "network loaded"
    );

    let detail = if command.betweenness {
        ReportDetail::MeanBetweenness
    } else {
        ReportDetail::EdgeFlows
    };
    let mut builder = DisturbanceBuilder::new()
        .with_rounds(command.changes)
        .with_episodes(command.episodes)
        .with_shield_extra(command.protect)
        .with_mode(command.mode())
        .with_max_retries(command.max_retries)
        .with_coupling_k(command.coupling_k)
        .with_detail(detail);
    if let Some(seed) = command.seed {
        builder = builder.with_seed(seed);
    }
    let disturbance = builder.build()?;

    let coupling = KspCoupling::new();
    let disturbance_report = disturbance.run_with(
        network,
        &MsaEvaluator::new(),
        Some(&coupling),
        &CancelToken::new(),
    )?;

    if let Some(directory) = &command.export_graphs {
        report::export_edge_lists(&disturbance_report, directory).map_err(|source| {
            CliError::Io {
                path: directory.clone(),
                source,
            }
        })?;
    }

    Ok(ExecutionSummary {
        report: disturbance_report,
        route_flows: command.route_flows,
    })
}
