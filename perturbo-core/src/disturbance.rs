//! The disturbance orchestration loop: evaluate a baseline, then repeatedly
//! perturb and re-evaluate, accumulating a changelog of structural changes.
//!
//! Rounds are strictly sequential: round `k` perturbs the exact network state
//! produced by round `k - 1`. The loop never stops early on its own; it runs
//! the configured round count unless a fatal error aborts the run or the
//! caller cancels it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{error, info, instrument, warn};

use crate::engine::{PerturbationEngine, PerturbationMode};
use crate::error::{PerturboError, Result};
use crate::evaluator::{CouplingReport, EquilibriumEvaluator, Evaluation, RouteCoupling, RouteFlow};
use crate::network::Network;
use crate::ranking::protect_top_flows;
use crate::topology::{DepthFirstOracle, mean_edge_betweenness};

/// Which per-round detail the reports carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportDetail {
    /// Per-edge flows from the round's evaluation.
    #[default]
    EdgeFlows,
    /// Mean directed edge betweenness of the round's topology.
    MeanBetweenness,
}

/// One edge's flow snapshot inside a round report.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeFlowEntry {
    /// Edge identifier.
    pub name: String,
    /// Start node at reporting time.
    pub start: String,
    /// End node at reporting time.
    pub end: String,
    /// Flow assigned by the round's evaluation.
    pub flow: f64,
}

/// Per-round detail payload, selected by [`ReportDetail`].
#[derive(Debug, Clone, PartialEq)]
pub enum RoundDetail {
    /// Per-edge flow snapshot.
    EdgeFlows(Vec<EdgeFlowEntry>),
    /// Mean directed edge betweenness.
    MeanBetweenness(f64),
}

/// Results of one evaluation round (round 0 is the unperturbed baseline).
#[derive(Debug, Clone, PartialEq)]
pub struct RoundReport {
    /// Round counter; 0 for the baseline.
    pub round: usize,
    /// Base network name concatenated with every change token so far.
    pub network_name: String,
    /// The change token recorded this round, `None` for the baseline.
    pub change: Option<String>,
    /// Aggregate user-equilibrium cost.
    pub ue_cost: f64,
    /// Aggregate system-optimal cost.
    pub so_cost: f64,
    /// `ue_cost / so_cost`.
    pub price_of_anarchy: f64,
    /// Flow or betweenness detail for the round.
    pub detail: RoundDetail,
    /// Route-coupling side report, when enabled and successful.
    pub coupling: Option<CouplingReport>,
    /// Per-route flow split from the round's evaluation.
    pub route_flows: Vec<RouteFlow>,
}

/// Output of a full disturbance run.
#[derive(Debug, Clone, PartialEq)]
pub struct DisturbanceReport {
    /// Baseline plus one report per completed round.
    pub rounds: Vec<RoundReport>,
    /// Change tokens in commit order.
    pub changelog: Vec<String>,
    /// The final (mutated) network.
    pub network: Network,
    /// Whether the run was cancelled before completing every round.
    pub cancelled: bool,
}

/// Cooperative cancellation handle for a disturbance run.
///
/// Cancellation is observed at round boundaries; a round interrupted between
/// its perturbation and its evaluation is rolled back to the pre-round
/// snapshot, so earlier rounds' reports stay valid.
///
/// # Examples
/// ```
/// use perturbo_core::CancelToken;
///
/// let token = CancelToken::new();
/// assert!(!token.is_cancelled());
/// token.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token in the not-cancelled state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Returns whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Configures and constructs [`Disturbance`] runs.
///
/// # Examples
/// ```
/// use perturbo_core::DisturbanceBuilder;
///
/// let disturbance = DisturbanceBuilder::new()
///     .with_rounds(3)
///     .with_episodes(400)
///     .with_seed(42)
///     .build()
///     .expect("builder configuration is valid");
/// assert_eq!(disturbance.rounds(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct DisturbanceBuilder {
    rounds: usize,
    episodes: usize,
    shield_extra: usize,
    mode: PerturbationMode,
    seed: Option<u64>,
    max_retries: usize,
    coupling_k: usize,
    detail: ReportDetail,
}

impl Default for DisturbanceBuilder {
    fn default() -> Self {
        Self {
            rounds: 1,
            episodes: 1000,
            shield_extra: 0,
            mode: PerturbationMode::default(),
            seed: None,
            max_retries: 1000,
            coupling_k: 0,
            detail: ReportDetail::EdgeFlows,
        }
    }
}

impl DisturbanceBuilder {
    /// Creates a builder populated with default parameters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of perturbation rounds. Zero runs the baseline
    /// evaluation only.
    #[must_use]
    pub fn with_rounds(mut self, rounds: usize) -> Self {
        self.rounds = rounds;
        self
    }

    /// Sets the iteration budget forwarded to the evaluator.
    #[must_use]
    pub fn with_episodes(mut self, episodes: usize) -> Self {
        self.episodes = episodes;
        self
    }

    /// Sets how many edges beyond the single busiest are shielded from
    /// random perturbation each round.
    #[must_use]
    pub fn with_shield_extra(mut self, extra: usize) -> Self {
        self.shield_extra = extra;
        self
    }

    /// Sets the perturbation mode.
    #[must_use]
    pub fn with_mode(mut self, mode: PerturbationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Seeds the engine RNG for reproducible runs.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sets the attempt budget for the engine's bounded random searches.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Enables route-coupling side reports with the given per-pair route
    /// budget. Zero disables the side channel.
    #[must_use]
    pub fn with_coupling_k(mut self, k: usize) -> Self {
        self.coupling_k = k;
        self
    }

    /// Selects the per-round report detail.
    #[must_use]
    pub fn with_detail(mut self, detail: ReportDetail) -> Self {
        self.detail = detail;
        self
    }

    /// Validates the configuration and constructs a [`Disturbance`].
    ///
    /// # Errors
    /// Returns [`PerturboError::InvalidEpisodes`] or
    /// [`PerturboError::InvalidRetryBudget`] for zero budgets.
    pub fn build(self) -> Result<Disturbance> {
        if self.episodes == 0 {
            return Err(PerturboError::InvalidEpisodes { got: 0 });
        }
        if self.max_retries == 0 {
            return Err(PerturboError::InvalidRetryBudget { got: 0 });
        }
        Ok(Disturbance {
            rounds: self.rounds,
            episodes: self.episodes,
            shield_extra: self.shield_extra,
            mode: self.mode,
            seed: self.seed,
            max_retries: self.max_retries,
            coupling_k: self.coupling_k,
            detail: self.detail,
        })
    }
}

/// The disturbance control loop: baseline evaluation, then `rounds`
/// iterations of rank, reset, perturb, re-evaluate, record.
#[derive(Debug, Clone)]
pub struct Disturbance {
    rounds: usize,
    episodes: usize,
    shield_extra: usize,
    mode: PerturbationMode,
    seed: Option<u64>,
    max_retries: usize,
    coupling_k: usize,
    detail: ReportDetail,
}

impl Disturbance {
    /// Returns the configured number of perturbation rounds.
    #[must_use]
    pub fn rounds(&self) -> usize {
        self.rounds
    }

    /// Returns the evaluator iteration budget.
    #[must_use]
    pub fn episodes(&self) -> usize {
        self.episodes
    }

    /// Returns the configured perturbation mode.
    #[must_use]
    pub fn mode(&self) -> &PerturbationMode {
        &self.mode
    }

    /// Runs the disturbance sequence without a route-coupling side channel.
    ///
    /// # Errors
    /// Same as [`Disturbance::run_with`].
    pub fn run<E: EquilibriumEvaluator>(
        &self,
        network: Network,
        evaluator: &E,
    ) -> Result<DisturbanceReport> {
        self.run_with(network, evaluator, None, &CancelToken::new())
    }

    /// Runs the disturbance sequence.
    ///
    /// Takes ownership of the network: the run is the sole writer, and the
    /// final mutated state comes back inside the report.
    ///
    /// # Errors
    /// Propagates engine configuration and invariant errors, evaluator
    /// failures, and a degenerate (non-positive) system optimum. Any fatal
    /// error aborts the remaining rounds; reports already produced are
    /// returned to the caller only through the error-free path, but logged
    /// rounds remain valid observations.
    #[instrument(
        name = "disturbance.run",
        err,
        skip_all,
        fields(network = %network.name(), rounds = self.rounds, episodes = self.episodes),
    )]
    pub fn run_with<E: EquilibriumEvaluator>(
        &self,
        mut network: Network,
        evaluator: &E,
        coupling: Option<&dyn RouteCoupling>,
        cancel: &CancelToken,
    ) -> Result<DisturbanceReport> {
        let mut engine = match self.seed {
            Some(seed) => PerturbationEngine::seeded(DepthFirstOracle, seed, self.max_retries)?,
            None => PerturbationEngine::new(DepthFirstOracle, self.max_retries)?,
        };

        let evaluation = self.evaluate(&mut network, evaluator, 0)?;
        let mut name = network.name().to_owned();
        let mut rounds = Vec::with_capacity(self.rounds + 1);
        rounds.push(self.report_round(0, name.clone(), None, &evaluation, &network, coupling)?);

        let mut changelog = Vec::new();
        let mut cancelled = false;

        for round in 1..=self.rounds {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let snapshot = network.clone();
            let protected = protect_top_flows(network.edges(), self.shield_extra);
            network.reset_assignment();

            let change = engine
                .perturb(&mut network, &protected, &self.mode)
                .map_err(|err| {
                    error!(round, code = %err.code(), "perturbation failed");
                    err
                })?;
            let token = change.token();

            if cancel.is_cancelled() {
                // Roll back the half-finished round; its change is not
                // recorded.
                network = snapshot;
                cancelled = true;
                break;
            }

            let evaluation = self.evaluate(&mut network, evaluator, round)?;
            name = format!("{name}_{token}");
            info!(round, token = %token, "perturbation committed");
            changelog.push(token.clone());
            rounds.push(self.report_round(
                round,
                name.clone(),
                Some(token),
                &evaluation,
                &network,
                coupling,
            )?);
        }

        Ok(DisturbanceReport {
            rounds,
            changelog,
            network,
            cancelled,
        })
    }

    fn evaluate<E: EquilibriumEvaluator>(
        &self,
        network: &mut Network,
        evaluator: &E,
        round: usize,
    ) -> Result<Evaluation> {
        evaluator
            .evaluate(network, self.episodes)
            .map_err(|source| {
                error!(round, code = %source.code(), "evaluation failed");
                PerturboError::Evaluator { source }
            })
    }

    fn report_round(
        &self,
        round: usize,
        network_name: String,
        change: Option<String>,
        evaluation: &Evaluation,
        network: &Network,
        coupling: Option<&dyn RouteCoupling>,
    ) -> Result<RoundReport> {
        let price_of_anarchy = evaluation.price_of_anarchy()?;
        let detail = match self.detail {
            ReportDetail::EdgeFlows => RoundDetail::EdgeFlows(
                network
                    .edges()
                    .iter()
                    .map(|edge| EdgeFlowEntry {
                        name: edge.name().to_owned(),
                        start: edge.start().to_owned(),
                        end: edge.end().to_owned(),
                        flow: edge.flow(),
                    })
                    .collect(),
            ),
            ReportDetail::MeanBetweenness => {
                RoundDetail::MeanBetweenness(mean_edge_betweenness(network))
            }
        };
        let coupling = self.coupling_report(round, network, coupling);

        Ok(RoundReport {
            round,
            network_name,
            change,
            ue_cost: evaluation.ue_cost(),
            so_cost: evaluation.so_cost(),
            price_of_anarchy,
            detail,
            coupling,
            route_flows: evaluation.route_flows().to_vec(),
        })
    }

    /// Route coupling is a side-channel report: a failure here is logged and
    /// the round goes on without it.
    fn coupling_report(
        &self,
        round: usize,
        network: &Network,
        coupling: Option<&dyn RouteCoupling>,
    ) -> Option<CouplingReport> {
        if self.coupling_k == 0 {
            return None;
        }
        let provider = coupling?;
        match provider.coupling(network, self.coupling_k) {
            Ok(report) => Some(report),
            Err(err) => {
                warn!(round, code = %err.code(), "route coupling failed; continuing without it");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let disturbance = DisturbanceBuilder::new()
            .build()
            .expect("defaults are valid");
        assert_eq!(disturbance.rounds(), 1);
        assert_eq!(disturbance.episodes(), 1000);
        assert_eq!(disturbance.mode(), &PerturbationMode::default());
    }

    #[test]
    fn builder_rejects_zero_episodes() {
        let err = DisturbanceBuilder::new()
            .with_episodes(0)
            .build()
            .expect_err("a zero iteration budget must be rejected");
        assert!(matches!(err, PerturboError::InvalidEpisodes { got: 0 }));
    }

    #[test]
    fn builder_rejects_zero_retry_budget() {
        let err = DisturbanceBuilder::new()
            .with_max_retries(0)
            .build()
            .expect_err("a zero retry budget must be rejected");
        assert!(matches!(err, PerturboError::InvalidRetryBudget { got: 0 }));
    }
}
