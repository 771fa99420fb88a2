//! Trait seams for the external solver collaborators and the evaluation
//! result types the orchestration loop consumes.
//!
//! How user-equilibrium or system-optimal flows are computed is out of scope
//! for the core: it only states the contract. `perturbo-solvers-msa` ships a
//! reference implementation of both seams.

use crate::error::{EvaluatorError, PerturboError, Result};
use crate::network::{Network, OdPair};

/// Flow placed on one route serving one demand pair.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteFlow {
    pair: OdPair,
    edges: Vec<String>,
    flow: f64,
}

impl RouteFlow {
    /// Creates a route-flow record from the demand pair it serves, the edge
    /// names along the route, and the demand share carried.
    #[must_use]
    pub fn new(pair: OdPair, edges: Vec<String>, flow: f64) -> Self {
        Self { pair, edges, flow }
    }

    /// Returns the demand pair this route serves.
    #[must_use]
    pub fn pair(&self) -> &OdPair {
        &self.pair
    }

    /// Returns the edge names along the route, in travel order.
    #[must_use]
    pub fn edges(&self) -> &[String] {
        &self.edges
    }

    /// Returns the demand share carried by this route.
    #[must_use]
    pub fn flow(&self) -> f64 {
        self.flow
    }
}

/// Outcome of one equilibrium evaluation round.
///
/// Per-edge flows and costs are written back onto the evaluated [`Network`];
/// this type carries the aggregates and the per-route split.
///
/// # Examples
/// ```
/// use perturbo_core::Evaluation;
///
/// let evaluation = Evaluation::new(120.0, 100.0, Vec::new());
/// assert_eq!(evaluation.price_of_anarchy().expect("so is positive"), 1.2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    ue_cost: f64,
    so_cost: f64,
    route_flows: Vec<RouteFlow>,
}

impl Evaluation {
    /// Creates an evaluation result from the aggregate user-equilibrium cost,
    /// the aggregate system-optimal cost, and the per-route flows.
    #[must_use]
    pub fn new(ue_cost: f64, so_cost: f64, route_flows: Vec<RouteFlow>) -> Self {
        Self {
            ue_cost,
            so_cost,
            route_flows,
        }
    }

    /// Returns the aggregate user-equilibrium cost.
    #[must_use]
    pub fn ue_cost(&self) -> f64 {
        self.ue_cost
    }

    /// Returns the aggregate system-optimal cost.
    #[must_use]
    pub fn so_cost(&self) -> f64 {
        self.so_cost
    }

    /// Returns the per-route flow split.
    #[must_use]
    pub fn route_flows(&self) -> &[RouteFlow] {
        &self.route_flows
    }

    /// Computes the price of anarchy `ue / so`.
    ///
    /// # Errors
    /// Returns [`PerturboError::DegenerateOptimum`] when the system-optimal
    /// cost is not positive; the ratio must never silently become infinite.
    pub fn price_of_anarchy(&self) -> Result<f64> {
        if self.so_cost <= 0.0 {
            return Err(PerturboError::DegenerateOptimum {
                so_cost: self.so_cost,
            });
        }
        Ok(self.ue_cost / self.so_cost)
    }
}

/// Computes user-equilibrium and system-optimal flow assignments.
///
/// Implementations must be deterministic for identical inputs and iteration
/// budget so that disturbance experiments are reproducible. Per-edge flow and
/// cost are written onto `network`; the returned [`Evaluation`] carries the
/// aggregates.
pub trait EquilibriumEvaluator {
    /// Evaluates the network under its demand matrix with the given iteration
    /// budget.
    ///
    /// # Errors
    /// Returns an [`EvaluatorError`] when the network or demand matrix is
    /// unroutable or a cost model degenerates.
    fn evaluate(&self, network: &mut Network, episodes: usize)
    -> core::result::Result<Evaluation, EvaluatorError>;
}

/// Route-overlap statistics across the k cheapest routes of each demand pair.
#[derive(Debug, Clone, PartialEq)]
pub struct CouplingReport {
    k: usize,
    pairs: usize,
    mean_overlap: f64,
}

impl CouplingReport {
    /// Creates a coupling report from the route budget, the number of demand
    /// pairs covered, and the mean pairwise route overlap.
    #[must_use]
    pub fn new(k: usize, pairs: usize, mean_overlap: f64) -> Self {
        Self {
            k,
            pairs,
            mean_overlap,
        }
    }

    /// Returns the per-pair route budget used for the computation.
    #[must_use]
    pub fn k(&self) -> usize {
        self.k
    }

    /// Returns the number of demand pairs covered.
    #[must_use]
    pub fn pairs(&self) -> usize {
        self.pairs
    }

    /// Returns the mean pairwise route overlap in `[0, 1]`.
    #[must_use]
    pub fn mean_overlap(&self) -> f64 {
        self.mean_overlap
    }
}

/// Computes route-coupling statistics for reporting.
///
/// This is a side-channel report: failures are logged by the orchestrator and
/// never abort the disturbance sequence.
pub trait RouteCoupling {
    /// Computes overlap statistics over the `k` cheapest routes per demand
    /// pair.
    ///
    /// # Errors
    /// Returns an [`EvaluatorError`] when routes cannot be enumerated.
    fn coupling(
        &self,
        network: &Network,
        k: usize,
    ) -> core::result::Result<CouplingReport, EvaluatorError>;
}
