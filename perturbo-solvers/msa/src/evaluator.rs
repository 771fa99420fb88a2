//! Successive-averages equilibrium evaluator.
//!
//! User equilibrium is approximated by the classic method of successive
//! averages: each episode assigns every demand all-or-nothing along the
//! currently cheapest route, then blends the assignment into the running
//! flows with step size `1/k`. The system optimum runs the same averaging
//! against marginal costs (`cost(f) + f * cost'(f)`), which steers the
//! all-or-nothing step towards the socially cheapest routes; the reported SO
//! cost is the *actual* cost total at the resulting flows.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, instrument};

use perturbo_core::{
    EquilibriumEvaluator, Evaluation, EvaluatorError, Network, OdPair, RouteFlow,
};

use crate::paths::Router;

/// Route shares below this fraction of a pair's demand are numerical residue
/// of early episodes and are dropped from the report.
const ROUTE_FLOW_FLOOR: f64 = 1e-9;

/// Reference [`EquilibriumEvaluator`] based on the method of successive
/// averages.
///
/// Deterministic for identical inputs and episode budget: route choice ties
/// resolve by node position, and demand pairs are visited in key order.
#[derive(Debug, Clone, Copy, Default)]
pub struct MsaEvaluator;

impl MsaEvaluator {
    /// Creates the evaluator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[derive(Clone, Copy)]
enum CostBasis {
    Actual,
    Marginal,
}

impl EquilibriumEvaluator for MsaEvaluator {
    #[instrument(
        name = "msa.evaluate",
        err,
        skip(self, network),
        fields(network = %network.name(), episodes),
    )]
    fn evaluate(
        &self,
        network: &mut Network,
        episodes: usize,
    ) -> Result<Evaluation, EvaluatorError> {
        // System optimum first, on a scratch copy, so the caller's network
        // ends the round carrying the user-equilibrium flows.
        let mut scratch = network.clone();
        assign(&mut scratch, episodes, CostBasis::Marginal)?;
        let so_cost = total_cost(&scratch);

        let route_flows = assign(network, episodes, CostBasis::Actual)?;
        let ue_cost = total_cost(network);
        debug!(ue_cost, so_cost, "assignment complete");

        Ok(Evaluation::new(ue_cost, so_cost, route_flows))
    }
}

fn assign(
    network: &mut Network,
    episodes: usize,
    basis: CostBasis,
) -> Result<Vec<RouteFlow>, EvaluatorError> {
    network.reset_assignment();
    let router = Router::new(network)?;
    let demands: Vec<(OdPair, f64)> = network
        .od()
        .pairs()
        .map(|(pair, demand)| (pair.clone(), demand))
        .collect();

    let no_nodes = vec![false; network.node_count()];
    let no_edges = vec![false; network.edge_count()];
    let mut route_shares: BTreeMap<(OdPair, Vec<usize>), f64> = BTreeMap::new();

    for episode in 1..=episodes {
        let costs = edge_costs(network, basis)?;
        let step = 1.0 / episode as f64;

        for edge in network.edges_mut() {
            let blended = edge.flow() * (1.0 - step);
            edge.set_flow(blended);
        }
        for share in route_shares.values_mut() {
            *share *= 1.0 - step;
        }

        for (pair, demand) in &demands {
            let origin = router.node(pair.origin())?;
            let destination = router.node(pair.destination())?;
            let Some((_, path)) =
                router.cheapest_path(origin, destination, &costs, &no_nodes, &no_edges)
            else {
                return Err(EvaluatorError::NoRoute {
                    origin: Arc::from(pair.origin()),
                    destination: Arc::from(pair.destination()),
                });
            };

            for &edge in &path {
                let loaded = network.edges()[edge].flow() + step * demand;
                network.edges_mut()[edge].set_flow(loaded);
            }
            *route_shares.entry((pair.clone(), path)).or_insert(0.0) += step * demand;
        }
    }

    for edge in network.edges_mut() {
        edge.recompute_cost();
    }

    let route_flows = route_shares
        .into_iter()
        .filter(|(_, share)| *share > ROUTE_FLOW_FLOOR)
        .map(|((pair, path), share)| {
            let edges = path
                .into_iter()
                .map(|edge| network.edges()[edge].name().to_owned())
                .collect();
            RouteFlow::new(pair, edges, share)
        })
        .collect();
    Ok(route_flows)
}

fn edge_costs(network: &Network, basis: CostBasis) -> Result<Vec<f64>, EvaluatorError> {
    network
        .edges()
        .iter()
        .map(|edge| {
            let cost = match basis {
                CostBasis::Actual => edge.function().evaluate(edge.flow()),
                CostBasis::Marginal => edge.function().marginal(edge.flow()),
            };
            if cost.is_finite() {
                Ok(cost)
            } else {
                Err(EvaluatorError::NonFiniteCost {
                    edge: Arc::from(edge.name()),
                })
            }
        })
        .collect()
}

/// Flow-weighted cost total at the network's current flows.
fn total_cost(network: &Network) -> f64 {
    network
        .edges()
        .iter()
        .map(|edge| edge.flow() * edge.cost())
        .sum()
}
