//! Route-coupling computation over the k cheapest routes per demand pair.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::instrument;

use perturbo_core::{CouplingReport, EvaluatorError, Network, RouteCoupling};

use crate::paths::Router;

/// [`RouteCoupling`] implementation backed by Yen's k-cheapest-path
/// enumeration over current edge costs.
///
/// Coupling of one demand pair is the mean pairwise Jaccard overlap of the
/// edge sets of its k cheapest routes; a pair with a single route counts as
/// fully coupled. The report averages over all demand pairs.
#[derive(Debug, Clone, Copy, Default)]
pub struct KspCoupling;

impl KspCoupling {
    /// Creates the coupling provider.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl RouteCoupling for KspCoupling {
    #[instrument(
        name = "ksp.coupling",
        err,
        skip(self, network),
        fields(network = %network.name(), k),
    )]
    fn coupling(&self, network: &Network, k: usize) -> Result<CouplingReport, EvaluatorError> {
        let router = Router::new(network)?;
        let costs: Vec<f64> = network.edges().iter().map(|edge| edge.cost()).collect();
        if let Some(edge) = network.edges().iter().find(|edge| !edge.cost().is_finite()) {
            return Err(EvaluatorError::NonFiniteCost {
                edge: Arc::from(edge.name()),
            });
        }

        let mut total = 0.0;
        let mut pairs = 0;
        for (pair, _) in network.od().pairs() {
            let origin = router.node(pair.origin())?;
            let destination = router.node(pair.destination())?;
            let routes = router.k_cheapest_paths(origin, destination, k, &costs);
            if routes.is_empty() {
                return Err(EvaluatorError::NoRoute {
                    origin: Arc::from(pair.origin()),
                    destination: Arc::from(pair.destination()),
                });
            }
            total += pair_coupling(&routes);
            pairs += 1;
        }

        let mean_overlap = if pairs == 0 { 0.0 } else { total / pairs as f64 };
        Ok(CouplingReport::new(k, pairs, mean_overlap))
    }
}

fn pair_coupling(routes: &[Vec<usize>]) -> f64 {
    if routes.len() < 2 {
        return 1.0;
    }
    let sets: Vec<BTreeSet<usize>> = routes
        .iter()
        .map(|route| route.iter().copied().collect())
        .collect();

    let mut total = 0.0;
    let mut count = 0;
    for (position, left) in sets.iter().enumerate() {
        for right in &sets[position + 1..] {
            let intersection = left.intersection(right).count();
            let union = left.union(right).count();
            total += intersection as f64 / union as f64;
            count += 1;
        }
    }
    total / count as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    use perturbo_core::{CostFunction, Edge, Node, OdMatrix, OdPair};

    fn parallel_routes() -> Network {
        // Two fully disjoint routes A->B and one shared-edge variant.
        let nodes = ["A", "M", "N", "B"].iter().copied().map(Node::new).collect();
        let arcs = [
            ("AM", "A", "M", 1.0),
            ("MB", "M", "B", 1.0),
            ("AN", "A", "N", 2.0),
            ("NB", "N", "B", 2.0),
        ];
        let edges = arcs
            .iter()
            .map(|(name, start, end, cost)| {
                Edge::new(*name, *start, *end, CostFunction::Constant(*cost))
            })
            .collect();
        let mut od = OdMatrix::new();
        od.insert(OdPair::new("A", "B"), 1.0);
        Network::new("parallel", nodes, edges, od)
    }

    #[test]
    fn disjoint_routes_have_zero_overlap() {
        let network = parallel_routes();
        let report = KspCoupling::new()
            .coupling(&network, 2)
            .expect("A reaches B");
        assert_eq!(report.k(), 2);
        assert_eq!(report.pairs(), 1);
        assert_eq!(report.mean_overlap(), 0.0);
    }

    #[test]
    fn single_route_pairs_count_as_fully_coupled() {
        let network = parallel_routes();
        let report = KspCoupling::new()
            .coupling(&network, 1)
            .expect("A reaches B");
        assert_eq!(report.mean_overlap(), 1.0);
    }

    #[test]
    fn empty_demand_matrix_reports_zero_pairs() {
        let nodes = ["A", "B"].iter().copied().map(Node::new).collect();
        let edges = vec![Edge::new("AB", "A", "B", CostFunction::Constant(1.0))];
        let network = Network::new("empty-od", nodes, edges, OdMatrix::new());
        let report = KspCoupling::new()
            .coupling(&network, 3)
            .expect("no pairs to fail on");
        assert_eq!(report.pairs(), 0);
        assert_eq!(report.mean_overlap(), 0.0);
    }
}
