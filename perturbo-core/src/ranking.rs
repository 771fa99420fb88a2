//! Flow-based edge ranking used to shield high-importance edges from
//! perturbation.

use std::collections::BTreeSet;

use crate::network::Edge;

/// Identities of the edges shielded from random perturbation for one round.
///
/// The set is keyed by edge name, so two edges carrying coincidentally equal
/// flow are shielded independently.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtectedSet {
    names: BTreeSet<String>,
}

impl ProtectedSet {
    /// Returns whether the named edge is shielded.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Returns the number of shielded edges.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns whether the set shields nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Iterates over shielded edge names in lexicographic order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

/// Selects the busiest edge plus `extra` runners-up by current flow.
///
/// The sort is stable and descending, so ties keep the edge-collection order.
/// `extra = 0` shields exactly the maximum-flow edge; the result is never
/// empty unless the network has no edges.
///
/// # Examples
/// ```
/// use perturbo_core::{protect_top_flows, CostFunction, Edge};
///
/// let mut edges = vec![
///     Edge::new("AB", "A", "B", CostFunction::Constant(1.0)),
///     Edge::new("BC", "B", "C", CostFunction::Constant(1.0)),
///     Edge::new("CA", "C", "A", CostFunction::Constant(1.0)),
/// ];
/// edges[0].set_flow(5.0);
/// edges[1].set_flow(9.0);
/// edges[2].set_flow(1.0);
///
/// let protected = protect_top_flows(&edges, 0);
/// assert_eq!(protected.len(), 1);
/// assert!(protected.contains("BC"));
///
/// let protected = protect_top_flows(&edges, 1);
/// assert_eq!(protected.len(), 2);
/// assert!(protected.contains("BC"));
/// assert!(protected.contains("AB"));
/// ```
#[must_use]
pub fn protect_top_flows(edges: &[Edge], extra: usize) -> ProtectedSet {
    let mut order: Vec<usize> = (0..edges.len()).collect();
    order.sort_by(|&left, &right| edges[right].flow().total_cmp(&edges[left].flow()));

    let names = order
        .into_iter()
        .take(extra.saturating_add(1))
        .map(|position| edges[position].name().to_owned())
        .collect();

    ProtectedSet { names }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::network::CostFunction;
    use rstest::rstest;

    fn edges_with_flows(flows: &[f64]) -> Vec<Edge> {
        flows
            .iter()
            .enumerate()
            .map(|(position, flow)| {
                let mut edge = Edge::new(
                    format!("e{position}"),
                    format!("n{position}"),
                    format!("n{}", position + 1),
                    CostFunction::Constant(1.0),
                );
                edge.set_flow(*flow);
                edge
            })
            .collect()
    }

    #[rstest]
    #[case(0, 1)]
    #[case(1, 2)]
    #[case(3, 4)]
    #[case(10, 5)]
    fn shields_extra_plus_one_capped_by_edge_count(#[case] extra: usize, #[case] expected: usize) {
        let edges = edges_with_flows(&[4.0, 2.0, 9.0, 7.0, 1.0]);
        let protected = protect_top_flows(&edges, extra);
        assert_eq!(protected.len(), expected);
    }

    #[test]
    fn shielded_flows_dominate_the_rest() {
        let edges = edges_with_flows(&[4.0, 2.0, 9.0, 7.0, 1.0]);
        let protected = protect_top_flows(&edges, 1);

        let shielded_min = edges
            .iter()
            .filter(|edge| protected.contains(edge.name()))
            .map(Edge::flow)
            .fold(f64::INFINITY, f64::min);
        let exposed_max = edges
            .iter()
            .filter(|edge| !protected.contains(edge.name()))
            .map(Edge::flow)
            .fold(f64::NEG_INFINITY, f64::max);
        assert!(shielded_min >= exposed_max);
    }

    #[test]
    fn ties_resolve_in_collection_order() {
        let edges = edges_with_flows(&[5.0, 5.0, 5.0]);
        let protected = protect_top_flows(&edges, 0);
        assert!(protected.contains("e0"));
        assert_eq!(protected.len(), 1);
    }

    #[test]
    fn empty_edge_collection_yields_empty_set() {
        let protected = protect_top_flows(&[], 3);
        assert!(protected.is_empty());
    }
}
