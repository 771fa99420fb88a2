//! Directed-graph queries over a [`Network`]: strong connectivity and edge
//! betweenness.
//!
//! The perturbation engine consults a [`ConnectivityOracle`] after every
//! candidate mutation, so the oracle is a trait seam: production code uses
//! [`DepthFirstOracle`], tests can substitute a deterministic double.

use std::collections::{BTreeMap, VecDeque};

use crate::network::Network;

/// Answers whether a candidate topology is strongly connected.
///
/// Implementations must be pure queries: no side effects on the network, and
/// the same answer for the same topology.
pub trait ConnectivityOracle {
    /// Returns `true` when every node is reachable from every other node via
    /// directed edges.
    fn is_strongly_connected(&self, network: &Network) -> bool;
}

/// Strong-connectivity check via a forward and a reverse reachability sweep
/// from an arbitrary root.
///
/// # Examples
/// ```
/// use perturbo_core::{ConnectivityOracle, CostFunction, DepthFirstOracle, Edge, Network, Node, OdMatrix};
///
/// let cycle = Network::new(
///     "cycle",
///     vec![Node::new("A"), Node::new("B")],
///     vec![
///         Edge::new("AB", "A", "B", CostFunction::Constant(1.0)),
///         Edge::new("BA", "B", "A", CostFunction::Constant(1.0)),
///     ],
///     OdMatrix::new(),
/// );
/// assert!(DepthFirstOracle.is_strongly_connected(&cycle));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct DepthFirstOracle;

impl ConnectivityOracle for DepthFirstOracle {
    fn is_strongly_connected(&self, network: &Network) -> bool {
        let index = NodeIndex::build(network);
        let Some((forward, reverse)) = index.adjacency(network) else {
            // An edge endpoint missing from the node collection means the
            // topology is malformed; it cannot be strongly connected.
            return false;
        };
        if index.len() <= 1 {
            return true;
        }

        reach_count(&forward, 0) == index.len() && reach_count(&reverse, 0) == index.len()
    }
}

/// Sorted node-name index. A `BTreeMap` keeps the numbering stable between
/// calls, which keeps traversal order deterministic for a given topology.
pub(crate) struct NodeIndex<'a> {
    positions: BTreeMap<&'a str, usize>,
}

impl<'a> NodeIndex<'a> {
    pub(crate) fn build(network: &'a Network) -> Self {
        let positions = network
            .nodes()
            .iter()
            .map(|node| node.name())
            .enumerate()
            .map(|(position, name)| (name, position))
            .collect();
        Self { positions }
    }

    pub(crate) fn len(&self) -> usize {
        self.positions.len()
    }

    pub(crate) fn get(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    /// Builds forward and reverse adjacency lists, or `None` when an edge
    /// references a node absent from the node collection.
    pub(crate) fn adjacency(&self, network: &Network) -> Option<(Vec<Vec<usize>>, Vec<Vec<usize>>)> {
        let mut forward = vec![Vec::new(); self.len()];
        let mut reverse = vec![Vec::new(); self.len()];
        for edge in network.edges() {
            let start = self.get(edge.start())?;
            let end = self.get(edge.end())?;
            forward[start].push(end);
            reverse[end].push(start);
        }
        Some((forward, reverse))
    }
}

fn reach_count(adjacency: &[Vec<usize>], root: usize) -> usize {
    let mut seen = vec![false; adjacency.len()];
    let mut queue = VecDeque::new();
    seen[root] = true;
    queue.push_back(root);
    let mut count = 0;
    while let Some(node) = queue.pop_front() {
        count += 1;
        for &next in &adjacency[node] {
            if !seen[next] {
                seen[next] = true;
                queue.push_back(next);
            }
        }
    }
    count
}

/// Computes unweighted directed edge betweenness, aligned with the order of
/// [`Network::edges`].
///
/// Brandes's accumulation over breadth-first shortest-path counts, applied to
/// edges instead of vertices. Parallel edges spanning the same ordered node
/// pair count as distinct shortest paths and accumulate their own share.
///
/// # Examples
/// ```
/// use perturbo_core::{edge_betweenness, CostFunction, Edge, Network, Node, OdMatrix};
///
/// let line = Network::new(
///     "line",
///     vec![Node::new("A"), Node::new("B"), Node::new("C")],
///     vec![
///         Edge::new("AB", "A", "B", CostFunction::Constant(1.0)),
///         Edge::new("BC", "B", "C", CostFunction::Constant(1.0)),
///     ],
///     OdMatrix::new(),
/// );
/// let scores = edge_betweenness(&line);
/// // AB carries A->B and A->C, BC carries B->C and A->C.
/// assert_eq!(scores, vec![2.0, 2.0]);
/// ```
#[must_use]
pub fn edge_betweenness(network: &Network) -> Vec<f64> {
    let index = NodeIndex::build(network);
    let node_count = index.len();
    let mut scores = vec![0.0; network.edge_count()];
    if node_count == 0 {
        return scores;
    }

    // Outgoing edge indices per node; traversal works on edges so parallel
    // arcs keep their own identity.
    let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); node_count];
    for (position, edge) in network.edges().iter().enumerate() {
        if let (Some(start), Some(_)) = (index.get(edge.start()), index.get(edge.end())) {
            outgoing[start].push(position);
        }
    }
    let edge_end = |position: usize| {
        index
            .get(network.edges()[position].end())
            .unwrap_or(usize::MAX)
    };

    for source in 0..node_count {
        let mut sigma = vec![0.0_f64; node_count];
        let mut distance = vec![usize::MAX; node_count];
        let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); node_count];
        let mut stack = Vec::new();
        let mut queue = VecDeque::new();

        sigma[source] = 1.0;
        distance[source] = 0;
        queue.push_back(source);

        while let Some(node) = queue.pop_front() {
            stack.push(node);
            for &edge in &outgoing[node] {
                let next = edge_end(edge);
                if next == usize::MAX {
                    continue;
                }
                if distance[next] == usize::MAX {
                    distance[next] = distance[node] + 1;
                    queue.push_back(next);
                }
                if distance[next] == distance[node] + 1 {
                    sigma[next] += sigma[node];
                    predecessors[next].push(edge);
                }
            }
        }

        let mut delta = vec![0.0_f64; node_count];
        while let Some(node) = stack.pop() {
            for &edge in &predecessors[node] {
                let from = index
                    .get(network.edges()[edge].start())
                    .unwrap_or(usize::MAX);
                if from == usize::MAX {
                    continue;
                }
                let share = sigma[from] / sigma[node] * (1.0 + delta[node]);
                scores[edge] += share;
                delta[from] += share;
            }
        }
    }

    scores
}

/// Mean of [`edge_betweenness`] over the edge collection, or zero for an
/// empty network.
#[must_use]
pub fn mean_edge_betweenness(network: &Network) -> f64 {
    let scores = edge_betweenness(network);
    if scores.is_empty() {
        return 0.0;
    }
    scores.iter().sum::<f64>() / scores.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::network::{CostFunction, Edge, Node, OdMatrix};

    fn network(nodes: &[&str], arcs: &[(&str, &str)]) -> Network {
        let nodes = nodes.iter().copied().map(Node::new).collect();
        let edges = arcs
            .iter()
            .map(|(start, end)| {
                Edge::new(
                    format!("{start}{end}"),
                    *start,
                    *end,
                    CostFunction::Constant(1.0),
                )
            })
            .collect();
        Network::new("t", nodes, edges, OdMatrix::new())
    }

    #[test]
    fn directed_cycle_is_strongly_connected() {
        let cycle = network(
            &["A", "B", "C"],
            &[("A", "B"), ("B", "C"), ("C", "A")],
        );
        assert!(DepthFirstOracle.is_strongly_connected(&cycle));
    }

    #[test]
    fn one_way_line_is_not_strongly_connected() {
        let line = network(&["A", "B", "C"], &[("A", "B"), ("B", "C")]);
        assert!(!DepthFirstOracle.is_strongly_connected(&line));
    }

    #[test]
    fn isolated_node_breaks_strong_connectivity() {
        let lonely = network(&["A", "B", "C"], &[("A", "B"), ("B", "A")]);
        assert!(!DepthFirstOracle.is_strongly_connected(&lonely));
    }

    #[test]
    fn single_node_network_is_trivially_connected() {
        let single = network(&["A"], &[]);
        assert!(DepthFirstOracle.is_strongly_connected(&single));
    }

    #[test]
    fn dangling_edge_endpoint_is_rejected() {
        let nodes = vec![Node::new("A")];
        let edges = vec![Edge::new("AX", "A", "X", CostFunction::Constant(1.0))];
        let broken = Network::new("t", nodes, edges, OdMatrix::new());
        assert!(!DepthFirstOracle.is_strongly_connected(&broken));
    }

    #[test]
    fn betweenness_peaks_on_the_bridge() {
        // Two bidirectional triangles joined by the bridge C<->D.
        let bridged = network(
            &["A", "B", "C", "D", "E", "F"],
            &[
                ("A", "B"),
                ("B", "A"),
                ("B", "C"),
                ("C", "B"),
                ("C", "A"),
                ("A", "C"),
                ("C", "D"),
                ("D", "C"),
                ("D", "E"),
                ("E", "D"),
                ("E", "F"),
                ("F", "E"),
                ("F", "D"),
                ("D", "F"),
            ],
        );
        let scores = edge_betweenness(&bridged);
        let bridge_forward = scores[6];
        let bridge_backward = scores[7];
        let max_other = scores
            .iter()
            .enumerate()
            .filter(|(position, _)| *position != 6 && *position != 7)
            .map(|(_, score)| *score)
            .fold(0.0_f64, f64::max);
        assert!(bridge_forward > max_other);
        assert!(bridge_backward > max_other);
    }

    #[test]
    fn mean_betweenness_of_empty_network_is_zero() {
        let empty = network(&[], &[]);
        assert_eq!(mean_edge_betweenness(&empty), 0.0);
    }
}
