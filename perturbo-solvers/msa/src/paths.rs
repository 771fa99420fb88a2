//! Routing plumbing shared by the assignment loop and the route-coupling
//! computation: a positional node/edge index, Dijkstra, and Yen's loopless
//! k-cheapest-path enumeration.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};
use std::sync::Arc;

use perturbo_core::{EvaluatorError, Network};

/// Positional view of a network's nodes and edges.
///
/// Built once per assignment; the edge set never changes while flows are
/// being averaged, so positions stay valid for the whole sweep.
#[derive(Debug)]
pub(crate) struct Router {
    node_count: usize,
    edge_count: usize,
    index: BTreeMap<String, usize>,
    /// `(start, end)` node positions per edge position.
    ends: Vec<(usize, usize)>,
    /// Outgoing edge positions per node position.
    outgoing: Vec<Vec<usize>>,
}

impl Router {
    pub(crate) fn new(network: &Network) -> Result<Self, EvaluatorError> {
        let index: BTreeMap<String, usize> = network
            .nodes()
            .iter()
            .enumerate()
            .map(|(position, node)| (node.name().to_owned(), position))
            .collect();

        let node_count = index.len();
        let mut ends = Vec::with_capacity(network.edge_count());
        let mut outgoing = vec![Vec::new(); node_count];
        for (position, edge) in network.edges().iter().enumerate() {
            let start = *index
                .get(edge.start())
                .ok_or_else(|| EvaluatorError::UnknownNode {
                    name: Arc::from(edge.start()),
                })?;
            let end = *index
                .get(edge.end())
                .ok_or_else(|| EvaluatorError::UnknownNode {
                    name: Arc::from(edge.end()),
                })?;
            ends.push((start, end));
            outgoing[start].push(position);
        }

        Ok(Self {
            node_count,
            edge_count: network.edge_count(),
            index,
            ends,
            outgoing,
        })
    }

    pub(crate) fn node(&self, name: &str) -> Result<usize, EvaluatorError> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| EvaluatorError::UnknownNode {
                name: Arc::from(name),
            })
    }

    pub(crate) fn edge_start(&self, edge: usize) -> usize {
        self.ends[edge].0
    }

    pub(crate) fn edge_end(&self, edge: usize) -> usize {
        self.ends[edge].1
    }

    /// Dijkstra over per-edge costs, honouring banned nodes and edges.
    /// Returns the total cost and the edge positions along the path.
    pub(crate) fn cheapest_path(
        &self,
        origin: usize,
        destination: usize,
        costs: &[f64],
        banned_nodes: &[bool],
        banned_edges: &[bool],
    ) -> Option<(f64, Vec<usize>)> {
        let mut distance = vec![f64::INFINITY; self.node_count];
        let mut predecessor = vec![usize::MAX; self.node_count];
        let mut heap = BinaryHeap::new();

        distance[origin] = 0.0;
        heap.push(QueueEntry {
            cost: 0.0,
            node: origin,
        });

        while let Some(QueueEntry { cost, node }) = heap.pop() {
            if cost > distance[node] {
                continue;
            }
            if node == destination {
                break;
            }
            for &edge in &self.outgoing[node] {
                if banned_edges[edge] {
                    continue;
                }
                let next = self.edge_end(edge);
                if banned_nodes[next] {
                    continue;
                }
                let next_cost = cost + costs[edge];
                if next_cost < distance[next] {
                    distance[next] = next_cost;
                    predecessor[next] = edge;
                    heap.push(QueueEntry {
                        cost: next_cost,
                        node: next,
                    });
                }
            }
        }

        if distance[destination].is_infinite() {
            return None;
        }

        let mut path = Vec::new();
        let mut node = destination;
        while node != origin {
            let edge = predecessor[node];
            path.push(edge);
            node = self.edge_start(edge);
        }
        path.reverse();
        Some((distance[destination], path))
    }

    /// Yen's algorithm: up to `k` loopless cheapest paths in ascending cost
    /// order. Returns fewer when the network does not offer `k` distinct
    /// routes, and an empty collection when the pair is unroutable.
    pub(crate) fn k_cheapest_paths(
        &self,
        origin: usize,
        destination: usize,
        k: usize,
        costs: &[f64],
    ) -> Vec<Vec<usize>> {
        let no_nodes = vec![false; self.node_count];
        let no_edges = vec![false; self.edge_count];
        let Some((_, first)) = self.cheapest_path(origin, destination, costs, &no_nodes, &no_edges)
        else {
            return Vec::new();
        };

        let mut accepted = vec![first];
        let mut candidates: Vec<(f64, Vec<usize>)> = Vec::new();

        while accepted.len() < k {
            let previous = accepted[accepted.len() - 1].clone();
            for spur_position in 0..previous.len() {
                let root = &previous[..spur_position];
                let spur_node = if spur_position == 0 {
                    origin
                } else {
                    self.edge_end(previous[spur_position - 1])
                };

                // Ban the deviating edges of every accepted path sharing this
                // root, and the root's interior nodes, to keep spurs loopless
                // and distinct.
                let mut banned_edges = vec![false; self.edge_count];
                for path in &accepted {
                    if path.len() > spur_position && path[..spur_position] == *root {
                        banned_edges[path[spur_position]] = true;
                    }
                }
                let mut banned_nodes = vec![false; self.node_count];
                let mut node = origin;
                for &edge in root {
                    banned_nodes[node] = true;
                    node = self.edge_end(edge);
                }

                if let Some((_, spur)) =
                    self.cheapest_path(spur_node, destination, costs, &banned_nodes, &banned_edges)
                {
                    let mut full = root.to_vec();
                    full.extend(spur);
                    if accepted.contains(&full)
                        || candidates.iter().any(|(_, path)| path == &full)
                    {
                        continue;
                    }
                    let total = full.iter().map(|&edge| costs[edge]).sum();
                    candidates.push((total, full));
                }
            }

            if candidates.is_empty() {
                break;
            }
            candidates.sort_by(|left, right| left.0.total_cmp(&right.0));
            let (_, best) = candidates.remove(0);
            accepted.push(best);
        }

        accepted
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct QueueEntry {
    cost: f64,
    node: usize,
}

impl Eq for QueueEntry {}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the max-heap pops the cheapest entry; ties resolve by
        // node position to keep traversal deterministic.
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
