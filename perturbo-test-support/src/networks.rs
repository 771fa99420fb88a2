//! Canonical networks used by unit, integration, and bench code.

use perturbo_core::{CostFunction, Edge, Network, Node, OdMatrix, OdPair};
use rand::{Rng, SeedableRng, rngs::SmallRng};

/// A directed cycle `n0 -> n1 -> ... -> n0` with constant unit costs.
///
/// Minimally strongly connected: removing any edge disconnects it.
#[must_use]
pub fn directed_cycle(n: usize) -> Network {
    let nodes: Vec<Node> = (0..n).map(|i| Node::new(format!("n{i}"))).collect();
    let edges: Vec<Edge> = (0..n)
        .map(|i| {
            Edge::new(
                format!("e{i}"),
                format!("n{i}"),
                format!("n{}", (i + 1) % n),
                CostFunction::Constant(1.0),
            )
        })
        .collect();
    Network::new("cycle", nodes, edges, OdMatrix::new())
}

/// The three-node scenario network: `A <-> B <-> C` with demand `A -> C` and
/// `C -> A`.
///
/// Strongly connected through the single chain, with exactly one route per
/// demand pair.
#[must_use]
pub fn two_route_demo() -> Network {
    let nodes = ["A", "B", "C"].iter().copied().map(Node::new).collect();
    let arcs = [("AB", "A", "B"), ("BA", "B", "A"), ("BC", "B", "C"), ("CB", "C", "B")];
    let edges = arcs
        .iter()
        .map(|(name, start, end)| {
            Edge::new(
                *name,
                *start,
                *end,
                CostFunction::Linear {
                    free: 1.0,
                    slope: 1.0,
                },
            )
        })
        .collect();
    let mut od = OdMatrix::new();
    od.insert(OdPair::new("A", "C"), 2.0);
    od.insert(OdPair::new("C", "A"), 2.0);
    Network::new("demo", nodes, edges, od)
}

/// Braess's paradox instance with unit demand `s -> t`.
///
/// The zero-cost shortcut `a -> b` pulls the whole demand onto the middle
/// route at user equilibrium (per-traveller cost 2), while the system
/// optimum spreads flow across the outer routes. Not strongly connected;
/// intended for evaluator tests, not for perturbation.
#[must_use]
pub fn braess() -> Network {
    let nodes = ["s", "a", "b", "t"].iter().copied().map(Node::new).collect();
    let congested = || CostFunction::Linear {
        free: 0.0,
        slope: 1.0,
    };
    let edges = vec![
        Edge::new("sa", "s", "a", congested()),
        Edge::new("at", "a", "t", CostFunction::Constant(1.1)),
        Edge::new("sb", "s", "b", CostFunction::Constant(1.1)),
        Edge::new("bt", "b", "t", congested()),
        Edge::new("ab", "a", "b", CostFunction::Constant(0.0)),
    ];
    let mut od = OdMatrix::new();
    od.insert(OdPair::new("s", "t"), 1.0);
    Network::new("braess", nodes, edges, od)
}

/// A random strongly connected network: a ring backbone over `nodes` nodes
/// plus `extra_edges` random chords, linear costs, and a demand pair across
/// the ring.
///
/// The ring guarantees strong connectivity regardless of the chords drawn.
#[must_use]
pub fn random_connected(nodes: usize, extra_edges: usize, seed: u64) -> Network {
    assert!(nodes >= 3, "a ring needs at least three nodes");
    let mut rng = SmallRng::seed_from_u64(seed);

    let node_list: Vec<Node> = (0..nodes).map(|i| Node::new(format!("n{i}"))).collect();
    let mut edges: Vec<Edge> = (0..nodes)
        .map(|i| {
            Edge::new(
                format!("ring{i}"),
                format!("n{i}"),
                format!("n{}", (i + 1) % nodes),
                CostFunction::Linear {
                    free: 1.0,
                    slope: 0.5,
                },
            )
        })
        .collect();
    for chord in 0..extra_edges {
        let start = rng.gen_range(0..nodes);
        let mut end = rng.gen_range(0..nodes);
        if end == start {
            end = (end + 1) % nodes;
        }
        edges.push(Edge::new(
            format!("chord{chord}"),
            format!("n{start}"),
            format!("n{end}"),
            CostFunction::Linear {
                free: 1.0 + rng.gen_range(0.0..2.0),
                slope: 0.25,
            },
        ));
    }

    let mut od = OdMatrix::new();
    od.insert(
        OdPair::new("n0", format!("n{}", nodes / 2)),
        4.0,
    );
    od.insert(
        OdPair::new(format!("n{}", nodes / 2), "n0"),
        4.0,
    );
    Network::new("random", node_list, edges, od)
}
