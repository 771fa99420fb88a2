//! Network data model: nodes, directed edges, travel-cost functions, and the
//! origin-destination demand matrix.
//!
//! The collections here are plain data plus small invariant-preserving
//! mutators. Structural mutation (rewiring, removal) lives in
//! [`crate::PerturbationEngine`]; flow and cost population is the job of an
//! [`crate::EquilibriumEvaluator`] implementation.

use std::collections::BTreeMap;
use std::fmt;

/// Separator used when rendering an [`OdPair`] as a demand-matrix key.
pub const OD_KEY_SEPARATOR: char = '|';

/// A network vertex. Identity only: two nodes are the same node exactly when
/// their names are equal.
///
/// # Examples
/// ```
/// use perturbo_core::Node;
///
/// let node = Node::new("A");
/// assert_eq!(node.name(), "A");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Node {
    name: String,
}

impl Node {
    /// Creates a node with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Returns the node name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Travel-cost model attached to an edge.
///
/// Costs depend on the current flow and are recomputable on demand. The
/// marginal form (`cost(f) + f * cost'(f)`) is what a system-optimal
/// assignment routes on.
///
/// # Examples
/// ```
/// use perturbo_core::CostFunction;
///
/// let latency = CostFunction::Linear { free: 5.0, slope: 2.0 };
/// assert_eq!(latency.evaluate(3.0), 11.0);
/// assert_eq!(latency.marginal(3.0), 17.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum CostFunction {
    /// Flow-independent cost.
    Constant(f64),
    /// Affine cost `free + slope * flow`.
    Linear {
        /// Cost at zero flow.
        free: f64,
        /// Cost increase per unit of flow.
        slope: f64,
    },
    /// BPR-style polynomial `free * (1 + alpha * (flow / capacity)^beta)`.
    Bpr {
        /// Free-flow travel cost.
        free: f64,
        /// Practical capacity of the link.
        capacity: f64,
        /// Congestion scaling factor.
        alpha: f64,
        /// Congestion exponent.
        beta: f64,
    },
}

impl CostFunction {
    /// Evaluates the travel cost at the given flow.
    #[must_use]
    pub fn evaluate(&self, flow: f64) -> f64 {
        match *self {
            Self::Constant(cost) => cost,
            Self::Linear { free, slope } => free + slope * flow,
            Self::Bpr {
                free,
                capacity,
                alpha,
                beta,
            } => free * (1.0 + alpha * (flow / capacity).powf(beta)),
        }
    }

    /// Evaluates the marginal social cost `cost(f) + f * cost'(f)` at the
    /// given flow.
    #[must_use]
    pub fn marginal(&self, flow: f64) -> f64 {
        let derivative = match *self {
            Self::Constant(_) => 0.0,
            Self::Linear { slope, .. } => slope,
            Self::Bpr {
                free,
                capacity,
                alpha,
                beta,
            } => free * alpha * beta * (flow / capacity).powf(beta - 1.0) / capacity,
        };
        self.evaluate(flow) + flow * derivative
    }
}

/// A directed arc between two named nodes.
///
/// `flow` is the mutable load placed on the edge by the most recent
/// evaluation; `cost` is the travel cost at that flow. Both are stale after a
/// structural change until the next evaluation round.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    name: String,
    start: String,
    end: String,
    flow: f64,
    cost: f64,
    function: CostFunction,
}

impl Edge {
    /// Creates an edge with zero flow and the cost evaluated at zero flow.
    ///
    /// # Examples
    /// ```
    /// use perturbo_core::{CostFunction, Edge};
    ///
    /// let edge = Edge::new("AB", "A", "B", CostFunction::Linear { free: 2.0, slope: 1.0 });
    /// assert_eq!(edge.start(), "A");
    /// assert_eq!(edge.end(), "B");
    /// assert_eq!(edge.flow(), 0.0);
    /// assert_eq!(edge.cost(), 2.0);
    /// ```
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        start: impl Into<String>,
        end: impl Into<String>,
        function: CostFunction,
    ) -> Self {
        let cost = function.evaluate(0.0);
        Self {
            name: name.into(),
            start: start.into(),
            end: end.into(),
            flow: 0.0,
            cost,
            function,
        }
    }

    /// Returns the edge identifier.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the name of the node this edge leaves.
    #[must_use]
    pub fn start(&self) -> &str {
        &self.start
    }

    /// Returns the name of the node this edge enters.
    #[must_use]
    pub fn end(&self) -> &str {
        &self.end
    }

    /// Returns the current flow on the edge.
    #[must_use]
    pub fn flow(&self) -> f64 {
        self.flow
    }

    /// Returns the travel cost at the most recently computed flow.
    #[must_use]
    pub fn cost(&self) -> f64 {
        self.cost
    }

    /// Returns the cost model attached to this edge.
    #[must_use]
    pub fn function(&self) -> &CostFunction {
        &self.function
    }

    /// Sets the flow without touching the cached cost. Callers performing an
    /// assignment sweep update many flows and then call
    /// [`Edge::recompute_cost`] once per edge.
    pub fn set_flow(&mut self, flow: f64) {
        self.flow = flow;
    }

    /// Recomputes the cached cost from the current flow.
    pub fn recompute_cost(&mut self) {
        self.cost = self.function.evaluate(self.flow);
    }

    /// Zeroes the flow and recomputes the cost at zero flow.
    pub fn reset(&mut self) {
        self.flow = 0.0;
        self.recompute_cost();
    }

    pub(crate) fn set_endpoints(&mut self, start: impl Into<String>, end: impl Into<String>) {
        self.start = start.into();
        self.end = end.into();
    }
}

/// An ordered origin-destination pair.
///
/// The textual key concatenates origin and destination with
/// [`OD_KEY_SEPARATOR`], matching the demand-matrix key format used in
/// network definition files.
///
/// # Examples
/// ```
/// use perturbo_core::OdPair;
///
/// let pair = OdPair::new("A", "C");
/// assert_eq!(pair.key(), "A|C");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OdPair {
    origin: String,
    destination: String,
}

impl OdPair {
    /// Creates an ordered pair from origin and destination names.
    #[must_use]
    pub fn new(origin: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            destination: destination.into(),
        }
    }

    /// Returns the origin node name.
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Returns the destination node name.
    #[must_use]
    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Renders the demand-matrix key for this pair.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}{}{}", self.origin, OD_KEY_SEPARATOR, self.destination)
    }
}

impl fmt::Display for OdPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.origin, OD_KEY_SEPARATOR, self.destination)
    }
}

/// Travel demand between ordered node pairs. Immutable for the duration of a
/// disturbance run.
///
/// # Examples
/// ```
/// use perturbo_core::{OdMatrix, OdPair};
///
/// let mut od = OdMatrix::new();
/// od.insert(OdPair::new("A", "C"), 120.0);
/// assert!(od.contains("A", "C"));
/// assert!(!od.contains("C", "A"));
/// assert_eq!(od.demand(&OdPair::new("A", "C")), Some(120.0));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OdMatrix {
    demands: BTreeMap<OdPair, f64>,
}

impl OdMatrix {
    /// Creates an empty demand matrix.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts (or replaces) the demand for a pair.
    pub fn insert(&mut self, pair: OdPair, demand: f64) {
        self.demands.insert(pair, demand);
    }

    /// Returns the demand registered for the pair, if any.
    #[must_use]
    pub fn demand(&self, pair: &OdPair) -> Option<f64> {
        self.demands.get(pair).copied()
    }

    /// Returns whether the ordered `(origin, destination)` pair is a demand
    /// key. Rewiring consults this to keep structural edges from colliding
    /// with demand relations.
    #[must_use]
    pub fn contains(&self, origin: &str, destination: &str) -> bool {
        self.demands
            .keys()
            .any(|pair| pair.origin == origin && pair.destination == destination)
    }

    /// Iterates over pairs and demands in key order.
    pub fn pairs(&self) -> impl Iterator<Item = (&OdPair, f64)> {
        self.demands.iter().map(|(pair, demand)| (pair, *demand))
    }

    /// Returns the number of registered pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.demands.len()
    }

    /// Returns whether the matrix holds no pairs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.demands.is_empty()
    }
}

/// The directed multigraph under study, together with its demand matrix.
///
/// The node and edge collections are constructed once from the input network
/// and mutated in place by the perturbation engine; the demand matrix never
/// changes during a run.
///
/// # Examples
/// ```
/// use perturbo_core::{CostFunction, Edge, Network, Node, OdMatrix};
///
/// let network = Network::new(
///     "demo",
///     vec![Node::new("A"), Node::new("B")],
///     vec![
///         Edge::new("AB", "A", "B", CostFunction::Constant(1.0)),
///         Edge::new("BA", "B", "A", CostFunction::Constant(1.0)),
///     ],
///     OdMatrix::new(),
/// );
/// assert_eq!(network.edge_count(), 2);
/// assert_eq!(network.complement_index(0), Some(1));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Network {
    name: String,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    od: OdMatrix,
}

impl Network {
    /// Assembles a network from its parts.
    #[must_use]
    pub fn new(name: impl Into<String>, nodes: Vec<Node>, edges: Vec<Edge>, od: OdMatrix) -> Self {
        Self {
            name: name.into(),
            nodes,
            edges,
            od,
        }
    }

    /// Returns the base network name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the node collection.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Returns the edge collection.
    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Returns the edge collection mutably. Evaluator implementations use
    /// this to write flows and costs back onto the network.
    pub fn edges_mut(&mut self) -> &mut [Edge] {
        &mut self.edges
    }

    /// Returns the demand matrix.
    #[must_use]
    pub fn od(&self) -> &OdMatrix {
        &self.od
    }

    /// Returns the number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Zeroes every edge's flow and recomputes its cost, discarding any
    /// flow-derived state from the previous evaluation round.
    pub fn reset_assignment(&mut self) {
        for edge in &mut self.edges {
            edge.reset();
        }
    }

    /// Finds the position of the edge with the given name.
    #[must_use]
    pub fn edge_index(&self, name: &str) -> Option<usize> {
        self.edges.iter().position(|edge| edge.name() == name)
    }

    /// Finds the structural reverse of the edge at `index`: the first other
    /// edge spanning the same endpoints in the opposite direction.
    #[must_use]
    pub fn complement_index(&self, index: usize) -> Option<usize> {
        let edge = self.edges.get(index)?;
        self.edges.iter().position(|candidate| {
            candidate.start() == edge.end() && candidate.end() == edge.start()
        })
    }

    pub(crate) fn remove_edge(&mut self, index: usize) -> Edge {
        self.edges.remove(index)
    }

    pub(crate) fn restore_edge(&mut self, index: usize, edge: Edge) {
        self.edges.insert(index, edge);
    }

    pub(crate) fn set_edge_endpoints(&mut self, index: usize, start: &str, end: &str) {
        self.edges[index].set_endpoints(start, end);
    }
}
