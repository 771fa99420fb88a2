//! The stochastic edge-perturbation engine.
//!
//! One invocation produces exactly one structural change (a rewired or
//! removed edge) that keeps the network strongly connected and keeps
//! structural edges from colliding with demand relations. Candidate draws are
//! random but bounded: every retry loop carries an attempt budget and
//! surfaces [`PerturboError::RetryExhausted`] instead of spinning.

use std::sync::Arc;

use rand::{Rng, SeedableRng, rngs::SmallRng};
use tracing::{debug, instrument};

use crate::error::{PerturboError, Result, RetrySearch};
use crate::network::Network;
use crate::ranking::ProtectedSet;
use crate::topology::ConnectivityOracle;

/// How the engine selects and applies its one structural change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PerturbationMode {
    /// Remove the named edge unconditionally. Disconnecting the network this
    /// way is a fatal invariant violation, not a retried draw.
    RemoveNamed {
        /// Name of the edge to remove.
        edge: String,
    },
    /// Remove a uniformly drawn unprotected edge whose removal keeps the
    /// network connected.
    RemoveRandom,
    /// Rewire one edge to freshly drawn endpoints. The default mode.
    Rewire {
        /// Name of the edge to rewire, or `None` to draw a random
        /// unprotected edge.
        target: Option<String>,
        /// Whether the structural reverse of the rewired edge (if present)
        /// moves in lockstep to the reversed endpoints, preserving
        /// bidirectional pairs.
        complementary: bool,
    },
}

impl Default for PerturbationMode {
    fn default() -> Self {
        Self::Rewire {
            target: None,
            complementary: false,
        }
    }
}

/// A committed structural change, convertible into the changelog token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// An edge was removed.
    Removed {
        /// Name of the removed edge.
        edge: String,
        /// Start node of the removed edge.
        start: String,
        /// End node of the removed edge.
        end: String,
    },
    /// An edge was rewired to new endpoints.
    Rewired {
        /// Name of the rewired edge.
        edge: String,
        /// New start node.
        start: String,
        /// New end node.
        end: String,
        /// Name of the complementary edge rewired in lockstep, if any.
        complement: Option<String>,
    },
}

impl Change {
    /// Renders the changelog token: `"<start>-<end>"` for a removal,
    /// `"<edge>_<new-start>-<new-end>"` for a rewiring.
    ///
    /// # Examples
    /// ```
    /// use perturbo_core::Change;
    ///
    /// let change = Change::Rewired {
    ///     edge: "AB".into(),
    ///     start: "C".into(),
    ///     end: "D".into(),
    ///     complement: None,
    /// };
    /// assert_eq!(change.token(), "AB_C-D");
    /// ```
    #[must_use]
    pub fn token(&self) -> String {
        match self {
            Self::Removed { start, end, .. } => format!("{start}-{end}"),
            Self::Rewired {
                edge, start, end, ..
            } => format!("{edge}_{start}-{end}"),
        }
    }
}

/// Mutates a network by exactly one structural change per invocation while
/// preserving connectivity and demand-compatibility invariants.
///
/// Every exit path leaves the edge collection strongly connected; a failed
/// candidate leaves the network exactly as it was before the attempt.
#[derive(Debug)]
pub struct PerturbationEngine<C> {
    oracle: C,
    rng: SmallRng,
    max_retries: usize,
}

impl<C: ConnectivityOracle> PerturbationEngine<C> {
    /// Creates an engine with an entropy-seeded RNG.
    ///
    /// # Errors
    /// Returns [`PerturboError::InvalidRetryBudget`] when `max_retries` is
    /// zero.
    pub fn new(oracle: C, max_retries: usize) -> Result<Self> {
        Self::with_rng(oracle, SmallRng::from_entropy(), max_retries)
    }

    /// Creates an engine with a deterministic RNG seed, for reproducible
    /// experiments.
    ///
    /// # Errors
    /// Returns [`PerturboError::InvalidRetryBudget`] when `max_retries` is
    /// zero.
    pub fn seeded(oracle: C, seed: u64, max_retries: usize) -> Result<Self> {
        Self::with_rng(oracle, SmallRng::seed_from_u64(seed), max_retries)
    }

    fn with_rng(oracle: C, rng: SmallRng, max_retries: usize) -> Result<Self> {
        if max_retries == 0 {
            return Err(PerturboError::InvalidRetryBudget { got: 0 });
        }
        Ok(Self {
            oracle,
            rng,
            max_retries,
        })
    }

    /// Applies one structural change to `network` according to `mode`.
    ///
    /// Random draws never select edges shielded by `protected`; targeted
    /// operations ignore the shield because the caller named the edge
    /// explicitly.
    ///
    /// # Errors
    /// - [`PerturboError::UnknownEdge`] when a targeted mode names a missing
    ///   edge.
    /// - [`PerturboError::RemovalDisconnects`] when a targeted removal would
    ///   break strong connectivity.
    /// - [`PerturboError::NoEdges`] / [`PerturboError::AllEdgesProtected`]
    ///   when a random draw has no eligible candidate.
    /// - [`PerturboError::RetryExhausted`] when the bounded candidate search
    ///   runs out of attempts.
    #[instrument(
        name = "engine.perturb",
        err,
        skip(self, network, protected),
        fields(mode = ?mode, edges = network.edge_count(), shielded = protected.len()),
    )]
    pub fn perturb(
        &mut self,
        network: &mut Network,
        protected: &ProtectedSet,
        mode: &PerturbationMode,
    ) -> Result<Change> {
        match mode {
            PerturbationMode::RemoveNamed { edge } => self.remove_named(network, edge),
            PerturbationMode::RemoveRandom => self.remove_random(network, protected),
            PerturbationMode::Rewire {
                target,
                complementary,
            } => self.rewire(network, protected, target.as_deref(), *complementary),
        }
    }

    fn remove_named(&mut self, network: &mut Network, name: &str) -> Result<Change> {
        let position = network
            .edge_index(name)
            .ok_or_else(|| PerturboError::UnknownEdge {
                name: Arc::from(name),
            })?;

        let edge = network.remove_edge(position);
        if !self.oracle.is_strongly_connected(network) {
            let err = PerturboError::RemovalDisconnects {
                edge: Arc::from(edge.name()),
                start: Arc::from(edge.start()),
                end: Arc::from(edge.end()),
            };
            network.restore_edge(position, edge);
            return Err(err);
        }

        let change = Change::Removed {
            edge: edge.name().to_owned(),
            start: edge.start().to_owned(),
            end: edge.end().to_owned(),
        };
        debug!(token = %change.token(), "removed edge");
        Ok(change)
    }

    fn remove_random(&mut self, network: &mut Network, protected: &ProtectedSet) -> Result<Change> {
        let eligible = self.eligible_positions(network, protected)?;

        for _ in 0..self.max_retries {
            let position = eligible[self.rng.gen_range(0..eligible.len())];
            let edge = network.remove_edge(position);
            if self.oracle.is_strongly_connected(network) {
                let change = Change::Removed {
                    edge: edge.name().to_owned(),
                    start: edge.start().to_owned(),
                    end: edge.end().to_owned(),
                };
                debug!(token = %change.token(), "removed edge");
                return Ok(change);
            }
            network.restore_edge(position, edge);
        }

        Err(PerturboError::RetryExhausted {
            search: RetrySearch::RemoveEdge,
            attempts: self.max_retries,
        })
    }

    fn rewire(
        &mut self,
        network: &mut Network,
        protected: &ProtectedSet,
        target: Option<&str>,
        complementary: bool,
    ) -> Result<Change> {
        let position = match target {
            Some(name) => network
                .edge_index(name)
                .ok_or_else(|| PerturboError::UnknownEdge {
                    name: Arc::from(name),
                })?,
            None => {
                let eligible = self.eligible_positions(network, protected)?;
                eligible[self.rng.gen_range(0..eligible.len())]
            }
        };

        let complement = if complementary {
            network.complement_index(position)
        } else {
            None
        };

        let edge_name = network.edges()[position].name().to_owned();
        let old_start = network.edges()[position].start().to_owned();
        let old_end = network.edges()[position].end().to_owned();
        let complement_name =
            complement.map(|other| network.edges()[other].name().to_owned());

        let node_names: Vec<String> = network
            .nodes()
            .iter()
            .map(|node| node.name().to_owned())
            .collect();
        if node_names.len() < 2 {
            return Err(PerturboError::RetryExhausted {
                search: RetrySearch::RewireEndpoints,
                attempts: 0,
            });
        }

        for _ in 0..self.max_retries {
            let start = &node_names[self.rng.gen_range(0..node_names.len())];
            let end = &node_names[self.rng.gen_range(0..node_names.len())];
            if start == end || network.od().contains(start, end) {
                continue;
            }
            // The reversed endpoints assigned to the complement must clear
            // the demand matrix too.
            if complement.is_some() && network.od().contains(end, start) {
                continue;
            }

            network.set_edge_endpoints(position, start, end);
            if let Some(other) = complement {
                network.set_edge_endpoints(other, end, start);
            }

            if self.oracle.is_strongly_connected(network) {
                let change = Change::Rewired {
                    edge: edge_name,
                    start: start.clone(),
                    end: end.clone(),
                    complement: complement_name,
                };
                debug!(token = %change.token(), "rewired edge");
                return Ok(change);
            }

            network.set_edge_endpoints(position, &old_start, &old_end);
            if let Some(other) = complement {
                network.set_edge_endpoints(other, &old_end, &old_start);
            }
        }

        Err(PerturboError::RetryExhausted {
            search: RetrySearch::RewireEndpoints,
            attempts: self.max_retries,
        })
    }

    /// Positions of edges a random draw may select: everything outside the
    /// protected set.
    fn eligible_positions(
        &self,
        network: &Network,
        protected: &ProtectedSet,
    ) -> Result<Vec<usize>> {
        if network.edge_count() == 0 {
            return Err(PerturboError::NoEdges);
        }
        let eligible: Vec<usize> = network
            .edges()
            .iter()
            .enumerate()
            .filter(|(_, edge)| !protected.contains(edge.name()))
            .map(|(position, _)| position)
            .collect();
        if eligible.is_empty() {
            return Err(PerturboError::AllEdgesProtected {
                protected: protected.len(),
                edges: network.edge_count(),
            });
        }
        Ok(eligible)
    }
}
