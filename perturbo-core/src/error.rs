//! Error types for the perturbo core library.
//!
//! Defines the error enums exposed by the public API, stable machine-readable
//! codes for each variant, and a convenient result alias.

use std::{fmt, sync::Arc};

use thiserror::Error;

macro_rules! define_error_codes {
    (
        $(#[$enum_meta:meta])*
        enum $CodeTy:ident for $ErrTy:ident {
            $(
                $(#[$variant_meta:meta])*
                $CodeVariant:ident => $ErrVariant:ident $( { $($pattern:tt)* } )? => $code:expr
            ),+ $(,)?
        }
    ) => {
        $(#[$enum_meta])*
        #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
        #[non_exhaustive]
        pub enum $CodeTy {
            $(
                $(#[$variant_meta])*
                $CodeVariant,
            )+
        }

        impl $CodeTy {
            /// Return the stable machine-readable representation of this error code.
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$CodeVariant => $code,)+
                }
            }
        }

        impl fmt::Display for $CodeTy {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl $ErrTy {
            /// Retrieve the stable code for this error.
            pub const fn code(&self) -> $CodeTy {
                match self {
                    $(Self::$ErrVariant $( { $($pattern)* } )? => $CodeTy::$CodeVariant,)+
                }
            }
        }
    };
}

/// An error produced by an [`crate::EquilibriumEvaluator`] or
/// [`crate::RouteCoupling`] collaborator.
#[non_exhaustive]
#[derive(Clone, Debug, Error, PartialEq)]
pub enum EvaluatorError {
    /// A demand pair or edge referenced a node the network does not contain.
    #[error("node `{name}` is not part of the network")]
    UnknownNode {
        /// Name of the missing node.
        name: Arc<str>,
    },
    /// No directed route exists between a demand pair's endpoints.
    #[error("no route from `{origin}` to `{destination}`")]
    NoRoute {
        /// Origin of the unroutable demand pair.
        origin: Arc<str>,
        /// Destination of the unroutable demand pair.
        destination: Arc<str>,
    },
    /// An edge's cost model produced a non-finite value.
    #[error("edge `{edge}` produced a non-finite cost")]
    NonFiniteCost {
        /// Name of the offending edge.
        edge: Arc<str>,
    },
}

define_error_codes! {
    /// Stable codes describing [`EvaluatorError`] variants.
    enum EvaluatorErrorCode for EvaluatorError {
        /// A demand pair or edge referenced a node the network does not contain.
        UnknownNode => UnknownNode { .. } => "EVALUATOR_UNKNOWN_NODE",
        /// No directed route exists between a demand pair's endpoints.
        NoRoute => NoRoute { .. } => "EVALUATOR_NO_ROUTE",
        /// An edge's cost model produced a non-finite value.
        NonFiniteCost => NonFiniteCost { .. } => "EVALUATOR_NON_FINITE_COST",
    }
}

/// The bounded random search that ran out of attempts.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum RetrySearch {
    /// Drawing candidate endpoint pairs for a rewiring.
    RewireEndpoints,
    /// Drawing removable edges.
    RemoveEdge,
}

impl fmt::Display for RetrySearch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RewireEndpoints => f.write_str("rewire endpoint draw"),
            Self::RemoveEdge => f.write_str("removable edge draw"),
        }
    }
}

/// Error type produced while configuring or running a disturbance sequence.
#[non_exhaustive]
#[derive(Clone, Debug, Error, PartialEq)]
pub enum PerturboError {
    /// The retry budget must be at least one.
    #[error("max_retries must be at least 1 (got {got})")]
    InvalidRetryBudget {
        /// The invalid retry budget supplied by the caller.
        got: usize,
    },
    /// The evaluator iteration budget must be at least one.
    #[error("episodes must be at least 1 (got {got})")]
    InvalidEpisodes {
        /// The invalid iteration budget supplied by the caller.
        got: usize,
    },
    /// A targeted operation named an edge the network does not contain.
    #[error("edge `{name}` is not part of the network")]
    UnknownEdge {
        /// Name of the missing edge.
        name: Arc<str>,
    },
    /// The network has no edges to perturb.
    #[error("the network has no edges to perturb")]
    NoEdges,
    /// Every edge is protected, so a random draw has no eligible candidate.
    #[error("all {edges} edges are protected ({protected} shielded); nothing can be perturbed")]
    AllEdgesProtected {
        /// Number of shielded edges.
        protected: usize,
        /// Total number of edges in the network.
        edges: usize,
    },
    /// A targeted removal would leave the network disconnected.
    #[error("removing edge `{edge}` ({start} -> {end}) disconnects the network")]
    RemovalDisconnects {
        /// Name of the edge whose removal was requested.
        edge: Arc<str>,
        /// Start node of the edge.
        start: Arc<str>,
        /// End node of the edge.
        end: Arc<str>,
    },
    /// A bounded random search failed to find a valid candidate.
    #[error("{search} found no valid candidate within {attempts} attempts")]
    RetryExhausted {
        /// Which search ran out of attempts.
        search: RetrySearch,
        /// Number of attempts performed before giving up.
        attempts: usize,
    },
    /// The system-optimal cost is non-positive, so the price of anarchy is
    /// undefined.
    #[error("system-optimal cost {so_cost} is not positive; price of anarchy is undefined")]
    DegenerateOptimum {
        /// The degenerate system-optimal cost reported by the evaluator.
        so_cost: f64,
    },
    /// An equilibrium evaluation failed.
    #[error("equilibrium evaluation failed: {source}")]
    Evaluator {
        /// Underlying collaborator error.
        #[source]
        source: EvaluatorError,
    },
}

define_error_codes! {
    /// Stable codes describing [`PerturboError`] variants.
    enum PerturboErrorCode for PerturboError {
        /// The retry budget must be at least one.
        InvalidRetryBudget => InvalidRetryBudget { .. } => "PERTURBO_INVALID_RETRY_BUDGET",
        /// The evaluator iteration budget must be at least one.
        InvalidEpisodes => InvalidEpisodes { .. } => "PERTURBO_INVALID_EPISODES",
        /// A targeted operation named an edge the network does not contain.
        UnknownEdge => UnknownEdge { .. } => "PERTURBO_UNKNOWN_EDGE",
        /// The network has no edges to perturb.
        NoEdges => NoEdges => "PERTURBO_NO_EDGES",
        /// Every edge is protected, so a random draw has no eligible candidate.
        AllEdgesProtected => AllEdgesProtected { .. } => "PERTURBO_ALL_EDGES_PROTECTED",
        /// A targeted removal would leave the network disconnected.
        RemovalDisconnects => RemovalDisconnects { .. } => "PERTURBO_REMOVAL_DISCONNECTS",
        /// A bounded random search failed to find a valid candidate.
        RetryExhausted => RetryExhausted { .. } => "PERTURBO_RETRY_EXHAUSTED",
        /// The system-optimal cost is non-positive.
        DegenerateOptimum => DegenerateOptimum { .. } => "PERTURBO_DEGENERATE_OPTIMUM",
        /// An equilibrium evaluation failed.
        EvaluatorFailure => Evaluator { .. } => "PERTURBO_EVALUATOR_FAILURE",
    }
}

impl PerturboError {
    /// Retrieve the inner [`EvaluatorErrorCode`] when the error originated in
    /// an evaluation collaborator.
    #[must_use]
    pub const fn evaluator_code(&self) -> Option<EvaluatorErrorCode> {
        match self {
            Self::Evaluator { source } => Some(source.code()),
            _ => None,
        }
    }
}

/// Convenient alias for results returned by the core API.
pub type Result<T> = core::result::Result<T, PerturboError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable_strings() {
        let err = PerturboError::RetryExhausted {
            search: RetrySearch::RewireEndpoints,
            attempts: 40,
        };
        assert_eq!(err.code().as_str(), "PERTURBO_RETRY_EXHAUSTED");

        let err = EvaluatorError::NoRoute {
            origin: Arc::from("A"),
            destination: Arc::from("C"),
        };
        assert_eq!(err.code().as_str(), "EVALUATOR_NO_ROUTE");
    }

    #[test]
    fn evaluator_code_is_exposed_through_the_wrapper() {
        let err = PerturboError::Evaluator {
            source: EvaluatorError::UnknownNode {
                name: Arc::from("Z"),
            },
        };
        assert_eq!(
            err.evaluator_code(),
            Some(EvaluatorErrorCode::UnknownNode)
        );
        assert_eq!(
            PerturboError::NoEdges.evaluator_code(),
            None
        );
    }
}
