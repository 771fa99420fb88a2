//! Perturbo core library.
//!
//! Studies the sensitivity of traffic-network equilibrium to topology
//! changes: a baseline user-equilibrium / system-optimal evaluation, a
//! stochastic edge-rewiring engine constrained by strong connectivity and
//! demand compatibility, and the orchestration loop that alternates
//! perturbation with re-evaluation while accumulating a changelog.

mod disturbance;
mod engine;
mod error;
mod evaluator;
mod network;
mod ranking;
mod topology;

pub use crate::{
    disturbance::{
        CancelToken, Disturbance, DisturbanceBuilder, DisturbanceReport, EdgeFlowEntry,
        ReportDetail, RoundDetail, RoundReport,
    },
    engine::{Change, PerturbationEngine, PerturbationMode},
    error::{
        EvaluatorError, EvaluatorErrorCode, PerturboError, PerturboErrorCode, Result, RetrySearch,
    },
    evaluator::{CouplingReport, EquilibriumEvaluator, Evaluation, RouteCoupling, RouteFlow},
    network::{CostFunction, Edge, Network, Node, OD_KEY_SEPARATOR, OdMatrix, OdPair},
    ranking::{ProtectedSet, protect_top_flows},
    topology::{
        ConnectivityOracle, DepthFirstOracle, edge_betweenness, mean_edge_betweenness,
    },
};
