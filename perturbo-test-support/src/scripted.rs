//! A scripted [`EquilibriumEvaluator`] double.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use perturbo_core::{EquilibriumEvaluator, Evaluation, EvaluatorError, Network};

/// One canned evaluation round.
#[derive(Debug, Clone)]
pub struct ScriptedRound {
    /// Flows written onto the network's edges by position. Shorter scripts
    /// leave trailing edges at zero flow.
    pub flows: Vec<f64>,
    /// Aggregate user-equilibrium cost to report.
    pub ue_cost: f64,
    /// Aggregate system-optimal cost to report.
    pub so_cost: f64,
}

/// Plays back a fixed sequence of evaluation rounds and counts invocations.
///
/// Lets orchestration tests steer the protected set (via the flows each
/// round writes) and the reported aggregates without a real solver.
#[derive(Debug, Default)]
pub struct ScriptedEvaluator {
    rounds: Mutex<VecDeque<ScriptedRound>>,
    calls: AtomicUsize,
}

impl ScriptedEvaluator {
    /// Creates an evaluator that plays back `rounds` in order.
    #[must_use]
    pub fn new(rounds: Vec<ScriptedRound>) -> Self {
        Self {
            rounds: Mutex::new(rounds.into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Returns how many times [`EquilibriumEvaluator::evaluate`] ran.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl EquilibriumEvaluator for ScriptedEvaluator {
    fn evaluate(
        &self,
        network: &mut Network,
        _episodes: usize,
    ) -> Result<Evaluation, EvaluatorError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let round = self
            .rounds
            .lock()
            .expect("lock poisoned")
            .pop_front()
            .expect("script exhausted: add more ScriptedRound entries");

        for (edge, flow) in network.edges_mut().iter_mut().zip(&round.flows) {
            edge.set_flow(*flow);
            edge.recompute_cost();
        }
        Ok(Evaluation::new(round.ue_cost, round.so_cost, Vec::new()))
    }
}
