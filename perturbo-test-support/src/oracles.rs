//! Deterministic connectivity-oracle doubles.

use perturbo_core::{ConnectivityOracle, Network};

/// An oracle with a fixed verdict, independent of the topology.
///
/// `FixedOracle(false)` makes every candidate mutation fail its connectivity
/// check, which is how atomicity and retry-exhaustion behaviour are pinned
/// down in tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedOracle(pub bool);

impl ConnectivityOracle for FixedOracle {
    fn is_strongly_connected(&self, _network: &Network) -> bool {
        self.0
    }
}
