//! Property tests for the perturbation invariants: strong connectivity,
//! demand non-collision, atomicity, and the ranking top-slice.

use proptest::prelude::*;

use perturbo_core::{
    Change, ConnectivityOracle, DepthFirstOracle, PerturbationEngine, PerturbationMode,
    PerturboError, ProtectedSet, protect_top_flows,
};
use perturbo_test_support::networks::random_connected;
use perturbo_test_support::oracles::FixedOracle;

proptest! {
    #[test]
    fn rewiring_preserves_every_structural_invariant(
        nodes in 4usize..12,
        extra in 0usize..12,
        seed in any::<u64>(),
        rounds in 1usize..5,
    ) {
        let mut network = random_connected(nodes, extra, seed);
        let mut engine = PerturbationEngine::seeded(
            DepthFirstOracle,
            seed.wrapping_add(1),
            5000,
        )
        .expect("budget is valid");

        for _ in 0..rounds {
            let change = engine
                .perturb(&mut network, &ProtectedSet::default(), &PerturbationMode::default())
                .expect("a ring-backed network is always rewireable");
            let Change::Rewired { start, end, .. } = change else {
                panic!("default mode rewires");
            };

            prop_assert_ne!(&start, &end);
            prop_assert!(!network.od().contains(&start, &end));
            prop_assert!(DepthFirstOracle.is_strongly_connected(&network));
        }
    }

    #[test]
    fn failed_candidates_leave_the_network_untouched(
        nodes in 4usize..10,
        extra in 0usize..8,
        seed in any::<u64>(),
    ) {
        let mut network = random_connected(nodes, extra, seed);
        let before = network.clone();
        let mut engine = PerturbationEngine::seeded(
            FixedOracle(false),
            seed.wrapping_add(2),
            30,
        )
        .expect("budget is valid");

        let err = engine
            .perturb(&mut network, &ProtectedSet::default(), &PerturbationMode::default())
            .expect_err("the rejecting oracle fails every candidate");
        let is_retry_exhausted = matches!(err, PerturboError::RetryExhausted { .. });
        prop_assert!(is_retry_exhausted);
        prop_assert_eq!(network, before);
    }

    #[test]
    fn ranking_returns_the_descending_top_slice(
        flows in proptest::collection::vec(0.0_f64..1000.0, 1..40),
        extra in 0usize..10,
    ) {
        let mut edges = Vec::new();
        for (position, flow) in flows.iter().enumerate() {
            let mut edge = perturbo_core::Edge::new(
                format!("e{position}"),
                format!("n{position}"),
                format!("n{}", position + 1),
                perturbo_core::CostFunction::Constant(1.0),
            );
            edge.set_flow(*flow);
            edges.push(edge);
        }

        let protected = protect_top_flows(&edges, extra);
        prop_assert_eq!(protected.len(), (extra + 1).min(edges.len()));

        let shielded_min = edges
            .iter()
            .filter(|edge| protected.contains(edge.name()))
            .map(|edge| edge.flow())
            .fold(f64::INFINITY, f64::min);
        for edge in &edges {
            if !protected.contains(edge.name()) {
                prop_assert!(edge.flow() <= shielded_min);
            }
        }
    }
}
