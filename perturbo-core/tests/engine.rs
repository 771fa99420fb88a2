//! Integration tests for the perturbation engine against realistic
//! topologies and oracle doubles.

use perturbo_core::{
    Change, PerturbationEngine, PerturbationMode, PerturboError, ProtectedSet, RetrySearch,
    DepthFirstOracle, ConnectivityOracle, protect_top_flows,
};
use perturbo_test_support::networks::{directed_cycle, random_connected};
use perturbo_test_support::oracles::FixedOracle;
use rstest::rstest;

#[test]
fn random_removal_commits_exactly_one_edge_and_stays_connected() {
    let mut network = random_connected(8, 12, 3);
    let edges_before = network.edge_count();
    let mut engine = PerturbationEngine::seeded(DepthFirstOracle, 5, 1000)
        .expect("budget is valid");

    let change = engine
        .perturb(
            &mut network,
            &ProtectedSet::default(),
            &PerturbationMode::RemoveRandom,
        )
        .expect("a chord-rich network has removable edges");

    assert!(matches!(change, Change::Removed { .. }));
    assert_eq!(network.edge_count(), edges_before - 1);
    assert!(DepthFirstOracle.is_strongly_connected(&network));
}

#[test]
fn random_draws_never_select_protected_edges() {
    let mut network = random_connected(8, 12, 17);
    // Make the first three ring edges the busiest so they end up shielded.
    for (position, edge) in network.edges_mut().iter_mut().enumerate() {
        edge.set_flow(if position < 3 { 100.0 - position as f64 } else { 1.0 });
    }
    let protected = protect_top_flows(network.edges(), 2);
    assert_eq!(protected.len(), 3);
    for name in ["ring0", "ring1", "ring2"] {
        assert!(protected.contains(name), "{name} should be shielded");
    }

    let mut engine = PerturbationEngine::seeded(DepthFirstOracle, 23, 2000)
        .expect("budget is valid");
    for _ in 0..25 {
        let change = engine
            .perturb(&mut network, &protected, &PerturbationMode::default())
            .expect("unprotected edges remain rewireable");
        let Change::Rewired { edge, .. } = &change else {
            panic!("default mode rewires, got {change:?}");
        };
        assert!(
            !protected.contains(edge),
            "protected edge `{edge}` was selected",
        );
    }
}

#[rstest]
#[case(PerturbationMode::default(), RetrySearch::RewireEndpoints)]
#[case(PerturbationMode::RemoveRandom, RetrySearch::RemoveEdge)]
fn rejecting_oracle_exhausts_the_budget_without_mutating(
    #[case] mode: PerturbationMode,
    #[case] search: RetrySearch,
) {
    let mut network = directed_cycle(6);
    let before = network.clone();
    let mut engine =
        PerturbationEngine::seeded(FixedOracle(false), 29, 40).expect("budget is valid");

    let err = engine
        .perturb(&mut network, &ProtectedSet::default(), &mode)
        .expect_err("every candidate fails the connectivity check");

    let PerturboError::RetryExhausted {
        search: reported,
        attempts,
    } = err
    else {
        panic!("expected RetryExhausted, got {err:?}");
    };
    assert_eq!(reported, search);
    assert_eq!(attempts, 40);
    // No partial mutation may be observable after the failed search.
    assert_eq!(network, before);
}

#[test]
fn accepting_oracle_is_not_consulted_beyond_one_candidate() {
    // With an always-true oracle the first structurally legal draw commits,
    // demonstrating the oracle seam is the only connectivity gate.
    let mut network = directed_cycle(5);
    let mut engine =
        PerturbationEngine::seeded(FixedOracle(true), 31, 10).expect("budget is valid");
    let change = engine
        .perturb(
            &mut network,
            &ProtectedSet::default(),
            &PerturbationMode::RemoveRandom,
        )
        .expect("the permissive oracle accepts the first draw");
    assert!(matches!(change, Change::Removed { .. }));
    assert_eq!(network.edge_count(), 4);
}
