//! Tests for the disturbance orchestration loop, driven by scripted
//! evaluator doubles.

use perturbo_core::{
    CancelToken, CouplingReport, DisturbanceBuilder, EvaluatorError, Network, PerturbationMode,
    PerturboError, RouteCoupling, DepthFirstOracle, ConnectivityOracle,
};
use perturbo_test_support::networks::{directed_cycle, random_connected};
use perturbo_test_support::scripted::{ScriptedEvaluator, ScriptedRound};
use perturbo_test_support::tracing::RecordingLayer;
use rstest::{fixture, rstest};
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;

fn round(flows: Vec<f64>, ue_cost: f64, so_cost: f64) -> ScriptedRound {
    ScriptedRound {
        flows,
        ue_cost,
        so_cost,
    }
}

#[fixture]
fn network() -> Network {
    random_connected(6, 8, 41)
}

#[rstest]
fn baseline_only_run_reports_one_round(network: Network) {
    let evaluator = ScriptedEvaluator::new(vec![round(Vec::new(), 120.0, 100.0)]);
    let disturbance = DisturbanceBuilder::new()
        .with_rounds(0)
        .with_seed(1)
        .build()
        .expect("configuration is valid");

    let report = disturbance
        .run(network, &evaluator)
        .expect("the baseline evaluation succeeds");

    assert_eq!(report.rounds.len(), 1);
    assert!(report.changelog.is_empty());
    assert_eq!(evaluator.calls(), 1);
    assert_eq!(report.rounds[0].price_of_anarchy, 1.2);
    assert!(report.rounds[0].change.is_none());
}

#[rstest]
fn rounds_accumulate_tokens_and_recompute_the_ratio(network: Network) {
    let evaluator = ScriptedEvaluator::new(vec![
        round(Vec::new(), 120.0, 100.0),
        round(Vec::new(), 150.0, 100.0),
        round(Vec::new(), 90.0, 50.0),
    ]);
    let disturbance = DisturbanceBuilder::new()
        .with_rounds(2)
        .with_seed(2)
        .build()
        .expect("configuration is valid");

    let report = disturbance
        .run(network, &evaluator)
        .expect("both rounds succeed");

    assert_eq!(evaluator.calls(), 3);
    assert_eq!(report.changelog.len(), 2);
    assert_eq!(report.rounds.len(), 3);

    // Each round's ratio comes from that round's evaluation, never a stale one.
    let ratios: Vec<f64> = report
        .rounds
        .iter()
        .map(|entry| entry.price_of_anarchy)
        .collect();
    assert_eq!(ratios, vec![1.2, 1.5, 1.8]);

    // Report names concatenate the base name with every token so far.
    let baseline_name = report.rounds[0].network_name.clone();
    let first = format!("{baseline_name}_{}", report.changelog[0]);
    let second = format!("{first}_{}", report.changelog[1]);
    assert_eq!(report.rounds[1].network_name, first);
    assert_eq!(report.rounds[2].network_name, second);

    assert!(DepthFirstOracle.is_strongly_connected(&report.network));
}

#[rstest]
fn shielding_follows_the_latest_evaluation() {
    // Bidirectional square: eight edges. Shielding seven leaves exactly one
    // eligible edge per round, and the scripted flows steer which one.
    let nodes = ["a", "b", "c", "d"];
    let mut edges = Vec::new();
    for (start, end) in [("a", "b"), ("b", "c"), ("c", "d"), ("d", "a")] {
        edges.push(perturbo_core::Edge::new(
            format!("{start}{end}"),
            start,
            end,
            perturbo_core::CostFunction::Constant(1.0),
        ));
        edges.push(perturbo_core::Edge::new(
            format!("{end}{start}"),
            end,
            start,
            perturbo_core::CostFunction::Constant(1.0),
        ));
    }
    let network = Network::new(
        "square",
        nodes.iter().copied().map(perturbo_core::Node::new).collect(),
        edges,
        perturbo_core::OdMatrix::new(),
    );

    // Baseline flows leave position 5 coldest; the second evaluation leaves
    // position 0 coldest.
    let mut baseline_flows = vec![10.0; 8];
    baseline_flows[5] = 0.5;
    let mut second_flows = vec![10.0; 8];
    second_flows[0] = 0.5;
    let cold_first = network.edges()[5].name().to_owned();
    let cold_second = network.edges()[0].name().to_owned();

    let evaluator = ScriptedEvaluator::new(vec![
        round(baseline_flows, 100.0, 100.0),
        round(second_flows, 100.0, 100.0),
        round(vec![10.0; 8], 100.0, 100.0),
    ]);
    let disturbance = DisturbanceBuilder::new()
        .with_rounds(2)
        .with_shield_extra(6)
        .with_seed(3)
        .build()
        .expect("configuration is valid");

    let report = disturbance
        .run(network, &evaluator)
        .expect("one eligible edge per round is enough");

    assert!(report.changelog[0].starts_with(&format!("{cold_first}_")));
    assert!(report.changelog[1].starts_with(&format!("{cold_second}_")));
}

#[rstest]
fn degenerate_optimum_aborts_the_run(network: Network) {
    let evaluator = ScriptedEvaluator::new(vec![round(Vec::new(), 120.0, 0.0)]);
    let disturbance = DisturbanceBuilder::new()
        .with_rounds(1)
        .with_seed(4)
        .build()
        .expect("configuration is valid");

    let err = disturbance
        .run(network, &evaluator)
        .expect_err("a zero system optimum is a solver failure");
    assert!(matches!(err, PerturboError::DegenerateOptimum { so_cost } if so_cost == 0.0));
}

#[rstest]
fn targeted_removal_of_a_cycle_edge_aborts_the_run() {
    let network = directed_cycle(4);
    let evaluator = ScriptedEvaluator::new(vec![
        round(Vec::new(), 100.0, 100.0),
        round(Vec::new(), 100.0, 100.0),
    ]);
    let disturbance = DisturbanceBuilder::new()
        .with_rounds(1)
        .with_mode(PerturbationMode::RemoveNamed {
            edge: "e0".to_owned(),
        })
        .with_seed(5)
        .build()
        .expect("configuration is valid");

    let err = disturbance
        .run(network, &evaluator)
        .expect_err("removing a cycle edge disconnects the network");
    assert!(matches!(err, PerturboError::RemovalDisconnects { .. }));
    // Only the baseline evaluation ran before the fatal round.
    assert_eq!(evaluator.calls(), 1);
}

#[rstest]
fn cancellation_before_the_first_round_keeps_the_baseline(network: Network) {
    let evaluator = ScriptedEvaluator::new(vec![round(Vec::new(), 120.0, 100.0)]);
    let disturbance = DisturbanceBuilder::new()
        .with_rounds(5)
        .with_seed(6)
        .build()
        .expect("configuration is valid");

    let cancel = CancelToken::new();
    cancel.cancel();
    let report = disturbance
        .run_with(network, &evaluator, None, &cancel)
        .expect("cancellation is not an error");

    assert!(report.cancelled);
    assert_eq!(report.rounds.len(), 1);
    assert!(report.changelog.is_empty());
    assert_eq!(evaluator.calls(), 1);
}

struct FailingCoupling;

impl RouteCoupling for FailingCoupling {
    fn coupling(&self, _network: &Network, _k: usize) -> Result<CouplingReport, EvaluatorError> {
        Err(EvaluatorError::NoRoute {
            origin: "x".into(),
            destination: "y".into(),
        })
    }
}

#[rstest]
fn coupling_failures_are_logged_and_do_not_abort(network: Network) {
    let evaluator = ScriptedEvaluator::new(vec![
        round(Vec::new(), 120.0, 100.0),
        round(Vec::new(), 120.0, 100.0),
    ]);
    let disturbance = DisturbanceBuilder::new()
        .with_rounds(1)
        .with_coupling_k(3)
        .with_seed(7)
        .build()
        .expect("configuration is valid");

    let layer = RecordingLayer::default();
    let subscriber = tracing_subscriber::registry().with(layer.clone());
    let report = tracing::subscriber::with_default(subscriber, || {
        disturbance.run_with(network, &evaluator, Some(&FailingCoupling), &CancelToken::new())
    })
    .expect("the coupling side channel must not abort the run");

    assert_eq!(report.rounds.len(), 2);
    assert!(report.rounds.iter().all(|entry| entry.coupling.is_none()));
    assert!(
        layer
            .events()
            .iter()
            .any(|event| event.level == Level::WARN),
        "a warning about the failed coupling should have been emitted",
    );
}
