//! Benchmarks for the strong-connectivity oracle, the hot query inside the
//! perturbation retry loop.

use criterion::{Criterion, criterion_group, criterion_main};

use perturbo_core::{ConnectivityOracle, DepthFirstOracle};
use perturbo_test_support::networks::random_connected;

fn bench_strong_connectivity(c: &mut Criterion) {
    let mut group = c.benchmark_group("strong_connectivity");
    for &(nodes, extra) in &[(20usize, 40usize), (100, 200), (500, 1000)] {
        let network = random_connected(nodes, extra, 7);
        group.bench_function(format!("{nodes}nodes_{}edges", nodes + extra), |bencher| {
            bencher.iter(|| DepthFirstOracle.is_strongly_connected(&network));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_strong_connectivity);
criterion_main!(benches);
