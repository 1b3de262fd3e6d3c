//! # Consensus Index Benchmarks
//!
//! | Target | Operation |
//! |--------|-----------|
//! | lc-01 Web of Trust | Distance of one node to the sentries |
//! | lc-02 Consensus Index | Full check of a newcomer block |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use lc_01_web_of_trust::{compute_distance, sentry_requirement, DistanceParameters, TrustGraph, WotId};
use lc_02_consensus_index::ports::BlockchainApi;
use lc_tests::fixtures::{create_reference_chain, founders, Member};
use std::time::Duration;

// ============================================================================
// LC-01: Distance
// ============================================================================

/// Every node certifies the `degree` following nodes.
fn create_graph(size: usize, degree: usize) -> TrustGraph {
    let mut graph = TrustGraph::new(degree);
    for _ in 0..size {
        graph.add_node();
    }
    for i in 0..size {
        for step in 1..=degree {
            let _ = graph.add_link(WotId(i), WotId((i + step) % size));
        }
    }
    graph
}

fn bench_distance(c: &mut Criterion) {
    let mut group = c.benchmark_group("lc-01-distance");
    group.measurement_time(Duration::from_secs(10));

    for size in [100usize, 1_000, 5_000] {
        let graph = create_graph(size, 10);
        let params = DistanceParameters {
            sentry_requirement: sentry_requirement(size as u64, 5),
            step_max: 5,
            x_percent: 0.8,
        };
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("compute_distance", size), &graph, |b, graph| {
            b.iter(|| black_box(compute_distance(graph, WotId(0), params)))
        });
    }

    group.finish();
}

// ============================================================================
// LC-02: Block validation
// ============================================================================

fn bench_check_block(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("tokio runtime");
    let (forge, block) = rt.block_on(async {
        let (forge, _) = create_reference_chain(12).await;
        let [alice, bob, _] = founders();
        let erin = Member::new(5, "erin", &forge.stamp());
        let block = forge.newcomer(&alice, &erin, &[&alice, &bob]);
        let block = forge.forge(block).await;
        (forge, block)
    });

    let mut group = c.benchmark_group("lc-02-check-block");
    group.bench_function("newcomer_block", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(forge.service.check_block(&block).await) })
    });
    group.finish();
}

criterion_group!(benches, bench_distance, bench_check_block);
criterion_main!(benches);
