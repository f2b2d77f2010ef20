//! Throughput of the dispatcher under a wide fan-out, in the shape of
//! this codebase's other `graph_execution_bench`/`checkpoint_bench`
//! benchmarks.

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use tokio::runtime::Runtime;
use workstream_orchestrator::config::DispatcherConfig;
use workstream_orchestrator::dispatcher::{Dispatcher, WorkerFn};
use workstream_orchestrator::graph::Graph;

fn build_fan_out(width: usize) -> Graph {
    let mut graph = Graph::new();
    graph.register("root".into(), vec![]).unwrap();
    for i in 0..width {
        graph.register(format!("leaf-{i}"), vec!["root".into()]).unwrap();
    }
    graph
}

fn noop_worker() -> WorkerFn {
    Arc::new(|_id| Box::pin(async { Ok(()) }))
}

fn bench_dispatch(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("dispatcher_fan_out");

    for width in [8usize, 64, 256] {
        group.bench_with_input(BenchmarkId::from_parameter(width), &width, |b, &width| {
            b.to_async(&rt).iter(|| async {
                let dir = tempfile::tempdir().unwrap();
                let graph = build_fan_out(width);
                let config = DispatcherConfig::new("bench-feature", dir.path())
                    .with_concurrency(8)
                    .with_checkpoint_enabled(false);
                let mut dispatcher = Dispatcher::new(graph, config, noop_worker());
                dispatcher.run(None).await
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_dispatch);
criterion_main!(benches);
