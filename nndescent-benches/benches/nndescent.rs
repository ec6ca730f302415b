//! NN-descent graph construction benchmarks.
//!
//! Measures a full build over seeded synthetic vectors for several population
//! sizes and worker counts, and reports the recall of one build per case so
//! speed changes can be read against quality.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use nndescent_benches::{
    error::BenchSetupError,
    params::KnnBenchParams,
    recall::graph_recall,
    source::{SyntheticConfig, generate},
};
use nndescent_core::KnnConfigBuilder;

/// Seed used for data generation and for the engine.
const SEED: u64 = 42;

/// Vector dimensionality for all benchmark datasets.
const DIMENSIONS: usize = 8;

/// Neighbours kept per node.
const TOP_K: usize = 10;

/// Dataset sizes to benchmark.
const POINT_COUNTS: &[usize] = &[200, 1_000, 2_000];

/// Worker counts to benchmark.
const CONCURRENCY: &[usize] = &[1, 4];

fn nndescent_build_impl(c: &mut Criterion) -> Result<(), BenchSetupError> {
    let mut group = c.benchmark_group("nndescent_build");
    group.sample_size(10);

    for &point_count in POINT_COUNTS {
        let similarity = generate(&SyntheticConfig {
            point_count,
            dimensions: DIMENSIONS,
            seed: SEED,
        })?;

        for &concurrency in CONCURRENCY {
            let knn = KnnConfigBuilder::new()
                .with_top_k(TOP_K)
                .with_random_seed(SEED)
                .with_concurrency(concurrency)
                .with_min_batch_size(64)
                .build_knn()?;

            let probe = knn.compute(point_count, &similarity)?;
            let score = graph_recall(&probe, &similarity, TOP_K)?;
            println!(
                "n={point_count} threads={concurrency}: recall {}/{} after {} iterations",
                score.hits,
                score.total,
                probe.ran_iterations()
            );

            let params = KnnBenchParams {
                point_count,
                top_k: TOP_K,
                concurrency,
            };
            group.bench_with_input(
                BenchmarkId::from_parameter(&params),
                &point_count,
                |b, &node_count| {
                    b.iter(|| knn.compute(node_count, &similarity));
                },
            );
        }
    }

    group.finish();
    Ok(())
}

fn nndescent_build(c: &mut Criterion) {
    if let Err(err) = nndescent_build_impl(c) {
        panic!("nndescent_build benchmark setup failed: {err}");
    }
}

criterion_group!(benches, nndescent_build);
criterion_main!(benches);
