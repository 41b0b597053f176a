//! Calibration pipeline benchmarks.
//!
//! Two costs matter in practice: the one-off all-probes score construction
//! (amortized by the cache) and the calibrate-from-cached-scores path that
//! every (α, split) experiment pays.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use surety::benchmark::{create_clustered_dataset, ground_truth_fixed_k};
use surety::conformal::scores::build_score_matrix;
use surety::conformal::{CalibrationConfig, Calibrator, KSpec};
use surety::ivf::{IvfFlatIndex, IvfFlatParams};

const DIM: usize = 16;
const NLIST: usize = 32;
const K: usize = 10;
const MAX_DISTANCE: f32 = 4.0;

fn build_fixture(n_base: usize, n_queries: usize) -> (IvfFlatIndex, Vec<Vec<f32>>, Vec<Vec<i64>>) {
    let dataset = create_clustered_dataset(n_base, n_queries, DIM, NLIST, 0.05, 1234);
    let ground_truth = ground_truth_fixed_k(&dataset, K);

    let mut index = IvfFlatIndex::new(
        DIM,
        IvfFlatParams {
            nlist: NLIST,
            seed: 1234,
            train_fraction: 1.0,
        },
    )
    .unwrap();
    index.add_batch(&dataset.base).unwrap();
    index.build().unwrap();
    (index, dataset.queries, ground_truth)
}

fn bench_score_matrix(c: &mut Criterion) {
    let mut group = c.benchmark_group("score_matrix");
    for n_queries in [64usize, 256] {
        let (index, queries, _) = build_fixture(4_000, n_queries);
        group.bench_with_input(
            BenchmarkId::from_parameter(n_queries),
            &n_queries,
            |b, _| {
                b.iter(|| {
                    build_score_matrix(&index, &queries, &KSpec::Fixed(K), MAX_DISTANCE).unwrap()
                });
            },
        );
    }
    group.finish();
}

fn bench_calibrate(c: &mut Criterion) {
    let (index, queries, ground_truth) = build_fixture(4_000, 256);
    c.bench_function("calibrate_256q", |b| {
        b.iter(|| {
            let mut calibrator = Calibrator::new(
                &index,
                CalibrationConfig {
                    alpha: 0.1,
                    k_spec: KSpec::Fixed(K),
                    calib_frac: 0.5,
                    tune_frac: 0.2,
                    max_distance: MAX_DISTANCE,
                    dataset: "bench".to_string(),
                    cache_dir: None,
                },
            );
            calibrator.calibrate(&queries, &ground_truth).unwrap()
        });
    });
}

fn bench_adaptive_search(c: &mut Criterion) {
    let (index, queries, ground_truth) = build_fixture(4_000, 256);
    let mut calibrator = Calibrator::new(
        &index,
        CalibrationConfig {
            alpha: 0.1,
            k_spec: KSpec::Fixed(K),
            calib_frac: 0.5,
            tune_frac: 0.2,
            max_distance: MAX_DISTANCE,
            dataset: "bench".to_string(),
            cache_dir: None,
        },
    );
    let calib = calibrator.calibrate(&queries, &ground_truth).unwrap();

    c.bench_function("adaptive_search", |b| {
        let mut cursor = 0usize;
        b.iter(|| {
            let query = &queries[cursor % queries.len()];
            cursor += 1;
            index.search_adaptive(query, K, MAX_DISTANCE, &calib).unwrap()
        });
    });
}

criterion_group!(
    benches,
    bench_score_matrix,
    bench_calibrate,
    bench_adaptive_search
);
criterion_main!(benches);
