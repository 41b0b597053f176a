//! Synthetic dataset generation and brute-force ground truth.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::distance::l2_squared;

/// A base/query vector pair for calibration experiments.
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Database vectors (the set to index).
    pub base: Vec<Vec<f32>>,
    /// Query vectors.
    pub queries: Vec<Vec<f32>>,
    /// Vector dimensionality.
    pub dimension: usize,
}

impl Dataset {
    /// Number of base vectors.
    pub fn n_base(&self) -> usize {
        self.base.len()
    }

    /// Number of queries.
    pub fn n_queries(&self) -> usize {
        self.queries.len()
    }
}

/// Uniform random vectors in `[0, 1]^d`.
///
/// A structureless baseline. Real data has clusters and manifolds, which
/// is what makes adaptive probing pay off; prefer
/// [`create_clustered_dataset`] for anything beyond smoke tests.
pub fn create_uniform_dataset(
    n_base: usize,
    n_queries: usize,
    dimension: usize,
    seed: u64,
) -> Dataset {
    let mut rng = StdRng::seed_from_u64(seed);

    let base = (0..n_base)
        .map(|_| (0..dimension).map(|_| rng.random::<f32>()).collect())
        .collect();
    let queries = (0..n_queries)
        .map(|_| (0..dimension).map(|_| rng.random::<f32>()).collect())
        .collect();

    Dataset {
        base,
        queries,
        dimension,
    }
}

/// Clustered vectors: `n_clusters` centers with Gaussian noise around each.
pub fn create_clustered_dataset(
    n_base: usize,
    n_queries: usize,
    dimension: usize,
    n_clusters: usize,
    cluster_std: f32,
    seed: u64,
) -> Dataset {
    let mut rng = StdRng::seed_from_u64(seed);

    let centers: Vec<Vec<f32>> = (0..n_clusters)
        .map(|_| (0..dimension).map(|_| rng.random::<f32>()).collect())
        .collect();

    let sample_near = |rng: &mut StdRng, center: &[f32]| -> Vec<f32> {
        center
            .iter()
            .map(|&c| {
                // Box-Muller for Gaussian noise.
                let u1: f32 = rng.random();
                let u2: f32 = rng.random();
                let z = (-2.0 * u1.max(1e-12).ln()).sqrt()
                    * (2.0 * std::f32::consts::PI * u2).cos();
                (c + z * cluster_std).clamp(0.0, 1.0)
            })
            .collect()
    };

    let base = (0..n_base)
        .map(|_| {
            let idx = rng.random_range(0..n_clusters);
            sample_near(&mut rng, &centers[idx])
        })
        .collect();
    let queries = (0..n_queries)
        .map(|_| {
            let idx = rng.random_range(0..n_clusters);
            sample_near(&mut rng, &centers[idx])
        })
        .collect();

    Dataset {
        base,
        queries,
        dimension,
    }
}

/// Exact k nearest neighbors of one query, by brute force over the base.
pub fn ground_truth_one(query: &[f32], base: &[Vec<f32>], k: usize) -> Vec<i64> {
    let mut distances: Vec<(i64, f32)> = base
        .iter()
        .enumerate()
        .map(|(i, vec)| (i as i64, l2_squared(query, vec)))
        .collect();
    distances.sort_unstable_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
    distances.into_iter().take(k).map(|(id, _)| id).collect()
}

/// Exact ground truth for every query at a fixed k.
pub fn ground_truth_fixed_k(dataset: &Dataset, k: usize) -> Vec<Vec<i64>> {
    dataset
        .queries
        .iter()
        .map(|q| ground_truth_one(q, &dataset.base, k))
        .collect()
}

/// Exact ground truth with a per-query k.
pub fn ground_truth_per_query_k(dataset: &Dataset, ks: &[usize]) -> Vec<Vec<i64>> {
    dataset
        .queries
        .iter()
        .zip(ks)
        .map(|(q, &k)| ground_truth_one(q, &dataset.base, k))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generators_honor_requested_shapes() {
        let d = create_clustered_dataset(200, 20, 16, 5, 0.05, 42);
        assert_eq!(d.n_base(), 200);
        assert_eq!(d.n_queries(), 20);
        assert_eq!(d.base[0].len(), 16);
        for &v in d.base.iter().flatten() {
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn generation_is_seeded() {
        let a = create_clustered_dataset(50, 5, 8, 3, 0.1, 7);
        let b = create_clustered_dataset(50, 5, 8, 3, 0.1, 7);
        assert_eq!(a.base, b.base);
        assert_eq!(a.queries, b.queries);
    }

    #[test]
    fn ground_truth_finds_the_nearest_point() {
        let base = vec![
            vec![0.0f32, 0.0],
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![1.0, 1.0],
        ];
        let gt = ground_truth_one(&[0.1, 0.1], &base, 2);
        assert_eq!(gt[0], 0);
        assert!(gt[1] == 1 || gt[1] == 2);
    }

    #[test]
    fn per_query_k_shapes_each_row() {
        let d = create_uniform_dataset(30, 3, 4, 1);
        let gt = ground_truth_per_query_k(&d, &[1, 5, 3]);
        assert_eq!(gt[0].len(), 1);
        assert_eq!(gt[1].len(), 5);
        assert_eq!(gt[2].len(), 3);
    }
}
