//! k-means clustering used as the coarse quantizer of the inverted file.
//!
//! Seeded k-means++ initialization followed by Lloyd iterations over L2.
//! The seed is part of the index configuration: list placement must be
//! reproducible across runs, otherwise cached score matrices keyed by
//! dataset and list count would silently describe a different index.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::distance::l2_squared;
use crate::{CalibrateError, Result};

/// k-means clustering for partitioning vectors into inverted lists.
pub struct KMeans {
    /// Centroids (k x dimension).
    centroids: Vec<Vec<f32>>,
    dimension: usize,
    k: usize,
    seed: u64,
}

impl KMeans {
    /// Create new k-means with `k` clusters.
    pub fn new(dimension: usize, k: usize) -> Result<Self> {
        if dimension == 0 || k == 0 {
            return Err(CalibrateError::InvalidParameter(
                "dimension and k must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            centroids: Vec::new(),
            dimension,
            k,
            seed: 0,
        })
    }

    /// Configure the seed for k-means++ initialization.
    ///
    /// Repeated `fit(...)` calls on the same inputs produce identical
    /// centroids for the same seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Train on `num_vectors` vectors stored row-major in `vectors`.
    pub fn fit(&mut self, vectors: &[f32], num_vectors: usize) -> Result<()> {
        if vectors.len() < num_vectors * self.dimension {
            return Err(CalibrateError::InvalidParameter(
                "insufficient training vectors".to_string(),
            ));
        }
        if num_vectors < self.k {
            return Err(CalibrateError::InvalidParameter(format!(
                "need at least k={} training vectors, got {num_vectors}",
                self.k
            )));
        }

        self.centroids = self.kmeans_plus_plus(vectors, num_vectors);

        for _iteration in 0..100 {
            let assignments = self.assign_clusters(vectors, num_vectors);
            let new_centroids = self.update_centroids(vectors, num_vectors, &assignments);

            let converged = self
                .centroids
                .iter()
                .zip(new_centroids.iter())
                .all(|(old, new)| l2_squared(old, new) <= 1e-6);

            self.centroids = new_centroids;
            if converged {
                break;
            }
        }

        Ok(())
    }

    /// k-means++ initialization: first centroid uniform, the rest sampled
    /// proportional to squared distance from the nearest chosen centroid.
    fn kmeans_plus_plus(&self, vectors: &[f32], num_vectors: usize) -> Vec<Vec<f32>> {
        let mut rng = StdRng::seed_from_u64(self.seed);

        let mut centroids = Vec::with_capacity(self.k);
        let first_idx = rng.random_range(0..num_vectors);
        centroids.push(self.get_vector(vectors, first_idx).to_vec());

        let mut min_dists = vec![f32::INFINITY; num_vectors];
        while centroids.len() < self.k {
            let newest = centroids.last().expect("at least one centroid");
            let mut total = 0.0f64;
            for i in 0..num_vectors {
                let d = l2_squared(self.get_vector(vectors, i), newest);
                if d < min_dists[i] {
                    min_dists[i] = d;
                }
                total += f64::from(min_dists[i]);
            }

            let threshold = rng.random::<f64>() * total;
            let mut cumulative = 0.0f64;
            let mut chosen = num_vectors - 1;
            for (i, &dist) in min_dists.iter().enumerate() {
                cumulative += f64::from(dist);
                if cumulative >= threshold {
                    chosen = i;
                    break;
                }
            }
            centroids.push(self.get_vector(vectors, chosen).to_vec());
        }

        centroids
    }

    /// Assign each vector to its nearest centroid.
    pub fn assign_clusters(&self, vectors: &[f32], num_vectors: usize) -> Vec<usize> {
        (0..num_vectors)
            .map(|i| {
                let vec = self.get_vector(vectors, i);
                let mut best_cluster = 0;
                let mut best_dist = f32::INFINITY;
                for (cluster_idx, centroid) in self.centroids.iter().enumerate() {
                    let dist = l2_squared(vec, centroid);
                    if dist < best_dist {
                        best_dist = dist;
                        best_cluster = cluster_idx;
                    }
                }
                best_cluster
            })
            .collect()
    }

    /// Recompute centroids as assignment means. An empty cluster keeps its
    /// previous centroid so the list count never shrinks.
    fn update_centroids(
        &self,
        vectors: &[f32],
        num_vectors: usize,
        assignments: &[usize],
    ) -> Vec<Vec<f32>> {
        let mut sums = vec![vec![0.0f32; self.dimension]; self.k];
        let mut counts = vec![0usize; self.k];

        for (i, &cluster) in assignments.iter().enumerate().take(num_vectors) {
            counts[cluster] += 1;
            for (j, &val) in self.get_vector(vectors, i).iter().enumerate() {
                sums[cluster][j] += val;
            }
        }

        sums.into_iter()
            .zip(counts.iter())
            .enumerate()
            .map(|(cluster, (sum, &count))| {
                if count > 0 {
                    sum.iter().map(|&s| s / count as f32).collect()
                } else {
                    self.centroids[cluster].clone()
                }
            })
            .collect()
    }

    fn get_vector<'a>(&self, vectors: &'a [f32], idx: usize) -> &'a [f32] {
        let start = idx * self.dimension;
        &vectors[start..start + self.dimension]
    }

    /// Trained centroids.
    pub fn centroids(&self) -> &[Vec<f32>] {
        &self.centroids
    }
}
