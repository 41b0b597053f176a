//! IVF-Flat index implementation.

use serde::{Deserialize, Serialize};

use super::heap::TopKHeap;
use crate::conformal::regularize::{max_regularized_value, rank_penalty};
use crate::conformal::CalibrationResult;
use crate::distance::l2_squared;
use crate::{CalibrateError, Result};

/// IVF-Flat parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IvfFlatParams {
    /// Number of inverted lists (clusters).
    pub nlist: usize,

    /// Seed for the coarse quantizer. List placement must be reproducible:
    /// cached score matrices are keyed by dataset and list count only.
    pub seed: u64,

    /// Fraction of added vectors used to train the quantizer (from the
    /// front of insertion order).
    pub train_fraction: f32,
}

impl Default for IvfFlatParams {
    fn default() -> Self {
        Self {
            nlist: 1024,
            seed: 420,
            train_fraction: 1.0,
        }
    }
}

/// IVF-Flat index: coarse quantizer + inverted lists of exact vectors.
#[derive(Debug)]
pub struct IvfFlatIndex {
    /// Flat row-major vector storage; insertion order is the vector id.
    vectors: Vec<f32>,
    dimension: usize,
    num_vectors: usize,
    params: IvfFlatParams,
    built: bool,

    /// Centroids of the coarse quantizer (nlist x dimension).
    centroids: Vec<Vec<f32>>,
    /// Inverted lists of vector ids, one per centroid.
    lists: Vec<Vec<i64>>,
}

impl IvfFlatIndex {
    /// Create a new index.
    pub fn new(dimension: usize, params: IvfFlatParams) -> Result<Self> {
        if dimension == 0 {
            return Err(CalibrateError::EmptyQuery);
        }
        if params.nlist == 0 {
            return Err(CalibrateError::InvalidParameter(
                "nlist must be greater than 0".to_string(),
            ));
        }
        if !(params.train_fraction > 0.0 && params.train_fraction <= 1.0) {
            return Err(CalibrateError::InvalidParameter(format!(
                "train_fraction must be in (0, 1], got {}",
                params.train_fraction
            )));
        }

        Ok(Self {
            vectors: Vec::new(),
            dimension,
            num_vectors: 0,
            params,
            built: false,
            centroids: Vec::new(),
            lists: Vec::new(),
        })
    }

    /// Add a vector. Its id is its insertion order.
    pub fn add(&mut self, vector: &[f32]) -> Result<()> {
        if self.built {
            return Err(CalibrateError::InvalidParameter(
                "cannot add vectors after the index is built".to_string(),
            ));
        }
        if vector.len() != self.dimension {
            return Err(CalibrateError::DimensionMismatch {
                query_dim: vector.len(),
                index_dim: self.dimension,
            });
        }
        self.vectors.extend_from_slice(vector);
        self.num_vectors += 1;
        Ok(())
    }

    /// Add a batch of vectors.
    pub fn add_batch(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        for v in vectors {
            self.add(v)?;
        }
        Ok(())
    }

    /// Train the coarse quantizer and assign every vector to a list.
    pub fn build(&mut self) -> Result<()> {
        if self.built {
            return Ok(());
        }
        if self.num_vectors == 0 {
            return Err(CalibrateError::EmptyIndex);
        }
        if self.num_vectors < self.params.nlist {
            return Err(CalibrateError::InvalidParameter(format!(
                "need at least nlist={} vectors, got {}",
                self.params.nlist, self.num_vectors
            )));
        }

        let n_train = ((self.num_vectors as f32 * self.params.train_fraction) as usize)
            .clamp(self.params.nlist, self.num_vectors);
        let mut kmeans = crate::partitioning::KMeans::new(self.dimension, self.params.nlist)?
            .with_seed(self.params.seed);
        kmeans.fit(&self.vectors[..n_train * self.dimension], n_train)?;
        self.centroids = kmeans.centroids().to_vec();

        let assignments = kmeans.assign_clusters(&self.vectors, self.num_vectors);
        self.lists = vec![Vec::new(); self.params.nlist];
        for (vector_idx, &list_idx) in assignments.iter().enumerate() {
            self.lists[list_idx].push(vector_idx as i64);
        }

        self.built = true;
        Ok(())
    }

    /// Number of inverted lists.
    pub fn nlist(&self) -> usize {
        self.params.nlist
    }

    /// Vector dimension.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of stored vectors.
    pub fn num_vectors(&self) -> usize {
        self.num_vectors
    }

    /// Rank *all* lists by ascending centroid distance from `query`.
    ///
    /// Ties break on list id so re-runs over the same index produce the same
    /// probe order, which cached score matrices depend on.
    pub fn rank_lists(&self, query: &[f32]) -> Result<Vec<(usize, f32)>> {
        self.check_query(query)?;

        let mut ranked: Vec<(usize, f32)> = self
            .centroids
            .iter()
            .enumerate()
            .map(|(idx, centroid)| (idx, l2_squared(query, centroid)))
            .collect();
        ranked.sort_unstable_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

        if ranked.len() < self.params.nlist {
            return Err(CalibrateError::QuantizerShortfall {
                got: ranked.len(),
                expected: self.params.nlist,
            });
        }
        Ok(ranked)
    }

    /// Scan one inverted list, offering every stored vector to `heap`.
    ///
    /// An empty list leaves the heap untouched. Returns the number of
    /// vectors scanned.
    pub fn scan_list(&self, list_id: usize, query: &[f32], heap: &mut TopKHeap) -> Result<usize> {
        if list_id >= self.lists.len() {
            return Err(CalibrateError::ListOutOfRange {
                list_id,
                nlist: self.params.nlist,
            });
        }

        let list = &self.lists[list_id];
        for &id in list {
            let vec = self.get_vector(id as usize);
            heap.push(l2_squared(query, vec), id);
        }
        Ok(list.len())
    }

    /// Fixed-nprobe search: scan the `nprobe` nearest lists, return up to
    /// `k` `(distance, id)` pairs ascending by squared L2 distance.
    pub fn search(&self, query: &[f32], k: usize, nprobe: usize) -> Result<Vec<(f32, i64)>> {
        self.check_built()?;
        let ranked = self.rank_lists(query)?;

        let mut heap = TopKHeap::new(k);
        for &(list_id, _) in ranked.iter().take(nprobe.min(self.params.nlist)) {
            self.scan_list(list_id, query, &mut heap)?;
        }
        Ok(heap.into_sorted())
    }

    /// Adaptive search under a calibrated stopping rule.
    ///
    /// Lists are probed in rank order. After each probe the running k-th
    /// distance is normalized by `max_distance`, regularized with the
    /// calibrated `(k_reg, λ_reg)` at the probe's 1-based rank, and compared
    /// against λ̂. The first probe whose regularized score exceeds λ̂ is
    /// outside the admitted set, so the heap rolls back to the snapshot
    /// taken before that probe and the scan stops.
    ///
    /// Returns an empty vector when the very first probe already exceeds λ̂
    /// ("no answer under calibration"); callers must not substitute
    /// arbitrary neighbors in that case.
    pub fn search_adaptive(
        &self,
        query: &[f32],
        k: usize,
        max_distance: f32,
        calib: &CalibrationResult,
    ) -> Result<Vec<(f32, i64)>> {
        self.check_built()?;
        let ranked = self.rank_lists(query)?;

        let max_reg = max_regularized_value(self.params.nlist, calib.k_reg, calib.lambda_reg);
        let mut heap = TopKHeap::new(k);
        let mut admitted = heap.snapshot();
        let mut any_admitted = false;

        for (rank, &(list_id, _)) in ranked.iter().enumerate() {
            self.scan_list(list_id, query, &mut heap)?;

            let raw = (heap.top_distance() / max_distance).min(1.0);
            let reg =
                ((1.0 - raw) + rank_penalty(rank + 1, calib.lambda_reg, calib.k_reg)) / max_reg;
            if reg > calib.lamhat {
                heap.restore(&admitted);
                break;
            }
            admitted = heap.snapshot();
            any_admitted = true;
        }

        if !any_admitted {
            return Ok(Vec::new());
        }
        Ok(heap.into_sorted())
    }

    fn check_built(&self) -> Result<()> {
        if !self.built {
            return Err(CalibrateError::InvalidParameter(
                "index must be built before search".to_string(),
            ));
        }
        Ok(())
    }

    fn check_query(&self, query: &[f32]) -> Result<()> {
        if query.len() != self.dimension {
            return Err(CalibrateError::DimensionMismatch {
                query_dim: query.len(),
                index_dim: self.dimension,
            });
        }
        Ok(())
    }

    fn get_vector(&self, idx: usize) -> &[f32] {
        let start = idx * self.dimension;
        &self.vectors[start..start + self.dimension]
    }
}
