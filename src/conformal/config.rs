//! Calibration configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{CalibrateError, Result};

/// How many neighbors each query asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KSpec {
    /// The same k for every query.
    Fixed(usize),
    /// A per-query k, aligned with the query set by index.
    PerQuery(Vec<usize>),
}

impl KSpec {
    /// k for query `q`.
    pub fn k_for(&self, q: usize) -> usize {
        match self {
            KSpec::Fixed(k) => *k,
            KSpec::PerQuery(ks) => ks[q],
        }
    }

    /// Cache-key fragment: `k<int>` or `variable_k_<min>_<max>`.
    ///
    /// Variable-k runs with the same bounds share a cache entry; the draw
    /// must therefore be seeded by the caller.
    pub fn cache_tag(&self) -> String {
        match self {
            KSpec::Fixed(k) => format!("k{k}"),
            KSpec::PerQuery(ks) => {
                let min = ks.iter().copied().min().unwrap_or(0);
                let max = ks.iter().copied().max().unwrap_or(0);
                format!("variable_k_{min}_{max}")
            }
        }
    }

    fn validate(&self, num_queries: usize) -> Result<()> {
        match self {
            KSpec::Fixed(k) if *k == 0 => Err(CalibrateError::InvalidParameter(
                "k must be greater than 0".to_string(),
            )),
            KSpec::Fixed(_) => Ok(()),
            KSpec::PerQuery(ks) if ks.len() != num_queries => {
                Err(CalibrateError::InvalidParameter(format!(
                    "per-query k has {} entries for {num_queries} queries",
                    ks.len()
                )))
            }
            KSpec::PerQuery(ks) if ks.iter().any(|&k| k == 0) => Err(
                CalibrateError::InvalidParameter("per-query k contains 0".to_string()),
            ),
            KSpec::PerQuery(_) => Ok(()),
        }
    }
}

/// Configuration of one calibration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Target mean miss-rate, in (0, 1).
    pub alpha: f32,

    /// Neighbor count per query.
    pub k_spec: KSpec,

    /// Fraction of queries assigned to the calibration split.
    pub calib_frac: f32,

    /// Fraction of queries assigned to the tuning split. The remainder is
    /// the test split.
    pub tune_frac: f32,

    /// Normalization constant mapping raw squared-L2 distances into [0, 1]
    /// scores. Hand-picked per dataset; supplied by the caller.
    pub max_distance: f32,

    /// Dataset name, used only to key the score cache.
    pub dataset: String,

    /// Score cache directory. `None` disables caching.
    pub cache_dir: Option<PathBuf>,
}

impl CalibrationConfig {
    /// Check the configuration against a query set of size `num_queries`.
    pub fn validate(&self, num_queries: usize) -> Result<()> {
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(CalibrateError::InvalidParameter(format!(
                "alpha must be in (0, 1), got {}",
                self.alpha
            )));
        }
        if self.calib_frac <= 0.0 || self.tune_frac < 0.0 {
            return Err(CalibrateError::InvalidParameter(
                "split fractions must be positive".to_string(),
            ));
        }
        let held_out = self.calib_frac + self.tune_frac;
        if !(held_out > 0.0 && held_out < 1.0) {
            return Err(CalibrateError::InvalidParameter(format!(
                "calib_frac + tune_frac must be in (0, 1), got {held_out}"
            )));
        }
        if num_queries < 3 {
            return Err(CalibrateError::InvalidParameter(format!(
                "need at least 3 queries, got {num_queries}"
            )));
        }
        if !(self.max_distance > 0.0) {
            return Err(CalibrateError::InvalidParameter(format!(
                "max_distance must be positive, got {}",
                self.max_distance
            )));
        }
        self.k_spec.validate(num_queries)
    }
}
