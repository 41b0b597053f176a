//! Calibration orchestration.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::cache::ScoreCache;
use super::config::CalibrationConfig;
use super::evaluate::{evaluate_split, TestReport};
use super::optimize::{conformal_target, solve_threshold};
use super::regularize::regularize;
use super::scores::{build_score_matrix, ScoreMatrix};
use super::select::pick_lambda_reg;
use super::split::{partition, Splits};
use crate::ivf::IvfFlatIndex;
use crate::{CalibrateError, Result};

/// The calibrated stopping rule: everything steady-state search needs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResult {
    /// Threshold on the regularized non-conformity score.
    pub lamhat: f32,
    /// Rank pivot of the regularization penalty (fixed to 1 by calibration).
    pub k_reg: usize,
    /// Regularization strength selected on the tuning split.
    pub lambda_reg: f32,
}

/// Wall-clock seconds spent in each calibration phase.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TimeReport {
    pub compute_scores: f64,
    pub compute_scores_calib: f64,
    pub compute_scores_tune: f64,
    pub split: f64,
    pub pick_reg_lambda: f64,
    pub regularize_scores: f64,
    pub optimize: f64,
    pub total: f64,
}

/// Drives one calibration run and retains the split score views so the
/// held-out test split can be replayed afterwards.
///
/// All transient buffers (score matrix, snapshot tensor, per-query heaps)
/// live inside this struct or on worker stacks; after [`calibrate`] only
/// the returned [`CalibrationResult`] is needed at query time.
///
/// [`calibrate`]: Calibrator::calibrate
pub struct Calibrator<'a> {
    index: &'a IvfFlatIndex,
    config: CalibrationConfig,
    splits: Option<Splits>,
    time_report: TimeReport,
}

impl<'a> Calibrator<'a> {
    /// Create a calibrator for a built index.
    pub fn new(index: &'a IvfFlatIndex, config: CalibrationConfig) -> Self {
        Self {
            index,
            config,
            splits: None,
            time_report: TimeReport::default(),
        }
    }

    /// Calibrate the stopping rule on `queries` against `ground_truth`.
    ///
    /// Ground truth rows align with queries by index; rows may have
    /// per-query cardinality in the variable-k mode. The expensive score
    /// matrix is reused from the cache when one is configured and a prior
    /// run covered the same (dataset, L, k-spec).
    pub fn calibrate(
        &mut self,
        queries: &[Vec<f32>],
        ground_truth: &[Vec<i64>],
    ) -> Result<CalibrationResult> {
        self.config.validate(queries.len())?;
        if ground_truth.len() != queries.len() {
            return Err(CalibrateError::InvalidParameter(format!(
                "{} ground-truth rows for {} queries",
                ground_truth.len(),
                queries.len()
            )));
        }

        let t0 = Instant::now();
        self.prepare(queries, ground_truth)?;
        let splits = self.splits.as_ref().expect("prepared above");
        if splits.calib.is_empty() {
            return Err(CalibrateError::InvalidParameter(
                "calibration split is empty".to_string(),
            ));
        }

        let k_reg = 1;
        let t = Instant::now();
        let lambda_reg = pick_lambda_reg(self.config.alpha, k_reg, self.index.nlist(), &splits.tune);
        self.time_report.pick_reg_lambda = t.elapsed().as_secs_f64();

        let t = Instant::now();
        let reg_calib = regularize(&splits.calib.scores, self.index.nlist(), lambda_reg, k_reg);
        self.time_report.regularize_scores = t.elapsed().as_secs_f64();

        let t = Instant::now();
        let target = conformal_target(self.config.alpha, splits.calib.len());
        let lamhat = solve_threshold(target, &reg_calib, &splits.calib.preds, &splits.calib.labels);
        self.time_report.optimize = t.elapsed().as_secs_f64();

        self.time_report.total = t0.elapsed().as_secs_f64();
        info!(
            lamhat,
            lambda_reg,
            calib = splits.calib.len(),
            tune = splits.tune.len(),
            test = splits.test.len(),
            "calibration finished"
        );
        Ok(CalibrationResult {
            lamhat,
            k_reg,
            lambda_reg,
        })
    }

    /// Replay the stopping rule on the held-out test split.
    ///
    /// Must be called after [`calibrate`](Self::calibrate) on the same
    /// calibrator, since the test split's cached scores live here.
    pub fn evaluate_test(&self, result: &CalibrationResult) -> Result<TestReport> {
        let splits = self.splits.as_ref().ok_or_else(|| {
            CalibrateError::InvalidParameter("evaluate_test before calibrate".to_string())
        })?;
        Ok(evaluate_split(result, self.index.nlist(), &splits.test))
    }

    /// Per-phase timings of the last [`calibrate`](Self::calibrate) call.
    pub fn time_report(&self) -> &TimeReport {
        &self.time_report
    }

    /// Load or compute the score matrix, then partition it.
    fn prepare(&mut self, queries: &[Vec<f32>], ground_truth: &[Vec<i64>]) -> Result<()> {
        let tag = self.config.k_spec.cache_tag();
        let scores_key = format!("{}_{}_{}_scores", self.config.dataset, self.index.nlist(), tag);
        let preds_key = format!("{}_{}_{}_preds", self.config.dataset, self.index.nlist(), tag);

        let cache = match &self.config.cache_dir {
            Some(dir) => Some(ScoreCache::new(dir)?),
            None => None,
        };

        let matrix = match cache.as_ref().and_then(|c| {
            // A partial or corrupt entry is a miss: both files must load.
            match (c.read_scores(&scores_key), c.read_preds(&preds_key)) {
                (Ok(scores), Ok(preds)) if scores.len() == queries.len() => {
                    Some(ScoreMatrix { scores, preds })
                }
                (Ok(scores), Ok(_)) => {
                    warn!(
                        key = %scores_key,
                        cached = scores.len(),
                        queries = queries.len(),
                        "cached matrix has wrong row count, recomputing"
                    );
                    None
                }
                _ => None,
            }
        }) {
            Some(matrix) => {
                info!(key = %scores_key, "score matrix loaded from cache");
                matrix
            }
            None => {
                debug!(key = %scores_key, "score cache miss, probing all lists");
                let t = Instant::now();
                let matrix = build_score_matrix(
                    self.index,
                    queries,
                    &self.config.k_spec,
                    self.config.max_distance,
                )?;
                self.time_report.compute_scores = t.elapsed().as_secs_f64();
                self.time_report.compute_scores_calib =
                    self.time_report.compute_scores * f64::from(self.config.calib_frac);
                self.time_report.compute_scores_tune =
                    self.time_report.compute_scores * f64::from(self.config.tune_frac);

                if let Some(cache) = cache.as_ref() {
                    // Failing to persist is not fatal; the next run recomputes.
                    if let Err(err) = cache
                        .write_scores(&scores_key, &matrix.scores)
                        .and_then(|()| cache.write_preds(&preds_key, &matrix.preds))
                    {
                        warn!(error = %err, "failed to write score cache");
                    }
                }
                matrix
            }
        };

        let t = Instant::now();
        self.splits = Some(partition(
            matrix,
            ground_truth,
            self.config.calib_frac,
            self.config.tune_frac,
        ));
        self.time_report.split = t.elapsed().as_secs_f64();
        Ok(())
    }
}
