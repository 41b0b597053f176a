//! Calibration / tuning / test partitioning.
//!
//! Queries are split by index: the first `calib_frac·N` rows calibrate, the
//! next `tune_frac·N` tune λ_reg, and the remainder is held out for testing.
//! Sizes use floor, matching how the score matrix rows were produced, so
//! the partition is deterministic for a fixed query order.

use tracing::debug;

use super::scores::ScoreMatrix;

/// One split's view of the data: ground truth, raw scores, and snapshots,
/// row-aligned.
#[derive(Debug, Clone, Default)]
pub struct SplitData {
    pub labels: Vec<Vec<i64>>,
    pub scores: Vec<Vec<f32>>,
    pub preds: Vec<Vec<Vec<i64>>>,
}

impl SplitData {
    /// Number of queries in the split.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the split holds no queries.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// The three query splits.
#[derive(Debug, Clone)]
pub struct Splits {
    pub calib: SplitData,
    pub tune: SplitData,
    pub test: SplitData,
}

/// Partition a score matrix and its ground truth into splits.
///
/// A query whose ground-truth set is empty carries no miss-rate signal and
/// would poison the denominators, so it is silently dropped from its split.
pub fn partition(
    matrix: ScoreMatrix,
    ground_truth: &[Vec<i64>],
    calib_frac: f32,
    tune_frac: f32,
) -> Splits {
    let nq = matrix.len();
    debug_assert_eq!(ground_truth.len(), nq);

    let calib_nq = (calib_frac * nq as f32) as usize;
    let tune_nq = (tune_frac * nq as f32) as usize;

    let mut splits = [SplitData::default(), SplitData::default(), SplitData::default()];
    let mut dropped = 0usize;

    let rows = matrix
        .scores
        .into_iter()
        .zip(matrix.preds)
        .zip(ground_truth.iter());
    for (q, ((score_row, pred_row), gt)) in rows.enumerate() {
        if gt.is_empty() {
            dropped += 1;
            continue;
        }
        let slot = if q < calib_nq {
            0
        } else if q < calib_nq + tune_nq {
            1
        } else {
            2
        };
        splits[slot].labels.push(gt.clone());
        splits[slot].scores.push(score_row);
        splits[slot].preds.push(pred_row);
    }

    if dropped > 0 {
        debug!(dropped, "dropped queries with empty ground truth");
    }

    let [calib, tune, test] = splits;
    debug!(
        calib = calib.len(),
        tune = tune.len(),
        test = test.len(),
        "partitioned query set"
    );
    Splits { calib, tune, test }
}
