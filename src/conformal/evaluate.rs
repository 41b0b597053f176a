//! Held-out evaluation of a calibrated stopping rule.

use super::driver::CalibrationResult;
use super::predict::{compute_predictions, mean_probes, miss_rate_per_query};
use super::regularize::regularize;
use super::split::SplitData;

/// Per-query outcomes of replaying the stopping rule on a split.
#[derive(Debug, Clone)]
pub struct TestReport {
    /// `1 − |prediction ∩ ground_truth| / |ground_truth|` per query.
    pub miss_rates: Vec<f32>,
    /// Inverted lists admitted per query; `None` when the rule rejected
    /// even the first-ranked list.
    pub probes: Vec<Option<usize>>,
}

impl TestReport {
    /// Mean miss-rate over the split.
    pub fn mean_miss_rate(&self) -> f32 {
        if self.miss_rates.is_empty() {
            return 0.0;
        }
        self.miss_rates.iter().sum::<f32>() / self.miss_rates.len() as f32
    }

    /// Mean clusters probed over the answered queries.
    pub fn mean_probes(&self) -> Option<f32> {
        mean_probes(&self.probes)
    }

    /// Number of queries the rule declined to answer.
    pub fn unanswered(&self) -> usize {
        self.probes.iter().filter(|p| p.is_none()).count()
    }
}

/// Replay a calibrated rule over one split's cached scores.
pub fn evaluate_split(result: &CalibrationResult, nlist: usize, split: &SplitData) -> TestReport {
    let reg = regularize(&split.scores, nlist, result.lambda_reg, result.k_reg);
    let out = compute_predictions(result.lamhat, &reg, &split.preds);
    TestReport {
        miss_rates: miss_rate_per_query(&out.sets, &split.labels),
        probes: out.probes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split() -> SplitData {
        let mut split = SplitData::default();
        for q in 0..4i64 {
            split.scores.push(vec![0.9, 0.6, 0.3]);
            split.preds.push(vec![
                vec![q * 10],
                vec![q * 10, q * 10 + 1],
                vec![q * 10, q * 10 + 1, -1],
            ]);
            split.labels.push(vec![q * 10, q * 10 + 1]);
        }
        split
    }

    #[test]
    fn permissive_threshold_answers_every_query() {
        let result = CalibrationResult {
            lamhat: 1.0,
            k_reg: 1,
            lambda_reg: 0.0,
        };
        let report = evaluate_split(&result, 3, &split());
        assert_eq!(report.unanswered(), 0);
        assert_eq!(report.mean_miss_rate(), 0.0);
        assert_eq!(report.mean_probes(), Some(3.0));
    }

    #[test]
    fn strict_threshold_answers_nothing() {
        let result = CalibrationResult {
            lamhat: 0.0,
            k_reg: 1,
            lambda_reg: 0.0,
        };
        let report = evaluate_split(&result, 3, &split());
        assert_eq!(report.unanswered(), 4);
        assert_eq!(report.mean_probes(), None);
        assert_eq!(report.mean_miss_rate(), 1.0);
    }

    #[test]
    fn intermediate_threshold_stops_midway() {
        // (1 − 0.6) / 11 ≈ 0.036: admit the first two lists only.
        let result = CalibrationResult {
            lamhat: 0.04,
            k_reg: 1,
            lambda_reg: 0.0,
        };
        let report = evaluate_split(&result, 3, &split());
        assert_eq!(report.probes, vec![Some(2); 4]);
        assert_eq!(report.mean_miss_rate(), 0.0);
    }
}
