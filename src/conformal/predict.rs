//! Offline replay of the stopping rule.
//!
//! For a threshold λ, the admitted set of a query is every list whose
//! regularized score is ≤ λ. Walking lists by ascending regularized score
//! mirrors what adaptive search does online: the snapshot taken at the
//! maximum-cost admitted list is exactly the heap state search would stop
//! with. These helpers reconstruct that prediction from cached scores
//! without touching the index.

use std::collections::HashSet;

/// Replayed predictions: one neighbor set per query, plus how many lists
/// the stopping rule admitted (`None` when no list qualified, meaning
/// "no answer under calibration").
#[derive(Debug, Clone)]
pub struct PredictionOutcome {
    pub sets: Vec<Vec<i64>>,
    pub probes: Vec<Option<usize>>,
}

/// Compute per-query predictions under threshold `lambda`.
pub fn compute_predictions(
    lambda: f32,
    reg_scores: &[Vec<f32>],
    all_preds: &[Vec<Vec<i64>>],
) -> PredictionOutcome {
    let mut sets = Vec::with_capacity(reg_scores.len());
    let mut probes = Vec::with_capacity(reg_scores.len());

    for (row, preds) in reg_scores.iter().zip(all_preds) {
        let mut order: Vec<usize> = (0..row.len()).collect();
        order.sort_unstable_by(|&a, &b| row[a].total_cmp(&row[b]).then(a.cmp(&b)));

        let mut last_admitted = None;
        let mut admitted = 0usize;
        for &list_id in &order {
            if row[list_id] <= lambda {
                last_admitted = Some(list_id);
                admitted += 1;
            } else {
                break;
            }
        }

        match last_admitted {
            Some(list_id) => {
                sets.push(preds[list_id].clone());
                probes.push(Some(admitted));
            }
            None => {
                sets.push(Vec::new());
                probes.push(None);
            }
        }
    }

    PredictionOutcome { sets, probes }
}

/// Per-query miss-rate: `1 − |prediction ∩ ground_truth| / |ground_truth|`.
///
/// Sentinel ids (< 0) in a prediction never match ground truth. Rows with
/// empty ground truth were dropped at split time, so the denominator is
/// always positive here.
pub fn miss_rate_per_query(prediction_sets: &[Vec<i64>], labels: &[Vec<i64>]) -> Vec<f32> {
    prediction_sets
        .iter()
        .zip(labels)
        .map(|(pred, gt)| {
            let gt_set: HashSet<i64> = gt.iter().copied().collect();
            let pred_set: HashSet<i64> = pred.iter().copied().collect();
            let hits = pred_set.iter().filter(|id| gt_set.contains(*id)).count();
            1.0 - hits as f32 / gt_set.len() as f32
        })
        .collect()
}

/// Mean miss-rate over a split.
pub fn mean_miss_rate(prediction_sets: &[Vec<i64>], labels: &[Vec<i64>]) -> f32 {
    let rates = miss_rate_per_query(prediction_sets, labels);
    if rates.is_empty() {
        return 0.0;
    }
    rates.iter().sum::<f32>() / rates.len() as f32
}

/// Mean clusters probed over the answered queries; `None` if no query was
/// answered.
pub fn mean_probes(probes: &[Option<usize>]) -> Option<f32> {
    let answered: Vec<usize> = probes.iter().flatten().copied().collect();
    if answered.is_empty() {
        return None;
    }
    Some(answered.iter().sum::<usize>() as f32 / answered.len() as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy_preds(nq: usize, nlist: usize) -> Vec<Vec<Vec<i64>>> {
        // Snapshot at list id j for query q holds ids {0..=j} shifted by q.
        (0..nq)
            .map(|q| {
                (0..nlist)
                    .map(|j| (0..=j as i64).map(|v| v + q as i64).collect())
                    .collect()
            })
            .collect()
    }

    #[test]
    fn admits_by_ascending_score_and_returns_max_cost_snapshot() {
        let reg = vec![vec![0.1f32, 0.3, 0.5, 0.7]];
        let preds = toy_preds(1, 4);
        let out = compute_predictions(0.5, &reg, &preds);
        assert_eq!(out.probes, vec![Some(3)]);
        // Max-cost admitted list is id 2 → snapshot {0, 1, 2}.
        assert_eq!(out.sets[0], vec![0, 1, 2]);
    }

    #[test]
    fn no_admitted_list_yields_empty_prediction() {
        let reg = vec![vec![0.4f32, 0.6]];
        let preds = toy_preds(1, 2);
        let out = compute_predictions(0.1, &reg, &preds);
        assert_eq!(out.probes, vec![None]);
        assert!(out.sets[0].is_empty());
    }

    #[test]
    fn miss_rate_counts_set_overlap() {
        let preds = vec![vec![1i64, 2, 3], vec![7, 8], Vec::new()];
        let gt = vec![vec![1i64, 2, 3, 4], vec![1, 2], vec![5]];
        let rates = miss_rate_per_query(&preds, &gt);
        assert!((rates[0] - 0.25).abs() < 1e-6);
        assert!((rates[1] - 1.0).abs() < 1e-6);
        assert!((rates[2] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn duplicate_predicted_ids_count_once() {
        let preds = vec![vec![1i64, 1, 2]];
        let gt = vec![vec![1i64, 2]];
        assert!((miss_rate_per_query(&preds, &gt)[0]).abs() < 1e-6);
    }

    #[test]
    fn sentinel_ids_never_match() {
        let preds = vec![vec![-1i64, -1, 3]];
        let gt = vec![vec![3i64, 4]];
        assert!((miss_rate_per_query(&preds, &gt)[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn mean_probes_skips_unanswered() {
        assert_eq!(mean_probes(&[Some(2), None, Some(4)]), Some(3.0));
        assert_eq!(mean_probes(&[None, None]), None);
    }

    #[test]
    fn larger_lambda_admits_no_fewer_lists() {
        let reg = vec![vec![0.2f32, 0.4, 0.6, 0.8]; 3];
        let preds = toy_preds(3, 4);
        let small = compute_predictions(0.3, &reg, &preds);
        let large = compute_predictions(0.7, &reg, &preds);
        for (s, l) in small.probes.iter().zip(&large.probes) {
            assert!(s.unwrap_or(0) <= l.unwrap_or(0));
        }
    }
}
