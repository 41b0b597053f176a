//! Regularization-strength selection.
//!
//! λ_reg trades threshold conditioning against probe inflation: too little
//! and the root-finder crowds an endpoint, too much and late lists become
//! needlessly expensive. The selector grid-searches a small set of
//! candidates on the tuning split, keeping the one that probes the fewest
//! lists while still meeting the user's α there.

use tracing::{debug, info, warn};

use super::optimize::{conformal_target, solve_threshold};
use super::predict::{compute_predictions, mean_miss_rate, mean_probes};
use super::regularize::regularize;
use super::split::SplitData;

/// Candidate regularization strengths.
pub const LAMBDA_REG_GRID: [f32; 4] = [0.0, 0.001, 0.01, 0.1];

/// Pick a λ_reg on the tuning split.
///
/// Falls back to 0 (and logs the degradation) when the split is empty or no
/// candidate meets the α constraint; calibration then proceeds best-effort.
pub fn pick_lambda_reg(alpha: f32, k_reg: usize, nlist: usize, tune: &SplitData) -> f32 {
    if tune.is_empty() {
        warn!("tuning split is empty, defaulting lambda_reg to 0");
        return 0.0;
    }

    let target = conformal_target(alpha, tune.len());
    let mut best_probes = nlist as f32;
    let mut best_lambda = None;

    for &candidate in &LAMBDA_REG_GRID {
        let reg = regularize(&tune.scores, nlist, candidate, k_reg);
        let lamhat = solve_threshold(target, &reg, &tune.preds, &tune.labels);

        let out = compute_predictions(lamhat, &reg, &tune.preds);
        let miss = mean_miss_rate(&out.sets, &tune.labels);
        let probes = mean_probes(&out.probes);
        debug!(
            lambda_reg = candidate,
            lamhat,
            tune_miss_rate = miss,
            tune_mean_probes = probes,
            "evaluated regularization candidate"
        );

        if let Some(probes) = probes {
            if miss <= alpha && probes < best_probes {
                best_probes = probes;
                best_lambda = Some(candidate);
            }
        }
    }

    match best_lambda {
        Some(lambda) => {
            info!(lambda_reg = lambda, tune_mean_probes = best_probes, "selected lambda_reg");
            lambda
        }
        None => {
            warn!(alpha, "no lambda_reg met the miss-rate constraint on the tuning split");
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A tuning split where ground truth sits in the snapshot of the
    /// second-ranked list for every query.
    fn tune_split(nq: usize, nlist: usize) -> SplitData {
        let mut split = SplitData::default();
        for q in 0..nq {
            let base = q as i64 * 10;
            // Raw scores fall off smoothly along the list order.
            split
                .scores
                .push((0..nlist).map(|j| 0.9 - 0.2 * j as f32).collect());
            split.preds.push(
                (0..nlist)
                    .map(|j| if j == 0 { vec![base] } else { vec![base, base + 1] })
                    .collect(),
            );
            split.labels.push(vec![base, base + 1]);
        }
        split
    }

    #[test]
    fn empty_split_defaults_to_zero() {
        assert_eq!(pick_lambda_reg(0.1, 1, 8, &SplitData::default()), 0.0);
    }

    #[test]
    fn selection_comes_from_the_grid() {
        let split = tune_split(12, 4);
        let lambda = pick_lambda_reg(0.2, 1, 4, &split);
        assert!(LAMBDA_REG_GRID.contains(&lambda));
    }

    #[test]
    fn impossible_alpha_falls_back_to_zero() {
        // Ground truth absent from every snapshot: no candidate can reach
        // miss-rate ≤ α, so selection degrades to 0.
        let mut split = tune_split(6, 4);
        for labels in &mut split.labels {
            *labels = vec![-7];
        }
        assert_eq!(pick_lambda_reg(0.05, 1, 4, &split), 0.0);
    }
}
