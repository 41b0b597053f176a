//! RAPS-style score regularization.
//!
//! Raw scores give every list the same marginal cost regardless of how far
//! down the ranking it sits, which crowds the optimal threshold against an
//! endpoint of [0, 1]. The rank penalty inflates the cost of late-ranked
//! lists so the root-finder works in the interior:
//!
//! ```text
//! E_q[ℓ] = ((1 − s_q[ℓ]) + λ_reg · max(0, rank_of(ℓ) − k_reg)) / M
//! M      = (1 + λ_reg · (L − k_reg)) + 10
//! ```
//!
//! `rank_of(ℓ)` is the 1-based position of ℓ when lists are ordered by
//! descending raw score. The `+10` slack keeps every regularized score
//! strictly below 1.

/// Penalty added to a list at 1-based rank `rank`.
#[inline]
pub fn rank_penalty(rank: usize, lambda_reg: f32, k_reg: usize) -> f32 {
    lambda_reg * rank.saturating_sub(k_reg) as f32
}

/// Normalization constant bounding `(1 − s) + penalty` from above.
#[inline]
pub fn max_regularized_value(nlist: usize, k_reg: usize, lambda_reg: f32) -> f32 {
    (1.0 + lambda_reg * nlist.saturating_sub(k_reg) as f32) + 10.0
}

/// Regularize one score matrix (rows are queries, columns are list ids).
///
/// Ties in raw score rank by ascending list id so the output is identical
/// across runs.
pub fn regularize(
    scores: &[Vec<f32>],
    nlist: usize,
    lambda_reg: f32,
    k_reg: usize,
) -> Vec<Vec<f32>> {
    let max_reg = max_regularized_value(nlist, k_reg, lambda_reg);

    scores
        .iter()
        .map(|row| {
            let mut order: Vec<usize> = (0..row.len()).collect();
            order.sort_unstable_by(|&a, &b| row[b].total_cmp(&row[a]).then(a.cmp(&b)));

            let mut regularized = vec![0.0f32; row.len()];
            for (pos, &list_id) in order.iter().enumerate() {
                let cost = (1.0 - row[list_id]) + rank_penalty(pos + 1, lambda_reg, k_reg);
                regularized[list_id] = cost / max_reg;
            }
            regularized
        })
        .collect()
}
