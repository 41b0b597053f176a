//! Non-conformity score construction.
//!
//! For each query, every inverted list is probed in coarse-quantizer rank
//! order. After probing r+1 lists, the distance to the current k-th nearest
//! candidate answers "if search stopped now, how far off would it be?".
//! That distance, normalized by the per-dataset `max_distance` constant and
//! clamped to 1, is the non-conformity score of the list probed at rank r.
//!
//! Scores and snapshots are written at the list's *id* position, not at its
//! rank: adaptive search later indexes them by list id. Along the rank
//! order the raw scores are non-increasing, since probing another list can
//! only improve the heap.

use rayon::prelude::*;

use crate::conformal::KSpec;
use crate::ivf::{IvfFlatIndex, TopKHeap};
use crate::Result;

/// Per-query scores (N x L) and top-k snapshots (N x L x k), both indexed
/// by list id.
#[derive(Debug, Clone)]
pub struct ScoreMatrix {
    pub scores: Vec<Vec<f32>>,
    pub preds: Vec<Vec<Vec<i64>>>,
}

impl ScoreMatrix {
    /// Number of query rows.
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    /// Whether the matrix holds no rows.
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

/// Probe all lists for every query and assemble the score matrix.
///
/// Queries are processed in parallel; each worker owns its output row, so
/// the result is independent of scheduling. The first error from any row
/// aborts the build.
pub fn build_score_matrix(
    index: &IvfFlatIndex,
    queries: &[Vec<f32>],
    k_spec: &KSpec,
    max_distance: f32,
) -> Result<ScoreMatrix> {
    let rows: Vec<(Vec<f32>, Vec<Vec<i64>>)> = queries
        .par_iter()
        .enumerate()
        .map(|(q, query)| score_one_query(index, query, k_spec.k_for(q), max_distance))
        .collect::<Result<_>>()?;

    let mut scores = Vec::with_capacity(rows.len());
    let mut preds = Vec::with_capacity(rows.len());
    for (s, p) in rows {
        scores.push(s);
        preds.push(p);
    }
    Ok(ScoreMatrix { scores, preds })
}

fn score_one_query(
    index: &IvfFlatIndex,
    query: &[f32],
    k: usize,
    max_distance: f32,
) -> Result<(Vec<f32>, Vec<Vec<i64>>)> {
    let nlist = index.nlist();
    let ranked = index.rank_lists(query)?;

    let mut heap = TopKHeap::new(k);
    let mut scores = vec![0.0f32; nlist];
    let mut preds = vec![Vec::new(); nlist];

    for &(list_id, _) in &ranked {
        index.scan_list(list_id, query, &mut heap)?;
        // An infinite top (heap not yet full) clamps to 1.0 like any
        // distance beyond max_distance.
        scores[list_id] = (heap.top_distance() / max_distance).min(1.0);
        preds[list_id] = heap.snapshot_ids();
    }

    Ok((scores, preds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ivf::IvfFlatParams;

    fn toy_index() -> (IvfFlatIndex, Vec<Vec<f32>>) {
        let mut index = IvfFlatIndex::new(
            2,
            IvfFlatParams {
                nlist: 4,
                seed: 3,
                train_fraction: 1.0,
            },
        )
        .unwrap();
        let mut base = Vec::new();
        for &(cx, cy) in &[(0.0f32, 0.0f32), (8.0, 0.0), (0.0, 8.0), (8.0, 8.0)] {
            for step in 0..5 {
                base.push(vec![cx + step as f32 * 0.05, cy]);
            }
        }
        index.add_batch(&base).unwrap();
        index.build().unwrap();
        (index, base)
    }

    #[test]
    fn scores_are_clamped_and_rank_monotone() {
        let (index, _) = toy_index();
        let queries = vec![vec![0.1f32, 0.1], vec![7.9, 7.9], vec![4.0, 4.0]];
        let matrix =
            build_score_matrix(&index, &queries, &KSpec::Fixed(3), 50.0).unwrap();

        assert_eq!(matrix.len(), queries.len());
        for (q, row) in matrix.scores.iter().enumerate() {
            assert_eq!(row.len(), index.nlist());
            for &s in row {
                assert!((0.0..=1.0).contains(&s), "score {s} out of range");
            }

            // Along the probe order, raw scores never increase.
            let ranked = index.rank_lists(&queries[q]).unwrap();
            let in_order: Vec<f32> = ranked.iter().map(|&(id, _)| row[id]).collect();
            for pair in in_order.windows(2) {
                assert!(pair[0] >= pair[1], "raw scores increased along rank order");
            }
        }
    }

    #[test]
    fn snapshots_grow_no_worse_along_rank_order() {
        let (index, base) = toy_index();
        let query = vec![0.1f32, 0.1];
        let matrix =
            build_score_matrix(&index, std::slice::from_ref(&query), &KSpec::Fixed(2), 50.0)
                .unwrap();

        let ranked = index.rank_lists(&query).unwrap();
        let snapshot_cost = |ids: &[i64]| -> f32 {
            ids.iter()
                .map(|&id| {
                    if id < 0 {
                        1e9
                    } else {
                        crate::distance::l2_squared(&query, &base[id as usize])
                    }
                })
                .sum()
        };

        let costs: Vec<f32> = ranked
            .iter()
            .map(|&(id, _)| snapshot_cost(&matrix.preds[0][id]))
            .collect();
        for pair in costs.windows(2) {
            assert!(pair[0] >= pair[1] - 1e-4, "snapshot quality regressed");
        }
    }

    #[test]
    fn per_query_k_controls_snapshot_width() {
        let (index, _) = toy_index();
        let queries = vec![vec![0.0f32, 0.0], vec![8.0, 8.0]];
        let k_spec = KSpec::PerQuery(vec![1, 4]);
        let matrix = build_score_matrix(&index, &queries, &k_spec, 50.0).unwrap();

        for row in &matrix.preds[0] {
            assert_eq!(row.len(), 1);
        }
        for row in &matrix.preds[1] {
            assert_eq!(row.len(), 4);
        }
    }

    #[test]
    fn identical_inputs_give_identical_matrices() {
        let (index, _) = toy_index();
        let queries = vec![vec![0.3f32, 0.2], vec![6.5, 7.0], vec![1.0, 1.0]];
        let a = build_score_matrix(&index, &queries, &KSpec::Fixed(2), 50.0).unwrap();
        let b = build_score_matrix(&index, &queries, &KSpec::Fixed(2), 50.0).unwrap();
        assert_eq!(a.scores, b.scores);
        assert_eq!(a.preds, b.preds);
    }
}
