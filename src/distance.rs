//! Distance kernels shared by the coarse quantizer, list scans, and
//! brute-force ground truth.
//!
//! Everything here is plain L2. The index ranks inverted lists and scans
//! stored vectors with [`l2_squared`] (ordering-preserving, no sqrt); the
//! calibration scores are derived from those same squared distances, so the
//! `MaxDistance` normalization constant is expressed in squared-L2 units.

/// L2 (Euclidean) distance.
#[inline]
#[must_use]
pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    l2_squared(a, b).sqrt()
}

/// Squared L2 distance (avoids the sqrt, preserves ordering).
///
/// If dimensions mismatch, returns `f32::INFINITY` so the pair is never
/// selected as a nearest neighbor.
#[inline]
#[must_use]
pub fn l2_squared(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn l2_squared_of_identical_is_zero() {
        let a = [1.0_f32, 2.0, 3.0];
        assert!(l2_squared(&a, &a).abs() < 1e-10);
    }

    #[test]
    fn l2_distance_matches_hand_computation() {
        let a = [0.0_f32, 0.0];
        let b = [3.0_f32, 4.0];
        assert!((l2_distance(&a, &b) - 5.0).abs() < 1e-6);
        assert!((l2_squared(&a, &b) - 25.0).abs() < 1e-6);
    }

    #[test]
    fn mismatched_dims_are_never_nearest() {
        let a = [1.0_f32, 2.0];
        let b = [1.0_f32, 2.0, 3.0];
        assert_eq!(l2_squared(&a, &b), f32::INFINITY);
    }
}
