//! Threshold optimization.
//!
//! λ̂ is the root of `miss_rate(λ) − α'` on [0, 1], where
//! `α' = (n+1)/n · α − 1/(n+1)` is the finite-sample conformal correction
//! for a calibration split of size n. The miss-rate is a right-continuous,
//! non-increasing step function of λ (a larger threshold admits more lists
//! and can only shrink the miss), so the crossing is unique up to
//! tie-breaking on the right and Brent's method brackets it reliably.

use tracing::warn;

use super::predict::{compute_predictions, mean_miss_rate};

const TOLERANCE: f64 = 1e-6;
const MAX_ITER: usize = 100;

/// Finite-sample conformal target `α' = (n+1)/n · α − 1/(n+1)`.
pub fn conformal_target(alpha: f32, n: usize) -> f32 {
    let n = n as f32;
    (n + 1.0) / n * alpha - 1.0 / (n + 1.0)
}

/// Solve `miss_rate(λ̂) = target` on [0, 1] over regularized scores.
///
/// Degenerate brackets resolve along the monotone shape of the miss-rate:
/// if λ = 0 already meets the target the root is the left endpoint; if even
/// λ = 1 misses it, the target is unachievable and the permissive endpoint
/// is returned with a warning. Non-convergence within the iteration budget
/// returns the final bracket midpoint, also with a warning.
pub fn solve_threshold(
    target: f32,
    reg_scores: &[Vec<f32>],
    all_preds: &[Vec<Vec<i64>>],
    labels: &[Vec<i64>],
) -> f32 {
    let loss = |lambda: f64| -> f64 {
        let out = compute_predictions(lambda as f32, reg_scores, all_preds);
        f64::from(mean_miss_rate(&out.sets, labels)) - f64::from(target)
    };

    let mut a = 0.0f64;
    let mut b = 1.0f64;
    let mut fa = loss(a);
    let mut fb = loss(b);

    if fa <= 0.0 {
        return 0.0;
    }
    if fb > 0.0 {
        warn!(
            target,
            miss_rate_at_one = fb + f64::from(target),
            "target miss-rate unachievable even probing every list"
        );
        return 1.0;
    }

    // Brent: inverse quadratic interpolation with secant and bisection
    // fallbacks, bracket invariant maintained throughout.
    let mut c = a;
    let mut fc = fa;
    let mut d = b - a;
    let mut e = d;

    for _ in 0..MAX_ITER {
        if (fb > 0.0) == (fc > 0.0) {
            c = a;
            fc = fa;
            d = b - a;
            e = d;
        }
        if fc.abs() < fb.abs() {
            a = b;
            b = c;
            c = a;
            fa = fb;
            fb = fc;
            fc = fa;
        }

        let tol1 = 2.0 * f64::EPSILON * b.abs() + 0.5 * TOLERANCE;
        let xm = 0.5 * (c - b);
        if xm.abs() <= tol1 || fb == 0.0 {
            return b as f32;
        }

        if e.abs() >= tol1 && fa.abs() > fb.abs() {
            let s = fb / fa;
            let (mut p, mut q);
            if a == c {
                // Secant step.
                p = 2.0 * xm * s;
                q = 1.0 - s;
            } else {
                // Inverse quadratic interpolation.
                let q1 = fa / fc;
                let r = fb / fc;
                p = s * (2.0 * xm * q1 * (q1 - r) - (b - a) * (r - 1.0));
                q = (q1 - 1.0) * (r - 1.0) * (s - 1.0);
            }
            if p > 0.0 {
                q = -q;
            }
            p = p.abs();

            let min1 = 3.0 * xm * q - (tol1 * q).abs();
            let min2 = (e * q).abs();
            if 2.0 * p < min1.min(min2) {
                e = d;
                d = p / q;
            } else {
                d = xm;
                e = d;
            }
        } else {
            d = xm;
            e = d;
        }

        a = b;
        fa = fb;
        if d.abs() > tol1 {
            b += d;
        } else {
            b += if xm > 0.0 { tol1 } else { -tol1 };
        }
        fb = loss(b);
    }

    let midpoint = 0.5 * (b + c);
    warn!(
        midpoint,
        max_iter = MAX_ITER,
        "threshold search did not converge, returning bracket midpoint"
    );
    midpoint as f32
}
