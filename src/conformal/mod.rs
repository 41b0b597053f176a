//! Conformal calibration of the adaptive stopping rule.
//!
//! Given a target miss-rate α ∈ (0, 1), calibration tunes a scalar threshold
//! λ̂ so that, marginally over future queries, the expected fraction of true
//! top-k neighbors missed by early-stopped search stays at or below α,
//! while probing as few inverted lists as possible.
//!
//! # Pipeline
//!
//! ```text
//! queries + ground truth
//!        |
//!        v
//!  [scores]   probe all L lists per query, record the running k-th
//!             distance after each probe  →  score matrix + snapshot tensor
//!        |         (cached on disk, keyed by dataset / L / k-spec)
//!        v
//!  [split]    calibration / tuning / test partition by query index
//!        |
//!        v
//!  [select]   grid-search λ_reg on the tuning split
//!        |
//!        v
//!  [regularize + optimize]   RAPS-style rank penalty, then Brent on [0,1]
//!             solving  miss_rate(λ) = α'  on the calibration split
//!        |
//!        v
//!  CalibrationResult { λ̂, k_reg, λ_reg }
//! ```
//!
//! The conformal target `α' = (n+1)/n·α − 1/(n+1)` corrects for the finite
//! calibration sample of size n. The guarantee is *marginal* over the
//! calibration distribution, not per-query.
//!
//! Steady-state search needs only the three scalars in
//! [`CalibrationResult`]; see [`crate::ivf::IvfFlatIndex::search_adaptive`].
//! [`Calibrator::evaluate_test`] replays the stopping rule offline on the
//! held-out test split from cached scores, without touching the index again.

pub mod cache;
pub mod config;
pub mod driver;
pub mod evaluate;
pub mod optimize;
pub mod predict;
pub mod regularize;
pub mod scores;
pub mod select;
pub mod split;

pub use cache::ScoreCache;
pub use config::{CalibrationConfig, KSpec};
pub use driver::{CalibrationResult, Calibrator, TimeReport};
pub use evaluate::TestReport;
pub use scores::ScoreMatrix;
