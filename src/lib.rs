//! surety: conformally calibrated approximate nearest-neighbor search.
//!
//! An IVF index answers a query by scanning the `nprobe` inverted lists
//! closest to it. Picking `nprobe` is usually a global knob tuned by eye:
//! too low and recall silently degrades, too high and every query pays for
//! the hardest one. This crate replaces the knob with a statistical
//! contract: give it a tolerable miss-rate α, and it calibrates a
//! per-query stopping rule such that, over the query distribution, the
//! expected fraction of true top-k neighbors missed stays at or below α
//! while easy queries stop after a probe or two.
//!
//! # How it works
//!
//! Calibration probes *all* `L` lists for a set of held-out queries and
//! records, after each probe, how far the running k-th neighbor still is:
//! a non-conformity score. A RAPS-style rank penalty flattens those scores,
//! a Brent root-finder picks the threshold λ̂ whose empirical miss-rate hits
//! the finite-sample conformal target, and a small grid search chooses the
//! penalty strength that meets α with the fewest probes. At query time the
//! index probes lists in coarse-quantizer order and stops as soon as the
//! regularized score of the latest probe exceeds λ̂. See [`conformal`] for
//! the pipeline and [`ivf`] for the index.
//!
//! The guarantee is *marginal* over the calibration distribution; it is
//! not a per-query recall bound.
//!
//! # Usage
//!
//! ```rust,ignore
//! use surety::conformal::{CalibrationConfig, Calibrator, KSpec};
//! use surety::ivf::{IvfFlatIndex, IvfFlatParams};
//!
//! let mut index = IvfFlatIndex::new(128, IvfFlatParams::default())?;
//! index.add_batch(&base_vectors)?;
//! index.build()?;
//!
//! let mut calibrator = Calibrator::new(&index, CalibrationConfig {
//!     alpha: 0.05,
//!     k_spec: KSpec::Fixed(10),
//!     calib_frac: 0.5,
//!     tune_frac: 0.1,
//!     max_distance: 1_000_000.0,
//!     dataset: "sift1M".into(),
//!     cache_dir: Some("./score-cache".into()),
//! });
//! let calib = calibrator.calibrate(&queries, &ground_truth)?;
//!
//! // Steady state: per-query adaptive probing under the calibrated rule.
//! let neighbors = index.search_adaptive(&query, 10, 1_000_000.0, &calib)?;
//! ```

pub mod benchmark;
pub mod conformal;
pub mod distance;
pub mod error;
pub mod ivf;
pub mod partitioning;

pub use conformal::{CalibrationConfig, CalibrationResult, Calibrator, KSpec};
pub use error::{CalibrateError, Result};
pub use ivf::{IvfFlatIndex, IvfFlatParams};
