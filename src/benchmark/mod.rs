//! Dataset utilities for experiments and tests.
//!
//! Synthetic generators produce clustered or uniform vectors with exact
//! brute-force ground truth, so calibration can be exercised without the
//! standard corpora on disk. The I/O helpers read the Texmex `.fvecs` /
//! `.ivecs` layout those corpora ship in.

pub mod datasets;
pub mod io;

pub use datasets::{
    create_clustered_dataset, create_uniform_dataset, ground_truth_fixed_k,
    ground_truth_per_query_k, Dataset,
};
pub use io::{read_fvecs, read_ivecs};
