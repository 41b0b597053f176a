//! IVF-Flat: inverted file over exact vectors.
//!
//! The database is partitioned into `nlist` Voronoi cells by a coarse
//! quantizer (k-means over L2); each cell owns an inverted list of the
//! vectors assigned to it. A query scans some subset of lists:
//!
//! ```text
//!           Query
//!             |
//!     +-------+-------+
//!     |               |
//!   List 3          List 7      (ranked by centroid distance)
//!   |__|__|         |__|__|
//!   v  v  v         v  v  v
//!  [vectors]       [vectors]    (exact L2 within each list)
//! ```
//!
//! How many lists to scan is the whole game. A fixed `nprobe` spends the
//! same effort on every query regardless of how hard it is; [`search`]
//! exposes that baseline. [`search_adaptive`] instead stops per query: after
//! each probe it folds the running k-th distance into a regularized
//! non-conformity score and compares it against a conformally calibrated
//! threshold λ̂ (see [`crate::conformal`]), so easy queries stop after a
//! probe or two while hard ones keep going.
//!
//! No compression: lists store vector ids and distances are computed against
//! the original vectors. The calibration machinery only ever consumes the
//! three capabilities exposed here ([`IvfFlatIndex::rank_lists`],
//! [`IvfFlatIndex::scan_list`], and the [`heap::TopKHeap`] read-backs), so
//! swapping in a compressed list scan would not touch it.
//!
//! [`search`]: IvfFlatIndex::search
//! [`search_adaptive`]: IvfFlatIndex::search_adaptive

pub mod heap;
pub mod search;

pub use heap::TopKHeap;
pub use search::{IvfFlatIndex, IvfFlatParams};
