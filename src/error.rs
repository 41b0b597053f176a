//! Error types for surety.

use thiserror::Error;

/// Errors that can occur while building, calibrating, or searching an index.
#[derive(Debug, Error)]
pub enum CalibrateError {
    /// Empty query provided.
    #[error("query is empty")]
    EmptyQuery,

    /// Empty index (no vectors added).
    #[error("index is empty")]
    EmptyIndex,

    /// Invalid parameter value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Dimension mismatch between query and stored vectors.
    #[error("dimension mismatch: query has {query_dim} dimensions, index has {index_dim}")]
    DimensionMismatch { query_dim: usize, index_dim: usize },

    /// The coarse quantizer produced fewer ranked lists than the index holds.
    /// Indicates a misbuilt index; not recoverable.
    #[error("quantizer ranked {got} lists, index has {expected}")]
    QuantizerShortfall { got: usize, expected: usize },

    /// A list id outside `[0, nlist)` was requested.
    #[error("list id {list_id} out of range (nlist = {nlist})")]
    ListOutOfRange { list_id: usize, nlist: usize },

    /// I/O failure (cache files, result logs, dataset files). Cache
    /// readers treat this as a miss.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A cache file ended before the declared payload. Treated as a miss.
    #[error("cache file {key} truncated")]
    CacheTruncated { key: String },

    /// Dataset ingestion failure (fvecs/ivecs layout violations).
    #[error("dataset: {0}")]
    Dataset(String),
}

/// Result type alias for surety operations.
pub type Result<T> = std::result::Result<T, CalibrateError>;
