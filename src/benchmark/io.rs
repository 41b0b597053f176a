//! Texmex `.fvecs` / `.ivecs` readers.
//!
//! Each row is a little-endian i32 dimension header followed by that many
//! 4-byte values (f32 or i32). Every row in a file must declare the same
//! dimension, and the file size must divide evenly into rows.

use std::fs;
use std::path::Path;

use crate::{CalibrateError, Result};

/// Read an `.fvecs` file into row vectors.
pub fn read_fvecs(path: impl AsRef<Path>) -> Result<Vec<Vec<f32>>> {
    let rows = read_rows(path.as_ref())?;
    Ok(rows
        .into_iter()
        .map(|row| row.into_iter().map(f32::from_bits).collect())
        .collect())
}

/// Read an `.ivecs` file into row vectors of ids.
pub fn read_ivecs(path: impl AsRef<Path>) -> Result<Vec<Vec<i64>>> {
    let rows = read_rows(path.as_ref())?;
    Ok(rows
        .into_iter()
        .map(|row| row.into_iter().map(|v| i64::from(v as i32)).collect())
        .collect())
}

/// Shared layout walk; rows come back as raw u32 payloads.
fn read_rows(path: &Path) -> Result<Vec<Vec<u32>>> {
    let bytes = fs::read(path)?;
    if bytes.len() < 4 {
        return Err(CalibrateError::Dataset(format!(
            "{}: too short for a row header",
            path.display()
        )));
    }

    let dim = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    if !(1..1_000_000).contains(&dim) {
        return Err(CalibrateError::Dataset(format!(
            "{}: unreasonable dimension {dim}",
            path.display()
        )));
    }
    let dim = dim as usize;

    let row_bytes = (dim + 1) * 4;
    if bytes.len() % row_bytes != 0 {
        return Err(CalibrateError::Dataset(format!(
            "{}: size {} is not a multiple of the {row_bytes}-byte row",
            path.display(),
            bytes.len()
        )));
    }

    let n = bytes.len() / row_bytes;
    let mut rows = Vec::with_capacity(n);
    for i in 0..n {
        let start = i * row_bytes;
        let header = i32::from_le_bytes([
            bytes[start],
            bytes[start + 1],
            bytes[start + 2],
            bytes[start + 3],
        ]);
        if header as usize != dim {
            return Err(CalibrateError::Dataset(format!(
                "{}: row {i} declares dimension {header}, expected {dim}",
                path.display()
            )));
        }
        let row = bytes[start + 4..start + row_bytes]
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}
