//! Filesystem cache for score matrices and snapshot tensors.
//!
//! Building the all-probes score matrix is by far the most expensive phase
//! of calibration, and it depends only on (dataset, L, k-spec), not on α
//! or the split fractions, so repeated experiments reuse it from disk.
//!
//! The layout is a size-prefixed recursive encoding: every vector writes its
//! length as a little-endian u64, then its elements; the innermost level
//! writes raw little-endian IEEE-754 f32 or two's-complement i64 payloads.
//! There is no version header: this is an experiment cache, not a durable
//! format. A file is trusted iff every declared byte reads back; a short
//! read surfaces as an error that callers treat as a miss.
//!
//! Writes go to a sibling temp file and rename into place, so a crashed run
//! never leaves a half-written entry under the final key.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::PathBuf;

use tracing::debug;

use crate::{CalibrateError, Result};

/// Disk cache rooted at one directory; one file per key.
#[derive(Debug, Clone)]
pub struct ScoreCache {
    root: PathBuf,
}

impl ScoreCache {
    /// Open (and create if needed) a cache rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Whether an entry exists under `key`.
    pub fn exists(&self, key: &str) -> bool {
        self.path_for(key).is_file()
    }

    /// Persist a score matrix (N x L).
    pub fn write_scores(&self, key: &str, scores: &[Vec<f32>]) -> Result<()> {
        self.write_atomic(key, |w| {
            write_len(w, scores.len())?;
            for row in scores {
                write_f32_row(w, row)?;
            }
            Ok(())
        })
    }

    /// Load a score matrix written by [`write_scores`](Self::write_scores).
    pub fn read_scores(&self, key: &str) -> Result<Vec<Vec<f32>>> {
        let mut r = self.open(key)?;
        let n = read_len(&mut r, key)?;
        let mut scores = Vec::with_capacity(n);
        for _ in 0..n {
            scores.push(read_f32_row(&mut r, key)?);
        }
        self.finish_read(r, key)?;
        Ok(scores)
    }

    /// Persist a snapshot tensor (N x L x k).
    pub fn write_preds(&self, key: &str, preds: &[Vec<Vec<i64>>]) -> Result<()> {
        self.write_atomic(key, |w| {
            write_len(w, preds.len())?;
            for per_query in preds {
                write_len(w, per_query.len())?;
                for snapshot in per_query {
                    write_i64_row(w, snapshot)?;
                }
            }
            Ok(())
        })
    }

    /// Load a snapshot tensor written by [`write_preds`](Self::write_preds).
    pub fn read_preds(&self, key: &str) -> Result<Vec<Vec<Vec<i64>>>> {
        let mut r = self.open(key)?;
        let n = read_len(&mut r, key)?;
        let mut preds = Vec::with_capacity(n);
        for _ in 0..n {
            let l = read_len(&mut r, key)?;
            let mut per_query = Vec::with_capacity(l);
            for _ in 0..l {
                per_query.push(read_i64_row(&mut r, key)?);
            }
            preds.push(per_query);
        }
        self.finish_read(r, key)?;
        Ok(preds)
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn open(&self, key: &str) -> Result<BufReader<File>> {
        Ok(BufReader::new(File::open(self.path_for(key))?))
    }

    /// Trailing bytes mean the file does not match the expected shape;
    /// reject it like a short read.
    fn finish_read(&self, mut r: BufReader<File>, key: &str) -> Result<()> {
        let mut probe = [0u8; 1];
        match r.read(&mut probe)? {
            0 => Ok(()),
            _ => Err(CalibrateError::CacheTruncated {
                key: key.to_string(),
            }),
        }
    }

    fn write_atomic(
        &self,
        key: &str,
        write: impl FnOnce(&mut BufWriter<File>) -> Result<()>,
    ) -> Result<()> {
        let final_path = self.path_for(key);
        let tmp_path = self.root.join(format!("{key}.tmp"));
        {
            let mut w = BufWriter::new(File::create(&tmp_path)?);
            write(&mut w)?;
            w.flush()?;
        }
        fs::rename(&tmp_path, &final_path)?;
        debug!(key, path = %final_path.display(), "cache entry written");
        Ok(())
    }
}

fn write_len(w: &mut impl Write, len: usize) -> Result<()> {
    w.write_all(&(len as u64).to_le_bytes())?;
    Ok(())
}

fn read_len(r: &mut impl Read, key: &str) -> Result<usize> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf).map_err(|_| short_read(key))?;
    Ok(u64::from_le_bytes(buf) as usize)
}

fn write_f32_row(w: &mut impl Write, row: &[f32]) -> Result<()> {
    write_len(w, row.len())?;
    for &v in row {
        w.write_all(&v.to_le_bytes())?;
    }
    Ok(())
}

fn read_f32_row(r: &mut impl Read, key: &str) -> Result<Vec<f32>> {
    let len = read_len(r, key)?;
    let mut buf = vec![0u8; len.checked_mul(4).ok_or_else(|| short_read(key))?];
    r.read_exact(&mut buf).map_err(|_| short_read(key))?;
    Ok(buf
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

fn write_i64_row(w: &mut impl Write, row: &[i64]) -> Result<()> {
    write_len(w, row.len())?;
    for &v in row {
        w.write_all(&v.to_le_bytes())?;
    }
    Ok(())
}

fn read_i64_row(r: &mut impl Read, key: &str) -> Result<Vec<i64>> {
    let len = read_len(r, key)?;
    let mut buf = vec![0u8; len.checked_mul(8).ok_or_else(|| short_read(key))?];
    r.read_exact(&mut buf).map_err(|_| short_read(key))?;
    Ok(buf
        .chunks_exact(8)
        .map(|c| {
            let mut b = [0u8; 8];
            b.copy_from_slice(c);
            i64::from_le_bytes(b)
        })
        .collect())
}

fn short_read(key: &str) -> CalibrateError {
    CalibrateError::CacheTruncated {
        key: key.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_matrix_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ScoreCache::new(dir.path()).unwrap();

        let scores = vec![vec![1.0f32, 2.0, 3.0], vec![4.0, 5.0, 6.0]];
        cache.write_scores("rt_scores", &scores).unwrap();
        assert!(cache.exists("rt_scores"));

        let read = cache.read_scores("rt_scores").unwrap();
        assert_eq!(read.len(), scores.len());
        for (a, b) in read.iter().flatten().zip(scores.iter().flatten()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn pred_tensor_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ScoreCache::new(dir.path()).unwrap();

        let preds = vec![
            vec![vec![1i64, 2], vec![3, 4]],
            vec![vec![5, 6], vec![7, 8]],
            vec![vec![], vec![-1, 11]],
        ];
        cache.write_preds("rt_preds", &preds).unwrap();
        assert_eq!(cache.read_preds("rt_preds").unwrap(), preds);
    }

    #[test]
    fn empty_matrix_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ScoreCache::new(dir.path()).unwrap();
        cache.write_scores("empty", &[]).unwrap();
        assert!(cache.read_scores("empty").unwrap().is_empty());
    }

    #[test]
    fn missing_key_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ScoreCache::new(dir.path()).unwrap();
        assert!(!cache.exists("unknown"));
        assert!(cache.read_scores("unknown").is_err());
    }

    #[test]
    fn truncated_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ScoreCache::new(dir.path()).unwrap();
        let scores = vec![vec![1.0f32; 8]; 4];
        cache.write_scores("trunc", &scores).unwrap();

        let path = dir.path().join("trunc");
        let full = fs::read(&path).unwrap();
        fs::write(&path, &full[..full.len() - 3]).unwrap();
        assert!(matches!(
            cache.read_scores("trunc"),
            Err(CalibrateError::CacheTruncated { .. })
        ));
    }

    #[test]
    fn trailing_garbage_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ScoreCache::new(dir.path()).unwrap();
        cache.write_scores("tail", &[vec![1.0f32]]).unwrap();

        let path = dir.path().join("tail");
        let mut bytes = fs::read(&path).unwrap();
        bytes.push(0xFF);
        fs::write(&path, bytes).unwrap();
        assert!(cache.read_scores("tail").is_err());
    }
}
