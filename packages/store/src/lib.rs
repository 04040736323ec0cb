#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! File persistence boundary for the dashboard data toolchain.
//!
//! The processing core works entirely on in-memory values; this crate
//! owns the file layout under the `data/` directory and the (de)serialization
//! of every artifact: the persisted incident table, cumulative counts,
//! court side files, homicide totals, and the `meta.json` stamp.
//!
//! Every write goes through a temp-file-plus-rename so an aborted run
//! never leaves a half-written artifact behind.

pub mod courts;
pub mod homicides;
pub mod incidents;
pub mod paths;

use std::path::Path;

/// Errors raised at the persistence boundary.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// I/O error (file read/write/rename).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV (de)serialization failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A persisted file does not have the expected shape.
    #[error("malformed data file {path}: {message}")]
    Malformed {
        /// Offending file.
        path: String,
        /// What was wrong.
        message: String,
    },
}

/// Serializes a value as JSON and writes it atomically.
///
/// # Errors
///
/// Returns [`StoreError`] if serialization or the write/rename fails.
pub fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let body = serde_json::to_string(value)?;
    write_atomic(path, body.as_bytes())
}

/// Writes bytes to `path` via a sibling temp file and rename.
///
/// # Errors
///
/// Returns [`StoreError`] if the write or rename fails.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        paths::ensure_dir(parent)?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Writes the `meta.json` last-updated stamp.
///
/// # Errors
///
/// Returns [`StoreError`] if the write fails.
pub fn write_meta(path: &Path, last_updated: &str) -> Result<(), StoreError> {
    let meta = serde_json::json!({ "last_updated": last_updated });
    write_json_atomic(path, &meta)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_write_replaces_content() {
        let path = std::env::temp_dir().join(format!(
            "gv_store_atomic_{}.json",
            std::process::id()
        ));
        write_json_atomic(&path, &serde_json::json!({"a": 1})).unwrap();
        write_json_atomic(&path, &serde_json::json!({"a": 2})).unwrap();

        let body = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(body, r#"{"a":2}"#);
        assert!(!path.with_extension("tmp").exists());
    }
}
