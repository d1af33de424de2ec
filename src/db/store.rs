//! File-backed counter store.
//!
//! Each key owns one JSON file in the state directory, overwritten on every
//! save. Writers are not coordinated: two processes checking the same
//! server, database and query at the same moment can overwrite each other's
//! sample.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use tempfile::NamedTempFile;
use thiserror::Error;

use super::models::*;

const FILE_PREFIX: &str = "check_mssql-";

/// Counter store error types.
#[derive(Error, Debug)]
pub enum StateError {
    #[error("failed to persist counter sample to {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode counter sample: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Single-slot sample storage keyed by [`CounterKey`].
#[derive(Debug, Clone)]
pub struct CounterStore {
    dir: PathBuf,
}

impl CounterStore {
    /// Create a store rooted at `dir`. The directory must already exist.
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the record for `key`.
    pub fn path_for(&self, key: &CounterKey) -> PathBuf {
        self.dir.join(format!("{}{}.json", FILE_PREFIX, key))
    }

    /// Load the previous sample for `key`.
    ///
    /// Missing, unreadable and corrupt records all read as `None`.
    pub fn load(&self, key: &CounterKey) -> Option<CounterSample> {
        let path = self.path_for(key);
        let contents = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Cannot read counter sample"
                    );
                }
                return None;
            }
        };

        match serde_json::from_str(&contents) {
            Ok(sample) => Some(sample),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Discarding corrupt counter sample"
                );
                None
            }
        }
    }

    /// Replace the sample for `key`.
    ///
    /// The record is written to a temporary file in the same directory and
    /// renamed into place, so readers never see a partial record.
    pub fn save(&self, key: &CounterKey, sample: &CounterSample) -> Result<(), StateError> {
        let path = self.path_for(key);
        let encoded = serde_json::to_vec(sample)?;
        let io_error = |source: io::Error| StateError::Io {
            path: path.clone(),
            source,
        };

        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(io_error)?;
        tmp.write_all(&encoded).map_err(io_error)?;
        tmp.persist(&path).map_err(|e| io_error(e.error))?;

        tracing::debug!(path = %path.display(), value = sample.value, "Saved counter sample");
        Ok(())
    }
}
