//! Counter store model types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One persisted observation of a raw counter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CounterSample {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Identity of a persisted counter: a SHA-256 digest of the server,
/// database and query that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CounterKey(String);

impl CounterKey {
    /// Derive the key for a (host, database, query) triple.
    ///
    /// Each part is length-prefixed so that no two distinct triples hash the
    /// same input, whatever characters they contain.
    pub fn derive(host: &str, database: &str, query: &str) -> Self {
        let mut hasher = Sha256::new();
        for part in [host, database, query] {
            hasher.update((part.len() as u64).to_be_bytes());
            hasher.update(part.as_bytes());
        }
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CounterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
