//! Configuration module for check_mssql_database.
//!
//! Loads runtime settings from environment variables with sensible defaults.
//! Everything that describes the check itself comes from the command line.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Directory holding rate counter samples (default: system temp dir)
    pub state_dir: PathBuf,
    /// Time allowed for one database in a multi-database check (default: 30s)
    pub target_timeout: Duration,
    /// Databases checked concurrently (default: 4)
    pub workers: usize,
    /// Accept the server certificate without validation (default: true)
    pub trust_cert: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            state_dir: env::temp_dir(),
            target_timeout: Duration::from_secs(30),
            workers: 4,
            trust_cert: true,
        }
    }
}

impl ProbeConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `CHECK_MSSQL_STATE_DIR`: counter sample directory
    /// - `CHECK_MSSQL_TARGET_TIMEOUT`: per-database timeout in seconds
    /// - `CHECK_MSSQL_WORKERS`: concurrent database checks
    /// - `CHECK_MSSQL_TRUST_CERT`: `true`/`false`
    pub fn load() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    /// Unparseable values keep their default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(dir) = lookup("CHECK_MSSQL_STATE_DIR") {
            if !dir.is_empty() {
                cfg.state_dir = PathBuf::from(dir);
            }
        }

        if let Some(secs) = lookup("CHECK_MSSQL_TARGET_TIMEOUT") {
            match secs.parse::<f64>() {
                Ok(secs) if secs > 0.0 && secs.is_finite() => {
                    cfg.target_timeout = Duration::from_secs_f64(secs);
                }
                _ => tracing::warn!(value = %secs, "Ignoring invalid CHECK_MSSQL_TARGET_TIMEOUT"),
            }
        }

        if let Some(workers) = lookup("CHECK_MSSQL_WORKERS") {
            match workers.parse::<usize>() {
                Ok(n) if n > 0 => cfg.workers = n,
                _ => tracing::warn!(value = %workers, "Ignoring invalid CHECK_MSSQL_WORKERS"),
            }
        }

        if let Some(trust) = lookup("CHECK_MSSQL_TRUST_CERT") {
            match trust.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => cfg.trust_cert = true,
                "0" | "false" | "no" => cfg.trust_cert = false,
                _ => tracing::warn!(value = %trust, "Ignoring invalid CHECK_MSSQL_TRUST_CERT"),
            }
        }

        cfg
    }
}
