//! Rate strategy: per-second change of a cumulative counter between runs.

use super::{read_scalar, round2, ProbeContext, ProbeError};
use crate::db::{CounterKey, CounterSample};
use crate::mssql::Connection;

/// Run a rate probe.
///
/// The first run for a key records a baseline and returns `None`. Every run
/// whose query succeeds overwrites the stored sample, even when the rate
/// itself cannot be computed.
pub async fn run_rate_probe(
    conn: &mut dyn Connection,
    sql: &str,
    modifier: f64,
    ctx: &ProbeContext<'_>,
) -> Result<Option<f64>, ProbeError> {
    let raw = read_scalar(conn, sql).await?;
    let key = CounterKey::derive(ctx.host, ctx.database, sql);
    let current = CounterSample {
        timestamp: ctx.now,
        value: raw,
    };

    let result = match ctx.store.load(&key) {
        Some(previous) => rate_between(&previous, &current, modifier).map(Some),
        None => {
            tracing::info!(
                database = ctx.database,
                key = %key,
                "No previous counter sample, recording baseline"
            );
            Ok(None)
        }
    };

    ctx.store.save(&key, &current)?;
    result
}

/// `round((v1 - v0) / (t1 - t0) * modifier, 2)` with the interval in seconds.
pub fn rate_between(
    previous: &CounterSample,
    current: &CounterSample,
    modifier: f64,
) -> Result<f64, ProbeError> {
    let delta = current.timestamp - previous.timestamp;
    let elapsed = match delta.num_nanoseconds() {
        Some(ns) => ns as f64 / 1e9,
        None => delta.num_milliseconds() as f64 / 1e3,
    };

    // Also rejects a clock that went backwards
    if elapsed <= 0.0 {
        return Err(ProbeError::DegenerateInterval);
    }

    Ok(round2((current.value - previous.value) / elapsed * modifier))
}
