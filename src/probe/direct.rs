//! Direct strategy: one scalar, scaled by the modifier.

use super::{round2, ProbeError};
use crate::mssql::Connection;

/// Read the first column of the first row as a number.
pub async fn read_scalar(conn: &mut dyn Connection, sql: &str) -> Result<f64, ProbeError> {
    let rows = conn.query(sql).await?;

    let cell = rows
        .first()
        .and_then(|row| row.first())
        .ok_or_else(|| ProbeError::QueryExecution("query returned no rows".to_string()))?;

    cell.as_f64()
        .ok_or_else(|| ProbeError::MalformedResult(format!("expected a number, got {}", cell)))
}

/// Run a direct probe. Returns `round(raw * modifier, 2)`.
pub async fn run_direct_probe(
    conn: &mut dyn Connection,
    sql: &str,
    modifier: f64,
) -> Result<f64, ProbeError> {
    let raw = read_scalar(conn, sql).await?;
    Ok(round2(raw * modifier))
}
