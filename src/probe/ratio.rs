//! Ratio strategy: a counter divided by its base counter.

use super::{round2, ProbeError};
use crate::mssql::Connection;

/// Run a ratio probe over the first column of every returned row.
pub async fn run_ratio_probe(
    conn: &mut dyn Connection,
    sql: &str,
    modifier: f64,
) -> Result<f64, ProbeError> {
    let rows = conn.query(sql).await?;

    let values = rows
        .iter()
        .map(|row| {
            let cell = row
                .first()
                .ok_or_else(|| ProbeError::MalformedResult("row has no columns".to_string()))?;
            cell.as_f64().ok_or_else(|| {
                ProbeError::MalformedResult(format!("expected a number, got {}", cell))
            })
        })
        .collect::<Result<Vec<f64>, _>>()?;

    ratio(&values, modifier)
}

/// `round(values[0] / values[1] * modifier, 2)`. Extra rows are ignored.
pub fn ratio(values: &[f64], modifier: f64) -> Result<f64, ProbeError> {
    match values {
        [numerator, denominator, ..] => {
            if *denominator == 0.0 {
                return Err(ProbeError::MalformedResult(
                    "ratio base counter is zero".to_string(),
                ));
            }
            Ok(round2(numerator / denominator * modifier))
        }
        _ => Err(ProbeError::InsufficientRows {
            expected: 2,
            actual: values.len(),
        }),
    }
}
