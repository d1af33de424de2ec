//! Result classification and performance data formatting.

use std::fmt;

use super::Thresholds;

/// Plugin status, in increasing order of severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Status {
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl Status {
    /// Process exit code understood by the monitoring supervisor.
    pub fn exit_code(self) -> i32 {
        match self {
            Status::Ok => 0,
            Status::Warning => 1,
            Status::Critical => 2,
            Status::Unknown => 3,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Ok => "OK",
            Status::Warning => "WARNING",
            Status::Critical => "CRITICAL",
            Status::Unknown => "UNKNOWN",
        })
    }
}

/// Outcome of evaluating one query against one database.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationResult {
    /// `None` when a rate check only recorded its baseline.
    pub value: Option<f64>,
    pub status: Status,
    pub perfdata: String,
}

/// Classify a result against the thresholds. Critical wins over warning.
///
/// A missing value is never alerted on.
pub fn classify(
    value: Option<f64>,
    thresholds: &Thresholds,
    label: &str,
    unit: &str,
) -> EvaluationResult {
    let status = match value {
        Some(v) if thresholds.critical_matches(v) => Status::Critical,
        Some(v) if thresholds.warning_matches(v) => Status::Warning,
        _ => Status::Ok,
    };

    EvaluationResult {
        value,
        status,
        perfdata: perfdata_token(label, value, unit, thresholds),
    }
}

/// Format `'label'=value[unit];warn;crit;;`.
///
/// A missing value is written as `U` without a unit.
pub fn perfdata_token(
    label: &str,
    value: Option<f64>,
    unit: &str,
    thresholds: &Thresholds,
) -> String {
    let value = match value {
        Some(v) => format!("{}{}", format_value(v), unit),
        None => "U".to_string(),
    };
    format!(
        "'{}'={};{};{};;",
        label,
        value,
        thresholds.warning_raw(),
        thresholds.critical_raw()
    )
}

/// Render a result the way existing perfdata consumers expect: whole
/// numbers keep a trailing `.0`.
pub fn format_value(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}
