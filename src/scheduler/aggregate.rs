//! Roll per-database results up into one report line.

use std::collections::BTreeMap;

use super::TargetOutcome;
use crate::threshold::Status;

/// Combined result of a multi-database check.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateReport {
    pub status: Status,
    /// Report text without the status prefix, perf data included.
    pub message: String,
}

/// Overall status from the number of critical and warning databases.
///
/// Criticals win ties as long as there is at least one.
pub fn overall_status(criticals: usize, warnings: usize) -> Status {
    if criticals >= warnings && criticals > 0 {
        Status::Critical
    } else if warnings > criticals {
        Status::Warning
    } else {
        Status::Ok
    }
}

/// Build the report for a finished batch.
///
/// Databases that could not be checked are listed separately. They turn an
/// otherwise OK batch into UNKNOWN but never mask a warning or critical.
pub fn aggregate(
    results: &BTreeMap<String, TargetOutcome>,
    mode_description: &str,
    perfdata: bool,
) -> AggregateReport {
    let mut criticals = Vec::new();
    let mut warnings = Vec::new();
    let mut failures = Vec::new();
    let mut tokens = Vec::new();

    for (name, outcome) in results {
        match outcome {
            TargetOutcome::Evaluated(result) => {
                tokens.push(result.perfdata.as_str());
                match result.status {
                    Status::Critical => criticals.push(name.as_str()),
                    Status::Warning => warnings.push(name.as_str()),
                    _ => {}
                }
            }
            TargetOutcome::Failed(_) => failures.push(name.as_str()),
        }
    }

    let mut status = overall_status(criticals.len(), warnings.len());
    if status == Status::Ok && !failures.is_empty() {
        status = Status::Unknown;
    }

    let mut message = format!(
        "{} database(s) checked for {}.",
        results.len(),
        mode_description.to_lowercase()
    );
    if !criticals.is_empty() {
        message.push_str(&format!(
            " {} in a critical state ({}).",
            criticals.len(),
            criticals.join(", ")
        ));
    }
    if !warnings.is_empty() {
        message.push_str(&format!(
            " {} in a warning state ({}).",
            warnings.len(),
            warnings.join(", ")
        ));
    }
    if !failures.is_empty() {
        message.push_str(&format!(
            " {} could not be checked ({}).",
            failures.len(),
            failures.join(", ")
        ));
    }
    if perfdata && !tokens.is_empty() {
        message.push('|');
        message.push_str(&tokens.join(" "));
    }

    AggregateReport {
        status,
        message,
    }
}
