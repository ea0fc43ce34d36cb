//! Severity aggregation
//!
//! Reduces per-check results to one severity and one surviving message.

use crate::core::probe::types::{AggregateResult, CheckResult, ProbeMetrics, Severity};

/// Maximum severity over all results, `Ok` for an empty sequence
pub fn max_severity(results: &[CheckResult]) -> Severity {
    results
        .iter()
        .map(|result| result.severity)
        .fold(Severity::Ok, Severity::max)
}

/// Message surviving evaluation order
///
/// Each failing check that carries a message overwrites the previous one,
/// so the last one in sequence wins regardless of severity. When nothing
/// failed, the last message of a passing check is used, if any.
pub fn surviving_message(results: &[CheckResult]) -> Option<String> {
    let last_failing = results
        .iter()
        .rev()
        .filter(|result| result.severity.is_failing())
        .find_map(|result| result.message.clone());

    last_failing.or_else(|| {
        if results.iter().any(|result| result.severity.is_failing()) {
            None
        } else {
            results.iter().rev().find_map(|result| result.message.clone())
        }
    })
}

/// Combine check results and metrics into the aggregate reported for the probe
pub fn aggregate(results: &[CheckResult], metrics: ProbeMetrics) -> AggregateResult {
    AggregateResult {
        severity: max_severity(results),
        message: surviving_message(results),
        metrics,
    }
}
