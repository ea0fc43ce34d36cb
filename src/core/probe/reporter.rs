// Monitoring-plugin output line rendering
use crate::core::probe::types::{AggregateResult, ProbeMetrics, ProbeOutcome};
use std::time::Duration;

/// Renders the single output line consumed by the monitoring supervisor
pub struct Reporter;

impl Reporter {
    pub fn new() -> Self {
        Self
    }

    /// Render `<LEVEL>: <summary>` plus the performance-data suffix
    ///
    /// Transport failures print only level and message, without perf data.
    pub fn render(&self, outcome: &ProbeOutcome) -> String {
        let result = match outcome {
            ProbeOutcome::Failed(failure) => {
                return format!("{}: {}", failure.severity().label(), failure);
            }
            ProbeOutcome::Completed(result) => result,
        };

        match result.metrics {
            ProbeMetrics::Http {
                status_code,
                elapsed,
                size,
                warning,
                critical,
            } => self.render_http(result, status_code, elapsed, size, (warning, critical)),
            ProbeMetrics::Certificate {
                days,
                warning,
                critical,
            } => format!(
                "{}: {}|days={};{};{};0",
                result.severity.label(),
                result.message.as_deref().unwrap_or_default(),
                days,
                warning,
                critical,
            ),
        }
    }

    fn render_http(
        &self,
        result: &AggregateResult,
        status_code: u16,
        elapsed: Duration,
        size: usize,
        (warning, critical): (f64, f64),
    ) -> String {
        let summary = match &result.message {
            Some(message) => format!("Status {} - {}", status_code, message),
            None => format!("Status {}", status_code),
        };
        let time = elapsed.as_secs_f64();

        format!(
            "{}: {} - {} bytes in {:.3} second response time|time={:.4};{:.4};{:.4}; size={:.2}B;;;0",
            result.severity.label(),
            summary,
            size,
            time,
            time,
            warning,
            critical,
            size as f64,
        )
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new()
    }
}
