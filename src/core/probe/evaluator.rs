//! Threshold evaluation
//!
//! HTTP checks run in a fixed order: pattern, size bounds, response time,
//! status code. The order is significant, the aggregator keeps the message
//! of the last failing check. Certificate evaluation is a single composite
//! decision over the validity window.

use crate::core::probe::config::{ExpiryThresholds, HttpChecks};
use crate::core::probe::types::{CertificateFacts, CheckKind, CheckResult, HttpFacts, Severity};
use chrono::{DateTime, Utc};

const SECONDS_PER_DAY: i64 = 86_400;

/// Run every configured HTTP check against the captured facts
///
/// Unconfigured checks are skipped entirely; the status check always runs.
pub fn evaluate_http(facts: &HttpFacts, checks: &HttpChecks) -> Vec<CheckResult> {
    let mut results = Vec::with_capacity(5);

    if let Some(pattern) = &checks.pattern {
        results.push(if pattern.is_match(&facts.body_text()) {
            CheckResult::ok(CheckKind::Pattern)
        } else {
            CheckResult::new(CheckKind::Pattern, Severity::Critical, "Pattern not found")
        });
    }

    if let Some(bounds) = checks.size {
        let size = facts.body_len();
        results.push(if size < bounds.min {
            CheckResult::new(CheckKind::SizeMin, Severity::Critical, "Response too small")
        } else {
            CheckResult::ok(CheckKind::SizeMin)
        });
        results.push(if size > bounds.max {
            CheckResult::new(CheckKind::SizeMax, Severity::Critical, "Response too large")
        } else {
            CheckResult::ok(CheckKind::SizeMax)
        });
    }

    let limits = checks.response_time;
    if limits.armed_critical().is_some() || limits.armed_warning().is_some() {
        results.push(evaluate_response_time(facts.elapsed_secs(), checks));
    }

    results.push(evaluate_status(facts.status_code));
    results
}

fn evaluate_response_time(elapsed: f64, checks: &HttpChecks) -> CheckResult {
    let limits = checks.response_time;
    match (limits.armed_critical(), limits.armed_warning()) {
        (Some(critical), _) if elapsed > critical => CheckResult::new(
            CheckKind::ResponseTime,
            Severity::Critical,
            "Response too slow",
        ),
        (_, Some(warning)) if elapsed > warning => CheckResult::new(
            CheckKind::ResponseTime,
            Severity::Warning,
            "Response too slow",
        ),
        _ => CheckResult::ok(CheckKind::ResponseTime),
    }
}

/// Redirect statuses warn, any other non-200 status is critical
///
/// Neither failure carries a message, so an earlier check's summary survives.
pub fn evaluate_status(status_code: u16) -> CheckResult {
    match status_code {
        200 => CheckResult::ok(CheckKind::HttpStatus),
        301 | 302 => CheckResult::silent(CheckKind::HttpStatus, Severity::Warning),
        _ => CheckResult::silent(CheckKind::HttpStatus, Severity::Critical),
    }
}

/// Whole days plus leftover seconds of a non-negative interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Remaining {
    pub days: i64,
    pub seconds: i64,
}

impl Remaining {
    /// Split `to - from`, floored to whole seconds, into days and leftover seconds
    pub fn between(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        let total = (to - from).num_seconds();
        Self {
            days: total.div_euclid(SECONDS_PER_DAY),
            seconds: total.rem_euclid(SECONDS_PER_DAY),
        }
    }

    pub fn hours(&self) -> i64 {
        self.seconds / 3600
    }

    pub fn minutes(&self) -> i64 {
        self.seconds / 60
    }

    /// Largest unit that still says something: days, then hours above one, then minutes
    pub fn describe(&self) -> String {
        if self.days > 0 {
            format!("{} days", self.days)
        } else if self.hours() > 1 {
            format!("{} hours", self.hours())
        } else {
            format!("{} minutes", self.minutes())
        }
    }
}

/// Composite certificate decision together with the day count reported as perf data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateVerdict {
    pub result: CheckResult,
    /// Days until expiry, or days since expiry once expired
    pub days: i64,
}

/// Evaluate the certificate validity window at instant `now`
pub fn evaluate_certificate(
    facts: &CertificateFacts,
    thresholds: &ExpiryThresholds,
    now: DateTime<Utc>,
) -> CertificateVerdict {
    let expired = now > facts.not_after;
    let remaining = if expired {
        Remaining::between(facts.not_after, now)
    } else {
        Remaining::between(now, facts.not_after)
    };
    let subject = &facts.subject;
    let kind = CheckKind::CertificateValidity;

    let result = if now < facts.not_before {
        CheckResult::new(kind, Severity::Critical, "Certificate is invalid")
    } else if expired {
        CheckResult::new(
            kind,
            Severity::Critical,
            format!(
                "Certificate '{}' expired {} days ago",
                subject, remaining.days
            ),
        )
    } else if thresholds
        .armed_critical()
        .is_some_and(|critical| critical > remaining.days)
    {
        CheckResult::new(
            kind,
            Severity::Critical,
            format!("Certificate '{}' expires in {}", subject, remaining.describe()),
        )
    } else if thresholds
        .armed_warning()
        .is_some_and(|warning| warning > remaining.days)
    {
        CheckResult::new(
            kind,
            Severity::Warning,
            format!(
                "Certificate '{}' expires in {} days",
                subject, remaining.days
            ),
        )
    } else {
        CheckResult::new(
            kind,
            Severity::Ok,
            format!(
                "Certificate '{}' valid until {} UTC",
                subject,
                facts.not_after.format("%Y-%m-%d, %H:%M")
            ),
        )
    };

    CertificateVerdict {
        result,
        days: remaining.days,
    }
}
