// Core types for host health probes
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Probe severity levels, ordered for max-reduction
///
/// The discriminants double as monitoring-plugin exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, serde::Serialize)]
pub enum Severity {
    #[default]
    Ok = 0,
    Warning = 1,
    Critical = 2,
    /// Reserved for unclassifiable transport conditions, never set by a threshold check
    Unknown = 3,
}

impl Severity {
    /// Process exit code expected by the monitoring supervisor
    pub fn exit_code(self) -> i32 {
        self as i32
    }

    /// Short label printed at the start of the output line
    pub fn label(self) -> &'static str {
        match self {
            Severity::Ok => "OK",
            Severity::Warning => "WARN",
            Severity::Critical => "CRIT",
            Severity::Unknown => "UNK",
        }
    }

    pub fn is_failing(self) -> bool {
        self > Severity::Ok
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Fatal outcome of the acquisition phase
///
/// Display yields the operator-facing message. A failure bypasses
/// evaluation and aggregation entirely.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportFailure {
    #[error("Timeout reached")]
    Timeout,
    #[error("Too many redirects")]
    TooManyRedirects,
    /// DNS, refused, unreachable, tunnel and handshake failures alike
    #[error("Connect error")]
    Connect,
    /// Error status surfaced at the HTTP layer, carries the full reason line
    #[error("{0}")]
    HttpStatus(String),
    /// Peer presented no certificate, or one that does not parse
    #[error("Certificate is invalid")]
    InvalidCertificate,
    #[error("Error {0}")]
    Other(String),
}

impl TransportFailure {
    pub fn severity(&self) -> Severity {
        match self {
            TransportFailure::Timeout => Severity::Unknown,
            _ => Severity::Critical,
        }
    }

    /// Stable identifier used in debug log entries
    pub fn kind(&self) -> &'static str {
        match self {
            TransportFailure::Timeout => "timeout",
            TransportFailure::TooManyRedirects => "too_many_redirects",
            TransportFailure::Connect => "connect",
            TransportFailure::HttpStatus(_) => "http_status",
            TransportFailure::InvalidCertificate => "invalid_certificate",
            TransportFailure::Other(_) => "other",
        }
    }
}

/// Facts captured from a completed HTTP exchange
#[derive(Debug, Clone, PartialEq)]
pub struct HttpFacts {
    pub status_code: u16,
    /// Time from request start until response headers arrived
    pub elapsed: Duration,
    pub body: Vec<u8>,
}

impl HttpFacts {
    pub fn body_len(&self) -> usize {
        self.body.len()
    }

    /// Body decoded for pattern matching, invalid UTF-8 replaced
    pub fn body_text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }
}

/// Validity window and identity of the peer's leaf certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateFacts {
    pub subject: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

/// Criterion a check result belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum CheckKind {
    Pattern,
    SizeMin,
    SizeMax,
    ResponseTime,
    HttpStatus,
    CertificateValidity,
}

impl CheckKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CheckKind::Pattern => "pattern",
            CheckKind::SizeMin => "size_min",
            CheckKind::SizeMax => "size_max",
            CheckKind::ResponseTime => "response_time",
            CheckKind::HttpStatus => "http_status",
            CheckKind::CertificateValidity => "certificate_validity",
        }
    }
}

/// Outcome of one evaluated criterion
///
/// `message` is `None` when the check does not overwrite the summary,
/// e.g. a redirect status classified as WARNING.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub check: CheckKind,
    pub severity: Severity,
    pub message: Option<String>,
}

impl CheckResult {
    pub fn ok(check: CheckKind) -> Self {
        Self {
            check,
            severity: Severity::Ok,
            message: None,
        }
    }

    pub fn new(check: CheckKind, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            check,
            severity,
            message: Some(message.into()),
        }
    }

    /// Failing result that leaves the current summary untouched
    pub fn silent(check: CheckKind, severity: Severity) -> Self {
        Self {
            check,
            severity,
            message: None,
        }
    }
}

/// Numeric values for the performance-data suffix
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeMetrics {
    Http {
        status_code: u16,
        elapsed: Duration,
        size: usize,
        warning: f64,
        critical: f64,
    },
    Certificate {
        days: i64,
        warning: i64,
        critical: i64,
    },
}

/// Reduced view over all check results of one probe
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateResult {
    pub severity: Severity,
    /// Surviving summary, `None` when nothing failed and no check spoke
    pub message: Option<String>,
    pub metrics: ProbeMetrics,
}

/// Final result of one probe invocation
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    Completed(AggregateResult),
    Failed(TransportFailure),
}

impl ProbeOutcome {
    pub fn severity(&self) -> Severity {
        match self {
            ProbeOutcome::Completed(result) => result.severity,
            ProbeOutcome::Failed(failure) => failure.severity(),
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.severity().exit_code()
    }
}
