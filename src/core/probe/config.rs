//! Probe configuration and validation
//!
//! Operator input is validated once, before any network activity, into
//! immutable structs that are passed by reference to every component.

use crate::core::probe::tunnel::{ProxyDescriptor, ProxyParseError};
use regex::{Regex, RegexBuilder};
use std::time::Duration;

pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 8;
pub const DEFAULT_TLS_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_TLS_PORT: u16 = 443;
pub const DEFAULT_WARNING_DAYS: i64 = 30;
pub const DEFAULT_CRITICAL_DAYS: i64 = 0;
pub const DEFAULT_MAX_REDIRECTS: u32 = 30;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Valid URL required!")]
    MissingUrl,
    #[error("Valid URL required! ({0})")]
    InvalidUrl(String),
    #[error("Domain required!")]
    MissingDomain,
    #[error("Warning and critical must both be given!")]
    UnpairedThresholds,
    #[error("Warning and critical must be non-negative numbers!")]
    NegativeThreshold,
    #[error("Warning have to be smaller than critical!")]
    WarningNotBelowCritical,
    #[error("Warning days have to be greater than critical days!")]
    WarningDaysNotAboveCritical,
    #[error("Invalid regex: {0}")]
    InvalidPattern(#[from] regex::Error),
    #[error("Invalid proxy: {0}")]
    InvalidProxy(#[from] ProxyParseError),
    #[error("Timeout must be at least one second")]
    InvalidTimeout,
}

/// What a probe connects to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Url(String),
    Host { domain: String, port: u16 },
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Url(url) => f.write_str(url),
            Target::Host { domain, port } => write!(f, "{}:{}", domain, port),
        }
    }
}

/// Endpoint to probe, created from validated operator input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointSpec {
    pub target: Target,
    pub proxy: Option<ProxyDescriptor>,
    pub timeout: Duration,
}

/// Inclusive body-size bounds in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeBounds {
    pub min: usize,
    pub max: usize,
}

/// Response-time limits in seconds, a value of zero leaves the limit unarmed
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ResponseTimeThresholds {
    pub warning: f64,
    pub critical: f64,
}

impl ResponseTimeThresholds {
    pub fn armed_warning(&self) -> Option<f64> {
        (self.warning > 0.0).then_some(self.warning)
    }

    pub fn armed_critical(&self) -> Option<f64> {
        (self.critical > 0.0).then_some(self.critical)
    }
}

/// Checks applied to an HTTP response
#[derive(Debug, Clone, Default)]
pub struct HttpChecks {
    /// Compiled case-insensitive body pattern
    pub pattern: Option<Regex>,
    pub size: Option<SizeBounds>,
    pub response_time: ResponseTimeThresholds,
}

/// Day counts before expiry, a threshold is armed only when positive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryThresholds {
    pub warning_days: i64,
    pub critical_days: i64,
}

impl Default for ExpiryThresholds {
    fn default() -> Self {
        Self {
            warning_days: DEFAULT_WARNING_DAYS,
            critical_days: DEFAULT_CRITICAL_DAYS,
        }
    }
}

impl ExpiryThresholds {
    pub fn armed_warning(&self) -> Option<i64> {
        (self.warning_days > 0).then_some(self.warning_days)
    }

    pub fn armed_critical(&self) -> Option<i64> {
        (self.critical_days > 0).then_some(self.critical_days)
    }
}

#[derive(Debug, Clone)]
pub struct HttpProbeConfig {
    pub endpoint: EndpointSpec,
    pub max_redirects: u32,
    pub checks: HttpChecks,
}

#[derive(Debug, Clone)]
pub struct CertProbeConfig {
    pub endpoint: EndpointSpec,
    pub thresholds: ExpiryThresholds,
}

impl CertProbeConfig {
    pub fn domain(&self) -> &str {
        match &self.endpoint.target {
            Target::Host { domain, .. } => domain,
            Target::Url(url) => url,
        }
    }
}

/// Raw HTTP-mode input as collected from the command line
#[derive(Debug, Clone, Default)]
pub struct HttpProbeInput {
    pub url: Option<String>,
    pub proxy: Option<String>,
    pub timeout_secs: u64,
    pub regex: Option<String>,
    pub size: Option<(usize, usize)>,
    pub warning: f64,
    pub critical: f64,
    pub max_redirects: u32,
}

/// Raw certificate-mode input as collected from the command line
#[derive(Debug, Clone, Default)]
pub struct CertProbeInput {
    pub domain: Option<String>,
    pub port: u16,
    pub proxy: Option<String>,
    pub timeout_secs: u64,
    pub warning_days: i64,
    pub critical_days: i64,
}

fn validate_timeout(secs: u64) -> Result<Duration, ConfigError> {
    if secs == 0 {
        return Err(ConfigError::InvalidTimeout);
    }
    Ok(Duration::from_secs(secs))
}

impl HttpProbeConfig {
    pub fn from_input(input: HttpProbeInput) -> Result<Self, ConfigError> {
        let url = input
            .url
            .filter(|u| !u.is_empty())
            .ok_or(ConfigError::MissingUrl)?;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::MissingUrl);
        }
        url::Url::parse(&url).map_err(|e| ConfigError::InvalidUrl(e.to_string()))?;

        let thresholds = ResponseTimeThresholds {
            warning: input.warning,
            critical: input.critical,
        };
        let valid = |secs: f64| secs.is_finite() && secs >= 0.0;
        if !valid(thresholds.warning) || !valid(thresholds.critical) {
            return Err(ConfigError::NegativeThreshold);
        }
        if thresholds.armed_warning().is_some() != thresholds.armed_critical().is_some() {
            return Err(ConfigError::UnpairedThresholds);
        }
        if thresholds.armed_warning().is_some() && thresholds.warning >= thresholds.critical {
            return Err(ConfigError::WarningNotBelowCritical);
        }

        let pattern = input
            .regex
            .as_deref()
            .map(|p| RegexBuilder::new(p).case_insensitive(true).build())
            .transpose()?;

        let proxy = input
            .proxy
            .as_deref()
            .map(ProxyDescriptor::parse_url)
            .transpose()?;

        Ok(Self {
            endpoint: EndpointSpec {
                target: Target::Url(url),
                proxy,
                timeout: validate_timeout(input.timeout_secs)?,
            },
            max_redirects: input.max_redirects,
            checks: HttpChecks {
                pattern,
                size: input.size.map(|(min, max)| SizeBounds { min, max }),
                response_time: thresholds,
            },
        })
    }
}

impl CertProbeConfig {
    pub fn from_input(input: CertProbeInput) -> Result<Self, ConfigError> {
        let domain = input
            .domain
            .filter(|d| !d.is_empty())
            .ok_or(ConfigError::MissingDomain)?;

        let thresholds = ExpiryThresholds {
            warning_days: input.warning_days,
            critical_days: input.critical_days,
        };
        if let (Some(warning), Some(critical)) =
            (thresholds.armed_warning(), thresholds.armed_critical())
        {
            if warning <= critical {
                return Err(ConfigError::WarningDaysNotAboveCritical);
            }
        }

        let proxy = input
            .proxy
            .as_deref()
            .map(ProxyDescriptor::parse_authority)
            .transpose()?;

        Ok(Self {
            endpoint: EndpointSpec {
                target: Target::Host {
                    domain,
                    port: input.port,
                },
                proxy,
                timeout: validate_timeout(input.timeout_secs)?,
            },
            thresholds,
        })
    }
}
