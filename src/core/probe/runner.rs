/*!
Probe execution: acquisition, extraction, evaluation and aggregation.

## Flow

Acquirer → Extractor → Evaluator → Aggregator, producing one
[`ProbeOutcome`]. A `TransportFailure` from acquisition or extraction
short-circuits the remaining stages and is returned as-is.

## Injection points

- [`HttpTransport`]: HTTP client (`IsahcHttpTransport` in production)
- [`CertificateSource`]: leaf certificate retrieval (`RustlsCertificateSource`)
- [`Clock`]: current UTC instant for certificate evaluation
*/

use crate::core::probe::aggregator::aggregate;
use crate::core::probe::certificate::extract_certificate_facts;
use crate::core::probe::client::{error_for_status, HttpTransport, IsahcHttpTransport};
use crate::core::probe::config::{CertProbeConfig, HttpProbeConfig};
use crate::core::probe::debug_logger::ProbeLogger;
use crate::core::probe::evaluator::{evaluate_certificate, evaluate_http};
use crate::core::probe::tls::{CertificateSource, RustlsCertificateSource};
use crate::core::probe::types::*;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;

/// Clock abstraction for dependency injection and testing
pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Production clock using system time
#[derive(Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

fn log_results(logger: &ProbeLogger, results: &[CheckResult]) {
    for result in results {
        logger.check_result(
            result.check.as_str(),
            result.severity.label(),
            result.message.as_deref(),
        );
    }
}

fn finish(logger: &ProbeLogger, outcome: ProbeOutcome, started: Instant) -> ProbeOutcome {
    if let ProbeOutcome::Failed(failure) = &outcome {
        logger.transport_failure(failure.kind(), &failure.to_string());
    }
    logger.probe_end(
        outcome.severity().label(),
        started.elapsed().as_millis() as u64,
        outcome.exit_code(),
    );
    outcome
}

/// HTTP content probe
pub struct HttpProbe {
    config: HttpProbeConfig,
    transport: Box<dyn HttpTransport>,
    logger: Arc<ProbeLogger>,
}

impl HttpProbe {
    pub fn new(config: HttpProbeConfig, logger: Arc<ProbeLogger>) -> Self {
        let transport = Box::new(IsahcHttpTransport::new(config.max_redirects));
        Self {
            config,
            transport,
            logger,
        }
    }

    /// Configure HttpProbe with custom transport (for testing)
    pub fn with_transport(mut self, transport: Box<dyn HttpTransport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn config(&self) -> &HttpProbeConfig {
        &self.config
    }

    pub async fn run(&self) -> ProbeOutcome {
        let started = Instant::now();
        let endpoint = &self.config.endpoint;
        let url = endpoint.target.to_string();
        self.logger
            .probe_start("http", &url, endpoint.timeout.as_secs());

        let facts = match self.transport.fetch(endpoint).await {
            Ok(facts) => facts,
            Err(failure) => return finish(&self.logger, ProbeOutcome::Failed(failure), started),
        };
        if let Err(failure) = error_for_status(&facts, &url) {
            return finish(&self.logger, ProbeOutcome::Failed(failure), started);
        }

        let results = evaluate_http(&facts, &self.config.checks);
        log_results(&self.logger, &results);

        let limits = self.config.checks.response_time;
        let metrics = ProbeMetrics::Http {
            status_code: facts.status_code,
            elapsed: facts.elapsed,
            size: facts.body_len(),
            warning: limits.warning,
            critical: limits.critical,
        };

        finish(
            &self.logger,
            ProbeOutcome::Completed(aggregate(&results, metrics)),
            started,
        )
    }
}

/// TLS certificate expiry probe
pub struct CertificateProbe {
    config: CertProbeConfig,
    source: Box<dyn CertificateSource>,
    clock: Box<dyn Clock>,
    logger: Arc<ProbeLogger>,
}

impl CertificateProbe {
    pub fn new(config: CertProbeConfig, logger: Arc<ProbeLogger>) -> Result<Self, TransportFailure> {
        let source = Box::new(RustlsCertificateSource::new(logger.clone())?);
        Ok(Self {
            config,
            source,
            clock: Box::new(SystemClock),
            logger,
        })
    }

    /// Build with explicit collaborators, bypassing the rustls source
    pub fn with_parts(
        config: CertProbeConfig,
        source: Box<dyn CertificateSource>,
        clock: Box<dyn Clock>,
        logger: Arc<ProbeLogger>,
    ) -> Self {
        Self {
            config,
            source,
            clock,
            logger,
        }
    }

    /// Configure CertificateProbe with custom clock (for testing)
    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &CertProbeConfig {
        &self.config
    }

    pub async fn run(&self) -> ProbeOutcome {
        let started = Instant::now();
        let endpoint = &self.config.endpoint;
        self.logger.probe_start(
            "certificate",
            &endpoint.target.to_string(),
            endpoint.timeout.as_secs(),
        );

        let facts = match self
            .source
            .fetch_leaf(endpoint)
            .await
            .and_then(|der| extract_certificate_facts(&der))
        {
            Ok(facts) => facts,
            Err(failure) => return finish(&self.logger, ProbeOutcome::Failed(failure), started),
        };
        self.logger.debug_sync(
            "Extractor",
            "certificate_facts",
            &format!(
                "subject={} not_before={} not_after={}",
                facts.subject,
                facts.not_before.to_rfc3339(),
                facts.not_after.to_rfc3339()
            ),
        );

        let thresholds = self.config.thresholds;
        let verdict = evaluate_certificate(&facts, &thresholds, self.clock.now_utc());
        let results = [verdict.result];
        log_results(&self.logger, &results);

        let metrics = ProbeMetrics::Certificate {
            days: verdict.days,
            warning: thresholds.warning_days,
            critical: thresholds.critical_days,
        };

        finish(
            &self.logger,
            ProbeOutcome::Completed(aggregate(&results, metrics)),
            started,
        )
    }
}
