//! HTTP transport for content probes
//!
//! Provides the HTTP client abstraction used by `HttpProbe`: a single GET
//! with bounded redirects, optional proxy, full response body and
//! classified failures.

use crate::core::probe::config::{EndpointSpec, Target};
use crate::core::probe::types::{HttpFacts, TransportFailure};
use std::time::Instant;

use isahc::config::{Configurable, RedirectPolicy};
use isahc::error::ErrorKind;
use isahc::http::{StatusCode, Uri};
use isahc::{AsyncReadResponseExt, HttpClient, Request};

/// HTTP client abstraction for dependency injection and testing
#[async_trait::async_trait]
pub trait HttpTransport: Send + Sync {
    /// Execute one GET against the endpoint's URL
    ///
    /// # Returns
    /// * `Ok(HttpFacts)` - Status, elapsed time until headers, full body
    /// * `Err(TransportFailure)` - Classified network failure
    ///
    /// Error statuses are returned as facts; rejecting them is left to
    /// [`error_for_status`].
    async fn fetch(&self, endpoint: &EndpointSpec) -> Result<HttpFacts, TransportFailure>;
}

/// Production transport using isahc
pub struct IsahcHttpTransport {
    max_redirects: u32,
}

impl IsahcHttpTransport {
    pub fn new(max_redirects: u32) -> Self {
        Self { max_redirects }
    }

    fn redirect_policy(&self) -> RedirectPolicy {
        if self.max_redirects == 0 {
            RedirectPolicy::None
        } else {
            RedirectPolicy::Limit(self.max_redirects)
        }
    }

    fn build_client(&self, endpoint: &EndpointSpec) -> Result<HttpClient, TransportFailure> {
        // No descriptor means no proxy at all, environment proxies included
        let proxy: Option<Uri> = match &endpoint.proxy {
            Some(descriptor) => Some(
                descriptor
                    .raw
                    .parse::<Uri>()
                    .map_err(|e| TransportFailure::Other(format!("invalid proxy URI: {}", e)))?,
            ),
            None => None,
        };

        HttpClient::builder()
            .timeout(endpoint.timeout)
            .redirect_policy(self.redirect_policy())
            .proxy(proxy)
            .build()
            .map_err(|e| classify_error(&e))
    }
}

impl Default for IsahcHttpTransport {
    fn default() -> Self {
        Self::new(crate::core::probe::config::DEFAULT_MAX_REDIRECTS)
    }
}

#[async_trait::async_trait]
impl HttpTransport for IsahcHttpTransport {
    async fn fetch(&self, endpoint: &EndpointSpec) -> Result<HttpFacts, TransportFailure> {
        let url = match &endpoint.target {
            Target::Url(url) => url.as_str(),
            Target::Host { .. } => {
                return Err(TransportFailure::Other(
                    "HTTP probe requires a URL target".to_string(),
                ))
            }
        };

        let client = self.build_client(endpoint)?;
        let request = Request::get(url)
            .body(())
            .map_err(|e| TransportFailure::Other(e.to_string()))?;

        let start = Instant::now();
        let mut response = client
            .send_async(request)
            .await
            .map_err(|e| classify_error(&e))?;
        let elapsed = start.elapsed();

        let status_code = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| classify_io_error(&e))?;

        Ok(HttpFacts {
            status_code,
            elapsed,
            body,
        })
    }
}

/// Map an isahc error onto the probe's failure taxonomy
///
/// `classify_error` only sees requests that produced no response, so a
/// protocol violation here means the peer hung up without answering.
/// I/O failures count as connect errors when the peer reset or closed the
/// socket, or when curl reports a send/receive failure without an
/// underlying `std::io::Error`.
pub fn classify_error(error: &isahc::Error) -> TransportFailure {
    match error.kind() {
        ErrorKind::Timeout => TransportFailure::Timeout,
        ErrorKind::TooManyRedirects => TransportFailure::TooManyRedirects,
        ErrorKind::ConnectionFailed
        | ErrorKind::NameResolution
        | ErrorKind::BadServerCertificate
        | ErrorKind::BadClientCertificate
        | ErrorKind::TlsEngine
        | ErrorKind::ProtocolViolation => TransportFailure::Connect,
        ErrorKind::Io if io_source(error).map_or(true, is_disconnect) => TransportFailure::Connect,
        _ => TransportFailure::Other(error.to_string()),
    }
}

/// First `std::io::Error` in the error's source chain
fn io_source(error: &isahc::Error) -> Option<&std::io::Error> {
    let mut source = std::error::Error::source(error);
    while let Some(err) = source {
        if let Some(io) = err.downcast_ref::<std::io::Error>() {
            return Some(io);
        }
        source = err.source();
    }
    None
}

/// Peer reset or closed the connection
fn is_disconnect(error: &std::io::Error) -> bool {
    matches!(
        error.kind(),
        std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::UnexpectedEof
    )
}

fn classify_io_error(error: &std::io::Error) -> TransportFailure {
    match error.kind() {
        std::io::ErrorKind::TimedOut => TransportFailure::Timeout,
        _ if is_disconnect(error) => TransportFailure::Connect,
        _ => TransportFailure::Other(error.to_string()),
    }
}

/// Reject 4xx/5xx responses the way HTTP client libraries surface them
///
/// Produces `"<code> Client Error: <reason> for url: <url>"` (or
/// `Server Error` for 5xx). Any other status passes through to the
/// evaluator.
pub fn error_for_status(facts: &HttpFacts, url: &str) -> Result<(), TransportFailure> {
    let class = match facts.status_code {
        400..=499 => "Client",
        500..=599 => "Server",
        _ => return Ok(()),
    };
    let reason = StatusCode::from_u16(facts.status_code)
        .ok()
        .and_then(|code| code.canonical_reason())
        .unwrap_or("Unknown");

    Err(TransportFailure::HttpStatus(format!(
        "{} {} Error: {} for url: {}",
        facts.status_code, class, reason, url
    )))
}
