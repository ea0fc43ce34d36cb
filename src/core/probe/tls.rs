//! TLS certificate acquisition
//!
//! Connects to the target (directly or through a CONNECT tunnel), runs
//! the TLS handshake and hands back the DER bytes of the peer's leaf
//! certificate. Every failure along the way collapses to
//! `TransportFailure::Connect`.

use crate::core::probe::config::{EndpointSpec, Target};
use crate::core::probe::debug_logger::ProbeLogger;
use crate::core::probe::tunnel::establish_tunnel;
use crate::core::probe::types::TransportFailure;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{ring, verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

/// Source of the peer's leaf certificate, abstracted for testing
#[async_trait::async_trait]
pub trait CertificateSource: Send + Sync {
    /// Return the DER encoding of the leaf certificate presented by the endpoint
    async fn fetch_leaf(&self, endpoint: &EndpointSpec) -> Result<Vec<u8>, TransportFailure>;
}

/// Accepts whatever chain the peer presents
///
/// Expired, not-yet-valid and self-signed certificates have to reach the
/// evaluator intact. Handshake signatures are still verified against the
/// provider's algorithms.
#[derive(Debug)]
struct AcceptAnyCertificate {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Production certificate source using tokio + rustls
pub struct RustlsCertificateSource {
    connector: TlsConnector,
    logger: Arc<ProbeLogger>,
}

impl RustlsCertificateSource {
    pub fn new(logger: Arc<ProbeLogger>) -> Result<Self, TransportFailure> {
        let provider = Arc::new(ring::default_provider());
        let config = ClientConfig::builder_with_provider(provider.clone())
            .with_safe_default_protocol_versions()
            .map_err(|e| TransportFailure::Other(e.to_string()))?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate { provider }))
            .with_no_client_auth();

        Ok(Self {
            connector: TlsConnector::from(Arc::new(config)),
            logger,
        })
    }

    async fn open_stream(
        &self,
        domain: &str,
        port: u16,
        endpoint: &EndpointSpec,
    ) -> Result<TcpStream, TransportFailure> {
        match &endpoint.proxy {
            Some(proxy) => {
                let mut stream = bounded(
                    endpoint.timeout,
                    TcpStream::connect(proxy.address()),
                    &self.logger,
                    "proxy_connect",
                )
                .await?;
                // Proxy credentials are never sent: tunnels are requested unauthenticated
                let tunnel = bounded(
                    endpoint.timeout,
                    establish_tunnel(&mut stream, domain, port),
                    &self.logger,
                    "connect_tunnel",
                )
                .await;
                if let Err(failure) = tunnel {
                    let _ = stream.shutdown().await;
                    return Err(failure);
                }
                Ok(stream)
            }
            None => {
                bounded(
                    endpoint.timeout,
                    TcpStream::connect((domain, port)),
                    &self.logger,
                    "tcp_connect",
                )
                .await
            }
        }
    }
}

/// Run one network step under the probe timeout, collapsing any failure to `Connect`
async fn bounded<T, F>(
    timeout: Duration,
    step: F,
    logger: &ProbeLogger,
    stage: &str,
) -> Result<T, TransportFailure>
where
    F: Future<Output = std::io::Result<T>>,
{
    match tokio::time::timeout(timeout, step).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            logger.error_sync("CertificateSource", stage, &e.to_string());
            Err(TransportFailure::Connect)
        }
        Err(_) => {
            logger.error_sync(
                "CertificateSource",
                stage,
                &format!("timed out after {}s", timeout.as_secs()),
            );
            Err(TransportFailure::Connect)
        }
    }
}

#[async_trait::async_trait]
impl CertificateSource for RustlsCertificateSource {
    async fn fetch_leaf(&self, endpoint: &EndpointSpec) -> Result<Vec<u8>, TransportFailure> {
        let (domain, port) = match &endpoint.target {
            Target::Host { domain, port } => (domain.as_str(), *port),
            Target::Url(_) => {
                return Err(TransportFailure::Other(
                    "certificate probe requires a host target".to_string(),
                ))
            }
        };

        let server_name = ServerName::try_from(domain.to_string()).map_err(|e| {
            self.logger
                .error_sync("CertificateSource", "server_name", &e.to_string());
            TransportFailure::Connect
        })?;

        let stream = self.open_stream(domain, port, endpoint).await?;

        let handshake = self
            .connector
            .connect(server_name, stream)
            .into_fallible();
        let mut tls = match tokio::time::timeout(endpoint.timeout, handshake).await {
            Ok(Ok(tls)) => tls,
            Ok(Err((e, mut stream))) => {
                self.logger
                    .error_sync("CertificateSource", "tls_handshake", &e.to_string());
                let _ = stream.shutdown().await;
                return Err(TransportFailure::Connect);
            }
            // Dropping the timed-out handshake closes the socket it owns
            Err(_) => {
                self.logger.error_sync(
                    "CertificateSource",
                    "tls_handshake",
                    &format!("timed out after {}s", endpoint.timeout.as_secs()),
                );
                return Err(TransportFailure::Connect);
            }
        };

        let leaf = tls
            .get_ref()
            .1
            .peer_certificates()
            .and_then(|chain| chain.first())
            .map(|cert| cert.as_ref().to_vec());

        let _ = tls.shutdown().await;

        leaf.ok_or(TransportFailure::InvalidCertificate)
    }
}
