/*!
End-to-end certificate probe tests.

Canned sources cover the decision table at a frozen instant; a local
rustls server covers the real handshake, direct and through a CONNECT
tunnel.
*/

use crate::common::{
    cert_config, cert_input, closed_port, now, read_head, self_signed, spawn_silent_server,
    CannedSource, FixedClock, DAY, NOW_TS,
};
use hostprobe::core::probe::config::CertProbeInput;
use hostprobe::core::probe::{
    CertificateProbe, ProbeLogger, ProbeMetrics, ProbeOutcome, Reporter, RustlsCertificateSource,
    Severity, TransportFailure,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_rustls::rustls::crypto::ring;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;

fn canned_probe(input: CertProbeInput, source: CannedSource) -> CertificateProbe {
    CertificateProbe::with_parts(
        cert_config(input),
        Box::new(source),
        Box::new(FixedClock(now())),
        Arc::new(ProbeLogger::disabled()),
    )
}

fn live_probe(input: CertProbeInput) -> CertificateProbe {
    CertificateProbe::new(cert_config(input), Arc::new(ProbeLogger::disabled()))
        .unwrap()
        .with_clock(Box::new(FixedClock(now())))
}

fn acceptor(cert: Vec<u8>, key: Vec<u8>) -> TlsAcceptor {
    let config = ServerConfig::builder_with_provider(Arc::new(ring::default_provider()))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(
            vec![CertificateDer::from(cert)],
            PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key)),
        )
        .unwrap();
    TlsAcceptor::from(Arc::new(config))
}

/// TLS server presenting `cert` to every client
async fn spawn_tls_server(cert: Vec<u8>, key: Vec<u8>) -> SocketAddr {
    let acceptor = acceptor(cert, key);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                if let Ok(mut tls) = acceptor.accept(stream).await {
                    let mut sink = Vec::new();
                    let _ = tls.read_to_end(&mut sink).await;
                }
            });
        }
    });
    addr
}

/// Proxy that accepts one CONNECT, then terminates TLS on the same socket
///
/// The handle resolves to the request head the proxy received.
async fn spawn_tunnelling_proxy(cert: Vec<u8>, key: Vec<u8>) -> (SocketAddr, JoinHandle<String>) {
    let acceptor = acceptor(cert, key);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let head = read_head(&mut stream).await;
        stream
            .write_all(b"HTTP/1.0 200 Connection established\r\n\r\n")
            .await
            .unwrap();
        if let Ok(mut tls) = acceptor.accept(stream).await {
            let mut sink = Vec::new();
            let _ = tls.read_to_end(&mut sink).await;
        }
        head
    });
    (addr, handle)
}

#[tokio::test]
async fn test_certificate_expiring_soon_warns() {
    let (der, _) = self_signed("example.com", NOW_TS - 100 * DAY, NOW_TS + 10 * DAY);
    let probe = canned_probe(cert_input("example.com", 443), CannedSource(Ok(der)));

    let outcome = probe.run().await;
    assert_eq!(outcome.severity(), Severity::Warning);
    assert_eq!(outcome.exit_code(), 1);
    assert_eq!(
        Reporter::new().render(&outcome),
        "WARN: Certificate 'example.com' expires in 10 days|days=10;30;0;0"
    );
}

#[tokio::test]
async fn test_expired_certificate_is_critical() {
    let (der, _) = self_signed("example.com", NOW_TS - 100 * DAY, NOW_TS - 5 * DAY);
    let probe = canned_probe(cert_input("example.com", 443), CannedSource(Ok(der)));

    let outcome = probe.run().await;
    assert_eq!(outcome.exit_code(), 2);
    let line = Reporter::new().render(&outcome);
    assert!(line.starts_with("CRIT: Certificate 'example.com' expired 5 days ago|days=5;"));
}

#[tokio::test]
async fn test_healthy_certificate_reports_expiry_date() {
    let (der, _) = self_signed("example.com", NOW_TS - DAY, NOW_TS + 90 * DAY);
    let probe = canned_probe(cert_input("example.com", 443), CannedSource(Ok(der)));

    let outcome = probe.run().await;
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(
        Reporter::new().render(&outcome),
        "OK: Certificate 'example.com' valid until 2026-05-30, 12:00 UTC|days=90;30;0;0"
    );
}

#[tokio::test]
async fn test_critical_threshold_reported_in_perf_data() {
    let (der, _) = self_signed("example.com", NOW_TS - DAY, NOW_TS + 3 * DAY);
    let mut input = cert_input("example.com", 443);
    input.warning_days = 20;
    input.critical_days = 7;
    let probe = canned_probe(input, CannedSource(Ok(der)));

    match probe.run().await {
        ProbeOutcome::Completed(result) => {
            assert_eq!(result.severity, Severity::Critical);
            assert_eq!(
                result.metrics,
                ProbeMetrics::Certificate {
                    days: 3,
                    warning: 20,
                    critical: 7,
                }
            );
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[tokio::test]
async fn test_unparseable_leaf_is_invalid_certificate() {
    let probe = canned_probe(
        cert_input("example.com", 443),
        CannedSource(Ok(b"garbage".to_vec())),
    );

    let outcome = probe.run().await;
    assert_eq!(
        outcome,
        ProbeOutcome::Failed(TransportFailure::InvalidCertificate)
    );
    assert_eq!(Reporter::new().render(&outcome), "CRIT: Certificate is invalid");
}

#[tokio::test]
async fn test_source_failure_short_circuits() {
    let probe = canned_probe(
        cert_input("example.com", 443),
        CannedSource(Err(TransportFailure::Connect)),
    );

    let outcome = probe.run().await;
    assert_eq!(outcome, ProbeOutcome::Failed(TransportFailure::Connect));
    assert_eq!(outcome.exit_code(), 2);
}

#[tokio::test]
async fn test_live_handshake_reads_self_signed_leaf() {
    let (cert, key) = self_signed("local.probe.test", NOW_TS - DAY, NOW_TS + 10 * DAY);
    let addr = spawn_tls_server(cert, key).await;

    let outcome = live_probe(cert_input("127.0.0.1", addr.port())).run().await;
    assert_eq!(
        Reporter::new().render(&outcome),
        "WARN: Certificate 'local.probe.test' expires in 10 days|days=10;30;0;0"
    );
}

#[tokio::test]
async fn test_live_handshake_reports_expired_leaf() {
    let (cert, key) = self_signed("local.probe.test", NOW_TS - 60 * DAY, NOW_TS - 2 * DAY);
    let addr = spawn_tls_server(cert, key).await;

    let outcome = live_probe(cert_input("127.0.0.1", addr.port())).run().await;
    assert_eq!(outcome.exit_code(), 2);
    assert!(Reporter::new()
        .render(&outcome)
        .contains("expired 2 days ago"));
}

#[tokio::test]
async fn test_handshake_through_connect_tunnel() {
    let (cert, key) = self_signed("tunnelled.probe.test", NOW_TS - DAY, NOW_TS + 45 * DAY);
    let (proxy, handle) = spawn_tunnelling_proxy(cert, key).await;

    let mut input = cert_input("127.0.0.1", 8443);
    input.proxy = Some(format!("127.0.0.1:{}", proxy.port()));
    let outcome = live_probe(input).run().await;

    assert_eq!(outcome.severity(), Severity::Ok);
    let head = handle.await.unwrap();
    assert!(
        head.starts_with("CONNECT 127.0.0.1:8443 HTTP/1.0\r\n"),
        "{:?}",
        head
    );
}

#[tokio::test]
async fn test_proxy_hanging_up_is_connect_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let proxy = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let _ = read_head(&mut stream).await;
    });

    let mut input = cert_input("example.com", 443);
    input.proxy = Some(format!("127.0.0.1:{}", proxy.port()));
    let outcome = live_probe(input).run().await;

    assert_eq!(outcome, ProbeOutcome::Failed(TransportFailure::Connect));
}

#[tokio::test]
async fn test_closed_port_is_connect_error() {
    let port = closed_port().await;
    let outcome = live_probe(cert_input("127.0.0.1", port)).run().await;

    assert_eq!(outcome, ProbeOutcome::Failed(TransportFailure::Connect));
    assert_eq!(Reporter::new().render(&outcome), "CRIT: Connect error");
}

#[tokio::test]
async fn test_silent_server_times_out_as_connect_error() {
    let addr = spawn_silent_server().await;
    let mut input = cert_input("127.0.0.1", addr.port());
    input.timeout_secs = 1;

    let outcome = live_probe(input).run().await;
    assert_eq!(outcome, ProbeOutcome::Failed(TransportFailure::Connect));
}

#[tokio::test]
async fn test_unresolvable_host_is_connect_error() {
    let outcome = live_probe(cert_input("nonexistent.invalid", 443)).run().await;
    assert_eq!(outcome.exit_code(), 2);
    assert_eq!(outcome, ProbeOutcome::Failed(TransportFailure::Connect));
}

#[test]
fn test_rustls_source_builds() {
    assert!(RustlsCertificateSource::new(Arc::new(ProbeLogger::disabled())).is_ok());
}
