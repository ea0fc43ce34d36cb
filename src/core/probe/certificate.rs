//! Leaf certificate fact extraction

use crate::core::probe::types::{CertificateFacts, TransportFailure};
use chrono::{DateTime, Utc};
use x509_parser::prelude::*;

/// Parse a DER-encoded leaf certificate into validity facts
///
/// Anything that is not a well-formed X.509 certificate, or whose validity
/// bounds cannot be represented as UTC timestamps, is rejected with
/// `TransportFailure::InvalidCertificate`.
pub fn extract_certificate_facts(der: &[u8]) -> Result<CertificateFacts, TransportFailure> {
    let (_, cert) =
        parse_x509_certificate(der).map_err(|_| TransportFailure::InvalidCertificate)?;

    let validity = cert.validity();
    let not_before = to_utc(validity.not_before.timestamp())?;
    let not_after = to_utc(validity.not_after.timestamp())?;

    Ok(CertificateFacts {
        subject: subject_name(&cert),
        not_before,
        not_after,
    })
}

fn to_utc(timestamp: i64) -> Result<DateTime<Utc>, TransportFailure> {
    DateTime::from_timestamp(timestamp, 0).ok_or(TransportFailure::InvalidCertificate)
}

/// First subject CN, or the whole subject DN when the certificate carries none
fn subject_name(cert: &X509Certificate<'_>) -> String {
    cert.subject()
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| cert.subject().to_string())
}
