//! Tests for command-line parsing into probe configuration

use clap::Parser;
use hostprobe::cli::{CertCli, HttpCli};
use hostprobe::core::probe::config::{ConfigError, SizeBounds, Target};
use std::time::Duration;

#[test]
fn test_http_defaults() {
    let cli = HttpCli::try_parse_from(["check_http", "https://example.com/"]).unwrap();
    assert_eq!(cli.timeout, 8);
    assert_eq!(cli.warning, 0.0);
    assert_eq!(cli.critical, 0.0);
    assert_eq!(cli.max_redirects, 30);
    assert!(cli.proxy.is_none());

    let config = cli.into_config().unwrap();
    assert_eq!(config.endpoint.timeout, Duration::from_secs(8));
    assert_eq!(config.max_redirects, 30);
}

#[test]
fn test_http_all_options() {
    let cli = HttpCli::try_parse_from([
        "check_http",
        "-p",
        "http://proxy.local:3128",
        "-t",
        "3",
        "-r",
        "welcome",
        "-s",
        "100",
        "1000",
        "-w",
        "0.5",
        "-c",
        "1.5",
        "http://example.com/",
    ])
    .unwrap();

    let config = cli.into_config().unwrap();
    assert_eq!(
        config.endpoint.target,
        Target::Url("http://example.com/".to_string())
    );
    assert_eq!(config.endpoint.timeout, Duration::from_secs(3));
    assert_eq!(config.endpoint.proxy.unwrap().port, 3128);
    assert!(config.checks.pattern.unwrap().is_match("WELCOME home"));
    assert_eq!(config.checks.size, Some(SizeBounds { min: 100, max: 1000 }));
    assert_eq!(config.checks.response_time.armed_warning(), Some(0.5));
    assert_eq!(config.checks.response_time.armed_critical(), Some(1.5));
}

#[test]
fn test_http_size_needs_two_values() {
    assert!(HttpCli::try_parse_from(["check_http", "-s", "100"]).is_err());
}

#[test]
fn test_http_missing_url_fails_validation() {
    let cli = HttpCli::try_parse_from(["check_http"]).unwrap();
    assert!(matches!(cli.into_config(), Err(ConfigError::MissingUrl)));
}

#[test]
fn test_http_unpaired_threshold_fails_validation() {
    let cli = HttpCli::try_parse_from(["check_http", "-w", "1", "http://example.com/"]).unwrap();
    assert!(matches!(
        cli.into_config(),
        Err(ConfigError::UnpairedThresholds)
    ));
}

#[test]
fn test_cert_defaults() {
    let cli = CertCli::try_parse_from(["check_ssl", "example.com"]).unwrap();
    assert_eq!(cli.timeout, 10);
    assert_eq!(cli.warning, 30);
    assert_eq!(cli.critical, 0);
    assert_eq!(cli.port, 443);

    let config = cli.into_config().unwrap();
    assert_eq!(config.domain(), "example.com");
    assert_eq!(
        config.endpoint.target,
        Target::Host {
            domain: "example.com".to_string(),
            port: 443
        }
    );
    assert_eq!(config.thresholds.warning_days, 30);
    assert_eq!(config.thresholds.critical_days, 0);
}

#[test]
fn test_cert_port_and_proxy() {
    let cli = CertCli::try_parse_from([
        "check_ssl",
        "-P",
        "8443",
        "-p",
        "alice:secret@proxy.local:3128",
        "-w",
        "20",
        "-c",
        "5",
        "example.com",
    ])
    .unwrap();

    let config = cli.into_config().unwrap();
    assert_eq!(
        config.endpoint.target,
        Target::Host {
            domain: "example.com".to_string(),
            port: 8443
        }
    );
    let proxy = config.endpoint.proxy.unwrap();
    assert_eq!(proxy.host, "proxy.local");
    assert_eq!(proxy.port, 3128);
    assert_eq!(config.thresholds.critical_days, 5);
}

#[test]
fn test_cert_inverted_thresholds_fail_validation() {
    let cli =
        CertCli::try_parse_from(["check_ssl", "-w", "5", "-c", "10", "example.com"]).unwrap();
    assert!(matches!(
        cli.into_config(),
        Err(ConfigError::WarningDaysNotAboveCritical)
    ));
}

#[test]
fn test_cert_rejects_non_numeric_port() {
    assert!(CertCli::try_parse_from(["check_ssl", "-P", "https", "example.com"]).is_err());
}
