//! Host health probes
//!
//! This module provides the two probe kinds and their shared engine:
//! - HTTP(S) content probes (status, timing, body pattern and size)
//! - TLS certificate expiry probes, optionally through a CONNECT proxy
//! - Threshold evaluation with fixed check order and max-severity aggregation
//! - Monitoring-plugin output rendering

pub mod aggregator;
pub mod certificate;
pub mod client;
pub mod config;
pub mod debug_logger;
pub mod evaluator;
pub mod reporter;
pub mod runner;
pub mod tls;
pub mod tunnel;
pub mod types;

// Re-export commonly used items
pub use client::{HttpTransport, IsahcHttpTransport};
pub use config::{CertProbeConfig, ConfigError, EndpointSpec, HttpProbeConfig, Target};
pub use debug_logger::ProbeLogger;
pub use reporter::Reporter;
pub use runner::{CertificateProbe, Clock, HttpProbe, SystemClock};
pub use tls::{CertificateSource, RustlsCertificateSource};
pub use tunnel::ProxyDescriptor;
pub use types::*;
