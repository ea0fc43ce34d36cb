use hostprobe::cli::CertCli;
use hostprobe::core::probe::{CertificateProbe, ProbeLogger, ProbeOutcome, Reporter};
use std::sync::Arc;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let config = match CertCli::parse_args().into_config() {
        Ok(config) => config,
        Err(error) => CertCli::usage_error(&error),
    };

    let logger = Arc::new(ProbeLogger::from_env());
    let outcome = match CertificateProbe::new(config, logger) {
        Ok(probe) => probe.run().await,
        Err(failure) => ProbeOutcome::Failed(failure),
    };

    println!("{}", Reporter::new().render(&outcome));
    std::process::exit(outcome.exit_code());
}
