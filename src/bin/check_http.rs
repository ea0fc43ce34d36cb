use hostprobe::cli::HttpCli;
use hostprobe::core::probe::{HttpProbe, ProbeLogger, Reporter};
use std::sync::Arc;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let config = match HttpCli::parse_args().into_config() {
        Ok(config) => config,
        Err(error) => HttpCli::usage_error(&error),
    };

    let logger = Arc::new(ProbeLogger::from_env());
    let outcome = HttpProbe::new(config, logger).run().await;

    println!("{}", Reporter::new().render(&outcome));
    std::process::exit(outcome.exit_code());
}
