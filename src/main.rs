use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::Parser;
use tracing::Instrument;

use wasfa_api::config::Args;
use wasfa_api::http::api_routes;
use wasfa_api::lifecycle::{self, BuildInfo};
use wasfa_api::observability::logging;

#[tokio::main]
async fn main() -> ExitCode {
    logging::init_logging();
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            tracing::error!(error = %e, "startup");
            return ExitCode::FAILURE;
        }
    };

    let build = BuildInfo::current();
    let config = match args.resolve() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "startup");
            return ExitCode::FAILURE;
        }
    };

    let routes = api_routes(build.clone());
    let service = tracing::info_span!("service", name = %build.desc);

    match lifecycle::run(config, build, routes).instrument(service).await {
        Ok(result) => ExitCode::from(result.exit_code()),
        Err(e) => {
            tracing::error!(error = %e, "startup");
            ExitCode::FAILURE
        }
    }
}
