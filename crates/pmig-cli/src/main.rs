//! `pmig` - PetLicense legacy migration command line

use pmig_cli::{cli, execute, logging, ExitStatus, Invocation, MigrationConfig};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let matches = cli::build().get_matches();

    let invocation = match Invocation::from_matches(&matches) {
        Ok(invocation) => invocation,
        Err(e) => return fail(ExitStatus::Usage, &e),
    };

    let config = match MigrationConfig::load(invocation.config.as_deref()) {
        Ok(config) => config,
        Err(e) => return fail(ExitStatus::Usage, &e.into()),
    };

    if let Err(e) = logging::init(&config.logging) {
        eprintln!("warning: logging disabled: {e}");
    }

    let mut stdout = std::io::stdout().lock();
    match execute(&invocation, &config, &mut stdout).await {
        Ok(status) => ExitCode::from(status.code()),
        Err(e) => fail(ExitStatus::Failed, &e),
    }
}

fn fail(status: ExitStatus, error: &anyhow::Error) -> ExitCode {
    eprintln!("error: {error:#}");
    ExitCode::from(status.code())
}
