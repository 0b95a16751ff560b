use std::env;
use std::process::ExitCode;

use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use penny_scan::config::Config;
use penny_scan::error::RunError;
use penny_scan::models::RunResult;
use penny_scan::pipeline::RunOrchestrator;

const USAGE: &str = "Usage: penny-scan [--dry-run]";

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "penny_scan=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let mut dry_run = false;

    for arg in &args {
        match arg.as_str() {
            "--dry-run" => dry_run = true,
            "-h" | "--help" => {
                println!("{USAGE}");
                return ExitCode::SUCCESS;
            }
            other => {
                error!("Unknown argument: {} ({})", other, USAGE);
                return ExitCode::from(2);
            }
        }
    }

    info!("Starting penny-scan");

    match run(dry_run).await {
        Ok(result) => {
            if result.is_partial() {
                warn!("Partial failure; see log and artifact for details");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(dry_run: bool) -> Result<RunResult, RunError> {
    let config = Config::from_env(dry_run)?;
    info!("Configuration loaded");

    RunOrchestrator::new(config).run().await
}
