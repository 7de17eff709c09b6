//! relevo — service entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Load config
//!   3. Init logger at the configured level
//!   4. Build the reasoning provider and the site memory
//!   5. Serve the HTTP adapter until ctrl-c

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use relevo::error::AppError;
use relevo::llm::providers;
use relevo::memory::{MemoryBackend, SiteMemory};
use relevo::server::{self, AppState};
use relevo::{config, logger};

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn run() -> Result<(), AppError> {
    // Load .env if present — ignore errors (file is optional).
    let _ = dotenvy::dotenv();

    let config = config::load()?;
    logger::parse_level(&config.log_level)?;
    logger::init(&config.log_level)?;

    info!(
        service = %config.service_name,
        memory_path = %config.memory_path.display(),
        provider = %config.llm.provider,
        planner = %config.agent.planner,
        max_steps = config.agent.max_steps,
        "config loaded"
    );

    let llm = providers::build(&config.llm, config.llm_api_key.clone())?;
    let memory = Arc::new(SiteMemory::new(MemoryBackend::json_file(&config.memory_path)));

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            signal_token.cancel();
        }
    });

    server::serve(
        AppState { config: Arc::new(config), memory, llm },
        shutdown,
    )
    .await
}
