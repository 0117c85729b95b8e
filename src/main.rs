//! taskboard - federated ActivityPub task board

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use taskboard::{config::Args, server, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing/logging
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("taskboard={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Validate configuration
    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    // Print startup banner
    info!("======================================");
    info!("  taskboard - federated task feed");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen);
    info!("Actor: {}", args.actor_url());
    info!("Data dir: {}", args.data_dir.display());
    info!("Task prefix: {}", args.task_prefix);
    info!("Claim TTL: {} minutes", args.claim_ttl_minutes);
    info!("Genesis slots: {}", args.genesis_slots);
    match &args.github_repo {
        Some(repo) => info!("GitHub repo: {}", repo),
        None => warn!("No GitHub repo configured - serving genesis task list, submissions disabled"),
    }
    if args.webhook_secret.is_none() {
        warn!("No webhook secret configured - GitHub webhook deliveries will be rejected");
    }
    info!("Require signatures: {}", args.require_signatures);
    info!("======================================");

    let state = AppState::new(args).await?;

    server::run(Arc::new(state)).await?;

    Ok(())
}
