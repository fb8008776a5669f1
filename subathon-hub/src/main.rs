use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};

use subathon_hub::api::{ApiServer, ApiServerConfig, AppState};
use subathon_hub::config::{AppConfig, RuleSet};
use subathon_hub::logging;
use subathon_hub::services::ServiceContainer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env_or_default();
    let _log_guard = logging::init_logging(config.log_dir.as_deref())?;

    let rules = RuleSet::load(&config.rules_path)
        .with_context(|| format!("loading rules from {}", config.rules_path.display()))?;
    info!(
        path = %config.rules_path.display(),
        base = rules.base_seconds,
        max = rules.max_seconds,
        "Rules loaded"
    );

    let services = Arc::new(ServiceContainer::new(rules, &config));
    services
        .start(&config.tiktok_user, &config.kick_channel)
        .await;

    let server = ApiServer::new(
        ApiServerConfig::from(&config),
        AppState::new(services.clone()),
    );
    let server_token = server.cancel_token();

    let shutdown_services = services.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
            return;
        }
        info!("Shutdown signal received");
        if let Err(e) = shutdown_services.shutdown().await {
            error!(error = %e, "Service shutdown failed");
        }
        server_token.cancel();
    });

    server.run().await?;

    info!("subathon-hub stopped");
    Ok(())
}
