use std::sync::Arc;

use anyhow::Context;
use xert_client::auth::AuthManager;
use xert_client::http_client::ReqwestXertClient;
use xert_client::token_store::TokenStore;
use xert_poller::config::Settings;
use xert_poller::detect::ChangeDetector;
use xert_poller::poller::Poller;
use xert_poller::webhook::WebhookDispatcher;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env().context("loading configuration")?;
    init_logging(&settings.log_level);

    tracing::info!("starting xert poller");
    tracing::info!("  hub url: {}", settings.ha_url);
    tracing::info!("  training info interval: {}s", settings.training_info_interval);
    tracing::info!("  activities interval: {}s", settings.activities_interval);
    tracing::info!("  lookback days: {}", settings.lookback_days);

    let store = TokenStore::new(&settings.token_file);
    let auth = Arc::new(
        AuthManager::new(
            &settings.base_url,
            settings.username.clone(),
            settings.password.clone(),
            settings.token_refresh_margin,
            store,
        )
        .await,
    );
    let client = Arc::new(ReqwestXertClient::new(&settings.base_url, Arc::clone(&auth)));
    let webhook = WebhookDispatcher::new(
        &settings.ha_url,
        &settings.ha_webhook_id,
        settings.ha_token.clone(),
    );

    // Authenticate up front so bad credentials surface immediately; the poll
    // loops keep retrying on their own schedule either way.
    if let Err(e) = auth.access_token().await {
        tracing::error!(error = %e, "initial authentication failed, check credentials");
    }

    let poller = Arc::new(Poller::new(client, ChangeDetector::new(), webhook, &settings));

    let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("shutdown signal received"),
            Err(e) => tracing::error!(error = %e, "failed to listen for shutdown signal"),
        }
        let _ = stop_tx.send(true);
    });

    poller.run(stop_rx).await;
    tracing::info!("shutdown complete");
    Ok(())
}

fn init_logging(level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_new(level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .with_env_filter(env_filter)
        .init();
}
