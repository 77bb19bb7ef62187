//! HTTP server initialization for the messaging webhook.
//!
//! Provides [`serve_http`], which wires up the store, completion service and
//! media analyzer behind the webhook router and runs until ctrl-c.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::akira::Akira;
use crate::config::AkiraConfig;
use crate::webhook::{self, ChannelSettings, WebhookState};

/// Shared setup: build the orchestrator and the HTTP client used for media
/// downloads.
fn setup_shared_state(config: &AkiraConfig) -> Result<Arc<WebhookState>> {
    let akira = Arc::new(Akira::from_config(config)?);

    let channel = ChannelSettings::from_config(config);
    if channel.account_sid.is_none() {
        tracing::warn!("no Twilio credentials configured; media downloads will be unauthenticated");
    }

    let http = reqwest::Client::builder()
        .timeout(channel.download_timeout)
        .build()
        .context("failed to build HTTP client")?;

    Ok(Arc::new(WebhookState {
        akira,
        http,
        channel,
    }))
}

/// Start the webhook server and block until shutdown.
pub async fn serve_http(config: AkiraConfig) -> Result<()> {
    let host = config.server.host.clone();
    let port = config.server.port;
    let bind_addr = format!("{host}:{port}");

    tracing::info!(addr = %bind_addr, "starting Akira webhook server");

    let state = setup_shared_state(&config)?;
    let router = webhook::router(state, &config.server.webhook_path);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(
        addr = %bind_addr,
        path = %config.server.webhook_path,
        "webhook listening at http://{bind_addr}{}",
        config.server.webhook_path
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            tracing::info!("shutting down webhook server");
        })
        .await?;

    Ok(())
}
