use anyhow::{Context, Result};
use edutrack_core::RecognitionAdapter;
use std::future::Future;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod config;
mod face_api;
mod gateway;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("edutrackd starting");

    let config = config::Config::from_env().context("invalid configuration")?;

    let vendor = face_api::FaceApiClient::new(
        config.face_endpoint.clone(),
        config.face_api_key.clone(),
        config.max_candidates,
        config.vendor_timeout,
    )
    .context("failed to build vendor client")?;
    tracing::info!(
        endpoint = %config.face_endpoint,
        group = %config.person_group_id,
        threshold = config.confidence_threshold.value(),
        vendor_timeout_secs = config.vendor_timeout.as_secs(),
        "face API configured"
    );

    let state = Arc::new(gateway::AppState {
        adapter: RecognitionAdapter::new(
            Arc::new(vendor),
            config.person_group_id.clone(),
            config.confidence_threshold,
        ),
        started_at: chrono::Utc::now(),
    });
    let app = gateway::build_router(state, config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, "edutrackd ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(tokio::signal::ctrl_c()))
        .await?;

    Ok(())
}

/// Resolves once `signal` fires. If the handler cannot be installed the
/// server keeps running instead of shutting down at once.
async fn shutdown_signal(signal: impl Future<Output = std::io::Result<()>>) {
    match signal.await {
        Ok(()) => tracing::info!("edutrackd shutting down"),
        Err(e) => {
            tracing::error!(error = %e, "failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}
