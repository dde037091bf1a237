//! Scam Detector Service: binary entrypoint.
//! Boots the Axum HTTP server: loads the model artifact, builds the OCR client,
//! and serves the detection routes plus `/metrics`.

use scam_detector::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when the file is absent.
    let _ = dotenvy::dotenv();
    scam_detector::init_tracing();

    let server = ServerConfig::from_env()?;
    let addr = server.socket_addr()?;

    // A missing or malformed artifact is fatal here, before any request is served.
    let router = scam_detector::app(&server).await?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "scam detector listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutting down");
}
