//! Stub HTTP front-end. The router has no routes yet, so every request is a 404.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::Router;
use tracing::info;

pub fn router() -> Router {
    Router::new()
}

/// Serves [`router`] on `addr` until the process ends.
pub async fn serve(addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(addr = %listener.local_addr().unwrap_or(addr), "Serving HTTP front-end");
    axum::serve(listener, router())
        .await
        .context("HTTP front-end stopped")
}
