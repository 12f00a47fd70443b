use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;
use tokio::net::TcpListener;

use crate::antiraid::AntiRaid;
use crate::config::Health;

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct HealthStatus {
    pub status: &'static str,
    pub tracked_logs: usize,
    pub sanctions: usize,
}

/// `GET /` dla keep-alive hostingu, `GET /health` ze stanem anti-raidu.
pub fn router(antiraid: Arc<AntiRaid>) -> Router {
    Router::new()
        .route("/", get(|| async { "Bot is running" }))
        .route("/health", get(health))
        .with_state(antiraid)
}

pub async fn health(State(antiraid): State<Arc<AntiRaid>>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        tracked_logs: antiraid.detector().tracked(),
        sanctions: antiraid.executor().sanctioned_count(),
    })
}

pub fn bind_addr(cfg: &Health) -> Result<SocketAddr> {
    let addr = format!("{}:{}", cfg.bind, cfg.port).parse()?;
    Ok(addr)
}

pub async fn serve(addr: SocketAddr, antiraid: Arc<AntiRaid>) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    serve_on(listener, antiraid).await
}

pub async fn serve_on(listener: TcpListener, antiraid: Arc<AntiRaid>) -> Result<()> {
    tracing::info!(addr = ?listener.local_addr().ok(), "health endpoint listening");
    axum::serve(listener, router(antiraid)).await?;
    Ok(())
}
