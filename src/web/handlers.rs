//! HTTP handlers.

use crate::metrics::render::CONTENT_TYPE;
use crate::metrics::CollectorRegistry;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use tracing::{debug, info};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: CollectorRegistry,
}

/// Run every collector and return the exposition text.
///
/// Always answers 200: a failing collector only removes its own lines.
pub async fn metrics_handler(State(state): State<AppState>) -> Response {
    let scrape = state.registry.scrape().await;

    let failed: Vec<&str> = scrape.failures().map(|outcome| outcome.name).collect();
    if failed.is_empty() {
        debug!(metrics = scrape.metrics.len(), "scrape complete");
    } else {
        info!(metrics = scrape.metrics.len(), failed = ?failed, "scrape complete with failed collectors");
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, CONTENT_TYPE)],
        scrape.render(),
    )
        .into_response()
}

/// Health check endpoint.
pub async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "host-exporter",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}
