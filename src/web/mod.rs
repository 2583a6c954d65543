//! HTTP surface: `/metrics` and `/health`.

pub mod config;
pub mod handlers;

// Re-export commonly used items
pub use config::WebConfig;

use crate::error::{ExporterError, Result};
use crate::metrics::CollectorRegistry;
use axum::routing::get;
use axum::Router;
use handlers::AppState;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Create the axum application.
pub fn create_app(config: &WebConfig, registry: CollectorRegistry) -> Router {
    Router::new()
        .route(&config.metrics_path, get(handlers::metrics_handler))
        .route(&config.health_path, get(handlers::health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { registry })
}

/// Serve scrapes until the process is stopped.
pub async fn start_web_server(config: WebConfig, registry: CollectorRegistry) -> Result<()> {
    config.validate()?;
    let addr = config.socket_addr()?;

    let app = create_app(&config, registry);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ExporterError::web_server_error(format!("Failed to bind to address: {}", e)))?;

    info!("Serving metrics on http://{}{}", addr, config.metrics_path);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ExporterError::web_server_error(format!("Server error: {}", e)))?;

    info!("Web server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
