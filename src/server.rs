use crate::metrics::{render_registry, METRICS_PATH};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use prometheus::Registry;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub backends: BackendStatus,
    pub service_name: String,
}

/// Which backends finished their startup sequence.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackendStatus {
    pub document_store: bool,
    pub broker: bool,
}

impl BackendStatus {
    pub fn all_ready(&self) -> bool {
        self.document_store && self.broker
    }
}

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub backends: BackendStatus,
}

pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let healthy = state.backends.all_ready();
    let health = HealthResponse {
        status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
        service: state.service_name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        backends: state.backends.clone(),
    };

    let code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(health))
}

pub async fn metrics_handler(State(state): State<AppState>) -> Response {
    match render_registry(&state.registry) {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn liveness_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "alive",
        "timestamp": chrono::Utc::now()
    }))
}

pub fn create_monitoring_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(METRICS_PATH, get(metrics_handler))
        .route("/livez", get(liveness_check))
        .with_state(state)
}

/// Serves the monitoring router on `addr` until `shutdown` fires.
pub async fn run_monitoring_server(
    addr: SocketAddr,
    state: AppState,
    mut shutdown: broadcast::Receiver<()>,
) -> std::io::Result<()> {
    let app = create_monitoring_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Monitoring server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
}
