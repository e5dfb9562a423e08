//! HTTP API for health checks and Prometheus metrics
//!
//! Every scrape of `/metrics` runs one collection pass against the billing
//! API and renders the result together with the exporter's own metrics.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use exporter_lib::emitter::encode_text;
use exporter_lib::{ComponentStatus, CostAggregator, HealthRegistry, SuggestionsCollector};
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub aggregator: Arc<CostAggregator>,
    pub suggestions: Option<Arc<SuggestionsCollector>>,
}

impl AppState {
    pub fn new(health_registry: HealthRegistry, aggregator: Arc<CostAggregator>) -> Self {
        Self {
            health_registry,
            aggregator,
            suggestions: None,
        }
    }

    pub fn with_suggestions(mut self, suggestions: Arc<SuggestionsCollector>) -> Self {
        self.suggestions = Some(suggestions);
        self
    }
}

/// 200 while healthy or degraded, 503 once a component is unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// 503 until the label cache has been populated once
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    let (mut batch, _summary) = state.aggregator.collect().await;
    if let Some(suggestions) = &state.suggestions {
        batch.extend(suggestions.collect().await);
    }

    let mut families = batch.into_families();
    families.extend(prometheus::gather());

    match encode_text(&families) {
        Ok(buffer) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
            buffer,
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Serve the API until `shutdown` resolves, then drain open connections
pub async fn serve<F>(port: u16, state: Arc<AppState>, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
