//! REST API Handlers

use crate::controlplane::orchestrator::ReconcileReport;
use crate::controlplane::Orchestrator;
use axum::{
    extract::{Json, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::error;

// =============================================================================
// Response Types
// =============================================================================

/// Cluster list response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterListResponse {
    pub clusters: Vec<ReconcileReport>,
    pub total: usize,
}

/// API error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    pub error: String,
    pub message: String,
}

// =============================================================================
// Router
// =============================================================================

/// Builds the status API routes
pub struct RestRouter {
    orchestrator: Arc<Orchestrator>,
}

impl RestRouter {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }

    pub fn build(self) -> Router {
        let state = AppState {
            orchestrator: self.orchestrator,
        };

        Router::new()
            .route("/v1/clusters", get(list_clusters))
            .route("/v1/clusters/:namespace/:name", get(get_cluster))
            .route("/metrics", get(metrics))
            .route("/health", get(health_check))
            .route("/ready", get(readiness_check))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }
}

#[derive(Clone)]
struct AppState {
    orchestrator: Arc<Orchestrator>,
}

// =============================================================================
// Handlers
// =============================================================================

async fn list_clusters(State(state): State<AppState>) -> impl IntoResponse {
    let clusters = state.orchestrator.reports().await;
    Json(ClusterListResponse {
        total: clusters.len(),
        clusters,
    })
}

async fn get_cluster(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> impl IntoResponse {
    match state.orchestrator.report(&namespace, &name).await {
        Some(report) => (StatusCode::OK, Json(report)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ApiErrorResponse {
                error: "not_found".into(),
                message: format!("Cluster {}/{} has not been reconciled", namespace, name),
            }),
        )
            .into_response(),
    }
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    match state.orchestrator.metrics().gather() {
        Ok((content_type, body)) => {
            (StatusCode::OK, [(header::CONTENT_TYPE, content_type)], body).into_response()
        }
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    if state.orchestrator.components().is_empty() {
        (StatusCode::SERVICE_UNAVAILABLE, "no components registered")
    } else {
        (StatusCode::OK, "ready")
    }
}
