use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use serde_json::json;
use tracing::error;

use crate::model::Event;
use crate::pipeline::Orchestrator;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/notifications/evaluate", post(evaluate))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// `POST /v1/notifications/evaluate`. Rejects malformed events at the
/// boundary (§3's required fields) before they ever reach the core — the
/// core itself assumes well-formed input.
async fn evaluate(State(state): State<AppState>, Json(event): Json<Event>) -> impl IntoResponse {
    if let Err(message) = event.validate() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "invalid_event", "message": message })),
        )
            .into_response();
    }

    match state.orchestrator.evaluate(event).await {
        Ok(decision) => (StatusCode::OK, Json(decision)).into_response(),
        Err(e) => {
            error!(error = %e, "pipeline evaluate failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "pipeline_fault", "message": e.to_string() })),
            )
                .into_response()
        }
    }
}
