//! HTTP route handlers for a served annotation session.

use crate::error::{AnnError, ErrorCategory};
use crate::metrics::MetricsSnapshot;
use crate::server::AppState;
use crate::session::{AdapterState, ResetEvent};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

// --- Request/Response types ---

#[derive(Deserialize)]
pub struct NextParams {
    pub viewer: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub examples: usize,
    pub model: String,
    pub query: Option<String>,
    pub state: AdapterState,
    pub generation: u64,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub category: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(e: AnnError) -> ApiError {
    let status = match e.category() {
        ErrorCategory::QueryEmpty | ErrorCategory::CapacityExceeded => StatusCode::BAD_REQUEST,
        ErrorCategory::ConcurrentReset => StatusCode::CONFLICT,
        ErrorCategory::Embedding => StatusCode::BAD_GATEWAY,
        ErrorCategory::Source | ErrorCategory::IndexCompatibility | ErrorCategory::Internal => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
            category: format!("{:?}", e.category()),
        }),
    )
}

// --- Router ---

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/next", get(next_example))
        .route("/events/stream-reset", post(stream_reset))
        .route("/health", get(health))
        .route("/metrics", get(get_metrics))
        .with_state(state)
}

// --- Handlers ---

async fn next_example(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NextParams>,
) -> Result<Response, ApiError> {
    match state.controller.next(&params.viewer).map_err(api_error)? {
        Some(example) => {
            if let Ok(mut metrics) = state.metrics.write() {
                metrics.record_delivery();
            }
            Ok(Json(example).into_response())
        }
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

async fn stream_reset(
    State(state): State<Arc<AppState>>,
    Json(event): Json<ResetEvent>,
) -> Result<Response, ApiError> {
    let start = Instant::now();
    let delivered = event.viewer.is_some();
    let outcome = state.adapter.reset(state.controller.as_ref(), event).await;
    let elapsed = start.elapsed();

    if let Ok(mut metrics) = state.metrics.write() {
        match &outcome {
            Ok(_) => {
                metrics.record_query(elapsed);
                metrics.record_reset();
                if delivered {
                    metrics.record_delivery();
                }
            }
            Err(_) => metrics.record_failed_reset(),
        }
    }

    match outcome {
        Ok(first) => Ok(Json(first).into_response()),
        Err(e) => {
            tracing::warn!(error = %e, "stream reset rejected");
            Err(api_error(e))
        }
    }
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let engine = state.adapter.engine();
    Json(HealthResponse {
        status: "ok".to_string(),
        examples: engine.capacity(),
        model: engine.model_name().to_string(),
        query: state.adapter.current_query(),
        state: state.adapter.state(),
        generation: state.controller.generation().unwrap_or(0),
    })
}

async fn get_metrics(
    State(state): State<Arc<AppState>>,
) -> Result<Json<MetricsSnapshot>, ApiError> {
    let metrics = state
        .metrics
        .read()
        .map_err(|_| api_error(AnnError::Session("metrics lock poisoned".to_string())))?;
    Ok(Json(metrics.snapshot()))
}
