//! Status lookup API endpoints
//!
//! ## Endpoints
//!
//! - `POST /api/predict` - resolve a query and return per-jurisdiction status
//! - `POST /api/refresh` - forced cache repopulation for listed substances
//! - `GET /` - liveness probe

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::model::{RefreshOutcome, StatusEnvelope, StatusResponse};
use crate::orchestrator::StatusOrchestrator;

// ============================================================================
// State
// ============================================================================

/// Shared state for the status routes.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<StatusOrchestrator>,
}

impl AppState {
    pub fn new(orchestrator: Arc<StatusOrchestrator>) -> Self {
        Self { orchestrator }
    }
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Body for POST /api/predict. `substance` is accepted as a legacy alias
/// for `prompt`.
#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub substance: Option<String>,
}

impl PredictRequest {
    fn query(&self) -> Option<&str> {
        self.prompt
            .as_deref()
            .or(self.substance.as_deref())
            .map(str::trim)
            .filter(|q| !q.is_empty())
    }
}

/// Body for POST /api/refresh.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub substances: Vec<String>,
}

/// Response from POST /api/refresh.
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub success: bool,
    pub results: Vec<RefreshOutcome>,
}

// All failure bodies are machine-checkable: `success: false` plus an
// `error` (or `message` for the unresolved case), never bare prose.
type ApiError = (StatusCode, Json<Value>);

fn error_body(status: StatusCode, error: String) -> ApiError {
    (status, Json(json!({ "success": false, "error": error })))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/predict
async fn predict(
    State(state): State<AppState>,
    Json(body): Json<PredictRequest>,
) -> Result<Json<StatusEnvelope>, ApiError> {
    let Some(query) = body.query() else {
        return Err(error_body(
            StatusCode::BAD_REQUEST,
            "Request must include a non-empty 'prompt' (or 'substance') field".to_string(),
        ));
    };

    match state.orchestrator.lookup(query).await {
        Ok(StatusResponse::Resolved(envelope)) => Ok(Json(envelope)),
        Ok(StatusResponse::Unresolved { message }) => Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "message": message })),
        )),
        Err(e) => {
            tracing::error!(error = %e, "status lookup failed");
            Err(error_body(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

/// POST /api/refresh
async fn refresh(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let substances: Vec<String> = body
        .substances
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if substances.is_empty() {
        return Err(error_body(
            StatusCode::BAD_REQUEST,
            "Request must include a non-empty 'substances' list".to_string(),
        ));
    }

    let results = state.orchestrator.refresh(&substances).await;
    Ok(Json(RefreshResponse {
        success: true,
        results,
    }))
}

/// GET /
async fn liveness() -> &'static str {
    "substance-atlas API is running"
}

// ============================================================================
// Router
// ============================================================================

/// Build the status router with shared state.
pub fn create_status_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(liveness))
        .route("/api/predict", post(predict))
        .route("/api/refresh", post(refresh))
        .with_state(state)
}
