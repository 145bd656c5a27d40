// HTTP handlers for the run API

use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use super::middleware::rate_limit_middleware;
use super::AppState;
use crate::refine::RefineError;
use crate::session::RunSnapshot;

/// Body of `POST /api/runs`
#[derive(Debug, Deserialize)]
pub struct SubmitRunRequest {
    pub prompt: String,
}

/// Reply to an accepted submission
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitRunResponse {
    pub run_id: Uuid,
}

/// A `RefineError` rendered as `{error, kind}` with a matching status code
pub struct ApiError(pub RefineError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            RefineError::UserInput(_) => StatusCode::BAD_REQUEST,
            RefineError::RunInProgress => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = json!({
            "error": self.0.to_string(),
            "kind": self.0.kind(),
        });
        (status, Json(body)).into_response()
    }
}

/// Build the application router.
pub fn create_router(state: AppState) -> Router {
    let limiter = state.limiter.clone();

    Router::new()
        .route("/health", get(health_check))
        .route(
            "/api/runs",
            post(submit_run).route_layer(middleware::from_fn(rate_limit_middleware)),
        )
        .route("/api/runs/current", get(current_run).delete(cancel_run))
        .layer(Extension(limiter))
        .with_state(state)
}

pub async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn submit_run(
    State(state): State<AppState>,
    Json(req): Json<SubmitRunRequest>,
) -> Result<(StatusCode, Json<SubmitRunResponse>), ApiError> {
    let ticket = state.slot.submit(&req.prompt).map_err(|e| {
        tracing::info!(kind = e.kind(), "Submission refused");
        ApiError(e)
    })?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitRunResponse {
            run_id: ticket.run_id,
        }),
    ))
}

async fn current_run(State(state): State<AppState>) -> Json<RunSnapshot> {
    Json(state.slot.snapshot())
}

async fn cancel_run(State(state): State<AppState>) -> StatusCode {
    state.slot.cancel();
    StatusCode::NO_CONTENT
}
