use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::{
    error::{error_chain, SaveError},
    save::{SaveRequest, SaveService, SavedFile},
};

#[derive(Clone)]
pub struct AppState {
    pub save: Arc<SaveService>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/save", post(save_student))
        .route("/healthz", get(health))
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct SaveResponse {
    pub message: String,
    pub saved: Vec<SavedFile>,
}

async fn save_student(
    State(state): State<AppState>,
    payload: Result<Json<SaveRequest>, JsonRejection>,
) -> Result<Json<SaveResponse>, SaveError> {
    let Json(req) = payload.map_err(|e| SaveError::Validation(e.body_text()))?;

    let saved = state.save.save(req).await?;

    Ok(Json(SaveResponse {
        message: "Student files saved".to_string(),
        saved,
    }))
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "alive" }))
}

impl IntoResponse for SaveError {
    fn into_response(self) -> Response {
        // Local failures are the caller's fault; everything else reached the
        // remote service and is reported as an upstream failure.
        let status = if self.is_local() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::BAD_GATEWAY
        };

        let message = error_chain(&self);
        tracing::warn!(%status, error = %message, "save request failed");

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
