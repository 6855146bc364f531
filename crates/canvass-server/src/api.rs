//! Operator API handlers.

use crate::AppState;
use axum::{
    extract::{Extension, Json, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use canvass_types::StoredAnswer;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// API error type mapping to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("internal server error: {0}")]
    InternalServerError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

/// Request body for placing an outbound survey call.
#[derive(Debug, Deserialize)]
pub struct StartCallRequest {
    #[serde(rename = "phoneNumber")]
    pub phone_number: String,
}

/// Response body for a placed call.
#[derive(Debug, Serialize, Deserialize)]
pub struct StartCallResponse {
    #[serde(rename = "callSid")]
    pub call_sid: String,
    pub status: String,
}

/// Handler for `POST /api/calls`.
///
/// Places an outbound call and points the vendor at the call-connected
/// webhook; the survey starts once the callee answers.
pub async fn start_call_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<StartCallRequest>,
) -> Result<Json<StartCallResponse>, ApiError> {
    let to_number = payload.phone_number.trim();
    if to_number.is_empty() {
        return Err(ApiError::BadRequest("phoneNumber must not be empty".to_string()));
    }

    let webhook_url = format!(
        "{}/voice/connected",
        state.public_url.trim_end_matches('/')
    );

    let call_sid = state
        .telephony
        .create_call(to_number, &webhook_url)
        .await
        .map_err(|e| ApiError::InternalServerError(e.to_string()))?;

    Ok(Json(StartCallResponse {
        call_sid,
        status: "calling".to_string(),
    }))
}

/// Handler for `GET /api/calls/{callId}/answers`.
///
/// Returns every stored answer for a call in insertion order. A call with no
/// stored answers yields an empty list, not a 404: an in-progress call
/// legitimately has none yet.
pub async fn list_answers_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(call_id): Path<String>,
) -> Result<Json<Vec<StoredAnswer>>, ApiError> {
    let answers = state
        .store
        .answers_for_call(&call_id)
        .await
        .map_err(|e| ApiError::InternalServerError(e.to_string()))?;

    Ok(Json(answers))
}
