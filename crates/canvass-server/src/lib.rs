//! Canvass server library logic.
//!
//! The webhook boundary and operator API around the call flow controller.
//! Handlers receive telephony events, call into the controller, and render
//! its decisions as vendor reply documents; the operator API places outbound
//! calls and queries stored answers.

pub mod api;
pub mod api_webhooks;
pub mod background;
pub mod config;
pub mod telephony;
pub mod twiml;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Extension, Json, Router,
};
use canvass_db::ResponseStore;
use canvass_flow::SurveyController;
use canvass_voice::TtsService;
use serde_json::{json, Value};
use std::sync::Arc;
use telephony::{RecordingFetcher, TwilioClient};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The call flow controller; owns all per-call session state.
    pub controller: Arc<SurveyController>,
    /// Prompt audio synthesis.
    pub tts: Arc<TtsService>,
    /// Durable answer store, also wired into the controller as its sink.
    pub store: Arc<ResponseStore>,
    /// Outbound call placement.
    pub telephony: Arc<TwilioClient>,
    /// Recorded-answer audio retrieval.
    pub recordings: Arc<dyn RecordingFetcher>,
    /// Public base URL the telephony vendor reaches this server at.
    pub public_url: String,
}

/// Maximum request body size (1 MiB). Webhook payloads are small forms; the
/// recording itself arrives by URL, not in the body.
const MAX_REQUEST_BODY_BYTES: usize = 1024 * 1024;

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let media_dir = state.tts.media_dir().to_path_buf();
    tracing::info!(path = %media_dir.display(), "serving synthesized audio at /media");

    Router::new()
        .route("/health", get(health))
        .route(
            "/voice/connected",
            post(api_webhooks::call_connected_handler),
        )
        .route("/voice/answer", post(api_webhooks::answer_recorded_handler))
        .route("/api/calls", post(api::start_call_handler))
        .route(
            "/api/calls/{callId}/answers",
            get(api::list_answers_handler),
        )
        .nest_service("/media", ServeDir::new(media_dir))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(Arc::new(state)))
}
