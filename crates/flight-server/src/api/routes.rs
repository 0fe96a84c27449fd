//! REST API routes.

use axum::{
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use std::sync::Arc;

use crate::api::{compute, sessions};
use crate::state::AppState;

/// Create the API router.
pub fn create_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/compute", post(compute::compute))
        .route("/v1/sessions", get(sessions::list_sessions))
        .route("/v1/sessions/:vehicle", get(sessions::get_session))
        .route("/v1/sessions/:vehicle", delete(sessions::delete_session))
        .route("/health", get(|| async { "OK" }))
}

/// 400 with a JSON error body, naming the offending field when known.
pub(crate) fn bad_request(message: &str, field: Option<&str>) -> (StatusCode, Json<serde_json::Value>) {
    let mut payload = serde_json::json!({ "error": message });
    if let Some(field) = field {
        payload["field"] = serde_json::Value::String(field.to_string());
    }
    (StatusCode::BAD_REQUEST, Json(payload))
}
