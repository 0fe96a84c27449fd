//! Session inspection endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use flight_core::MissionStatus;
use std::sync::Arc;

use crate::state::{AppState, SessionSummary};

pub async fn list_sessions(State(state): State<Arc<AppState>>) -> Json<Vec<SessionSummary>> {
    Json(state.list_sessions().await)
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(vehicle): Path<String>,
) -> Result<Json<MissionStatus>, StatusCode> {
    state
        .session_status(&vehicle)
        .await
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(vehicle): Path<String>,
) -> StatusCode {
    if state.remove_session(&vehicle) {
        tracing::info!("Dropped session for vehicle {}", vehicle);
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}
