//! The tick endpoint.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use flight_core::{PlannedMission, Tick, TickEvent, TickReport, TickRequest, TerrainVerdict};
use serde_json::json;
use std::sync::Arc;

use crate::api::routes::bad_request;
use crate::state::AppState;

/// Apply one tick and answer with the commanded position.
pub async fn compute(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TickRequest>, JsonRejection>,
) -> (StatusCode, Json<serde_json::Value>) {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return bad_request(&rejection.body_text(), None),
    };
    let tick = match Tick::try_from(request) {
        Ok(tick) => tick,
        Err(err) => return bad_request(&err.to_string(), Some(err.field())),
    };

    let vehicle = tick.vehicle.clone();
    let handle = state.session(&vehicle);
    let mut session = handle.lock().await;

    let planned = match session.pending_plan(&tick) {
        Some(job) => {
            let budget = state.controller().planner.clone();
            match tokio::task::spawn_blocking(move || job.run(&budget)).await {
                Ok(planned) => Some(planned),
                Err(err) => {
                    tracing::error!("Planner task failed for {}: {}", vehicle, err);
                    return (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(json!({ "error": "route planning failed" })),
                    );
                }
            }
        }
        None => None,
    };
    if let Some(PlannedMission { job, plan }) = &planned {
        tracing::info!(
            "Vehicle {} starting mission {} ({} waypoints, tour length {:.1}, {} iterations)",
            vehicle,
            job.mission_id,
            job.waypoints.len(),
            plan.length,
            plan.iterations
        );
    }

    let now = tokio::time::Instant::now().into_std();
    let verdict = remote_verdict(&state, &session, &tick, now).await;

    let carried_lidar = tick.lidar.is_some();
    let report = session.apply(tick, planned, verdict.as_ref(), now, state.controller());
    log_report(&vehicle, &report);

    let cloud = carried_lidar
        .then(|| session.mission())
        .flatten()
        .and_then(|mission| mission.survey_cloud(state.controller().landing.grid_spacing));
    drop(session);

    if let (Some(writer), Some(points)) = (state.capture(), cloud) {
        match writer.write(&points, Utc::now()).await {
            Ok(path) => tracing::debug!("Wrote {} survey points to {}", points.len(), path.display()),
            Err(err) => tracing::warn!("Survey capture failed for {}: {}", vehicle, err),
        }
    }

    (StatusCode::OK, Json(json!(report.position)))
}

async fn remote_verdict(
    state: &AppState,
    session: &flight_core::Session,
    tick: &Tick,
    now: std::time::Instant,
) -> Option<TerrainVerdict> {
    let classifier = state.classifier()?;
    let sample = session.landing_probe(tick, now)?;
    match classifier.classify(&sample, now).await {
        Ok(verdict) => Some(verdict),
        Err(err) => {
            tracing::warn!("No classifier verdict for {}: {}", tick.vehicle, err);
            None
        }
    }
}

fn log_report(vehicle: &str, report: &TickReport) {
    tracing::debug!(
        "Vehicle {} -> ({:.2}, {:.2}, {:.2}) phase {:?}, {} remaining",
        vehicle,
        report.position.x,
        report.position.y,
        report.position.z,
        report.phase,
        report.remaining
    );
    for event in &report.events {
        match event {
            TickEvent::TargetReached { target, remaining } => tracing::info!(
                "Vehicle {} reached ({:.1}, {:.1}, {:.1}), {} left",
                vehicle,
                target.x,
                target.y,
                target.z,
                remaining
            ),
            TickEvent::LandingSelected(choice) => tracing::warn!(
                "Vehicle {} emergency landing at ({:.1}, {:.1}, {:.1}) via {:?}",
                vehicle,
                choice.target.x,
                choice.target.y,
                choice.target.z,
                choice.source
            ),
            TickEvent::EmergencyCleared => {
                tracing::info!("Vehicle {} emergency cleared, resuming", vehicle)
            }
            TickEvent::TourRestarted => tracing::info!("Vehicle {} restarting tour", vehicle),
            TickEvent::PhaseChanged { from, to } => {
                tracing::debug!("Vehicle {} phase {:?} -> {:?}", vehicle, from, to)
            }
            _ => {}
        }
    }
}
