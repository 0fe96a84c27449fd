//! Drives whole missions through the router in-process.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use flight_core::{CruiseAltitude, Point3};
use flight_server::{api, config::Config, state::AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn app(config: Config) -> (Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(config));
    (api::routes().with_state(state.clone()), state)
}

fn quick_config() -> Config {
    Config {
        cruise_height: 50.0,
        cruise_altitude: CruiseAltitude::Fixed,
        wait_secs: 0.0,
        ..Config::default()
    }
}

async fn send(app: &Router, body: Value) -> Point3 {
    let request = Request::builder()
        .method("POST")
        .uri("/compute")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn phased_mission_visits_every_target_and_returns_home() {
    let (app, state) = app(quick_config());
    let start = Point3::new(0.0, 0.0, 0.0);
    let targets = [Point3::new(100.0, 0.0, 0.0), Point3::new(0.0, 0.0, 150.0)];

    let mut current = send(
        &app,
        json!({"test": "3DA", "current": start, "emergency_stop": false, "targets": targets}),
    )
    .await;
    let mut trail = vec![current];
    for _ in 0..60 {
        current = send(&app, json!({"test": "3DA", "current": current, "emergency_stop": false})).await;
        trail.push(current);
        let status = state.session_status("default").await.unwrap();
        if status.remaining.is_empty() && current == start {
            break;
        }
    }

    for target in targets {
        assert!(trail.contains(&target), "never touched {:?}", target);
    }
    assert_eq!(*trail.last().unwrap(), start);
    for pair in trail.windows(2) {
        assert!(pair[0].horizontal_distance(&pair[1]) <= 50.0 + 1e-9);
    }
}

#[tokio::test]
async fn emergency_then_recovery_resumes_the_tour() {
    let (app, state) = app(quick_config());
    let start = Point3::new(0.0, 0.0, 0.0);
    let flat = vec![vec![0.0; 5]; 5];

    let mut current = send(
        &app,
        json!({
            "test": "3DB",
            "current": start,
            "targets": [{"x": 300.0, "y": 0.0, "z": 0.0}],
            "lidar_below_drone": flat
        }),
    )
    .await;

    for _ in 0..5 {
        current = send(&app, json!({"test": "3DB", "current": current, "emergency_stop": true})).await;
    }
    let status = state.session_status("default").await.unwrap();
    let landing = status.emergency_target.expect("landing target").target;
    assert_eq!(current, landing);

    current = send(&app, json!({"test": "3DB", "current": current, "emergency_stop": false})).await;
    let status = state.session_status("default").await.unwrap();
    assert!(status.emergency_target.is_none());
    assert!(!status.emergency_stop);

    let before = current;
    current = send(&app, json!({"test": "3DB", "current": current})).await;
    assert!(current.x > before.x, "resumed toward the target");
}

#[tokio::test]
async fn new_mission_key_restarts_from_reported_position() {
    let (app, state) = app(quick_config());
    send(
        &app,
        json!({"test": "first", "current": {"x": 0.0, "y": 0.0, "z": 0.0},
               "targets": [{"x": 500.0, "y": 0.0, "z": 0.0}]}),
    )
    .await;
    let moved = send(
        &app,
        json!({"test": "second", "current": {"x": 10.0, "y": 0.0, "z": 10.0},
               "targets": [{"x": 10.0, "y": 0.0, "z": 500.0}]}),
    )
    .await;
    assert_eq!(moved, Point3::new(10.0, 50.0, 60.0));
    let status = state.session_status("default").await.unwrap();
    assert_eq!(status.mission_id, "second");
    assert_eq!(status.start, Point3::new(10.0, 0.0, 10.0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_ticks_on_one_vehicle_apply_in_turn() {
    const TICKS: usize = 8;
    let (app, state) = app(quick_config());
    let origin = json!({"x": 0.0, "y": 0.0, "z": 0.0});
    // Every target sits within one step of the origin, so each tick that
    // reports the origin consumes exactly one of them.
    let targets: Vec<Point3> = (0..12)
        .map(|i| {
            let angle = i as f64 * std::f64::consts::TAU / 12.0;
            Point3::new(20.0 * angle.cos(), 0.0, 20.0 * angle.sin())
        })
        .collect();

    send(
        &app,
        json!({"test": "2DCT", "vehicle": "bystander", "current": origin,
               "targets": [{"x": 800.0, "y": 0.0, "z": 0.0}]}),
    )
    .await;
    let bystander = state.session_status("bystander").await.unwrap();

    send(
        &app,
        json!({"test": "2DCT", "vehicle": "swarm", "current": origin, "targets": targets}),
    )
    .await;
    let before = state.session_status("swarm").await.unwrap();

    let handles: Vec<_> = (0..TICKS)
        .map(|_| {
            let app = app.clone();
            let body = json!({"test": "2DCT", "vehicle": "swarm", "current": origin});
            tokio::spawn(async move { send(&app, body).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    let after = state.session_status("swarm").await.unwrap();
    assert_eq!(after.ticks, TICKS as u64 + 1);
    assert_eq!(before.remaining.len() - after.remaining.len(), TICKS);

    let untouched = state.session_status("bystander").await.unwrap();
    assert_eq!(untouched.ticks, 1);
    assert_eq!(untouched.remaining, bystander.remaining);
}
