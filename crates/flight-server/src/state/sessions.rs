//! Per-vehicle session store using DashMap.
//!
//! Each vehicle channel gets its own async mutex so ticks on one channel are
//! applied strictly in order while other channels proceed in parallel.

use crate::capture::CaptureWriter;
use crate::classifier::RemoteClassifier;
use crate::config::Config;
use dashmap::DashMap;
use flight_core::{ControllerConfig, FlightPhase, MissionStatus, Session};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

pub type SessionHandle = Arc<Mutex<Session>>;

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub vehicle: String,
    pub mission_id: Option<String>,
    pub phase: Option<FlightPhase>,
    pub remaining: usize,
    pub emergency_stop: bool,
}

pub struct AppState {
    sessions: DashMap<String, SessionHandle>,
    config: Config,
    controller: ControllerConfig,
    classifier: Option<RemoteClassifier>,
    capture: Option<CaptureWriter>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let classifier = config
            .classifier_url
            .clone()
            .map(|url| RemoteClassifier::new(url, config.classifier_timeout));
        let capture = config.capture_dir.clone().map(CaptureWriter::new);
        Self {
            sessions: DashMap::new(),
            controller: config.controller_config(),
            config,
            classifier,
            capture,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn controller(&self) -> &ControllerConfig {
        &self.controller
    }

    pub fn classifier(&self) -> Option<&RemoteClassifier> {
        self.classifier.as_ref()
    }

    pub fn capture(&self) -> Option<&CaptureWriter> {
        self.capture.as_ref()
    }

    /// Session for `vehicle`, created on first use. Entries stay until
    /// [`AppState::remove_session`] drops them; nothing evicts idle channels.
    pub fn session(&self, vehicle: &str) -> SessionHandle {
        self.sessions
            .entry(vehicle.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Session::new())))
            .value()
            .clone()
    }

    fn handles(&self) -> Vec<(String, SessionHandle)> {
        let mut handles: Vec<_> = self
            .sessions
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        handles.sort_by(|a, b| a.0.cmp(&b.0));
        handles
    }

    pub async fn list_sessions(&self) -> Vec<SessionSummary> {
        let mut summaries = Vec::new();
        for (vehicle, handle) in self.handles() {
            let session = handle.lock().await;
            let mission = session.mission();
            summaries.push(SessionSummary {
                vehicle,
                mission_id: mission.map(|m| m.id().to_string()),
                phase: mission.map(|m| m.phase()),
                remaining: mission.map_or(0, |m| m.remaining_len()),
                emergency_stop: mission.is_some_and(|m| m.emergency_stop()),
            });
        }
        summaries
    }

    pub async fn session_status(&self, vehicle: &str) -> Option<MissionStatus> {
        let handle = self.sessions.get(vehicle).map(|entry| entry.value().clone())?;
        let session = handle.lock().await;
        session.mission().map(|m| m.status())
    }

    /// Forget a vehicle channel. A tick already holding the handle finishes
    /// against the detached session; the next tick starts a fresh one.
    pub fn remove_session(&self, vehicle: &str) -> bool {
        self.sessions.remove(vehicle).is_some()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
