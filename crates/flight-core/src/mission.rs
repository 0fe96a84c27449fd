//! Per-mission state owned by a session.

use crate::geometry::Point3;
use crate::landing::LandingChoice;
use crate::lidar::{HeightGrid, LidarHistory, LidarSample};
use crate::models::{FlightPhase, FlightProfile};
use crate::planner::TourPlan;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Dwell timer started when a target is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitState {
    pub started_at: Option<Instant>,
    pub duration: Duration,
}

impl WaitState {
    pub fn idle(duration: Duration) -> Self {
        Self {
            started_at: None,
            duration,
        }
    }

    pub fn is_waiting(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn start(&mut self, now: Instant) {
        self.started_at = Some(now);
    }

    /// Whether the dwell is still running at `now`.
    pub fn holds_at(&self, now: Instant) -> bool {
        self.started_at
            .is_some_and(|started| now.saturating_duration_since(started) < self.duration)
    }

    pub fn clear(&mut self) {
        self.started_at = None;
    }
}

/// Something notable that happened during a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TickEvent {
    MissionStarted {
        mission_id: String,
        profile: FlightProfile,
        waypoints: usize,
        tour_length: f64,
        converged: bool,
    },
    Holding,
    WaitFinished,
    PhaseChanged {
        from: FlightPhase,
        to: FlightPhase,
    },
    TargetReached {
        target: Point3,
        remaining: usize,
    },
    LandingSelected(LandingChoice),
    EmergencyCleared,
    TourRestarted,
    ReturningToStart,
}

/// Outcome of one tick: the commanded position plus what changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    pub position: Point3,
    pub phase: FlightPhase,
    pub remaining: usize,
    pub emergency: bool,
    pub events: Vec<TickEvent>,
}

impl TickReport {
    pub fn has_event(&self, predicate: impl Fn(&TickEvent) -> bool) -> bool {
        self.events.iter().any(predicate)
    }
}

/// Serializable view of a mission for inspection endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissionStatus {
    pub mission_id: String,
    pub profile: FlightProfile,
    pub phase: FlightPhase,
    pub current: Point3,
    pub start: Point3,
    pub remaining: Vec<Point3>,
    pub planned: usize,
    pub waiting: bool,
    pub emergency_stop: bool,
    pub emergency_target: Option<LandingChoice>,
    pub history_len: usize,
    pub ticks: u64,
}

#[derive(Debug, Clone)]
pub struct Mission {
    pub(crate) id: String,
    pub(crate) profile: FlightProfile,
    pub(crate) current: Point3,
    pub(crate) start: Point3,
    /// Tour template, never consumed.
    pub(crate) planned: Vec<Point3>,
    /// Targets still to visit, front first.
    pub(crate) remaining: VecDeque<Point3>,
    pub(crate) emergency_stop: bool,
    /// Set when an emergency episode ends, consumed by the next controller step.
    pub(crate) emergency_ended: bool,
    pub(crate) phase: FlightPhase,
    pub(crate) wait: WaitState,
    pub(crate) emergency_target: Option<LandingChoice>,
    pub(crate) history: LidarHistory,
    pub(crate) ticks: u64,
}

impl Mission {
    /// Fresh mission at `start` flying `plan`.
    pub fn new(
        id: impl Into<String>,
        profile: FlightProfile,
        start: Point3,
        plan: &TourPlan,
        history_capacity: usize,
        wait: Duration,
    ) -> Self {
        Self {
            id: id.into(),
            profile,
            current: start,
            start,
            planned: plan.tour.clone(),
            remaining: plan.tour.iter().copied().collect(),
            emergency_stop: false,
            emergency_ended: false,
            phase: FlightPhase::Cruise,
            wait: WaitState::idle(wait),
            emergency_target: None,
            history: LidarHistory::new(history_capacity),
            ticks: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn profile(&self) -> FlightProfile {
        self.profile
    }

    pub fn phase(&self) -> FlightPhase {
        self.phase
    }

    pub fn current(&self) -> Point3 {
        self.current
    }

    pub fn start(&self) -> Point3 {
        self.start
    }

    pub fn remaining(&self) -> impl Iterator<Item = &Point3> {
        self.remaining.iter()
    }

    pub fn remaining_len(&self) -> usize {
        self.remaining.len()
    }

    pub fn planned(&self) -> &[Point3] {
        &self.planned
    }

    pub fn history(&self) -> &LidarHistory {
        &self.history
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn is_waiting(&self) -> bool {
        self.wait.is_waiting()
    }

    pub fn emergency_stop(&self) -> bool {
        self.emergency_stop
    }

    pub fn emergency_target(&self) -> Option<LandingChoice> {
        self.emergency_target
    }

    /// Refill the queue from the tour template.
    pub fn restart_tour(&mut self) {
        self.remaining = self.planned.iter().copied().collect();
    }

    /// Merge a tick's sensor fields. The emergency cache is dropped as soon
    /// as the flag goes false.
    pub(crate) fn absorb(
        &mut self,
        current: Point3,
        emergency_stop: Option<bool>,
        lidar: Option<HeightGrid>,
    ) {
        self.ticks += 1;
        self.current = current;
        if let Some(flag) = emergency_stop {
            if !flag {
                if self.emergency_stop {
                    self.emergency_ended = true;
                }
                self.emergency_target = None;
            }
            self.emergency_stop = flag;
        }
        if let Some(grid) = lidar {
            self.history.push(LidarSample {
                origin: current,
                grid,
                sampled_at: self.ticks,
            });
        }
    }

    /// Would the next step need to pick a landing target?
    pub fn needs_landing_target(&self, emergency_stop: Option<bool>) -> bool {
        emergency_stop.unwrap_or(self.emergency_stop) && self.emergency_target.is_none()
    }

    /// Point cloud of the scan history while a survey is under way and the
    /// history window is full.
    pub fn survey_cloud(&self, spacing: f64) -> Option<Vec<Point3>> {
        let surveying = self.profile == FlightProfile::Survey
            && !self.emergency_stop
            && !self.remaining.is_empty()
            && self.history.is_full();
        surveying.then(|| self.history.point_cloud(spacing))
    }

    pub fn status(&self) -> MissionStatus {
        MissionStatus {
            mission_id: self.id.clone(),
            profile: self.profile,
            phase: self.phase,
            current: self.current,
            start: self.start,
            remaining: self.remaining.iter().copied().collect(),
            planned: self.planned.len(),
            waiting: self.wait.is_waiting(),
            emergency_stop: self.emergency_stop,
            emergency_target: self.emergency_target,
            history_len: self.history.len(),
            ticks: self.ticks,
        }
    }
}
