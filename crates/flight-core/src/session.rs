//! One vehicle channel's conversation with the controller.
//!
//! A session owns at most one mission. A tick whose mission key differs from
//! the active mission discards it and starts fresh from the tick's position.
//! Planning is split out as a [`PlanJob`] so callers can run it off their
//! request thread and hand the result back to [`Session::apply`].

use crate::classifier::TerrainVerdict;
use crate::controller::{advance, ControllerConfig};
use crate::geometry::Point3;
use crate::lidar::LidarSample;
use crate::mission::{Mission, TickEvent, TickReport};
use crate::models::{FlightProfile, Tick, DEFAULT_MISSION};
use crate::planner::{PlannerBudget, RoutePlanner, TourPlan};
use std::time::Instant;

/// Work needed to start a mission.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanJob {
    pub mission_id: String,
    pub profile: FlightProfile,
    pub waypoints: Vec<Point3>,
    pub start: Point3,
}

impl PlanJob {
    pub fn run(self, budget: &PlannerBudget) -> PlannedMission {
        let plan = RoutePlanner::new(budget.clone()).plan(&self.waypoints, self.start);
        PlannedMission { job: self, plan }
    }
}

#[derive(Debug, Clone)]
pub struct PlannedMission {
    pub job: PlanJob,
    pub plan: TourPlan,
}

#[derive(Debug, Default)]
pub struct Session {
    mission: Option<Mission>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mission(&self) -> Option<&Mission> {
        self.mission.as_ref()
    }

    /// Key the tick belongs to. Ticks without one continue the active mission.
    pub fn mission_key(&self, tick: &Tick) -> String {
        tick.mission_id
            .clone()
            .or_else(|| self.mission.as_ref().map(|m| m.id().to_string()))
            .unwrap_or_else(|| DEFAULT_MISSION.to_string())
    }

    fn active_for(&self, key: &str) -> Option<&Mission> {
        self.mission.as_ref().filter(|m| m.id() == key)
    }

    /// Planning work this tick requires, if it starts a new mission.
    pub fn pending_plan(&self, tick: &Tick) -> Option<PlanJob> {
        let key = self.mission_key(tick);
        if self.active_for(&key).is_some() {
            return None;
        }
        let profile = tick
            .profile
            .unwrap_or_else(|| FlightProfile::for_mission_key(&key));
        Some(PlanJob {
            mission_id: key,
            profile,
            waypoints: tick.targets.clone(),
            start: tick.current,
        })
    }

    /// The scan a classifier should look at, when this tick is about to pick
    /// an emergency landing target. A mission still dwelling at `now` picks
    /// nothing this tick.
    pub fn landing_probe(&self, tick: &Tick, now: Instant) -> Option<LidarSample> {
        let key = self.mission_key(tick);
        let existing = self.active_for(&key);
        let needs_target = match existing {
            Some(mission) if mission.wait.holds_at(now) => false,
            Some(mission) => mission.needs_landing_target(tick.emergency_stop),
            None => tick.emergency_stop == Some(true),
        };
        if !needs_target {
            return None;
        }

        match &tick.lidar {
            Some(grid) => Some(LidarSample {
                origin: tick.current,
                grid: grid.clone(),
                sampled_at: existing.map_or(0, Mission::ticks) + 1,
            }),
            None => existing.and_then(|m| m.history().newest().cloned()),
        }
    }

    /// Apply a validated tick. `planned` should be the result of running
    /// [`Session::pending_plan`] for this same tick; when it is missing and a
    /// plan is needed, planning runs inline.
    pub fn apply(
        &mut self,
        tick: Tick,
        planned: Option<PlannedMission>,
        verdict: Option<&TerrainVerdict>,
        now: Instant,
        config: &ControllerConfig,
    ) -> TickReport {
        let planned = planned.or_else(|| {
            self.pending_plan(&tick)
                .map(|job| job.run(&config.planner))
        });

        let mut started = None;
        if let Some(PlannedMission { job, plan }) = planned {
            started = Some(TickEvent::MissionStarted {
                mission_id: job.mission_id.clone(),
                profile: job.profile,
                waypoints: job.waypoints.len(),
                tour_length: plan.length,
                converged: plan.converged,
            });
            self.mission = Some(Mission::new(
                job.mission_id,
                job.profile,
                job.start,
                &plan,
                config.history_capacity,
                config.wait_duration(),
            ));
        }

        let mission = self
            .mission
            .get_or_insert_with(|| idle_mission(&tick, config));
        mission.absorb(tick.current, tick.emergency_stop, tick.lidar);
        let mut report = advance(mission, now, verdict, config);
        if let Some(event) = started {
            report.events.insert(0, event);
        }
        report
    }

    /// Plan inline and apply, for callers without a blocking pool.
    pub fn handle(
        &mut self,
        tick: Tick,
        verdict: Option<&TerrainVerdict>,
        now: Instant,
        config: &ControllerConfig,
    ) -> TickReport {
        self.apply(tick, None, verdict, now, config)
    }
}

// Only reachable when a caller hands over a plan for another key.
fn idle_mission(tick: &Tick, config: &ControllerConfig) -> Mission {
    let plan = RoutePlanner::new(config.planner.clone()).plan(&[], tick.current);
    Mission::new(
        DEFAULT_MISSION,
        FlightProfile::default(),
        tick.current,
        &plan,
        config.history_capacity,
        config.wait_duration(),
    )
}
