//! Per-tick motion control.
//!
//! One call to [`advance`] moves a mission by one step: honour the dwell
//! timer, divert to the emergency landing target, return home when the queue
//! is empty, or drive the active profile toward the front target.

use crate::classifier::TerrainVerdict;
use crate::geometry::{step_toward, Point3, Step, StepMask};
use crate::landing::{LandingConfig, LandingSelector};
use crate::lidar::DEFAULT_HISTORY_CAPACITY;
use crate::mission::{Mission, TickEvent, TickReport};
use crate::models::{FlightPhase, FlightProfile};
use crate::planner::PlannerBudget;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// How the cruise altitude is derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CruiseAltitude {
    /// Always the configured cruise height.
    Fixed,
    /// Cruise height plus the ground sensed under the vehicle, never lower
    /// than the cruise height itself.
    #[default]
    TerrainRaised,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Maximum distance covered per tick.
    pub step: f64,
    pub cruise_height: f64,
    pub survey_height: f64,
    pub cruise_altitude: CruiseAltitude,
    /// Pin y to the cruise altitude during horizontal legs instead of
    /// carrying the current altitude through.
    pub force_cruise_altitude: bool,
    pub wait_ms: u64,
    pub history_capacity: usize,
    /// Refill the queue from the tour template once it empties.
    pub repeat_tour: bool,
    pub landing: LandingConfig,
    pub planner: PlannerBudget,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            step: 50.0,
            cruise_height: 100.0,
            survey_height: 200.0,
            cruise_altitude: CruiseAltitude::TerrainRaised,
            force_cruise_altitude: true,
            wait_ms: 2_000,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            repeat_tour: false,
            landing: LandingConfig::default(),
            planner: PlannerBudget::default(),
        }
    }
}

impl ControllerConfig {
    pub fn wait_duration(&self) -> Duration {
        Duration::from_millis(self.wait_ms)
    }

    /// Altitude for horizontal legs of a phased mission.
    pub fn cruise_altitude_for(&self, mission: &Mission) -> f64 {
        match self.cruise_altitude {
            CruiseAltitude::Fixed => self.cruise_height,
            CruiseAltitude::TerrainRaised => {
                let ground = mission.history.newest().map_or(0.0, |s| s.grid.center());
                (self.cruise_height + ground).max(self.cruise_height)
            }
        }
    }

    fn hold(&self, altitude: f64) -> Option<f64> {
        self.force_cruise_altitude.then_some(altitude)
    }
}

/// Advance `mission` by one tick. `verdict` is an optional classifier opinion
/// used only if a new landing target has to be picked.
pub fn advance(
    mission: &mut Mission,
    now: Instant,
    verdict: Option<&TerrainVerdict>,
    config: &ControllerConfig,
) -> TickReport {
    let mut events = Vec::new();

    if mission.wait.is_waiting() {
        if mission.wait.holds_at(now) {
            events.push(TickEvent::Holding);
            return report(mission, events);
        }
        mission.wait.clear();
        events.push(TickEvent::WaitFinished);
    }

    if mission.emergency_stop {
        let choice = match mission.emergency_target {
            Some(choice) => choice,
            None => {
                let choice = LandingSelector::new(config.landing.clone()).choose(
                    &mission.history,
                    mission.start,
                    verdict,
                );
                mission.emergency_target = Some(choice);
                events.push(TickEvent::LandingSelected(choice));
                choice
            }
        };
        let step = step_toward(mission.current, choice.target, config.step, StepMask::Full, None);
        mission.current = step.position;
        return report(mission, events);
    }

    if std::mem::take(&mut mission.emergency_ended) {
        events.push(TickEvent::EmergencyCleared);
        // The vehicle left its descent column; approach the target again
        // starting next tick.
        if mission.phase == FlightPhase::Descend {
            set_phase(mission, FlightPhase::Cruise, &mut events);
            return report(mission, events);
        }
    }

    if mission.remaining.is_empty() && config.repeat_tour && mission.planned.len() > 1 {
        mission.restart_tour();
        events.push(TickEvent::TourRestarted);
    }

    let Some(&target) = mission.remaining.front() else {
        let step = step_toward(mission.current, mission.start, config.step, StepMask::Full, None);
        if !step.reached {
            events.push(TickEvent::ReturningToStart);
        }
        mission.current = step.position;
        return report(mission, events);
    };

    let position = match mission.profile {
        FlightProfile::Phased => phased_step(mission, target, now, config, &mut events),
        FlightProfile::Direct => {
            let step = step_toward(mission.current, target, config.step, StepMask::Full, None);
            if step.reached {
                mission.wait.start(now);
                consume_target(mission, target, &mut events);
            }
            step.position
        }
        FlightProfile::Survey => {
            let step = step_toward(
                mission.current,
                target,
                config.step,
                StepMask::Horizontal,
                config.hold(config.survey_height),
            );
            if step.reached {
                consume_target(mission, target, &mut events);
            }
            step.position
        }
    };

    mission.current = position;
    report(mission, events)
}

fn phased_step(
    mission: &mut Mission,
    target: Point3,
    now: Instant,
    config: &ControllerConfig,
    events: &mut Vec<TickEvent>,
) -> Point3 {
    let cruise = config.cruise_altitude_for(mission);
    match mission.phase {
        FlightPhase::Cruise => {
            let Step { position, reached } = step_toward(
                mission.current,
                target,
                config.step,
                StepMask::Horizontal,
                config.hold(cruise),
            );
            if reached {
                set_phase(mission, FlightPhase::Descend, events);
            }
            position
        }
        FlightPhase::Descend => {
            let Step { position, reached } =
                step_toward(mission.current, target, config.step, StepMask::Vertical, None);
            if reached {
                mission.wait.start(now);
                consume_target(mission, target, events);
                set_phase(mission, FlightPhase::Ascend, events);
            }
            position
        }
        FlightPhase::Ascend => {
            let Step { position, reached } = step_toward(
                mission.current,
                mission.current.with_altitude(cruise),
                config.step,
                StepMask::Vertical,
                None,
            );
            if reached {
                set_phase(mission, FlightPhase::Cruise, events);
            }
            position
        }
    }
}

fn consume_target(mission: &mut Mission, target: Point3, events: &mut Vec<TickEvent>) {
    mission.remaining.pop_front();
    events.push(TickEvent::TargetReached {
        target,
        remaining: mission.remaining.len(),
    });
}

fn set_phase(mission: &mut Mission, to: FlightPhase, events: &mut Vec<TickEvent>) {
    let from = mission.phase;
    mission.phase = to;
    events.push(TickEvent::PhaseChanged { from, to });
}

fn report(mission: &Mission, events: Vec<TickEvent>) -> TickReport {
    TickReport {
        position: mission.current,
        phase: mission.phase,
        remaining: mission.remaining.len(),
        emergency: mission.emergency_stop,
        events,
    }
}
