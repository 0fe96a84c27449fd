//! Server configuration from environment.

use flight_core::{
    ControllerConfig, CruiseAltitude, FlatnessRule, LandingConfig, PlannerBudget,
};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub step: f64,
    pub cruise_height: f64,
    pub survey_height: f64,
    pub cruise_altitude: CruiseAltitude,
    pub wait_secs: f64,
    pub history_capacity: usize,
    pub grid_spacing: f64,
    pub flatness: FlatnessRule,
    pub use_local_classifier: bool,
    pub repeat_tour: bool,
    pub planner_budget_ms: u64,
    pub planner_max_iterations: usize,
    /// Directory for survey point files; capture is off when unset.
    pub capture_dir: Option<PathBuf>,
    pub classifier_url: Option<String>,
    pub classifier_timeout: Duration,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 5000,
            step: 50.0,
            cruise_height: 100.0,
            survey_height: 200.0,
            cruise_altitude: CruiseAltitude::TerrainRaised,
            wait_secs: 2.0,
            history_capacity: 10,
            grid_spacing: 25.0,
            flatness: FlatnessRule::default(),
            use_local_classifier: false,
            repeat_tour: false,
            planner_budget_ms: 250,
            planner_max_iterations: 2_000,
            capture_dir: None,
            classifier_url: None,
            classifier_timeout: Duration::from_millis(300),
            log_format: LogFormat::Text,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let cruise_altitude = match env::var("FLIGHT_CRUISE_POLICY").ok().as_deref() {
            Some("fixed") => CruiseAltitude::Fixed,
            _ => CruiseAltitude::TerrainRaised,
        };

        let flatness = match env::var("FLIGHT_FLATNESS").ok().as_deref() {
            Some("zero") => FlatnessRule::ZeroCorners { epsilon: 1e-6 },
            _ => FlatnessRule::Spread {
                tolerance: parse_env("FLIGHT_FLAT_TOLERANCE", 3.0),
                min_height: parse_env("FLIGHT_MIN_GROUND", -20.0),
            },
        };

        let log_format = match env::var("FLIGHT_LOG_FORMAT").ok().as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Self {
            server_port: parse_env("FLIGHT_PORT", defaults.server_port),
            step: parse_env("FLIGHT_STEP", defaults.step),
            cruise_height: parse_env("FLIGHT_CRUISE_HEIGHT", defaults.cruise_height),
            survey_height: parse_env("FLIGHT_SURVEY_HEIGHT", defaults.survey_height),
            cruise_altitude,
            wait_secs: parse_env("FLIGHT_WAIT_SECS", defaults.wait_secs),
            history_capacity: parse_env("FLIGHT_HISTORY_CAPACITY", defaults.history_capacity),
            grid_spacing: parse_env("FLIGHT_GRID_SPACING", defaults.grid_spacing),
            flatness,
            use_local_classifier: parse_env("FLIGHT_LOCAL_CLASSIFIER", false),
            repeat_tour: parse_env("FLIGHT_REPEAT_TOUR", false),
            planner_budget_ms: parse_env("FLIGHT_PLANNER_BUDGET_MS", defaults.planner_budget_ms),
            planner_max_iterations: parse_env(
                "FLIGHT_PLANNER_MAX_ITER",
                defaults.planner_max_iterations,
            ),
            capture_dir: non_empty_env("FLIGHT_CAPTURE_DIR").map(PathBuf::from),
            classifier_url: non_empty_env("FLIGHT_CLASSIFIER_URL"),
            classifier_timeout: Duration::from_millis(parse_env(
                "FLIGHT_CLASSIFIER_TIMEOUT_MS",
                300,
            )),
            log_format,
        }
    }

    /// Controller tunables derived from this configuration.
    pub fn controller_config(&self) -> ControllerConfig {
        let wait_ms = (self.wait_secs.max(0.0) * 1000.0).round() as u64;
        ControllerConfig {
            step: self.step,
            cruise_height: self.cruise_height,
            survey_height: self.survey_height,
            cruise_altitude: self.cruise_altitude,
            force_cruise_altitude: true,
            wait_ms,
            history_capacity: self.history_capacity,
            repeat_tour: self.repeat_tour,
            landing: LandingConfig {
                rule: self.flatness,
                grid_spacing: self.grid_spacing,
                use_local_classifier: self.use_local_classifier,
                ..LandingConfig::default()
            },
            planner: PlannerBudget {
                max_iterations: self.planner_max_iterations,
                time_budget_ms: self.planner_budget_ms,
                ..PlannerBudget::default()
            },
        }
    }
}

fn parse_env<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_controller_defaults() {
        let controller = Config::default().controller_config();
        let expected = ControllerConfig::default();
        assert_eq!(controller.step, expected.step);
        assert_eq!(controller.cruise_height, expected.cruise_height);
        assert_eq!(controller.wait_ms, 2_000);
        assert_eq!(controller.history_capacity, expected.history_capacity);
        assert_eq!(controller.landing.rule, FlatnessRule::default());
    }

    #[test]
    fn fractional_wait_is_converted_to_millis() {
        let config = Config {
            wait_secs: 0.25,
            ..Config::default()
        };
        assert_eq!(config.controller_config().wait_ms, 250);
    }
}
