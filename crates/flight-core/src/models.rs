//! Tick payloads and the enums shared across the control core.

use crate::geometry::Point3;
use crate::lidar::{GridError, HeightGrid};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Vehicle channel used when a tick does not name one.
pub const DEFAULT_VEHICLE: &str = "default";
/// Mission key used when the very first tick on a channel carries none.
pub const DEFAULT_MISSION: &str = "default";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlightPhase {
    /// Horizontal transit at cruise altitude
    #[default]
    Cruise,
    /// Vertical drop onto the current target
    Descend,
    /// Vertical climb back to cruise altitude
    Ascend,
}

/// Motion discipline for a whole mission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlightProfile {
    /// Cruise, descend onto each target, dwell, climb back out.
    #[default]
    Phased,
    /// Straight 3D legs between targets with a dwell at each.
    Direct,
    /// Horizontal legs at survey altitude, no dwell.
    Survey,
}

impl FlightProfile {
    /// Profile implied by a mission key when the tick does not pick one.
    pub fn for_mission_key(key: &str) -> Self {
        let key = key.trim().to_ascii_uppercase();
        if key.starts_with("2D") {
            FlightProfile::Direct
        } else if key.starts_with("SURVEY") {
            FlightProfile::Survey
        } else {
            FlightProfile::Phased
        }
    }
}

/// Raw tick as delivered by the transport. Every field is optional here;
/// [`Tick::try_from`] decides what is acceptable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TickRequest {
    #[serde(default, alias = "mission_id", alias = "missionId")]
    pub test: Option<String>,
    #[serde(default)]
    pub vehicle: Option<String>,
    #[serde(default)]
    pub profile: Option<FlightProfile>,
    #[serde(default)]
    pub current: Option<Point3>,
    #[serde(default, alias = "emergencyStop")]
    pub emergency_stop: Option<bool>,
    #[serde(default)]
    pub targets: Option<Vec<Point3>>,
    #[serde(default, alias = "lidarBelowDrone")]
    pub lidar_below_drone: Option<Vec<Vec<f64>>>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TickError {
    #[error("'current' field missing")]
    MissingCurrent,
    #[error("'{field}' contains a non-finite coordinate")]
    NonFinite { field: &'static str },
    #[error("'lidar_below_drone' is malformed: {0}")]
    Grid(#[from] GridError),
    #[error("'{field}' must not be blank")]
    Blank { field: &'static str },
}

impl TickError {
    /// Request field the error refers to.
    pub fn field(&self) -> &'static str {
        match self {
            TickError::MissingCurrent => "current",
            TickError::NonFinite { field } | TickError::Blank { field } => field,
            TickError::Grid(_) => "lidar_below_drone",
        }
    }
}

/// A validated tick. Holding one means the payload is safe to apply.
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub mission_id: Option<String>,
    pub vehicle: String,
    pub profile: Option<FlightProfile>,
    pub current: Point3,
    pub emergency_stop: Option<bool>,
    pub targets: Vec<Point3>,
    pub lidar: Option<HeightGrid>,
}

impl Tick {
    /// Minimal tick at `current`, mostly for tests and simulators.
    pub fn at(mission_id: impl Into<String>, current: Point3) -> Self {
        Self {
            mission_id: Some(mission_id.into()),
            vehicle: DEFAULT_VEHICLE.to_string(),
            profile: None,
            current,
            emergency_stop: None,
            targets: Vec::new(),
            lidar: None,
        }
    }

    pub fn with_targets(mut self, targets: Vec<Point3>) -> Self {
        self.targets = targets;
        self
    }

    pub fn with_lidar(mut self, grid: HeightGrid) -> Self {
        self.lidar = Some(grid);
        self
    }

    pub fn with_emergency(mut self, emergency_stop: bool) -> Self {
        self.emergency_stop = Some(emergency_stop);
        self
    }

    pub fn with_profile(mut self, profile: FlightProfile) -> Self {
        self.profile = Some(profile);
        self
    }
}

impl TryFrom<TickRequest> for Tick {
    type Error = TickError;

    fn try_from(request: TickRequest) -> Result<Self, Self::Error> {
        let current = request.current.ok_or(TickError::MissingCurrent)?;
        if !current.is_finite() {
            return Err(TickError::NonFinite { field: "current" });
        }

        let targets = request.targets.unwrap_or_default();
        if targets.iter().any(|t| !t.is_finite()) {
            return Err(TickError::NonFinite { field: "targets" });
        }

        let lidar = request
            .lidar_below_drone
            .map(HeightGrid::from_rows)
            .transpose()?;

        let mission_id = match request.test {
            Some(key) if key.trim().is_empty() => return Err(TickError::Blank { field: "test" }),
            other => other,
        };

        let vehicle = match request.vehicle {
            Some(v) if v.trim().is_empty() => return Err(TickError::Blank { field: "vehicle" }),
            Some(v) => v,
            None => DEFAULT_VEHICLE.to_string(),
        };

        Ok(Tick {
            mission_id,
            vehicle,
            profile: request.profile,
            current,
            emergency_stop: request.emergency_stop,
            targets,
            lidar,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> Result<Tick, TickError> {
        let request: TickRequest = serde_json::from_str(body).expect("valid json");
        Tick::try_from(request)
    }

    #[test]
    fn start_tick_parses_with_snake_case_fields() {
        let tick = parse(
            r#"{
                "current": {"x": 200.0, "y": 200.0, "z": 1.0},
                "emergency_stop": false,
                "targets": [{"x": 733.0, "y": 295.0, "z": 0.0}],
                "test": "Test2DMultiTexture"
            }"#,
        )
        .unwrap();
        assert_eq!(tick.mission_id.as_deref(), Some("Test2DMultiTexture"));
        assert_eq!(tick.vehicle, DEFAULT_VEHICLE);
        assert_eq!(tick.targets.len(), 1);
        assert_eq!(tick.emergency_stop, Some(false));
    }

    #[test]
    fn camel_case_aliases_are_accepted() {
        let tick = parse(
            r#"{"missionId": "m1", "current": {"x": 0, "y": 0, "z": 0},
                "emergencyStop": true, "lidarBelowDrone": [[0.0, 1.0], [2.0, 3.0]]}"#,
        )
        .unwrap();
        assert_eq!(tick.mission_id.as_deref(), Some("m1"));
        assert_eq!(tick.emergency_stop, Some(true));
        assert_eq!(tick.lidar.unwrap().get(1, 1), Some(3.0));
    }

    #[test]
    fn missing_current_is_rejected() {
        let err = parse(r#"{"test": "3DA", "targets": []}"#).unwrap_err();
        assert_eq!(err, TickError::MissingCurrent);
        assert_eq!(err.field(), "current");
        assert_eq!(err.to_string(), "'current' field missing");
    }

    #[test]
    fn ragged_lidar_is_rejected() {
        let err = parse(r#"{"current": {"x": 0, "y": 0, "z": 0}, "lidar_below_drone": [[0.0], []]}"#)
            .unwrap_err();
        assert!(matches!(err, TickError::Grid(_)));
        assert_eq!(err.field(), "lidar_below_drone");
    }

    #[test]
    fn non_numeric_coordinate_fails_to_deserialize() {
        let result = serde_json::from_str::<TickRequest>(r#"{"current": {"x": "north", "y": 0, "z": 0}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn profile_follows_mission_key() {
        assert_eq!(FlightProfile::for_mission_key("2DMT"), FlightProfile::Direct);
        assert_eq!(FlightProfile::for_mission_key("survey"), FlightProfile::Survey);
        assert_eq!(FlightProfile::for_mission_key("3DB"), FlightProfile::Phased);
    }
}
