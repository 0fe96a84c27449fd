pub mod classifier;
pub mod controller;
pub mod geometry;
pub mod landing;
pub mod lidar;
pub mod mission;
pub mod models;
pub mod planner;
pub mod session;

pub use classifier::{resolve_verdict, TerrainClassifier, TerrainVerdict, VarianceClassifier};
pub use controller::{advance, ControllerConfig, CruiseAltitude};
pub use geometry::{path_length, step_toward, Point3, Step, StepMask};
pub use landing::{FlatnessRule, LandingChoice, LandingConfig, LandingSelector, LandingSource};
pub use lidar::{GridError, HeightGrid, LidarHistory, LidarSample};
pub use mission::{Mission, MissionStatus, TickEvent, TickReport};
pub use models::{FlightPhase, FlightProfile, Tick, TickError, TickRequest};
pub use planner::{plan_tour, tour_length, PlannerBudget, RoutePlanner, TourPlan};
pub use session::{PlanJob, PlannedMission, Session};
