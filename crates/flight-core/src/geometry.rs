//! World-space geometry and the straight-line step primitive.
//!
//! The simulator is y-up: `y` is altitude, the ground plane is x/z.

use serde::{Deserialize, Serialize};

/// World-space coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Same point with the altitude replaced.
    pub fn with_altitude(self, y: f64) -> Self {
        Self { y, ..self }
    }

    pub fn distance(&self, other: &Point3) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        let dz = other.z - self.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Distance in the ground plane, ignoring altitude.
    pub fn horizontal_distance(&self, other: &Point3) -> f64 {
        let dx = other.x - self.x;
        let dz = other.z - self.z;
        (dx * dx + dz * dz).sqrt()
    }
}

/// Total length of a polyline.
pub fn path_length(points: &[Point3]) -> f64 {
    points
        .windows(2)
        .map(|pair| pair[0].distance(&pair[1]))
        .sum()
}

/// Which dimensions a step is allowed to change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepMask {
    /// Straight line through all three axes.
    Full,
    /// x/z only.
    Horizontal,
    /// y only.
    Vertical,
}

/// Result of one step toward a target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    pub position: Point3,
    pub reached: bool,
}

/// Move `current` at most `max_step` toward `target` along the masked axes.
///
/// When the masked distance is within `max_step` the result snaps exactly to
/// the target in those axes. Unmasked axes pass through from `current`, except
/// that `hold_altitude` overrides y for horizontal steps.
pub fn step_toward(
    current: Point3,
    target: Point3,
    max_step: f64,
    mask: StepMask,
    hold_altitude: Option<f64>,
) -> Step {
    let (dx, dy, dz) = match mask {
        StepMask::Full => (target.x - current.x, target.y - current.y, target.z - current.z),
        StepMask::Horizontal => (target.x - current.x, 0.0, target.z - current.z),
        StepMask::Vertical => (0.0, target.y - current.y, 0.0),
    };
    let distance = (dx * dx + dy * dy + dz * dz).sqrt();
    let max_step = max_step.max(0.0);

    let altitude_for = |y: f64| match mask {
        StepMask::Horizontal => hold_altitude.unwrap_or(y),
        _ => y,
    };

    if distance <= max_step || distance == 0.0 {
        let snapped = match mask {
            StepMask::Full => target,
            StepMask::Horizontal => Point3::new(target.x, current.y, target.z),
            StepMask::Vertical => Point3::new(current.x, target.y, current.z),
        };
        return Step {
            position: snapped.with_altitude(altitude_for(snapped.y)),
            reached: true,
        };
    }

    let ratio = max_step / distance;
    let moved = Point3::new(
        current.x + dx * ratio,
        current.y + dy * ratio,
        current.z + dz * ratio,
    );
    Step {
        position: moved.with_altitude(altitude_for(moved.y)),
        reached: false,
    }
}
