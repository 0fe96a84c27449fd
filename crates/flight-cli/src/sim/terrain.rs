//! Procedural ground for the simulator.
//!
//! Rolling hills with scattered rocks and a few level landing pads. Ground
//! outside the world edge reads as [`NO_GROUND`], like a sensor ray that
//! never returns.

use flight_core::{HeightGrid, Point3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Height reported where a lidar ray finds nothing.
pub const NO_GROUND: f64 = -999.0;

#[derive(Debug, Clone, Copy)]
struct Feature {
    x: f64,
    z: f64,
    radius: f64,
    height: f64,
}

impl Feature {
    fn covers(&self, x: f64, z: f64) -> Option<f64> {
        let d = ((x - self.x).powi(2) + (z - self.z).powi(2)).sqrt();
        (d <= self.radius).then_some(d / self.radius)
    }
}

#[derive(Debug, Clone)]
pub struct Terrain {
    half_extent: f64,
    base: f64,
    swell: f64,
    wavelength: f64,
    rocks: Vec<Feature>,
    pads: Vec<Feature>,
}

impl Terrain {
    /// Random world spanning `[-half_extent, half_extent]` on x and z.
    pub fn generate(seed: u64, half_extent: f64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut feature = |radius: (f64, f64), height: (f64, f64)| Feature {
            x: rng.random_range(-half_extent..half_extent),
            z: rng.random_range(-half_extent..half_extent),
            radius: rng.random_range(radius.0..radius.1),
            height: rng.random_range(height.0..height.1),
        };
        let rocks = (0..40).map(|_| feature((10.0, 40.0), (5.0, 35.0))).collect();
        let pads = (0..6).map(|_| feature((40.0, 80.0), (0.0, 10.0))).collect();
        Self {
            half_extent,
            base: 0.0,
            swell: 12.0,
            wavelength: 180.0,
            rocks,
            pads,
        }
    }

    /// Level ground at `height` everywhere inside the edge.
    pub fn flat(height: f64, half_extent: f64) -> Self {
        Self {
            half_extent,
            base: height,
            swell: 0.0,
            wavelength: 1.0,
            rocks: Vec::new(),
            pads: Vec::new(),
        }
    }

    pub fn height_at(&self, x: f64, z: f64) -> Option<f64> {
        if x.abs() > self.half_extent || z.abs() > self.half_extent {
            return None;
        }
        if let Some(pad) = self.pads.iter().find(|p| p.covers(x, z).is_some()) {
            return Some(pad.height);
        }
        let hills = self.swell * (x / self.wavelength).sin() * (z / self.wavelength).cos();
        let rocks: f64 = self
            .rocks
            .iter()
            .filter_map(|rock| rock.covers(x, z).map(|t| rock.height * (1.0 - t)))
            .sum();
        Some(self.base + hills + rocks)
    }

    /// Square lidar scan centred under `origin`; rows run along z, columns
    /// along x.
    pub fn scan(&self, origin: Point3, size: usize, spacing: f64) -> Vec<Vec<f64>> {
        let layout = HeightGrid::uniform(size, size, 0.0);
        (0..size)
            .map(|row| {
                (0..size)
                    .map(|col| {
                        let (dx, dz) = layout.offset(row as f64, col as f64, spacing);
                        self.height_at(origin.x + dx, origin.z + dz)
                            .unwrap_or(NO_GROUND)
                    })
                    .collect()
            })
            .collect()
    }
}
