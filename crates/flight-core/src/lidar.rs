//! Downward height grids and the bounded scan history.

use crate::geometry::Point3;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use thiserror::Error;

/// Spacing between grid samples in world units.
pub const DEFAULT_GRID_SPACING: f64 = 25.0;
/// Number of scans kept for landing search and capture.
pub const DEFAULT_HISTORY_CAPACITY: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("height grid has no rows")]
    Empty,
    #[error("height grid row {row} has {found} cells, expected {expected}")]
    Ragged {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("height grid cell ({row}, {col}) is not a finite number")]
    NonFinite { row: usize, col: usize },
}

/// Ground heights sampled on a regular grid centred under the vehicle.
///
/// Rows run along z, columns along x.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<f64>>", into = "Vec<Vec<f64>>")]
pub struct HeightGrid {
    rows: usize,
    cols: usize,
    heights: Vec<f64>,
}

impl HeightGrid {
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, GridError> {
        let cols = rows.first().map(Vec::len).unwrap_or(0);
        if cols == 0 {
            return Err(GridError::Empty);
        }
        let mut heights = Vec::with_capacity(rows.len() * cols);
        for (row, values) in rows.iter().enumerate() {
            if values.len() != cols {
                return Err(GridError::Ragged {
                    row,
                    expected: cols,
                    found: values.len(),
                });
            }
            for (col, value) in values.iter().enumerate() {
                if !value.is_finite() {
                    return Err(GridError::NonFinite { row, col });
                }
            }
            heights.extend_from_slice(values);
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            heights,
        })
    }

    /// Grid with every cell at the same height.
    pub fn uniform(rows: usize, cols: usize, height: f64) -> Self {
        Self {
            rows: rows.max(1),
            cols: cols.max(1),
            heights: vec![height; rows.max(1) * cols.max(1)],
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.heights.get(row * self.cols + col).copied()
    }

    /// Height directly beneath the vehicle.
    pub fn center(&self) -> f64 {
        self.get(self.rows / 2, self.cols / 2).unwrap_or(0.0)
    }

    /// World-space (x, z) offset of a fractional grid position from the grid centre.
    pub fn offset(&self, row: f64, col: f64, spacing: f64) -> (f64, f64) {
        let half_rows = (self.rows as f64 - 1.0) / 2.0;
        let half_cols = (self.cols as f64 - 1.0) / 2.0;
        ((col - half_cols) * spacing, (row - half_rows) * spacing)
    }

    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.heights
            .chunks(self.cols)
            .map(<[f64]>::to_vec)
            .collect()
    }
}

impl TryFrom<Vec<Vec<f64>>> for HeightGrid {
    type Error = GridError;

    fn try_from(rows: Vec<Vec<f64>>) -> Result<Self, Self::Error> {
        Self::from_rows(rows)
    }
}

impl From<HeightGrid> for Vec<Vec<f64>> {
    fn from(grid: HeightGrid) -> Self {
        grid.to_rows()
    }
}

/// One scan tied to the vehicle position at capture time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LidarSample {
    pub origin: Point3,
    pub grid: HeightGrid,
    /// Mission tick index at capture.
    pub sampled_at: u64,
}

impl LidarSample {
    /// World position of a grid cell on the sensed ground.
    pub fn cell_position(&self, row: usize, col: usize, spacing: f64) -> Option<Point3> {
        let height = self.grid.get(row, col)?;
        let (dx, dz) = self.grid.offset(row as f64, col as f64, spacing);
        Some(Point3::new(self.origin.x + dx, height, self.origin.z + dz))
    }
}

/// Newest-first ring buffer of scans.
#[derive(Debug, Clone)]
pub struct LidarHistory {
    capacity: usize,
    samples: VecDeque<LidarSample>,
}

impl Default for LidarHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl LidarHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    /// Insert a scan as the newest entry, evicting the oldest when full.
    pub fn push(&mut self, sample: LidarSample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_back();
        }
        self.samples.push_front(sample);
    }

    /// Scans ordered newest-first.
    pub fn iter(&self) -> impl Iterator<Item = &LidarSample> {
        self.samples.iter()
    }

    pub fn snapshot(&self) -> Vec<LidarSample> {
        self.samples.iter().cloned().collect()
    }

    pub fn newest(&self) -> Option<&LidarSample> {
        self.samples.front()
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() == self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Flatten every scan into world points, newest scan first, row-major.
    pub fn point_cloud(&self, spacing: f64) -> Vec<Point3> {
        let mut points = Vec::new();
        for sample in &self.samples {
            for row in 0..sample.grid.rows() {
                for col in 0..sample.grid.cols() {
                    if let Some(point) = sample.cell_position(row, col, spacing) {
                        points.push(point);
                    }
                }
            }
        }
        points
    }
}
