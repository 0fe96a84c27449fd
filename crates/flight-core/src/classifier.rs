//! Terrain classification verdicts.
//!
//! A classifier looks at the newest scan and either recommends a touchdown
//! point or labels each cell safe/unsafe. Verdicts are advisory: the landing
//! selector falls back to its geometric scan when a verdict yields nothing.

use crate::geometry::Point3;
use crate::lidar::{HeightGrid, LidarSample};
use serde::{Deserialize, Serialize};

/// Cells whose neighbourhood variance is below this are labelled safe.
pub const DEFAULT_VARIANCE_THRESHOLD: f64 = 5.0;

/// Ground lower than this is never a touchdown candidate. Matches the
/// default flatness rule's depth limit.
pub const DEFAULT_MIN_HEIGHT: f64 = -20.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TerrainVerdict {
    /// World-space touchdown point.
    Point { landing_point: Point3 },
    /// Per-cell labels in grid layout, `true` = safe.
    Cells { safe_cells: Vec<Vec<bool>> },
}

pub trait TerrainClassifier: Send + Sync {
    fn classify(&self, sample: &LidarSample, spacing: f64) -> TerrainVerdict;
}

/// Labels a cell safe when its clamped 3x3 neighbourhood is nearly level
/// and the cell itself is no deeper than `min_height`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VarianceClassifier {
    pub threshold: f64,
    pub min_height: f64,
}

impl Default for VarianceClassifier {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_VARIANCE_THRESHOLD,
            min_height: DEFAULT_MIN_HEIGHT,
        }
    }
}

impl VarianceClassifier {
    /// Population variance of each cell's neighbourhood, row-major.
    pub fn variance_map(grid: &HeightGrid) -> Vec<f64> {
        let (rows, cols) = (grid.rows(), grid.cols());
        let mut out = Vec::with_capacity(rows * cols);
        for row in 0..rows {
            for col in 0..cols {
                let mut values = Vec::with_capacity(9);
                for r in row.saturating_sub(1)..(row + 2).min(rows) {
                    for c in col.saturating_sub(1)..(col + 2).min(cols) {
                        if let Some(h) = grid.get(r, c) {
                            values.push(h);
                        }
                    }
                }
                out.push(population_variance(&values));
            }
        }
        out
    }

    pub fn labels(&self, grid: &HeightGrid) -> Vec<Vec<bool>> {
        let variances = Self::variance_map(grid);
        (0..grid.rows())
            .map(|row| {
                (0..grid.cols())
                    .map(|col| {
                        variances[row * grid.cols() + col] < self.threshold
                            && deep_enough(grid, row, col, self.min_height)
                    })
                    .collect()
            })
            .collect()
    }
}

impl TerrainClassifier for VarianceClassifier {
    fn classify(&self, sample: &LidarSample, spacing: f64) -> TerrainVerdict {
        let variances = Self::variance_map(&sample.grid);
        let cols = sample.grid.cols();
        let safest = variances
            .iter()
            .enumerate()
            .filter(|(idx, v)| {
                **v < self.threshold && deep_enough(&sample.grid, idx / cols, idx % cols, self.min_height)
            })
            .min_by(|a, b| a.1.total_cmp(b.1));

        match safest.and_then(|(idx, _)| sample.cell_position(idx / cols, idx % cols, spacing)) {
            Some(landing_point) => TerrainVerdict::Point { landing_point },
            None => TerrainVerdict::Cells {
                safe_cells: self.labels(&sample.grid),
            },
        }
    }
}

/// Turn a verdict about `sample` into a touchdown point, if it offers one.
///
/// Cell labels resolve to the labelled-safe cell with the lowest local
/// variance. Label grids that do not match the scan's shape are ignored.
/// Points and cells below `min_height` are rejected whatever the verdict says.
pub fn resolve_verdict(
    verdict: &TerrainVerdict,
    sample: &LidarSample,
    spacing: f64,
    min_height: f64,
) -> Option<Point3> {
    match verdict {
        TerrainVerdict::Point { landing_point } => {
            (landing_point.is_finite() && landing_point.y >= min_height).then_some(*landing_point)
        }
        TerrainVerdict::Cells { safe_cells } => {
            let grid = &sample.grid;
            if safe_cells.len() != grid.rows() || safe_cells.iter().any(|r| r.len() != grid.cols()) {
                return None;
            }
            let variances = VarianceClassifier::variance_map(grid);
            let mut best: Option<(usize, usize, f64)> = None;
            for (row, labels) in safe_cells.iter().enumerate() {
                for (col, safe) in labels.iter().enumerate() {
                    if !*safe || !deep_enough(grid, row, col, min_height) {
                        continue;
                    }
                    let variance = variances[row * grid.cols() + col];
                    if best.map_or(true, |(_, _, v)| variance < v) {
                        best = Some((row, col, variance));
                    }
                }
            }
            best.and_then(|(row, col, _)| sample.cell_position(row, col, spacing))
        }
    }
}

fn deep_enough(grid: &HeightGrid, row: usize, col: usize, min_height: f64) -> bool {
    grid.get(row, col).is_some_and(|h| h >= min_height)
}

fn population_variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rough_grid_with_level_corner() -> HeightGrid {
        HeightGrid::from_rows(vec![
            vec![0.0, 0.0, 0.0, 40.0, -10.0],
            vec![0.0, 0.0, 0.0, -30.0, 25.0],
            vec![0.0, 0.0, 0.0, 60.0, -45.0],
            vec![35.0, -20.0, 50.0, 10.0, 70.0],
            vec![-40.0, 15.0, -25.0, 80.0, 5.0],
        ])
        .unwrap()
    }

    #[test]
    fn level_corner_is_the_safest_cell() {
        let sample = LidarSample {
            origin: Point3::new(0.0, 100.0, 0.0),
            grid: rough_grid_with_level_corner(),
            sampled_at: 3,
        };
        let verdict = VarianceClassifier::default().classify(&sample, 25.0);
        // (0,0) is the first cell with zero neighbourhood variance.
        assert_eq!(
            verdict,
            TerrainVerdict::Point {
                landing_point: Point3::new(-50.0, 0.0, -50.0)
            }
        );
    }

    #[test]
    fn rough_everywhere_yields_no_point() {
        let grid = HeightGrid::from_rows(vec![
            vec![0.0, 50.0, 0.0],
            vec![50.0, 0.0, 50.0],
            vec![0.0, 50.0, 0.0],
        ])
        .unwrap();
        let sample = LidarSample {
            origin: Point3::default(),
            grid,
            sampled_at: 0,
        };
        let verdict = VarianceClassifier::default().classify(&sample, 25.0);
        assert_eq!(resolve_verdict(&verdict, &sample, 25.0, DEFAULT_MIN_HEIGHT), None);
    }

    #[test]
    fn cell_labels_resolve_to_world_position() {
        let sample = LidarSample {
            origin: Point3::new(100.0, 80.0, 100.0),
            grid: HeightGrid::uniform(3, 3, 4.0),
            sampled_at: 0,
        };
        let verdict = TerrainVerdict::Cells {
            safe_cells: vec![
                vec![false, false, false],
                vec![false, false, true],
                vec![false, false, false],
            ],
        };
        assert_eq!(
            resolve_verdict(&verdict, &sample, 25.0, DEFAULT_MIN_HEIGHT),
            Some(Point3::new(125.0, 4.0, 100.0))
        );
    }

    #[test]
    fn mismatched_label_shape_is_ignored() {
        let sample = LidarSample {
            origin: Point3::default(),
            grid: HeightGrid::uniform(3, 3, 0.0),
            sampled_at: 0,
        };
        let verdict = TerrainVerdict::Cells {
            safe_cells: vec![vec![true]],
        };
        assert_eq!(resolve_verdict(&verdict, &sample, 25.0, DEFAULT_MIN_HEIGHT), None);
    }

    #[test]
    fn no_ground_is_never_safe() {
        let sample = LidarSample {
            origin: Point3::new(5.0, 60.0, 5.0),
            grid: HeightGrid::uniform(5, 5, -999.0),
            sampled_at: 0,
        };
        let classifier = VarianceClassifier::default();
        let verdict = classifier.classify(&sample, 25.0);
        assert!(matches!(verdict, TerrainVerdict::Cells { .. }));
        assert!(classifier.labels(&sample.grid).iter().flatten().all(|safe| !*safe));
        assert_eq!(resolve_verdict(&verdict, &sample, 25.0, DEFAULT_MIN_HEIGHT), None);

        let trusting = TerrainVerdict::Cells {
            safe_cells: vec![vec![true; 5]; 5],
        };
        assert_eq!(resolve_verdict(&trusting, &sample, 25.0, DEFAULT_MIN_HEIGHT), None);
        let sunken = TerrainVerdict::Point {
            landing_point: Point3::new(0.0, -999.0, 0.0),
        };
        assert_eq!(resolve_verdict(&sunken, &sample, 25.0, DEFAULT_MIN_HEIGHT), None);
    }

    #[test]
    fn verdict_wire_shapes() {
        let point: TerrainVerdict =
            serde_json::from_str(r#"{"landing_point": {"x": 1.0, "y": 2.0, "z": 3.0}}"#).unwrap();
        assert!(matches!(point, TerrainVerdict::Point { .. }));
        let cells: TerrainVerdict = serde_json::from_str(r#"{"safe_cells": [[true, false]]}"#).unwrap();
        assert!(matches!(cells, TerrainVerdict::Cells { .. }));
    }
}
