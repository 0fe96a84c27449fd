//! Emergency touchdown selection over the scan history.

use crate::classifier::{resolve_verdict, TerrainClassifier, TerrainVerdict, VarianceClassifier};
use crate::geometry::Point3;
use crate::lidar::{LidarHistory, LidarSample, DEFAULT_GRID_SPACING};
use serde::{Deserialize, Serialize};

/// Flatness test applied to each 2x2 window. One rule per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum FlatnessRule {
    /// Corner heights within `tolerance` of each other and the reference
    /// corner no lower than `min_height`.
    Spread { tolerance: f64, min_height: f64 },
    /// All four corners at ground zero.
    ZeroCorners { epsilon: f64 },
}

impl Default for FlatnessRule {
    fn default() -> Self {
        FlatnessRule::Spread {
            tolerance: 3.0,
            min_height: -20.0,
        }
    }
}

impl FlatnessRule {
    /// `corners` is `[top-left, top-right, bottom-left, bottom-right]`.
    pub fn accepts(&self, corners: [f64; 4]) -> bool {
        match *self {
            FlatnessRule::Spread {
                tolerance,
                min_height,
            } => {
                let max = corners.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let min = corners.iter().copied().fold(f64::INFINITY, f64::min);
                max - min <= tolerance && corners[0] >= min_height
            }
            FlatnessRule::ZeroCorners { epsilon } => corners.iter().all(|h| h.abs() <= epsilon),
        }
    }

    /// Lowest ground this rule will ever land on.
    pub fn min_height(&self) -> f64 {
        match *self {
            FlatnessRule::Spread { min_height, .. } => min_height,
            FlatnessRule::ZeroCorners { epsilon } => -epsilon,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LandingConfig {
    pub rule: FlatnessRule,
    pub grid_spacing: f64,
    /// Ask the variance classifier about the newest scan before scanning windows.
    pub use_local_classifier: bool,
    pub variance_threshold: f64,
}

impl Default for LandingConfig {
    fn default() -> Self {
        Self {
            rule: FlatnessRule::default(),
            grid_spacing: DEFAULT_GRID_SPACING,
            use_local_classifier: false,
            variance_threshold: crate::classifier::DEFAULT_VARIANCE_THRESHOLD,
        }
    }
}

/// Where the chosen touchdown point came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandingSource {
    Classifier,
    FlatWindow,
    /// Nothing qualified; returning to the start position.
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LandingChoice {
    pub target: Point3,
    pub source: LandingSource,
}

#[derive(Debug, Clone, Default)]
pub struct LandingSelector {
    pub config: LandingConfig,
}

impl LandingSelector {
    pub fn new(config: LandingConfig) -> Self {
        Self { config }
    }

    /// Geometric scan only.
    pub fn select(&self, history: &LidarHistory, fallback: Point3) -> Point3 {
        self.choose(history, fallback, None).target
    }

    /// Pick a touchdown point, preferring a classifier verdict about the
    /// newest scan when one is supplied (or the local classifier is enabled).
    pub fn choose(
        &self,
        history: &LidarHistory,
        fallback: Point3,
        verdict: Option<&TerrainVerdict>,
    ) -> LandingChoice {
        if let Some(target) = self.classifier_target(history, verdict) {
            return LandingChoice {
                target,
                source: LandingSource::Classifier,
            };
        }

        history
            .iter()
            .find_map(|sample| self.first_flat_window(sample))
            .map(|target| LandingChoice {
                target,
                source: LandingSource::FlatWindow,
            })
            .unwrap_or(LandingChoice {
                target: fallback,
                source: LandingSource::Fallback,
            })
    }

    fn classifier_target(
        &self,
        history: &LidarHistory,
        verdict: Option<&TerrainVerdict>,
    ) -> Option<Point3> {
        let newest = history.newest()?;
        let spacing = self.config.grid_spacing;
        let min_height = self.config.rule.min_height();
        match verdict {
            Some(verdict) => resolve_verdict(verdict, newest, spacing, min_height),
            None if self.config.use_local_classifier => {
                let classifier = VarianceClassifier {
                    threshold: self.config.variance_threshold,
                    min_height,
                };
                resolve_verdict(&classifier.classify(newest, spacing), newest, spacing, min_height)
            }
            None => None,
        }
    }

    /// First window in row-major order that passes the flatness rule.
    fn first_flat_window(&self, sample: &LidarSample) -> Option<Point3> {
        let grid = &sample.grid;
        if grid.rows() < 2 || grid.cols() < 2 {
            return None;
        }
        for row in 0..grid.rows() - 1 {
            for col in 0..grid.cols() - 1 {
                let corners = [
                    grid.get(row, col)?,
                    grid.get(row, col + 1)?,
                    grid.get(row + 1, col)?,
                    grid.get(row + 1, col + 1)?,
                ];
                if !self.config.rule.accepts(corners) {
                    continue;
                }
                let (dx, dz) =
                    grid.offset(row as f64 + 0.5, col as f64 + 0.5, self.config.grid_spacing);
                return Some(Point3::new(
                    sample.origin.x + dx,
                    corners[0],
                    sample.origin.z + dz,
                ));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lidar::HeightGrid;

    /// 5x5 grid where only the window at (1,1)-(2,2) is level.
    fn single_flat_window() -> HeightGrid {
        HeightGrid::from_rows(vec![
            vec![0.0, 40.0, 80.0, 120.0, 160.0],
            vec![200.0, 10.0, 10.0, 240.0, 280.0],
            vec![320.0, 10.0, 10.0, 360.0, 400.0],
            vec![440.0, 480.0, 520.0, 560.0, 600.0],
            vec![640.0, 680.0, 720.0, 760.0, 800.0],
        ])
        .unwrap()
    }

    fn history_with(samples: Vec<(Point3, HeightGrid)>) -> LidarHistory {
        let mut history = LidarHistory::new(10);
        // Push oldest first so the first entry ends up newest.
        for (tick, (origin, grid)) in samples.into_iter().enumerate().rev() {
            history.push(LidarSample {
                origin,
                grid,
                sampled_at: tick as u64,
            });
        }
        history
    }

    #[test]
    fn finds_the_only_flat_window() {
        let origin = Point3::new(1000.0, 150.0, 2000.0);
        let history = history_with(vec![(origin, single_flat_window())]);
        let selector = LandingSelector::default();
        let choice = selector.choose(&history, Point3::default(), None);
        assert_eq!(choice.source, LandingSource::FlatWindow);
        // Window centre sits at grid (1.5, 1.5): half a cell before the middle.
        assert_eq!(choice.target, Point3::new(987.5, 10.0, 1987.5));
    }

    #[test]
    fn empty_history_falls_back_to_start() {
        let start = Point3::new(3.0, 4.0, 5.0);
        let selector = LandingSelector::default();
        assert_eq!(selector.select(&LidarHistory::new(10), start), start);
    }

    #[test]
    fn bottomless_window_is_rejected() {
        let history = history_with(vec![(Point3::default(), HeightGrid::uniform(5, 5, -999.0))]);
        let start = Point3::new(1.0, 0.0, 1.0);
        let choice = LandingSelector::default().choose(&history, start, None);
        assert_eq!(choice.source, LandingSource::Fallback);
        assert_eq!(choice.target, start);
    }

    #[test]
    fn local_classifier_skips_missing_ground() {
        let history = history_with(vec![(Point3::default(), HeightGrid::uniform(5, 5, -999.0))]);
        let start = Point3::new(5.0, 0.0, 5.0);
        let selector = LandingSelector::new(LandingConfig {
            use_local_classifier: true,
            ..LandingConfig::default()
        });
        let choice = selector.choose(&history, start, None);
        assert_eq!(choice.source, LandingSource::Fallback);
        assert_eq!(choice.target, start);
    }

    #[test]
    fn local_classifier_picks_level_ground() {
        let history = history_with(vec![(Point3::default(), HeightGrid::uniform(5, 5, 2.0))]);
        let selector = LandingSelector::new(LandingConfig {
            use_local_classifier: true,
            ..LandingConfig::default()
        });
        let choice = selector.choose(&history, Point3::new(5.0, 0.0, 5.0), None);
        assert_eq!(choice.source, LandingSource::Classifier);
        assert_eq!(choice.target, Point3::new(-50.0, 2.0, -50.0));
    }

    #[test]
    fn newest_sample_wins_over_older_ones() {
        let older = (Point3::new(0.0, 0.0, 0.0), HeightGrid::uniform(5, 5, 0.0));
        let newer = (Point3::new(500.0, 0.0, 500.0), single_flat_window());
        let history = history_with(vec![newer, older]);
        let target = LandingSelector::default().select(&history, Point3::default());
        assert_eq!(target, Point3::new(487.5, 10.0, 487.5));
    }

    #[test]
    fn first_match_in_row_major_order() {
        let origin = Point3::default();
        let history = history_with(vec![(origin, HeightGrid::uniform(5, 5, 1.0))]);
        let target = LandingSelector::default().select(&history, Point3::new(9.0, 9.0, 9.0));
        assert_eq!(target, Point3::new(-37.5, 1.0, -37.5));
    }

    #[test]
    fn zero_corner_rule_needs_ground_level() {
        let selector = LandingSelector::new(LandingConfig {
            rule: FlatnessRule::ZeroCorners { epsilon: 0.01 },
            ..LandingConfig::default()
        });
        let history = history_with(vec![(Point3::default(), single_flat_window())]);
        // The level window sits at 10, not 0; only the top-left corner cell is 0.
        assert_eq!(selector.select(&history, Point3::new(7.0, 7.0, 7.0)), Point3::new(7.0, 7.0, 7.0));
        assert!(FlatnessRule::ZeroCorners { epsilon: 0.01 }.accepts([0.0, 0.005, -0.002, 0.0]));
    }

    #[test]
    fn verdict_takes_priority_over_geometry() {
        let origin = Point3::new(0.0, 100.0, 0.0);
        let history = history_with(vec![(origin, single_flat_window())]);
        let verdict = TerrainVerdict::Point {
            landing_point: Point3::new(42.0, 0.0, -42.0),
        };
        let choice = LandingSelector::default().choose(&history, Point3::default(), Some(&verdict));
        assert_eq!(choice.source, LandingSource::Classifier);
        assert_eq!(choice.target, Point3::new(42.0, 0.0, -42.0));
    }

    #[test]
    fn unusable_verdict_falls_through_to_geometry() {
        let origin = Point3::new(0.0, 100.0, 0.0);
        let history = history_with(vec![(origin, single_flat_window())]);
        let verdict = TerrainVerdict::Cells {
            safe_cells: vec![vec![false; 5]; 5],
        };
        let choice = LandingSelector::default().choose(&history, Point3::default(), Some(&verdict));
        assert_eq!(choice.source, LandingSource::FlatWindow);
    }
}
