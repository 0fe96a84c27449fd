//! Closed-tour ordering of mission waypoints.
//!
//! The tour always starts and ends at the launch position. Ordering uses the
//! better of the submitted order and a nearest-neighbour construction, then
//! 2-opt descent, then seeded double-bridge kicks while budget remains.

use crate::geometry::{path_length, Point3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const IMPROVEMENT_EPSILON: f64 = 1e-9;

/// Search limits for one planning run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerBudget {
    /// Combined cap on 2-opt sweeps and perturbation kicks.
    pub max_iterations: usize,
    /// Wall-clock cap for the whole run.
    pub time_budget_ms: u64,
    /// Perturbation kicks attempted after the first local optimum.
    pub max_kicks: usize,
    pub seed: u64,
}

impl Default for PlannerBudget {
    fn default() -> Self {
        Self {
            max_iterations: 2_000,
            time_budget_ms: 250,
            max_kicks: 32,
            seed: 0x5eed,
        }
    }
}

/// Output of [`RoutePlanner::plan`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TourPlan {
    /// Waypoints in visiting order, ending with the start position.
    pub tour: Vec<Point3>,
    /// Closed length from start through every waypoint and back.
    pub length: f64,
    pub iterations: usize,
    /// False when the budget ran out before 2-opt settled.
    pub converged: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RoutePlanner {
    pub budget: PlannerBudget,
}

struct Search<'a> {
    dist: &'a DistanceMatrix,
    deadline: Instant,
    iterations: usize,
    max_iterations: usize,
}

impl Search<'_> {
    fn exhausted(&self) -> bool {
        self.iterations >= self.max_iterations || Instant::now() >= self.deadline
    }

    /// Run 2-opt sweeps until no improving move remains. Returns false if the
    /// budget stopped the descent early.
    fn two_opt(&mut self, tour: &mut [usize]) -> bool {
        let n = tour.len();
        if n < 4 {
            return true;
        }
        loop {
            if self.exhausted() {
                return false;
            }
            self.iterations += 1;
            let mut improved = false;
            for i in 1..n - 1 {
                for j in i + 1..n {
                    let a = tour[i - 1];
                    let b = tour[i];
                    let c = tour[j];
                    let d = tour[(j + 1) % n];
                    let delta = self.dist.get(a, c) + self.dist.get(b, d)
                        - self.dist.get(a, b)
                        - self.dist.get(c, d);
                    if delta < -IMPROVEMENT_EPSILON {
                        tour[i..=j].reverse();
                        improved = true;
                    }
                }
            }
            if !improved {
                return true;
            }
        }
    }
}

struct DistanceMatrix {
    n: usize,
    values: Vec<f64>,
}

impl DistanceMatrix {
    fn new(points: &[Point3]) -> Self {
        let n = points.len();
        let mut values = vec![0.0; n * n];
        for i in 0..n {
            for j in (i + 1)..n {
                let d = points[i].distance(&points[j]);
                values[i * n + j] = d;
                values[j * n + i] = d;
            }
        }
        Self { n, values }
    }

    fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.n + j]
    }

    fn cycle_length(&self, tour: &[usize]) -> f64 {
        if tour.len() < 2 {
            return 0.0;
        }
        let closing = self.get(tour[tour.len() - 1], tour[0]);
        tour.windows(2)
            .map(|pair| self.get(pair[0], pair[1]))
            .sum::<f64>()
            + closing
    }
}

impl RoutePlanner {
    pub fn new(budget: PlannerBudget) -> Self {
        Self { budget }
    }

    /// Order `waypoints` into a closed tour anchored at `start`.
    ///
    /// Never fails: an exhausted budget yields the best tour found so far.
    pub fn plan(&self, waypoints: &[Point3], start: Point3) -> TourPlan {
        match waypoints {
            [] => {
                return TourPlan {
                    tour: vec![start],
                    length: 0.0,
                    iterations: 0,
                    converged: true,
                }
            }
            [only] => {
                return TourPlan {
                    tour: vec![*only, start],
                    length: 2.0 * start.distance(only),
                    iterations: 0,
                    converged: true,
                }
            }
            _ => {}
        }

        let mut nodes = Vec::with_capacity(waypoints.len() + 1);
        nodes.push(start);
        nodes.extend_from_slice(waypoints);
        let dist = DistanceMatrix::new(&nodes);

        let mut search = Search {
            dist: &dist,
            deadline: Instant::now() + Duration::from_millis(self.budget.time_budget_ms),
            iterations: 0,
            max_iterations: self.budget.max_iterations.max(1),
        };

        let submitted: Vec<usize> = (0..nodes.len()).collect();
        let greedy = nearest_neighbour(&dist);
        let mut best = if dist.cycle_length(&greedy) < dist.cycle_length(&submitted) {
            greedy
        } else {
            submitted
        };
        let converged = search.two_opt(&mut best);
        let mut best_length = dist.cycle_length(&best);

        if best.len() >= 4 {
            let mut rng = StdRng::seed_from_u64(self.budget.seed);
            for _ in 0..self.budget.max_kicks {
                if search.exhausted() {
                    break;
                }
                search.iterations += 1;
                let mut candidate = double_bridge(&best, &mut rng);
                search.two_opt(&mut candidate);
                let length = dist.cycle_length(&candidate);
                if length < best_length - IMPROVEMENT_EPSILON {
                    best = candidate;
                    best_length = length;
                }
            }
        }

        let tour: Vec<Point3> = rotate_to_start(&best)
            .into_iter()
            .skip(1)
            .map(|idx| nodes[idx])
            .chain(std::iter::once(start))
            .collect();

        TourPlan {
            tour,
            length: best_length,
            iterations: search.iterations,
            converged,
        }
    }
}

/// Plan with the default budget.
pub fn plan_tour(waypoints: &[Point3], start: Point3) -> Vec<Point3> {
    RoutePlanner::default().plan(waypoints, start).tour
}

/// Closed length of a planner output as flown from `start`.
pub fn tour_length(start: Point3, tour: &[Point3]) -> f64 {
    let mut path = Vec::with_capacity(tour.len() + 1);
    path.push(start);
    path.extend_from_slice(tour);
    path_length(&path)
}

fn nearest_neighbour(dist: &DistanceMatrix) -> Vec<usize> {
    let n = dist.n;
    let mut visited = vec![false; n];
    let mut tour = Vec::with_capacity(n);
    let mut current = 0;
    visited[0] = true;
    tour.push(0);
    for _ in 1..n {
        let next = (0..n)
            .filter(|&idx| !visited[idx])
            .min_by(|&a, &b| dist.get(current, a).total_cmp(&dist.get(current, b)));
        let Some(next) = next else { break };
        visited[next] = true;
        tour.push(next);
        current = next;
    }
    tour
}

/// Swap two interior segments of the tour, keeping node 0 in front.
fn double_bridge(tour: &[usize], rng: &mut StdRng) -> Vec<usize> {
    let n = tour.len();
    let p1 = rng.random_range(1..n - 2);
    let p2 = rng.random_range(p1 + 1..n - 1);
    let p3 = rng.random_range(p2 + 1..n);
    let mut out = Vec::with_capacity(n);
    out.extend_from_slice(&tour[..p1]);
    out.extend_from_slice(&tour[p2..p3]);
    out.extend_from_slice(&tour[p1..p2]);
    out.extend_from_slice(&tour[p3..]);
    out
}

fn rotate_to_start(tour: &[usize]) -> Vec<usize> {
    let pivot = tour.iter().position(|&idx| idx == 0).unwrap_or(0);
    tour[pivot..].iter().chain(&tour[..pivot]).copied().collect()
}
