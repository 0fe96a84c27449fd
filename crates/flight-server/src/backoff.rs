//! Exponential backoff with jitter for calls to external collaborators.
//!
//! Every method takes the current instant so callers (and tests) own the
//! clock. While backing off, callers skip the collaborator entirely.

use rand::Rng;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    current: Duration,
    retry_at: Option<Instant>,
    jitter_ratio: f64,
    failures: u32,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        let base = base.max(Duration::from_millis(1));
        Self {
            base,
            max: max.max(base),
            current: base,
            retry_at: None,
            jitter_ratio: 0.2,
            failures: 0,
        }
    }

    pub fn without_jitter(mut self) -> Self {
        self.jitter_ratio = 0.0;
        self
    }

    pub fn ready_at(&self, now: Instant) -> bool {
        self.retry_at.map_or(true, |at| now >= at)
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn succeed(&mut self) {
        self.current = self.base;
        self.retry_at = None;
        self.failures = 0;
    }

    /// Record a failure at `now` and return the delay before the next attempt.
    pub fn fail_at(&mut self, now: Instant) -> Duration {
        if self.failures > 0 {
            self.current = self.current.saturating_mul(2).min(self.max);
        }
        self.failures = self.failures.saturating_add(1);
        let delay = jittered(self.current, self.jitter_ratio);
        self.retry_at = Some(now + delay);
        delay
    }
}

fn jittered(delay: Duration, ratio: f64) -> Duration {
    if ratio <= 0.0 || !ratio.is_finite() {
        return delay;
    }
    let spread_ms = (delay.as_millis() as f64 * ratio.min(1.0)) as u64;
    if spread_ms == 0 {
        return delay;
    }
    delay + Duration::from_millis(rand::rng().random_range(0..=spread_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_backoff_is_ready() {
        let backoff = Backoff::new(Duration::from_millis(10), Duration::from_secs(1));
        assert!(backoff.ready_at(Instant::now()));
    }

    #[test]
    fn failures_double_until_max() {
        let t0 = Instant::now();
        let mut backoff =
            Backoff::new(Duration::from_millis(100), Duration::from_millis(300)).without_jitter();
        assert_eq!(backoff.fail_at(t0), Duration::from_millis(100));
        assert_eq!(backoff.fail_at(t0), Duration::from_millis(200));
        assert_eq!(backoff.fail_at(t0), Duration::from_millis(300));
        assert_eq!(backoff.fail_at(t0), Duration::from_millis(300));
        assert_eq!(backoff.failures(), 4);
    }

    #[test]
    fn not_ready_until_delay_elapses() {
        let t0 = Instant::now();
        let mut backoff =
            Backoff::new(Duration::from_millis(500), Duration::from_secs(5)).without_jitter();
        backoff.fail_at(t0);
        assert!(!backoff.ready_at(t0 + Duration::from_millis(499)));
        assert!(backoff.ready_at(t0 + Duration::from_millis(500)));

        backoff.succeed();
        assert!(backoff.ready_at(t0));
        assert_eq!(backoff.fail_at(t0), Duration::from_millis(500));
    }

    #[test]
    fn jitter_stays_within_ratio() {
        let t0 = Instant::now();
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(1));
        let delay = backoff.fail_at(t0);
        assert!(delay >= Duration::from_millis(100));
        assert!(delay <= Duration::from_millis(120));
    }
}
