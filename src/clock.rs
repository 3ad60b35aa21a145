//! The multiplier curve and the per-round crash clock.

use rand::{
    Rng,
    SeedableRng,
    rngs::StdRng,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::time::Duration;
use tokio::time::Instant;

/// No growth before this point; the player can only get their wager back.
pub const GROWTH_STARTS_AFTER: Duration = Duration::from_secs(3);
pub const GROWTH_RATE: f64 = 0.1;
/// Reached at eight seconds.
pub const MAX_MULTIPLIER: f64 = 3.5;

/// Payout multiplier after `elapsed` time in a round.
///
/// `1.0` up to three seconds, then `1.0 + 0.1 * (t - 3)^2` capped at
/// [`MAX_MULTIPLIER`]. Continuous and non-decreasing.
pub fn multiplier_at(elapsed: Duration) -> f64 {
    let t = elapsed.as_secs_f64();
    let flat = GROWTH_STARTS_AFTER.as_secs_f64();
    if t <= flat {
        return 1.0;
    }
    let grown = 1.0 + GROWTH_RATE * (t - flat).powi(2);
    grown.min(MAX_MULTIPLIER)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadlineWindow {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl Default for DeadlineWindow {
    fn default() -> Self {
        Self {
            min_ms: 3_000,
            max_ms: 8_000,
        }
    }
}

impl DeadlineWindow {
    pub fn min(&self) -> Duration {
        Duration::from_millis(self.min_ms)
    }

    pub fn max(&self) -> Duration {
        Duration::from_millis(self.max_ms)
    }

    pub fn contains(&self, deadline: Duration) -> bool {
        self.min() <= deadline && deadline <= self.max()
    }
}

/// Picks the crash deadline for a new round.
pub trait DeadlineSource {
    fn draw(&mut self, window: DeadlineWindow) -> Duration;
}

pub struct RandomDeadlines {
    rng: StdRng,
}

impl RandomDeadlines {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { rng }
    }
}

impl DeadlineSource for RandomDeadlines {
    fn draw(&mut self, window: DeadlineWindow) -> Duration {
        let secs = self
            .rng
            .random_range(window.min().as_secs_f64()..=window.max().as_secs_f64());
        Duration::from_secs_f64(secs)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ClockSample {
    Running(f64),
    /// Carries the multiplier at the deadline, never the last sampled value.
    Crashed(f64),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CrashClock {
    started_at: Instant,
    deadline: Duration,
}

impl CrashClock {
    pub fn new(started_at: Instant, deadline: Duration) -> Self {
        Self {
            started_at,
            deadline,
        }
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started_at)
    }

    pub fn crash_multiplier(&self) -> f64 {
        multiplier_at(self.deadline)
    }

    /// Periodic sample: the round is over once the deadline is reached.
    pub fn sample(&self, now: Instant) -> ClockSample {
        let elapsed = self.elapsed(now);
        if elapsed >= self.deadline {
            ClockSample::Crashed(self.crash_multiplier())
        } else {
            ClockSample::Running(multiplier_at(elapsed))
        }
    }

    /// Sample for a cash-out request. A stop landing exactly on the deadline
    /// still cashes out; only a stop strictly past it loses to the crash.
    pub fn stop(&self, now: Instant) -> ClockSample {
        let elapsed = self.elapsed(now);
        if elapsed > self.deadline {
            ClockSample::Crashed(self.crash_multiplier())
        } else {
            ClockSample::Running(multiplier_at(elapsed))
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use proptest::prelude::*;

    fn secs(t: f64) -> Duration {
        Duration::from_secs_f64(t)
    }

    #[test]
    fn multiplier_at__flat_for_first_three_seconds() {
        for ms in [0u64, 1, 500, 1_500, 2_999, 3_000] {
            assert_eq!(multiplier_at(Duration::from_millis(ms)), 1.0);
        }
    }

    #[test]
    fn multiplier_at__parabolic_after_three_seconds() {
        let actual = multiplier_at(secs(5.0));
        assert!((actual - 1.4).abs() < 1e-12, "got {actual}");
        let actual = multiplier_at(secs(4.0));
        assert!((actual - 1.1).abs() < 1e-12, "got {actual}");
    }

    #[test]
    fn multiplier_at__eight_seconds__is_exactly_the_cap() {
        assert_eq!(multiplier_at(secs(8.0)), MAX_MULTIPLIER);
        assert_eq!(multiplier_at(secs(20.0)), MAX_MULTIPLIER);
    }

    #[test]
    fn sample__at_deadline__crashes_with_deadline_multiplier() {
        // given
        let start = Instant::now();
        let clock = CrashClock::new(start, secs(5.0));

        // when
        let late = clock.sample(start + secs(5.04));

        // then
        let ClockSample::Crashed(m) = late else {
            panic!("expected a crash, got {late:?}");
        };
        assert_eq!(m, multiplier_at(secs(5.0)));
        assert_eq!(clock.sample(start + secs(5.0)), ClockSample::Crashed(m));
    }

    #[test]
    fn sample__deadline_of_three_seconds__crashes_at_base_multiplier() {
        let start = Instant::now();
        let clock = CrashClock::new(start, secs(3.0));
        assert_eq!(clock.sample(start + secs(3.0)), ClockSample::Crashed(1.0));
    }

    #[test]
    fn stop__on_exact_deadline__still_running() {
        let start = Instant::now();
        let clock = CrashClock::new(start, secs(5.0));
        assert_eq!(
            clock.stop(start + secs(5.0)),
            ClockSample::Running(multiplier_at(secs(5.0)))
        );
        assert!(matches!(
            clock.stop(start + secs(5.001)),
            ClockSample::Crashed(_)
        ));
    }

    #[test]
    fn random_deadlines__stay_inside_window() {
        let window = DeadlineWindow::default();
        let mut source = RandomDeadlines::new(Some(7));
        for _ in 0..1_000 {
            assert!(window.contains(source.draw(window)));
        }
    }

    #[test]
    fn random_deadlines__same_seed__same_sequence() {
        let window = DeadlineWindow::default();
        let mut a = RandomDeadlines::new(Some(42));
        let mut b = RandomDeadlines::new(Some(42));
        for _ in 0..10 {
            assert_eq!(a.draw(window), b.draw(window));
        }
    }

    proptest! {
        #[test]
        fn multiplier_at__is_non_decreasing(a in 0u64..10_000, b in 0u64..10_000) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(
                multiplier_at(Duration::from_millis(lo))
                    <= multiplier_at(Duration::from_millis(hi))
            );
        }

        #[test]
        fn multiplier_at__matches_formula_on_growth_interval(ms in 3_001u64..=8_000) {
            let t = ms as f64 / 1_000.0;
            let expected = (1.0 + 0.1 * (t - 3.0).powi(2)).min(MAX_MULTIPLIER);
            prop_assert!((multiplier_at(Duration::from_millis(ms)) - expected).abs() < 1e-12);
        }

        #[test]
        fn multiplier_at__has_no_jumps(ms in 0u64..8_000) {
            let here = multiplier_at(Duration::from_millis(ms));
            let next = multiplier_at(Duration::from_millis(ms + 1));
            // steepest slope is 1.0 per second at t = 8
            prop_assert!(next - here <= 0.0011);
        }
    }
}
