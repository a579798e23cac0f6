//! The countdown timer.

use std::time::Duration;
use tokio::time::Instant;

/// Where the countdown is in its lifecycle.
///
/// `Expired` is only left through `reset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownPhase {
    Setting,
    Running,
    Paused,
    Expired,
}

/// What a sample of a running countdown produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownTick {
    Remaining(Duration),
    /// Reached zero on this sample. Never reported twice for one run.
    Expired,
}

/// Counts a configured duration down to zero.
#[derive(Debug)]
pub struct Countdown {
    phase: CountdownPhase,
    configured: Duration,
    total: Duration,
    remaining: Duration,
    resumed_at: Option<Instant>,
    remaining_at_resume: Duration,
}

impl Default for Countdown {
    fn default() -> Self {
        Self {
            phase: CountdownPhase::Setting,
            configured: Duration::ZERO,
            total: Duration::ZERO,
            remaining: Duration::ZERO,
            resumed_at: None,
            remaining_at_resume: Duration::ZERO,
        }
    }
}

impl Countdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> CountdownPhase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase == CountdownPhase::Running
    }

    /// Sets the duration the next `start` counts down from.
    ///
    /// Only accepted while setting up, and only for a positive total. A
    /// rejected call changes nothing.
    pub fn configure(&mut self, hours: u64, minutes: u64, seconds: u64) -> bool {
        if self.phase != CountdownPhase::Setting {
            return false;
        }
        let total_secs = hours
            .saturating_mul(3_600)
            .saturating_add(minutes.saturating_mul(60))
            .saturating_add(seconds);
        if total_secs == 0 {
            return false;
        }
        self.configured = Duration::from_secs(total_secs);
        true
    }

    /// The duration waiting to be started.
    pub fn configured(&self) -> Duration {
        self.configured
    }

    /// Starts from `Setting` or resumes from `Paused`.
    ///
    /// Returns `false` when running, expired, or nothing is configured.
    pub fn start(&mut self, now: Instant) -> bool {
        match self.phase {
            CountdownPhase::Setting => {
                if self.configured.is_zero() {
                    return false;
                }
                self.total = self.configured;
                self.remaining = self.configured;
            }
            CountdownPhase::Paused => {}
            CountdownPhase::Running | CountdownPhase::Expired => return false,
        }
        self.phase = CountdownPhase::Running;
        self.resumed_at = Some(now);
        self.remaining_at_resume = self.remaining;
        true
    }

    /// Freezes the remaining time at its last sampled value.
    pub fn pause(&mut self) -> bool {
        if self.phase != CountdownPhase::Running {
            return false;
        }
        self.phase = CountdownPhase::Paused;
        self.resumed_at = None;
        true
    }

    /// Returns to `Setting` with nothing remaining. The configured duration is
    /// kept so the same countdown can be started again.
    pub fn reset(&mut self) {
        *self = Self {
            configured: self.configured,
            ..Self::default()
        };
    }

    /// Samples a running countdown at `now`.
    pub fn tick(&mut self, now: Instant) -> Option<CountdownTick> {
        let resumed_at = self.resumed_at.filter(|_| self.is_running())?;
        let elapsed = now.saturating_duration_since(resumed_at);
        // Never increase, even if `now` is older than the previous sample.
        self.remaining = self
            .remaining
            .min(self.remaining_at_resume.saturating_sub(elapsed));
        if self.remaining.is_zero() {
            self.phase = CountdownPhase::Expired;
            self.resumed_at = None;
            return Some(CountdownTick::Expired);
        }
        Some(CountdownTick::Remaining(self.remaining))
    }

    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    pub fn total(&self) -> Duration {
        self.total
    }

    /// Fraction of the run still left, `1.0` before anything was started.
    pub fn progress(&self) -> f64 {
        if self.total.is_zero() {
            1.0
        } else {
            self.remaining.as_secs_f64() / self.total.as_secs_f64()
        }
    }

    /// Remaining time in whole minutes, rounded to nearest.
    pub fn minutes_left(&self) -> u64 {
        (self.remaining.as_millis() as u64 + 30_000) / 60_000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn zero_duration_is_rejected_without_state_change() {
        let mut countdown = Countdown::new();
        assert!(!countdown.configure(0, 0, 0));
        assert_eq!(countdown.configured(), Duration::ZERO);
        assert!(!countdown.start(Instant::now()));
        assert_eq!(countdown.phase(), CountdownPhase::Setting);
    }

    #[test]
    fn configure_sums_all_fields() {
        let mut countdown = Countdown::new();
        assert!(countdown.configure(1, 2, 3));
        assert_eq!(countdown.configured(), Duration::from_secs(3_723));
    }

    #[test]
    fn configure_is_refused_once_started() {
        let t0 = Instant::now();
        let mut countdown = Countdown::new();
        countdown.configure(0, 0, 10);
        countdown.start(t0);
        assert!(!countdown.configure(0, 5, 0));
        countdown.pause();
        assert!(!countdown.configure(0, 5, 0));
        assert_eq!(countdown.configured(), Duration::from_secs(10));
    }

    #[test]
    fn remaining_only_decreases_and_expires_once() {
        let t0 = Instant::now();
        let mut countdown = Countdown::new();
        countdown.configure(0, 0, 1);
        assert!(countdown.start(t0));

        let mut previous = countdown.remaining();
        let mut expirations = 0;
        for step in 1..=15 {
            match countdown.tick(t0 + ms(step * 100)) {
                Some(CountdownTick::Remaining(left)) => {
                    assert!(left <= previous);
                    previous = left;
                }
                Some(CountdownTick::Expired) => expirations += 1,
                None => {}
            }
        }
        assert_eq!(expirations, 1);
        assert_eq!(countdown.remaining(), Duration::ZERO);
        assert_eq!(countdown.phase(), CountdownPhase::Expired);
    }

    #[test]
    fn coarse_ticks_overshooting_zero_still_expire_once() {
        let t0 = Instant::now();
        let mut countdown = Countdown::new();
        countdown.configure(0, 0, 2);
        countdown.start(t0);
        assert_eq!(countdown.tick(t0 + ms(7_000)), Some(CountdownTick::Expired));
        assert_eq!(countdown.tick(t0 + ms(8_000)), None);
        assert!(!countdown.start(t0 + ms(9_000)));
    }

    #[test]
    fn pause_freezes_and_resume_recomputes_the_end() {
        let t0 = Instant::now();
        let mut countdown = Countdown::new();
        countdown.configure(0, 0, 10);
        countdown.start(t0);
        countdown.tick(t0 + ms(3_000));
        assert!(countdown.pause());
        assert_eq!(countdown.remaining(), ms(7_000));
        assert_eq!(countdown.tick(t0 + ms(60_000)), None);

        assert!(countdown.start(t0 + ms(60_000)));
        assert_eq!(
            countdown.tick(t0 + ms(62_000)),
            Some(CountdownTick::Remaining(ms(5_000)))
        );
        assert!((countdown.progress() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn reset_returns_to_setting() {
        let t0 = Instant::now();
        let mut countdown = Countdown::new();
        assert_eq!(countdown.progress(), 1.0);
        countdown.configure(0, 1, 0);
        countdown.start(t0);
        countdown.tick(t0 + ms(1_000));
        countdown.reset();

        assert_eq!(countdown.phase(), CountdownPhase::Setting);
        assert_eq!(countdown.remaining(), Duration::ZERO);
        assert_eq!(countdown.total(), Duration::ZERO);
        assert_eq!(countdown.progress(), 1.0);
        assert!(countdown.start(t0 + ms(2_000)));
        assert_eq!(countdown.remaining(), Duration::from_secs(60));
    }

    #[test]
    fn minutes_left_rounds() {
        let t0 = Instant::now();
        let mut countdown = Countdown::new();
        countdown.configure(0, 5, 0);
        countdown.start(t0);
        assert_eq!(countdown.minutes_left(), 5);
        countdown.tick(t0 + ms(100_000));
        assert_eq!(countdown.minutes_left(), 3);
    }
}
