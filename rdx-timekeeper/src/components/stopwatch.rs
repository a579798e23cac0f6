//! The stopwatch: pause-aware elapsed time with lap splits.

use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// One lap mark. Immutable once recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Lap {
    /// 1 for the first lap, increasing by one per lap.
    pub sequence: u32,
    /// Elapsed stopwatch time when the lap was taken.
    pub cumulative: Duration,
    /// Time since the previous lap, or since zero for the first.
    pub split: Duration,
}

/// Tracks elapsed time across any number of pause/resume cycles.
///
/// While running, elapsed time is `accumulated + (now - resumed_at)`. While
/// paused, `accumulated` is frozen and equal to the last published elapsed
/// value.
#[derive(Debug, Default)]
pub struct Stopwatch {
    resumed_at: Option<Instant>,
    accumulated: Duration,
    elapsed: Duration,
    laps: VecDeque<Lap>,
}

impl Stopwatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.resumed_at.is_some()
    }

    /// Starts or resumes. Returns `false` if already running.
    pub fn start(&mut self, now: Instant) -> bool {
        if self.is_running() {
            return false;
        }
        self.resumed_at = Some(now);
        true
    }

    /// Pauses and freezes the accumulated time. Returns `false` if not running.
    pub fn pause(&mut self, now: Instant) -> bool {
        let Some(resumed_at) = self.resumed_at.take() else {
            return false;
        };
        self.accumulated += now.saturating_duration_since(resumed_at);
        self.elapsed = self.accumulated;
        true
    }

    /// Stops and clears elapsed time and laps.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Recomputes elapsed time at `now` and returns it.
    pub fn sample(&mut self, now: Instant) -> Duration {
        if let Some(resumed_at) = self.resumed_at {
            // `max` keeps the published value non-decreasing if `now` lags.
            let current = self.accumulated + now.saturating_duration_since(resumed_at);
            self.elapsed = self.elapsed.max(current);
        }
        self.elapsed
    }

    /// The last published elapsed time.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Records a lap at `now`.
    ///
    /// Returns `None` on a stopwatch that is stopped at zero, i.e. one that
    /// never ran since construction or the last reset.
    pub fn record_lap(&mut self, now: Instant) -> Option<Lap> {
        let current = self.sample(now);
        if !self.is_running() && current.is_zero() {
            return None;
        }
        let (sequence, previous) = match self.laps.front() {
            Some(last) => (last.sequence + 1, last.cumulative),
            None => (1, Duration::ZERO),
        };
        let lap = Lap {
            sequence,
            cumulative: current,
            split: current.saturating_sub(previous),
        };
        self.laps.push_front(lap);
        Some(lap)
    }

    /// Laps, most recent first.
    pub fn laps(&self) -> impl Iterator<Item = &Lap> {
        self.laps.iter()
    }

    pub fn lap_count(&self) -> usize {
        self.laps.len()
    }
}
