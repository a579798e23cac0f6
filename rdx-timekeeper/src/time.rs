//! Clock sources: the master tick clock and wall-clock readers.

use crate::config::ClockResolution;
use chrono::{NaiveDateTime, Utc};
use chrono_tz::Tz;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, trace};

/// A single beat of the master clock.
#[derive(Debug, Clone)]
pub struct TickEvent {
    /// Monotonically increasing tick counter, starting at 1.
    pub tick_count: u64,
    /// The instant at which the tick fired.
    pub timestamp: Instant,
}

/// A high-frequency ticker that acts as the single source of time.
///
/// Ticks that could not be delivered on time are skipped rather than replayed
/// in a burst, so a stalled process never floods the dispatcher.
pub struct SystemClock {
    resolution: ClockResolution,
    tick_sender: broadcast::Sender<Arc<TickEvent>>,
}

impl SystemClock {
    pub fn new(
        resolution: ClockResolution,
        tick_sender: broadcast::Sender<Arc<TickEvent>>,
    ) -> Self {
        Self {
            resolution,
            tick_sender,
        }
    }

    /// Ticks until a shutdown signal arrives.
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        let period = self.resolution.period();
        debug!("SystemClock ticking every {:?}", period);
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut tick_count = 0u64;
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                timestamp = interval.tick() => {
                    tick_count += 1;
                    trace!("tick #{}", tick_count);
                    self.tick_sender
                        .send(Arc::new(TickEvent { tick_count, timestamp }))
                        .ok();
                }
            }
        }
        debug!("SystemClock stopped after {} ticks", tick_count);
    }
}

/// A source of local wall-clock time, used for alarm matching.
pub trait WallClock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Reads the system clock and converts it into a configured timezone.
#[derive(Debug, Clone)]
pub struct SystemWallClock {
    timezone: Tz,
}

impl SystemWallClock {
    pub fn new(timezone: Tz) -> Self {
        Self { timezone }
    }
}

impl WallClock for SystemWallClock {
    fn now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.timezone).naive_local()
    }
}

/// A wall clock that only moves when told to.
///
/// Clones share the same time, so a test can keep one handle and give another
/// to the engine.
#[derive(Debug, Clone)]
pub struct ManualWallClock {
    now: Arc<Mutex<NaiveDateTime>>,
}

impl ManualWallClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        if let Ok(delta) = chrono::Duration::from_std(by) {
            *now += delta;
        }
    }
}

impl WallClock for ManualWallClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
