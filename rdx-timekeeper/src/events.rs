//! Defines all public event types broadcast by the Timekeeper engine.
//!
//! Front-ends subscribe to these strongly-typed streams instead of polling the
//! engine. Each component publishes on its own channel.

use crate::common::{AlarmId, SamplerKind};
use crate::components::alarm::Alarm;
use crate::components::stopwatch::Lap;
use chrono::NaiveDateTime;
use std::time::Duration;
use tokio::time::Instant;

/// Vibrate/pause pattern played when the stopwatch starts.
pub const STOPWATCH_START_PULSE: &[u64] = &[10];
/// Vibrate/pause pattern played when a lap is recorded.
pub const LAP_PULSE: &[u64] = &[20];
/// Vibrate/pause pattern played when a countdown reaches zero.
pub const COUNTDOWN_EXPIRED_PULSE: &[u64] = &[100, 50, 100, 50, 100];
/// Vibrate/pause pattern played when an alarm starts ringing.
pub const ALARM_RING_PULSE: &[u64] = &[500, 200, 500, 200, 500];

/// Events related to the lifecycle and state of the engine itself.
#[derive(Debug, Clone)]
pub enum SystemEvent {
    /// Fired once when the engine's dispatcher begins.
    EngineStarted { timestamp: Instant },
    /// Fired once when the engine's `run` loop is about to exit.
    EngineShutdown,
    SamplerStarted { kind: SamplerKind },
    SamplerStopped { kind: SamplerKind },
    /// Writing a persisted blob failed. The in-memory state is unaffected.
    PersistenceFailed { key: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub enum StopwatchEvent {
    Started { elapsed: Duration },
    Paused { elapsed: Duration },
    Reset,
    /// Periodic republication of the running total.
    Elapsed { elapsed: Duration },
    LapRecorded { lap: Lap },
}

#[derive(Debug, Clone)]
pub enum CountdownEvent {
    Configured { duration: Duration },
    Started { remaining: Duration, total: Duration },
    Paused { remaining: Duration },
    Reset,
    /// Periodic republication of the time left.
    Remaining { remaining: Duration, progress: f64 },
    /// The countdown reached zero. Fired exactly once per run.
    Expired { total: Duration },
}

#[derive(Debug, Clone)]
pub enum AlarmEvent {
    Added { alarm: Alarm },
    Updated { alarm: Alarm },
    Removed { id: AlarmId },
    ActiveChanged { id: AlarmId, active: bool },
    /// The alarm entered the ringing state.
    Ringing { alarm: Alarm },
    /// The ringing alarm was dismissed. One-shot alarms are deactivated.
    Dismissed { id: AlarmId, deactivated: bool },
    /// The ringing alarm will ring again at `until`. `automatic` is set when
    /// nobody answered within the ring timeout.
    Snoozed {
        id: AlarmId,
        until: NaiveDateTime,
        automatic: bool,
    },
}

/// Requests for the platform's alert primitives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertEvent {
    /// Vibrate/pause durations in milliseconds, starting with a vibration.
    Haptic { pattern: &'static [u64] },
    /// Play the named sound once.
    Sound { name: String },
}
