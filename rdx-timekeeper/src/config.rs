//! Defines all configuration structures for the Timekeeper engine.
//!
//! These structs are designed to be deserialized from a TOML file with the
//! `config` crate, with `TIMEKEEPER__*` environment variables layered on top.
//! Every field carries a default, so running without a file is valid.

use chrono_tz::Tz;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The top-level configuration for the `TimekeeperEngine`.
#[derive(Debug, Clone, Deserialize)]
pub struct TimekeeperConfig {
    /// The tick speed of the master `SystemClock`.
    #[serde(default)]
    pub resolution: ClockResolution,

    /// How often each component is sampled.
    #[serde(default)]
    pub cadence: CadenceConfig,

    #[serde(default)]
    pub alarm: AlarmConfig,

    #[serde(default)]
    pub alerts: AlertConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    /// Presentation context handed to front-ends.
    #[serde(default)]
    pub display: DisplayConfig,

    #[serde(default)]
    pub tips: TipConfig,

    /// The timezone alarms are evaluated in. Uses the IANA names
    /// (e.g., "Europe/Berlin"). Defaults to UTC.
    #[serde(default = "default_timezone")]
    pub timezone: Tz,
}

impl TimekeeperConfig {
    /// Loads the configuration from an optional TOML file plus the environment.
    ///
    /// A missing file is not an error; the environment and defaults still apply.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        let settings = builder
            .add_source(config::Environment::with_prefix("TIMEKEEPER").separator("__"))
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}

impl Default for TimekeeperConfig {
    fn default() -> Self {
        Self {
            resolution: ClockResolution::default(),
            cadence: CadenceConfig::default(),
            alarm: AlarmConfig::default(),
            alerts: AlertConfig::default(),
            storage: StorageConfig::default(),
            display: DisplayConfig::default(),
            tips: TipConfig::default(),
            timezone: default_timezone(),
        }
    }
}

/// Defines the operational speed of the `SystemClock`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockResolution {
    /// 100 ticks per second, fine enough for centisecond stopwatch output.
    #[default]
    Ultra,
    /// ~60 ticks per second.
    High,
    /// ~30 ticks per second.
    Medium,
    /// 1 tick per second. Only the alarm poller keeps its cadence.
    Low,
    /// A user-defined speed in ticks per second.
    Custom { ticks_per_second: u64 },
}

impl ClockResolution {
    /// The time between two ticks.
    pub fn period(&self) -> Duration {
        match self {
            ClockResolution::Ultra => Duration::from_millis(10),
            ClockResolution::High => Duration::from_micros(16_667),
            ClockResolution::Medium => Duration::from_micros(33_333),
            ClockResolution::Low => Duration::from_secs(1),
            ClockResolution::Custom { ticks_per_second } => {
                // Capped at one tick per nanosecond so the period is never zero.
                let ticks = u32::try_from(*ticks_per_second)
                    .unwrap_or(u32::MAX)
                    .clamp(1, 1_000_000_000);
                Duration::from_secs(1) / ticks
            }
        }
    }
}

/// Sampling periods, in milliseconds, of the three periodic tasks.
#[derive(Debug, Clone, Deserialize)]
pub struct CadenceConfig {
    #[serde(default = "default_stopwatch_ms")]
    pub stopwatch_ms: u64,
    #[serde(default = "default_countdown_ms")]
    pub countdown_ms: u64,
    #[serde(default = "default_alarm_poll_ms")]
    pub alarm_poll_ms: u64,
}

impl CadenceConfig {
    pub fn stopwatch(&self) -> Duration {
        Duration::from_millis(self.stopwatch_ms)
    }

    pub fn countdown(&self) -> Duration {
        Duration::from_millis(self.countdown_ms)
    }

    pub fn alarm_poll(&self) -> Duration {
        Duration::from_millis(self.alarm_poll_ms)
    }
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            stopwatch_ms: default_stopwatch_ms(),
            countdown_ms: default_countdown_ms(),
            alarm_poll_ms: default_alarm_poll_ms(),
        }
    }
}

/// Snooze and ringing behavior of the alarm scheduler.
#[derive(Debug, Clone, Deserialize)]
pub struct AlarmConfig {
    /// Snooze length used when an alarm has no snooze minutes of its own.
    #[serde(default = "default_snooze_fallback_minutes")]
    pub snooze_fallback_minutes: u32,

    /// A ringing alarm nobody answers is snoozed after this many seconds.
    #[serde(default = "default_ring_timeout_secs")]
    pub ring_timeout_secs: u64,

    /// What snoozing means for an alarm configured with `snoozeMinutes = 0`.
    #[serde(default)]
    pub zero_snooze: ZeroSnooze,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            snooze_fallback_minutes: default_snooze_fallback_minutes(),
            ring_timeout_secs: default_ring_timeout_secs(),
            zero_snooze: ZeroSnooze::default(),
        }
    }
}

/// Resolution of a snooze request on an alarm whose snooze is set to zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZeroSnooze {
    /// Snooze for `snooze_fallback_minutes`.
    #[default]
    Fallback,
    /// The snooze request dismisses the alarm instead.
    Dismiss,
}

/// Settings for the platform alert triggers.
#[derive(Debug, Clone, Deserialize)]
pub struct AlertConfig {
    /// Whether haptic pulse patterns are emitted at all.
    #[serde(default = "default_true")]
    pub haptics: bool,
    /// Sound played when a countdown expires.
    #[serde(default = "default_countdown_sound")]
    pub countdown_sound: String,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            haptics: true,
            countdown_sound: default_countdown_sound(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the persisted blobs. `None` keeps everything in memory.
    #[serde(default = "default_data_dir")]
    pub data_dir: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// The application-level presentation context.
///
/// Front-ends receive this as a value and derive a new one on every toggle;
/// nothing in the engine reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DisplayConfig {
    #[serde(default)]
    pub theme: Theme,
    #[serde(default)]
    pub default_tab: Tab,
    #[serde(default)]
    pub fullscreen: bool,
}

impl DisplayConfig {
    pub fn with_theme_toggled(self) -> Self {
        Self {
            theme: self.theme.toggled(),
            ..self
        }
    }

    pub fn with_fullscreen_toggled(self) -> Self {
        Self {
            fullscreen: !self.fullscreen,
            ..self
        }
    }

    pub fn with_tab(self, tab: Tab) -> Self {
        Self {
            default_tab: tab,
            ..self
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            theme: Theme::Dark,
            default_tab: Tab::Stopwatch,
            fullscreen: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    #[default]
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tab {
    #[default]
    Stopwatch,
    Timer,
    Alarm,
}

impl std::str::FromStr for Tab {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stopwatch" | "sw" => Ok(Tab::Stopwatch),
            "timer" => Ok(Tab::Timer),
            "alarm" | "alarms" => Ok(Tab::Alarm),
            other => Err(format!("unknown tab '{other}'")),
        }
    }
}

/// Local tips served when no remote tip source is wired in.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TipConfig {
    #[serde(default)]
    pub deck: Vec<TipEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TipEntry {
    pub title: String,
    pub tip: String,
}

// --- Default value functions for serde ---

fn default_timezone() -> Tz {
    Tz::UTC
}

fn default_stopwatch_ms() -> u64 {
    10
}

fn default_countdown_ms() -> u64 {
    100
}

fn default_alarm_poll_ms() -> u64 {
    1_000
}

fn default_snooze_fallback_minutes() -> u32 {
    5
}

fn default_ring_timeout_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_countdown_sound() -> String {
    "chime".to_string()
}

fn default_data_dir() -> Option<PathBuf> {
    Some(PathBuf::from("data"))
}
