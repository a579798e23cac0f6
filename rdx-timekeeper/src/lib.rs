//! # Timekeeper
//!
//! A tick-driven stopwatch, countdown timer and alarm clock engine.
//!
//! Timekeeper holds the timekeeping state of a clock application and advances
//! it from a single master clock. Front-ends drive it through async methods and
//! observe it through strongly-typed event streams.
//!
//! ## Core Concepts
//!
//! - **SystemClock**: A high-frequency ticker that acts as the single source of time.
//! - **Samplers**: Per-component periodic tasks layered on the tick stream. The
//!   stopwatch is sampled every 10 ms, the countdown every 100 ms and the alarm
//!   list once a second. Starting a component registers its sampler; pausing
//!   cancels it on the spot.
//! - **Components**: `Stopwatch`, `Countdown` and `AlarmScheduler` are plain
//!   state machines that are handed the current instant, so they can be tested
//!   without a runtime.
//! - **Persistence**: The alarm list and the background image are rewritten in
//!   full through a `Store` on every change.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use timekeeper::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = TimekeeperConfig::default();
//!     let store = Store::from_dir(config.storage.data_dir.as_deref());
//!     let engine = TimekeeperEngine::new(config, store).await;
//!
//!     let mut alarm_events = engine.subscribe_alarm_events();
//!     tokio::spawn(async move {
//!         while let Ok(event) = alarm_events.recv().await {
//!             println!("Alarm event: {:?}", event);
//!         }
//!     });
//!
//!     let wake_up = AlarmDraft::new("07:00".parse()?).repeat_on([1, 2, 3, 4, 5]);
//!     engine.add_alarm(wake_up).await?;
//!
//!     engine.run().await
//! }
//! ```

pub const ENGINE_NAME: &str = "Timekeeper";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod common;
pub mod components;
pub mod config;
pub mod engine;
pub mod events;
pub mod format;
pub mod insight;
pub mod storage;
pub mod time;

/// A prelude module for easy importing of the most common Timekeeper types.
pub mod prelude {
    pub use crate::common::{AlarmId, SamplerKind};
    pub use crate::components::alarm::{Alarm, AlarmDraft, AlarmError, TimeOfDay};
    pub use crate::components::countdown::CountdownPhase;
    pub use crate::components::stopwatch::Lap;
    pub use crate::config::{ClockResolution, DisplayConfig, Tab, Theme, TimekeeperConfig};
    pub use crate::engine::{CountdownSnapshot, StopwatchSnapshot, TimekeeperEngine};
    pub use crate::events::{
        AlarmEvent, AlertEvent, CountdownEvent, StopwatchEvent, SystemEvent,
    };
    pub use crate::format::{format_split, format_time};
    pub use crate::insight::{tip_or_fallback, Tip, TipDeck, TipSource};
    pub use crate::storage::Store;
}
