//! Contains the timekeeping components driven by the engine.
//!
//! Each component is a plain state machine that is handed the current instant
//! on every call. The `TimekeeperEngine` owns one of each and feeds them from
//! its samplers.

pub mod alarm;
pub mod countdown;
pub mod scheduler;
pub mod stopwatch;
pub mod watcher;
