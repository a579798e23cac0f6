//! Contains common, primitive types shared across the Timekeeper engine.
//!
//! This module defines the identifier types used to address samplers and
//! alarms. Using distinct types keeps a sampler key from ever being confused
//! with an alarm id.

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use std::fmt;

new_key_type! {
    /// Uniquely and safely identifies a registered sampler within the engine.
    ///
    /// Keys are never reused, so a stale id held after a sampler is cancelled
    /// can not address a newer sampler.
    pub struct SamplerId;
}

/// The periodic tasks the engine can run.
///
/// Each component owns exactly one kind, and at most one sampler of a kind is
/// registered at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplerKind {
    /// Republishes stopwatch elapsed time.
    Stopwatch,
    /// Advances the countdown towards zero.
    Countdown,
    /// Checks the wall clock against the alarm list.
    AlarmPoll,
}

/// Opaque, unique identifier of an alarm.
///
/// Freshly created alarms get a random UUID; ids loaded from storage are kept
/// verbatim whatever their shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlarmId(String);

impl AlarmId {
    /// Generates a new random id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AlarmId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for AlarmId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for AlarmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
