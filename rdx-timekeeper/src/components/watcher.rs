//! Defines the samplers that turn the master tick into per-component cadences.

use crate::common::{SamplerId, SamplerKind};
use slotmap::SlotMap;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Watches the tick stream and reports when its interval has elapsed.
#[doc(hidden)]
pub(crate) struct Sampler {
    pub kind: SamplerKind,
    pub interval: Duration,
    pub last_fired: Instant,
}

impl Sampler {
    pub(crate) fn new(kind: SamplerKind, interval: Duration, now: Instant) -> Self {
        Self {
            kind,
            interval,
            last_fired: now,
        }
    }

    /// Returns `true` and rearms itself if the interval has elapsed at `now`.
    ///
    /// The next deadline stays on the interval grid, so a tick period that
    /// does not divide the interval cannot stretch the cadence. After falling
    /// more than a whole interval behind, the grid restarts at `now`.
    pub(crate) fn is_due(&mut self, now: Instant) -> bool {
        let deadline = self.last_fired + self.interval;
        if now < deadline {
            return false;
        }
        self.last_fired = if now.saturating_duration_since(deadline) >= self.interval {
            now
        } else {
            deadline
        };
        true
    }
}

/// The set of live samplers, at most one per kind.
#[doc(hidden)]
#[derive(Default)]
pub(crate) struct SamplerRegistry {
    slots: SlotMap<SamplerId, Sampler>,
    by_kind: HashMap<SamplerKind, SamplerId>,
}

impl SamplerRegistry {
    /// Registers a sampler for `kind`. Returns `None` if one is already live.
    pub(crate) fn start(
        &mut self,
        kind: SamplerKind,
        interval: Duration,
        now: Instant,
    ) -> Option<SamplerId> {
        if self.by_kind.contains_key(&kind) {
            return None;
        }
        let id = self.slots.insert(Sampler::new(kind, interval, now));
        self.by_kind.insert(kind, id);
        Some(id)
    }

    /// Cancels the sampler for `kind`. Returns `true` if one was live.
    pub(crate) fn stop(&mut self, kind: SamplerKind) -> bool {
        match self.by_kind.remove(&kind) {
            Some(id) => self.slots.remove(id).is_some(),
            None => false,
        }
    }

    pub(crate) fn is_running(&self, kind: SamplerKind) -> bool {
        self.by_kind.contains_key(&kind)
    }

    /// Collects the kinds whose interval elapsed at `now`.
    pub(crate) fn due(&mut self, now: Instant) -> Vec<SamplerKind> {
        self.slots
            .values_mut()
            .filter_map(|sampler| sampler.is_due(now).then_some(sampler.kind))
            .collect()
    }
}
