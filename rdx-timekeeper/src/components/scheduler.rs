//! The alarm scheduler: wall-clock matching, ringing and snoozing.

use crate::common::AlarmId;
use crate::components::alarm::{Alarm, AlarmDraft, AlarmError};
use crate::config::{AlarmConfig, ZeroSnooze};
use crate::events::AlarmEvent;
use chrono::{NaiveDateTime, Timelike};
use std::collections::HashMap;
use tracing::{debug, info};

/// Whether an alarm is currently demanding attention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RingState {
    Idle,
    Ringing { id: AlarmId, since: NaiveDateTime },
}

/// How snooze requests and unanswered rings are resolved.
#[derive(Debug, Clone, Copy)]
pub struct SnoozePolicy {
    pub fallback_minutes: u32,
    pub ring_timeout: chrono::Duration,
    pub zero_snooze: ZeroSnooze,
}

impl From<&AlarmConfig> for SnoozePolicy {
    fn from(config: &AlarmConfig) -> Self {
        Self {
            fallback_minutes: config.snooze_fallback_minutes,
            ring_timeout: chrono::Duration::seconds(config.ring_timeout_secs as i64),
            zero_snooze: config.zero_snooze,
        }
    }
}

impl Default for SnoozePolicy {
    fn default() -> Self {
        Self::from(&AlarmConfig::default())
    }
}

/// Owns the alarm list and decides when alarms ring.
///
/// The snooze registry, the per-alarm "last fired" minute and the time of the
/// previous poll are transient and start empty on every load.
#[derive(Debug)]
pub struct AlarmScheduler {
    alarms: Vec<Alarm>,
    snoozes: HashMap<AlarmId, NaiveDateTime>,
    last_fired: HashMap<AlarmId, NaiveDateTime>,
    last_poll: Option<NaiveDateTime>,
    ring: RingState,
    policy: SnoozePolicy,
}

impl AlarmScheduler {
    pub fn new(alarms: Vec<Alarm>, policy: SnoozePolicy) -> Self {
        Self {
            alarms,
            snoozes: HashMap::new(),
            last_fired: HashMap::new(),
            last_poll: None,
            ring: RingState::Idle,
            policy,
        }
    }

    pub fn alarms(&self) -> &[Alarm] {
        &self.alarms
    }

    pub fn get(&self, id: &AlarmId) -> Option<&Alarm> {
        self.alarms.iter().find(|alarm| &alarm.id == id)
    }

    pub fn ring_state(&self) -> &RingState {
        &self.ring
    }

    /// The alarm currently ringing, if any.
    pub fn ringing(&self) -> Option<&Alarm> {
        match &self.ring {
            RingState::Ringing { id, .. } => self.get(id),
            RingState::Idle => None,
        }
    }

    pub fn snoozed_until(&self, id: &AlarmId) -> Option<NaiveDateTime> {
        self.snoozes.get(id).copied()
    }

    pub fn add(&mut self, draft: AlarmDraft) -> Result<Alarm, AlarmError> {
        draft.validate()?;
        let alarm = draft.into_alarm(AlarmId::generate());
        debug!("alarm {} added for {}", alarm.id, alarm.time);
        self.alarms.push(alarm.clone());
        Ok(alarm)
    }

    /// Replaces the editable fields of an alarm. The edited alarm is armed
    /// again and any pending snooze is dropped.
    pub fn update(&mut self, id: &AlarmId, draft: AlarmDraft) -> Result<Alarm, AlarmError> {
        draft.validate()?;
        let alarm = self
            .alarms
            .iter_mut()
            .find(|alarm| &alarm.id == id)
            .ok_or_else(|| AlarmError::NotFound(id.clone()))?;
        *alarm = draft.into_alarm(id.clone());
        let updated = alarm.clone();
        self.snoozes.remove(id);
        self.last_fired.remove(id);
        Ok(updated)
    }

    pub fn remove(&mut self, id: &AlarmId) -> Result<Alarm, AlarmError> {
        let index = self
            .alarms
            .iter()
            .position(|alarm| &alarm.id == id)
            .ok_or_else(|| AlarmError::NotFound(id.clone()))?;
        self.snoozes.remove(id);
        self.last_fired.remove(id);
        if matches!(&self.ring, RingState::Ringing { id: ringing, .. } if ringing == id) {
            self.ring = RingState::Idle;
        }
        Ok(self.alarms.remove(index))
    }

    /// Arms or disarms an alarm. Disarming drops any pending snooze.
    pub fn set_active(&mut self, id: &AlarmId, active: bool) -> Result<(), AlarmError> {
        let alarm = self
            .alarms
            .iter_mut()
            .find(|alarm| &alarm.id == id)
            .ok_or_else(|| AlarmError::NotFound(id.clone()))?;
        alarm.is_active = active;
        if !active {
            self.snoozes.remove(id);
        }
        Ok(())
    }

    /// Ends the ring. A one-shot alarm is disarmed so it does not ring again.
    pub fn dismiss(&mut self) -> Option<AlarmEvent> {
        let RingState::Ringing { id, .. } = std::mem::replace(&mut self.ring, RingState::Idle)
        else {
            return None;
        };
        self.snoozes.remove(&id);
        let mut deactivated = false;
        if let Some(alarm) = self.alarms.iter_mut().find(|alarm| alarm.id == id) {
            if alarm.is_one_shot() && alarm.is_active {
                alarm.is_active = false;
                deactivated = true;
            }
        }
        info!("alarm {} dismissed", id);
        Some(AlarmEvent::Dismissed { id, deactivated })
    }

    /// Ends the ring and schedules it to ring again later.
    ///
    /// The delay is the alarm's own snooze minutes, or the policy fallback when
    /// those are zero. A non-zero value is used as given and is not raised to
    /// the fallback. With `ZeroSnooze::Dismiss` a zero-minute alarm is
    /// dismissed instead. An alarm switched off while ringing is dismissed
    /// rather than snoozed.
    pub fn snooze(&mut self, now: NaiveDateTime) -> Option<AlarmEvent> {
        self.snooze_inner(now, false)
    }

    fn snooze_inner(&mut self, now: NaiveDateTime, automatic: bool) -> Option<AlarmEvent> {
        let id = match &self.ring {
            RingState::Ringing { id, .. } => id.clone(),
            RingState::Idle => return None,
        };
        let configured = match self.get(&id) {
            Some(alarm) if alarm.is_active => alarm.snooze_minutes,
            _ => return self.dismiss(),
        };
        let minutes = match (configured, self.policy.zero_snooze) {
            (0, ZeroSnooze::Dismiss) => return self.dismiss(),
            (0, ZeroSnooze::Fallback) => self.policy.fallback_minutes,
            (minutes, _) => minutes,
        };
        self.ring = RingState::Idle;
        let until = now + chrono::Duration::minutes(i64::from(minutes));
        self.snoozes.insert(id.clone(), until);
        info!("alarm {} snoozed until {}", id, until);
        Some(AlarmEvent::Snoozed {
            id,
            until,
            automatic,
        })
    }

    /// Checks the alarm list against the wall clock.
    ///
    /// While ringing, the only thing evaluated is the ring timeout, which
    /// auto-snoozes. Otherwise due snoozes take precedence over regular
    /// schedules, and the earliest due snooze wins.
    ///
    /// Regular schedules match at second zero. A poll that lands later in the
    /// minute still matches if the previous poll came before that minute
    /// began, so a skipped second zero does not lose the alarm.
    pub fn poll(&mut self, now: NaiveDateTime) -> Option<AlarmEvent> {
        let previous = self.last_poll.replace(now);
        if let RingState::Ringing { since, .. } = self.ring {
            if now - since >= self.policy.ring_timeout {
                return self.snooze_inner(now, true);
            }
            return None;
        }

        let due_snooze = self
            .snoozes
            .iter()
            .filter(|(id, until)| now >= **until && self.get(id).is_some_and(|a| a.is_active))
            .min_by_key(|(_, until)| **until)
            .map(|(id, _)| id.clone());
        if let Some(id) = due_snooze {
            self.snoozes.remove(&id);
            return self.trigger(id, now);
        }

        let minute = now
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(now);
        let crossed = now.second() == 0 || previous.is_some_and(|p| p < minute);
        if !crossed {
            return None;
        }
        let due = self.alarms.iter().find(|alarm| {
            alarm.is_active
                && !self.snoozes.contains_key(&alarm.id)
                && self.last_fired.get(&alarm.id) != Some(&minute)
                && alarm.is_due(&now)
        })?;
        let id = due.id.clone();
        self.last_fired.insert(id.clone(), minute);
        self.trigger(id, now)
    }

    fn trigger(&mut self, id: AlarmId, now: NaiveDateTime) -> Option<AlarmEvent> {
        let alarm = self.get(&id)?.clone();
        info!("alarm {} ringing ({})", alarm.id, alarm.label);
        self.ring = RingState::Ringing { id, since: now };
        Some(AlarmEvent::Ringing { alarm })
    }
}
