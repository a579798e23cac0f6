//! Alarm definitions and their time-of-day.

use crate::common::AlarmId;
use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised by alarm edits.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AlarmError {
    #[error("invalid time of day '{0}', expected HH:MM")]
    InvalidTime(String),
    #[error("invalid weekday {0}, expected 0 (Sunday) to 6 (Saturday)")]
    InvalidWeekday(u8),
    #[error("no alarm with id {0}")]
    NotFound(AlarmId),
}

/// A wall-clock time of day at minute resolution, 24-hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
}

impl TimeOfDay {
    pub fn new(hour: u8, minute: u8) -> Result<Self, AlarmError> {
        if hour > 23 || minute > 59 {
            return Err(AlarmError::InvalidTime(format!("{hour}:{minute}")));
        }
        Ok(Self { hour, minute })
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    /// Whether `now` falls inside this minute.
    pub fn matches(&self, now: &NaiveDateTime) -> bool {
        now.hour() == u32::from(self.hour) && now.minute() == u32::from(self.minute)
    }

    /// 12-hour display text, e.g. `7:05 AM`.
    pub fn to_12h(&self) -> String {
        let period = if self.hour < 12 { "AM" } else { "PM" };
        let hour = match self.hour % 12 {
            0 => 12,
            h => h,
        };
        format!("{hour}:{:02} {period}", self.minute)
    }
}

impl FromStr for TimeOfDay {
    type Err = AlarmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AlarmError::InvalidTime(s.to_string());
        let (hour, minute) = s.trim().split_once(':').ok_or_else(invalid)?;
        if minute.len() != 2 {
            return Err(invalid());
        }
        let hour = hour.parse::<u8>().map_err(|_| invalid())?;
        let minute = minute.parse::<u8>().map_err(|_| invalid())?;
        Self::new(hour, minute).map_err(|_| invalid())
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = AlarmError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// A persisted alarm.
///
/// The serialized form is the stored JSON record: camelCase fields, the time
/// as `"HH:MM"` and repeat days under `days` (0 = Sunday).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alarm {
    pub id: AlarmId,
    pub time: TimeOfDay,
    pub is_active: bool,
    #[serde(default = "default_label")]
    pub label: String,
    /// Empty for a one-shot alarm.
    #[serde(default, rename = "days")]
    pub repeat_days: BTreeSet<u8>,
    #[serde(default = "default_sound")]
    pub sound: String,
    /// Zero means snooze is disabled for this alarm.
    #[serde(default = "default_snooze_minutes")]
    pub snooze_minutes: u32,
}

impl Alarm {
    pub fn is_one_shot(&self) -> bool {
        self.repeat_days.is_empty()
    }

    /// Whether this alarm's regular schedule covers `now`'s minute.
    pub fn is_due(&self, now: &NaiveDateTime) -> bool {
        if !self.time.matches(now) {
            return false;
        }
        if self.is_one_shot() {
            return true;
        }
        let weekday = now.weekday().num_days_from_sunday() as u8;
        self.repeat_days.contains(&weekday)
    }
}

/// The editable fields of an alarm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmDraft {
    pub time: TimeOfDay,
    pub label: String,
    pub repeat_days: BTreeSet<u8>,
    pub sound: String,
    pub snooze_minutes: u32,
}

impl AlarmDraft {
    pub fn new(time: TimeOfDay) -> Self {
        Self {
            time,
            label: default_label(),
            repeat_days: BTreeSet::new(),
            sound: default_sound(),
            snooze_minutes: default_snooze_minutes(),
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn repeat_on(mut self, days: impl IntoIterator<Item = u8>) -> Self {
        self.repeat_days = days.into_iter().collect();
        self
    }

    pub fn sound(mut self, sound: impl Into<String>) -> Self {
        self.sound = sound.into();
        self
    }

    pub fn snooze_minutes(mut self, minutes: u32) -> Self {
        self.snooze_minutes = minutes;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), AlarmError> {
        match self.repeat_days.iter().find(|day| **day > 6) {
            Some(day) => Err(AlarmError::InvalidWeekday(*day)),
            None => Ok(()),
        }
    }

    pub(crate) fn into_alarm(self, id: AlarmId) -> Alarm {
        Alarm {
            id,
            time: self.time,
            is_active: true,
            label: self.label,
            repeat_days: self.repeat_days,
            sound: self.sound,
            snooze_minutes: self.snooze_minutes,
        }
    }
}

fn default_label() -> String {
    "Alarm".to_string()
}

fn default_sound() -> String {
    "default".to_string()
}

fn default_snooze_minutes() -> u32 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32, hour: u32, minute: u32, second: u32) -> NaiveDateTime {
        // March 2026: the 1st is a Sunday.
        NaiveDate::from_ymd_opt(2026, 3, day)
            .unwrap()
            .and_hms_opt(hour, minute, second)
            .unwrap()
    }

    #[test]
    fn time_of_day_parses_and_displays() {
        let time: TimeOfDay = "07:05".parse().unwrap();
        assert_eq!((time.hour(), time.minute()), (7, 5));
        assert_eq!(time.to_string(), "07:05");
        assert_eq!("7:05".parse::<TimeOfDay>().unwrap(), time);
        assert!("24:00".parse::<TimeOfDay>().is_err());
        assert!("12:60".parse::<TimeOfDay>().is_err());
        assert!("12:5".parse::<TimeOfDay>().is_err());
        assert!("noon".parse::<TimeOfDay>().is_err());
    }

    #[test]
    fn twelve_hour_rendering() {
        assert_eq!(TimeOfDay::new(0, 0).unwrap().to_12h(), "12:00 AM");
        assert_eq!(TimeOfDay::new(7, 5).unwrap().to_12h(), "7:05 AM");
        assert_eq!(TimeOfDay::new(12, 30).unwrap().to_12h(), "12:30 PM");
        assert_eq!(TimeOfDay::new(23, 59).unwrap().to_12h(), "11:59 PM");
    }

    #[test]
    fn repeating_alarm_only_matches_listed_days() {
        let alarm = AlarmDraft::new(TimeOfDay::new(6, 30).unwrap())
            .repeat_on([1, 3, 5])
            .into_alarm(AlarmId::from("a"));
        assert!(alarm.is_due(&at(2, 6, 30, 0))); // Monday
        assert!(!alarm.is_due(&at(3, 6, 30, 0))); // Tuesday
        assert!(alarm.is_due(&at(4, 6, 30, 0))); // Wednesday
        assert!(alarm.is_due(&at(6, 6, 30, 0))); // Friday
        assert!(!alarm.is_due(&at(7, 6, 30, 0))); // Saturday
        assert!(alarm.is_due(&at(9, 6, 30, 0))); // next Monday
        assert!(!alarm.is_due(&at(2, 6, 31, 0)));
    }

    #[test]
    fn one_shot_alarm_matches_any_day() {
        let alarm = AlarmDraft::new(TimeOfDay::new(6, 30).unwrap()).into_alarm(AlarmId::from("a"));
        assert!(alarm.is_one_shot());
        assert!(alarm.is_due(&at(1, 6, 30, 0)));
        assert!(alarm.is_due(&at(7, 6, 30, 0)));
    }

    #[test]
    fn drafts_reject_out_of_range_weekdays() {
        let draft = AlarmDraft::new(TimeOfDay::new(6, 30).unwrap()).repeat_on([0, 7]);
        assert_eq!(draft.validate(), Err(AlarmError::InvalidWeekday(7)));
    }

    #[test]
    fn stored_records_round_trip_through_the_blob_format() {
        let json = r#"{"id":"1718000000000","time":"08:15","isActive":true,"label":"Gym","days":[1,3]}"#;
        let alarm: Alarm = serde_json::from_str(json).unwrap();
        assert_eq!(alarm.time, TimeOfDay::new(8, 15).unwrap());
        assert_eq!(alarm.repeat_days, BTreeSet::from([1, 3]));
        assert_eq!(alarm.sound, "default");
        assert_eq!(alarm.snooze_minutes, 5);

        let value = serde_json::to_value(&alarm).unwrap();
        assert_eq!(value["time"], "08:15");
        assert_eq!(value["isActive"], true);
        assert_eq!(value["snoozeMinutes"], 5);
    }
}
