use anyhow::{bail, Result};
use chrono::{Timelike, Weekday};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use uuid::Uuid;

pub const SNOOZE_MINUTES_RANGE: RangeInclusive<u32> = 1..=15;

/// Fixed vocabulary of alarm sounds, each mapped to a distinct pitch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AlarmSound {
    Gentle,
    Nature,
    Classical,
    Digital,
    Urgent,
}

impl Default for AlarmSound {
    fn default() -> Self {
        AlarmSound::Gentle
    }
}

impl AlarmSound {
    pub const ALL: [AlarmSound; 5] = [
        AlarmSound::Gentle,
        AlarmSound::Nature,
        AlarmSound::Classical,
        AlarmSound::Digital,
        AlarmSound::Urgent,
    ];

    pub fn frequency_hz(&self) -> f32 {
        match self {
            AlarmSound::Gentle => 440.0,
            AlarmSound::Nature => 523.25,
            AlarmSound::Classical => 659.25,
            AlarmSound::Digital => 880.0,
            AlarmSound::Urgent => 1046.5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlarmSound::Gentle => "gentle",
            AlarmSound::Nature => "nature",
            AlarmSound::Classical => "classical",
            AlarmSound::Digital => "digital",
            AlarmSound::Urgent => "urgent",
        }
    }
}

/// Hour and minute parsed from a strict `HH:MM` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmTime {
    pub hour: u32,
    pub minute: u32,
}

impl AlarmTime {
    pub fn parse(value: &str) -> Option<Self> {
        let bytes = value.as_bytes();
        if bytes.len() != 5 || bytes[2] != b':' {
            return None;
        }
        let digits = [bytes[0], bytes[1], bytes[3], bytes[4]];
        if !digits.iter().all(u8::is_ascii_digit) {
            return None;
        }
        let hour = u32::from(bytes[0] - b'0') * 10 + u32::from(bytes[1] - b'0');
        let minute = u32::from(bytes[3] - b'0') * 10 + u32::from(bytes[4] - b'0');
        if hour > 23 || minute > 59 {
            return None;
        }
        Some(Self { hour, minute })
    }

    pub fn matches<T: Timelike>(&self, at: &T) -> bool {
        at.hour() == self.hour && at.minute() == self.minute
    }
}

/// The editable part of an alarm, as submitted by a form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AlarmDraft {
    #[serde(default)]
    pub label: String,
    pub time: String,
    /// Sunday first.
    pub days_of_week: [bool; 7],
    pub is_active: bool,
    pub sound: AlarmSound,
    pub volume: f32,
    pub snooze_enabled: bool,
    pub snooze_interval_minutes: u32,
}

impl Default for AlarmDraft {
    fn default() -> Self {
        Self {
            label: String::new(),
            time: "07:00".into(),
            days_of_week: [true; 7],
            is_active: true,
            sound: AlarmSound::default(),
            volume: 0.7,
            snooze_enabled: true,
            snooze_interval_minutes: 5,
        }
    }
}

impl AlarmDraft {
    pub fn validate(&self) -> Result<()> {
        if AlarmTime::parse(&self.time).is_none() {
            bail!("alarm time '{}' is not a valid HH:MM value", self.time);
        }
        if !(0.0..=1.0).contains(&self.volume) {
            bail!("alarm volume {} must be between 0.0 and 1.0", self.volume);
        }
        if !SNOOZE_MINUTES_RANGE.contains(&self.snooze_interval_minutes) {
            bail!(
                "snooze interval {} must be between {} and {} minutes",
                self.snooze_interval_minutes,
                SNOOZE_MINUTES_RANGE.start(),
                SNOOZE_MINUTES_RANGE.end()
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Alarm {
    pub id: String,
    #[serde(flatten)]
    pub draft: AlarmDraft,
}

impl Alarm {
    pub fn new(draft: AlarmDraft) -> Result<Self> {
        draft.validate()?;
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            draft,
        })
    }

    pub fn time(&self) -> Option<AlarmTime> {
        AlarmTime::parse(&self.draft.time)
    }

    pub fn fires_on(&self, weekday: Weekday) -> bool {
        self.draft.days_of_week[weekday.num_days_from_sunday() as usize]
    }

    pub fn display_name(&self) -> String {
        if self.draft.label.trim().is_empty() {
            format!("Alarm {}", self.draft.time)
        } else {
            self.draft.label.clone()
        }
    }
}
