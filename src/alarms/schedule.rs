//! Pure due-alarm evaluation.
//!
//! An alarm is due only on the poll that lands on second zero of a matching
//! minute. A missed second zero (host asleep) means a missed alarm; the window
//! is never widened because that would allow double firing.

use chrono::{Datelike, NaiveDateTime, Timelike};
use std::collections::HashMap;

use super::model::Alarm;

pub fn is_due(alarm: &Alarm, now: &NaiveDateTime) -> bool {
    alarm.draft.is_active
        && now.second() == 0
        && alarm.time().map_or(false, |time| time.matches(now))
        && alarm.fires_on(now.weekday())
}

pub fn due_alarms<'a>(alarms: &'a [Alarm], now: &'a NaiveDateTime) -> impl Iterator<Item = &'a Alarm> {
    alarms.iter().filter(move |alarm| is_due(alarm, now))
}

/// Remembers the minute each alarm last fired in, so two polls inside the same
/// second zero cannot both fire it.
#[derive(Debug, Default)]
pub struct FiredGuard {
    last_fired: HashMap<String, NaiveDateTime>,
}

impl FiredGuard {
    /// Returns `true` the first time an alarm is claimed within a minute.
    pub fn claim(&mut self, alarm_id: &str, now: &NaiveDateTime) -> bool {
        let minute = truncate_to_minute(now);
        match self.last_fired.get(alarm_id) {
            Some(previous) if *previous == minute => false,
            _ => {
                self.last_fired.insert(alarm_id.to_string(), minute);
                true
            }
        }
    }

    pub fn forget(&mut self, alarm_id: &str) {
        self.last_fired.remove(alarm_id);
    }
}

fn truncate_to_minute(at: &NaiveDateTime) -> NaiveDateTime {
    at.with_nanosecond(0)
        .and_then(|t| t.with_second(0))
        .unwrap_or(*at)
}
