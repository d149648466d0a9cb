use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};

use crate::timer::TimerMode;

pub fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("value {value} exceeds SQLite INTEGER range"))
}

pub fn to_u64(value: i64, field: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| anyhow!("{field} contains negative value {value}"))
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_mode(value: &str) -> Result<TimerMode> {
    match value {
        "focus" => Ok(TimerMode::Focus),
        "shortBreak" => Ok(TimerMode::ShortBreak),
        "longBreak" => Ok(TimerMode::LongBreak),
        "custom" => Ok(TimerMode::Custom),
        other => Err(anyhow!("unknown timer mode {other}")),
    }
}
