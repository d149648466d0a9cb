use anyhow::{bail, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::timer::{ModeDurations, CUSTOM_MINUTES_RANGE, DEFAULT_LONG_BREAK_EVERY};

/// Where the timer's ticks come from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum TickSource {
    /// In-process 1 s interval, one second per tick.
    #[default]
    Interval,
    /// `TickWorker` reporting wall-clock elapsed time.
    Worker,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct TimerSettings {
    #[serde(flatten)]
    pub durations: ModeDurations,
    pub long_break_every: u32,
    pub tick_source: TickSource,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            durations: ModeDurations::default(),
            long_break_every: DEFAULT_LONG_BREAK_EVERY,
            tick_source: TickSource::default(),
        }
    }
}

impl TimerSettings {
    pub fn validate(&self) -> Result<()> {
        let d = &self.durations;
        for (name, minutes) in [
            ("focus", d.focus_minutes),
            ("short break", d.short_break_minutes),
            ("long break", d.long_break_minutes),
        ] {
            if minutes == 0 {
                bail!("{name} duration must be at least one minute");
            }
        }
        if !CUSTOM_MINUTES_RANGE.contains(&d.custom_minutes) {
            bail!(
                "custom duration must be between {} and {} minutes",
                CUSTOM_MINUTES_RANGE.start(),
                CUSTOM_MINUTES_RANGE.end()
            );
        }
        if self.long_break_every == 0 {
            bail!("long break cadence must be at least one cycle");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct UserSettings {
    timer: TimerSettings,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            parse_or_default(&contents)
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn timer_settings(&self) -> TimerSettings {
        self.read().timer
    }

    pub fn update_timer_settings(&self, settings: TimerSettings) -> Result<()> {
        settings.validate()?;
        let mut guard = self.write();
        let mut next = guard.clone();
        next.timer = settings;
        self.persist(&next)?;
        *guard = next;
        Ok(())
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        let data: UserSettings = serde_json::from_str(&contents)?;
        data.timer.validate()?;
        *self.write() = data;
        Ok(())
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, UserSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, UserSettings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn parse_or_default(contents: &str) -> UserSettings {
    match serde_json::from_str::<UserSettings>(contents) {
        Ok(data) => match data.timer.validate() {
            Ok(()) => data,
            Err(err) => {
                warn!("Ignoring invalid timer settings: {err}");
                UserSettings::default()
            }
        },
        Err(err) => {
            warn!("Ignoring malformed settings file: {err}");
            UserSettings::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        let settings = store.timer_settings();
        assert_eq!(settings.durations.focus_minutes, 25);
        assert_eq!(settings.durations.short_break_minutes, 5);
        assert_eq!(settings.durations.long_break_minutes, 15);
        assert_eq!(settings.long_break_every, 4);
        assert_eq!(settings.tick_source, TickSource::Interval);
    }

    #[test]
    fn updates_persist_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::new(path.clone()).unwrap();

        let mut settings = store.timer_settings();
        settings.durations.focus_minutes = 50;
        settings.tick_source = TickSource::Worker;
        store.update_timer_settings(settings).unwrap();

        let reopened = SettingsStore::new(path).unwrap();
        assert_eq!(reopened.timer_settings(), settings);
    }

    #[test]
    fn invalid_updates_are_rejected_and_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::new(path.clone()).unwrap();

        let mut settings = store.timer_settings();
        settings.durations.custom_minutes = 181;
        assert!(store.update_timer_settings(settings).is_err());

        settings.durations.custom_minutes = 30;
        settings.long_break_every = 0;
        assert!(store.update_timer_settings(settings).is_err());

        assert!(!path.exists());
        assert_eq!(store.timer_settings(), TimerSettings::default());
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        let store = SettingsStore::new(path.clone()).unwrap();
        assert_eq!(store.timer_settings(), TimerSettings::default());

        fs::write(&path, r#"{"timer":{"focusMinutes":0}}"#).unwrap();
        let store = SettingsStore::new(path).unwrap();
        assert_eq!(store.timer_settings(), TimerSettings::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"timer":{"focusMinutes":45,"tickSource":"worker"}}"#).unwrap();

        let settings = SettingsStore::new(path).unwrap().timer_settings();
        assert_eq!(settings.durations.focus_minutes, 45);
        assert_eq!(settings.durations.short_break_minutes, 5);
        assert_eq!(settings.tick_source, TickSource::Worker);
    }
}
