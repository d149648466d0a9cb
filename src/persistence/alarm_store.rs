use anyhow::{Context, Result};
use log::warn;
use serde_json::Value;

use crate::alarms::Alarm;
use crate::db::Database;

pub const ALARMS_KEY: &str = "studytrack.alarms";

#[derive(Clone)]
pub struct AlarmStore {
    db: Database,
}

impl AlarmStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Entries that fail to parse or validate are dropped one by one; the rest
    /// of the list survives.
    pub async fn load(&self) -> Vec<Alarm> {
        let raw = match self.db.get_value(ALARMS_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(err) => {
                warn!("Failed to read persisted alarms: {err:#}");
                return Vec::new();
            }
        };

        let entries: Vec<Value> = match serde_json::from_str(&raw) {
            Ok(entries) => entries,
            Err(err) => {
                warn!("Discarding malformed alarm list: {err}");
                return Vec::new();
            }
        };

        entries
            .into_iter()
            .filter_map(|entry| match serde_json::from_value::<Alarm>(entry) {
                Ok(alarm) => match alarm.draft.validate() {
                    Ok(()) => Some(alarm),
                    Err(err) => {
                        warn!("Dropping invalid alarm {}: {err}", alarm.id);
                        None
                    }
                },
                Err(err) => {
                    warn!("Dropping malformed alarm entry: {err}");
                    None
                }
            })
            .collect()
    }

    pub async fn save(&self, alarms: &[Alarm]) -> Result<()> {
        let serialized = serde_json::to_string(alarms).context("failed to serialize alarms")?;
        self.db
            .put_value(ALARMS_KEY, &serialized)
            .await
            .context("failed to persist alarms")
    }
}
