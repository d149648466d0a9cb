use anyhow::{bail, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::db::Database;
use crate::timer::{TimerMode, TimerSession, CUSTOM_MINUTES_RANGE};

pub const ACTIVE_SESSION_KEY: &str = "studytrack.activeSession";
pub const POMODORO_COUNT_KEY: &str = "studytrack.pomodoroCount";

/// The single persisted record for the active session. `last_update_epoch_ms`
/// exists only for drift reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSessionState {
    pub session: TimerSession,
    #[serde(default)]
    pub pomodoro_count: u32,
    pub last_update_epoch_ms: i64,
}

impl PersistedSessionState {
    fn validate(&self) -> Result<()> {
        let session = &self.session;
        if session.target_seconds == 0 {
            bail!("targetSeconds must be positive");
        }
        if session.mode == TimerMode::Custom {
            let minutes = session.target_seconds / 60;
            let in_range = u32::try_from(minutes)
                .map(|m| CUSTOM_MINUTES_RANGE.contains(&m))
                .unwrap_or(false);
            if !in_range || session.target_seconds % 60 != 0 {
                bail!("custom target of {}s is out of range", session.target_seconds);
            }
        }
        Ok(())
    }
}

/// Persistence adapter for the active session: save, load, clear.
#[derive(Clone)]
pub struct SessionStore {
    db: Database,
}

impl SessionStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn save(&self, state: &PersistedSessionState) -> Result<()> {
        let serialized =
            serde_json::to_string(state).context("failed to serialize session state")?;
        self.db
            .put_value(ACTIVE_SESSION_KEY, &serialized)
            .await
            .context("failed to persist session state")
    }

    /// Missing, unreadable and malformed records all come back as `None`.
    pub async fn load(&self) -> Option<PersistedSessionState> {
        let raw = match self.db.get_value(ACTIVE_SESSION_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!("Failed to read persisted session: {err:#}");
                return None;
            }
        };

        let state: PersistedSessionState = match serde_json::from_str(&raw) {
            Ok(state) => state,
            Err(err) => {
                warn!("Discarding malformed persisted session: {err}");
                return None;
            }
        };

        if let Err(err) = state.validate() {
            warn!("Discarding invalid persisted session: {err}");
            return None;
        }

        Some(state)
    }

    pub async fn clear(&self) -> Result<()> {
        self.db
            .delete_value(ACTIVE_SESSION_KEY)
            .await
            .context("failed to clear session state")
    }

    /// The completed-cycle counter outlives the active session record, which
    /// is destroyed on completion.
    pub async fn save_pomodoro_count(&self, count: u32) -> Result<()> {
        self.db
            .put_value(POMODORO_COUNT_KEY, &count.to_string())
            .await
            .context("failed to persist pomodoro count")
    }

    pub async fn load_pomodoro_count(&self) -> u32 {
        match self.db.get_value(POMODORO_COUNT_KEY).await {
            Ok(Some(raw)) => raw.trim().parse().unwrap_or_else(|_| {
                warn!("Discarding malformed pomodoro count {raw:?}");
                0
            }),
            Ok(None) => 0,
            Err(err) => {
                warn!("Failed to read pomodoro count: {err:#}");
                0
            }
        }
    }
}
