//! Completed-session history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::TimerMode;

/// Immutable snapshot appended when a timer session completes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: String,
    pub subject: String,
    pub task: String,
    pub duration_minutes: u64,
    pub completed_at: DateTime<Utc>,
    pub mode: TimerMode,
}
