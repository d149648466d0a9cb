use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use crate::db::{
    connection::Database,
    helpers::{parse_datetime, parse_mode, to_i64, to_u64},
    models::SessionRecord,
};

fn row_to_record(row: &Row) -> Result<SessionRecord> {
    let duration_minutes: i64 = row.get("duration_minutes")?;
    let completed_at: String = row.get("completed_at")?;
    let mode: String = row.get("mode")?;

    Ok(SessionRecord {
        id: row.get("id")?,
        subject: row.get("subject")?,
        task: row.get("task")?,
        duration_minutes: to_u64(duration_minutes, "duration_minutes")?,
        completed_at: parse_datetime(&completed_at, "completed_at")?,
        mode: parse_mode(&mode)?,
    })
}

impl Database {
    /// History is append-only; there is no update or delete counterpart.
    pub async fn append_session_record(&self, record: &SessionRecord) -> Result<()> {
        let record = record.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO session_records (id, subject, task, duration_minutes, completed_at, mode)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.id,
                    record.subject,
                    record.task,
                    to_i64(record.duration_minutes)?,
                    record.completed_at.to_rfc3339(),
                    record.mode.as_str(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// Newest first.
    pub async fn list_session_records(&self, limit: u32) -> Result<Vec<SessionRecord>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, subject, task, duration_minutes, completed_at, mode
                 FROM session_records
                 ORDER BY completed_at DESC
                 LIMIT ?1",
            )?;

            let mut rows = stmt.query(params![limit])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(row_to_record(row)?);
            }
            Ok(records)
        })
        .await
    }

    /// Minutes of focus and custom sessions completed at or after `since`.
    pub async fn focus_minutes_since(&self, since: DateTime<Utc>) -> Result<u64> {
        self.execute(move |conn| {
            let total: i64 = conn.query_row(
                "SELECT COALESCE(SUM(duration_minutes), 0)
                 FROM session_records
                 WHERE completed_at >= ?1 AND mode IN ('focus', 'custom')",
                params![since.to_rfc3339()],
                |row| row.get(0),
            )?;
            to_u64(total, "focus minutes")
        })
        .await
    }
}
