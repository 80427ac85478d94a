use crate::db::models::SessionRecord;
use chrono::{DateTime, SecondsFormat, Utc};
use duckdb::{params, Connection, Result as DbResult, Row};
use uuid::Uuid;

const COLUMNS: &str = "CAST(id AS VARCHAR), user_id, start_time, end_time, CAST(emotions AS VARCHAR), CAST(transcript AS VARCHAR), summary";

pub struct DbService;

fn to_text(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(text: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

impl DbService {
    fn row_to_record(row: &Row) -> DbResult<SessionRecord> {
        let start: String = row.get(2)?;
        let end: Option<String> = row.get(3)?;
        let emotions: String = row.get(4)?;
        let transcript: String = row.get(5)?;

        Ok(SessionRecord {
            id: row.get::<_, String>(0)?.parse().unwrap_or_default(),
            user_id: row.get(1)?,
            start_time: parse_ts(&start),
            end_time: end.as_deref().map(parse_ts),
            emotions: serde_json::from_str(&emotions).unwrap_or_default(),
            transcript: serde_json::from_str(&transcript).unwrap_or_default(),
            summary: row.get(6)?,
        })
    }

    pub fn insert_record(conn: &Connection, record: &SessionRecord) -> DbResult<SessionRecord> {
        conn.execute(
            "INSERT INTO therapy_sessions (id, user_id, start_time, end_time, emotions, transcript, summary)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                record.id.to_string(),
                record.user_id,
                to_text(&record.start_time),
                record.end_time.as_ref().map(to_text),
                serde_json::json!(record.emotions).to_string(),
                serde_json::json!(record.transcript).to_string(),
                record.summary,
            ],
        )?;

        Ok(Self::get_record(conn, record.id)?.unwrap_or_else(|| record.clone()))
    }

    /// Overwrites the mutable columns. `Ok(None)` when no such record exists.
    pub fn update_record(conn: &Connection, record: &SessionRecord) -> DbResult<Option<SessionRecord>> {
        let changed = conn.execute(
            "UPDATE therapy_sessions SET end_time = ?, emotions = ?, transcript = ?, summary = ? WHERE id = ?",
            params![
                record.end_time.as_ref().map(to_text),
                serde_json::json!(record.emotions).to_string(),
                serde_json::json!(record.transcript).to_string(),
                record.summary,
                record.id.to_string(),
            ],
        )?;

        if changed == 0 {
            return Ok(None);
        }
        Self::get_record(conn, record.id)
    }

    pub fn get_record(conn: &Connection, id: Uuid) -> DbResult<Option<SessionRecord>> {
        let mut stmt = conn.prepare(&format!("SELECT {} FROM therapy_sessions WHERE id = ?", COLUMNS))?;
        let mut rows = stmt.query_map(params![id.to_string()], Self::row_to_record)?;

        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Newest first.
    pub fn list_for_user(conn: &Connection, user_id: &str) -> DbResult<Vec<SessionRecord>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM therapy_sessions WHERE user_id = ? ORDER BY start_time DESC",
            COLUMNS
        ))?;
        let rows = stmt.query_map(params![user_id], Self::row_to_record)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }
}
