use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Persisted log of one therapy session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: Uuid,
    pub user_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub emotions: Vec<String>,
    /// Rendered `"sender: text"` lines.
    pub transcript: Vec<String>,
    pub summary: Option<String>,
}

impl SessionRecord {
    pub fn new(id: Uuid, user_id: impl Into<String>, start_time: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id: user_id.into(),
            start_time,
            end_time: None,
            emotions: Vec::new(),
            transcript: Vec::new(),
            summary: None,
        }
    }

    /// Whole minutes between start and end, once the session has ended.
    pub fn duration_minutes(&self) -> Option<i64> {
        self.end_time.map(|end| (end - self.start_time).num_minutes())
    }
}
