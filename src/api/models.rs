use serde::{Deserialize, Serialize};

use crate::db::SessionRecord;
use crate::history::{DateRange, HistoryFilter};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
}

#[derive(Debug, Deserialize)]
pub struct ProfileFieldRequest {
    pub field: String,
    pub value: String,
}

/// `?emotions=sad,happy&range=month`
#[derive(Debug, Deserialize, Default)]
pub struct HistoryQuery {
    #[serde(default)]
    pub emotions: Option<String>,
    #[serde(default)]
    pub range: Option<String>,
}

impl HistoryQuery {
    pub fn to_filter(&self) -> Result<HistoryFilter, String> {
        let emotions = self
            .emotions
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_string)
            .collect();
        let range = match self.range.as_deref() {
            Some(r) => r.parse::<DateRange>()?,
            None => DateRange::All,
        };
        Ok(HistoryFilter { emotions, range })
    }
}

#[derive(Debug, Serialize)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub record: SessionRecord,
    pub duration_minutes: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    /// Every emotion across the user's sessions, for the filter picker.
    pub emotions: Vec<String>,
    pub filter: HistoryFilter,
    pub sessions: Vec<HistoryEntry>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl ToString) -> Self {
        Self { error: error.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_parses_comma_separated_emotions() {
        let query = HistoryQuery {
            emotions: Some("sad, happy,,".into()),
            range: Some("week".into()),
        };
        let filter = query.to_filter().unwrap();
        assert_eq!(filter.emotions, vec!["sad", "happy"]);
        assert_eq!(filter.range, DateRange::Week);

        assert_eq!(HistoryQuery::default().to_filter().unwrap(), HistoryFilter::default());
        assert!(HistoryQuery { emotions: None, range: Some("decade".into()) }.to_filter().is_err());
    }
}
