//! Client-side filtering of past session records.

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::db::SessionRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateRange {
    Week,
    Month,
    Year,
    #[default]
    All,
}

impl DateRange {
    /// Oldest start time still inside the range, relative to `now`.
    pub fn cutoff(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            DateRange::Week => Some(now - Duration::days(7)),
            DateRange::Month => now.checked_sub_months(Months::new(1)),
            DateRange::Year => now.checked_sub_months(Months::new(12)),
            DateRange::All => None,
        }
    }
}

impl FromStr for DateRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "week" => Ok(DateRange::Week),
            "month" => Ok(DateRange::Month),
            "year" => Ok(DateRange::Year),
            "all" | "" => Ok(DateRange::All),
            other => Err(format!("unknown date range '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryFilter {
    pub emotions: Vec<String>,
    pub range: DateRange,
}

impl HistoryFilter {
    pub fn toggle_emotion(&mut self, emotion: &str) {
        match self.emotions.iter().position(|e| e == emotion) {
            Some(idx) => {
                self.emotions.remove(idx);
            }
            None => self.emotions.push(emotion.to_string()),
        }
    }

    /// A record matches when it shares any selected emotion (or none are
    /// selected) and started on or after the range cutoff.
    pub fn matches(&self, record: &SessionRecord, now: DateTime<Utc>) -> bool {
        let emotion_ok = self.emotions.is_empty()
            || self.emotions.iter().any(|e| record.emotions.contains(e));
        let date_ok = match self.range.cutoff(now) {
            Some(cutoff) => record.start_time >= cutoff,
            None => true,
        };
        emotion_ok && date_ok
    }

    /// Keeps input order.
    pub fn apply<'a>(&self, records: &'a [SessionRecord], now: DateTime<Utc>) -> Vec<&'a SessionRecord> {
        records.iter().filter(|r| self.matches(r, now)).collect()
    }
}

/// Every emotion label across `records`, first occurrence first.
pub fn all_emotions(records: &[SessionRecord]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for emotion in records.iter().flat_map(|r| r.emotions.iter()) {
        if !seen.contains(emotion) {
            seen.push(emotion.clone());
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn record(days_ago: i64, emotions: &[&str], now: DateTime<Utc>) -> SessionRecord {
        let mut r = SessionRecord::new(Uuid::new_v4(), "1", now - Duration::days(days_ago));
        r.emotions = emotions.iter().map(|e| e.to_string()).collect();
        r
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 31, 12, 0, 0).unwrap()
    }

    #[test]
    fn empty_filter_keeps_everything() {
        let now = now();
        let records = vec![record(1, &["happy"], now), record(400, &[], now)];
        assert_eq!(HistoryFilter::default().apply(&records, now).len(), 2);
    }

    #[test]
    fn emotions_use_any_semantics() {
        let now = now();
        let records = vec![
            record(1, &["happy", "neutral"], now),
            record(2, &["anxious", "sad"], now),
            record(3, &["angry"], now),
        ];
        let filter = HistoryFilter {
            emotions: vec!["sad".into(), "happy".into()],
            range: DateRange::All,
        };
        let kept: Vec<_> = filter.apply(&records, now).into_iter().map(|r| r.id).collect();
        assert_eq!(kept, vec![records[0].id, records[1].id]);
    }

    #[test]
    fn ranges_cut_relative_to_now() {
        let now = now();
        let records = vec![
            record(6, &["happy"], now),
            record(8, &["happy"], now),
            record(40, &["happy"], now),
            record(300, &["happy"], now),
            record(400, &["happy"], now),
        ];
        let count = |range| HistoryFilter { emotions: vec![], range }.apply(&records, now).len();
        assert_eq!(count(DateRange::Week), 1);
        assert_eq!(count(DateRange::Month), 2);
        assert_eq!(count(DateRange::Year), 4);
        assert_eq!(count(DateRange::All), 5);
    }

    #[test]
    fn month_cutoff_clamps_to_shorter_month() {
        let cutoff = DateRange::Month.cutoff(now()).unwrap();
        assert_eq!(cutoff, Utc.with_ymd_and_hms(2024, 2, 29, 12, 0, 0).unwrap());
    }

    #[test]
    fn filtering_is_idempotent() {
        let now = now();
        let records = vec![record(1, &["sad"], now), record(10, &["sad", "happy"], now), record(2, &["happy"], now)];
        let filter = HistoryFilter {
            emotions: vec!["sad".into()],
            range: DateRange::Month,
        };
        let once: Vec<SessionRecord> = filter.apply(&records, now).into_iter().cloned().collect();
        let twice: Vec<SessionRecord> = filter.apply(&once, now).into_iter().cloned().collect();
        assert_eq!(once, twice);
    }

    #[test]
    fn toggling_and_listing_emotions() {
        let mut filter = HistoryFilter::default();
        filter.toggle_emotion("sad");
        filter.toggle_emotion("happy");
        filter.toggle_emotion("sad");
        assert_eq!(filter.emotions, vec!["happy".to_string()]);

        let now = now();
        let records = vec![record(1, &["happy", "neutral"], now), record(2, &["sad", "happy"], now)];
        assert_eq!(all_emotions(&records), vec!["happy", "neutral", "sad"]);

        assert_eq!("Week".parse::<DateRange>().unwrap(), DateRange::Week);
        assert!("fortnight".parse::<DateRange>().is_err());
    }
}
