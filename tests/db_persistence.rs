#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use solace::db::connection;
    use solace::db::service::DbService;
    use solace::db::SessionRecord;
    use solace::store::{DuckDbStore, SessionStore, StoreError};
    use std::sync::{Arc, Mutex};
    use uuid::Uuid;

    // In memory database just for tests
    fn get_test_db() -> duckdb::Connection {
        let conn = duckdb::Connection::open_in_memory().unwrap();
        connection::init_schema(&conn).unwrap();
        conn
    }

    fn record(user_id: &str, minutes_ago: i64) -> SessionRecord {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap() - Duration::minutes(minutes_ago);
        let mut r = SessionRecord::new(Uuid::new_v4(), user_id, start);
        r.emotions = vec!["sad".to_string(), "neutral".to_string()];
        r.transcript = vec![
            "assistant: Hello! How are you feeling today?".to_string(),
            "user: tired".to_string(),
        ];
        r
    }

    #[test]
    fn test_record_lifecycle() {
        let conn = get_test_db();
        let mut r = record("1", 0);

        // 1. Insert
        let inserted = DbService::insert_record(&conn, &r).unwrap();
        assert_eq!(inserted, r);

        // 2. Get
        let fetched = DbService::get_record(&conn, r.id).unwrap().unwrap();
        assert_eq!(fetched, r);

        // 3. Update in place with the terminal state
        r.transcript.push("assistant: That sounds hard.".to_string());
        r.end_time = Some(r.start_time + Duration::minutes(12));
        DbService::update_record(&conn, &r).unwrap().unwrap();

        let fetched = DbService::get_record(&conn, r.id).unwrap().unwrap();
        assert_eq!(fetched.transcript.len(), 3);
        assert_eq!(fetched.duration_minutes(), Some(12));
        assert_eq!(DbService::list_for_user(&conn, "1").unwrap().len(), 1);
    }

    #[test]
    fn test_update_of_missing_record() {
        let conn = get_test_db();
        assert!(DbService::update_record(&conn, &record("1", 0)).unwrap().is_none());
        assert!(DbService::get_record(&conn, Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_list_is_per_user_newest_first() {
        let conn = get_test_db();
        let old = record("1", 120);
        let new = record("1", 5);
        let other = record("2", 0);
        for r in [&old, &new, &other] {
            DbService::insert_record(&conn, r).unwrap();
        }

        let ids: Vec<Uuid> = DbService::list_for_user(&conn, "1").unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![new.id, old.id]);
    }

    #[tokio::test]
    async fn test_store_reports_missing_update() {
        let store = DuckDbStore::new(Arc::new(Mutex::new(get_test_db())));
        let r = record("1", 0);

        assert!(matches!(store.update(&r).await, Err(StoreError::NotFound(id)) if id == r.id));
        store.insert(&r).await.unwrap();
        store.update(&r).await.unwrap();
        assert_eq!(store.get(r.id).await.unwrap(), Some(r));
    }
}
