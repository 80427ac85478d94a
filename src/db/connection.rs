use crate::config::DatabaseConfig;
use duckdb::{Connection, Result as DbResult};
use std::sync::{Arc, Mutex};
use tracing::info;

pub type DbPool = Arc<Mutex<Connection>>;

// Timestamps are stored as RFC 3339 text so they sort lexically and parse
// back without the duckdb chrono feature.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS therapy_sessions (
    id UUID PRIMARY KEY,
    user_id VARCHAR NOT NULL,
    start_time VARCHAR NOT NULL,
    end_time VARCHAR,
    emotions JSON DEFAULT '[]',
    transcript JSON DEFAULT '[]',
    summary TEXT
);

CREATE INDEX IF NOT EXISTS idx_sessions_user ON therapy_sessions(user_id, start_time);
"#;

pub fn get_connection(config: &DatabaseConfig) -> DbResult<DbPool> {
    info!("Connecting to DuckDB at {}", config.path);
    let conn = Connection::open(&config.path)?;

    init_schema(&conn)?;

    Ok(Arc::new(Mutex::new(conn)))
}

pub fn init_schema(conn: &Connection) -> DbResult<()> {
    info!("Initializing database schema");
    conn.execute_batch(SCHEMA)?;
    Ok(())
}
