//! Session persistence.
//!
//! Records are created once per session and overwritten on every later save,
//! keyed by the session id.

pub mod hosted;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::config::{AppConfig, StoreBackend};
use crate::db::{get_connection, service::DbService, DbPool, SessionRecord};
use hosted::HostedStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),
    #[error("store request failed: {0}")]
    Http(String),
    #[error("session {0} not found")]
    NotFound(Uuid),
    #[error("could not decode store response: {0}")]
    Decode(String),
    #[error("store misconfigured: {0}")]
    Config(String),
}

impl From<duckdb::Error> for StoreError {
    fn from(err: duckdb::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, record: &SessionRecord) -> Result<SessionRecord, StoreError>;

    /// Fails with [`StoreError::NotFound`] if the record was never inserted.
    async fn update(&self, record: &SessionRecord) -> Result<SessionRecord, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<SessionRecord>, StoreError>;

    /// Records belonging to `user_id`, newest first.
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<SessionRecord>, StoreError>;
}

/// Local DuckDB-backed store.
#[derive(Clone)]
pub struct DuckDbStore {
    pool: DbPool,
}

impl DuckDbStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, duckdb::Connection>, StoreError> {
        self.pool
            .lock()
            .map_err(|_| StoreError::Database("connection lock poisoned".to_string()))
    }
}

#[async_trait]
impl SessionStore for DuckDbStore {
    async fn insert(&self, record: &SessionRecord) -> Result<SessionRecord, StoreError> {
        let conn = self.conn()?;
        Ok(DbService::insert_record(&conn, record)?)
    }

    async fn update(&self, record: &SessionRecord) -> Result<SessionRecord, StoreError> {
        let conn = self.conn()?;
        DbService::update_record(&conn, record)?.ok_or(StoreError::NotFound(record.id))
    }

    async fn get(&self, id: Uuid) -> Result<Option<SessionRecord>, StoreError> {
        let conn = self.conn()?;
        Ok(DbService::get_record(&conn, id)?)
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<SessionRecord>, StoreError> {
        let conn = self.conn()?;
        Ok(DbService::list_for_user(&conn, user_id)?)
    }
}

pub fn build_store(config: &AppConfig) -> Result<Arc<dyn SessionStore>, StoreError> {
    match config.store.backend {
        StoreBackend::Duckdb => {
            let pool = get_connection(&config.database)?;
            Ok(Arc::new(DuckDbStore::new(pool)))
        }
        StoreBackend::Hosted => {
            let hosted = config
                .store
                .hosted
                .as_ref()
                .ok_or_else(|| StoreError::Config("store.hosted section missing".to_string()))?;
            if hosted.url.is_empty() || hosted.api_key.is_empty() {
                return Err(StoreError::Config("hosted store url and api_key are required".to_string()));
            }
            Ok(Arc::new(HostedStore::new(
                hosted.url.clone(),
                hosted.api_key.clone(),
                hosted.table.clone(),
            )))
        }
    }
}
