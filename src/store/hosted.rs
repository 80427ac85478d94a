use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::json;
use uuid::Uuid;

use crate::db::SessionRecord;
use crate::store::{SessionStore, StoreError};

/// Store backed by a hosted PostgREST endpoint (Supabase style).
pub struct HostedStore {
    client: Client,
    base_url: String,
    api_key: String,
    table: String,
}

impl HostedStore {
    pub fn new(base_url: String, api_key: String, table: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            table,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        req.header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Prefer", "return=representation")
    }

    async fn rows(response: Result<Response, reqwest::Error>) -> Result<Vec<SessionRecord>, StoreError> {
        let response = response.map_err(|e| StoreError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(StoreError::Http(format!("{}: {}", status, text)));
        }

        response
            .json::<Vec<SessionRecord>>()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }
}

#[async_trait]
impl SessionStore for HostedStore {
    async fn insert(&self, record: &SessionRecord) -> Result<SessionRecord, StoreError> {
        let req = self.authorize(self.client.post(self.endpoint())).json(&[record]);
        Self::rows(req.send().await)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Decode("insert returned no rows".to_string()))
    }

    async fn update(&self, record: &SessionRecord) -> Result<SessionRecord, StoreError> {
        let body = json!({
            "end_time": record.end_time,
            "emotions": record.emotions,
            "transcript": record.transcript,
            "summary": record.summary,
        });
        let req = self
            .authorize(self.client.patch(self.endpoint()))
            .query(&[("id", format!("eq.{}", record.id))])
            .json(&body);

        Self::rows(req.send().await)
            .await?
            .into_iter()
            .next()
            .ok_or(StoreError::NotFound(record.id))
    }

    async fn get(&self, id: Uuid) -> Result<Option<SessionRecord>, StoreError> {
        let req = self
            .authorize(self.client.get(self.endpoint()))
            .query(&[("id", format!("eq.{}", id)), ("select", "*".to_string())]);
        Ok(Self::rows(req.send().await).await?.into_iter().next())
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<SessionRecord>, StoreError> {
        let req = self.authorize(self.client.get(self.endpoint())).query(&[
            ("user_id", format!("eq.{}", user_id)),
            ("select", "*".to_string()),
            ("order", "start_time.desc".to_string()),
        ]);
        Self::rows(req.send().await).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_strips_trailing_slash() {
        let store = HostedStore::new(
            "https://example.supabase.co/".into(),
            "anon".into(),
            "therapy_sessions".into(),
        );
        assert_eq!(store.endpoint(), "https://example.supabase.co/rest/v1/therapy_sessions");
    }
}
