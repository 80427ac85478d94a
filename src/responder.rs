//! Reply generation for therapy sessions.
//!
//! The responder folds the recent transcript and the currently detected
//! emotion into a single user turn and hands it to an [`LlmProvider`].

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::config::SessionConfig;
use crate::llm::{
    models::{ChatOptions, Message},
    LlmError, LlmProvider,
};

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("network failure: {0}")]
    Network(String),
    #[error("reply generation failed: {0}")]
    Api(String),
    #[error("rate limited")]
    RateLimited,
    #[error("empty reply")]
    EmptyReply,
}

impl From<LlmError> for RequestError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Network(e) => RequestError::Network(e),
            LlmError::Api(e) => RequestError::Api(e),
            LlmError::RateLimited => RequestError::RateLimited,
            LlmError::InvalidResponse => RequestError::EmptyReply,
        }
    }
}

#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    /// `history` holds rendered `"sender: text"` lines, oldest first.
    async fn generate(
        &self,
        message: &str,
        emotion: Option<&str>,
        history: &[String],
    ) -> Result<String, RequestError>;
}

pub struct LlmResponder {
    llm: Arc<dyn LlmProvider>,
    system_prompt: String,
    history_window: usize,
    max_tokens: u32,
}

impl LlmResponder {
    pub fn new(llm: Arc<dyn LlmProvider>, config: &SessionConfig) -> Self {
        Self {
            llm,
            system_prompt: config.system_prompt.clone(),
            history_window: config.history_window,
            max_tokens: config.max_tokens,
        }
    }
}

/// Builds the single user turn sent to the model.
pub fn build_prompt(message: &str, emotion: Option<&str>, history: &[String], window: usize) -> String {
    let recent = &history[history.len().saturating_sub(window)..];

    let mut context = format!("Previous conversation:\n{}", recent.join("\n"));
    if let Some(emotion) = emotion {
        context.push_str(&format!("\nDetected emotion: {}", emotion));
    }

    format!("Context: {}\n\nUser: {}", context, message)
}

#[async_trait]
impl ResponseGenerator for LlmResponder {
    async fn generate(
        &self,
        message: &str,
        emotion: Option<&str>,
        history: &[String],
    ) -> Result<String, RequestError> {
        let prompt = build_prompt(message, emotion, history, self.history_window);
        debug!(provider = self.llm.name(), emotion = ?emotion, "requesting reply");

        let options = ChatOptions {
            max_tokens: Some(self.max_tokens),
            system_prompt: Some(self.system_prompt.clone()),
            ..Default::default()
        };

        let response = self.llm.chat(&[Message::user(prompt)], options).await?;
        let reply = response.content.trim();
        if reply.is_empty() {
            return Err(RequestError::EmptyReply);
        }
        Ok(reply.to_string())
    }
}
