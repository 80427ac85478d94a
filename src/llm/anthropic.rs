use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::llm::{models::{ChatOptions, ChatResponse, Message, Usage}, LlmError, LlmProvider};

const API_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    base_url: String,
    default_model: String,
}

impl AnthropicProvider {
    pub fn new(api_key: String, base_url: String, default_model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url,
            default_model,
        }
    }

    // The system prompt travels as a top-level field, not as a message.
    fn request_body(&self, messages: &[Message], options: &ChatOptions) -> Value {
        let model = options.model.as_deref().unwrap_or(&self.default_model);

        let mut system = String::new();
        let turns: Vec<&Message> = messages
            .iter()
            .filter(|m| {
                if m.role == "system" {
                    system.push_str(&m.content);
                    system.push('\n');
                    false
                } else {
                    true
                }
            })
            .collect();

        if let Some(opts_system) = &options.system_prompt {
            system.push_str(opts_system);
        }

        json!({
            "model": model,
            "messages": turns,
            "system": system.trim(),
            "temperature": options.temperature.unwrap_or(0.7),
            "max_tokens": options.max_tokens.unwrap_or(1024),
        })
    }
}

fn parse_reply(json: &Value, model: &str) -> Result<ChatResponse, LlmError> {
    let content = json["content"][0]["text"]
        .as_str()
        .ok_or(LlmError::InvalidResponse)?
        .to_string();

    let usage = json.get("usage").map(|u| Usage {
        input_tokens: u["input_tokens"].as_u64().unwrap_or(0) as u32,
        output_tokens: u["output_tokens"].as_u64().unwrap_or(0) as u32,
    });

    Ok(ChatResponse {
        content,
        model: model.to_string(),
        usage,
    })
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn chat(&self, messages: &[Message], options: ChatOptions) -> Result<ChatResponse, LlmError> {
        let body = self.request_body(messages, &options);
        let model = options.model.as_deref().unwrap_or(&self.default_model);

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Err(LlmError::RateLimited);
            }
            return Err(LlmError::Api(format!("Anthropic Error {}: {}", status, text)));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        parse_reply(&json, model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> AnthropicProvider {
        AnthropicProvider::new("key".into(), "http://localhost".into(), "claude-3-opus-20240229".into())
    }

    #[test]
    fn system_messages_are_lifted_out_of_turns() {
        let messages = vec![
            Message { role: "system".into(), content: "be kind".into() },
            Message::user("hello"),
        ];
        let options = ChatOptions {
            system_prompt: Some("be brief".into()),
            max_tokens: Some(1024),
            ..Default::default()
        };

        let body = provider().request_body(&messages, &options);
        assert_eq!(body["system"], "be kind\nbe brief");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["model"], "claude-3-opus-20240229");
        assert_eq!(body["max_tokens"], 1024);
    }

    #[test]
    fn parses_first_text_block() {
        let json = json!({
            "content": [{"type": "text", "text": "I hear you."}],
            "usage": {"input_tokens": 12, "output_tokens": 4}
        });
        let reply = parse_reply(&json, "m").unwrap();
        assert_eq!(reply.content, "I hear you.");
        assert_eq!(reply.usage.unwrap().output_tokens, 4);

        assert!(matches!(parse_reply(&json!({"content": []}), "m"), Err(LlmError::InvalidResponse)));
    }
}
