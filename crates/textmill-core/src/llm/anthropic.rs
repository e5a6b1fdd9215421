//! Anthropic messages-API client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::GenerationError;
use crate::llm::{api_error_message, Generator};

const PROVIDER: &str = "anthropic";
const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<UserMessage<'a>>,
}

#[derive(Serialize)]
struct UserMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug)]
pub struct AnthropicGenerator {
    client: reqwest::Client,
    model: String,
    api_key: String,
    api_url: String,
}

impl AnthropicGenerator {
    pub fn new(model: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            model,
            api_key,
            api_url: DEFAULT_API_URL.to_string(),
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }
}

#[async_trait]
impl Generator for AnthropicGenerator {
    async fn generate(
        &self,
        instruction: &str,
        payload: &str,
    ) -> Result<String, GenerationError> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            system: instruction,
            messages: vec![UserMessage {
                role: "user",
                content: payload,
            }],
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|source| GenerationError::Transport {
                provider: PROVIDER,
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GenerationError::Api {
                provider: PROVIDER,
                status: status.as_u16(),
                message: api_error_message(&text),
            });
        }

        let parsed: MessagesResponse =
            response
                .json()
                .await
                .map_err(|source| GenerationError::Transport {
                    provider: PROVIDER,
                    source,
                })?;

        parsed
            .content
            .into_iter()
            .find_map(|block| block.text)
            .filter(|text| !text.is_empty())
            .ok_or(GenerationError::EmptyResponse { provider: PROVIDER })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let body = MessagesRequest {
            model: "claude-sonnet-4-20250514",
            max_tokens: MAX_TOKENS,
            system: "summarize",
            messages: vec![UserMessage {
                role: "user",
                content: "### file:a.md\n\ntext",
            }],
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["model"], "claude-sonnet-4-20250514");
        assert_eq!(value["max_tokens"], 4096);
        assert_eq!(value["system"], "summarize");
        assert_eq!(value["messages"][0]["role"], "user");
    }

    #[test]
    fn test_response_extraction_skips_non_text_blocks() {
        let raw = r#"{"content": [{"type": "thinking"}, {"type": "text", "text": "done"}]}"#;
        let parsed: MessagesResponse = serde_json::from_str(raw).unwrap();
        let text = parsed.content.into_iter().find_map(|b| b.text).unwrap();
        assert_eq!(text, "done");
    }
}
