//! # OpenAI synthesis backend
//!
//! Implements [`SynthesisBackend`] against the chat completions endpoint
//! (`POST {base_url}/chat/completions`). One request per synthesis unit, one
//! user message per request.
//!
//! - Construct [`OpenAiClient`] from the loaded [`OpenAiSection`]; the API key
//!   comes from `OPENAI_API_KEY` via [`crate::load_config`].
//! - A client without a key still constructs. Every call then fails with
//!   [`SynthesisError::NotConfigured`], which the orchestrator records per unit.

use std::time::Duration;

use async_trait::async_trait;
use conductdoc_core::contract::{SynthesisBackend, SynthesisError, SynthesisRequest};
use serde::{Deserialize, Serialize};

use crate::load_config::OpenAiSection;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

pub struct OpenAiClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl OpenAiClient {
    pub fn from_config(section: &OpenAiSection) -> Result<Self, SynthesisError> {
        let timeout = Duration::from_secs(section.request_timeout_secs.max(1));
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                tracing::error!(error = ?e, "Failed to build HTTP client for synthesis backend");
                SynthesisError::NotConfigured(e.to_string())
            })?;
        let endpoint = format!("{}/chat/completions", section.base_url.trim_end_matches('/'));
        tracing::info!(
            endpoint = %endpoint,
            model = %section.model,
            api_key_set = section.api_key.is_some(),
            "Initialized OpenAiClient"
        );
        Ok(Self {
            http,
            endpoint,
            model: section.model.clone(),
            api_key: section.api_key.clone(),
            timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl SynthesisBackend for OpenAiClient {
    async fn complete(&self, request: SynthesisRequest) -> Result<String, SynthesisError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(SynthesisError::NotConfigured(
                "OPENAI_API_KEY is not set".to_string(),
            ));
        };

        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        tracing::debug!(
            model = %self.model,
            max_tokens = request.max_tokens,
            prompt_chars = request.prompt.len(),
            "Requesting chat completion"
        );

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SynthesisError::Timeout(self.timeout)
                } else {
                    tracing::error!(error = ?e, "Chat completion request failed");
                    SynthesisError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), body = %body, "Chat completion API error");
            return Err(SynthesisError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| SynthesisError::Request(format!("invalid response body: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(SynthesisError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_key_fails_every_call_without_network() {
        let client = OpenAiClient::from_config(&OpenAiSection::default()).unwrap();
        let err = client
            .complete(SynthesisRequest {
                prompt: "hello".into(),
                max_tokens: 10,
                temperature: 0.3,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SynthesisError::NotConfigured(_)));
    }

    #[test]
    fn endpoint_joins_base_url() {
        let section = OpenAiSection {
            base_url: "http://localhost:9999/v1/".into(),
            ..Default::default()
        };
        let client = OpenAiClient::from_config(&section).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:9999/v1/chat/completions");
    }

    #[test]
    fn response_content_is_extracted() {
        let raw = r##"{"choices":[{"message":{"role":"assistant","content":"# Title"}}]}"##;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("# Title"));
    }
}
