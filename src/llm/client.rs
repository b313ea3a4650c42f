//! Chat-completion client trait + two backends: `ReqwestLlmClient` (a plain
//! HTTP call to an OpenAI-compatible `/chat/completions` endpoint) and
//! `MockLlmClient`, following the teacher's `LlmOrcClient`/`MockClient`
//! trait-plus-builder shape in `llm_orc.rs` (swapped here from MCP/rmcp
//! transport to `reqwest`, since this crate's LLM Gateway is HTTP-based).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum LlmClientError {
    #[error("llm endpoint unavailable: {0}")]
    Unavailable(String),
    #[error("llm request failed: {0}")]
    RequestFailed(String),
    #[error("llm response had no completion content")]
    EmptyCompletion,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send `messages` to `model` and return the assistant's completion
    /// text. `reasoning_family` strips temperature/top_p and sends only
    /// `max_completion_tokens`, matching the original's model-family
    /// branch.
    async fn chat(&self, model: &str, messages: &[ChatMessage], reasoning_family: bool) -> Result<String, LlmClientError>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// Production client — a plain `reqwest` POST against an OpenAI-compatible
/// chat-completions endpoint.
pub struct ReqwestLlmClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ReqwestLlmClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl LlmClient for ReqwestLlmClient {
    async fn chat(&self, model: &str, messages: &[ChatMessage], reasoning_family: bool) -> Result<String, LlmClientError> {
        let body = if reasoning_family {
            ChatRequest {
                model,
                messages,
                temperature: None,
                max_tokens: None,
                max_completion_tokens: Some(2048),
            }
        } else {
            ChatRequest {
                model,
                messages,
                temperature: Some(0.2),
                max_tokens: Some(2048),
                max_completion_tokens: None,
            }
        };

        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmClientError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(LlmClientError::RequestFailed(format!("{status}: {text}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmClientError::RequestFailed(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(LlmClientError::EmptyCompletion)
    }
}

/// Test double — returns preconfigured completions in order, one per call,
/// following the teacher's `MockClient::with_response` builder pattern.
pub struct MockLlmClient {
    responses: Mutex<Vec<Result<String, LlmClientError>>>,
}

impl MockLlmClient {
    /// Responses are consumed front-to-back across successive `chat` calls.
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(Ok).rev().collect()),
        }
    }

    pub fn failing(error: LlmClientError) -> Self {
        Self {
            responses: Mutex::new(vec![Err(error)]),
        }
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn chat(&self, _model: &str, _messages: &[ChatMessage], _reasoning_family: bool) -> Result<String, LlmClientError> {
        let mut queue = self.responses.lock().unwrap();
        match queue.pop() {
            Some(Ok(text)) => Ok(text),
            Some(Err(e)) => Err(e),
            None => Err(LlmClientError::EmptyCompletion),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_client_returns_responses_in_order() {
        let client = MockLlmClient::with_responses(vec!["first".to_string(), "second".to_string()]);
        assert_eq!(client.chat("m", &[], false).await.unwrap(), "first");
        assert_eq!(client.chat("m", &[], false).await.unwrap(), "second");
    }

    #[tokio::test]
    async fn mock_client_exhaustion_returns_empty_completion() {
        let client = MockLlmClient::with_responses(vec!["only".to_string()]);
        client.chat("m", &[], false).await.unwrap();
        let err = client.chat("m", &[], false).await.unwrap_err();
        assert!(matches!(err, LlmClientError::EmptyCompletion));
    }
}
