//! C10 — LLM Gateway.
//!
//! `LlmGateway::chat_json` transcribes
//! `original_source/app/analysis.py::call_llm_chat_json`: a two-message
//! conversation, a hard response-size cap, outermost-`{...}` extraction, a
//! required-keys schema check, and a corrective retry loop. The client
//! trait/mock-builder shape follows the teacher's `llm_orc::LlmOrcClient` /
//! `MockClient`, swapped from MCP transport to a plain HTTP chat-completions
//! call via `reqwest` (no llm-orc/MCP dependency in this crate's stack).

mod client;
mod extract;

pub use client::{ChatMessage, LlmClient, LlmClientError, MockLlmClient, ReqwestLlmClient};
pub use extract::extract_json;

use crate::retry::sleep_backoff;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("llm client error: {0}")]
    Client(#[from] LlmClientError),
    #[error("response exceeded {0} bytes")]
    ResponseTooLarge(usize),
    #[error("could not extract a JSON object from the response after {0} attempts")]
    NoJsonObject(u32),
    #[error("response missing required key(s): {0:?}")]
    MissingKeys(Vec<String>),
}

/// Model alias resolution: `{chat, mini}` map to deployment names from
/// configuration, mirroring the original's `MODEL_ALIASES` lookup.
#[derive(Debug, Clone)]
pub struct ModelAliases {
    pub chat: String,
    pub mini: String,
}

impl ModelAliases {
    pub fn resolve(&self, alias: &str) -> &str {
        match alias {
            "chat" => &self.chat,
            "mini" => &self.mini,
            other => other,
        }
    }

    /// The "reasoning family" gets only `max_completion_tokens`: no
    /// temperature/top_p/reasoning knobs. Matches the original's allow-list
    /// of model name prefixes (`o1`, `o3`, `o4`, `gpt-5`...).
    pub fn is_reasoning_family(model: &str) -> bool {
        ["o1", "o3", "o4", "gpt-5"].iter().any(|p| model.starts_with(p))
    }
}

pub struct LlmGateway {
    client: Arc<dyn LlmClient>,
    aliases: ModelAliases,
    max_response_bytes: usize,
    max_attempts: u32,
}

impl LlmGateway {
    pub fn new(client: Arc<dyn LlmClient>, aliases: ModelAliases, max_response_bytes: usize, max_attempts: u32) -> Self {
        Self {
            client,
            aliases,
            max_response_bytes,
            max_attempts,
        }
    }

    /// Two-message conversation, parsed as a JSON object with
    /// `required_keys` present at the top level. Retries up to
    /// `max_attempts` times, appending an assistant-echo and a corrective
    /// user turn on parse/schema failure.
    pub async fn chat_json(
        &self,
        system: &str,
        user: &str,
        model_alias: &str,
        required_keys: &[&str],
    ) -> Result<HashMap<String, Value>, LlmError> {
        let model = self.aliases.resolve(model_alias).to_string();
        let mut messages = vec![
            ChatMessage::system(system),
            ChatMessage::user(user),
        ];

        for attempt in 1..=self.max_attempts {
            let completion = self
                .client
                .chat(&model, &messages, ModelAliases::is_reasoning_family(&model))
                .await?;

            if completion.len() > self.max_response_bytes {
                return Err(LlmError::ResponseTooLarge(self.max_response_bytes));
            }

            if let Some(obj) = extract_json(&completion) {
                let missing: Vec<String> = required_keys
                    .iter()
                    .filter(|k| !obj.contains_key(&***k))
                    .map(|k| k.to_string())
                    .collect();
                if missing.is_empty() {
                    return Ok(obj);
                }
                if attempt == self.max_attempts {
                    return Err(LlmError::MissingKeys(missing));
                }
                messages.push(ChatMessage::assistant(&completion));
                messages.push(ChatMessage::user(&format!(
                    "Your last response was missing required key(s): {}. \
                     Reply again with a single JSON object containing all required keys.",
                    missing.join(", ")
                )));
            } else {
                if attempt == self.max_attempts {
                    return Err(LlmError::NoJsonObject(self.max_attempts));
                }
                messages.push(ChatMessage::assistant(&completion));
                messages.push(ChatMessage::user(
                    "Your last response did not contain a parseable JSON object. \
                     Reply again with a single JSON object and nothing else.",
                ));
            }
            sleep_backoff(attempt).await;
        }
        unreachable!("loop always returns by the final attempt")
    }
}

/// Marker trait object alias so call sites don't need to spell out
/// `Arc<dyn LlmClient>` everywhere; kept separate from `client` module to
/// avoid a re-export cycle.
#[async_trait]
pub trait LlmGatewayLike: Send + Sync {
    async fn chat_json(
        &self,
        system: &str,
        user: &str,
        model_alias: &str,
        required_keys: &[&str],
    ) -> Result<HashMap<String, Value>, LlmError>;
}

#[async_trait]
impl LlmGatewayLike for LlmGateway {
    async fn chat_json(
        &self,
        system: &str,
        user: &str,
        model_alias: &str,
        required_keys: &[&str],
    ) -> Result<HashMap<String, Value>, LlmError> {
        LlmGateway::chat_json(self, system, user, model_alias, required_keys).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aliases() -> ModelAliases {
        ModelAliases {
            chat: "gpt-4o".to_string(),
            mini: "gpt-4o-mini".to_string(),
        }
    }

    #[tokio::test]
    async fn resolves_alias_and_parses_clean_json_first_try() {
        let client = Arc::new(MockLlmClient::with_responses(vec![
            "{\"codigo\": \"fatiga\", \"confianza\": 0.8}".to_string(),
        ]));
        let gw = LlmGateway::new(client, aliases(), 32_000, 3);
        let result = gw.chat_json("sys", "user", "mini", &["codigo", "confianza"]).await.unwrap();
        assert_eq!(result["codigo"], "fatiga");
    }

    #[tokio::test]
    async fn retries_with_corrective_turn_on_missing_keys() {
        let client = Arc::new(MockLlmClient::with_responses(vec![
            "{\"codigo\": \"fatiga\"}".to_string(),
            "{\"codigo\": \"fatiga\", \"confianza\": 0.9}".to_string(),
        ]));
        let gw = LlmGateway::new(client, aliases(), 32_000, 3);
        let result = gw.chat_json("sys", "user", "mini", &["codigo", "confianza"]).await.unwrap();
        assert_eq!(result["confianza"], 0.9);
    }

    #[tokio::test]
    async fn exhausting_attempts_on_unparseable_text_returns_error() {
        let client = Arc::new(MockLlmClient::with_responses(vec![
            "not json".to_string(),
            "still not json".to_string(),
            "nope".to_string(),
        ]));
        let gw = LlmGateway::new(client, aliases(), 32_000, 3);
        let err = gw.chat_json("sys", "user", "chat", &["codigo"]).await.unwrap_err();
        assert!(matches!(err, LlmError::NoJsonObject(3)));
    }

    #[tokio::test]
    async fn oversized_response_is_rejected_without_retry() {
        let big = "{".to_string() + &"a".repeat(40_000) + "}";
        let client = Arc::new(MockLlmClient::with_responses(vec![big]));
        let gw = LlmGateway::new(client, aliases(), 32_000, 3);
        let err = gw.chat_json("sys", "user", "chat", &["codigo"]).await.unwrap_err();
        assert!(matches!(err, LlmError::ResponseTooLarge(32_000)));
    }

    #[test]
    fn reasoning_family_detection_matches_prefixes() {
        assert!(ModelAliases::is_reasoning_family("o3-mini"));
        assert!(ModelAliases::is_reasoning_family("gpt-5"));
        assert!(!ModelAliases::is_reasoning_family("gpt-4o"));
    }
}
