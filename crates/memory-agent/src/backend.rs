//! OpenAI-compatible inference backend.
//!
//! One `reqwest::Client` serves both capabilities:
//! - `POST {base_url}/chat/completions` for [`TextGenerator`]
//! - `POST {base_url}/embeddings` for [`Embedder`]
//!
//! Works against vLLM, llama.cpp server, or any proxy that speaks the
//! OpenAI wire format.
//!
//! Status mapping: 429 is `RateLimit`, other 4xx are `Rejected`
//! (not retriable), anything else is `Generation` / `Embedding`.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use context_memory::{CapabilityError, Embedder, TextGenerator, Turn};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::AgentConfig;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Chat + embedding client for an OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiCompatBackend {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    chat_model: String,
    embedding_model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiCompatBackend {
    pub fn from_config(config: &AgentConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            chat_model: config.chat_model.clone(),
            embedding_model: config.embedding_model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn post_json<B, R>(
        &self,
        path: &str,
        body: &B,
        on_status: fn(String) -> CapabilityError,
    ) -> Result<R, CapabilityError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let mut request = self.http.post(self.endpoint(path)).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CapabilityError::Transport(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body, on_status));
        }

        response
            .json()
            .await
            .map_err(|e| CapabilityError::MalformedResponse(format!("Failed to parse response: {e}")))
    }
}

#[async_trait]
impl TextGenerator for OpenAiCompatBackend {
    async fn generate(
        &self,
        turns: &[Turn],
        system_message: &str,
    ) -> Result<String, CapabilityError> {
        let request = ChatRequest {
            model: &self.chat_model,
            messages: chat_messages(turns, system_message),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };
        debug!(
            model = %self.chat_model,
            messages = request.messages.len(),
            "chat completion request"
        );

        let response: ChatResponse = self
            .post_json("chat/completions", &request, CapabilityError::Generation)
            .await?;
        extract_reply(response)
    }
}

#[async_trait]
impl Embedder for OpenAiCompatBackend {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CapabilityError> {
        let request = EmbeddingRequest {
            model: &self.embedding_model,
            input: text,
        };
        let response: EmbeddingResponse = self
            .post_json("embeddings", &request, CapabilityError::Embedding)
            .await?;
        extract_embedding(response)
    }
}

/// System message first, then each turn with its role.
pub(crate) fn chat_messages(turns: &[Turn], system_message: &str) -> Vec<ChatMessage> {
    std::iter::once(ChatMessage {
        role: "system".to_string(),
        content: system_message.to_string(),
    })
    .chain(turns.iter().map(|t| ChatMessage {
        role: t.role.to_string(),
        content: t.content.clone(),
    }))
    .collect()
}

fn status_error(
    status: StatusCode,
    body: &str,
    on_status: fn(String) -> CapabilityError,
) -> CapabilityError {
    let detail = format!("API error ({status}): {body}");
    if status == StatusCode::TOO_MANY_REQUESTS {
        CapabilityError::RateLimit(detail)
    } else if status.is_client_error() {
        CapabilityError::Rejected(detail)
    } else {
        on_status(detail)
    }
}

fn extract_reply(response: ChatResponse) -> Result<String, CapabilityError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| CapabilityError::MalformedResponse("no choices in response".into()))?;
    choice
        .message
        .content
        .ok_or_else(|| CapabilityError::MalformedResponse("choice has no content".into()))
}

fn extract_embedding(response: EmbeddingResponse) -> Result<Vec<f32>, CapabilityError> {
    response
        .data
        .into_iter()
        .next()
        .map(|d| d.embedding)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| CapabilityError::MalformedResponse("no embedding in response".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_start_with_system() {
        let turns = vec![
            Turn::user("steve: hi"),
            Turn::assistant("hey"),
            Turn::system("Code output: ok"),
        ];
        let messages = chat_messages(&turns, "be brief");
        let roles: Vec<&str> = messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, ["system", "user", "assistant", "system"]);
        assert_eq!(messages[0].content, "be brief");
        assert_eq!(messages[1].content, "steve: hi");
    }

    #[test]
    fn rate_limit_status_maps_to_rate_limit() {
        let err = status_error(StatusCode::TOO_MANY_REQUESTS, "slow down", CapabilityError::Generation);
        assert!(matches!(err, CapabilityError::RateLimit(_)));
        assert!(err.is_retriable());

        let err = status_error(StatusCode::BAD_GATEWAY, "upstream", CapabilityError::Embedding);
        assert!(matches!(err, CapabilityError::Embedding(ref m) if m.contains("502")));
        assert!(err.is_retriable());
    }

    #[test]
    fn client_errors_are_not_retriable() {
        for status in [
            StatusCode::BAD_REQUEST,
            StatusCode::UNAUTHORIZED,
            StatusCode::NOT_FOUND,
        ] {
            let err = status_error(status, "nope", CapabilityError::Generation);
            assert!(matches!(err, CapabilityError::Rejected(_)), "{status}");
            assert!(!err.is_retriable(), "{status}");
        }
    }

    #[test]
    fn empty_choices_is_malformed() {
        let response: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(
            extract_reply(response),
            Err(CapabilityError::MalformedResponse(_))
        ));
    }

    #[test]
    fn reply_taken_from_first_choice() {
        let response: ChatResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"role": "assistant", "content": "on my way"}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_reply(response).unwrap(), "on my way");
    }

    #[test]
    fn empty_embedding_data_is_malformed() {
        let response: EmbeddingResponse = serde_json::from_str(r#"{"data": []}"#).unwrap();
        assert!(matches!(
            extract_embedding(response),
            Err(CapabilityError::MalformedResponse(_))
        ));

        let response: EmbeddingResponse =
            serde_json::from_str(r#"{"data": [{"embedding": [0.5, 1.5], "index": 0}]}"#).unwrap();
        assert_eq!(extract_embedding(response).unwrap(), vec![0.5, 1.5]);
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let config = AgentConfig {
            base_url: "http://localhost:8080/v1/".into(),
            ..AgentConfig::default()
        };
        let backend = OpenAiCompatBackend::from_config(&config).unwrap();
        assert_eq!(backend.base_url(), "http://localhost:8080/v1");
        assert_eq!(
            backend.endpoint("embeddings"),
            "http://localhost:8080/v1/embeddings"
        );
    }
}
