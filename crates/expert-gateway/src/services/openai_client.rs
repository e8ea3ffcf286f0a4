//! Chat completion client for answers and topic extraction.
//!
//! Talks to an OpenAI-compatible `/v1/chat/completions` endpoint.
//!
//! # Security
//!
//! - The API key is held as `SecretString` and only exposed when building
//!   the Authorization header
//! - Timeouts prevent hanging connections
//! - Upstream error bodies are logged server-side, never returned to clients

use crate::errors::GatewayError;
use crate::observability::metrics;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{error, instrument, warn};

/// Timeout for a single completion request in seconds.
const OPENAI_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Connect timeout in seconds.
const OPENAI_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Token budget for a full answer.
const ANSWER_MAX_TOKENS: u32 = 800;

/// Token budget for a 1-3 word topic.
const TOPIC_MAX_TOKENS: u32 = 10;

const ANSWER_SYSTEM_PROMPT: &str = "You are an expert assistant.";

const TOPIC_SYSTEM_PROMPT: &str =
    "You are a topic extractor. Output 1-3 words, the main topic only.";

/// Operations the search pipeline needs from a language model.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Free-text (markdown) answer to `query`.
    async fn answer(&self, query: &str) -> Result<String, GatewayError>;

    /// Main topic of `query` in 1-3 words, trimmed. May be empty.
    async fn extract_topic(&self, query: &str) -> Result<String, GatewayError>;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// HTTP client for the chat completion API.
#[derive(Clone)]
pub struct OpenAiClient {
    /// HTTP client with configured timeouts.
    client: Client,

    /// API base URL without trailing slash (e.g., "https://api.openai.com").
    base_url: String,

    /// Bearer API key.
    api_key: SecretString,

    /// Model name sent with every request.
    model: String,
}

impl OpenAiClient {
    /// Create a new chat completion client.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Internal` if the HTTP client cannot be built.
    pub fn new(base_url: String, api_key: SecretString, model: String) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(OPENAI_REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(OPENAI_CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                error!(target: "gw.services.openai", error = %e, "Failed to build HTTP client");
                GatewayError::Internal
            })?;

        Ok(Self {
            client,
            base_url,
            api_key,
            model,
        })
    }

    /// Send one chat completion and return the first choice's content.
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: u32,
        temperature: Option<f32>,
    ) -> Result<String, GatewayError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            max_tokens,
            temperature,
        };

        let start = Instant::now();
        let result = self.send(&url, &body).await;
        metrics::record_upstream_request("llm", result.is_ok(), start.elapsed());
        result
    }

    async fn send(
        &self,
        url: &str,
        body: &ChatCompletionRequest<'_>,
    ) -> Result<String, GatewayError> {
        let response = self
            .client
            .post(url)
            .bearer_auth(self.api_key.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|e| {
                warn!(target: "gw.services.openai", error = %e, "Chat completion request failed");
                GatewayError::UpstreamUnavailable("LLM API is unreachable".to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!(
                target: "gw.services.openai",
                status = %status,
                body = %error_body,
                "LLM API returned an error"
            );
            return Err(GatewayError::UpstreamUnavailable(format!(
                "LLM API returned {}",
                status
            )));
        }

        let parsed: ChatCompletionResponse = response.json().await.map_err(|e| {
            error!(target: "gw.services.openai", error = %e, "Failed to parse LLM response");
            GatewayError::Internal
        })?;

        let choice = parsed.choices.into_iter().next().ok_or_else(|| {
            error!(target: "gw.services.openai", "LLM response contained no choices");
            GatewayError::Internal
        })?;

        Ok(choice.message.content.unwrap_or_default())
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    #[instrument(skip_all, name = "gw.services.openai.answer")]
    async fn answer(&self, query: &str) -> Result<String, GatewayError> {
        let prompt = format!("Answer the following query:\n\n{}", query);
        self.complete(ANSWER_SYSTEM_PROMPT, &prompt, ANSWER_MAX_TOKENS, None)
            .await
    }

    #[instrument(skip_all, name = "gw.services.openai.extract_topic")]
    async fn extract_topic(&self, query: &str) -> Result<String, GatewayError> {
        let prompt = format!(
            "Extract the single main topic (1-3 words) from:\n\n{}",
            query
        );
        let topic = self
            .complete(TOPIC_SYSTEM_PROMPT, &prompt, TOPIC_MAX_TOKENS, Some(0.0))
            .await?;
        Ok(topic.trim().to_string())
    }
}

/// Mock LLM client for tests.
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns canned answers and topics and counts calls.
    pub struct MockLlmClient {
        answer: String,
        topic: String,
        return_error: bool,
        call_count: AtomicUsize,
    }

    impl MockLlmClient {
        /// Mock that returns `answer` and `topic`.
        pub fn new(answer: &str, topic: &str) -> Self {
            Self {
                answer: answer.to_string(),
                topic: topic.to_string(),
                return_error: false,
                call_count: AtomicUsize::new(0),
            }
        }

        /// Mock whose every call fails as an upstream outage.
        pub fn failing() -> Self {
            Self {
                answer: String::new(),
                topic: String::new(),
                return_error: true,
                call_count: AtomicUsize::new(0),
            }
        }

        /// Total calls across both operations.
        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmClient for MockLlmClient {
        async fn answer(&self, _query: &str) -> Result<String, GatewayError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            if self.return_error {
                return Err(GatewayError::UpstreamUnavailable(
                    "Mock LLM client error".to_string(),
                ));
            }
            Ok(self.answer.clone())
        }

        async fn extract_topic(&self, _query: &str) -> Result<String, GatewayError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            if self.return_error {
                return Err(GatewayError::UpstreamUnavailable(
                    "Mock LLM client error".to_string(),
                ));
            }
            Ok(self.topic.trim().to_string())
        }
    }
}
