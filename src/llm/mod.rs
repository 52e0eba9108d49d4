//! Chat-completion client abstraction and the Azure OpenAI adapter.
//!
//! Every agent call is a single `(system prompt, user prompt, temperature, max tokens)` request
//! that returns the first choice's text. Calls are single-attempt; transport, status, and decoding
//! failures are all surfaced to the caller without retry.

use crate::settings::{AgentSettings, AzureSettings};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by chat-completion providers.
#[derive(Debug, Error)]
pub enum ChatClientError {
    /// Provider was unreachable or not configured.
    #[error("Language model unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Language model request failed: {0}")]
    GenerationFailed(String),
    /// Provider response could not be decoded or carried no text.
    #[error("Malformed language model response: {0}")]
    InvalidResponse(String),
}

/// One chat-completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    /// System message.
    pub system_prompt: String,
    /// User message.
    pub user_prompt: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Response token budget.
    pub max_tokens: u32,
}

impl ChatRequest {
    /// Build a request with an agent's sampling parameters.
    pub fn for_agent(agent: &AgentSettings, system_prompt: String, user_prompt: String) -> Self {
        Self {
            system_prompt,
            user_prompt,
            temperature: agent.temperature,
            max_tokens: agent.max_tokens,
        }
    }
}

/// Interface implemented by chat-completion providers.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Send one request and return the generated text.
    async fn complete(&self, request: ChatRequest) -> Result<String, ChatClientError>;

    /// Model or deployment answering requests, for display.
    fn model_name(&self) -> &str;
}

/// Azure OpenAI chat-completions client for one deployment.
pub struct AzureOpenAiClient {
    http: Client,
    endpoint: String,
    api_key: String,
    api_version: String,
    deployment: String,
}

impl AzureOpenAiClient {
    /// Build a client from Azure settings.
    pub fn new(settings: &AzureSettings) -> Result<Self, ChatClientError> {
        let http = Client::builder()
            .user_agent(concat!("docqna/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|error| {
                ChatClientError::ProviderUnavailable(format!("failed to build HTTP client: {error}"))
            })?;
        if settings.azure_endpoint.trim().is_empty() {
            tracing::warn!("Azure OpenAI endpoint is not configured; model calls will fail");
        }
        Ok(Self {
            http,
            endpoint: settings.azure_endpoint.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            api_version: settings.api_version.clone(),
            deployment: settings.deployment_name.clone(),
        })
    }

    fn url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions",
            self.endpoint, self.deployment
        )
    }
}

#[derive(Serialize)]
struct CompletionBody<'a> {
    messages: [Message<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl ChatClient for AzureOpenAiClient {
    async fn complete(&self, request: ChatRequest) -> Result<String, ChatClientError> {
        if self.endpoint.is_empty() {
            return Err(ChatClientError::ProviderUnavailable(
                "Azure OpenAI endpoint is not configured".into(),
            ));
        }

        let body = CompletionBody {
            messages: [
                Message {
                    role: "system",
                    content: &request.system_prompt,
                },
                Message {
                    role: "user",
                    content: &request.user_prompt,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        tracing::debug!(
            deployment = %self.deployment,
            temperature = request.temperature,
            max_tokens = request.max_tokens,
            prompt_chars = request.user_prompt.len() + request.system_prompt.len(),
            "Sending chat completion"
        );

        let response = self
            .http
            .post(self.url())
            .query(&[("api-version", self.api_version.as_str())])
            .header("api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|error| {
                ChatClientError::ProviderUnavailable(format!(
                    "failed to reach Azure OpenAI at {}: {error}",
                    self.endpoint
                ))
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ChatClientError::ProviderUnavailable(format!(
                "deployment '{}' not found at {}",
                self.deployment, self.endpoint
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ChatClientError::GenerationFailed(format!(
                "Azure OpenAI returned {status}: {body}"
            )));
        }

        let body: CompletionResponse = response.json().await.map_err(|error| {
            ChatClientError::InvalidResponse(format!("failed to decode completion: {error}"))
        })?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ChatClientError::InvalidResponse("completion carried no text".into()))
    }

    fn model_name(&self) -> &str {
        &self.deployment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};
    use serde_json::json;

    fn client_for(server: &MockServer) -> AzureOpenAiClient {
        AzureOpenAiClient::new(&AzureSettings {
            api_key: "test-key".into(),
            api_version: "2024-02-01".into(),
            azure_endpoint: server.base_url(),
            deployment_name: "gpt-35-turbo".into(),
        })
        .expect("client")
    }

    fn request() -> ChatRequest {
        ChatRequest {
            system_prompt: "You summarize.".into(),
            user_prompt: "Summarize: hello".into(),
            temperature: 0.2,
            max_tokens: 150,
        }
    }

    #[tokio::test]
    async fn sends_messages_and_returns_first_choice() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/openai/deployments/gpt-35-turbo/chat/completions")
                    .query_param("api-version", "2024-02-01")
                    .header("api-key", "test-key")
                    .body_contains(r#"{"role":"system","content":"You summarize."}"#)
                    .body_contains(r#"{"role":"user","content":"Summarize: hello"}"#)
                    .body_contains(r#""max_tokens":150"#);
                then.status(200).json_body(json!({
                    "choices": [{"message": {"role": "assistant", "content": "A greeting."}}]
                }));
            })
            .await;

        let text = client_for(&server).complete(request()).await.expect("completion");

        mock.assert_async().await;
        assert_eq!(text, "A greeting.");
    }

    #[tokio::test]
    async fn error_status_is_reported_with_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(429).body("rate limited");
            })
            .await;

        let error = client_for(&server).complete(request()).await.unwrap_err();

        assert!(
            matches!(&error, ChatClientError::GenerationFailed(message) if message.contains("429") && message.contains("rate limited")),
            "{error}"
        );
    }

    #[tokio::test]
    async fn empty_choices_are_invalid() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(200).json_body(json!({ "choices": [] }));
            })
            .await;

        let error = client_for(&server).complete(request()).await.unwrap_err();
        assert!(matches!(error, ChatClientError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn missing_endpoint_fails_without_network() {
        let client = AzureOpenAiClient::new(&AzureSettings {
            api_key: String::new(),
            api_version: "2024-02-01".into(),
            azure_endpoint: String::new(),
            deployment_name: "gpt-35-turbo".into(),
        })
        .expect("client");

        let error = client.complete(request()).await.unwrap_err();
        assert!(matches!(error, ChatClientError::ProviderUnavailable(_)));
    }
}
