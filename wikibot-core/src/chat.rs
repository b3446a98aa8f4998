//! Chat-completion client
//!
//! `ChatModel` is the seam every pipeline step talks to. The Azure OpenAI
//! implementation posts the message list to a deployment's `/chat/completions`
//! route with the configured (deterministic by default) sampling.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;

use crate::config::WikibotConfig;
use crate::embeddings::API_KEY_ENV;
use crate::models::Turn;

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send a full message list and return the assistant's text.
    async fn complete(&self, messages: &[Turn]) -> Result<String, ChatError>;

    /// Send a single rendered prompt as one user message.
    async fn prompt(&self, text: &str) -> Result<String, ChatError> {
        self.complete(&[Turn::user(text)]).await
    }
}

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Response contained no message content")]
    EmptyResponse,

    #[error("Missing API key")]
    MissingApiKey,

    #[error("All {attempts} attempts failed, last error: {last}")]
    RetryExhausted { attempts: usize, last: String },
}

#[derive(Debug, Clone)]
pub struct ChatClientConfig {
    pub endpoint: String,
    pub deployment: String,
    pub api_version: String,
    pub api_key: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

impl ChatClientConfig {
    pub fn from_config(config: &WikibotConfig) -> Self {
        Self {
            endpoint: config.openai.endpoint.clone(),
            deployment: config.chat.deployment.clone(),
            api_version: config.openai.api_version.clone(),
            api_key: std::env::var(API_KEY_ENV).unwrap_or_default(),
            temperature: config.chat.temperature,
            max_tokens: config.chat.max_tokens,
            timeout_seconds: config.chat.timeout_seconds,
            max_retries: config.chat.max_retries,
            retry_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    messages: &'a [Turn],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AzureErrorResponse {
    error: Option<AzureErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct AzureErrorDetail {
    message: String,
}

#[derive(Debug, Clone)]
pub struct AzureChatClient {
    client: Client,
    config: ChatClientConfig,
}

impl AzureChatClient {
    pub fn new(config: ChatClientConfig) -> Result<Self, ChatError> {
        if config.api_key.is_empty() {
            return Err(ChatError::MissingApiKey);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        tracing::info!(
            deployment = %config.deployment,
            temperature = config.temperature,
            "Creating Azure OpenAI chat client"
        );

        Ok(Self { client, config })
    }

    fn url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.deployment,
            self.config.api_version
        )
    }

    async fn complete_once(&self, messages: &[Turn]) -> Result<String, ChatError> {
        let request = CompletionRequest {
            messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let response = self
            .client
            .post(self.url())
            .header("api-key", &self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<AzureErrorResponse>(&error_body)
                .ok()
                .and_then(|e| e.error)
                .map(|e| e.message)
                .unwrap_or(error_body);

            tracing::error!(code = status.as_u16(), message = %message, "Chat completion API error");

            return Err(ChatError::Api {
                code: status.as_u16(),
                message,
            });
        }

        let body: CompletionResponse = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(ChatError::EmptyResponse)
    }
}

#[async_trait]
impl ChatModel for AzureChatClient {
    async fn complete(&self, messages: &[Turn]) -> Result<String, ChatError> {
        if self.config.max_retries == 0 {
            return self.complete_once(messages).await;
        }

        let retry_strategy = ExponentialBackoff::from_millis(self.config.retry_delay_ms)
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(self.config.max_retries);

        Retry::spawn(retry_strategy, || self.complete_once(messages))
            .await
            .map_err(|e| ChatError::RetryExhausted {
                attempts: self.config.max_retries + 1,
                last: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(endpoint: &str) -> ChatClientConfig {
        ChatClientConfig {
            endpoint: endpoint.to_string(),
            deployment: "gpt-4o".to_string(),
            api_version: "2024-02-01".to_string(),
            api_key: "test-key".to_string(),
            temperature: 0.0,
            max_tokens: 2000,
            timeout_seconds: 5,
            max_retries: 0,
            retry_delay_ms: 10,
        }
    }

    fn completion(content: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "finish_reason": "stop",
                "message": { "role": "assistant", "content": content }
            }]
        })
    }

    #[tokio::test]
    async fn test_prompt_posts_single_user_message_with_zero_temperature() {
        let mock_server = MockServer::start().await;
        let client = AzureChatClient::new(test_config(&mock_server.uri())).unwrap();

        Mock::given(method("POST"))
            .and(path("/openai/deployments/gpt-4o/chat/completions"))
            .and(query_param("api-version", "2024-02-01"))
            .and(header("api-key", "test-key"))
            .and(body_json(serde_json::json!({
                "messages": [{ "role": "user", "content": "輸入:hello" }],
                "temperature": 0.0,
                "max_tokens": 2000
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("C")))
            .expect(1)
            .mount(&mock_server)
            .await;

        let reply = client.prompt("輸入:hello").await.unwrap();
        assert_eq!(reply, "C");
    }

    #[tokio::test]
    async fn test_complete_replays_full_transcript() {
        let mock_server = MockServer::start().await;
        let client = AzureChatClient::new(test_config(&mock_server.uri())).unwrap();

        Mock::given(method("POST"))
            .and(body_json(serde_json::json!({
                "messages": [
                    { "role": "system", "content": "sys" },
                    { "role": "assistant", "content": "hello" },
                    { "role": "user", "content": "hi" }
                ],
                "temperature": 0.0,
                "max_tokens": 2000
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("hey!")))
            .mount(&mock_server)
            .await;

        let transcript = vec![Turn::system("sys"), Turn::assistant("hello"), Turn::user("hi")];
        assert_eq!(client.complete(&transcript).await.unwrap(), "hey!");
    }

    #[tokio::test]
    async fn test_api_error_message_extracted() {
        let mock_server = MockServer::start().await;
        let client = AzureChatClient::new(test_config(&mock_server.uri())).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "error": { "code": "DeploymentNotFound", "message": "The API deployment for this resource does not exist." }
            })))
            .mount(&mock_server)
            .await;

        match client.prompt("x").await {
            Err(ChatError::Api { code, message }) => {
                assert_eq!(code, 404);
                assert!(message.starts_with("The API deployment"));
            }
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_null_content_is_empty_response() {
        let mock_server = MockServer::start().await;
        let client = AzureChatClient::new(test_config(&mock_server.uri())).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": { "role": "assistant", "content": null } }]
            })))
            .mount(&mock_server)
            .await;

        assert!(matches!(client.prompt("x").await, Err(ChatError::EmptyResponse)));
    }

    #[tokio::test]
    async fn test_retries_when_configured() {
        let mock_server = MockServer::start().await;
        let mut config = test_config(&mock_server.uri());
        config.max_retries = 1;
        let client = AzureChatClient::new(config).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("Y")))
            .mount(&mock_server)
            .await;

        assert_eq!(client.prompt("x").await.unwrap(), "Y");
    }

    #[test]
    fn test_missing_api_key_rejected() {
        let mut config = test_config("http://localhost");
        config.api_key.clear();
        assert!(matches!(AzureChatClient::new(config), Err(ChatError::MissingApiKey)));
    }
}
