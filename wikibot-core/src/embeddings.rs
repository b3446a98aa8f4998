//! Embeddings module — query vectors for the similarity lookup
//!
//! Provides an `EmbeddingBackend` trait and the Azure OpenAI implementation.
//! The stored article vectors were produced with `text-embedding-ada-002`, so the
//! query must be embedded by the same deployment (1536-dim).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;

use crate::config::WikibotConfig;

/// Dimensions of `text-embedding-ada-002` vectors
pub const ADA_002_DIMENSIONS: usize = 1536;

/// Environment variable holding the Azure OpenAI key
pub const API_KEY_ENV: &str = "AZURE_OPENAI_API_KEY";

// ============================================================================
// EmbeddingBackend trait
// ============================================================================

/// Abstraction over embedding providers.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Embed a search query.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Returns the embedding dimension.
    fn dimensions(&self) -> usize;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// Error types
// ============================================================================

/// Embedding generation errors
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Invalid response: expected {expected} dimensions, got {actual}")]
    InvalidDimensions { expected: usize, actual: usize },

    #[error("Missing embedding in response")]
    MissingEmbedding,

    #[error("Missing API key")]
    MissingApiKey,

    #[error("All {attempts} attempts failed, last error: {last}")]
    RetryExhausted { attempts: usize, last: String },
}

// ============================================================================
// Config types
// ============================================================================

/// Azure OpenAI embedding client configuration
#[derive(Debug, Clone)]
pub struct EmbeddingClientConfig {
    pub endpoint: String,
    pub deployment: String,
    pub api_version: String,
    pub api_key: String,
    pub dimensions: usize,
    pub timeout_seconds: u64,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

impl EmbeddingClientConfig {
    pub fn from_config(config: &WikibotConfig) -> Self {
        Self {
            endpoint: config.openai.endpoint.clone(),
            deployment: config.embedding.deployment.clone(),
            api_version: config.openai.api_version.clone(),
            api_key: std::env::var(API_KEY_ENV).unwrap_or_default(),
            dimensions: config.embedding.dimensions,
            timeout_seconds: config.embedding.timeout_seconds,
            max_retries: config.embedding.max_retries,
            retry_delay_ms: 1000,
        }
    }
}

// ============================================================================
// Azure API structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
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

#[derive(Debug, Deserialize)]
struct AzureErrorResponse {
    error: Option<AzureErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct AzureErrorDetail {
    message: String,
}

// ============================================================================
// AzureEmbeddingClient
// ============================================================================

/// Azure OpenAI embedding client — calls the deployment's `/embeddings` route.
#[derive(Debug, Clone)]
pub struct AzureEmbeddingClient {
    client: Client,
    config: EmbeddingClientConfig,
}

impl AzureEmbeddingClient {
    pub fn new(config: EmbeddingClientConfig) -> Result<Self, EmbeddingError> {
        if config.api_key.is_empty() {
            return Err(EmbeddingError::MissingApiKey);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self { client, config })
    }

    fn url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/embeddings?api-version={}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.deployment,
            self.config.api_version
        )
    }

    /// Generate an embedding, retrying up to `max_retries` extra times.
    pub async fn embed_raw(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if self.config.max_retries == 0 {
            return self.embed_once(text).await;
        }

        let retry_strategy = ExponentialBackoff::from_millis(self.config.retry_delay_ms)
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(self.config.max_retries);

        match Retry::spawn(retry_strategy, || self.embed_once(text)).await {
            Ok(vec) => Ok(vec),
            Err(e) => {
                tracing::error!(
                    attempts = self.config.max_retries + 1,
                    error = %e,
                    "All embedding attempts failed"
                );
                Err(EmbeddingError::RetryExhausted {
                    attempts: self.config.max_retries + 1,
                    last: e.to_string(),
                })
            }
        }
    }

    async fn embed_once(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let response = self
            .client
            .post(self.url())
            .header("api-key", &self.config.api_key)
            .json(&EmbeddingRequest { input: text })
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

            tracing::error!(code = status.as_u16(), message = %message, "Embedding API error");

            return Err(EmbeddingError::Api {
                code: status.as_u16(),
                message,
            });
        }

        let body: EmbeddingResponse = response.json().await?;

        let values = body
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or(EmbeddingError::MissingEmbedding)?;

        if values.len() != self.config.dimensions {
            return Err(EmbeddingError::InvalidDimensions {
                expected: self.config.dimensions,
                actual: values.len(),
            });
        }

        Ok(values)
    }
}

#[async_trait]
impl EmbeddingBackend for AzureEmbeddingClient {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_raw(text).await
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    fn name(&self) -> &str {
        "azure-openai"
    }
}

// ============================================================================
// TESTS
// ============================================================================
