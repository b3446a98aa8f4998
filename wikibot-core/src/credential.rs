//! Short-lived access tokens for database authentication
//!
//! When `database.auth = "token"`, every connection presents a freshly issued
//! Microsoft Entra ID access token as its password. Tokens are fetched with the
//! OAuth2 client-credentials grant and never cached.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

use crate::config::IdentityConfig;

/// Environment variable holding the application's client secret
pub const CLIENT_SECRET_ENV: &str = "AZURE_CLIENT_SECRET";

#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_on: DateTime<Utc>,
}

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Identity service rejected the request ({code}): {message}")]
    Rejected { code: u16, message: String },

    #[error("Missing client secret")]
    MissingSecret,
}

#[async_trait]
pub trait TokenCredential: Send + Sync {
    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    error_description: Option<String>,
}

/// Client-credentials grant against `{authority_host}/{tenant}/oauth2/v2.0/token`.
#[derive(Debug, Clone)]
pub struct ClientSecretCredential {
    client: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl ClientSecretCredential {
    pub fn new(
        authority_host: &str,
        tenant_id: &str,
        client_id: &str,
        client_secret: String,
    ) -> Result<Self, CredentialError> {
        if client_secret.is_empty() {
            return Err(CredentialError::MissingSecret);
        }

        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            client,
            token_url: format!(
                "{}/{}/oauth2/v2.0/token",
                authority_host.trim_end_matches('/'),
                tenant_id
            ),
            client_id: client_id.to_string(),
            client_secret,
        })
    }

    pub fn from_config(config: &IdentityConfig) -> Result<Self, CredentialError> {
        Self::new(
            &config.authority_host,
            &config.tenant_id,
            &config.client_id,
            std::env::var(CLIENT_SECRET_ENV).unwrap_or_default(),
        )
    }
}

#[async_trait]
impl TokenCredential for ClientSecretCredential {
    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", scope),
        ];

        let response = self.client.post(&self.token_url).form(&params).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<TokenErrorResponse>(&body)
                .map(|e| match e.error_description {
                    Some(desc) => format!("{}: {}", e.error, desc),
                    None => e.error,
                })
                .unwrap_or(body);
            tracing::error!(code = status.as_u16(), message = %message, "Token request failed");
            return Err(CredentialError::Rejected {
                code: status.as_u16(),
                message,
            });
        }

        let body: TokenResponse = response.json().await?;
        tracing::debug!(expires_in = body.expires_in, "Acquired database access token");

        Ok(AccessToken {
            token: body.access_token,
            expires_on: Utc::now() + chrono::Duration::seconds(body.expires_in),
        })
    }
}
