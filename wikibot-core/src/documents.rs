//! Document source — loads the article body that grounds a summary.
//!
//! `WikipediaClient` uses the MediaWiki Action API: a search generator limited
//! to one hit, with plain-text extracts, so a title lookup tolerates redirects
//! and small spelling differences.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

use crate::config::KnowledgeBaseConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub title: String,
    pub url: Option<String>,
    pub content: String,
}

impl Document {
    /// The first `max_chars` characters of the body, never splitting a character.
    pub fn truncated(&self, max_chars: usize) -> &str {
        match self.content.char_indices().nth(max_chars) {
            Some((idx, _)) => &self.content[..idx],
            None => &self.content,
        }
    }
}

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Document source returned HTTP {0}")]
    Status(u16),

    #[error("No document found for '{0}'")]
    NotFound(String),
}

#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn fetch(&self, title: &str) -> Result<Document, DocumentError>;
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    query: Option<QueryPages>,
}

#[derive(Debug, Deserialize)]
struct QueryPages {
    #[serde(default)]
    pages: Vec<Page>,
}

#[derive(Debug, Deserialize)]
struct Page {
    title: String,
    #[serde(default)]
    missing: bool,
    extract: Option<String>,
    fullurl: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WikipediaClient {
    client: Client,
    api_url: String,
}

impl WikipediaClient {
    pub fn new(base_url: &str, user_agent: &str) -> Result<Self, DocumentError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(user_agent)
            .build()?;

        Ok(Self {
            client,
            api_url: format!("{}/w/api.php", base_url.trim_end_matches('/')),
        })
    }

    pub fn from_config(config: &KnowledgeBaseConfig) -> Result<Self, DocumentError> {
        Self::new(&config.wikipedia_url, &config.user_agent)
    }
}

#[async_trait]
impl DocumentSource for WikipediaClient {
    async fn fetch(&self, title: &str) -> Result<Document, DocumentError> {
        let response = self
            .client
            .get(&self.api_url)
            .query(&[
                ("action", "query"),
                ("format", "json"),
                ("formatversion", "2"),
                ("generator", "search"),
                ("gsrsearch", title),
                ("gsrlimit", "1"),
                ("prop", "extracts|info"),
                ("inprop", "url"),
                ("explaintext", "1"),
                ("redirects", "1"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(code = status.as_u16(), title = %title, "Document fetch failed");
            return Err(DocumentError::Status(status.as_u16()));
        }

        let body: QueryResponse = response.json().await?;
        let page = body
            .query
            .and_then(|q| q.pages.into_iter().find(|p| !p.missing))
            .ok_or_else(|| DocumentError::NotFound(title.to_string()))?;

        tracing::debug!(requested = %title, resolved = %page.title, "Fetched document");

        Ok(Document {
            title: page.title,
            url: page.fullurl,
            content: page.extract.unwrap_or_default(),
        })
    }
}
