use std::sync::OnceLock;

use config::{Config, ConfigError, File, FileFormat};
use regex::Regex;
use serde::Deserialize;

/// Default chat/embedding request timeout
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// The lookup never returns more than this many rows
pub const MAX_TOP_K: usize = 3;

#[derive(Debug, Deserialize, Clone)]
pub struct WikibotConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    pub openai: OpenAiConfig,
    pub chat: ChatConfig,
    pub embedding: EmbeddingConfig,
    pub database: DatabaseConfig,
    pub identity: Option<IdentityConfig>,
    #[serde(default)]
    pub knowledge_base: KnowledgeBaseConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Azure OpenAI resource shared by the chat and embedding deployments.
/// The API key is read from `AZURE_OPENAI_API_KEY`.
#[derive(Debug, Deserialize, Clone)]
pub struct OpenAiConfig {
    pub endpoint: String,
    pub api_version: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    pub deployment: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub max_retries: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    pub deployment: String,
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub max_retries: usize,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseAuth {
    /// Static password from `DATABASE_PASSWORD`
    #[default]
    Password,
    /// Short-lived Entra ID access token fetched per connection
    Token,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    #[serde(default = "default_db_port")]
    pub port: u16,
    pub database: String,
    pub user: String,
    #[serde(default)]
    pub auth: DatabaseAuth,
    #[serde(default = "default_ssl_mode")]
    pub ssl_mode: String,
    #[serde(default = "default_similarity_function")]
    pub similarity_function: String,
}

/// OAuth2 client-credentials settings for token authentication.
/// The client secret is read from `AZURE_CLIENT_SECRET`.
#[derive(Debug, Deserialize, Clone)]
pub struct IdentityConfig {
    #[serde(default = "default_authority_host")]
    pub authority_host: String,
    pub tenant_id: String,
    pub client_id: String,
    #[serde(default = "default_token_scope")]
    pub scope: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct KnowledgeBaseConfig {
    pub wikipedia_url: String,
    pub max_document_chars: usize,
    pub top_k: usize,
    pub user_agent: String,
}

impl Default for KnowledgeBaseConfig {
    fn default() -> Self {
        Self {
            wikipedia_url: "https://en.wikipedia.org".to_string(),
            max_document_chars: 2000,
            top_k: MAX_TOP_K,
            user_agent: format!("wikibot/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    /// Sessions with no turn for this long are dropped
    pub session_idle_seconds: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8766,
            session_idle_seconds: 30 * 60,
        }
    }
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

fn default_dimensions() -> usize {
    crate::embeddings::ADA_002_DIMENSIONS
}

fn default_db_port() -> u16 {
    5432
}

fn default_ssl_mode() -> String {
    "prefer".to_string()
}

fn default_similarity_function() -> String {
    "similar_content_articles".to_string()
}

fn default_authority_host() -> String {
    "https://login.microsoftonline.com".to_string()
}

fn default_token_scope() -> String {
    "https://ossrdbms-aad.database.windows.net/.default".to_string()
}

fn sql_identifier() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$")
            .expect("identifier pattern is valid")
    })
}

impl WikibotConfig {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path))
            .build()?;
        let config: Self = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a config from TOML text (used by tests and embedded defaults).
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;
        let config: Self = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would otherwise fail late, mid-conversation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !sql_identifier().is_match(&self.database.similarity_function) {
            return Err(ConfigError::Message(format!(
                "database.similarity_function '{}' is not a valid SQL identifier",
                self.database.similarity_function
            )));
        }
        if self.database.auth == DatabaseAuth::Token && self.identity.is_none() {
            return Err(ConfigError::Message(
                "database.auth = \"token\" requires an [identity] section".to_string(),
            ));
        }
        if self.knowledge_base.top_k == 0 || self.knowledge_base.top_k > MAX_TOP_K {
            return Err(ConfigError::Message(format!(
                "knowledge_base.top_k must be between 1 and {}",
                MAX_TOP_K
            )));
        }
        if self.knowledge_base.max_document_chars == 0 {
            return Err(ConfigError::Message(
                "knowledge_base.max_document_chars must be positive".to_string(),
            ));
        }
        if self.http.session_idle_seconds == 0 {
            return Err(ConfigError::Message(
                "http.session_idle_seconds must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
