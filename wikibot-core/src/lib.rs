pub mod api;
pub mod chat;
pub mod config;
pub mod credential;
pub mod db;
pub mod documents;
pub mod embeddings;
pub mod error;
pub mod models;

pub use api::ApiResponse;
pub use chat::{AzureChatClient, ChatClientConfig, ChatError, ChatModel};
pub use config::WikibotConfig;
pub use credential::{ClientSecretCredential, CredentialError, TokenCredential};
pub use documents::{Document, DocumentError, DocumentSource, WikipediaClient};
pub use embeddings::{
    AzureEmbeddingClient, EmbeddingBackend, EmbeddingClientConfig, EmbeddingError,
    ADA_002_DIMENSIONS,
};
pub use error::WikibotError;
pub use models::{Role, SimilarityResult, Turn};
