use thiserror::Error;

#[derive(Error, Debug)]
pub enum WikibotError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Chat model error: {0}")]
    Chat(#[from] crate::chat::ChatError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] crate::embeddings::EmbeddingError),

    #[error("Credential error: {0}")]
    Credential(#[from] crate::credential::CredentialError),

    #[error("Document source error: {0}")]
    Document(#[from] crate::documents::DocumentError),

    #[error("Other error: {0}")]
    Other(String),
}
