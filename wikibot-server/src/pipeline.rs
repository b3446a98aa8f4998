use std::sync::Arc;

use anyhow::Result;
use wikibot_core::chat::{AzureChatClient, ChatClientConfig, ChatModel};
use wikibot_core::db::{ArticleIndex, Connector, PgArticleIndex};
use wikibot_core::documents::{DocumentSource, WikipediaClient};
use wikibot_core::embeddings::{AzureEmbeddingClient, EmbeddingBackend, EmbeddingClientConfig};
use wikibot_core::WikibotConfig;

use crate::subsystems::lookup::SimilarityLookup;
use crate::subsystems::summarize::SummaryComposer;

/// The external services a conversation turn is routed through.
pub struct Pipeline {
    pub chat: Arc<dyn ChatModel>,
    pub lookup: SimilarityLookup,
    pub composer: SummaryComposer,
}

impl Pipeline {
    pub fn new(
        chat: Arc<dyn ChatModel>,
        embedder: Arc<dyn EmbeddingBackend>,
        index: Arc<dyn ArticleIndex>,
        documents: Arc<dyn DocumentSource>,
        top_k: usize,
        max_document_chars: usize,
    ) -> Self {
        Self {
            lookup: SimilarityLookup::new(embedder, index, top_k),
            composer: SummaryComposer::new(chat.clone(), documents, max_document_chars),
            chat,
        }
    }

    /// Build the Azure OpenAI, PostgreSQL and Wikipedia adapters from config.
    pub fn from_config(config: &WikibotConfig, connector: Connector) -> Result<Self> {
        let chat: Arc<dyn ChatModel> =
            Arc::new(AzureChatClient::new(ChatClientConfig::from_config(config))?);
        let embedder: Arc<dyn EmbeddingBackend> =
            Arc::new(AzureEmbeddingClient::new(EmbeddingClientConfig::from_config(config))?);
        let index: Arc<dyn ArticleIndex> = Arc::new(PgArticleIndex::new(connector));
        let documents: Arc<dyn DocumentSource> =
            Arc::new(WikipediaClient::from_config(&config.knowledge_base)?);

        tracing::info!(
            chat = %config.chat.deployment,
            embedding = %config.embedding.deployment,
            dimensions = embedder.dimensions(),
            similarity_function = %config.database.similarity_function,
            wikipedia = %config.knowledge_base.wikipedia_url,
            "Pipeline initialized"
        );

        Ok(Self::new(
            chat,
            embedder,
            index,
            documents,
            config.knowledge_base.top_k,
            config.knowledge_base.max_document_chars,
        ))
    }
}
