use wikibot_core::chat::{ChatError, ChatModel};

use crate::prompts;

/// Translate an utterance into an English keyword sentence for the lookup.
///
/// The stored article embeddings are English, so the raw (often Chinese)
/// utterance is never embedded directly.
pub async fn english_query(chat: &dyn ChatModel, utterance: &str) -> Result<String, ChatError> {
    let reply = chat.prompt(&prompts::reformulate(utterance)).await.map_err(|e| {
        tracing::error!(error = %e, "Query reformulation failed");
        e
    })?;
    Ok(reply.trim().to_string())
}
