//! Summary composer — grounds the answer in the top-ranked article.

use std::sync::Arc;

use wikibot_core::chat::ChatModel;
use wikibot_core::documents::DocumentSource;
use wikibot_core::models::SimilarityResult;

use crate::prompts;

pub struct SummaryComposer {
    chat: Arc<dyn ChatModel>,
    documents: Arc<dyn DocumentSource>,
    max_document_chars: usize,
}

impl SummaryComposer {
    pub fn new(
        chat: Arc<dyn ChatModel>,
        documents: Arc<dyn DocumentSource>,
        max_document_chars: usize,
    ) -> Self {
        Self {
            chat,
            documents,
            max_document_chars,
        }
    }

    /// Fetch `title`, truncate it, and ask the chat model to answer `question`
    /// from it. Any failure yields a fixed technical-problem message instead.
    pub async fn summarize(&self, question: &str, title: &str) -> String {
        let document = match self.documents.fetch(title).await {
            Ok(doc) => doc,
            Err(e) => {
                tracing::error!(title = %title, error = %e, "Failed to load article");
                return format!("{}: {}", prompts::SUMMARY_FAILED, e);
            }
        };

        tracing::debug!(
            title = %document.title,
            url = document.url.as_deref().unwrap_or("-"),
            chars = document.content.chars().count(),
            "Loaded article"
        );
        let body = document.truncated(self.max_document_chars);
        match self.chat.prompt(&prompts::summarize(question, body)).await {
            Ok(summary) => summary.trim().to_string(),
            Err(e) => {
                tracing::error!(title = %title, error = %e, "Summarization failed");
                format!("{}: {}", prompts::SUMMARY_FAILED, e)
            }
        }
    }
}

/// Numbered markdown citation lines, one per row, starting at 1.
pub fn citations(rows: &[SimilarityResult]) -> String {
    rows.iter()
        .enumerate()
        .map(|(i, row)| format!("{}. [*{}*]({}) \n", i + 1, row.title, row.url))
        .collect()
}

/// Full knowledge-base reply: preamble, summary, then the sources list.
pub fn compose_answer(summary: &str, rows: &[SimilarityResult]) -> String {
    format!(
        "{}{}{}{}",
        prompts::ANSWER_PREFIX,
        summary,
        prompts::SOURCES_HEADER,
        citations(rows)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use wikibot_core::chat::ChatError;
    use wikibot_core::documents::{Document, DocumentError};
    use wikibot_core::models::Turn;

    struct RecordingChat {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChatModel for RecordingChat {
        async fn complete(&self, messages: &[Turn]) -> Result<String, ChatError> {
            self.prompts.lock().unwrap().push(messages[0].content.clone());
            Ok("  台北101高508公尺。 \n".to_string())
        }
    }

    struct StaticDocs(Option<String>);

    #[async_trait]
    impl DocumentSource for StaticDocs {
        async fn fetch(&self, title: &str) -> Result<Document, DocumentError> {
            match &self.0 {
                Some(content) => Ok(Document {
                    title: title.to_string(),
                    url: None,
                    content: content.clone(),
                }),
                None => Err(DocumentError::NotFound(title.to_string())),
            }
        }
    }

    #[tokio::test]
    async fn test_document_truncated_before_prompting() {
        let chat = Arc::new(RecordingChat {
            prompts: Mutex::new(Vec::new()),
        });
        let long = "a".repeat(5000);
        let composer = SummaryComposer::new(chat.clone(), Arc::new(StaticDocs(Some(long))), 2000);

        let summary = composer.summarize("How tall is Taipei 101", "Taipei 101").await;
        assert_eq!(summary, "台北101高508公尺。");

        let prompts = chat.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        let html_line = prompts[0].lines().nth(1).unwrap();
        assert_eq!(html_line, format!("HTML:{}", "a".repeat(2000)));
    }

    #[tokio::test]
    async fn test_fetch_failure_skips_chat_and_reports() {
        let chat = Arc::new(RecordingChat {
            prompts: Mutex::new(Vec::new()),
        });
        let composer = SummaryComposer::new(chat.clone(), Arc::new(StaticDocs(None)), 2000);

        let summary = composer.summarize("q", "Missing").await;
        assert!(summary.starts_with(prompts::SUMMARY_FAILED));
        assert!(chat.prompts.lock().unwrap().is_empty());
    }

    #[test]
    fn test_compose_answer_numbers_citations() {
        let rows: Vec<SimilarityResult> = ["Taipei 101", "Taipei", "Skyscraper"]
            .iter()
            .enumerate()
            .map(|(i, t)| SimilarityResult {
                distance: 0.9 - i as f64 * 0.1,
                title: t.to_string(),
                url: format!("https://simple.wikipedia.org/wiki/{}", t.replace(' ', "_")),
            })
            .collect();

        let answer = compose_answer("summary", &rows);
        assert!(answer.starts_with(prompts::ANSWER_PREFIX));
        assert!(answer.contains("summary\n\n 資料來源: \n"));
        assert!(answer.ends_with(
            "1. [*Taipei 101*](https://simple.wikipedia.org/wiki/Taipei_101) \n\
             2. [*Taipei*](https://simple.wikipedia.org/wiki/Taipei) \n\
             3. [*Skyscraper*](https://simple.wikipedia.org/wiki/Skyscraper) \n"
        ));
    }
}
