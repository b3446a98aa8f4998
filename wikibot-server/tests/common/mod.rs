//! In-process stand-ins for the hosted services, shared by integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use wikibot_core::chat::{ChatError, ChatModel};
use wikibot_core::db::ArticleIndex;
use wikibot_core::documents::{Document, DocumentError, DocumentSource};
use wikibot_core::embeddings::{EmbeddingBackend, EmbeddingError};
use wikibot_core::models::{SimilarityResult, Turn};
use wikibot_core::WikibotError;
use wikibot_server::pipeline::Pipeline;

pub const FREE_REPLY: &str = "今天台北天氣晴朗，記得多喝水！";
pub const SUMMARY: &str = "台北101高508公尺，曾是世界最高的建築。";

/// The kinds of request the pipeline sends to the chat model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Classify,
    Reformulate,
    Summarize,
    Converse,
}

impl PromptKind {
    const ALL: [PromptKind; 4] = [
        PromptKind::Classify,
        PromptKind::Reformulate,
        PromptKind::Summarize,
        PromptKind::Converse,
    ];

    fn of(messages: &[Turn]) -> Self {
        let last = messages.last().map(|t| t.content.as_str()).unwrap_or_default();
        if messages.len() > 1 {
            PromptKind::Converse
        } else if last.contains("請回答一個字母") {
            PromptKind::Classify
        } else if last.contains("翻譯為一句包含關鍵字之英文") {
            PromptKind::Reformulate
        } else if last.starts_with("事實:") {
            PromptKind::Summarize
        } else {
            PromptKind::Converse
        }
    }
}

/// Answers each prompt kind the pipeline sends with a canned reply, or with
/// a 503 for the kinds it is told to fail.
pub struct ScriptedChat {
    pub label: String,
    pub english: String,
    pub fail_on: Vec<PromptKind>,
    pub calls: Mutex<Vec<Vec<Turn>>>,
}

impl ScriptedChat {
    pub fn new(label: &str, english: &str) -> Self {
        Self {
            label: label.to_string(),
            english: english.to_string(),
            fail_on: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every request fails, so the classifier is the first casualty.
    pub fn failing() -> Self {
        Self {
            fail_on: PromptKind::ALL.to_vec(),
            ..Self::new("", "")
        }
    }

    pub fn failing_on(mut self, kind: PromptKind) -> Self {
        self.fail_on.push(kind);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatModel for ScriptedChat {
    async fn complete(&self, messages: &[Turn]) -> Result<String, ChatError> {
        self.calls.lock().unwrap().push(messages.to_vec());
        let kind = PromptKind::of(messages);
        if self.fail_on.contains(&kind) {
            return Err(ChatError::Api {
                code: 503,
                message: "service unavailable".to_string(),
            });
        }

        match kind {
            PromptKind::Classify => Ok(format!("{}\n", self.label)),
            PromptKind::Reformulate => Ok(format!(" {} ", self.english)),
            PromptKind::Summarize => Ok(SUMMARY.to_string()),
            PromptKind::Converse => Ok(FREE_REPLY.to_string()),
        }
    }
}

pub struct RecordingEmbedder {
    pub texts: Mutex<Vec<String>>,
}

impl RecordingEmbedder {
    pub fn new() -> Self {
        Self {
            texts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl EmbeddingBackend for RecordingEmbedder {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.texts.lock().unwrap().push(text.to_string());
        Ok(vec![0.1; 8])
    }

    fn dimensions(&self) -> usize {
        8
    }

    fn name(&self) -> &str {
        "recording"
    }
}

pub struct FixedIndex {
    pub rows: Vec<SimilarityResult>,
}

#[async_trait]
impl ArticleIndex for FixedIndex {
    async fn nearest(
        &self,
        _embedding: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<SimilarityResult>, WikibotError> {
        Ok(self.rows.iter().take(limit).cloned().collect())
    }
}

pub struct FixedDocs;

#[async_trait]
impl DocumentSource for FixedDocs {
    async fn fetch(&self, title: &str) -> Result<Document, DocumentError> {
        Ok(Document {
            title: title.to_string(),
            url: None,
            content: "Taipei 101 is a 508 m skyscraper in Taipei, Taiwan.".to_string(),
        })
    }
}

pub fn taipei_rows() -> Vec<SimilarityResult> {
    vec![
        SimilarityResult {
            distance: 0.8712,
            title: "Taipei".to_string(),
            url: "https://simple.wikipedia.org/wiki/Taipei".to_string(),
        },
        SimilarityResult {
            distance: 0.9243,
            title: "Taipei 101".to_string(),
            url: "https://simple.wikipedia.org/wiki/Taipei_101".to_string(),
        },
        SimilarityResult {
            distance: 0.8521,
            title: "Skyscraper".to_string(),
            url: "https://simple.wikipedia.org/wiki/Skyscraper".to_string(),
        },
    ]
}

pub struct Harness {
    pub chat: Arc<ScriptedChat>,
    pub embedder: Arc<RecordingEmbedder>,
    pub pipeline: Pipeline,
}

pub fn harness(chat: ScriptedChat, rows: Vec<SimilarityResult>) -> Harness {
    let chat = Arc::new(chat);
    let embedder = Arc::new(RecordingEmbedder::new());
    let pipeline = Pipeline::new(
        chat.clone(),
        embedder.clone(),
        Arc::new(FixedIndex { rows }),
        Arc::new(FixedDocs),
        3,
        2000,
    );
    Harness {
        chat,
        embedder,
        pipeline,
    }
}
