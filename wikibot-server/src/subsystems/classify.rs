//! Intent classification — decides which path a user turn takes.
//!
//! The hosted chat model is asked to answer with a single letter:
//! - `Y` — a query the knowledge base can answer
//! - `N` — a query the knowledge base cannot answer
//! - `C` — not a query (small talk, requests, chit-chat)
//!
//! Anything else, including a transport failure, is `Unrecognized` and routes
//! to the fallback reply.

use serde::Serialize;
use wikibot_core::chat::ChatModel;

use crate::prompts;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "label", content = "detail", rename_all = "snake_case")]
pub enum Intent {
    Answerable,
    Unanswerable,
    Conversational,
    Unrecognized(String),
}

impl Intent {
    /// Parse the model's raw reply. Surrounding whitespace is ignored; the
    /// remaining text must be exactly one of the three labels.
    pub fn parse(reply: &str) -> Self {
        match reply.trim() {
            "Y" => Intent::Answerable,
            "N" => Intent::Unanswerable,
            "C" => Intent::Conversational,
            other => Intent::Unrecognized(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Intent::Answerable => "Y",
            Intent::Unanswerable => "N",
            Intent::Conversational => "C",
            Intent::Unrecognized(_) => "?",
        }
    }
}

pub async fn classify(chat: &dyn ChatModel, utterance: &str) -> Intent {
    match chat.prompt(&prompts::classify(utterance)).await {
        Ok(reply) => {
            let intent = Intent::parse(&reply);
            if let Intent::Unrecognized(raw) = &intent {
                tracing::warn!(reply = %raw, "Classifier returned an unrecognized label");
            }
            intent
        }
        Err(e) => {
            tracing::error!(error = %e, "Intent classification failed");
            Intent::Unrecognized(format!("classification failed: {}", e))
        }
    }
}
