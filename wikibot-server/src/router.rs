//! Turn router — classifies an utterance and dispatches it to one of the three
//! handling paths, recording the exchange in the conversation.

use serde::Serialize;
use wikibot_core::models::{SimilarityResult, Turn};

use crate::pipeline::Pipeline;
use crate::prompts;
use crate::session::Conversation;
use crate::subsystems::classify::{classify, Intent};
use crate::subsystems::reformulate::english_query;
use crate::subsystems::summarize::compose_answer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// Answered from the knowledge base (`Y`)
    KnowledgeBase,
    /// Free-form chat reply (`C`)
    Conversational,
    /// Static "don't know" reply (`N` or unrecognized)
    Fallback,
}

/// What happened while handling one user turn.
#[derive(Debug, Clone, Serialize)]
pub struct RouteOutcome {
    pub route: Route,
    pub intent: Intent,
    pub reply: String,
    pub english_query: Option<String>,
    pub matches: Vec<SimilarityResult>,
}

impl RouteOutcome {
    fn simple(route: Route, intent: Intent, reply: impl Into<String>) -> Self {
        Self {
            route,
            intent,
            reply: reply.into(),
            english_query: None,
            matches: Vec::new(),
        }
    }
}

/// Append the user turn, route it, and append exactly one assistant turn.
pub async fn handle_utterance(
    pipeline: &Pipeline,
    conversation: &mut Conversation,
    utterance: &str,
) -> RouteOutcome {
    conversation.push_user(utterance);
    let outcome = route(pipeline, conversation.turns(), utterance).await;
    conversation.push_assistant(outcome.reply.clone());

    tracing::info!(
        session_id = %conversation.id(),
        route = ?outcome.route,
        label = outcome.intent.label(),
        matches = outcome.matches.len(),
        "Handled user turn"
    );

    outcome
}

/// Decide and run the handling path. `transcript` already ends with the
/// user's turn and is replayed verbatim on the conversational path.
pub async fn route(pipeline: &Pipeline, transcript: &[Turn], utterance: &str) -> RouteOutcome {
    let intent = classify(pipeline.chat.as_ref(), utterance).await;

    match intent {
        Intent::Answerable => answer_from_knowledge_base(pipeline, utterance).await,
        Intent::Conversational => match pipeline.chat.complete(transcript).await {
            Ok(reply) => RouteOutcome::simple(Route::Conversational, intent, reply),
            Err(e) => {
                tracing::error!(error = %e, "Conversational reply failed");
                RouteOutcome::simple(
                    Route::Conversational,
                    intent,
                    format!("{}: {}", prompts::CHAT_UNAVAILABLE, e),
                )
            }
        },
        Intent::Unanswerable | Intent::Unrecognized(_) => {
            RouteOutcome::simple(Route::Fallback, intent, prompts::FALLBACK_REPLY)
        }
    }
}

async fn answer_from_knowledge_base(pipeline: &Pipeline, utterance: &str) -> RouteOutcome {
    let query = match english_query(pipeline.chat.as_ref(), utterance).await {
        Ok(q) => q,
        Err(e) => {
            return RouteOutcome::simple(
                Route::KnowledgeBase,
                Intent::Answerable,
                format!("{}: {}", prompts::CHAT_UNAVAILABLE, e),
            );
        }
    };

    let matches = if query.is_empty() {
        tracing::warn!("Reformulator returned an empty query");
        Vec::new()
    } else {
        pipeline.lookup.lookup(&query).await
    };

    let reply = match matches.first() {
        Some(top) => {
            let summary = pipeline.composer.summarize(&query, &top.title).await;
            compose_answer(&summary, &matches)
        }
        None => prompts::NO_MATCHES_REPLY.to_string(),
    };

    RouteOutcome {
        route: Route::KnowledgeBase,
        intent: Intent::Answerable,
        reply,
        english_query: Some(query),
        matches,
    }
}
