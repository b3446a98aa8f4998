//! wikibot HTTP surface
//!
//! Axum-based server exposing the chat form and a JSON API. Each endpoint has a
//! thin axum handler that delegates to a pure inner function, so the logic is
//! testable without axum dispatch machinery.
//!
//! Endpoints:
//! - GET  /               — chat form with the greeting (no session stored yet)
//! - POST /               — form submit (one turn), re-renders the page
//! - POST /chat           — one turn over JSON
//! - GET  /sessions/:id   — transcript of a session
//! - GET  /health         — database and pgvector status
//! - GET  /version        — server version info

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use uuid::Uuid;
use wikibot_core::api::{ApiResponse, ChatRequest};
use wikibot_core::db::Connector;
use wikibot_core::models::Turn;

use crate::page;
use crate::pipeline::Pipeline;
use crate::prompts;
use crate::router::handle_utterance;
use crate::session::SessionStore;

/// Shared state for all HTTP handlers
pub struct HttpState {
    pub pipeline: Pipeline,
    pub sessions: Arc<SessionStore>,
    /// `None` when running without a database (health reports it unconfigured)
    pub connector: Option<Connector>,
}

impl HttpState {
    pub fn new(pipeline: Pipeline, connector: Option<Connector>) -> Self {
        Self {
            pipeline,
            sessions: Arc::new(SessionStore::new()),
            connector,
        }
    }
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/", get(index_handler).post(form_handler))
        .route("/chat", post(chat_handler))
        .route("/sessions/:id", get(transcript_handler))
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    state: Arc<HttpState>,
    addr: String,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("wikibot listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request DTOs
// ============================================================================

#[derive(Debug, Deserialize, Default)]
pub struct PageForm {
    pub session_id: Option<String>,
    #[serde(default)]
    pub message: String,
}

// ============================================================================
// Inner (directly testable) functions
// ============================================================================

/// Inner chat — runs one turn and returns (status_code, envelope).
pub async fn chat_inner(state: &HttpState, req: ChatRequest) -> (StatusCode, serde_json::Value) {
    let message = req.message.trim();
    if message.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            envelope(ApiResponse::err("message field is required")),
        );
    }

    let start = Instant::now();
    let (session_id, conversation) = state.sessions.get_or_create(req.session_id).await;
    let mut conversation = conversation.lock().await;
    conversation.activate();

    let outcome = handle_utterance(&state.pipeline, &mut conversation, message).await;

    (
        StatusCode::OK,
        envelope(ApiResponse::ok(serde_json::json!({
            "session_id": session_id,
            "reply": outcome.reply,
            "route": outcome.route,
            "intent": outcome.intent,
            "english_query": outcome.english_query,
            "matches": outcome.matches,
            "turns": conversation.visible_turns().len(),
            "took_ms": start.elapsed().as_millis() as u64,
        }))),
    )
}

/// Inner form submit — processes a non-empty message and renders the page.
/// A session is only stored once a message is actually submitted.
pub async fn form_inner(state: &HttpState, form: PageForm) -> String {
    let requested = form.session_id.as_deref().and_then(|s| Uuid::parse_str(s).ok());
    let message = form.message.trim();

    if message.is_empty() {
        if let Some(id) = requested {
            if let Some(conversation) = state.sessions.get(id).await {
                let conversation = conversation.lock().await;
                return page::render_page(Some(id), conversation.visible_turns(), None);
            }
        }
        return page::render_page(None, &[Turn::assistant(prompts::GREETING)], None);
    }

    let (session_id, conversation) = state.sessions.get_or_create(requested).await;
    let mut conversation = conversation.lock().await;
    conversation.activate();
    let outcome = handle_utterance(&state.pipeline, &mut conversation, message).await;

    page::render_page(Some(session_id), conversation.visible_turns(), Some(&outcome))
}

/// Inner transcript — visible turns of an existing session.
pub async fn transcript_inner(state: &HttpState, id: Uuid) -> (StatusCode, serde_json::Value) {
    let Some(conversation) = state.sessions.get(id).await else {
        return (
            StatusCode::NOT_FOUND,
            envelope(ApiResponse::err(format!("session {} not found", id))),
        );
    };

    let conversation = conversation.lock().await;
    (
        StatusCode::OK,
        envelope(ApiResponse::ok(serde_json::json!({
            "session_id": id,
            "state": conversation.state(),
            "started_at": conversation.started_at(),
            "last_active_at": conversation.last_active_at(),
            "turns": conversation.visible_turns(),
        }))),
    )
}

/// Inner health check — connects to the database and reports versions.
pub async fn health_inner(connector: Option<&Connector>) -> (StatusCode, serde_json::Value) {
    let Some(connector) = connector else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            serde_json::json!({
                "status": "unhealthy",
                "error": "database not configured",
            }),
        );
    };

    let mut conn = match connector.connect().await {
        Ok(c) => c,
        Err(e) => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                serde_json::json!({
                    "status": "unhealthy",
                    "error": e.to_string(),
                }),
            );
        }
    };

    let pg_ver = match wikibot_core::db::health_check(&mut conn).await {
        Ok(v) => v,
        Err(e) => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                serde_json::json!({
                    "status": "unhealthy",
                    "error": e.to_string(),
                }),
            );
        }
    };

    let pgvector_ver = match wikibot_core::db::check_pgvector(&mut conn).await {
        Ok(v) => v,
        Err(e) => format!("unavailable: {}", e),
    };

    (
        StatusCode::OK,
        serde_json::json!({
            "status": "healthy",
            "version": env!("CARGO_PKG_VERSION"),
            "postgresql": pg_ver,
            "pgvector": pgvector_ver,
        }),
    )
}

/// Inner version — returns version info (pure, no IO).
pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": "wikibot/1",
    })
}

// ============================================================================
// Axum handler wrappers (thin — delegate to inner functions)
// ============================================================================

pub async fn index_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    Html(form_inner(&state, PageForm::default()).await)
}

pub async fn form_handler(
    State(state): State<Arc<HttpState>>,
    Form(form): Form<PageForm>,
) -> impl IntoResponse {
    Html(form_inner(&state, form).await)
}

pub async fn chat_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<ChatRequest>,
) -> impl IntoResponse {
    let (status, body) = chat_inner(&state, req).await;
    (status, Json(body))
}

pub async fn transcript_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let (status, body) = transcript_inner(&state, id).await;
    (status, Json(body))
}

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(state.connector.as_ref()).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

// ============================================================================
// Helpers
// ============================================================================

fn envelope(response: ApiResponse) -> serde_json::Value {
    serde_json::to_value(response).unwrap_or_else(|e| {
        serde_json::json!({ "status": "error", "error": e.to_string() })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_inner_pure() {
        let v = version_inner();
        assert!(v["version"].is_string(), "version must be string");
        assert_eq!(v["protocol"], "wikibot/1");
    }

    #[tokio::test]
    async fn test_health_without_database_is_unavailable() {
        let (status, body) = health_inner(None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "unhealthy");
        assert_eq!(body["error"], "database not configured");
    }

    #[test]
    fn test_envelope_serializes_error() {
        let v = envelope(ApiResponse::err("nope"));
        assert_eq!(v["status"], "error");
        assert_eq!(v["error"], "nope");
        assert!(v["data"].is_null());
    }
}
