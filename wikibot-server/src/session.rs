//! Conversation sessions
//!
//! A `Conversation` starts `Uninitialized` and becomes `Active` on its first
//! interaction, at which point the system turn and the greeting are seeded.
//! After that every user turn is followed by exactly one assistant turn, so a
//! transcript holds `2 + 2N` turns after N user inputs. Transcripts live only
//! in memory; a session idle for longer than `http.session_idle_seconds` is
//! discarded by the sweep loop.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;
use wikibot_core::models::{Role, Turn};

use crate::prompts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Uninitialized,
    Active,
}

#[derive(Debug)]
pub struct Conversation {
    id: Uuid,
    state: SessionState,
    turns: Vec<Turn>,
    started_at: DateTime<Utc>,
    last_active_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id,
            state: SessionState::Uninitialized,
            turns: Vec::new(),
            started_at: now,
            last_active_at: now,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn last_active_at(&self) -> DateTime<Utc> {
        self.last_active_at
    }

    /// Seed the system turn and greeting if this is the first interaction.
    pub fn activate(&mut self) {
        if self.state == SessionState::Uninitialized {
            self.turns.push(Turn::system(prompts::SYSTEM_PROMPT));
            self.turns.push(Turn::assistant(prompts::GREETING));
            self.state = SessionState::Active;
        }
    }

    /// Full transcript, including the system turn.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Transcript as shown to the user (system turn hidden).
    pub fn visible_turns(&self) -> &[Turn] {
        match self.turns.first() {
            Some(t) if t.role == Role::System => &self.turns[1..],
            _ => &self.turns,
        }
    }

    /// Number of user inputs processed so far.
    pub fn exchanges(&self) -> usize {
        self.turns.iter().filter(|t| t.role == Role::User).count()
    }

    pub(crate) fn push_user(&mut self, content: &str) {
        self.activate();
        debug_assert!(self.turns.last().map(|t| t.role) != Some(Role::User));
        self.turns.push(Turn::user(content));
        self.last_active_at = Utc::now();
    }

    pub(crate) fn push_assistant(&mut self, content: String) {
        debug_assert_eq!(self.turns.last().map(|t| t.role), Some(Role::User));
        self.turns.push(Turn::assistant(content));
        self.last_active_at = Utc::now();
    }
}

/// In-memory table of live conversations. Each conversation has its own lock,
/// so turns of one session are serialized while sessions stay independent.
#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<Uuid, Arc<Mutex<Conversation>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the session for `id`, creating it (with a fresh id when `id` is
    /// `None` or unknown) if needed.
    pub async fn get_or_create(&self, id: Option<Uuid>) -> (Uuid, Arc<Mutex<Conversation>>) {
        let mut sessions = self.sessions.lock().await;
        if let Some(id) = id {
            if let Some(existing) = sessions.get(&id) {
                return (id, existing.clone());
            }
        }

        let id = Uuid::new_v4();
        let conversation = Arc::new(Mutex::new(Conversation::new(id)));
        sessions.insert(id, conversation.clone());
        tracing::info!(session_id = %id, "Created conversation session");
        (id, conversation)
    }

    pub async fn get(&self, id: Uuid) -> Option<Arc<Mutex<Conversation>>> {
        self.sessions.lock().await.get(&id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }

    /// Drop every session whose last turn is older than `cutoff`. A session
    /// that is mid-turn (its lock is held) is kept. Returns the number removed.
    pub async fn evict_inactive_since(&self, cutoff: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, conversation| match conversation.try_lock() {
            Ok(c) => c.last_active_at() >= cutoff,
            Err(_) => true,
        });

        let removed = before - sessions.len();
        if removed > 0 {
            tracing::info!(removed, remaining = sessions.len(), "Evicted idle sessions");
        }
        removed
    }

    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        self.evict_inactive_since(Utc::now() - max_idle).await
    }
}

/// Periodically evict idle sessions until shutdown. Sweeps once a minute, or
/// more often when the idle limit is shorter than that.
pub async fn run_eviction_loop(
    store: Arc<SessionStore>,
    idle_seconds: u64,
    mut shutdown: broadcast::Receiver<()>,
) {
    let period = tokio::time::Duration::from_secs(idle_seconds.clamp(1, 60));
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let max_idle = Duration::seconds(idle_seconds as i64);

    tracing::info!("Session eviction loop started (idle limit: {}s)", idle_seconds);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                store.evict_idle(max_idle).await;
            }
            _ = shutdown.recv() => {
                tracing::info!("Session eviction loop shutting down");
                break;
            }
        }
    }
}
