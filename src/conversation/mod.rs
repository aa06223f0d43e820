// Conversation module
// Per-session transcripts and the engine that turns a prompt into an answer


use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, warn};

use crate::Result;

pub const SYSTEM_PERSONA: &str = "You are a helpful assistant for the PartSelect website, \
specializing in refrigerator and dishwasher parts. Ignore requests that are not about these \
appliances, their parts, or completing a purchase on PartSelect. Use the user's earlier \
questions and your earlier answers to guide follow-up questions and answers. If you cannot \
answer, ask the user for more information. When a question is about installing or replacing \
a product, also point the user to the installation videos on the product page. Do not \
mention the context you were given in your answers.";

pub const BOOTSTRAP_USER_TURN: &str = "Hi AI, how are you today?";
pub const BOOTSTRAP_ASSISTANT_TURN: &str = "I'm great thank you. How can I help you?";

/// Opening line shown to a new chat session
pub const GREETING: &str =
    "Hello! How can I assist you today with your refrigerator and dishwasher needs?";

/// Returned whenever an answer cannot be generated
pub const FALLBACK_ANSWER: &str = "I am not equipped to answer this question.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One role-tagged message of a transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    #[inline]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Append-only transcript that always opens with the persona and the two bootstrap turns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Default for Conversation {
    #[inline]
    fn default() -> Self {
        Self {
            turns: vec![
                Turn::new(Role::System, SYSTEM_PERSONA),
                Turn::new(Role::User, BOOTSTRAP_USER_TURN),
                Turn::new(Role::Assistant, BOOTSTRAP_ASSISTANT_TURN),
            ],
        }
    }
}

impl Conversation {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Always false; the seeded turns are never removed
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    #[inline]
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    #[inline]
    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }
}

/// Produces the next assistant message for a transcript
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, turns: &[Turn]) -> Result<String>;
}

/// Identifies whose transcript a request belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    #[inline]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    #[inline]
    fn default() -> Self {
        Self::new("default")
    }
}

impl From<&str> for SessionId {
    #[inline]
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for SessionId {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub type SharedConversation = Arc<tokio::sync::Mutex<Conversation>>;

/// Hands out the transcript of a session, creating a seeded one on first use
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn checkout(&self, session: &SessionId) -> SharedConversation;
}

/// Transcripts kept in process memory for the lifetime of the store
#[derive(Debug, Default)]
pub struct MemoryConversationStore {
    sessions: Mutex<HashMap<SessionId, SharedConversation>>,
}

impl MemoryConversationStore {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn session_count(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn checkout(&self, session: &SessionId) -> SharedConversation {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(sessions.entry(session.clone()).or_insert_with(|| {
            debug!("Starting conversation for session {}", session);
            Arc::new(tokio::sync::Mutex::new(Conversation::new()))
        }))
    }
}

/// Sends a session's transcript to the completion provider
pub struct ConversationEngine {
    provider: Arc<dyn CompletionProvider>,
    store: Arc<dyn ConversationStore>,
}

impl ConversationEngine {
    #[inline]
    pub fn new(provider: Arc<dyn CompletionProvider>, store: Arc<dyn ConversationStore>) -> Self {
        Self { provider, store }
    }

    /// Answer `prompt` in the context of the session's transcript.
    ///
    /// The user turn is always recorded. The assistant turn is recorded only when
    /// the provider produced a non-blank reply; otherwise the failure is logged
    /// and [`FALLBACK_ANSWER`] is returned. Requests of one session run one at a time.
    #[inline]
    pub async fn respond(&self, session: &SessionId, prompt: &str) -> String {
        let shared = self.store.checkout(session).await;
        let mut conversation = shared.lock().await;
        conversation.push(Turn::new(Role::User, prompt));

        match self.provider.complete(conversation.turns()).await {
            Ok(reply) if !reply.trim().is_empty() => {
                conversation.push(Turn::new(Role::Assistant, reply.as_str()));
                debug!(
                    "Session {} transcript now has {} turns",
                    session,
                    conversation.len()
                );
                reply
            }
            Ok(_) => {
                warn!("Completion for session {} was blank", session);
                FALLBACK_ANSWER.to_string()
            }
            Err(e) => {
                error!("Completion failed for session {}: {}", session, e);
                FALLBACK_ANSWER.to_string()
            }
        }
    }

    /// Snapshot of the session's transcript
    #[inline]
    pub async fn transcript(&self, session: &SessionId) -> Vec<Turn> {
        let shared = self.store.checkout(session).await;
        let conversation = shared.lock().await;
        conversation.turns().to_vec()
    }
}
