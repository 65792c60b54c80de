//! Core traits for the Messy Notes client.
//!
//! These traits define the seams between the optimistic store and its
//! collaborators (remote API, credential source), enabling pluggable
//! transports and testability.

use async_trait::async_trait;
use tracing::warn;

use crate::defaults::CHAT_WINDOW;
use crate::error::{Error, Result};
use crate::models::*;

// =============================================================================
// REMOTE API
// =============================================================================

/// Remote notes/chat service.
///
/// Implementations own no note state; they translate intents into requests.
#[async_trait]
pub trait NotesApi: Send + Sync {
    /// Fetch every note, server order.
    async fn list_notes(&self) -> Result<Vec<Note>>;

    /// Create a note. The returned note echoes `temp_id`.
    async fn create_note(&self, temp_id: TempId, draft: &NoteDraft) -> Result<Note>;

    /// Apply a partial update.
    async fn update_note(&self, id: &NoteId, patch: &NotePatch) -> Result<()>;

    /// Delete a note.
    async fn delete_note(&self, id: &NoteId) -> Result<()>;

    /// Send an already-windowed conversation.
    async fn send_chat(&self, turns: &[ChatTurn]) -> Result<ChatReply>;

    /// Ask the assistant about the conversation so far.
    ///
    /// Only the last [`CHAT_WINDOW`] messages are sent. Never fails: any
    /// error yields [`ChatReply::fallback`].
    async fn chat(&self, messages: &[ChatMessage]) -> ChatReply {
        let turns = conversation_window(messages, CHAT_WINDOW);
        match self.send_chat(&turns).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(op = "chat", error = %e, "Chat request failed, using fallback reply");
                ChatReply::fallback()
            }
        }
    }
}

/// Last `window` messages of a chronological log, as request turns.
pub fn conversation_window(messages: &[ChatMessage], window: usize) -> Vec<ChatTurn> {
    let start = messages.len().saturating_sub(window);
    messages[start..].iter().map(ChatTurn::from).collect()
}

// =============================================================================
// CREDENTIALS
// =============================================================================

/// Source of the bearer token attached to every request.
///
/// The sign-in flow lives outside this crate; it plugs in here.
pub trait TokenProvider: Send + Sync {
    fn bearer_token(&self) -> Result<String>;
}

/// Token fixed at construction (from config or a finished sign-in).
#[derive(Clone, Default)]
pub struct StaticToken {
    token: Option<String>,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        let token = token.into();
        Self {
            token: Some(token).filter(|t| !t.trim().is_empty()),
        }
    }

    /// No credentials; every request fails with `Error::Auth`.
    pub fn none() -> Self {
        Self { token: None }
    }
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticToken")
            .field("token", &self.token.as_ref().map(|_| "***"))
            .finish()
    }
}

impl TokenProvider for StaticToken {
    fn bearer_token(&self) -> Result<String> {
        self.token
            .clone()
            .ok_or_else(|| Error::Auth("no session token configured".to_string()))
    }
}
