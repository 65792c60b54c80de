//! Assistant conversation log.

use tracing::debug;

use messy_core::defaults::CHAT_GREETING;
use messy_core::{Author, ChatMessage, NotesApi};

/// Chronological chat log, seeded with the assistant's greeting.
#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self {
            messages: vec![ChatMessage::assistant(CHAT_GREETING)],
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Append the user's message, ask the assistant, append its reply.
    ///
    /// Never fails; a broken request yields the fallback reply.
    pub async fn send<A>(&mut self, api: &A, text: impl Into<String>) -> &ChatMessage
    where
        A: NotesApi + ?Sized,
    {
        self.messages.push(ChatMessage::user(text));
        let reply = api.chat(&self.messages).await;
        debug!(
            messages = self.messages.len(),
            relevant = reply.relevant_notes.len(),
            "Assistant replied"
        );

        let mut message = ChatMessage::new(Author::Assistant, reply.answer);
        message.relevant_notes = reply.relevant_notes;
        self.messages.push(message);
        &self.messages[self.messages.len() - 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use messy_core::{
        ChatReply, ChatTurn, Error, Note, NoteDraft, NoteId, NotePatch, Result, Role, TempId,
    };
    use std::sync::Mutex;

    struct ScriptedApi {
        reply: Option<ChatReply>,
        seen: Mutex<Vec<Vec<ChatTurn>>>,
    }

    #[async_trait]
    impl NotesApi for ScriptedApi {
        async fn list_notes(&self) -> Result<Vec<Note>> {
            Ok(Vec::new())
        }
        async fn create_note(&self, _temp_id: TempId, _draft: &NoteDraft) -> Result<Note> {
            Err(Error::Request("unused".to_string()))
        }
        async fn update_note(&self, _id: &NoteId, _patch: &NotePatch) -> Result<()> {
            Ok(())
        }
        async fn delete_note(&self, _id: &NoteId) -> Result<()> {
            Ok(())
        }
        async fn send_chat(&self, turns: &[ChatTurn]) -> Result<ChatReply> {
            self.seen.lock().unwrap().push(turns.to_vec());
            self.reply
                .clone()
                .ok_or_else(|| Error::Network("unreachable".to_string()))
        }
    }

    #[tokio::test]
    async fn test_conversation_starts_with_greeting() {
        let conversation = Conversation::new();
        assert_eq!(conversation.len(), 1);
        assert_eq!(conversation.messages()[0].author, Author::Assistant);
        assert_eq!(conversation.messages()[0].text, CHAT_GREETING);
    }

    #[tokio::test]
    async fn test_send_appends_both_sides() {
        let api = ScriptedApi {
            reply: Some(ChatReply {
                answer: "You wrote about milk".to_string(),
                relevant_notes: vec![NoteId::new("n1")],
            }),
            seen: Mutex::new(Vec::new()),
        };
        let mut conversation = Conversation::new();

        let reply = conversation.send(&api, "what did I buy?").await;
        assert_eq!(reply.text, "You wrote about milk");
        assert_eq!(reply.relevant_notes, vec![NoteId::new("n1")]);

        assert_eq!(conversation.len(), 3);
        assert_eq!(conversation.messages()[1].author, Author::User);

        let seen = api.seen.lock().unwrap();
        assert_eq!(seen[0].len(), 2);
        assert_eq!(seen[0][1].role, Role::User);
        assert_eq!(seen[0][1].text, "what did I buy?");
    }

    #[tokio::test]
    async fn test_send_window_and_fallback() {
        let api = ScriptedApi {
            reply: None,
            seen: Mutex::new(Vec::new()),
        };
        let mut conversation = Conversation::new();

        for i in 0..4 {
            let reply = conversation.send(&api, format!("q{}", i)).await;
            assert_eq!(reply.text, "something went wrong");
        }

        let seen = api.seen.lock().unwrap();
        let last = seen.last().unwrap();
        assert_eq!(last.len(), 5);
        assert_eq!(last[4].text, "q3");
        assert_eq!(conversation.len(), 9);
    }
}
