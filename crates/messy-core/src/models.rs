//! Data models for notes and chat.
//!
//! Server JSON enters through [`NoteRecord`] and is validated exactly once,
//! by `TryFrom<NoteRecord> for Note`. Everything past that boundary works
//! with the typed [`Note`] / [`NoteKind`] union.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::defaults::{
    CHAT_FALLBACK_ANSWER, IMAGE_TAG, PROCESSING_TITLE, VOICE_NOTE_TITLE, VOICE_TAG,
};
use crate::error::{Error, Result};

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Server-assigned note identifier. Opaque to the client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(String);

impl NoteId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NoteId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Client-generated correlation token for a placeholder note.
///
/// UUIDv7, so tokens created later sort later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TempId(Uuid);

impl TempId {
    /// Generate a fresh token.
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }
}

impl fmt::Display for TempId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::str::FromStr for TempId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| Error::InvalidInput(format!("invalid temp id '{}': {}", s, e)))
    }
}

/// The authoritative lookup key of a note at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NoteKey {
    /// Not yet confirmed by the server.
    Temp(TempId),
    /// Confirmed; the server id is authoritative.
    Server(NoteId),
}

impl fmt::Display for NoteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoteKey::Temp(id) => write!(f, "temp:{}", id),
            NoteKey::Server(id) => write!(f, "{}", id),
        }
    }
}

// =============================================================================
// NOTE
// =============================================================================

/// One photo attached to an image note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteImage {
    /// File URI or `data:` URI.
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

impl NoteImage {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            caption: None,
        }
    }
}

/// Note variant with its type-specific payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NoteKind {
    Text,
    Voice {
        #[serde(rename = "audioUri")]
        audio_uri: String,
    },
    Image {
        images: Vec<NoteImage>,
    },
}

impl NoteKind {
    /// Wire name of the variant.
    pub fn name(&self) -> &'static str {
        match self {
            NoteKind::Text => "text",
            NoteKind::Voice { .. } => "voice",
            NoteKind::Image { .. } => "image",
        }
    }

    /// True when both values are the same variant, payload aside.
    pub fn same_variant(&self, other: &NoteKind) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// Processing state of a note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum NoteStatus {
    /// Create request not yet settled.
    Processing,
    /// Confirmed by the server.
    Ready,
    /// Create request failed; the placeholder awaits retry or discard.
    Failed { error: String },
}

/// A note as held by the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Note {
    pub id: Option<NoteId>,
    pub temp_id: Option<TempId>,
    pub title: String,
    pub content: String,
    #[serde(flatten)]
    pub kind: NoteKind,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub summary: Option<String>,
    pub status: NoteStatus,
    pub reminder_datetime: Option<DateTime<Utc>>,
}

impl Note {
    /// Build the placeholder shown while `draft` is being created.
    pub fn placeholder(temp_id: TempId, draft: &NoteDraft, now: DateTime<Utc>) -> Self {
        Self {
            id: None,
            temp_id: Some(temp_id),
            title: PROCESSING_TITLE.to_string(),
            content: draft.content.clone(),
            kind: draft.kind.clone(),
            tags: draft.tags.clone(),
            created_at: now,
            summary: None,
            status: NoteStatus::Processing,
            reminder_datetime: draft.reminder_datetime,
        }
    }

    /// Authoritative key: the temp id until the server id is known.
    pub fn key(&self) -> Option<NoteKey> {
        match (&self.id, self.temp_id) {
            (Some(id), _) => Some(NoteKey::Server(id.clone())),
            (None, Some(temp)) => Some(NoteKey::Temp(temp)),
            (None, None) => None,
        }
    }

    pub fn is_processing(&self) -> bool {
        matches!(self.status, NoteStatus::Processing)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, NoteStatus::Failed { .. })
    }

    /// Whether the note still waits on its create request (in flight or failed).
    pub fn is_unsettled(&self) -> bool {
        self.id.is_none() && !matches!(self.status, NoteStatus::Ready)
    }

    pub fn has_tag(&self, label: &str) -> bool {
        self.tags.iter().any(|t| t == label)
    }

    /// Replace this placeholder's fields with the server's authoritative note.
    ///
    /// The variant must match; a note's type never changes after creation.
    pub fn reconcile_with(&mut self, server: Note) -> Result<()> {
        if !self.kind.same_variant(&server.kind) {
            return Err(Error::InvalidInput(format!(
                "server returned a {} note for a {} placeholder",
                server.kind.name(),
                self.kind.name()
            )));
        }

        self.id = server.id;
        self.temp_id = server.temp_id.or(self.temp_id);
        self.title = server.title;
        self.content = server.content;
        self.kind = server.kind;
        self.tags = server.tags;
        self.created_at = server.created_at;
        self.summary = server.summary;
        self.reminder_datetime = server.reminder_datetime;
        self.status = NoteStatus::Ready;
        Ok(())
    }

    /// Apply a user edit.
    pub fn apply_patch(&mut self, patch: &NotePatch) {
        if let Some(ref title) = patch.title {
            self.title = title.clone();
        }
        if let Some(ref content) = patch.content {
            self.content = content.clone();
        }
        if let Some(ref tags) = patch.tags {
            self.tags = tags.clone();
        }
        if let Some(ref summary) = patch.summary {
            self.summary = Some(summary.clone());
        }
        if let Some(reminder) = patch.reminder_datetime {
            self.reminder_datetime = Some(reminder);
        }
    }
}

// =============================================================================
// WIRE RECORD
// =============================================================================

/// Note as it appears in the remote API's JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteRecord {
    #[serde(rename = "_id", alias = "id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(alias = "tempid", default, skip_serializing_if = "Option::is_none")]
    pub temp_id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub note_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<NoteImage>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub is_processing: bool,
    #[serde(
        rename = "reminder_datetime",
        alias = "reminderDatetime",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub reminder_datetime: Option<DateTime<Utc>>,
}

impl NoteRecord {
    /// Request body for creating `draft` under correlation token `temp_id`.
    pub fn from_draft(temp_id: TempId, draft: &NoteDraft, created_at: DateTime<Utc>) -> Self {
        let (audio_uri, images) = match &draft.kind {
            NoteKind::Text => (None, None),
            NoteKind::Voice { audio_uri } => (Some(audio_uri.clone()), None),
            NoteKind::Image { images } => (None, Some(images.clone())),
        };

        Self {
            id: None,
            temp_id: Some(temp_id.to_string()),
            title: draft.title.clone().unwrap_or_default(),
            content: draft.content.clone(),
            tags: draft.tags.clone(),
            created_at: Some(created_at),
            note_type: Some(draft.kind.name().to_string()),
            audio_uri,
            images,
            image_uri: None,
            summary: None,
            is_processing: true,
            reminder_datetime: draft.reminder_datetime,
        }
    }

    /// Echoed correlation token, if the server sent a parseable one.
    pub fn echoed_temp_id(&self) -> Option<TempId> {
        self.temp_id.as_deref().and_then(|s| s.parse().ok())
    }

    fn kind(&self) -> Result<NoteKind> {
        match self.note_type.as_deref().unwrap_or("text") {
            "text" => Ok(NoteKind::Text),
            "voice" => {
                let audio_uri = self
                    .audio_uri
                    .clone()
                    .filter(|uri| !uri.is_empty())
                    .ok_or_else(|| {
                        Error::InvalidInput("voice note without audioUri".to_string())
                    })?;
                Ok(NoteKind::Voice { audio_uri })
            }
            "image" => {
                let mut images = self.images.clone().unwrap_or_default();
                if let Some(ref uri) = self.image_uri {
                    if !images.iter().any(|img| &img.content == uri) {
                        images.insert(0, NoteImage::new(uri.clone()));
                    }
                }
                Ok(NoteKind::Image { images })
            }
            other => Err(Error::InvalidInput(format!("unknown note type '{}'", other))),
        }
    }
}

impl TryFrom<NoteRecord> for Note {
    type Error = Error;

    fn try_from(record: NoteRecord) -> Result<Self> {
        let kind = record.kind()?;
        let id = record
            .id
            .clone()
            .filter(|id| !id.is_empty())
            .map(NoteId::new)
            .ok_or_else(|| Error::InvalidInput("server note without id".to_string()))?;
        let temp_id = record.echoed_temp_id();

        Ok(Note {
            id: Some(id),
            temp_id,
            title: record.title,
            content: record.content,
            kind,
            tags: record.tags,
            created_at: record.created_at.unwrap_or_else(Utc::now),
            summary: record.summary,
            status: NoteStatus::Ready,
            reminder_datetime: record.reminder_datetime,
        })
    }
}

// =============================================================================
// DRAFT AND PATCH
// =============================================================================

/// What a capture action submits for creation.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteDraft {
    pub title: Option<String>,
    pub content: String,
    pub kind: NoteKind,
    pub tags: Vec<String>,
    pub reminder_datetime: Option<DateTime<Utc>>,
    /// When the user captured the note; becomes its creation time.
    /// Stamped once, so retries keep the original moment.
    pub captured_at: Option<DateTime<Utc>>,
}

impl NoteDraft {
    /// Typed text note.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            title: None,
            content: content.into(),
            kind: NoteKind::Text,
            tags: Vec::new(),
            reminder_datetime: None,
            captured_at: None,
        }
    }

    /// Voice recording saved at `audio_uri`.
    pub fn voice(audio_uri: impl Into<String>) -> Self {
        Self {
            title: Some(VOICE_NOTE_TITLE.to_string()),
            content: String::new(),
            kind: NoteKind::Voice {
                audio_uri: audio_uri.into(),
            },
            tags: vec![VOICE_TAG.to_string()],
            reminder_datetime: None,
            captured_at: None,
        }
    }

    /// Photo note; the caption becomes the note content.
    pub fn image(images: Vec<NoteImage>, caption: impl Into<String>) -> Self {
        Self {
            title: None,
            content: caption.into(),
            kind: NoteKind::Image { images },
            tags: vec![IMAGE_TAG.to_string()],
            reminder_datetime: None,
            captured_at: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for tag in tags {
            let tag = tag.into();
            let tag = tag.trim();
            if !tag.is_empty() && !self.tags.iter().any(|t| t == tag) {
                self.tags.push(tag.to_string());
            }
        }
        self
    }

    /// Fix the capture time now unless it is already set.
    pub fn stamped(mut self) -> Self {
        self.captured_at.get_or_insert_with(Utc::now);
        self
    }

    pub fn with_reminder(mut self, at: DateTime<Utc>) -> Self {
        self.reminder_datetime = Some(at);
        self
    }

    /// Check the type-specific payload is present.
    pub fn validate(&self) -> Result<()> {
        match &self.kind {
            NoteKind::Text => {
                if self.content.trim().is_empty() {
                    return Err(Error::InvalidInput(
                        "text note content cannot be empty".to_string(),
                    ));
                }
            }
            NoteKind::Voice { audio_uri } => {
                if audio_uri.trim().is_empty() {
                    return Err(Error::InvalidInput(
                        "voice note requires an audio URI".to_string(),
                    ));
                }
            }
            NoteKind::Image { images } => {
                if images.is_empty() {
                    return Err(Error::InvalidInput(
                        "image note requires at least one image".to_string(),
                    ));
                }
                if images.iter().any(|img| img.content.trim().is_empty()) {
                    return Err(Error::InvalidInput("image URI cannot be empty".to_string()));
                }
            }
        }
        Ok(())
    }
}

/// Partial note update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(
        rename = "reminder_datetime",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub reminder_datetime: Option<DateTime<Utc>>,
}

impl NotePatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.tags.is_none()
            && self.summary.is_none()
            && self.reminder_datetime.is_none()
    }
}

// =============================================================================
// CHAT
// =============================================================================

/// Who wrote a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Author {
    User,
    Assistant,
}

/// One message in the assistant conversation. Session-only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub author: Author,
    pub text: String,
    pub created_at: DateTime<Utc>,
    /// Notes the assistant referred to (assistant messages only).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub relevant_notes: Vec<NoteId>,
}

impl ChatMessage {
    pub fn new(author: Author, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            author,
            text: text.into(),
            created_at: Utc::now(),
            relevant_notes: Vec::new(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Author::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Author::Assistant, text)
    }
}

/// Role of a turn in the chat request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// `{role, text}` pair sent to the chat endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub text: String,
}

impl From<&ChatMessage> for ChatTurn {
    fn from(msg: &ChatMessage) -> Self {
        let role = match msg.author {
            Author::User => Role::User,
            Author::Assistant => Role::Assistant,
        };
        Self {
            role,
            text: msg.text.clone(),
        }
    }
}

/// Assistant answer plus the notes it drew on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatReply {
    pub answer: String,
    pub relevant_notes: Vec<NoteId>,
}

impl ChatReply {
    /// Well-formed reply used when the chat endpoint fails.
    pub fn fallback() -> Self {
        Self {
            answer: CHAT_FALLBACK_ANSWER.to_string(),
            relevant_notes: Vec::new(),
        }
    }
}

/// Chat response as sent by the server.
///
/// `relevantNotes` entries are either bare ids or note objects.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReplyRecord {
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub relevant_notes: Vec<serde_json::Value>,
}

impl From<ChatReplyRecord> for ChatReply {
    fn from(record: ChatReplyRecord) -> Self {
        let relevant_notes = record
            .relevant_notes
            .iter()
            .filter_map(|value| match value {
                serde_json::Value::String(id) => Some(NoteId::new(id.clone())),
                serde_json::Value::Object(obj) => obj
                    .get("_id")
                    .or_else(|| obj.get("id"))
                    .and_then(|v| v.as_str())
                    .map(NoteId::from),
                _ => None,
            })
            .collect();

        Self {
            answer: record.answer,
            relevant_notes,
        }
    }
}
