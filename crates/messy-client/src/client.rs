//! reqwest-backed notes/chat client.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use messy_core::{
    ChatReply, ChatReplyRecord, ChatTurn, Error, Note, NoteDraft, NoteId, NotePatch, NoteRecord,
    NotesApi, Result, StaticToken, TempId, TokenProvider,
};

use crate::config::ClientConfig;
use crate::error::{to_core_error, ApiErrorCode};
use crate::retry::{Replay, RetryPolicy};

/// HTTP implementation of [`NotesApi`].
pub struct HttpNotesClient {
    client: Client,
    base_url: Url,
    retry: RetryPolicy,
    tokens: Arc<dyn TokenProvider>,
}

impl HttpNotesClient {
    /// Create a client; the bearer token comes from `config.token`.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let tokens: Arc<dyn TokenProvider> = match config.token {
            Some(ref token) => Arc::new(StaticToken::new(token.clone())),
            None => Arc::new(StaticToken::none()),
        };
        Self::with_token_provider(config, tokens)
    }

    /// Create a client that asks `tokens` for credentials on every request.
    pub fn with_token_provider(config: ClientConfig, tokens: Arc<dyn TokenProvider>) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        let base_url = Url::parse(&config.base_url)
            .map_err(|e| Error::Config(format!("Invalid API URL '{}': {}", config.base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "API URL '{}' cannot be a base",
                config.base_url
            )));
        }

        info!(
            "Initializing notes client: url={}, timeout={}s, retries={}",
            base_url, config.timeout_seconds, config.max_retries
        );

        Ok(Self {
            client,
            base_url,
            retry: config.retry_policy(),
            tokens,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env())
    }

    /// `{base}/{segments...}`, each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> Result<RequestBuilder> {
        let token = self.tokens.bearer_token()?;
        Ok(self
            .client
            .request(method, url)
            .bearer_auth(token)
            .header("Content-Type", "application/json"))
    }

    /// Send with bounded retry; returns the first successful response.
    /// `replay` decides which failures may be sent again.
    async fn send<F>(&self, op: &'static str, replay: Replay, build: F) -> Result<Response>
    where
        F: Fn() -> Result<RequestBuilder>,
    {
        let started = Instant::now();
        let mut attempt = 1;
        loop {
            let outcome = match build()?.send().await {
                Ok(resp) if resp.status().is_success() => {
                    debug!(
                        op,
                        attempt,
                        status = resp.status().as_u16(),
                        duration_ms = started.elapsed().as_millis() as u64,
                        "Request succeeded"
                    );
                    return Ok(resp);
                }
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    let code = ApiErrorCode::from_status(status);
                    let body = resp.text().await.unwrap_or_default();
                    (
                        replay.after_status(status),
                        to_core_error(code, status, op, &body),
                    )
                }
                Err(e) => (replay.after_transport(&e), Error::from(e)),
            };

            let (retryable, err) = outcome;
            if !retryable || attempt >= self.retry.max_attempts() {
                warn!(op, attempt, error = %err, "Request failed");
                return Err(err);
            }

            let delay = self.retry.delay_for(attempt);
            debug!(
                op,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Retrying request"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn decode<T: DeserializeOwned>(op: &str, resp: Response) -> Result<T> {
        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| Error::Serialization(format!("{} response: {}", op, e)))
    }
}

#[async_trait]
impl NotesApi for HttpNotesClient {
    async fn list_notes(&self) -> Result<Vec<Note>> {
        let url = self.endpoint(&["notes"]);
        let resp = self
            .send("list_notes", Replay::Idempotent, || {
                self.request(Method::GET, url.clone())
            })
            .await?;
        let records: Vec<NoteRecord> = Self::decode("list_notes", resp).await?;

        let total = records.len();
        let notes: Vec<Note> = records
            .into_iter()
            .filter_map(|record| match Note::try_from(record) {
                Ok(note) => Some(note),
                Err(e) => {
                    warn!(op = "list_notes", error = %e, "Skipping malformed note record");
                    None
                }
            })
            .collect();

        info!(
            op = "list_notes",
            result_count = notes.len(),
            skipped = total - notes.len(),
            "Listed notes"
        );
        Ok(notes)
    }

    async fn create_note(&self, temp_id: TempId, draft: &NoteDraft) -> Result<Note> {
        let url = self.endpoint(&["notes"]);
        let captured_at = draft.captured_at.unwrap_or_else(Utc::now);
        let body = NoteRecord::from_draft(temp_id, draft, captured_at);
        let resp = self
            .send("create_note", Replay::NonIdempotent, || {
                Ok(self.request(Method::POST, url.clone())?.json(&body))
            })
            .await?;
        let mut record: NoteRecord = Self::decode("create_note", resp).await?;
        record.created_at.get_or_insert(captured_at);
        let mut note = Note::try_from(record)?;

        match note.temp_id {
            Some(echoed) if echoed != temp_id => {
                warn!(
                    op = "create_note",
                    temp_id = %temp_id,
                    echoed = %echoed,
                    "Server echoed a different temp id, keeping ours"
                );
                note.temp_id = Some(temp_id);
            }
            Some(_) => {}
            None => note.temp_id = Some(temp_id),
        }

        info!(
            op = "create_note",
            temp_id = %temp_id,
            note_id = ?note.id,
            note_kind = note.kind.name(),
            "Created note"
        );
        Ok(note)
    }

    async fn update_note(&self, id: &NoteId, patch: &NotePatch) -> Result<()> {
        let url = self.endpoint(&["notes", id.as_str()]);
        self.send("update_note", Replay::Idempotent, || {
            Ok(self.request(Method::PUT, url.clone())?.json(patch))
        })
        .await?;
        info!(op = "update_note", note_id = %id, "Updated note");
        Ok(())
    }

    async fn delete_note(&self, id: &NoteId) -> Result<()> {
        let url = self.endpoint(&["notes", id.as_str()]);
        self.send("delete_note", Replay::Idempotent, || {
            self.request(Method::DELETE, url.clone())
        })
        .await?;
        info!(op = "delete_note", note_id = %id, "Deleted note");
        Ok(())
    }

    async fn send_chat(&self, turns: &[ChatTurn]) -> Result<ChatReply> {
        let url = self.endpoint(&["chat"]);
        let resp = self
            .send("chat", Replay::Idempotent, || {
                Ok(self.request(Method::POST, url.clone())?.json(turns))
            })
            .await?;
        let record: ChatReplyRecord = Self::decode("chat", resp).await?;
        let reply = ChatReply::from(record);
        debug!(
            op = "chat",
            turns = turns.len(),
            relevant = reply.relevant_notes.len(),
            "Chat reply received"
        );
        Ok(reply)
    }
}
