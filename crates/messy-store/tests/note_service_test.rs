//! Note service behaviour with concurrent creates, failures and retries.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::oneshot;

use messy_core::{
    ChatReply, ChatTurn, Error, Note, NoteDraft, NoteId, NoteKey, NoteKind, NotePatch, NoteStatus,
    NotesApi, Result, TempId,
};
use messy_store::{NoteEvent, NoteService, Resolution};

fn server_note(id: &str, temp_id: Option<TempId>, draft: &NoteDraft) -> Note {
    Note {
        id: Some(NoteId::new(id)),
        temp_id,
        title: format!("Saved {}", draft.content),
        content: draft.content.clone(),
        kind: draft.kind.clone(),
        tags: draft.tags.clone(),
        created_at: Utc::now(),
        summary: Some("auto summary".to_string()),
        status: NoteStatus::Ready,
        reminder_datetime: draft.reminder_datetime,
    }
}

/// Backend whose creates complete only when the test releases them.
#[derive(Default)]
struct GatedBackend {
    listing: Vec<Note>,
    gates: Mutex<HashMap<String, oneshot::Receiver<Result<Note>>>>,
}

impl GatedBackend {
    fn gate(&self, content: &str) -> oneshot::Sender<Result<Note>> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().unwrap().insert(content.to_string(), rx);
        tx
    }
}

#[async_trait]
impl NotesApi for GatedBackend {
    async fn list_notes(&self) -> Result<Vec<Note>> {
        Ok(self.listing.clone())
    }

    async fn create_note(&self, _temp_id: TempId, draft: &NoteDraft) -> Result<Note> {
        let gate = self.gates.lock().unwrap().remove(&draft.content);
        match gate {
            Some(rx) => rx
                .await
                .unwrap_or_else(|_| Err(Error::Network("gate dropped".to_string()))),
            None => Err(Error::Request("no gate".to_string())),
        }
    }

    async fn update_note(&self, _id: &NoteId, _patch: &NotePatch) -> Result<()> {
        Ok(())
    }

    async fn delete_note(&self, _id: &NoteId) -> Result<()> {
        Ok(())
    }

    async fn send_chat(&self, _turns: &[ChatTurn]) -> Result<ChatReply> {
        Ok(ChatReply::fallback())
    }
}

/// Backend that fails the first `failures` creates, then succeeds.
struct FlakyBackend {
    failures: AtomicUsize,
    created: AtomicUsize,
    drafts: Mutex<Vec<NoteDraft>>,
    deleted: Mutex<Vec<NoteId>>,
}

impl FlakyBackend {
    fn new(failures: usize) -> Self {
        Self {
            failures: AtomicUsize::new(failures),
            created: AtomicUsize::new(0),
            drafts: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl NotesApi for FlakyBackend {
    async fn list_notes(&self) -> Result<Vec<Note>> {
        Ok(Vec::new())
    }

    async fn create_note(&self, temp_id: TempId, draft: &NoteDraft) -> Result<Note> {
        self.drafts.lock().unwrap().push(draft.clone());
        if self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(Error::Network("connection reset".to_string()));
        }
        let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(server_note(&format!("srv-{}", n), Some(temp_id), draft))
    }

    async fn update_note(&self, _id: &NoteId, _patch: &NotePatch) -> Result<()> {
        Ok(())
    }

    async fn delete_note(&self, id: &NoteId) -> Result<()> {
        self.deleted.lock().unwrap().push(id.clone());
        Ok(())
    }

    async fn send_chat(&self, _turns: &[ChatTurn]) -> Result<ChatReply> {
        Err(Error::Network("offline".to_string()))
    }
}

/// Backend that stored every create twice; both copies echo the temp id.
#[derive(Default)]
struct DoubledBackend {
    created: Mutex<Vec<(TempId, NoteDraft)>>,
}

#[async_trait]
impl NotesApi for DoubledBackend {
    async fn list_notes(&self) -> Result<Vec<Note>> {
        let created = self.created.lock().unwrap();
        Ok(created
            .iter()
            .enumerate()
            .flat_map(|(n, (temp_id, draft))| {
                [
                    server_note(&format!("a{}", n), Some(*temp_id), draft),
                    server_note(&format!("b{}", n), Some(*temp_id), draft),
                ]
            })
            .collect())
    }

    async fn create_note(&self, temp_id: TempId, draft: &NoteDraft) -> Result<Note> {
        let mut created = self.created.lock().unwrap();
        created.push((temp_id, draft.clone()));
        Ok(server_note(&format!("b{}", created.len() - 1), Some(temp_id), draft))
    }

    async fn update_note(&self, _id: &NoteId, _patch: &NotePatch) -> Result<()> {
        Ok(())
    }

    async fn delete_note(&self, _id: &NoteId) -> Result<()> {
        Ok(())
    }

    async fn send_chat(&self, _turns: &[ChatTurn]) -> Result<ChatReply> {
        Ok(ChatReply::fallback())
    }
}

fn keys(notes: &[Note]) -> Vec<String> {
    notes
        .iter()
        .filter_map(Note::key)
        .map(|key| key.to_string())
        .collect()
}

#[tokio::test]
async fn test_concurrent_creates_keep_creation_order() {
    let old = server_note("old", None, &NoteDraft::text("from before"));
    let backend = Arc::new(GatedBackend {
        listing: vec![old],
        ..Default::default()
    });
    let release_first = backend.gate("first");
    let release_second = backend.gate("second");

    let service = NoteService::new(Arc::clone(&backend));
    service.refresh().await.unwrap();

    let first_draft = NoteDraft::text("first");
    let second_draft = NoteDraft::text("second");
    let (p1, h1) = service.spawn_create(first_draft.clone()).unwrap();
    let (p2, h2) = service.spawn_create(second_draft.clone()).unwrap();

    let pending = service.snapshot();
    assert_eq!(pending.len(), 3);
    assert_eq!(pending[0].temp_id, Some(p2));
    assert_eq!(pending[1].temp_id, Some(p1));
    assert!(pending[0].is_processing() && pending[1].is_processing());

    // Second request finishes first.
    release_second
        .send(Ok(server_note("s2", Some(p2), &second_draft)))
        .unwrap();
    assert_eq!(h2.await.unwrap(), Resolution::Reconciled);
    assert!(service.snapshot()[1].is_processing());

    release_first
        .send(Ok(server_note("s1", Some(p1), &first_draft)))
        .unwrap();
    assert_eq!(h1.await.unwrap(), Resolution::Reconciled);

    assert_eq!(keys(&service.snapshot()), vec!["s2", "s1", "old"]);
}

#[tokio::test]
async fn test_refresh_during_create_keeps_placeholder() {
    let backend = Arc::new(GatedBackend {
        listing: vec![server_note("a", None, &NoteDraft::text("a"))],
        ..Default::default()
    });
    let release = backend.gate("slow");
    let service = NoteService::new(Arc::clone(&backend));

    let draft = NoteDraft::text("slow");
    let (temp_id, handle) = service.spawn_create(draft.clone()).unwrap();
    service.refresh().await.unwrap();

    let notes = service.snapshot();
    assert_eq!(notes.len(), 2);
    assert_eq!(notes[0].temp_id, Some(temp_id));

    release
        .send(Ok(server_note("b", Some(temp_id), &draft)))
        .unwrap();
    assert_eq!(handle.await.unwrap(), Resolution::Reconciled);
    assert_eq!(keys(&service.snapshot()), vec!["b", "a"]);
}

#[tokio::test]
async fn test_failed_create_is_kept_then_retried() {
    let service = NoteService::new(Arc::new(FlakyBackend::new(1)));
    let mut events = service.subscribe();

    let (temp_id, resolution) = service
        .create(NoteDraft::text("buy milk").with_tags(["errand"]))
        .await
        .unwrap();
    assert_eq!(resolution, Resolution::Failed);

    let failed = service.find(&NoteKey::Temp(temp_id)).unwrap();
    assert!(matches!(failed.status, NoteStatus::Failed { ref error } if error.contains("connection reset")));
    assert_eq!(service.len(), 1);

    assert_eq!(service.retry(temp_id).await.unwrap(), Resolution::Reconciled);
    let notes = service.snapshot();
    let note = &notes[0];
    assert_eq!(note.id, Some(NoteId::new("srv-1")));
    assert_eq!(note.title, "Saved buy milk");
    assert_eq!(note.status, NoteStatus::Ready);

    let seen: Vec<&'static str> = std::iter::from_fn(|| events.try_recv().ok())
        .map(|e| e.event_type())
        .collect();
    assert_eq!(
        seen,
        vec![
            "note.placeholder_inserted",
            "note.create_failed",
            "note.retrying",
            "note.reconciled"
        ]
    );
}

#[tokio::test]
async fn test_discard_failed_placeholder() {
    let service = NoteService::new(Arc::new(FlakyBackend::new(1)));
    let (temp_id, _) = service.create(NoteDraft::text("oops")).await.unwrap();

    let discarded = service.discard(temp_id).unwrap();
    assert_eq!(discarded.temp_id, Some(temp_id));
    assert!(service.is_empty());
    assert!(matches!(service.retry(temp_id).await, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_update_and_delete_flow() {
    let backend = Arc::new(FlakyBackend::new(0));
    let service = NoteService::new(Arc::clone(&backend));
    let (temp_id, _) = service.create(NoteDraft::text("draft")).await.unwrap();
    assert!(service.find(&NoteKey::Temp(temp_id)).is_none());
    let id = service.snapshot()[0].id.clone().unwrap();

    let updated = service
        .update(
            &id,
            &NotePatch {
                title: Some("Final".to_string()),
                tags: Some(vec!["work".to_string()]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.title, "Final");
    assert_eq!(service.list_filtered("work").len(), 1);

    service.delete(&id).await.unwrap();
    assert!(service.is_empty());
    assert_eq!(*backend.deleted.lock().unwrap(), vec![id]);
}

#[tokio::test]
async fn test_voice_note_reconciles_with_audio() {
    let service = NoteService::new(Arc::new(FlakyBackend::new(0)));
    let draft = NoteDraft::voice("/media/audio/voice-note-1.m4a");

    let (_, resolution) = service.create(draft).await.unwrap();
    assert_eq!(resolution, Resolution::Reconciled);

    let voice = service.list_filtered("Voice");
    assert_eq!(voice.len(), 1);
    assert!(matches!(voice[0].kind, NoteKind::Voice { ref audio_uri } if audio_uri.ends_with(".m4a")));
}

#[tokio::test]
async fn test_events_carry_server_id() {
    let service = NoteService::new(Arc::new(FlakyBackend::new(0)));
    let mut events = service.subscribe();

    let (temp_id, _) = service.create(NoteDraft::text("hi")).await.unwrap();

    let _inserted = events.recv().await.unwrap();
    assert_eq!(
        events.recv().await.unwrap(),
        NoteEvent::Reconciled {
            temp_id,
            note_id: Some(NoteId::new("srv-1"))
        }
    );
}

#[tokio::test]
async fn test_refresh_collapses_duplicate_echoes() {
    let service = NoteService::new(Arc::new(DoubledBackend::default()));
    let (first, _) = service.create(NoteDraft::text("one")).await.unwrap();
    let (second, _) = service.create(NoteDraft::text("two")).await.unwrap();

    assert_eq!(service.refresh().await.unwrap(), 4);

    let notes = service.snapshot();
    assert_eq!(keys(&notes), vec!["a0", "a1"]);
    assert_eq!(notes[0].temp_id, Some(first));
    assert_eq!(notes[1].temp_id, Some(second));

    service.refresh().await.unwrap();
    assert_eq!(service.len(), 2);
}

#[tokio::test]
async fn test_retry_sends_original_capture_time() {
    let backend = Arc::new(FlakyBackend::new(1));
    let service = NoteService::new(Arc::clone(&backend));

    let (temp_id, _) = service.create(NoteDraft::text("later")).await.unwrap();
    let placeholder_time = service.find(&NoteKey::Temp(temp_id)).unwrap().created_at;

    service.retry(temp_id).await.unwrap();
    assert_eq!(
        backend.drafts.lock().unwrap().last().unwrap().captured_at,
        Some(placeholder_time)
    );
}
