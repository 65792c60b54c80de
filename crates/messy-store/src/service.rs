//! Note service: the optimistic store driven by a remote [`NotesApi`].
//!
//! Every store mutation happens under a single write-lock acquisition and
//! the lock is never held across an `.await`, so several creates can be in
//! flight at once. Each is correlated only by its own [`TempId`].

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use messy_core::{
    Error, Note, NoteDraft, NoteId, NoteKey, NotePatch, NotesApi, Result, TagAliases, TempId,
};

use crate::events::{EventBus, NoteEvent};
use crate::store::{NoteStore, Resolution};

pub struct NoteService<A: ?Sized> {
    api: Arc<A>,
    store: Arc<RwLock<NoteStore>>,
    events: EventBus,
    aliases: Arc<TagAliases>,
}

impl<A: ?Sized> Clone for NoteService<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            store: Arc::clone(&self.store),
            events: self.events.clone(),
            aliases: Arc::clone(&self.aliases),
        }
    }
}

impl<A> NoteService<A>
where
    A: NotesApi + ?Sized + 'static,
{
    pub fn new(api: Arc<A>) -> Self {
        Self {
            api,
            store: Arc::new(RwLock::new(NoteStore::new())),
            events: EventBus::default(),
            aliases: Arc::new(TagAliases::default()),
        }
    }

    pub fn with_aliases(mut self, aliases: TagAliases) -> Self {
        self.aliases = Arc::new(aliases);
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<NoteEvent> {
        self.events.subscribe()
    }

    fn read(&self) -> RwLockReadGuard<'_, NoteStore> {
        self.store.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, NoteStore> {
        self.store.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    pub fn snapshot(&self) -> Vec<Note> {
        self.read().snapshot()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn find(&self, key: &NoteKey) -> Option<Note> {
        self.read().find(key).cloned()
    }

    /// Notes matching `filter` (`"All"` or a tag category), display order.
    pub fn list_filtered(&self, filter: &str) -> Vec<Note> {
        self.read()
            .list_filtered(filter, &self.aliases)
            .into_iter()
            .cloned()
            .collect()
    }

    // ------------------------------------------------------------------------
    // Listing
    // ------------------------------------------------------------------------

    /// Replace local state with the server listing, keeping pending placeholders.
    pub async fn refresh(&self) -> Result<usize> {
        let notes = self.api.list_notes().await?;
        let count = notes.len();
        self.write().replace_all(notes);
        info!(result_count = count, "Refreshed notes");
        self.events.emit(NoteEvent::Refreshed { count });
        Ok(count)
    }

    // ------------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------------

    /// Insert the placeholder for `draft` without contacting the server.
    pub fn begin_create(&self, draft: NoteDraft) -> Result<TempId> {
        let kind = draft.kind.name();
        let temp_id = self.write().begin_create(draft)?;
        self.events
            .emit(NoteEvent::PlaceholderInserted { temp_id, kind });
        Ok(temp_id)
    }

    /// Insert a placeholder, create remotely, and settle.
    pub async fn create(&self, draft: NoteDraft) -> Result<(TempId, Resolution)> {
        let draft = draft.stamped();
        let temp_id = self.begin_create(draft.clone())?;
        let resolution = self.settle(temp_id, &draft).await;
        Ok((temp_id, resolution))
    }

    /// Insert a placeholder now; create and settle on a spawned task.
    pub fn spawn_create(&self, draft: NoteDraft) -> Result<(TempId, JoinHandle<Resolution>)> {
        let draft = draft.stamped();
        let temp_id = self.begin_create(draft.clone())?;
        let service = self.clone();
        let handle = tokio::spawn(async move { service.settle(temp_id, &draft).await });
        Ok((temp_id, handle))
    }

    /// Resubmit a failed placeholder.
    pub async fn retry(&self, temp_id: TempId) -> Result<Resolution> {
        let draft = self.write().retry_create(temp_id)?;
        self.events.emit(NoteEvent::Retrying { temp_id });
        Ok(self.settle(temp_id, &draft).await)
    }

    /// Drop a placeholder the user no longer wants.
    pub fn discard(&self, temp_id: TempId) -> Result<Note> {
        let note = self.write().discard(temp_id)?;
        self.events.emit(NoteEvent::Discarded { temp_id });
        Ok(note)
    }

    async fn settle(&self, temp_id: TempId, draft: &NoteDraft) -> Resolution {
        let started = Instant::now();
        let outcome = self.api.create_note(temp_id, draft).await;

        let note_id = outcome.as_ref().ok().and_then(|note| note.id.clone());
        let error = outcome.as_ref().err().map(ToString::to_string);
        let resolution = self.write().resolve_create(temp_id, outcome);

        debug!(
            temp_id = %temp_id,
            ?resolution,
            duration_ms = started.elapsed().as_millis() as u64,
            "Create settled"
        );

        let event = match resolution {
            Resolution::Reconciled => NoteEvent::Reconciled { temp_id, note_id },
            Resolution::Appended => NoteEvent::Appended { temp_id, note_id },
            Resolution::Failed => NoteEvent::CreateFailed {
                temp_id,
                error: error.unwrap_or_else(|| "server note rejected".to_string()),
            },
            Resolution::Orphaned => return resolution,
        };
        self.events.emit(event);
        resolution
    }

    // ------------------------------------------------------------------------
    // Edit / delete
    // ------------------------------------------------------------------------

    /// Update a confirmed note remotely, then locally.
    pub async fn update(&self, id: &NoteId, patch: &NotePatch) -> Result<Note> {
        if patch.is_empty() {
            return Err(Error::InvalidInput("empty note update".to_string()));
        }
        if self.find(&NoteKey::Server(id.clone())).is_none() {
            return Err(Error::NotFound(format!("note {}", id)));
        }

        self.api.update_note(id, patch).await?;
        let note = self.write().apply_patch(id, patch)?.clone();
        self.events.emit(NoteEvent::Updated {
            note_id: id.clone(),
        });
        Ok(note)
    }

    /// Delete a note remotely, then locally.
    pub async fn delete(&self, id: &NoteId) -> Result<()> {
        self.api.delete_note(id).await?;
        if let Err(e) = self.write().remove(id) {
            warn!(note_id = %id, error = %e, "Deleted note was not held locally");
        }
        self.events.emit(NoteEvent::Removed {
            note_id: id.clone(),
        });
        Ok(())
    }
}
