//! Ordered note collection with optimistic create placeholders.
//!
//! Notes are kept most-recent-first. A create inserts a placeholder at the
//! head, keyed by a fresh [`TempId`]; when the remote create settles, the
//! placeholder is found through the temp-id index and overwritten in place
//! with the server's note. Nothing here scans the collection to correlate.

use std::collections::{HashMap, VecDeque};

use chrono::Utc;
use tracing::{debug, warn};

use messy_core::{
    Error, Note, NoteDraft, NoteId, NoteKey, NotePatch, NoteStatus, Result, TagAliases, TempId,
};

/// Stable handle of a stored note; never reused.
type NoteSlot = u64;

#[derive(Debug)]
struct Entry {
    note: Note,
    /// Submitted draft, kept until the create settles so it can be retried.
    draft: Option<NoteDraft>,
}

/// Outcome of settling a create request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Placeholder overwritten in place with the server's note.
    Reconciled,
    /// No placeholder matched; the server note was appended at the end.
    Appended,
    /// Placeholder kept and marked failed.
    Failed,
    /// A failure arrived for a token the store no longer knows.
    Orphaned,
}

/// Most-recent-first note collection.
#[derive(Debug, Default)]
pub struct NoteStore {
    entries: HashMap<NoteSlot, Entry>,
    order: VecDeque<NoteSlot>,
    by_temp: HashMap<TempId, NoteSlot>,
    by_id: HashMap<NoteId, NoteSlot>,
    /// Temp ids of creates that already settled into a server note.
    settled: HashMap<TempId, NoteSlot>,
    next_slot: NoteSlot,
}

impl NoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with server notes in listing order.
    pub fn with_notes(notes: impl IntoIterator<Item = Note>) -> Self {
        let mut store = Self::new();
        for note in notes {
            store.push_back(note, None);
        }
        store
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Note at `index` in display order.
    pub fn get(&self, index: usize) -> Option<&Note> {
        self.order
            .get(index)
            .and_then(|slot| self.entries.get(slot))
            .map(|e| &e.note)
    }

    pub fn find(&self, key: &NoteKey) -> Option<&Note> {
        let slot = match key {
            NoteKey::Temp(temp) => self.by_temp.get(temp),
            NoteKey::Server(id) => self.by_id.get(id),
        }?;
        self.entries.get(slot).map(|e| &e.note)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Note> + '_ {
        self.order
            .iter()
            .filter_map(move |slot| self.entries.get(slot))
            .map(|e| &e.note)
    }

    /// Owned copy of the current sequence, for rendering.
    pub fn snapshot(&self) -> Vec<Note> {
        self.iter().cloned().collect()
    }

    /// Insert a processing placeholder for `draft` at the head.
    ///
    /// Returns the correlation token the create request must carry.
    /// The draft is stamped with its capture time, which retries reuse.
    pub fn begin_create(&mut self, draft: NoteDraft) -> Result<TempId> {
        draft.validate()?;
        let draft = draft.stamped();
        let captured_at = draft.captured_at.unwrap_or_else(Utc::now);

        let mut temp_id = TempId::generate();
        while self.by_temp.contains_key(&temp_id) {
            temp_id = TempId::generate();
        }

        let note = Note::placeholder(temp_id, &draft, captured_at);
        let slot = self.alloc(note, Some(draft));
        self.order.push_front(slot);
        self.by_temp.insert(temp_id, slot);

        debug!(temp_id = %temp_id, len = self.len(), "Inserted placeholder");
        Ok(temp_id)
    }

    /// Settle the create request correlated by `temp_id`.
    pub fn resolve_create(&mut self, temp_id: TempId, outcome: Result<Note>) -> Resolution {
        let slot = self.by_temp.get(&temp_id).copied();
        match (slot, outcome) {
            (Some(slot), Ok(server)) => self.reconcile(slot, temp_id, server),
            (None, Ok(server)) => self.append_unmatched(temp_id, server),
            (Some(slot), Err(err)) => {
                if let Some(entry) = self.entries.get_mut(&slot) {
                    entry.note.status = NoteStatus::Failed {
                        error: err.to_string(),
                    };
                }
                warn!(temp_id = %temp_id, error = %err, "Create failed, placeholder kept");
                Resolution::Failed
            }
            (None, Err(err)) => {
                warn!(temp_id = %temp_id, error = %err, "Create failed for unknown placeholder");
                Resolution::Orphaned
            }
        }
    }

    fn reconcile(&mut self, slot: NoteSlot, temp_id: TempId, server: Note) -> Resolution {
        let server_id = server.id.clone();
        let Some(entry) = self.entries.get_mut(&slot) else {
            return Resolution::Orphaned;
        };

        if let Err(err) = entry.note.reconcile_with(server) {
            entry.note.status = NoteStatus::Failed {
                error: err.to_string(),
            };
            warn!(temp_id = %temp_id, error = %err, "Rejected server note");
            return Resolution::Failed;
        }
        entry.draft = None;

        self.by_temp.remove(&temp_id);
        self.settled.insert(temp_id, slot);
        if let Some(id) = server_id {
            // A note already listed under this id (e.g. from a refresh) is superseded.
            if let Some(stale) = self.by_id.insert(id, slot) {
                if stale != slot {
                    self.drop_slot(stale);
                }
            }
        }

        debug!(temp_id = %temp_id, "Reconciled placeholder");
        Resolution::Reconciled
    }

    fn append_unmatched(&mut self, temp_id: TempId, server: Note) -> Resolution {
        if let Some(slot) = server.id.as_ref().and_then(|id| self.by_id.get(id)).copied() {
            if let Some(entry) = self.entries.get_mut(&slot) {
                entry.note = server;
            }
            debug!(temp_id = %temp_id, "Unmatched create already listed, updated in place");
            return Resolution::Reconciled;
        }
        if self.settled.contains_key(&temp_id) {
            warn!(
                temp_id = %temp_id,
                note_id = ?server.id,
                "Create already settled under another id, ignored"
            );
            return Resolution::Reconciled;
        }

        self.push_back(server, None);
        warn!(temp_id = %temp_id, "No placeholder for create, appended");
        Resolution::Appended
    }

    /// Put a failed placeholder back into processing and hand out its draft.
    pub fn retry_create(&mut self, temp_id: TempId) -> Result<NoteDraft> {
        let entry = self
            .by_temp
            .get(&temp_id)
            .and_then(|slot| self.entries.get_mut(slot))
            .ok_or_else(|| Error::NotFound(format!("placeholder {}", temp_id)))?;

        if !entry.note.is_failed() {
            return Err(Error::InvalidInput(format!(
                "placeholder {} has not failed",
                temp_id
            )));
        }
        let draft = entry
            .draft
            .clone()
            .ok_or_else(|| Error::InvalidInput(format!("placeholder {} has no draft", temp_id)))?;

        entry.note.status = NoteStatus::Processing;
        Ok(draft)
    }

    /// Remove a placeholder that is no longer wanted.
    pub fn discard(&mut self, temp_id: TempId) -> Result<Note> {
        let slot = self
            .by_temp
            .get(&temp_id)
            .copied()
            .ok_or_else(|| Error::NotFound(format!("placeholder {}", temp_id)))?;
        self.drop_slot(slot)
            .ok_or_else(|| Error::NotFound(format!("placeholder {}", temp_id)))
    }

    /// Notes matching a tag filter, in display order.
    ///
    /// `"All"` returns everything; other filters go through the alias table.
    pub fn list_filtered<'a>(&'a self, filter: &str, aliases: &TagAliases) -> Vec<&'a Note> {
        if TagAliases::is_all(filter) {
            return self.iter().collect();
        }
        let label = aliases.resolve(filter);
        self.iter().filter(|note| note.has_tag(label)).collect()
    }

    /// Install a fresh server listing.
    ///
    /// Unsettled placeholders stay at the head. A listed note that echoes a
    /// placeholder's temp id settles that placeholder instead of duplicating it.
    /// Only the first listed note per echoed temp id is kept.
    pub fn replace_all(&mut self, notes: Vec<Note>) {
        let pending: Vec<NoteSlot> = self
            .order
            .iter()
            .copied()
            .filter(|slot| {
                self.entries
                    .get(slot)
                    .is_some_and(|e| e.note.is_unsettled())
            })
            .collect();

        let mut kept = HashMap::with_capacity(pending.len());
        for slot in &pending {
            if let Some(entry) = self.entries.remove(slot) {
                kept.insert(*slot, entry);
            }
        }
        self.entries = kept;
        self.order = pending.into_iter().collect();
        self.by_id.clear();
        self.settled.clear();
        self.by_temp.retain(|_, slot| self.entries.contains_key(slot));

        for note in notes {
            match note.temp_id {
                Some(temp_id) if self.by_temp.contains_key(&temp_id) => {
                    self.resolve_create(temp_id, Ok(note));
                }
                Some(temp_id) if self.settled.contains_key(&temp_id) => {
                    warn!(
                        temp_id = %temp_id,
                        note_id = ?note.id,
                        "Listing repeats a settled create, skipped"
                    );
                }
                _ if note.id.as_ref().is_some_and(|id| self.by_id.contains_key(id)) => {
                    debug!(note_id = ?note.id, "Duplicate id in listing, skipped");
                }
                _ => self.push_back(note, None),
            }
        }
    }

    /// Apply a confirmed edit to the note with server id `id`.
    pub fn apply_patch(&mut self, id: &NoteId, patch: &NotePatch) -> Result<&Note> {
        let entry = self
            .by_id
            .get(id)
            .and_then(|slot| self.entries.get_mut(slot))
            .ok_or_else(|| Error::NotFound(format!("note {}", id)))?;
        entry.note.apply_patch(patch);
        Ok(&entry.note)
    }

    /// Remove the note with server id `id`.
    pub fn remove(&mut self, id: &NoteId) -> Result<Note> {
        let slot = self
            .by_id
            .get(id)
            .copied()
            .ok_or_else(|| Error::NotFound(format!("note {}", id)))?;
        self.drop_slot(slot)
            .ok_or_else(|| Error::NotFound(format!("note {}", id)))
    }

    fn alloc(&mut self, note: Note, draft: Option<NoteDraft>) -> NoteSlot {
        let slot = self.next_slot;
        self.next_slot += 1;
        self.entries.insert(slot, Entry { note, draft });
        slot
    }

    fn push_back(&mut self, note: Note, draft: Option<NoteDraft>) {
        let id = note.id.clone();
        let temp_id = note.temp_id;
        let slot = self.alloc(note, draft);
        self.order.push_back(slot);
        if let Some(id) = id {
            self.by_id.insert(id, slot);
        }
        if let Some(temp_id) = temp_id {
            self.settled.entry(temp_id).or_insert(slot);
        }
    }

    fn drop_slot(&mut self, slot: NoteSlot) -> Option<Note> {
        let entry = self.entries.remove(&slot)?;
        self.order.retain(|s| *s != slot);
        if let Some(temp) = entry.note.temp_id {
            if self.by_temp.get(&temp) == Some(&slot) {
                self.by_temp.remove(&temp);
            }
            if self.settled.get(&temp) == Some(&slot) {
                self.settled.remove(&temp);
            }
        }
        if let Some(ref id) = entry.note.id {
            if self.by_id.get(id) == Some(&slot) {
                self.by_id.remove(id);
            }
        }
        Some(entry.note)
    }
}
