//! Document state management for the conversion coordinator.

use std::time::SystemTime;

use dashmap::DashMap;
use encoding_rs::Encoding;

use crate::host::DocumentId;

/// Conversion state for a single open document.
///
/// Copied out of the store on read so no map guard is ever held while the
/// host runs a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentState {
    /// Whether the document is still a conversion candidate. Once cleared it
    /// stays cleared for the life of the document.
    pub needs_processing: bool,
    /// The buffer holds Unicode text decoded from `source_encoding`.
    pub converted: bool,
    /// Legacy encoding confirmed for the backing file. `Some` whenever
    /// `converted` is set.
    pub source_encoding: Option<&'static Encoding>,
    /// An edit issued by the coordinator itself is in progress.
    pub applying_internal_edit: bool,
    /// Reload notifications already seen for the current reload.
    pub revert_observed: u32,
    /// The next reload is expected to come from our own save.
    pub suppress_next_reload: bool,
    /// File modification time right after our own save.
    pub last_save: Option<SystemTime>,
    /// Consecutive failed conversion attempts.
    pub conversion_failures: u32,
}

impl DocumentState {
    pub fn new(needs_processing: bool) -> Self {
        Self {
            needs_processing,
            converted: false,
            source_encoding: None,
            applying_internal_edit: false,
            revert_observed: 0,
            suppress_next_reload: false,
            last_save: None,
            conversion_failures: 0,
        }
    }
}

/// Storage for the state of every open document.
#[derive(Debug, Default)]
pub struct DocumentStore {
    documents: DashMap<DocumentId, DocumentState>,
}

impl DocumentStore {
    /// Create a new empty document store.
    pub fn new() -> Self {
        Self {
            documents: DashMap::new(),
        }
    }

    /// Get a copy of a document's state.
    pub fn get(&self, id: DocumentId) -> Option<DocumentState> {
        self.documents.get(&id).map(|entry| *entry)
    }

    /// Get a document's state, creating it with `init` on first sight.
    pub fn get_or_insert_with(
        &self,
        id: DocumentId,
        init: impl FnOnce() -> DocumentState,
    ) -> DocumentState {
        *self.documents.entry(id).or_insert_with(init)
    }

    /// Mutate a document's state in place. Returns `None` if the document
    /// is not tracked.
    pub fn update<R>(&self, id: DocumentId, f: impl FnOnce(&mut DocumentState) -> R) -> Option<R> {
        self.documents
            .get_mut(&id)
            .map(|mut entry| f(entry.value_mut()))
    }

    /// Close a document, dropping its state.
    pub fn close(&self, id: DocumentId) {
        self.documents.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Mark an internal edit as in progress until the returned guard drops.
    pub fn begin_internal_edit(&self, id: DocumentId) -> InternalEdit<'_> {
        self.update(id, |state| state.applying_internal_edit = true);
        InternalEdit {
            store: self,
            id,
            armed: true,
        }
    }
}

/// Scoped `applying_internal_edit` flag.
///
/// Dropping the guard clears the flag on every exit path. [`InternalEdit::hold`]
/// leaves the flag set for a deferred cleanup task to clear.
#[must_use = "the internal edit ends when the guard is dropped"]
pub struct InternalEdit<'a> {
    store: &'a DocumentStore,
    id: DocumentId,
    armed: bool,
}

impl InternalEdit<'_> {
    /// Keep the flag set past this scope.
    pub fn hold(mut self) {
        self.armed = false;
    }
}

impl Drop for InternalEdit<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.store
                .update(self.id, |state| state.applying_internal_edit = false);
        }
    }
}
