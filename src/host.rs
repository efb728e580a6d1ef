//! The document host: the editor surface the coordinator drives.
//!
//! Buffer storage, rendering, undo/redo, file watching and UI all belong to
//! the host editor. This module describes only the capabilities the
//! coordinator needs from it.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Name under which a conversion edit is recorded in command history.
pub const CONVERT_TO_UNICODE: &str = "convert_to_unicode";

/// Name under which the host records a reload-from-disk.
pub const REVERT: &str = "revert";

/// Stable identity of an open document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(pub u64);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A selection or edit range in character offsets. `a` is the anchor and
/// `b` the caret, so `a > b` is a backwards selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Region {
    pub a: usize,
    pub b: usize,
}

impl Region {
    pub fn new(a: usize, b: usize) -> Self {
        Self { a, b }
    }

    pub fn begin(&self) -> usize {
        self.a.min(self.b)
    }

    pub fn end(&self) -> usize {
        self.a.max(self.b)
    }

    /// Pull both ends inside a buffer of `len` characters.
    pub fn clamp(self, len: usize) -> Self {
        Self::new(self.a.min(len), self.b.min(len))
    }
}

/// Scroll position of a document's view.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
}

/// The encoding a document declares to the host (used for the host's own
/// save and for display).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclaredEncoding {
    Unicode,
    /// Binary display mode; documents in this mode are never converted.
    Hexadecimal,
    Other(String),
}

/// Host-native commands the coordinator replays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeCommand {
    Undo,
    Redo,
}

/// One entry of a document's command history.
///
/// The empty record (`name == ""`) marks "nothing there", e.g. when the undo
/// stack has been walked all the way back.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandRecord {
    pub name: String,
    pub args: Option<String>,
    pub repeat: u32,
}

impl CommandRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: None,
            repeat: 1,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// The record for a conversion into Unicode from `encoding`.
    pub fn convert_to_unicode(encoding: &str) -> Self {
        Self {
            args: Some(encoding.to_string()),
            ..Self::new(CONVERT_TO_UNICODE)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }

    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }
}

/// Work the coordinator posts back to itself through the host event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredTask {
    /// Decide whether a finished reload was caused by our own save.
    ReconcileReload(DocumentId),
    /// Clear the internal-edit and reload-suppression flags once the undo of
    /// a self-caused reload has settled.
    FinishReloadUndo(DocumentId),
}

impl DeferredTask {
    pub fn document(&self) -> DocumentId {
        match *self {
            Self::ReconcileReload(doc) | Self::FinishReloadUndo(doc) => doc,
        }
    }
}

/// Capabilities a host editor provides for one or more open documents.
///
/// All calls happen on the host's event loop. Offsets are in characters.
pub trait DocumentHost {
    /// Path of the backing file, if the document has one.
    fn file_name(&self, doc: DocumentId) -> Option<PathBuf>;

    /// Buffer length in characters.
    fn size(&self, doc: DocumentId) -> usize;

    fn substr(&self, doc: DocumentId, region: Region) -> String;

    fn replace(&mut self, doc: DocumentId, region: Region, text: &str);

    fn selections(&self, doc: DocumentId) -> Vec<Region>;

    fn set_selections(&mut self, doc: DocumentId, regions: &[Region]);

    fn viewport(&self, doc: DocumentId) -> Viewport;

    fn set_viewport(&mut self, doc: DocumentId, viewport: Viewport);

    /// Whether dirty tracking is suppressed for the document.
    fn is_scratch(&self, doc: DocumentId) -> bool;

    fn set_scratch(&mut self, doc: DocumentId, scratch: bool);

    fn encoding(&self, doc: DocumentId) -> DeclaredEncoding;

    fn set_encoding(&mut self, doc: DocumentId, encoding: DeclaredEncoding);

    fn run_command(&mut self, doc: DocumentId, command: NativeCommand);

    /// Run `edit` as one undoable step recorded in command history as
    /// `record`.
    fn run_edit<F>(&mut self, doc: DocumentId, record: CommandRecord, edit: F)
    where
        F: FnOnce(&mut Self),
        Self: Sized;

    /// Command history by offset: 0 is the most recent undoable entry, 1 is
    /// the entry an immediate redo would re-apply. Missing entries are
    /// [`CommandRecord::empty`].
    fn command_history(&self, doc: DocumentId, offset: usize) -> CommandRecord;

    /// Post `task` to run after the current signal handler and any pending
    /// host operations have finished. The host hands it back through
    /// [`crate::Coordinator::run_deferred`].
    fn schedule(&mut self, delay: Duration, task: DeferredTask);

    /// Show a modal error.
    fn error_message(&mut self, message: &str);

    /// Show a transient status line message.
    fn status_message(&mut self, message: &str);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_clamp_keeps_direction() {
        assert_eq!(Region::new(8, 2).clamp(5), Region::new(5, 2));
        assert_eq!(Region::new(1, 3).clamp(10), Region::new(1, 3));
    }

    #[test]
    fn empty_record() {
        assert!(CommandRecord::empty().is_empty());
        assert!(!CommandRecord::new("insert").is_empty());
    }

    #[test]
    fn convert_record_carries_encoding() {
        let record = CommandRecord::convert_to_unicode("GBK");
        assert!(record.is(CONVERT_TO_UNICODE));
        assert_eq!(record.args.as_deref(), Some("GBK"));
    }
}
