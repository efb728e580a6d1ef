//! Transparent GBK editing for host text editors.
//!
//! A [`Coordinator`] watches a host editor's document lifecycle. Files that
//! sniff as GBK are shown as Unicode, saved back as GBK with CRLF line
//! endings, and the conversion never surfaces in the user's undo history or
//! as a spurious reload.

use std::path::Path;
use std::time::Duration;

use encoding_rs::Encoding;
use tracing::{debug, error, warn};

mod document;
pub mod encoding;
pub mod engine;
mod error;
pub mod host;
pub mod settings;

pub use document::{DocumentState, DocumentStore, InternalEdit};
pub use encoding::{Clock, EncodingDecision, Sniffer, SystemClock};
pub use error::{Error, Result};
pub use host::{
    CommandRecord, DeclaredEncoding, DeferredTask, DocumentHost, DocumentId, NativeCommand, Region,
    Viewport,
};
pub use settings::{discover_settings, load_settings, FilePolicy, Settings};

use host::{CONVERT_TO_UNICODE, REVERT};

/// Failed conversions tolerated before a document stops being retried.
pub const MAX_CONVERSION_ATTEMPTS: u32 = 2;

/// Reacts to host lifecycle signals for every open document.
pub struct Coordinator<C = SystemClock> {
    documents: DocumentStore,
    sniffer: Sniffer<C>,
    policy: FilePolicy,
}

impl Coordinator {
    pub fn new(settings: &Settings) -> Self {
        Self::with_sniffer(settings, Sniffer::new())
    }
}

impl<C: Clock> Coordinator<C> {
    /// Build a coordinator around a custom sniffer. The settings' time budget
    /// still applies.
    pub fn with_sniffer(settings: &Settings, sniffer: Sniffer<C>) -> Self {
        Self {
            documents: DocumentStore::new(),
            sniffer: sniffer.budget(settings.sniff_budget()),
            policy: FilePolicy::from_settings(settings),
        }
    }

    pub fn documents(&self) -> &DocumentStore {
        &self.documents
    }

    /// A copy of the document's state, if it has been seen.
    pub fn state(&self, doc: DocumentId) -> Option<DocumentState> {
        self.documents.get(doc)
    }

    pub fn on_open<H: DocumentHost>(&self, host: &mut H, doc: DocumentId) {
        if self.state_for(host, doc).needs_processing {
            self.process(host, doc);
        }
    }

    /// Some hosts never deliver `open` for documents restored at startup, so
    /// activation runs the same idempotent check.
    pub fn on_activate<H: DocumentHost>(&self, host: &mut H, doc: DocumentId) {
        if self.state_for(host, doc).needs_processing {
            self.process(host, doc);
        }
    }

    /// Fires on every buffer change, including host-native undo, redo and
    /// reload.
    pub fn on_modified<H: DocumentHost>(&self, host: &mut H, doc: DocumentId) {
        let state = self.state_for(host, doc);
        if !state.needs_processing {
            return;
        }

        if state.converted {
            let latest = host.command_history(doc, 0);
            if latest.is_empty() {
                // Undo walked back through our conversion: step forward again
                // so the user's undo lands on their own edits.
                if host.command_history(doc, 1).is(CONVERT_TO_UNICODE) {
                    debug!(%doc, "undo reached the conversion, redoing it");
                    host.set_scratch(doc, true);
                    let _edit = self.documents.begin_internal_edit(doc);
                    host.run_command(doc, NativeCommand::Redo);
                }
            } else if latest.is(REVERT) {
                // A reload notifies twice; act on the second.
                let second = self.documents.update(doc, |state| {
                    if state.revert_observed > 0 {
                        state.revert_observed = 0;
                        true
                    } else {
                        state.revert_observed += 1;
                        false
                    }
                });
                if second == Some(true) {
                    debug!(%doc, "reload finished, scheduling reconciliation");
                    host.schedule(Duration::ZERO, DeferredTask::ReconcileReload(doc));
                }
            }
        }

        let internal = self
            .documents
            .get(doc)
            .is_some_and(|state| state.applying_internal_edit);
        if host.is_scratch(doc) && !internal {
            host.set_scratch(doc, false);
        }
    }

    /// Runs synchronously: the re-encoded bytes must be on disk before the
    /// host may close the document.
    pub fn on_save<H: DocumentHost>(&self, host: &mut H, doc: DocumentId) {
        let state = self.state_for(host, doc);
        if !state.converted {
            return;
        }
        let (Some(path), Some(encoding)) = (host.file_name(doc), state.source_encoding) else {
            return;
        };

        match engine::save_with_encoding(host, doc, &path, encoding) {
            Ok(modified) => {
                self.documents.update(doc, |state| {
                    state.suppress_next_reload = true;
                    state.last_save = Some(modified);
                });
            }
            Err(err) => {
                error!(%doc, file = %path.display(), "save failed: {}", err);
                host.error_message(&err.to_string());
            }
        }
    }

    pub fn on_close(&self, doc: DocumentId) {
        self.documents.close(doc);
    }

    /// Entry point for tasks posted through [`DocumentHost::schedule`].
    ///
    /// The document may have changed or closed since the task was posted, so
    /// every task starts from a fresh look at its state.
    pub fn run_deferred<H: DocumentHost>(&self, host: &mut H, task: DeferredTask) {
        debug!(doc = %task.document(), ?task, "running deferred task");
        match task {
            DeferredTask::ReconcileReload(doc) => self.reconcile_reload(host, doc),
            DeferredTask::FinishReloadUndo(doc) => self.finish_reload_undo(doc),
        }
    }

    /// The exposed `convert_to_unicode` command. A no-op for an empty label,
    /// a document in binary display, or one without a file on disk. Returns
    /// whether the buffer was converted; failures are reported to the user.
    pub fn convert_to_unicode<H: DocumentHost>(
        &self,
        host: &mut H,
        doc: DocumentId,
        label: &str,
    ) -> bool {
        if label.trim().is_empty() || !self.is_convert_enabled(host, doc) {
            return false;
        }
        let Some(path) = host.file_name(doc).filter(|path| path.exists()) else {
            return false;
        };

        match encoding::for_label(label) {
            Ok(encoding) => {
                self.state_for(host, doc);
                self.run_conversion(host, doc, &path, encoding)
            }
            Err(err) => {
                host.error_message(&err.to_string());
                false
            }
        }
    }

    pub fn is_convert_enabled<H: DocumentHost>(&self, host: &H, doc: DocumentId) -> bool {
        host.encoding(doc) != DeclaredEncoding::Hexadecimal
    }

    /// Fetch the document's state, creating it on first sight.
    fn state_for<H: DocumentHost>(&self, host: &H, doc: DocumentId) -> DocumentState {
        if let Some(state) = self.documents.get(doc) {
            return state;
        }
        let needs_processing = host
            .file_name(doc)
            .is_some_and(|path| self.policy.matches(&path));
        self.documents
            .get_or_insert_with(doc, || DocumentState::new(needs_processing))
    }

    /// Sniff and convert once per document.
    fn process<H: DocumentHost>(&self, host: &mut H, doc: DocumentId) {
        let state = self.state_for(host, doc);
        if state.converted {
            return;
        }
        let Some(path) = host.file_name(doc) else {
            return;
        };
        if host.encoding(doc) == DeclaredEncoding::Hexadecimal {
            self.stop_processing(doc);
            return;
        }

        let decision = match self.sniffer.sniff_file(&path) {
            Ok(decision) => decision,
            Err(err) => {
                warn!(%doc, "sniffing failed, leaving document alone: {}", err);
                self.stop_processing(doc);
                return;
            }
        };

        match decision.encoding() {
            Some(encoding) => {
                self.run_conversion(host, doc, &path, encoding);
            }
            None => {
                debug!(%doc, ?decision, "skipping conversion");
                self.stop_processing(doc);
            }
        }
    }

    /// Run the conversion as the host command `convert_to_unicode` so it is
    /// visible in command history.
    fn run_conversion<H: DocumentHost>(
        &self,
        host: &mut H,
        doc: DocumentId,
        path: &Path,
        encoding: &'static Encoding,
    ) -> bool {
        let mut outcome = Ok(());
        let record = CommandRecord::convert_to_unicode(encoding.name());
        host.run_edit(doc, record, |host| {
            outcome = engine::convert_to_unicode(host, &self.documents, doc, path, encoding);
        });

        match outcome {
            Ok(()) => true,
            Err(err) => {
                self.record_failure(doc);
                host.error_message(&err.to_string());
                false
            }
        }
    }

    fn record_failure(&self, doc: DocumentId) {
        let disabled = self.documents.update(doc, |state| {
            state.conversion_failures += 1;
            // A converted buffer still has to be saved in its source encoding.
            if state.conversion_failures >= MAX_CONVERSION_ATTEMPTS && !state.converted {
                state.needs_processing = false;
            }
            !state.needs_processing
        });
        if disabled == Some(true) {
            warn!(%doc, "conversion keeps failing, giving up on this document");
        }
    }

    fn stop_processing(&self, doc: DocumentId) {
        self.documents
            .update(doc, |state| state.needs_processing = false);
    }

    fn reconcile_reload<H: DocumentHost>(&self, host: &mut H, doc: DocumentId) {
        let Some(state) = self.documents.get(doc) else {
            return;
        };
        if !state.needs_processing {
            return;
        }
        let Some(path) = host.file_name(doc) else {
            return;
        };

        let on_disk = std::fs::metadata(&path).and_then(|meta| meta.modified()).ok();
        if state.suppress_next_reload && on_disk.is_some() && on_disk == state.last_save {
            // The reload only picked up our own save: take it back.
            debug!(%doc, "reload caused by our save, undoing it");
            host.set_scratch(doc, true);
            let edit = self.documents.begin_internal_edit(doc);
            host.run_command(doc, NativeCommand::Undo);
            host.set_encoding(doc, DeclaredEncoding::Unicode);
            edit.hold();
            host.schedule(Duration::ZERO, DeferredTask::FinishReloadUndo(doc));
        } else if let Some(encoding) = state.source_encoding {
            debug!(%doc, "file changed on disk, converting again");
            self.documents.update(doc, |state| {
                state.suppress_next_reload = false;
                state.last_save = None;
            });
            self.run_conversion(host, doc, &path, encoding);
        }
    }

    fn finish_reload_undo(&self, doc: DocumentId) {
        self.documents.update(doc, |state| {
            state.applying_internal_edit = false;
            state.suppress_next_reload = false;
        });
    }
}
