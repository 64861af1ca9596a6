//! Annotation session management.
//!
//! An [`AnnotationSession`] owns at most one active catalog and the
//! recorder working against it. Every state change the viewer needs to
//! redraw is queued as a [`Notification`]; the viewer drains the queue
//! after each call.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use ethogram_model::{
    BehaviorCatalog, BehaviorId, CatalogError, DefinitionField, DefinitionSpec, TimeMark,
    TimestampMs,
};

use crate::keymap::{Keymap, Trigger};
use crate::recorder::{Activation, BehaviorRecorder, DeletionOutcome, PendingSelection};

/// Errors raised at the session level.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("No behavior catalog is active")]
    NoActiveCatalog,

    #[error("A behavior catalog is already active; close it first")]
    CatalogActive,

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Result type alias using SessionError.
pub type SessionResult<T> = Result<T, SessionError>;

/// Display updates emitted by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A committed mark to draw. Events arrive as `[t, t + 1]`.
    AddMark {
        id: BehaviorId,
        color_code: String,
        start: TimestampMs,
        end: TimestampMs,
    },
    /// A committed mark was removed.
    DeleteMark { id: BehaviorId, mark: TimeMark },
    /// Mark count of a definition changed.
    MarkSetSize { id: BehaviorId, count: usize },
    /// First half of an interval recorded.
    SelectionOpened { id: BehaviorId, at: TimestampMs },
    /// An open interval was discarded without a commit.
    SelectionCancelled {
        id: BehaviorId,
        opened_at: TimestampMs,
    },
    /// The catalog was written to disk.
    Saved { dir: PathBuf },
}

/// Owner of the active catalog during an annotation pass.
#[derive(Debug, Default)]
pub struct AnnotationSession {
    catalog: Option<BehaviorCatalog>,
    recorder: BehaviorRecorder,
    keymap: Keymap,
    notifications: VecDeque<Notification>,
}

impl AnnotationSession {
    pub fn new(keymap: Keymap) -> Self {
        Self {
            keymap,
            ..Default::default()
        }
    }

    pub fn is_active(&self) -> bool {
        self.catalog.is_some()
    }

    pub fn keymap(&self) -> &Keymap {
        &self.keymap
    }

    pub fn recorder(&self) -> &BehaviorRecorder {
        &self.recorder
    }

    /// The active catalog.
    pub fn catalog(&self) -> SessionResult<&BehaviorCatalog> {
        self.catalog.as_ref().ok_or(SessionError::NoActiveCatalog)
    }

    /// Begin an empty catalog over the given source videos.
    pub fn start_new(&mut self, video_paths: Vec<String>) -> SessionResult<()> {
        self.ensure_inactive()?;
        tracing::info!(sources = video_paths.len(), "Starting new annotation catalog");
        self.activate_catalog(BehaviorCatalog::with_video_paths(video_paths));
        Ok(())
    }

    /// Load a saved catalog directory and replay its marks to the viewer.
    pub fn load_catalog(&mut self, dir: impl AsRef<Path>) -> SessionResult<()> {
        self.ensure_inactive()?;
        let catalog = BehaviorCatalog::load(dir)?;
        self.activate_catalog(catalog);
        Ok(())
    }

    /// Load definitions from a header file. Source videos are kept
    /// from `video_paths`, since headers do not carry them.
    pub fn load_header(
        &mut self,
        file: impl AsRef<Path>,
        video_paths: Vec<String>,
    ) -> SessionResult<()> {
        self.ensure_inactive()?;
        let mut catalog = BehaviorCatalog::load_header(file)?;
        catalog.set_video_paths(video_paths);
        self.activate_catalog(catalog);
        Ok(())
    }

    /// Discard the active catalog and any open selections.
    pub fn close(&mut self) -> Option<BehaviorCatalog> {
        for pending in self.recorder.reset() {
            self.push_cancelled(pending);
        }
        let closed = self.catalog.take();
        if closed.is_some() {
            tracing::info!("Closed annotation catalog");
        }
        closed
    }

    pub fn set_video_paths(&mut self, video_paths: Vec<String>) -> SessionResult<()> {
        self.catalog_mut()?.set_video_paths(video_paths);
        Ok(())
    }

    pub fn add_definition(&mut self, spec: DefinitionSpec) -> SessionResult<BehaviorId> {
        let id = self.catalog_mut()?.add_definition(spec)?;
        if id >= self.keymap.capacity() {
            tracing::warn!(
                id,
                keys = self.keymap.capacity(),
                "Behavior has no trigger key bound"
            );
        }
        Ok(id)
    }

    /// Replace a definition's fields. A kind change discards any open
    /// selection on that definition.
    pub fn modify_definition(&mut self, id: BehaviorId, spec: DefinitionSpec) -> SessionResult<()> {
        let kind = spec.kind;
        let previous = self.catalog()?.get(id)?.kind();
        self.catalog_mut()?.modify_definition(id, spec)?;
        if previous != kind {
            self.cancel_selection_of(id);
        }
        Ok(())
    }

    pub fn set_field(&mut self, id: BehaviorId, field: DefinitionField) -> SessionResult<()> {
        let kind_change = matches!(field, DefinitionField::Kind(_));
        self.catalog_mut()?.set_field(id, field)?;
        if kind_change {
            self.cancel_selection_of(id);
        }
        Ok(())
    }

    /// Remove a definition. Later definitions move down one id.
    pub fn delete_definition(&mut self, id: BehaviorId) -> SessionResult<()> {
        let removed = self.catalog_mut()?.delete_definition(id)?;
        if let Some(pending) = self.recorder.forget_definition(id) {
            self.push_cancelled(pending);
        }
        for mark in removed.marks() {
            self.notifications.push_back(Notification::DeleteMark { id, mark: *mark });
        }
        Ok(())
    }

    /// Route a key press through the keymap. Unbound keys are ignored.
    pub fn handle_key(&mut self, key: char, now: TimestampMs) -> SessionResult<Option<Trigger>> {
        let Some(trigger) = self.keymap.resolve(key) else {
            tracing::trace!(%key, "Ignoring unbound key");
            return Ok(None);
        };
        self.handle_trigger(trigger, now)?;
        Ok(Some(trigger))
    }

    pub fn handle_trigger(&mut self, trigger: Trigger, now: TimestampMs) -> SessionResult<()> {
        match trigger {
            Trigger::Behavior(id) => {
                self.activate(id, now)?;
            }
            Trigger::Undo => {
                self.undo()?;
            }
            Trigger::DeleteAtCursor => {
                self.delete_at(now)?;
            }
        }
        Ok(())
    }

    /// Fire behavior `id` at playback time `now`.
    pub fn activate(&mut self, id: BehaviorId, now: TimestampMs) -> SessionResult<Activation> {
        let catalog = self.catalog.as_mut().ok_or(SessionError::NoActiveCatalog)?;
        let activation = self.recorder.activate(catalog, id, now)?;

        match activation {
            Activation::SelectionOpened { id, at } => {
                self.notifications
                    .push_back(Notification::SelectionOpened { id, at });
            }
            Activation::EventCommitted { id, .. } | Activation::StateCommitted { id, .. } => {
                let def = catalog.get(id)?;
                let (color_code, count) = (def.color_code().to_string(), def.marks().len());
                if let Some(mark) = activation.committed_mark() {
                    let (start, end) = mark.display_span();
                    self.notifications.push_back(Notification::AddMark {
                        id,
                        color_code,
                        start,
                        end,
                    });
                }
                self.notifications
                    .push_back(Notification::MarkSetSize { id, count });
            }
        }
        Ok(activation)
    }

    /// Discard the most recently opened selection.
    pub fn undo(&mut self) -> SessionResult<Option<PendingSelection>> {
        self.catalog()?;
        let undone = self.recorder.undo();
        if let Some(pending) = undone {
            self.push_cancelled(pending);
        }
        Ok(undone)
    }

    /// Delete every mark covering `at`.
    pub fn delete_at(&mut self, at: TimestampMs) -> SessionResult<DeletionOutcome> {
        let catalog = self.catalog.as_mut().ok_or(SessionError::NoActiveCatalog)?;
        let outcome = self.recorder.delete_at(catalog, at);

        for removed in &outcome.removed {
            self.notifications.push_back(Notification::DeleteMark {
                id: removed.id,
                mark: removed.mark,
            });
            let count = catalog.get(removed.id)?.marks().len();
            self.notifications.push_back(Notification::MarkSetSize {
                id: removed.id,
                count,
            });
        }
        for pending in &outcome.cancelled {
            self.push_cancelled(*pending);
        }
        Ok(outcome)
    }

    /// Save the active catalog into an empty directory.
    pub fn save(&mut self, dir: impl AsRef<Path>) -> SessionResult<Vec<PathBuf>> {
        let dir = dir.as_ref();
        let written = self.catalog()?.save(dir)?;
        self.notifications.push_back(Notification::Saved {
            dir: dir.to_path_buf(),
        });
        Ok(written)
    }

    pub fn save_header(&self, file: impl AsRef<Path>) -> SessionResult<()> {
        self.catalog()?.save_header(file)?;
        Ok(())
    }

    /// Take every queued notification, oldest first.
    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        self.notifications.drain(..).collect()
    }

    fn ensure_inactive(&self) -> SessionResult<()> {
        if self.catalog.is_some() {
            return Err(SessionError::CatalogActive);
        }
        Ok(())
    }

    fn catalog_mut(&mut self) -> SessionResult<&mut BehaviorCatalog> {
        self.catalog.as_mut().ok_or(SessionError::NoActiveCatalog)
    }

    fn activate_catalog(&mut self, catalog: BehaviorCatalog) {
        self.recorder.reset();
        for def in catalog.definitions() {
            for mark in def.marks() {
                let (start, end) = mark.display_span();
                self.notifications.push_back(Notification::AddMark {
                    id: def.id(),
                    color_code: def.color_code().to_string(),
                    start,
                    end,
                });
            }
            self.notifications.push_back(Notification::MarkSetSize {
                id: def.id(),
                count: def.marks().len(),
            });
        }
        self.catalog = Some(catalog);
    }

    fn cancel_selection_of(&mut self, id: BehaviorId) {
        if let Some(pending) = self.recorder.undo_for(id) {
            self.push_cancelled(pending);
        }
    }

    fn push_cancelled(&mut self, pending: PendingSelection) {
        self.notifications.push_back(Notification::SelectionCancelled {
            id: pending.id,
            opened_at: pending.opened_at,
        });
    }
}
