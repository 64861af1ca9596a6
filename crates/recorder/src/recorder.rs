//! Interval selection state machine.
//!
//! Every trigger for a `State` behavior toggles it between `Idle` and
//! `AwaitingClose`. The second trigger commits `[min, max]` of the two
//! timestamps, so scrubbing backwards still yields an ascending interval.
//! `Event` behaviors commit on every trigger and never hold state.

use std::collections::BTreeMap;

use ethogram_model::{
    BehaviorCatalog, BehaviorId, BehaviorKind, CatalogResult, RemovedMark, TimeMark, TimestampMs,
};

/// Per-behavior selection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionState {
    Idle,
    AwaitingClose { opened_at: TimestampMs },
}

/// An interval whose first half has been recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingSelection {
    pub id: BehaviorId,
    pub opened_at: TimestampMs,
}

/// What a single activation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    EventCommitted {
        id: BehaviorId,
        at: TimestampMs,
    },
    SelectionOpened {
        id: BehaviorId,
        at: TimestampMs,
    },
    StateCommitted {
        id: BehaviorId,
        start: TimestampMs,
        end: TimestampMs,
    },
}

impl Activation {
    /// The mark committed by this activation, if any.
    pub fn committed_mark(&self) -> Option<TimeMark> {
        match self {
            Self::EventCommitted { at, .. } => Some(TimeMark::Instant(*at)),
            Self::StateCommitted { start, end, .. } => Some(TimeMark::Interval([*start, *end])),
            Self::SelectionOpened { .. } => None,
        }
    }
}

/// Result of deleting marks at a playback time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionOutcome {
    pub removed: Vec<RemovedMark>,
    pub cancelled: Vec<PendingSelection>,
}

/// Converts trigger activations into committed marks.
///
/// Holds at most one open selection per behavior, plus the order in which
/// open selections were started for LIFO undo.
#[derive(Debug, Clone, Default)]
pub struct BehaviorRecorder {
    open: BTreeMap<BehaviorId, TimestampMs>,
    undo_stack: Vec<BehaviorId>,
}

impl BehaviorRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Selection state of a behavior.
    pub fn state(&self, id: BehaviorId) -> SelectionState {
        match self.open.get(&id) {
            Some(opened_at) => SelectionState::AwaitingClose {
                opened_at: *opened_at,
            },
            None => SelectionState::Idle,
        }
    }

    /// Open selections, oldest first.
    pub fn open_selections(&self) -> Vec<PendingSelection> {
        self.undo_stack
            .iter()
            .filter_map(|id| {
                self.open.get(id).map(|opened_at| PendingSelection {
                    id: *id,
                    opened_at: *opened_at,
                })
            })
            .collect()
    }

    pub fn has_open_selection(&self) -> bool {
        !self.open.is_empty()
    }

    /// Apply one trigger for behavior `id` at playback time `at`.
    ///
    /// Selections of different behaviors may interleave freely.
    pub fn activate(
        &mut self,
        catalog: &mut BehaviorCatalog,
        id: BehaviorId,
        at: TimestampMs,
    ) -> CatalogResult<Activation> {
        let kind = catalog.get(id)?.kind();

        match kind {
            BehaviorKind::Event => {
                if let Some(stale) = self.cancel(id) {
                    tracing::warn!(
                        id,
                        opened_at = stale.opened_at,
                        "Dropping selection left open on a behavior that is now an Event"
                    );
                }
                catalog.commit_mark(id, TimeMark::Instant(at))?;
                tracing::debug!(id, at_ms = at, "Event committed");
                Ok(Activation::EventCommitted { id, at })
            }
            BehaviorKind::State => match self.open.get(&id).copied() {
                None => {
                    self.open.insert(id, at);
                    self.undo_stack.push(id);
                    tracing::debug!(id, at_ms = at, "Selection opened");
                    Ok(Activation::SelectionOpened { id, at })
                }
                Some(opened_at) => {
                    let mark = TimeMark::interval(opened_at, at);
                    catalog.commit_mark(id, mark)?;
                    self.cancel(id);
                    let (start, end) = mark.display_span();
                    tracing::debug!(id, start_ms = start, end_ms = end, "Selection committed");
                    Ok(Activation::StateCommitted { id, start, end })
                }
            },
        }
    }

    /// Discard the most recently opened selection without committing.
    pub fn undo(&mut self) -> Option<PendingSelection> {
        let id = *self.undo_stack.last()?;
        let undone = self.cancel(id);
        if let Some(selection) = undone {
            tracing::debug!(id, opened_at = selection.opened_at, "Selection undone");
        }
        undone
    }

    /// Discard the open selection of one behavior, wherever it sits in
    /// the undo order.
    pub fn undo_for(&mut self, id: BehaviorId) -> Option<PendingSelection> {
        let undone = self.cancel(id);
        if let Some(selection) = undone {
            tracing::debug!(id, opened_at = selection.opened_at, "Selection undone");
        }
        undone
    }

    /// Delete marks covering `at`, then cancel open selections of every
    /// behavior that lost a mark.
    pub fn delete_at(&mut self, catalog: &mut BehaviorCatalog, at: TimestampMs) -> DeletionOutcome {
        let removed = catalog.delete_mark_at(at);
        let cancelled = removed
            .iter()
            .filter_map(|removed| self.cancel(removed.id))
            .collect::<Vec<_>>();

        tracing::debug!(
            at_ms = at,
            removed = removed.len(),
            cancelled = cancelled.len(),
            "Deleted marks"
        );
        DeletionOutcome { removed, cancelled }
    }

    /// Account for a definition removed from the catalog: drop its open
    /// selection and shift later ids down to match the renumbered catalog.
    pub fn forget_definition(&mut self, id: BehaviorId) -> Option<PendingSelection> {
        let dropped = self.cancel(id);
        self.open = std::mem::take(&mut self.open)
            .into_iter()
            .map(|(open_id, at)| (if open_id > id { open_id - 1 } else { open_id }, at))
            .collect();
        for open_id in &mut self.undo_stack {
            if *open_id > id {
                *open_id -= 1;
            }
        }
        dropped
    }

    /// Drop every open selection.
    pub fn reset(&mut self) -> Vec<PendingSelection> {
        let pending = self.open_selections();
        self.open.clear();
        self.undo_stack.clear();
        pending
    }

    fn cancel(&mut self, id: BehaviorId) -> Option<PendingSelection> {
        let opened_at = self.open.remove(&id)?;
        self.undo_stack.retain(|open_id| *open_id != id);
        Some(PendingSelection { id, opened_at })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethogram_model::{CatalogError, DefinitionSpec};
    use proptest::prelude::*;

    fn catalog() -> BehaviorCatalog {
        let mut catalog = BehaviorCatalog::with_video_paths(vec!["a.mp4".to_string()]);
        catalog
            .add_definition(DefinitionSpec::new("lick", BehaviorKind::Event))
            .unwrap();
        catalog
            .add_definition(DefinitionSpec::new("groom", BehaviorKind::State))
            .unwrap();
        catalog
            .add_definition(DefinitionSpec::new("rear", BehaviorKind::State))
            .unwrap();
        catalog
    }

    #[test]
    fn test_event_commits_immediately() {
        let mut catalog = catalog();
        let mut recorder = BehaviorRecorder::new();

        let activation = recorder.activate(&mut catalog, 0, 1500).unwrap();
        assert_eq!(activation, Activation::EventCommitted { id: 0, at: 1500 });
        assert_eq!(catalog.get(0).unwrap().marks(), &[TimeMark::Instant(1500)]);
        assert_eq!(recorder.state(0), SelectionState::Idle);
        assert!(!recorder.has_open_selection());
    }

    #[test]
    fn test_state_two_phase_commit() {
        let mut catalog = catalog();
        let mut recorder = BehaviorRecorder::new();

        assert_eq!(
            recorder.activate(&mut catalog, 1, 2000).unwrap(),
            Activation::SelectionOpened { id: 1, at: 2000 }
        );
        assert_eq!(
            recorder.state(1),
            SelectionState::AwaitingClose { opened_at: 2000 }
        );
        assert!(catalog.get(1).unwrap().marks().is_empty());

        assert_eq!(
            recorder.activate(&mut catalog, 1, 4500).unwrap(),
            Activation::StateCommitted { id: 1, start: 2000, end: 4500 }
        );
        assert_eq!(recorder.state(1), SelectionState::Idle);
        assert_eq!(catalog.get(1).unwrap().marks(), &[TimeMark::Interval([2000, 4500])]);
    }

    #[test]
    fn test_reverse_scrub_commits_ascending_interval() {
        let mut catalog = catalog();
        let mut recorder = BehaviorRecorder::new();
        recorder.activate(&mut catalog, 1, 8000).unwrap();
        recorder.activate(&mut catalog, 1, 3000).unwrap();
        assert_eq!(catalog.get(1).unwrap().marks(), &[TimeMark::Interval([3000, 8000])]);
    }

    #[test]
    fn test_undo_discards_without_commit() {
        let mut catalog = catalog();
        let mut recorder = BehaviorRecorder::new();
        recorder.activate(&mut catalog, 1, 1000).unwrap();

        assert_eq!(
            recorder.undo(),
            Some(PendingSelection { id: 1, opened_at: 1000 })
        );
        assert_eq!(recorder.state(1), SelectionState::Idle);
        assert!(catalog.get(1).unwrap().marks().is_empty());
        assert_eq!(recorder.undo(), None);

        // The next trigger starts a fresh selection.
        assert_eq!(
            recorder.activate(&mut catalog, 1, 5000).unwrap(),
            Activation::SelectionOpened { id: 1, at: 5000 }
        );
    }

    #[test]
    fn test_interleaved_selections_and_lifo_undo() {
        let mut catalog = catalog();
        let mut recorder = BehaviorRecorder::new();
        recorder.activate(&mut catalog, 1, 100).unwrap();
        recorder.activate(&mut catalog, 2, 200).unwrap();
        recorder.activate(&mut catalog, 0, 250).unwrap();

        assert_eq!(recorder.undo().map(|p| p.id), Some(2));
        recorder.activate(&mut catalog, 1, 300).unwrap();
        assert_eq!(catalog.get(1).unwrap().marks(), &[TimeMark::Interval([100, 300])]);
        assert!(catalog.get(2).unwrap().marks().is_empty());
        assert_eq!(catalog.get(0).unwrap().marks().len(), 1);
    }

    #[test]
    fn test_undo_for_targets_specific_behavior() {
        let mut catalog = catalog();
        let mut recorder = BehaviorRecorder::new();
        recorder.activate(&mut catalog, 1, 100).unwrap();
        recorder.activate(&mut catalog, 2, 200).unwrap();

        assert_eq!(recorder.undo_for(1).map(|p| p.opened_at), Some(100));
        assert_eq!(recorder.undo().map(|p| p.id), Some(2));
        assert_eq!(recorder.undo(), None);
    }

    #[test]
    fn test_unknown_behavior() {
        let mut catalog = catalog();
        let mut recorder = BehaviorRecorder::new();
        let err = recorder.activate(&mut catalog, 3, 0).unwrap_err();
        assert!(matches!(err, CatalogError::UnknownBehavior { id: 3, count: 3 }));
    }

    #[test]
    fn test_delete_at_cancels_selection_of_touched_behavior() {
        let mut catalog = catalog();
        let mut recorder = BehaviorRecorder::new();
        recorder.activate(&mut catalog, 1, 1000).unwrap();
        recorder.activate(&mut catalog, 1, 2000).unwrap();
        recorder.activate(&mut catalog, 1, 5000).unwrap();
        recorder.activate(&mut catalog, 2, 1500).unwrap();

        let outcome = recorder.delete_at(&mut catalog, 1500);
        assert_eq!(outcome.removed.len(), 1);
        assert_eq!(outcome.removed[0].id, 1);
        assert_eq!(
            outcome.cancelled,
            vec![PendingSelection { id: 1, opened_at: 5000 }]
        );
        // Behavior 2 lost no mark, so its selection survives.
        assert_eq!(
            recorder.state(2),
            SelectionState::AwaitingClose { opened_at: 1500 }
        );
    }

    #[test]
    fn test_forget_definition_shifts_open_ids() {
        let mut catalog = catalog();
        let mut recorder = BehaviorRecorder::new();
        recorder.activate(&mut catalog, 1, 100).unwrap();
        recorder.activate(&mut catalog, 2, 200).unwrap();

        catalog.delete_definition(1).unwrap();
        let dropped = recorder.forget_definition(1);
        assert_eq!(dropped.map(|p| p.opened_at), Some(100));
        assert_eq!(
            recorder.state(1),
            SelectionState::AwaitingClose { opened_at: 200 }
        );

        recorder.activate(&mut catalog, 1, 900).unwrap();
        assert_eq!(catalog.get(1).unwrap().name(), "rear");
        assert_eq!(catalog.get(1).unwrap().marks(), &[TimeMark::Interval([200, 900])]);
    }

    proptest! {
        #[test]
        fn prop_state_marks_are_always_ascending(
            times in proptest::collection::vec(0u64..100_000, 0..40)
        ) {
            let mut catalog = catalog();
            let mut recorder = BehaviorRecorder::new();
            for t in &times {
                recorder.activate(&mut catalog, 1, *t).unwrap();
            }
            let marks = catalog.get(1).unwrap().marks();
            prop_assert_eq!(marks.len(), times.len() / 2);
            for mark in marks {
                let (start, end) = mark.display_span();
                prop_assert!(start <= end);
            }
            prop_assert_eq!(recorder.has_open_selection(), times.len() % 2 == 1);
        }
    }
}
