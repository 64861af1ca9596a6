//! The behavior catalog: ordered definitions plus shared video sources.

use std::path::Path;

use crate::behavior::{
    validate_name, BehaviorDefinition, BehaviorId, BehaviorKind, DefinitionField, DefinitionSpec,
    TimeMark, TimestampMs,
};
use crate::error::{CatalogError, CatalogResult};

/// All behavior definitions of one annotation session.
///
/// Ids are dense: a definition's id is always its current position.
/// Deleting a definition shifts every later id down by one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BehaviorCatalog {
    pub(crate) definitions: Vec<BehaviorDefinition>,
    pub(crate) video_paths: Vec<String>,
}

/// A mark removed by [`BehaviorCatalog::delete_mark_at`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemovedMark {
    pub id: BehaviorId,
    pub mark: TimeMark,
}

impl BehaviorCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty catalog over the given source videos.
    pub fn with_video_paths(video_paths: Vec<String>) -> Self {
        Self {
            definitions: Vec::new(),
            video_paths,
        }
    }

    /// Source videos shared by every definition, in source-index order.
    pub fn video_paths(&self) -> &[String] {
        &self.video_paths
    }

    /// Replace the source video list.
    pub fn set_video_paths(&mut self, video_paths: Vec<String>) {
        self.video_paths = video_paths;
    }

    /// Number of definitions.
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Definitions in id order.
    pub fn definitions(&self) -> &[BehaviorDefinition] {
        &self.definitions
    }

    /// Look up a definition by id.
    pub fn get(&self, id: BehaviorId) -> CatalogResult<&BehaviorDefinition> {
        self.definitions
            .get(id)
            .ok_or(CatalogError::UnknownBehavior {
                id,
                count: self.definitions.len(),
            })
    }

    fn get_mut(&mut self, id: BehaviorId) -> CatalogResult<&mut BehaviorDefinition> {
        let count = self.definitions.len();
        self.definitions
            .get_mut(id)
            .ok_or(CatalogError::UnknownBehavior { id, count })
    }

    /// Find a definition by exact name.
    pub fn find_by_name(&self, name: &str) -> Option<&BehaviorDefinition> {
        self.definitions.iter().find(|def| def.name == name)
    }

    /// Total committed marks across all definitions.
    pub fn total_marks(&self) -> usize {
        self.definitions.iter().map(|def| def.marks.len()).sum()
    }

    /// Append a new definition; its id is the current count.
    pub fn add_definition(&mut self, spec: DefinitionSpec) -> CatalogResult<BehaviorId> {
        validate_name(&spec.name)?;
        self.ensure_name_free(&spec.name, None)?;

        let id = self.definitions.len();
        tracing::debug!(id, name = %spec.name, kind = %spec.kind, "Adding behavior");
        self.definitions.push(BehaviorDefinition {
            id,
            name: spec.name,
            kind: spec.kind,
            note: spec.note,
            color_code: spec.color_code,
            marks: Vec::new(),
        });
        Ok(id)
    }

    /// Replace every user-supplied field of a definition.
    ///
    /// Validation happens before any field is written, so a rejected
    /// modification leaves the definition untouched.
    pub fn modify_definition(&mut self, id: BehaviorId, spec: DefinitionSpec) -> CatalogResult<()> {
        validate_name(&spec.name)?;
        self.ensure_name_free(&spec.name, Some(id))?;
        self.ensure_kind_change_allowed(id, spec.kind)?;

        let def = self.get_mut(id)?;
        def.name = spec.name;
        def.kind = spec.kind;
        def.note = spec.note;
        def.color_code = spec.color_code;
        Ok(())
    }

    /// Update a single field of a definition.
    pub fn set_field(&mut self, id: BehaviorId, field: DefinitionField) -> CatalogResult<()> {
        self.get(id)?;
        match field {
            DefinitionField::Name(name) => {
                validate_name(&name)?;
                self.ensure_name_free(&name, Some(id))?;
                self.get_mut(id)?.name = name;
            }
            DefinitionField::Kind(kind) => {
                self.ensure_kind_change_allowed(id, kind)?;
                self.get_mut(id)?.kind = kind;
            }
            DefinitionField::Note(note) => self.get_mut(id)?.note = note,
            DefinitionField::Color(color) => self.get_mut(id)?.color_code = color,
        }
        Ok(())
    }

    /// Remove a definition and renumber the ones after it.
    pub fn delete_definition(&mut self, id: BehaviorId) -> CatalogResult<BehaviorDefinition> {
        self.get(id)?;
        let removed = self.definitions.remove(id);
        for (position, def) in self.definitions.iter_mut().enumerate().skip(id) {
            def.id = position;
        }
        tracing::debug!(id, name = %removed.name, "Deleted behavior");
        Ok(removed)
    }

    /// Commit a mark to a definition.
    pub fn commit_mark(&mut self, id: BehaviorId, mark: TimeMark) -> CatalogResult<()> {
        self.get_mut(id)?.push_mark(mark)
    }

    /// For every definition, remove the first mark covering `at`.
    ///
    /// At most one mark per definition is removed per call.
    pub fn delete_mark_at(&mut self, at: TimestampMs) -> Vec<RemovedMark> {
        self.definitions
            .iter_mut()
            .filter_map(|def| {
                def.remove_mark_at(at).map(|mark| RemovedMark {
                    id: def.id,
                    mark,
                })
            })
            .collect()
    }

    /// Report source videos that do not exist, relative paths resolved
    /// against `root` when given.
    pub fn validate_sources(&self, root: Option<&Path>) -> Vec<String> {
        self.video_paths
            .iter()
            .enumerate()
            .filter_map(|(index, path)| {
                let resolved = match root {
                    Some(root) if Path::new(path).is_relative() => root.join(path),
                    _ => Path::new(path).to_path_buf(),
                };
                (!resolved.exists()).then(|| format!("Source {index} missing: {path}"))
            })
            .collect()
    }

    fn ensure_name_free(&self, name: &str, except: Option<BehaviorId>) -> CatalogResult<()> {
        let taken = self
            .definitions
            .iter()
            .any(|def| def.name == name && Some(def.id) != except);
        if taken {
            return Err(CatalogError::DuplicateName {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn ensure_kind_change_allowed(&self, id: BehaviorId, kind: BehaviorKind) -> CatalogResult<()> {
        let def = self.get(id)?;
        if def.kind != kind && !def.marks.is_empty() {
            return Err(CatalogError::MarkKindMismatch {
                name: def.name.clone(),
                kind,
                mark: format!("{} existing {} marks", def.marks.len(), def.kind),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn catalog_with(names: &[(&str, BehaviorKind)]) -> BehaviorCatalog {
        let mut catalog = BehaviorCatalog::with_video_paths(vec!["a.mp4".to_string()]);
        for (name, kind) in names {
            catalog
                .add_definition(DefinitionSpec::new(*name, *kind))
                .unwrap();
        }
        catalog
    }

    #[test]
    fn test_add_assigns_positions() {
        let catalog = catalog_with(&[("lick", BehaviorKind::Event), ("groom", BehaviorKind::State)]);
        assert_eq!(catalog.get(0).unwrap().name(), "lick");
        assert_eq!(catalog.get(1).unwrap().id(), 1);
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut catalog = catalog_with(&[("lick", BehaviorKind::Event)]);
        let err = catalog
            .add_definition(DefinitionSpec::new("lick", BehaviorKind::State))
            .unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateName { .. }));
        assert_eq!(catalog.len(), 1);

        // Case-sensitive match only.
        assert!(catalog
            .add_definition(DefinitionSpec::new("Lick", BehaviorKind::Event))
            .is_ok());
    }

    #[test]
    fn test_invalid_name_rejected() {
        let mut catalog = BehaviorCatalog::new();
        let err = catalog
            .add_definition(DefinitionSpec::new("a/b", BehaviorKind::Event))
            .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidName { .. }));
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_modify_keeps_own_name_but_rejects_others() {
        let mut catalog = catalog_with(&[("lick", BehaviorKind::Event), ("groom", BehaviorKind::State)]);
        catalog
            .modify_definition(
                0,
                DefinitionSpec::new("lick", BehaviorKind::Event)
                    .with_note("tongue out")
                    .with_color("#ff0000"),
            )
            .unwrap();
        assert_eq!(catalog.get(0).unwrap().note(), "tongue out");
        assert_eq!(catalog.get(0).unwrap().color_code(), "#ff0000");

        let err = catalog
            .modify_definition(0, DefinitionSpec::new("groom", BehaviorKind::Event))
            .unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateName { .. }));
        assert_eq!(catalog.get(0).unwrap().name(), "lick");
    }

    #[test]
    fn test_kind_change_blocked_while_marks_exist() {
        let mut catalog = catalog_with(&[("lick", BehaviorKind::Event)]);
        catalog
            .set_field(0, DefinitionField::Kind(BehaviorKind::State))
            .unwrap();
        catalog.commit_mark(0, TimeMark::interval(1, 2)).unwrap();

        let err = catalog
            .set_field(0, DefinitionField::Kind(BehaviorKind::Event))
            .unwrap_err();
        assert!(matches!(err, CatalogError::MarkKindMismatch { .. }));
        assert_eq!(catalog.get(0).unwrap().kind(), BehaviorKind::State);
    }

    #[test]
    fn test_set_field_updates_single_field() {
        let mut catalog = catalog_with(&[("lick", BehaviorKind::Event)]);
        catalog
            .set_field(0, DefinitionField::Color("#123456".to_string()))
            .unwrap();
        catalog
            .set_field(0, DefinitionField::Name("sniff".to_string()))
            .unwrap();
        let def = catalog.get(0).unwrap();
        assert_eq!(def.color_code(), "#123456");
        assert_eq!(def.name(), "sniff");
        assert!(catalog
            .set_field(3, DefinitionField::Note(String::new()))
            .is_err());
    }

    #[test]
    fn test_delete_renumbers_following_definitions() {
        let mut catalog = catalog_with(&[
            ("a", BehaviorKind::Event),
            ("b", BehaviorKind::Event),
            ("c", BehaviorKind::State),
        ]);
        let removed = catalog.delete_definition(1).unwrap();
        assert_eq!(removed.name(), "b");
        assert_eq!(catalog.get(1).unwrap().name(), "c");
        assert_eq!(catalog.get(1).unwrap().id(), 1);

        let id = catalog
            .add_definition(DefinitionSpec::new("d", BehaviorKind::Event))
            .unwrap();
        assert_eq!(id, 2);
    }

    #[test]
    fn test_commit_mark_kind_contract() {
        let mut catalog = catalog_with(&[("lick", BehaviorKind::Event), ("groom", BehaviorKind::State)]);
        catalog.commit_mark(0, TimeMark::Instant(1500)).unwrap();
        assert!(matches!(
            catalog.commit_mark(0, TimeMark::interval(1, 2)),
            Err(CatalogError::MarkKindMismatch { .. })
        ));
        assert!(matches!(
            catalog.commit_mark(1, TimeMark::Instant(3)),
            Err(CatalogError::MarkKindMismatch { .. })
        ));
        assert!(matches!(
            catalog.commit_mark(7, TimeMark::Instant(3)),
            Err(CatalogError::UnknownBehavior { id: 7, count: 2 })
        ));
        assert_eq!(catalog.total_marks(), 1);
    }

    #[test]
    fn test_delete_mark_at_removes_first_covering_per_definition() {
        let mut catalog = catalog_with(&[("lick", BehaviorKind::Event), ("groom", BehaviorKind::State)]);
        catalog.commit_mark(0, TimeMark::Instant(500)).unwrap();
        catalog.commit_mark(0, TimeMark::Instant(500)).unwrap();
        catalog.commit_mark(1, TimeMark::interval(0, 1000)).unwrap();
        catalog.commit_mark(1, TimeMark::interval(400, 600)).unwrap();

        let removed = catalog.delete_mark_at(500);
        assert_eq!(
            removed,
            vec![
                RemovedMark { id: 0, mark: TimeMark::Instant(500) },
                RemovedMark { id: 1, mark: TimeMark::Interval([0, 1000]) },
            ]
        );
        assert_eq!(catalog.get(0).unwrap().marks().len(), 1);
        assert_eq!(catalog.get(1).unwrap().marks(), &[TimeMark::Interval([400, 600])]);

        assert!(catalog.delete_mark_at(2000).is_empty());
    }

    #[test]
    fn test_validate_sources_reports_missing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("present.mp4"), b"x").unwrap();
        let catalog = BehaviorCatalog::with_video_paths(vec![
            "present.mp4".to_string(),
            "missing.mp4".to_string(),
        ]);
        let errors = catalog.validate_sources(Some(dir.path()));
        assert_eq!(errors, vec!["Source 1 missing: missing.mp4".to_string()]);
    }

    proptest! {
        #[test]
        fn prop_duplicate_add_leaves_catalog_unchanged(name in "[a-z][a-z0-9_ ]{0,12}") {
            let mut catalog = BehaviorCatalog::new();
            catalog.add_definition(DefinitionSpec::new(name.clone(), BehaviorKind::Event)).unwrap();
            let before = catalog.clone();
            let result = catalog.add_definition(DefinitionSpec::new(name, BehaviorKind::State));
            prop_assert!(
                matches!(result, Err(CatalogError::DuplicateName { .. })),
                "expected DuplicateName error"
            );
            prop_assert_eq!(catalog, before);
        }

        #[test]
        fn prop_delete_mark_at_removes_at_most_one_per_definition(
            events in proptest::collection::vec(0u64..50, 0..20),
            states in proptest::collection::vec((0u64..50, 0u64..50), 0..20),
            at in 0u64..50,
        ) {
            let mut catalog = BehaviorCatalog::new();
            catalog.add_definition(DefinitionSpec::new("e", BehaviorKind::Event)).unwrap();
            catalog.add_definition(DefinitionSpec::new("s", BehaviorKind::State)).unwrap();
            for t in &events {
                catalog.commit_mark(0, TimeMark::Instant(*t)).unwrap();
            }
            for (a, b) in &states {
                catalog.commit_mark(1, TimeMark::interval(*a, *b)).unwrap();
            }
            let before: Vec<usize> = catalog.definitions().iter().map(|d| d.marks().len()).collect();

            let removed = catalog.delete_mark_at(at);
            for def in catalog.definitions() {
                let lost = before[def.id()] - def.marks().len();
                prop_assert!(lost <= 1);
            }
            for r in &removed {
                prop_assert!(r.mark.covers(at));
            }
        }
    }
}
