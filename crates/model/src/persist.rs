//! On-disk layout for catalogs.
//!
//! A saved session is a directory holding one `behav_<name>.json` file per
//! definition. A header file holds only the schema (names, kinds, colors,
//! notes) so a new annotation pass can start from an existing schema.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::behavior::{
    validate_name, BehaviorDefinition, BehaviorId, BehaviorKind, DefinitionSpec, TimeMark,
};
use crate::catalog::BehaviorCatalog;
use crate::error::{CatalogError, CatalogResult};

/// File name prefix of per-behavior files.
pub const FILE_PREFIX: &str = "behav";

/// Contents of a single `behav_<name>.json` file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorRecord {
    pub name: String,
    pub id: BehaviorId,
    #[serde(default)]
    pub note: String,
    #[serde(rename = "type")]
    pub kind: BehaviorKind,
    pub video_path: Vec<String>,
    pub color_code: String,
    #[serde(default)]
    pub time_ms: Vec<TimeMark>,
}

/// Contents of a header file: the schema without marks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogHeader {
    pub video_path: Vec<String>,
    pub behav_names: Vec<String>,
    pub types: Vec<BehaviorKind>,
    pub color_codes: Vec<String>,
    pub notes: Vec<String>,
}

impl BehaviorRecord {
    fn from_definition(def: &BehaviorDefinition, video_paths: &[String]) -> Self {
        Self {
            name: def.name.clone(),
            id: def.id,
            note: def.note.clone(),
            kind: def.kind,
            video_path: video_paths.to_vec(),
            color_code: def.color_code.clone(),
            time_ms: def.marks.clone(),
        }
    }

    /// File name this record is saved under.
    pub fn file_name(&self) -> String {
        record_file_name(&self.name)
    }

    /// Read and check a single behavior file.
    pub fn read(path: &Path) -> CatalogResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CatalogError::io(path, e))?;
        let record: Self = serde_json::from_str(&content)
            .map_err(|e| CatalogError::schema(path, e.to_string()))?;

        validate_name(&record.name).map_err(|e| CatalogError::schema(path, e.to_string()))?;
        if let Some(bad) = record
            .time_ms
            .iter()
            .find(|mark| mark.kind() != record.kind || !mark.is_well_formed())
        {
            return Err(CatalogError::schema(
                path,
                format!("{} behavior '{}' holds {bad}", record.kind, record.name),
            ));
        }
        Ok(record)
    }
}

impl CatalogHeader {
    /// Read a header file, checking the parallel arrays line up.
    pub fn read(path: &Path) -> CatalogResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CatalogError::io(path, e))?;
        let header: Self = serde_json::from_str(&content)
            .map_err(|e| CatalogError::schema(path, e.to_string()))?;

        let n = header.behav_names.len();
        if header.types.len() != n || header.color_codes.len() != n || header.notes.len() != n {
            return Err(CatalogError::schema(
                path,
                format!(
                    "header arrays differ in length (names {}, types {}, colors {}, notes {})",
                    n,
                    header.types.len(),
                    header.color_codes.len(),
                    header.notes.len()
                ),
            ));
        }
        Ok(header)
    }

    /// Definition specs in header order.
    pub fn specs(&self) -> impl Iterator<Item = DefinitionSpec> + '_ {
        self.behav_names
            .iter()
            .zip(&self.types)
            .zip(&self.color_codes)
            .zip(&self.notes)
            .map(|(((name, kind), color), note)| {
                DefinitionSpec::new(name.clone(), *kind)
                    .with_color(color.clone())
                    .with_note(note.clone())
            })
    }
}

/// File name for a behavior with the given name.
pub fn record_file_name(name: &str) -> String {
    format!("{FILE_PREFIX}_{name}.json")
}

fn is_record_file(file_name: &str) -> bool {
    file_name.contains(FILE_PREFIX) && file_name.contains(".json")
}

/// Hidden sibling of `dir` used while a save is in progress.
fn staging_dir(dir: &Path) -> PathBuf {
    let name = dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "catalog".to_string());
    dir.with_file_name(format!(".{name}.saving"))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> CatalogResult<()> {
    let json = serde_json::to_string_pretty(value).map_err(|e| CatalogError::Encode {
        path: path.to_path_buf(),
        source: e,
    })?;
    std::fs::write(path, json).map_err(|e| CatalogError::io(path, e))
}

impl BehaviorCatalog {
    /// Save every definition, with marks, into an empty directory.
    ///
    /// The directory is created if missing. A directory that already has
    /// entries is refused so sessions never overwrite or mix. Files are
    /// staged in a hidden sibling directory and moved into place only once
    /// all of them are written, so a failed save leaves `dir` untouched.
    pub fn save(&self, dir: impl AsRef<Path>) -> CatalogResult<Vec<PathBuf>> {
        let dir = dir.as_ref();
        if dir.exists() {
            let mut entries = std::fs::read_dir(dir).map_err(|e| CatalogError::io(dir, e))?;
            if entries.next().is_some() {
                return Err(CatalogError::DirectoryNotEmpty {
                    path: dir.to_path_buf(),
                });
            }
        }

        let staging = staging_dir(dir);
        if staging.exists() {
            std::fs::remove_dir_all(&staging).map_err(|e| CatalogError::io(&staging, e))?;
        }
        std::fs::create_dir_all(&staging).map_err(|e| CatalogError::io(&staging, e))?;

        let file_names = match self.write_records(&staging) {
            Ok(file_names) => file_names,
            Err(err) => {
                if let Err(cleanup) = std::fs::remove_dir_all(&staging) {
                    tracing::warn!(dir = %staging.display(), error = %cleanup, "Failed to remove staging directory");
                }
                return Err(err);
            }
        };

        if dir.exists() {
            std::fs::remove_dir(dir).map_err(|e| CatalogError::io(dir, e))?;
        }
        std::fs::rename(&staging, dir).map_err(|e| CatalogError::io(dir, e))?;

        tracing::info!(
            dir = %dir.display(),
            behaviors = self.definitions.len(),
            marks = self.total_marks(),
            "Saved behavior catalog"
        );
        Ok(file_names.into_iter().map(|name| dir.join(name)).collect())
    }

    fn write_records(&self, dir: &Path) -> CatalogResult<Vec<String>> {
        let mut file_names = Vec::with_capacity(self.definitions.len());
        for def in &self.definitions {
            let record = BehaviorRecord::from_definition(def, &self.video_paths);
            let file_name = record.file_name();
            write_json(&dir.join(&file_name), &record)?;
            file_names.push(file_name);
        }
        Ok(file_names)
    }

    /// Load a catalog saved with [`BehaviorCatalog::save`].
    ///
    /// Files are ordered by their stored id, then ids are reassigned to
    /// positions so the loaded catalog is dense again.
    pub fn load(dir: impl AsRef<Path>) -> CatalogResult<Self> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir).map_err(|e| CatalogError::io(dir, e))?;

        let mut records: Vec<(PathBuf, BehaviorRecord)> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| CatalogError::io(dir, e))?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if !is_record_file(file_name) || !entry.path().is_file() {
                continue;
            }
            let path = entry.path();
            let record = BehaviorRecord::read(&path)?;
            records.push((path, record));
        }
        records.sort_by_key(|(_, record)| record.id);

        let mut catalog = BehaviorCatalog::new();
        if let Some((_, first)) = records.first() {
            catalog.video_paths = first.video_path.clone();
        }

        for (position, (path, record)) in records.into_iter().enumerate() {
            if record.video_path != catalog.video_paths {
                tracing::warn!(
                    file = %path.display(),
                    "Behavior file lists different source videos; using the first file's list"
                );
            }
            if catalog.find_by_name(&record.name).is_some() {
                return Err(CatalogError::schema(
                    &path,
                    format!("behavior name '{}' appears in more than one file", record.name),
                ));
            }
            catalog.definitions.push(BehaviorDefinition {
                id: position,
                name: record.name,
                kind: record.kind,
                note: record.note,
                color_code: record.color_code,
                marks: record.time_ms,
            });
        }

        tracing::info!(
            dir = %dir.display(),
            behaviors = catalog.len(),
            marks = catalog.total_marks(),
            "Loaded behavior catalog"
        );
        Ok(catalog)
    }

    /// Build the header describing this catalog's schema.
    pub fn header(&self) -> CatalogHeader {
        CatalogHeader {
            video_path: self.video_paths.clone(),
            behav_names: self.definitions.iter().map(|d| d.name.clone()).collect(),
            types: self.definitions.iter().map(|d| d.kind).collect(),
            color_codes: self.definitions.iter().map(|d| d.color_code.clone()).collect(),
            notes: self.definitions.iter().map(|d| d.note.clone()).collect(),
        }
    }

    /// Save the schema only (no marks) to a file.
    pub fn save_header(&self, file: impl AsRef<Path>) -> CatalogResult<()> {
        let file = file.as_ref();
        if let Some(parent) = file.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| CatalogError::io(parent, e))?;
        }
        write_json(file, &self.header())?;
        tracing::info!(file = %file.display(), behaviors = self.len(), "Saved behavior header");
        Ok(())
    }

    /// Build a mark-free catalog from a header file.
    ///
    /// Source videos are not restored; a new pass sets its own.
    pub fn load_header(file: impl AsRef<Path>) -> CatalogResult<Self> {
        let file = file.as_ref();
        let header = CatalogHeader::read(file)?;

        let mut catalog = BehaviorCatalog::new();
        for spec in header.specs() {
            catalog
                .add_definition(spec)
                .map_err(|e| CatalogError::schema(file, e.to_string()))?;
        }
        tracing::info!(file = %file.display(), behaviors = catalog.len(), "Loaded behavior header");
        Ok(catalog)
    }
}
