//! Batch extraction of epochs from every source video.
//!
//! For each definition, for each mark, for each source video, one file is
//! written: a clip for a `State` interval, a still for an `Event`. Files
//! are named `{name}_{start_s}_{end_s}({source}).avi` and
//! `{name}_{t_s}({source}).jpg`, with seconds truncated. Two marks of one
//! behavior that truncate to the same name get `-2`, `-3`, ... appended
//! after the source index, in mark order.
//!
//! A failing item is recorded in the report and the batch moves on. Every
//! item, written or failed, is also reported through the progress callback.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use ethogram_common::config::ExtractionDefaults;
use ethogram_model::{BehaviorCatalog, BehaviorDefinition, TimeMark};

use crate::error::{ExtractError, ExtractResult};
use crate::source::{FfmpegSource, FrameSource, SourceInfo};

/// Progress callback for epoch extraction.
pub type ProgressCallback = Box<dyn Fn(ExtractionProgress) + Send>;

/// Extraction progress report.
#[derive(Debug, Clone)]
pub struct ExtractionProgress {
    /// Current progress [0.0, 1.0].
    pub progress: f64,

    /// Marks processed so far, across all behaviors.
    pub marks_done: usize,

    /// Total marks to process.
    pub total_marks: usize,

    /// Behavior currently being extracted.
    pub behavior: String,

    /// Current stage.
    pub stage: ExtractionStage,

    /// The item that just finished; set only for `Extracting` events.
    pub item: Option<ItemOutcome>,
}

/// What happened to one (mark, source) item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemOutcome {
    pub output: PathBuf,
    pub source_index: usize,
    /// Failure reason, `None` when the file was written.
    pub failure: Option<String>,
}

impl ItemOutcome {
    pub fn is_written(&self) -> bool {
        self.failure.is_none()
    }
}

/// Stages of an extraction batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStage {
    Preparing,
    Extracting,
    Complete,
    Cancelled,
}

/// One item that could not be written.
#[derive(Debug, Clone, Serialize)]
pub struct ItemFailure {
    pub behavior: String,
    pub mark: TimeMark,
    pub source_index: usize,
    pub output: PathBuf,
    pub reason: String,
}

/// A source that could not be opened.
#[derive(Debug, Clone, Serialize)]
pub struct UnreadableSource {
    pub index: usize,
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of an extraction batch.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionReport {
    pub output_dir: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub written: Vec<PathBuf>,
    pub failures: Vec<ItemFailure>,
    pub unreadable_sources: Vec<UnreadableSource>,
    pub cancelled: bool,
}

impl ExtractionReport {
    /// True when every item of every source was written.
    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.failures.is_empty() && self.unreadable_sources.is_empty()
    }
}

/// Base file name, without source suffix or extension, for a mark.
pub fn epoch_prefix(name: &str, mark: &TimeMark) -> String {
    match mark {
        TimeMark::Instant(t) => format!("{name}_{}", t / 1000),
        TimeMark::Interval([start, end]) => format!("{name}_{}_{}", start / 1000, end / 1000),
    }
}

/// Full file name of one epoch from one source.
pub fn epoch_file_name(prefix: &str, source_index: usize, extension: &str) -> String {
    format!("{prefix}({source_index}).{extension}")
}

/// First output path for an epoch not already claimed in this batch.
fn unclaimed_output(
    out_dir: &Path,
    prefix: &str,
    source_index: usize,
    extension: &str,
    claimed: &HashSet<PathBuf>,
) -> PathBuf {
    let output = out_dir.join(epoch_file_name(prefix, source_index, extension));
    if !claimed.contains(&output) {
        return output;
    }
    (2usize..)
        .map(|n| out_dir.join(format!("{prefix}({source_index})-{n}.{extension}")))
        .find(|candidate| !claimed.contains(candidate))
        .unwrap_or(output)
}

/// Cuts every mark of a catalog out of its source videos.
pub struct EpochExtractor<S: FrameSource> {
    catalog: BehaviorCatalog,
    source: S,
    clip_extension: String,
    still_extension: String,
    stop_flag: Arc<AtomicBool>,
}

impl EpochExtractor<FfmpegSource> {
    /// Extractor backed by ffmpeg with the given output settings.
    pub fn with_ffmpeg(catalog: BehaviorCatalog, config: &ExtractionDefaults) -> Self {
        Self::new(catalog, FfmpegSource::new(config), config)
    }
}

impl<S: FrameSource> EpochExtractor<S> {
    pub fn new(catalog: BehaviorCatalog, source: S, config: &ExtractionDefaults) -> Self {
        Self {
            catalog,
            source,
            clip_extension: config.clip_extension.clone(),
            still_extension: config.still_extension.clone(),
            stop_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn catalog(&self) -> &BehaviorCatalog {
        &self.catalog
    }

    /// Flag that stops the batch before its next mark when set.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop_flag)
    }

    /// Extract every epoch into `out_dir`.
    ///
    /// Fails only when no source can be opened or the output directory
    /// cannot be created; everything else lands in the report.
    pub fn extract_epochs(
        &self,
        out_dir: impl AsRef<Path>,
        progress: Option<ProgressCallback>,
    ) -> ExtractResult<ExtractionReport> {
        let out_dir = out_dir.as_ref();
        let started_at = Utc::now();

        std::fs::create_dir_all(out_dir).map_err(|e| ExtractError::Write {
            path: out_dir.to_path_buf(),
            source: e,
        })?;
        let has_entries = std::fs::read_dir(out_dir)
            .map_err(|e| ExtractError::Write {
                path: out_dir.to_path_buf(),
                source: e,
            })?
            .next()
            .is_some();
        if has_entries {
            tracing::warn!(dir = %out_dir.display(), "Output directory is not empty");
        }

        let total_marks = self.catalog.total_marks();
        if let Some(cb) = &progress {
            cb(ExtractionProgress {
                progress: 0.0,
                marks_done: 0,
                total_marks,
                behavior: String::new(),
                stage: ExtractionStage::Preparing,
                item: None,
            });
        }

        let (sources, unreadable_sources) = self.probe_sources();
        if sources.iter().all(Option::is_none) {
            return Err(ExtractError::NoReadableSource);
        }

        let mut report = ExtractionReport {
            output_dir: out_dir.to_path_buf(),
            started_at,
            finished_at: started_at,
            written: Vec::new(),
            failures: Vec::new(),
            unreadable_sources,
            cancelled: false,
        };

        let total_items = (total_marks * sources.len()).max(1);
        let mut items_done = 0usize;
        let mut marks_done = 0usize;
        let mut claimed = HashSet::new();
        'definitions: for def in self.catalog.definitions() {
            tracing::info!(
                behavior = def.name(),
                marks = def.marks().len(),
                "Extracting epochs"
            );
            for mark in def.marks() {
                if self.stop_flag.load(Ordering::Relaxed) {
                    report.cancelled = true;
                    break 'definitions;
                }

                let extension = match mark {
                    TimeMark::Instant(_) => &self.still_extension,
                    TimeMark::Interval(_) => &self.clip_extension,
                };
                let prefix = epoch_prefix(def.name(), mark);

                for (index, info) in sources.iter().enumerate() {
                    let output = unclaimed_output(out_dir, &prefix, index, extension, &claimed);
                    claimed.insert(output.clone());
                    let item = self.extract_item(output, def, mark, index, info, &mut report);

                    items_done += 1;
                    if index + 1 == sources.len() {
                        marks_done += 1;
                    }
                    if let Some(cb) = &progress {
                        cb(ExtractionProgress {
                            progress: items_done as f64 / total_items as f64,
                            marks_done,
                            total_marks,
                            behavior: def.name().to_string(),
                            stage: ExtractionStage::Extracting,
                            item: Some(item),
                        });
                    }
                }
            }
        }

        report.finished_at = Utc::now();
        if let Some(cb) = &progress {
            cb(ExtractionProgress {
                progress: if report.cancelled {
                    items_done as f64 / total_items as f64
                } else {
                    1.0
                },
                marks_done,
                total_marks,
                behavior: String::new(),
                stage: if report.cancelled {
                    ExtractionStage::Cancelled
                } else {
                    ExtractionStage::Complete
                },
                item: None,
            });
        }

        tracing::info!(
            written = report.written.len(),
            failed = report.failures.len(),
            unreadable_sources = report.unreadable_sources.len(),
            cancelled = report.cancelled,
            elapsed_ms = (report.finished_at - report.started_at).num_milliseconds(),
            "Extraction finished"
        );
        Ok(report)
    }

    /// Probe each source once. Unreadable ones stay in place as `None` so
    /// indices keep matching the catalog's video list.
    fn probe_sources(&self) -> (Vec<Option<SourceInfo>>, Vec<UnreadableSource>) {
        let mut sources = Vec::with_capacity(self.catalog.video_paths().len());
        let mut unreadable = Vec::new();

        for (index, path) in self.catalog.video_paths().iter().enumerate() {
            let path = PathBuf::from(path);
            match self.source.probe(&path) {
                Ok(info) => {
                    tracing::debug!(
                        index,
                        path = %path.display(),
                        duration_ms = info.duration_ms,
                        fps = info.fps,
                        "Probed source video"
                    );
                    sources.push(Some(info));
                }
                Err(err) => {
                    tracing::warn!(index, path = %path.display(), error = %err, "Source video unreadable");
                    unreadable.push(UnreadableSource {
                        index,
                        path,
                        reason: err.to_string(),
                    });
                    sources.push(None);
                }
            }
        }
        (sources, unreadable)
    }

    fn extract_item(
        &self,
        output: PathBuf,
        def: &BehaviorDefinition,
        mark: &TimeMark,
        index: usize,
        info: &Option<SourceInfo>,
        report: &mut ExtractionReport,
    ) -> ItemOutcome {
        let source_path = self
            .catalog
            .video_paths()
            .get(index)
            .map(PathBuf::from)
            .unwrap_or_default();

        let result = match info {
            None => Err(ExtractError::SourceUnreadable {
                path: source_path.clone(),
                reason: "source could not be opened".to_string(),
            }),
            Some(info) => match *mark {
                TimeMark::Instant(at) if at > info.duration_ms => Err(ExtractError::FrameRead {
                    path: source_path.clone(),
                    at_ms: at,
                    reason: format!("beyond source duration of {}ms", info.duration_ms),
                }),
                TimeMark::Instant(at) => self.source.write_still(&source_path, at, &output),
                TimeMark::Interval([start, end]) => {
                    self.source.write_clip(&source_path, start, end, &output)
                }
            },
        };

        match result {
            Ok(()) => {
                tracing::debug!(id = def.id(), output = %output.display(), "Wrote epoch");
                report.written.push(output.clone());
                ItemOutcome {
                    output,
                    source_index: index,
                    failure: None,
                }
            }
            Err(err) => {
                tracing::warn!(
                    behavior = def.name(),
                    mark = %mark,
                    source = index,
                    error = %err,
                    "Failed to extract epoch"
                );
                let reason = err.to_string();
                report.failures.push(ItemFailure {
                    behavior: def.name().to_string(),
                    mark: *mark,
                    source_index: index,
                    output: output.clone(),
                    reason: reason.clone(),
                });
                ItemOutcome {
                    output,
                    source_index: index,
                    failure: Some(reason),
                }
            }
        }
    }
}

/// Extract epochs with the ffmpeg backend off the async runtime.
///
/// This is the main entry point for extraction.
pub async fn export_epochs(
    catalog: BehaviorCatalog,
    out_dir: PathBuf,
    config: ExtractionDefaults,
    progress: Option<ProgressCallback>,
) -> ExtractResult<ExtractionReport> {
    tracing::info!(
        output = %out_dir.display(),
        behaviors = catalog.len(),
        sources = catalog.video_paths().len(),
        "Starting epoch extraction"
    );

    let extractor = EpochExtractor::with_ffmpeg(catalog, &config);
    if !extractor.source.is_available() {
        return Err(ExtractError::BackendUnavailable {
            backend: extractor.source.name().to_string(),
        });
    }

    tokio::task::spawn_blocking(move || extractor.extract_epochs(&out_dir, progress))
        .await
        .map_err(|e| ExtractError::Task(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use ethogram_model::{BehaviorKind, DefinitionSpec};

    /// Writes a marker file per item; sources whose path contains
    /// "broken" cannot be probed.
    #[derive(Default)]
    struct MockSource {
        calls: Mutex<Vec<String>>,
    }

    impl FrameSource for MockSource {
        fn probe(&self, source: &Path) -> ExtractResult<SourceInfo> {
            if source.to_string_lossy().contains("broken") {
                return Err(ExtractError::SourceUnreadable {
                    path: source.to_path_buf(),
                    reason: "mock".to_string(),
                });
            }
            Ok(SourceInfo {
                duration_ms: 60_000,
                fps: 30.0,
            })
        }

        fn write_clip(
            &self,
            source: &Path,
            start: u64,
            end: u64,
            output: &Path,
        ) -> ExtractResult<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("clip {} {start} {end}", source.display()));
            std::fs::write(output, b"clip").map_err(|e| ExtractError::Write {
                path: output.to_path_buf(),
                source: e,
            })
        }

        fn write_still(&self, source: &Path, at: u64, output: &Path) -> ExtractResult<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("still {} {at}", source.display()));
            std::fs::write(output, b"still").map_err(|e| ExtractError::Write {
                path: output.to_path_buf(),
                source: e,
            })
        }

        fn is_available(&self) -> bool {
            true
        }

        fn name(&self) -> &str {
            "mock"
        }
    }

    fn catalog(video_paths: &[&str]) -> BehaviorCatalog {
        let mut catalog =
            BehaviorCatalog::with_video_paths(video_paths.iter().map(|p| p.to_string()).collect());
        let lick = catalog
            .add_definition(DefinitionSpec::new("lick", BehaviorKind::Event))
            .unwrap();
        catalog.commit_mark(lick, TimeMark::Instant(1500)).unwrap();
        let groom = catalog
            .add_definition(DefinitionSpec::new("groom", BehaviorKind::State))
            .unwrap();
        catalog
            .commit_mark(groom, TimeMark::interval(2000, 4500))
            .unwrap();
        catalog
    }

    fn file_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_epoch_names() {
        assert_eq!(epoch_prefix("lick", &TimeMark::Instant(1500)), "lick_1");
        assert_eq!(
            epoch_prefix("groom", &TimeMark::Interval([2000, 4500])),
            "groom_2_4"
        );
        assert_eq!(epoch_file_name("lick_1", 1, "jpg"), "lick_1(1).jpg");
    }

    #[test]
    fn test_extract_two_sources() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = EpochExtractor::new(
            catalog(&["top.mp4", "side.mp4"]),
            MockSource::default(),
            &ExtractionDefaults::default(),
        );

        let report = extractor.extract_epochs(dir.path(), None).unwrap();
        assert!(report.is_complete());
        assert_eq!(report.written.len(), 4);
        assert_eq!(
            file_names(dir.path()),
            vec![
                "groom_2_4(0).avi",
                "groom_2_4(1).avi",
                "lick_1(0).jpg",
                "lick_1(1).jpg",
            ]
        );

        let calls = extractor.source.calls.lock().unwrap();
        assert!(calls.contains(&"clip side.mp4 2000 4500".to_string()));
        assert!(calls.contains(&"still top.mp4 1500".to_string()));
    }

    #[test]
    fn test_marks_sharing_a_second_get_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = BehaviorCatalog::with_video_paths(vec!["top.mp4".to_string()]);
        let lick = catalog
            .add_definition(DefinitionSpec::new("lick", BehaviorKind::Event))
            .unwrap();
        catalog.commit_mark(lick, TimeMark::Instant(1200)).unwrap();
        catalog.commit_mark(lick, TimeMark::Instant(1800)).unwrap();
        catalog.commit_mark(lick, TimeMark::Instant(1900)).unwrap();

        let extractor =
            EpochExtractor::new(catalog, MockSource::default(), &ExtractionDefaults::default());
        let report = extractor.extract_epochs(dir.path(), None).unwrap();

        assert!(report.is_complete());
        assert_eq!(report.written.len(), 3);
        assert_eq!(
            report.written,
            vec![
                dir.path().join("lick_1(0).jpg"),
                dir.path().join("lick_1(0)-2.jpg"),
                dir.path().join("lick_1(0)-3.jpg"),
            ]
        );
        assert_eq!(file_names(dir.path()).len(), 3);

        let calls = extractor.source.calls.lock().unwrap();
        assert_eq!(calls[1], "still top.mp4 1800");
    }

    #[test]
    fn test_each_item_reaches_progress_callback() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = EpochExtractor::new(
            catalog(&["top.mp4", "broken.mp4"]),
            MockSource::default(),
            &ExtractionDefaults::default(),
        );

        let events = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&events);
        extractor
            .extract_epochs(
                dir.path(),
                Some(Box::new(move |p: ExtractionProgress| {
                    seen.lock().unwrap().push(p)
                })),
            )
            .unwrap();

        let events = events.lock().unwrap();
        let items: Vec<&ItemOutcome> = events.iter().filter_map(|p| p.item.as_ref()).collect();
        assert_eq!(items.len(), 4);

        let failed: Vec<&&ItemOutcome> = items.iter().filter(|item| !item.is_written()).collect();
        assert_eq!(failed.len(), 2);
        assert!(failed.iter().all(|item| item.source_index == 1));
        assert_eq!(failed[0].output, dir.path().join("lick_1(1).jpg"));
        assert!(failed[0]
            .failure
            .as_deref()
            .unwrap()
            .contains("could not be opened"));

        let progress: Vec<f64> = events
            .iter()
            .filter(|p| p.stage == ExtractionStage::Extracting)
            .map(|p| p.progress)
            .collect();
        assert_eq!(progress, vec![0.25, 0.5, 0.75, 1.0]);
        assert_eq!(events.last().unwrap().stage, ExtractionStage::Complete);
        assert_eq!(events.last().unwrap().marks_done, 2);
    }

    #[test]
    fn test_unreadable_source_does_not_fail_batch() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = EpochExtractor::new(
            catalog(&["top.mp4", "broken.mp4"]),
            MockSource::default(),
            &ExtractionDefaults::default(),
        );

        let report = extractor.extract_epochs(dir.path(), None).unwrap();
        assert!(!report.is_complete());
        assert_eq!(report.unreadable_sources.len(), 1);
        assert_eq!(report.unreadable_sources[0].index, 1);
        assert_eq!(
            file_names(dir.path()),
            vec!["groom_2_4(0).avi", "lick_1(0).jpg"]
        );
        assert_eq!(report.failures.len(), 2);
        assert!(report.failures.iter().all(|f| f.source_index == 1));
    }

    #[test]
    fn test_no_readable_source() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = EpochExtractor::new(
            catalog(&["broken.mp4"]),
            MockSource::default(),
            &ExtractionDefaults::default(),
        );
        assert!(matches!(
            extractor.extract_epochs(dir.path(), None),
            Err(ExtractError::NoReadableSource)
        ));
    }

    #[test]
    fn test_still_beyond_duration_is_frame_read_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = BehaviorCatalog::with_video_paths(vec!["top.mp4".to_string()]);
        let id = catalog
            .add_definition(DefinitionSpec::new("late", BehaviorKind::Event))
            .unwrap();
        catalog.commit_mark(id, TimeMark::Instant(90_000)).unwrap();

        let extractor =
            EpochExtractor::new(catalog, MockSource::default(), &ExtractionDefaults::default());
        let report = extractor.extract_epochs(dir.path(), None).unwrap();
        assert!(report.written.is_empty());
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].reason.contains("beyond source duration"));
    }

    #[test]
    fn test_cancel_before_start() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = EpochExtractor::new(
            catalog(&["top.mp4"]),
            MockSource::default(),
            &ExtractionDefaults::default(),
        );
        extractor.cancel_handle().store(true, Ordering::Relaxed);

        let stages = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&stages);
        let report = extractor
            .extract_epochs(
                dir.path(),
                Some(Box::new(move |p: ExtractionProgress| {
                    seen.lock().unwrap().push(p.stage)
                })),
            )
            .unwrap();

        assert!(report.cancelled);
        assert!(report.written.is_empty());
        assert_eq!(
            stages.lock().unwrap().last(),
            Some(&ExtractionStage::Cancelled)
        );
    }

    #[test]
    fn test_report_serializes_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = EpochExtractor::new(
            catalog(&["top.mp4"]),
            MockSource::default(),
            &ExtractionDefaults::default(),
        );
        let report = extractor.extract_epochs(dir.path(), None).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        let started = json["started_at"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(started).is_ok());
        assert_eq!(json["written"].as_array().unwrap().len(), 2);
    }
}
