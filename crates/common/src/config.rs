//! Application configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{EthogramError, EthogramResult};

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Trigger keys and annotation defaults.
    pub annotation: AnnotationDefaults,

    /// Epoch extraction parameters.
    pub extraction: ExtractionDefaults,

    /// Playback stepping parameters.
    pub playback: PlaybackDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Keys that feed the recorder, in behavior-id order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationDefaults {
    /// One character per behavior id, in order (`q` fires id 0, ...).
    pub trigger_keys: String,

    /// Discards the most recently opened interval selection.
    pub undo_key: char,

    /// Deletes marks covering the current playback time.
    pub delete_key: char,

    /// Color assigned to new behaviors when none is given.
    pub default_color: String,
}

/// Output parameters for extracted epochs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionDefaults {
    /// Frame rate of written clips.
    pub clip_fps: u32,

    /// ffmpeg video codec for clips.
    pub clip_codec: String,

    /// FourCC tag written into clip containers.
    pub clip_fourcc: String,

    /// File extension for clips (without dot).
    pub clip_extension: String,

    /// File extension for still frames (without dot).
    pub still_extension: String,

    /// ffmpeg executable name or path.
    pub ffmpeg_bin: String,

    /// ffprobe executable name or path.
    pub ffprobe_bin: String,
}

/// Playback stepping used when replaying annotation input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackDefaults {
    /// Frame rate assumed for frame stepping when no source reports one.
    pub fallback_fps: f64,

    /// Short relative jump (ms).
    pub small_jump_ms: u64,

    /// Long relative jump (ms).
    pub large_jump_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "ethogram=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AnnotationDefaults {
    fn default() -> Self {
        Self {
            trigger_keys: "qwertasdfg12345678".to_string(),
            undo_key: 'z',
            delete_key: 'x',
            default_color: "#ffffff".to_string(),
        }
    }
}

impl Default for ExtractionDefaults {
    fn default() -> Self {
        Self {
            clip_fps: 10,
            clip_codec: "mpeg4".to_string(),
            clip_fourcc: "XVID".to_string(),
            clip_extension: "avi".to_string(),
            still_extension: "jpg".to_string(),
            ffmpeg_bin: "ffmpeg".to_string(),
            ffprobe_bin: "ffprobe".to_string(),
        }
    }
}

impl Default for PlaybackDefaults {
    fn default() -> Self {
        Self {
            fallback_fps: 30.0,
            small_jump_ms: 5_000,
            large_jump_ms: 10_000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if !config_path.exists() {
            return Self::default();
        }
        match Self::load_from(&config_path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config at {:?}: {}", config_path, e);
                Self::default()
            }
        }
    }

    /// Load config from an explicit path.
    pub fn load_from(path: &Path) -> EthogramResult<Self> {
        if !path.exists() {
            return Err(EthogramError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to an explicit path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> EthogramResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Reject settings the rest of the pipeline cannot work with.
    pub fn validate(&self) -> EthogramResult<()> {
        let keys = &self.annotation;
        if keys.trigger_keys.is_empty() {
            return Err(EthogramError::config("annotation.trigger_keys is empty"));
        }
        let mut seen: Vec<char> = Vec::new();
        for key in keys
            .trigger_keys
            .chars()
            .chain([keys.undo_key, keys.delete_key])
        {
            let key = key.to_ascii_lowercase();
            if seen.contains(&key) {
                return Err(EthogramError::config(format!(
                    "key '{key}' is bound more than once"
                )));
            }
            seen.push(key);
        }
        if self.extraction.clip_fps == 0 {
            return Err(EthogramError::config("extraction.clip_fps must be > 0"));
        }
        if self.playback.fallback_fps <= 0.0 {
            return Err(EthogramError::config("playback.fallback_fps must be > 0"));
        }
        Ok(())
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("ethogram").join("config.json")
}
