//! Frame backends that read source videos and write epoch files.

use std::path::Path;
use std::process::{Command, Stdio};

use serde::Deserialize;

use ethogram_common::config::ExtractionDefaults;
use ethogram_model::TimestampMs;

use crate::error::{ExtractError, ExtractResult};

/// What a probe learns about a source video.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceInfo {
    pub duration_ms: TimestampMs,
    pub fps: f64,
}

/// Trait for frame backends (ffmpeg, test doubles).
pub trait FrameSource: Send {
    /// Open a source and read its duration and frame rate.
    fn probe(&self, source: &Path) -> ExtractResult<SourceInfo>;

    /// Write the frames of `[start, end]` to a clip file.
    fn write_clip(
        &self,
        source: &Path,
        start: TimestampMs,
        end: TimestampMs,
        output: &Path,
    ) -> ExtractResult<()>;

    /// Write the frame at `at` to a still image.
    fn write_still(&self, source: &Path, at: TimestampMs, output: &Path) -> ExtractResult<()>;

    /// Check if this backend is available on the system.
    fn is_available(&self) -> bool;

    /// Backend name.
    fn name(&self) -> &str;
}

/// Backend that shells out to `ffmpeg` and `ffprobe`.
#[derive(Debug, Clone)]
pub struct FfmpegSource {
    ffmpeg_bin: String,
    ffprobe_bin: String,
    clip_fps: u32,
    clip_codec: String,
    clip_fourcc: String,
}

impl FfmpegSource {
    pub fn new(config: &ExtractionDefaults) -> Self {
        Self {
            ffmpeg_bin: config.ffmpeg_bin.clone(),
            ffprobe_bin: config.ffprobe_bin.clone(),
            clip_fps: config.clip_fps,
            clip_codec: config.clip_codec.clone(),
            clip_fourcc: config.clip_fourcc.clone(),
        }
    }

    /// Whether `ffprobe` is on the PATH as well.
    pub fn probe_available(&self) -> bool {
        command_exists(&self.ffprobe_bin)
    }

    fn run_ffmpeg(&self, args: &[String], source: &Path, at_ms: TimestampMs) -> ExtractResult<()> {
        tracing::debug!(args = ?args, "Running ffmpeg");
        let output = Command::new(&self.ffmpeg_bin)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| ExtractError::FrameRead {
                path: source.to_path_buf(),
                at_ms,
                reason: format!("failed to start {}: {e}", self.ffmpeg_bin),
            })?;

        if !output.status.success() {
            return Err(ExtractError::FrameRead {
                path: source.to_path_buf(),
                at_ms,
                reason: format!(
                    "ffmpeg exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(())
    }
}

impl Default for FfmpegSource {
    fn default() -> Self {
        Self::new(&ExtractionDefaults::default())
    }
}

impl FrameSource for FfmpegSource {
    fn probe(&self, source: &Path) -> ExtractResult<SourceInfo> {
        let unreadable = |reason: String| ExtractError::SourceUnreadable {
            path: source.to_path_buf(),
            reason,
        };

        if !source.is_file() {
            return Err(unreadable("file does not exist".to_string()));
        }

        let output = Command::new(&self.ffprobe_bin)
            .args(probe_args())
            .arg(source)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| unreadable(format!("failed to run {}: {e}", self.ffprobe_bin)))?;

        if !output.status.success() {
            return Err(unreadable(format!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        parse_probe_output(&String::from_utf8_lossy(&output.stdout)).map_err(unreadable)
    }

    fn write_clip(
        &self,
        source: &Path,
        start: TimestampMs,
        end: TimestampMs,
        output: &Path,
    ) -> ExtractResult<()> {
        let args = clip_args(
            source,
            start,
            end,
            self.clip_fps,
            &self.clip_codec,
            &self.clip_fourcc,
            output,
        );
        self.run_ffmpeg(&args, source, start)?;
        ensure_written(source, start, output)
    }

    fn write_still(&self, source: &Path, at: TimestampMs, output: &Path) -> ExtractResult<()> {
        let args = still_args(source, at, output);
        self.run_ffmpeg(&args, source, at)?;
        ensure_written(source, at, output)
    }

    fn is_available(&self) -> bool {
        command_exists(&self.ffmpeg_bin) && command_exists(&self.ffprobe_bin)
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

/// ffmpeg seconds argument for a millisecond timestamp.
fn seconds_arg(ms: TimestampMs) -> String {
    format!("{}.{:03}", ms / 1000, ms % 1000)
}

fn probe_args() -> [&'static str; 8] {
    [
        "-v",
        "error",
        "-select_streams",
        "v:0",
        "-show_entries",
        "format=duration:stream=r_frame_rate,avg_frame_rate,duration",
        "-of",
        "json",
    ]
}

/// Arguments cutting `[start, end]` at a fixed frame rate.
///
/// A zero-length interval still yields one frame period of output.
pub fn clip_args(
    source: &Path,
    start: TimestampMs,
    end: TimestampMs,
    fps: u32,
    codec: &str,
    fourcc: &str,
    output: &Path,
) -> Vec<String> {
    let frame_ms = (1000 / u64::from(fps.max(1))).max(1);
    let length = end.saturating_sub(start).max(frame_ms);
    vec![
        "-y".to_string(),
        "-nostdin".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-ss".to_string(),
        seconds_arg(start),
        "-i".to_string(),
        source.to_string_lossy().into_owned(),
        "-t".to_string(),
        seconds_arg(length),
        "-an".to_string(),
        "-r".to_string(),
        fps.to_string(),
        "-c:v".to_string(),
        codec.to_string(),
        "-vtag".to_string(),
        fourcc.to_string(),
        output.to_string_lossy().into_owned(),
    ]
}

/// Arguments writing the single frame at `at`.
pub fn still_args(source: &Path, at: TimestampMs, output: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-nostdin".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-ss".to_string(),
        seconds_arg(at),
        "-i".to_string(),
        source.to_string_lossy().into_owned(),
        "-frames:v".to_string(),
        "1".to_string(),
        "-q:v".to_string(),
        "2".to_string(),
        output.to_string_lossy().into_owned(),
    ]
}

#[derive(Debug, Default, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    #[serde(default)]
    format: Option<ProbeFormat>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeStream {
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Parse `ffprobe -of json` output into a [`SourceInfo`].
pub fn parse_probe_output(json: &str) -> Result<SourceInfo, String> {
    let probe: ProbeOutput =
        serde_json::from_str(json).map_err(|e| format!("unreadable ffprobe output: {e}"))?;
    let stream = probe
        .streams
        .first()
        .ok_or_else(|| "no video stream".to_string())?;

    let duration_secs = probe
        .format
        .as_ref()
        .and_then(|format| format.duration.as_deref())
        .or(stream.duration.as_deref())
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .ok_or_else(|| "unknown duration".to_string())?;

    let fps = [stream.avg_frame_rate.as_deref(), stream.r_frame_rate.as_deref()]
        .into_iter()
        .flatten()
        .filter_map(parse_frame_rate)
        .next()
        .unwrap_or(0.0);

    Ok(SourceInfo {
        duration_ms: (duration_secs * 1000.0).round() as TimestampMs,
        fps,
    })
}

/// Parse `"30000/1001"` or `"29.97"`. Zero and unparsable rates are `None`.
pub fn parse_frame_rate(raw: &str) -> Option<f64> {
    let rate = match raw.split_once('/') {
        Some((num, den)) => {
            let num = num.trim().parse::<f64>().ok()?;
            let den = den.trim().parse::<f64>().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => raw.trim().parse::<f64>().ok()?,
    };
    (rate.is_finite() && rate > 0.0).then_some(rate)
}

fn ensure_written(source: &Path, at_ms: TimestampMs, output: &Path) -> ExtractResult<()> {
    match std::fs::metadata(output) {
        Ok(meta) if meta.len() > 0 => Ok(()),
        Ok(_) => Err(ExtractError::FrameRead {
            path: source.to_path_buf(),
            at_ms,
            reason: format!("{} is empty", output.display()),
        }),
        Err(_) => Err(ExtractError::FrameRead {
            path: source.to_path_buf(),
            at_ms,
            reason: format!("{} was not written", output.display()),
        }),
    }
}

pub(crate) fn command_exists(binary: &str) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}
