//! Replay a scripted annotation pass and save the result.

use std::path::PathBuf;

use ethogram_common::config::AppConfig;
use ethogram_common::playback::PlaybackCursor;
use ethogram_extractor::{FfmpegSource, FrameSource};
use ethogram_model::{BehaviorKind, DefinitionSpec};
use ethogram_recorder::{parse_input_log, replay, AnnotationSession, Keymap};

pub struct ReplayArgs {
    pub script: PathBuf,
    pub videos: Vec<PathBuf>,
    pub header: Option<PathBuf>,
    pub behaviors: Vec<String>,
    pub duration_ms: Option<u64>,
    pub output: PathBuf,
}

pub fn run(args: ReplayArgs, config: &AppConfig) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(&args.script)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", args.script.display()))?;
    let steps = parse_input_log(&text)?;

    let video_paths: Vec<String> = args
        .videos
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect();

    let mut session = AnnotationSession::new(Keymap::from_config(&config.annotation));
    match &args.header {
        Some(header) => session.load_header(header, video_paths)?,
        None => session.start_new(video_paths)?,
    }
    for raw in &args.behaviors {
        let spec = parse_behavior_arg(raw, &config.annotation.default_color)?;
        session.add_definition(spec)?;
    }
    if session.catalog()?.is_empty() {
        anyhow::bail!("No behaviors defined; pass --header or --behavior");
    }

    let mut cursor = PlaybackCursor::new(args.duration_ms.unwrap_or(0), &config.playback);
    let source = FfmpegSource::new(&config.extraction);
    let mut probed_duration = 0;
    for video in &args.videos {
        match source.probe(video) {
            Ok(info) => {
                cursor.register_source_fps(info.fps);
                probed_duration = probed_duration.max(info.duration_ms);
            }
            Err(e) => tracing::warn!(error = %e, "Could not probe source video"),
        }
    }
    if args.duration_ms.is_none() {
        if probed_duration == 0 {
            anyhow::bail!("Could not determine recording length; pass --duration-ms");
        }
        cursor.set_duration(probed_duration);
    }

    println!("Replaying {} step(s) from {}", steps.len(), args.script.display());
    println!(
        "  Duration: {}ms, stepping at {} fps",
        cursor.duration_ms(),
        cursor.fps()
    );

    let summary = replay(&mut session, &mut cursor, &steps)?;
    let pending = session.recorder().open_selections();
    if !pending.is_empty() {
        println!(
            "  {} selection(s) still open at the end of the script were dropped",
            pending.len()
        );
    }

    let written = session.save(&args.output)?;
    let catalog = session.catalog()?;
    println!(
        "  Triggers: {} ({} unbound key(s) ignored)",
        summary.triggers, summary.ignored_keys
    );
    println!(
        "Saved {} behavior(s), {} mark(s) to {} ({} file(s))",
        catalog.len(),
        catalog.total_marks(),
        args.output.display(),
        written.len()
    );
    Ok(())
}

/// Parse `name:kind[:color]`.
fn parse_behavior_arg(raw: &str, default_color: &str) -> anyhow::Result<DefinitionSpec> {
    let mut parts = raw.splitn(3, ':');
    let name = parts.next().unwrap_or_default();
    let kind = parts
        .next()
        .ok_or_else(|| anyhow::anyhow!("Behavior '{raw}' needs a kind: name:event or name:state"))?
        .parse::<BehaviorKind>()
        .map_err(|e| anyhow::anyhow!("Behavior '{raw}': {e}"))?;
    let color = parts.next().unwrap_or(default_color);
    Ok(DefinitionSpec::new(name, kind).with_color(color))
}
