//! Check system capabilities.

use ethogram_common::config::{config_file_path, AppConfig};
use ethogram_extractor::{FfmpegSource, FrameSource};

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("Ethogram System Check");
    println!("{}", "=".repeat(50));

    let path = config_file_path();
    if path.exists() {
        println!("[OK] Config: {}", path.display());
    } else {
        println!("[OK] Config: defaults ({} not found)", path.display());
    }

    let source = FfmpegSource::new(&config.extraction);
    let ffmpeg_ok = source.is_available();
    let ffprobe_ok = source.probe_available();

    if ffmpeg_ok {
        println!("[OK] {} found", config.extraction.ffmpeg_bin);
    } else {
        println!("[MISSING] {} not found in PATH", config.extraction.ffmpeg_bin);
    }
    if ffprobe_ok {
        println!("[OK] {} found", config.extraction.ffprobe_bin);
    } else {
        println!("[MISSING] {} not found in PATH", config.extraction.ffprobe_bin);
    }

    println!(
        "     Clips: {} fps, {} ({}), .{}",
        config.extraction.clip_fps,
        config.extraction.clip_codec,
        config.extraction.clip_fourcc,
        config.extraction.clip_extension
    );
    println!("     Stills: .{}", config.extraction.still_extension);
    println!(
        "     Trigger keys: {} (undo {}, delete {})",
        config.annotation.trigger_keys, config.annotation.undo_key, config.annotation.delete_key
    );

    println!();
    if ffmpeg_ok && ffprobe_ok {
        println!("Epoch extraction is available.");
    } else {
        println!("Install ffmpeg to enable epoch extraction.");
    }

    Ok(())
}
