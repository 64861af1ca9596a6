//! Show a saved behavior catalog.

use std::path::PathBuf;

use ethogram_common::config::AppConfig;
use ethogram_model::BehaviorCatalog;
use ethogram_recorder::Keymap;

pub fn run(path: PathBuf, config: &AppConfig) -> anyhow::Result<()> {
    let catalog = BehaviorCatalog::load(&path)
        .map_err(|e| anyhow::anyhow!("Failed to load catalog: {e}"))?;
    let keymap = Keymap::from_config(&config.annotation);

    println!("Catalog: {}", path.display());
    println!("  Behaviors: {}", catalog.len());
    println!("  Marks: {}", catalog.total_marks());
    println!();

    println!("Sources:");
    for (index, video) in catalog.video_paths().iter().enumerate() {
        println!("  ({index}) {video}");
    }
    println!();

    println!("Behaviors:");
    for def in catalog.definitions() {
        let key = keymap
            .key_for(def.id())
            .map(|k| k.to_ascii_uppercase().to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  [{key}] {} ({}, {}): {} mark(s)",
            def.name(),
            def.kind(),
            def.color_code(),
            def.marks().len()
        );
        if !def.note().is_empty() {
            println!("      {}", def.note());
        }
    }

    Ok(())
}
