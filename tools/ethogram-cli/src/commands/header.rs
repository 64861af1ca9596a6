//! Write a catalog header file.

use std::path::PathBuf;

use ethogram_model::BehaviorCatalog;

pub fn run(path: PathBuf, output: PathBuf) -> anyhow::Result<()> {
    let catalog = BehaviorCatalog::load(&path)
        .map_err(|e| anyhow::anyhow!("Failed to load catalog: {e}"))?;
    catalog
        .save_header(&output)
        .map_err(|e| anyhow::anyhow!("Failed to write header: {e}"))?;

    println!(
        "Wrote header for {} behavior(s) to {}",
        catalog.len(),
        output.display()
    );
    Ok(())
}
