//! Validate a behavior catalog.

use std::path::PathBuf;

use ethogram_model::BehaviorCatalog;

pub fn run(path: PathBuf, root: Option<PathBuf>) -> anyhow::Result<()> {
    println!("Validating catalog at: {}", path.display());

    let catalog = BehaviorCatalog::load(&path)
        .map_err(|e| anyhow::anyhow!("Failed to load catalog: {e}"))?;

    println!("  Behaviors: {}", catalog.len());
    println!("  Marks: {}", catalog.total_marks());
    println!("  Sources: {}", catalog.video_paths().len());

    let errors = catalog.validate_sources(root.as_deref());
    if errors.is_empty() {
        println!("  Sources: All present");
        println!("\nCatalog is valid.");
    } else {
        println!("\nValidation issues:");
        for error in &errors {
            println!("  - {error}");
        }
        println!(
            "\n{} issue(s) found. Extraction will skip missing sources.",
            errors.len()
        );
    }

    Ok(())
}
