//! Extract epochs for every mark of a catalog.

use std::io::Write;
use std::path::PathBuf;

use ethogram_common::config::AppConfig;
use ethogram_extractor::{export_epochs, ExtractionProgress, ProgressCallback};
use ethogram_model::BehaviorCatalog;

pub async fn run(
    path: PathBuf,
    output: PathBuf,
    report_path: Option<PathBuf>,
    config: &AppConfig,
) -> anyhow::Result<()> {
    println!("Extracting epochs from: {}", path.display());

    let catalog = BehaviorCatalog::load(&path)
        .map_err(|e| anyhow::anyhow!("Failed to load catalog: {e}"))?;

    println!("  Output: {}", output.display());
    println!(
        "  Behaviors: {}, marks: {}, sources: {}",
        catalog.len(),
        catalog.total_marks(),
        catalog.video_paths().len()
    );

    let progress_cb: ProgressCallback = Box::new(|p: ExtractionProgress| {
        if let Some(item) = &p.item {
            if let Some(reason) = &item.failure {
                println!(
                    "\r  Failed: {} (source {}): {reason}",
                    item.output.display(),
                    item.source_index
                );
            }
        }
        print!(
            "\r  Progress: {:.1}% ({}/{} marks) {}    ",
            p.progress * 100.0,
            p.marks_done,
            p.total_marks,
            p.behavior,
        );
        let _ = std::io::stdout().flush();
    });

    let report = export_epochs(catalog, output, config.extraction.clone(), Some(progress_cb))
        .await
        .map_err(|e| anyhow::anyhow!("Extraction failed: {e}"))?;

    println!();
    println!("  Written: {}", report.written.len());
    for source in &report.unreadable_sources {
        println!("  Unreadable source ({}): {}", source.index, source.reason);
    }

    if let Some(report_path) = report_path {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(&report_path, json)?;
        println!("  Report: {}", report_path.display());
    }

    if report.is_complete() {
        println!("\nExtraction complete.");
    } else {
        println!(
            "\nExtraction finished with {} failed item(s).",
            report.failures.len()
        );
    }
    Ok(())
}
