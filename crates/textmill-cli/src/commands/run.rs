use std::path::Path;

use anyhow::{Context, Result};

use textmill_core::{build_pipeline, ConfigManager, HttpGeneratorFactory};

/// Execute the `run` command: load, validate, build and run a pipeline.
pub async fn execute(config_path: &Path) -> Result<()> {
    let manager = ConfigManager::load(config_path)
        .with_context(|| format!("failed to load pipeline config: {}", config_path.display()))?;

    let entry = manager.resolve_entry_stage()?.to_string();
    tracing::info!(
        config = %config_path.display(),
        entry_stage = %entry,
        stages = manager.config().stages.len(),
        input_dir = %manager.config().input_dir.display(),
        "pipeline validated"
    );

    let factory = HttpGeneratorFactory::new(manager.env().clone());
    let pipeline = build_pipeline(manager, &factory)?;
    let summary = pipeline.run_all().await?;

    if summary.batches == 0 {
        println!("No new documents to process.");
    } else {
        println!(
            "Processed {} batch(es) covering {} document(s).",
            summary.batches, summary.documents
        );
    }
    Ok(())
}
