//! Turns a validated configuration into one callable chain of executors.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::anyhow;

use crate::config::types::{DEFAULT_EXTENSION, DEFAULT_MODEL};
use crate::config::{ConfigManager, PipelineConfig};
use crate::error::PipelineError;
use crate::llm::GeneratorFactory;
use crate::pipeline::executor::StageExecutor;
use crate::pipeline::prompt;
use crate::pipeline::router::{ChainRouter, OutputRouter, TerminalRouter};
use crate::pipeline::source::{BatchSource, FsBatchSource, NullBatchSource};

/// Build the pipeline and return the entry stage's executor.
///
/// Executors are constructed in reverse visiting order (terminal first) so a
/// chaining router always captures an already-built downstream executor. The
/// manager moves behind a mutex owned by the entry executor, which is the
/// only writer of the watermark.
pub fn build_pipeline(
    manager: ConfigManager,
    factory: &dyn GeneratorFactory,
) -> Result<Arc<StageExecutor>, PipelineError> {
    let config = manager.config().clone();
    let entry = manager.resolve_entry_stage()?.to_string();
    let order = chain_order(&config, &entry)?;
    let manager = Arc::new(Mutex::new(manager));

    let mut built: HashMap<String, Arc<StageExecutor>> = HashMap::new();
    for name in order.iter().rev() {
        let stage = config
            .stages
            .get(name)
            .ok_or_else(|| PipelineError::Internal(anyhow!("stage '{name}' vanished during build")))?;

        let router: Box<dyn OutputRouter> = match (&stage.next, &stage.output_dir) {
            (None, Some(dir)) => Box::new(TerminalRouter::new(
                dir.clone(),
                normalize_extension(stage.extension.as_deref()),
            )),
            (Some(next), None) => {
                let downstream = built.get(next).cloned().ok_or_else(|| {
                    PipelineError::Internal(anyhow!(
                        "downstream stage '{next}' not built before '{name}'"
                    ))
                })?;
                Box::new(ChainRouter::new(next.clone(), downstream))
            }
            _ => {
                return Err(PipelineError::Internal(anyhow!(
                    "stage '{name}' escaped destination validation"
                )))
            }
        };

        let instructions = prompt::provider_for(stage).ok_or_else(|| {
            PipelineError::Internal(anyhow!("stage '{name}' escaped instruction validation"))
        })?;

        let model = stage
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let generator = factory.create(&model)?;

        let is_entry = *name == entry;
        let source: Box<dyn BatchSource> = if is_entry {
            Box::new(FsBatchSource::new(
                config.input_dir.clone(),
                &config.pattern,
                config.watermark.clone(),
                config.batch_size,
            )?)
        } else {
            Box::new(NullBatchSource)
        };

        let executor = StageExecutor::new(
            name.clone(),
            model,
            instructions,
            generator,
            source,
            router,
            is_entry.then(|| manager.clone()),
        );
        built.insert(name.clone(), Arc::new(executor));
    }

    built
        .remove(&entry)
        .ok_or_else(|| PipelineError::Internal(anyhow!("entry stage '{entry}' was not built")))
}

/// Linear visiting order from the entry to the terminal stage, derived once.
fn chain_order(config: &PipelineConfig, entry: &str) -> Result<Vec<String>, PipelineError> {
    let mut order = vec![entry.to_string()];
    let mut current = entry;

    while let Some(next) = config.stages.get(current).and_then(|s| s.next.as_deref()) {
        if order.iter().any(|seen| seen == next) || order.len() == config.stages.len() {
            return Err(PipelineError::Internal(anyhow!(
                "stage chain revisits '{next}'"
            )));
        }
        order.push(next.to_string());
        current = next;
    }

    Ok(order)
}

fn normalize_extension(extension: Option<&str>) -> String {
    match extension {
        None => DEFAULT_EXTENSION.to_string(),
        Some(ext) if ext.starts_with('.') => ext.to_string(),
        Some(ext) => format!(".{ext}"),
    }
}
