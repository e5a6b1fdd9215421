//! Output routing: persist a completed batch, or fold it into the next stage.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{PersistError, PipelineError};
use crate::pipeline::batch::Batch;
use crate::pipeline::executor::StageExecutor;

/// Capability interface: accept a completed batch and decide what happens
/// next. Selected per stage at build time.
#[async_trait]
pub trait OutputRouter: Send + Sync {
    async fn route(&self, batch: Batch) -> Result<(), PipelineError>;
}

/// Terminal router: writes the batch result as a file under the destination
/// directory, synchronously, before returning.
pub struct TerminalRouter {
    output_dir: PathBuf,
    extension: String,
}

impl TerminalRouter {
    pub fn new(output_dir: PathBuf, extension: String) -> Self {
        Self {
            output_dir,
            extension,
        }
    }

    /// Artifact stem from the batch's file-origin inputs: a single input's
    /// base name, or `first_to_last` over the group.
    fn artifact_stem(batch: &Batch) -> String {
        let stems: Vec<String> = batch
            .inputs
            .iter()
            .filter_map(|content| content.id.as_file())
            .map(|path| {
                path.file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.to_string_lossy().into_owned())
            })
            .collect();

        match stems.as_slice() {
            [] => batch
                .result
                .as_ref()
                .map(|result| result.id.to_string())
                .unwrap_or_else(|| "output".to_string()),
            [only] => only.clone(),
            [first, .., last] => format!("{first}_to_{last}"),
        }
    }
}

#[async_trait]
impl OutputRouter for TerminalRouter {
    async fn route(&self, batch: Batch) -> Result<(), PipelineError> {
        let result = batch
            .result
            .as_ref()
            .ok_or_else(|| PipelineError::internal("terminal route on a batch without result"))?;

        fs::create_dir_all(&self.output_dir).map_err(|source| PersistError::Artifact {
            path: self.output_dir.clone(),
            source,
        })?;

        let name = format!("{}{}", Self::artifact_stem(&batch), self.extension);
        let path = self.output_dir.join(name);
        fs::write(&path, &result.body).map_err(|source| PersistError::Artifact {
            path: path.clone(),
            source,
        })?;

        tracing::info!(artifact = %path.display(), "wrote artifact");
        Ok(())
    }
}

/// Chaining router: appends the stage result to the inputs and hands the new
/// batch to the downstream executor. The watermark candidate is deliberately
/// dropped so downstream stages can never trigger a watermark update.
pub struct ChainRouter {
    next_stage: String,
    next: Arc<StageExecutor>,
}

impl ChainRouter {
    pub fn new(next_stage: String, next: Arc<StageExecutor>) -> Self {
        Self { next_stage, next }
    }
}

#[async_trait]
impl OutputRouter for ChainRouter {
    async fn route(&self, batch: Batch) -> Result<(), PipelineError> {
        let Batch { mut inputs, result, .. } = batch;
        let result = result
            .ok_or_else(|| PipelineError::internal("chain route on a batch without result"))?;
        inputs.push(result);

        tracing::debug!(next = %self.next_stage, "chaining result to downstream stage");
        self.next.run_one(Batch::new(inputs, None)).await
    }
}
