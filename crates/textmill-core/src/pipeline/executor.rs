//! Per-stage execution: the per-batch unit of work and the entry-stage loop.

use std::sync::{Arc, Mutex};

use crate::config::ConfigManager;
use crate::error::PipelineError;
use crate::llm::Generator;
use crate::pipeline::batch::{Batch, NamedContent};
use crate::pipeline::prompt::InstructionProvider;
use crate::pipeline::router::OutputRouter;
use crate::pipeline::source::BatchSource;

/// What one `run_all` accomplished, for the caller to report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub batches: usize,
    pub documents: usize,
}

/// Runs one stage. The entry stage is driven through [`run_all`]; downstream
/// stages only ever see [`run_one`], called by an upstream chaining router.
///
/// [`run_all`]: StageExecutor::run_all
/// [`run_one`]: StageExecutor::run_one
pub struct StageExecutor {
    name: String,
    model: String,
    instructions: Box<dyn InstructionProvider>,
    generator: Arc<dyn Generator>,
    source: Box<dyn BatchSource>,
    router: Box<dyn OutputRouter>,
    /// Present only on the entry stage: where completed batches advance the
    /// watermark.
    manager: Option<Arc<Mutex<ConfigManager>>>,
}

impl StageExecutor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: String,
        model: String,
        instructions: Box<dyn InstructionProvider>,
        generator: Arc<dyn Generator>,
        source: Box<dyn BatchSource>,
        router: Box<dyn OutputRouter>,
        manager: Option<Arc<Mutex<ConfigManager>>>,
    ) -> Self {
        Self {
            name,
            model,
            instructions,
            generator,
            source,
            router,
            manager,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Drain the batch source, oldest first, halting at the first failure.
    ///
    /// The watermark advances after each source-formed batch completes the
    /// entire chain, so a persisted watermark always marks a contiguous,
    /// verified prefix of completed work and a re-run resumes exactly at the
    /// failed batch.
    pub async fn run_all(&self) -> Result<RunSummary, PipelineError> {
        let batches = self.source.collect()?;
        if batches.is_empty() {
            tracing::info!(stage = %self.name, "no new documents to process");
            return Ok(RunSummary::default());
        }

        tracing::info!(stage = %self.name, batches = batches.len(), "starting run");
        let mut summary = RunSummary::default();
        for batch in batches {
            let ids = batch.input_ids().join(", ");
            let documents = batch.inputs.len();
            let watermark = batch.watermark.clone();

            tracing::info!(stage = %self.name, inputs = %ids, "processing batch");
            if let Err(err) = self.run_one(batch).await {
                tracing::error!(stage = %self.name, inputs = %ids, "batch failed: {err}");
                return Err(err);
            }

            if let Some(id) = watermark {
                self.advance_watermark(&id)?;
            }
            summary.batches += 1;
            summary.documents += documents;
        }

        tracing::info!(
            stage = %self.name,
            batches = summary.batches,
            documents = summary.documents,
            "run complete"
        );
        Ok(summary)
    }

    /// Process one batch: instruction, generation call, result, routing.
    /// Errors propagate unchanged to the caller.
    pub async fn run_one(&self, mut batch: Batch) -> Result<(), PipelineError> {
        let instruction = self.instructions.instruction()?;
        let payload = batch.render_payload();

        tracing::debug!(
            stage = %self.name,
            model = %self.model,
            est_tokens = self.generator.estimate_tokens(&instruction, &payload),
            "calling generation service"
        );
        let text = self.generator.generate(&instruction, &payload).await?;
        tracing::info!(stage = %self.name, chars = text.len(), "stage produced result");

        batch.result = Some(NamedContent::from_stage(self.name.clone(), text));
        self.router.route(batch).await
    }

    fn advance_watermark(&self, id: &str) -> Result<(), PipelineError> {
        let Some(manager) = &self.manager else {
            return Ok(());
        };
        let mut manager = manager
            .lock()
            .map_err(|_| PipelineError::internal("config manager mutex poisoned"))?;
        manager.record_watermark(id);
        manager.persist()?;
        tracing::debug!(stage = %self.name, watermark = id, "advanced watermark");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;

    use crate::error::{GenerationError, InputError};
    use crate::pipeline::prompt::InlineInstruction;
    use crate::pipeline::source::NullBatchSource;

    /// In-memory generator: records calls, optionally fails on a given one.
    #[derive(Debug)]
    struct ScriptedGenerator {
        calls: StdMutex<Vec<(String, String)>>,
        fail_on: Option<usize>,
    }

    impl ScriptedGenerator {
        fn new(fail_on: Option<usize>) -> Arc<Self> {
            Arc::new(Self {
                calls: StdMutex::new(Vec::new()),
                fail_on,
            })
        }
    }

    #[async_trait]
    impl Generator for ScriptedGenerator {
        async fn generate(
            &self,
            instruction: &str,
            payload: &str,
        ) -> Result<String, GenerationError> {
            let mut calls = self.calls.lock().unwrap();
            let index = calls.len();
            calls.push((instruction.to_string(), payload.to_string()));
            if self.fail_on == Some(index) {
                return Err(GenerationError::Api {
                    provider: "scripted",
                    status: 500,
                    message: "boom".to_string(),
                });
            }
            Ok(format!("generated-{index}"))
        }
    }

    /// Router that keeps every routed batch for inspection.
    struct RecordingRouter {
        routed: Arc<StdMutex<Vec<Batch>>>,
    }

    impl RecordingRouter {
        fn new() -> (Box<Self>, Arc<StdMutex<Vec<Batch>>>) {
            let routed = Arc::new(StdMutex::new(Vec::new()));
            (
                Box::new(Self {
                    routed: routed.clone(),
                }),
                routed,
            )
        }
    }

    #[async_trait]
    impl OutputRouter for RecordingRouter {
        async fn route(&self, batch: Batch) -> Result<(), PipelineError> {
            self.routed.lock().unwrap().push(batch);
            Ok(())
        }
    }

    /// Source yielding a fixed set of batches.
    struct FixedSource {
        batches: Vec<Batch>,
    }

    impl BatchSource for FixedSource {
        fn collect(&self) -> Result<Vec<Batch>, InputError> {
            Ok(self.batches.clone())
        }
    }

    fn executor(
        generator: Arc<ScriptedGenerator>,
        source: Box<dyn BatchSource>,
        router: Box<dyn OutputRouter>,
    ) -> StageExecutor {
        StageExecutor::new(
            "distill".to_string(),
            "gpt-4o".to_string(),
            Box::new(InlineInstruction::new("summarize")),
            generator,
            source,
            router,
            None,
        )
    }

    fn file_batch(name: &str) -> Batch {
        Batch::new(
            vec![NamedContent::from_file(name, "entry text")],
            Some(name.to_string()),
        )
    }

    #[tokio::test]
    async fn test_run_one_attaches_result_and_routes() {
        let generator = ScriptedGenerator::new(None);
        let (router, routed) = RecordingRouter::new();
        let exec = executor(generator.clone(), Box::new(NullBatchSource), router);

        exec.run_one(file_batch("a.md")).await.unwrap();

        let routed = routed.lock().unwrap();
        assert_eq!(routed.len(), 1);
        let result = routed[0].result.as_ref().unwrap();
        assert_eq!(result.id.to_string(), "distill");
        assert_eq!(result.body, "generated-0");

        let calls = generator.calls.lock().unwrap();
        assert_eq!(calls[0].0, "summarize");
        assert!(calls[0].1.contains("### file:a.md"));
    }

    #[tokio::test]
    async fn test_run_all_empty_source_is_not_an_error() {
        let generator = ScriptedGenerator::new(None);
        let (router, _routed) = RecordingRouter::new();
        let exec = executor(generator, Box::new(NullBatchSource), router);

        let summary = exec.run_all().await.unwrap();
        assert_eq!(summary, RunSummary::default());
    }

    #[tokio::test]
    async fn test_run_all_halts_at_first_failure() {
        let generator = ScriptedGenerator::new(Some(1));
        let source = Box::new(FixedSource {
            batches: vec![file_batch("a.md"), file_batch("b.md"), file_batch("c.md")],
        });
        let (router, _routed) = RecordingRouter::new();
        let exec = executor(generator.clone(), source, router);

        let err = exec.run_all().await.unwrap_err();
        assert!(matches!(err, PipelineError::Generation(_)));

        // Two calls: the first succeeded, the second failed, the third never ran.
        assert_eq!(generator.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_run_all_counts_batches_and_documents() {
        let generator = ScriptedGenerator::new(None);
        let two_docs = Batch::new(
            vec![
                NamedContent::from_file("a.md", "1"),
                NamedContent::from_file("b.md", "2"),
            ],
            Some("b.md".to_string()),
        );
        let source = Box::new(FixedSource {
            batches: vec![two_docs, file_batch("c.md")],
        });
        let (router, _routed) = RecordingRouter::new();
        let exec = executor(generator, source, router);

        let summary = exec.run_all().await.unwrap();
        assert_eq!(
            summary,
            RunSummary {
                batches: 2,
                documents: 3
            }
        );
    }
}
