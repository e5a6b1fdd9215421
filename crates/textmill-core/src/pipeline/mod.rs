//! The processor-pipeline engine: batches, sources, routing and execution.

pub mod batch;
pub mod builder;
pub mod executor;
pub mod prompt;
pub mod router;
pub mod source;

pub use batch::{Batch, ContentId, NamedContent};
pub use builder::build_pipeline;
pub use executor::{RunSummary, StageExecutor};
pub use prompt::InstructionProvider;
pub use router::OutputRouter;
pub use source::BatchSource;
