//! Error taxonomy for pipeline loading and execution.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Malformed or structurally invalid configuration. Fatal before any
/// processing starts; every variant names the offending field or stage.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("missing environment variable(s): {names}")]
    MissingEnvVars { names: String },

    #[error("config field 'input_dir' is missing or empty")]
    MissingInputDir,

    #[error("config field 'batch_size' must be at least 1")]
    ZeroBatchSize,

    #[error("invalid input filter pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("config declares no stages")]
    NoStages,

    #[error("config mixes top-level stage fields with a 'stages' map")]
    MixedStageForms,

    #[error(
        "stage '{stage}': exactly one of 'prompt', 'prompt_path' or 'prompt_paths' must be set"
    )]
    InstructionSource { stage: String },

    #[error("stage '{stage}': exactly one of 'next' or 'output_dir' must be set")]
    Destination { stage: String },

    #[error("stage '{stage}' routes to itself")]
    SelfReference { stage: String },

    #[error("stage '{stage}' routes to unknown stage '{next}'")]
    UnknownNextStage { stage: String, next: String },

    #[error("no entry stage: every stage is the target of another (cycle)")]
    NoEntryStage,

    #[error("multiple entry stages: {roots}")]
    MultipleEntryStages { roots: String },

    #[error("no stage named '{name}'")]
    NoSuchStage { name: String },

    #[error(
        "model '{model}' does not map to a known provider \
         (expected a 'claude', 'gpt', 'o1' or 'o3' prefix)"
    )]
    UnknownModel { model: String },

    #[error("environment variable {var} is not set (required for model '{model}')")]
    MissingApiKey { var: &'static str, model: String },
}

/// Document or instruction enumeration/read failure. Fatal to the current
/// run; surfaces from the batch source or instruction provider.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("failed to list input directory {path}: {source}")]
    ListDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read input file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read instruction file {path}: {source}")]
    ReadInstruction {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("instruction directory {path} contains no text files")]
    EmptyInstructionDir { path: PathBuf },
}

/// External generation call failure. Halts the run without advancing the
/// watermark past the last fully-completed batch.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("{provider} request failed: {source}")]
    Transport {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} returned HTTP {status}: {message}")]
    Api {
        provider: &'static str,
        status: u16,
        message: String,
    },

    #[error("{provider} response contained no generated text")]
    EmptyResponse { provider: &'static str },
}

/// Durable-write failure: a terminal artifact or the configuration
/// write-back. The watermark write-back path logs a warning before this is
/// raised so operators see it even when callers tolerate the error.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to write artifact {path}: {source}")]
    Artifact {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to update config {path}: {detail}")]
    Config { path: PathBuf, detail: String },
}

/// Umbrella error for a pipeline run.
///
/// `Internal` wraps builder or lock invariant violations that validation
/// should have made unreachable; these carry an opaque `anyhow::Error`.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error("internal invariant violated: {0}")]
    Internal(anyhow::Error),
}

impl PipelineError {
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(anyhow::anyhow!(msg.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors_name_the_field() {
        let err = ConfigError::MissingInputDir;
        assert!(err.to_string().contains("input_dir"));

        let err = ConfigError::Destination {
            stage: "distill".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("distill"));
        assert!(msg.contains("next"));
        assert!(msg.contains("output_dir"));

        let err = ConfigError::MultipleEntryStages {
            roots: "alpha, beta".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("alpha"));
        assert!(msg.contains("beta"));
    }

    #[test]
    fn test_pipeline_error_wraps_taxonomy() {
        let err: PipelineError = ConfigError::NoStages.into();
        assert!(matches!(err, PipelineError::Config(_)));

        let err: PipelineError = GenerationError::EmptyResponse { provider: "openai" }.into();
        assert!(matches!(err, PipelineError::Generation(_)));

        let err = PipelineError::internal("downstream stage missing");
        assert!(err.to_string().contains("internal invariant"));
    }
}
