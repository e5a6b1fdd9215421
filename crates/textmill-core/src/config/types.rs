//! Declarative configuration model for a processing pipeline.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Fallback model when a stage declares none.
pub const DEFAULT_MODEL: &str = "gpt-4o";
/// Fallback input filter when the config declares none.
pub const DEFAULT_PATTERN: &str = "*.md";
/// Fallback artifact extension for terminal stages.
pub const DEFAULT_EXTENSION: &str = ".md";
/// Name given to the stage synthesized from the single-stage shorthand.
pub const SINGLE_STAGE_NAME: &str = "process";

/// One named processing step: an instruction source, an optional model, and
/// exactly one destination (another stage or a terminal output directory).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageConfig {
    /// Inline instruction text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Path to an instruction file, or a directory of instruction files.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_path: Option<PathBuf>,
    /// Ordered list of instruction files/directories, joined in list order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_paths: Option<Vec<PathBuf>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Downstream stage fed with this stage's result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    /// Terminal destination directory for this stage's result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    /// Artifact extension for a terminal stage (default `.md`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
}

impl StageConfig {
    /// Number of instruction source forms declared; valid stages have exactly one.
    pub fn instruction_forms(&self) -> usize {
        [
            self.prompt.is_some(),
            self.prompt_path.is_some(),
            self.prompt_paths.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count()
    }

    /// True when no field is set at all (used to detect whether the
    /// single-stage shorthand was written at the top level).
    pub fn is_empty(&self) -> bool {
        self.prompt.is_none()
            && self.prompt_path.is_none()
            && self.prompt_paths.is_none()
            && self.model.is_none()
            && self.next.is_none()
            && self.output_dir.is_none()
            && self.extension.is_none()
    }
}

/// Raw on-disk configuration document. Carries either a `stages` map or the
/// single-stage shorthand (stage fields at the top level); `normalize`
/// collapses both into the canonical [`PipelineConfig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    pub input_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    /// Identifier of the last fully-processed input; null processes everything.
    pub last_processed: Option<String>,
    /// Key/value overrides handed to the generation-client factory. Never
    /// applied to the process environment.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stages: Option<BTreeMap<String, StageConfig>>,
    #[serde(flatten)]
    pub stage: StageConfig,
}

/// Canonical pipeline description after shorthand normalization.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub input_dir: PathBuf,
    pub pattern: String,
    pub batch_size: usize,
    pub watermark: Option<String>,
    pub env: BTreeMap<String, String>,
    pub stages: BTreeMap<String, StageConfig>,
}

impl ConfigFile {
    /// Collapse the two accepted document forms into one canonical shape.
    pub fn normalize(self) -> Result<PipelineConfig, ConfigError> {
        let input_dir = match self.input_dir {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => return Err(ConfigError::MissingInputDir),
        };

        let batch_size = self.batch_size.unwrap_or(1);
        if batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }

        let stages = match self.stages {
            Some(map) => {
                if !self.stage.is_empty() {
                    return Err(ConfigError::MixedStageForms);
                }
                if map.is_empty() {
                    return Err(ConfigError::NoStages);
                }
                map
            }
            None => {
                if self.stage.is_empty() {
                    return Err(ConfigError::NoStages);
                }
                let mut map = BTreeMap::new();
                map.insert(SINGLE_STAGE_NAME.to_string(), self.stage);
                map
            }
        };

        Ok(PipelineConfig {
            input_dir,
            pattern: self.pattern.unwrap_or_else(|| DEFAULT_PATTERN.to_string()),
            batch_size,
            watermark: self.last_processed,
            env: self.env,
            stages,
        })
    }
}
