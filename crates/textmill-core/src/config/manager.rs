//! Owns the loaded configuration and the watermark write-back path.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::types::{PipelineConfig, StageConfig};
use crate::config::{parser, validator};
use crate::error::{ConfigError, PersistError};

/// Key patched back into the on-disk document by [`ConfigManager::persist`].
const WATERMARK_KEY: &str = "last_processed";

/// Loads, validates and owns a pipeline configuration. The watermark is the
/// only field mutated after load.
#[derive(Debug)]
pub struct ConfigManager {
    path: PathBuf,
    config: PipelineConfig,
}

impl ConfigManager {
    /// Read, substitute, normalize and validate the config at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let file = parser::parse_config(path)?;
        let config = file.normalize()?;
        validator::validate(&config)?;
        Ok(Self {
            path: path.to_path_buf(),
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn watermark(&self) -> Option<&str> {
        self.config.watermark.as_deref()
    }

    /// Key/value overrides for the generation-client factory.
    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.config.env
    }

    pub fn stage(&self, name: &str) -> Result<&StageConfig, ConfigError> {
        self.config
            .stages
            .get(name)
            .ok_or_else(|| ConfigError::NoSuchStage {
                name: name.to_string(),
            })
    }

    /// Recompute the unique entry stage, independent of load-time validation.
    pub fn resolve_entry_stage(&self) -> Result<&str, ConfigError> {
        validator::resolve_entry_stage(&self.config.stages)
    }

    /// Update the in-memory watermark only; `persist` writes it back.
    pub fn record_watermark(&mut self, id: impl Into<String>) {
        self.config.watermark = Some(id.into());
    }

    /// Write the watermark back to the source document.
    ///
    /// The raw on-disk text is patched rather than re-serialized from the
    /// in-memory model, so `${VAR}` references are never rewritten as their
    /// resolved values. An I/O failure is logged as a warning and still
    /// returned, letting callers decide how fatal it is.
    pub fn persist(&self) -> Result<(), PersistError> {
        let result = self.write_back();
        if let Err(err) = &result {
            tracing::warn!(
                config = %self.path.display(),
                "failed to persist watermark: {err}"
            );
        }
        result
    }

    fn write_back(&self) -> Result<(), PersistError> {
        let config_err = |detail: String| PersistError::Config {
            path: self.path.clone(),
            detail,
        };

        let raw = fs::read_to_string(&self.path).map_err(|e| config_err(e.to_string()))?;
        let mut doc: serde_yaml::Value =
            serde_yaml::from_str(&raw).map_err(|e| config_err(e.to_string()))?;

        let mapping = doc
            .as_mapping_mut()
            .ok_or_else(|| config_err("config root is not a mapping".to_string()))?;
        let value = match &self.config.watermark {
            Some(id) => serde_yaml::Value::String(id.clone()),
            None => serde_yaml::Value::Null,
        };
        mapping.insert(serde_yaml::Value::String(WATERMARK_KEY.to_string()), value);

        let out = serde_yaml::to_string(&doc).map_err(|e| config_err(e.to_string()))?;
        fs::write(&self.path, out).map_err(|e| config_err(e.to_string()))?;
        Ok(())
    }
}
