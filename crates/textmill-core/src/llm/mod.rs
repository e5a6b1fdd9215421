//! Generation-service clients and the factory that selects one per model.

pub mod anthropic;
pub mod openai;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{ConfigError, GenerationError};

pub use anthropic::AnthropicGenerator;
pub use openai::OpenAiGenerator;

/// Capability interface for the external generation call.
#[async_trait]
pub trait Generator: Send + Sync + std::fmt::Debug {
    /// Send the instruction and payload to the service; return generated text.
    async fn generate(&self, instruction: &str, payload: &str)
        -> Result<String, GenerationError>;

    /// Rough input-token estimate, for progress logging only. Roughly four
    /// characters per token.
    fn estimate_tokens(&self, instruction: &str, payload: &str) -> usize {
        (instruction.len() + payload.len()) / 4
    }
}

/// Builds one [`Generator`] per stage, keyed on the model identifier.
pub trait GeneratorFactory: Send + Sync {
    fn create(&self, model: &str) -> Result<Arc<dyn Generator>, ConfigError>;
}

/// Default factory: routes on the model-name prefix and resolves API keys
/// from the config `env` overrides first, then the process environment.
pub struct HttpGeneratorFactory {
    env: BTreeMap<String, String>,
}

impl HttpGeneratorFactory {
    pub fn new(env: BTreeMap<String, String>) -> Self {
        Self { env }
    }

    fn api_key(&self, var: &'static str, model: &str) -> Result<String, ConfigError> {
        self.env
            .get(var)
            .cloned()
            .or_else(|| std::env::var(var).ok())
            .ok_or(ConfigError::MissingApiKey {
                var,
                model: model.to_string(),
            })
    }
}

impl GeneratorFactory for HttpGeneratorFactory {
    fn create(&self, model: &str) -> Result<Arc<dyn Generator>, ConfigError> {
        let lower = model.to_ascii_lowercase();
        if lower.starts_with("claude") {
            let key = self.api_key("ANTHROPIC_API_KEY", model)?;
            Ok(Arc::new(AnthropicGenerator::new(model.to_string(), key)))
        } else if ["gpt", "o1", "o3"].iter().any(|p| lower.starts_with(p)) {
            let key = self.api_key("OPENAI_API_KEY", model)?;
            Ok(Arc::new(OpenAiGenerator::new(model.to_string(), key)))
        } else {
            Err(ConfigError::UnknownModel {
                model: model.to_string(),
            })
        }
    }
}

/// Pull a human-readable message out of a provider error body: the JSON
/// `error.message` field when present, otherwise the (truncated) raw body.
pub(crate) fn api_error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(message) = value
            .get("error")
            .and_then(|err| err.get("message"))
            .and_then(|msg| msg.as_str())
        {
            return message.to_string();
        }
    }
    let trimmed = body.trim();
    if trimmed.chars().count() > 300 {
        let cut: String = trimmed.chars().take(300).collect();
        format!("{cut}...")
    } else {
        trimmed.to_string()
    }
}
