//! Config parsing with environment variable substitution.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::config::types::ConfigFile;
use crate::error::ConfigError;

static ENV_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid env var regex"));

/// Substitute `${VAR_NAME}` patterns with environment variable values.
///
/// # Errors
///
/// Returns an error naming every referenced environment variable that is not
/// set, all at once.
pub fn substitute_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut result = input.to_string();
    let mut missing = Vec::new();

    for cap in ENV_VAR_RE.captures_iter(input) {
        let var_name = &cap[1];
        match std::env::var(var_name) {
            Ok(val) => {
                result = result.replace(&cap[0], &val);
            }
            Err(_) => {
                missing.push(var_name.to_string());
            }
        }
    }

    if !missing.is_empty() {
        return Err(ConfigError::MissingEnvVars {
            names: missing.join(", "),
        });
    }

    Ok(result)
}

/// Parse a config document (after env var substitution). `origin` is the
/// path reported in parse errors.
pub fn parse_config_str(text: &str, origin: &Path) -> Result<ConfigFile, ConfigError> {
    let substituted = substitute_env_vars(text)?;
    serde_yaml::from_str(&substituted).map_err(|source| ConfigError::Parse {
        path: origin.to_path_buf(),
        source,
    })
}

/// Read and parse a config file.
pub fn parse_config(path: &Path) -> Result<ConfigFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config_str(&content, path)
}
