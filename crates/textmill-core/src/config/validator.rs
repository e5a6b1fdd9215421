//! Graph-shape validation for a normalized pipeline configuration.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::types::{PipelineConfig, StageConfig};
use crate::error::ConfigError;

/// Validate a normalized pipeline configuration.
///
/// Rules, all of which must hold:
/// 1. at least one stage is declared;
/// 2. every stage has exactly one instruction source form;
/// 3. every stage has exactly one destination kind (`next` XOR `output_dir`);
/// 4. every `next` names an existing, distinct (non-self) stage;
/// 5. exactly one stage is referenced by no other stage.
pub fn validate(config: &PipelineConfig) -> Result<(), ConfigError> {
    if config.stages.is_empty() {
        return Err(ConfigError::NoStages);
    }

    for (name, stage) in &config.stages {
        if stage.instruction_forms() != 1 {
            return Err(ConfigError::InstructionSource {
                stage: name.clone(),
            });
        }

        match (&stage.next, &stage.output_dir) {
            (Some(_), Some(_)) | (None, None) => {
                return Err(ConfigError::Destination {
                    stage: name.clone(),
                });
            }
            (Some(next), None) => {
                if next == name {
                    return Err(ConfigError::SelfReference {
                        stage: name.clone(),
                    });
                }
                if !config.stages.contains_key(next) {
                    return Err(ConfigError::UnknownNextStage {
                        stage: name.clone(),
                        next: next.clone(),
                    });
                }
            }
            (None, Some(_)) => {}
        }
    }

    resolve_entry_stage(&config.stages).map(|_| ())
}

/// Resolve the unique stage that no other stage routes to. Zero such stages
/// signals a cycle; more than one is an unsupported multi-root configuration
/// and the error names every candidate root.
pub fn resolve_entry_stage(
    stages: &BTreeMap<String, StageConfig>,
) -> Result<&str, ConfigError> {
    let referenced: BTreeSet<&str> = stages
        .values()
        .filter_map(|stage| stage.next.as_deref())
        .collect();

    let roots: Vec<&str> = stages
        .keys()
        .map(String::as_str)
        .filter(|name| !referenced.contains(name))
        .collect();

    match roots.as_slice() {
        [] => Err(ConfigError::NoEntryStage),
        [entry] => Ok(entry),
        many => Err(ConfigError::MultipleEntryStages {
            roots: many.join(", "),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::ConfigFile;

    fn config(yaml: &str) -> PipelineConfig {
        serde_yaml::from_str::<ConfigFile>(yaml)
            .unwrap()
            .normalize()
            .unwrap()
    }

    fn chain_yaml() -> &'static str {
        r#"
input_dir: journal
stages:
  distill:
    prompt: Distill.
    next: publish
  publish:
    prompt: Publish.
    output_dir: out
"#
    }

    #[test]
    fn test_valid_chain_passes() {
        let cfg = config(chain_yaml());
        assert!(validate(&cfg).is_ok());
        assert_eq!(resolve_entry_stage(&cfg.stages).unwrap(), "distill");
    }

    #[test]
    fn test_entry_stage_is_never_a_target() {
        let cfg = config(chain_yaml());
        let entry = resolve_entry_stage(&cfg.stages).unwrap();
        let targeted = cfg
            .stages
            .values()
            .any(|stage| stage.next.as_deref() == Some(entry));
        assert!(!targeted);
    }

    #[test]
    fn test_single_stage_passes() {
        let cfg = config("input_dir: journal\nprompt: hi\noutput_dir: out\n");
        assert!(validate(&cfg).is_ok());
        assert_eq!(resolve_entry_stage(&cfg.stages).unwrap(), "process");
    }

    #[test]
    fn test_both_destinations_fails() {
        let cfg = config(
            r#"
input_dir: journal
stages:
  a:
    prompt: hi
    next: b
    output_dir: out
  b:
    prompt: hi
    output_dir: out
"#,
        );
        let err = validate(&cfg).unwrap_err();
        assert!(matches!(err, ConfigError::Destination { ref stage } if stage == "a"));
    }

    #[test]
    fn test_neither_destination_fails() {
        let cfg = config(
            r#"
input_dir: journal
stages:
  a:
    prompt: hi
"#,
        );
        let err = validate(&cfg).unwrap_err();
        assert!(matches!(err, ConfigError::Destination { ref stage } if stage == "a"));
    }

    #[test]
    fn test_missing_instruction_fails() {
        let cfg = config(
            r#"
input_dir: journal
stages:
  a:
    output_dir: out
"#,
        );
        let err = validate(&cfg).unwrap_err();
        assert!(matches!(err, ConfigError::InstructionSource { ref stage } if stage == "a"));
    }

    #[test]
    fn test_two_instruction_forms_fails() {
        let cfg = config(
            r#"
input_dir: journal
stages:
  a:
    prompt: inline
    prompt_path: prompts/a.md
    output_dir: out
"#,
        );
        let err = validate(&cfg).unwrap_err();
        assert!(matches!(err, ConfigError::InstructionSource { .. }));
    }

    #[test]
    fn test_self_reference_fails() {
        let cfg = config(
            r#"
input_dir: journal
stages:
  a:
    prompt: hi
    next: a
"#,
        );
        let err = validate(&cfg).unwrap_err();
        assert!(matches!(err, ConfigError::SelfReference { ref stage } if stage == "a"));
    }

    #[test]
    fn test_unknown_next_fails() {
        let cfg = config(
            r#"
input_dir: journal
stages:
  a:
    prompt: hi
    next: ghost
"#,
        );
        let err = validate(&cfg).unwrap_err();
        assert!(
            matches!(err, ConfigError::UnknownNextStage { ref stage, ref next }
                if stage == "a" && next == "ghost")
        );
    }

    #[test]
    fn test_cycle_has_no_entry() {
        let cfg = config(
            r#"
input_dir: journal
stages:
  a:
    prompt: hi
    next: b
  b:
    prompt: hi
    next: a
"#,
        );
        let err = validate(&cfg).unwrap_err();
        assert!(matches!(err, ConfigError::NoEntryStage));
    }

    #[test]
    fn test_multiple_roots_named_in_error() {
        let cfg = config(
            r#"
input_dir: journal
stages:
  alpha:
    prompt: hi
    next: sink
  beta:
    prompt: hi
    next: sink
  sink:
    prompt: hi
    output_dir: out
"#,
        );
        let err = validate(&cfg).unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, ConfigError::MultipleEntryStages { .. }));
        assert!(msg.contains("alpha"));
        assert!(msg.contains("beta"));
    }
}
