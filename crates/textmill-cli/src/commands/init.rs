use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};

const TEMPLATE: &str = r#"# textmill pipeline configuration.
#
# Documents under input_dir are processed oldest-first; last_processed
# records the most recently completed input so re-runs only pick up new
# documents.

input_dir: journal
# pattern: "*.md"
# batch_size: 1
last_processed: null

# API keys for the generation service. Values may reference environment
# variables by wrapping the name in "${ }".
# env:
#   OPENAI_API_KEY: sk-...

# Single stage: instruction plus a terminal output directory.
prompt: |
  Summarize the following entries in a neutral tone.
model: gpt-4o
output_dir: processed

# Multi-stage form: replace the three fields above with a `stages` map.
# Each stage routes to exactly one of `next` (another stage) or
# `output_dir` (a terminal destination).
#
# stages:
#   distill:
#     prompt_path: prompts/distill.md
#     model: claude-sonnet-4-20250514
#     next: publish
#   publish:
#     prompt_path: prompts/publish
#     output_dir: processed
#     extension: .md
"#;

/// Execute the `init` command: write a template config, refusing to
/// overwrite an existing file.
pub fn execute(path: &Path) -> Result<()> {
    if path.exists() {
        bail!("file already exists: {}", path.display());
    }
    fs::write(path, TEMPLATE)
        .with_context(|| format!("failed to write template to {}", path.display()))?;
    println!("Wrote template config to {}", path.display());
    Ok(())
}
