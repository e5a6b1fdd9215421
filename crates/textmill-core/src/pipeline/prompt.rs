//! Instruction text loading for a stage.

use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;

use crate::config::StageConfig;
use crate::error::InputError;

/// Extensions treated as instruction text when reading a directory.
const TEXT_EXTENSIONS: &[&str] = &["md", "txt"];

/// Capability interface for obtaining a stage's instruction text.
pub trait InstructionProvider: Send + Sync {
    fn instruction(&self) -> Result<String, InputError>;
}

/// Inline instruction text straight from the configuration.
pub struct InlineInstruction {
    text: String,
}

impl InlineInstruction {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl InstructionProvider for InlineInstruction {
    fn instruction(&self) -> Result<String, InputError> {
        Ok(self.text.clone())
    }
}

/// Instruction text assembled from files and directories, in list order.
///
/// A directory contributes every text file directly within it, sorted by
/// name. Parts are joined with blank-line separation. The assembled text is
/// cached after the first successful load.
pub struct PathInstruction {
    paths: Vec<PathBuf>,
    cache: OnceCell<String>,
}

impl PathInstruction {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            paths,
            cache: OnceCell::new(),
        }
    }

    fn load(&self) -> Result<String, InputError> {
        let mut parts = Vec::new();
        for path in &self.paths {
            if path.is_dir() {
                parts.extend(read_instruction_dir(path)?);
            } else {
                parts.push(read_instruction_file(path)?);
            }
        }
        Ok(parts.join("\n\n"))
    }
}

impl InstructionProvider for PathInstruction {
    fn instruction(&self) -> Result<String, InputError> {
        self.cache
            .get_or_try_init(|| self.load())
            .map(|text| text.clone())
    }
}

fn read_instruction_file(path: &Path) -> Result<String, InputError> {
    fs::read_to_string(path).map_err(|source| InputError::ReadInstruction {
        path: path.to_path_buf(),
        source,
    })
}

fn read_instruction_dir(dir: &Path) -> Result<Vec<String>, InputError> {
    let entries = fs::read_dir(dir).map_err(|source| InputError::ReadInstruction {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| InputError::ReadInstruction {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        let is_text = path
            .extension()
            .map(|ext| {
                TEXT_EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            })
            .unwrap_or(false);
        if path.is_file() && is_text {
            files.push(path);
        }
    }
    files.sort();

    if files.is_empty() {
        return Err(InputError::EmptyInstructionDir {
            path: dir.to_path_buf(),
        });
    }

    files.iter().map(|path| read_instruction_file(path)).collect()
}

/// Provider for a validated stage; `None` if no instruction form is set
/// (unreachable after validation).
pub fn provider_for(stage: &StageConfig) -> Option<Box<dyn InstructionProvider>> {
    if let Some(text) = &stage.prompt {
        Some(Box::new(InlineInstruction::new(text.clone())))
    } else if let Some(path) = &stage.prompt_path {
        Some(Box::new(PathInstruction::new(vec![path.clone()])))
    } else {
        stage
            .prompt_paths
            .as_ref()
            .map(|paths| Box::new(PathInstruction::new(paths.clone())) as Box<dyn InstructionProvider>)
    }
}
