//! Batch intake: enumerating, ordering and grouping input documents.

use std::fs;
use std::path::PathBuf;
use std::time::SystemTime;

use walkdir::WalkDir;

use crate::error::{ConfigError, InputError};
use crate::pipeline::batch::{Batch, NamedContent};

/// Capability interface for batch intake. Only the entry stage has a real
/// implementation; downstream stages are handed batches by their upstream
/// router and use [`NullBatchSource`].
pub trait BatchSource: Send + Sync {
    /// Collect all pending batches, oldest first.
    fn collect(&self) -> Result<Vec<Batch>, InputError>;
}

/// Filesystem-backed source: recursive enumeration under an input directory,
/// name-filtered, ordered by modification time, cut at the watermark, and
/// grouped into fixed-size batches.
#[derive(Debug)]
pub struct FsBatchSource {
    input_dir: PathBuf,
    pattern: glob::Pattern,
    watermark: Option<String>,
    batch_size: usize,
}

impl FsBatchSource {
    pub fn new(
        input_dir: PathBuf,
        pattern: &str,
        watermark: Option<String>,
        batch_size: usize,
    ) -> Result<Self, ConfigError> {
        let pattern = glob::Pattern::new(pattern).map_err(|source| ConfigError::Pattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            input_dir,
            pattern,
            watermark,
            batch_size,
        })
    }

    /// Matching files under the input dir, oldest first. Ties keep the
    /// deterministic enumeration order (stable sort over a name-sorted walk).
    fn ordered_files(&self) -> Result<Vec<PathBuf>, InputError> {
        let mut files: Vec<(PathBuf, SystemTime)> = Vec::new();

        for entry in WalkDir::new(&self.input_dir).sort_by_file_name() {
            let entry = entry.map_err(|err| {
                let path = err
                    .path()
                    .map(|p| p.to_path_buf())
                    .unwrap_or_else(|| self.input_dir.clone());
                InputError::ListDir {
                    path,
                    source: err.into(),
                }
            })?;

            if !entry.file_type().is_file() {
                continue;
            }
            if !self.pattern.matches(&entry.file_name().to_string_lossy()) {
                continue;
            }

            let modified = entry
                .metadata()
                .map_err(|err| InputError::ListDir {
                    path: entry.path().to_path_buf(),
                    source: err.into(),
                })?
                .modified()
                .map_err(|source| InputError::ListDir {
                    path: entry.path().to_path_buf(),
                    source,
                })?;

            files.push((entry.into_path(), modified));
        }

        files.sort_by_key(|(_, modified)| *modified);
        Ok(files.into_iter().map(|(path, _)| path).collect())
    }
}

impl BatchSource for FsBatchSource {
    fn collect(&self) -> Result<Vec<Batch>, InputError> {
        let ordered = self.ordered_files()?;

        // An exact watermark match discards it and everything before it. A
        // watermark absent from the listing (file deleted or renamed) filters
        // nothing: the whole list counts as unprocessed.
        let start = match &self.watermark {
            Some(mark) => ordered
                .iter()
                .position(|path| path.to_string_lossy() == *mark)
                .map(|idx| idx + 1)
                .unwrap_or(0),
            None => 0,
        };

        let mut batches = Vec::new();
        for group in ordered[start..].chunks(self.batch_size) {
            let mut inputs = Vec::with_capacity(group.len());
            for path in group {
                let body = fs::read_to_string(path).map_err(|source| InputError::ReadFile {
                    path: path.clone(),
                    source,
                })?;
                inputs.push(NamedContent::from_file(path.clone(), body));
            }
            let watermark = group.last().map(|path| path.to_string_lossy().into_owned());
            batches.push(Batch::new(inputs, watermark));
        }
        Ok(batches)
    }
}

/// Source for non-entry stages: never yields a batch.
pub struct NullBatchSource;

impl BatchSource for NullBatchSource {
    fn collect(&self) -> Result<Vec<Batch>, InputError> {
        Ok(Vec::new())
    }
}
