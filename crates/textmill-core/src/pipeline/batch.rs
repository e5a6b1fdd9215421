//! Named content and the per-batch unit of work.

use std::fmt;
use std::path::{Path, PathBuf};

/// Block separator used when rendering a batch into one generation payload.
const BLOCK_DELIMITER: &str = "\n\n---\n\n";

/// Identifier of one piece of named content.
///
/// File-origin identifiers keep the source path recoverable from an
/// otherwise opaque content list; stage-origin identifiers are the producing
/// stage's name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentId {
    File(PathBuf),
    Stage(String),
}

impl ContentId {
    pub fn as_file(&self) -> Option<&Path> {
        match self {
            ContentId::File(path) => Some(path),
            ContentId::Stage(_) => None,
        }
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentId::File(path) => write!(f, "file:{}", path.display()),
            ContentId::Stage(name) => write!(f, "{name}"),
        }
    }
}

/// An (identifier, text) pair.
#[derive(Debug, Clone)]
pub struct NamedContent {
    pub id: ContentId,
    pub body: String,
}

impl NamedContent {
    pub fn from_file(path: impl Into<PathBuf>, body: impl Into<String>) -> Self {
        Self {
            id: ContentId::File(path.into()),
            body: body.into(),
        }
    }

    pub fn from_stage(stage: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: ContentId::Stage(stage.into()),
            body: body.into(),
        }
    }
}

/// One unit of work: ordered, non-empty inputs, an optional result set once
/// the owning stage completes, and an optional watermark candidate.
///
/// The candidate is the identifier of the last file-origin input consumed to
/// build the batch and is only present on batches formed directly from the
/// batch source; it never crosses a chaining hop.
#[derive(Debug, Clone)]
pub struct Batch {
    pub inputs: Vec<NamedContent>,
    pub result: Option<NamedContent>,
    pub watermark: Option<String>,
}

impl Batch {
    pub fn new(inputs: Vec<NamedContent>, watermark: Option<String>) -> Self {
        Self {
            inputs,
            result: None,
            watermark,
        }
    }

    /// Render the inputs into one payload: each block headed by its
    /// identifier, blocks joined by an explicit delimiter.
    pub fn render_payload(&self) -> String {
        self.inputs
            .iter()
            .map(|content| format!("### {}\n\n{}", content.id, content.body))
            .collect::<Vec<_>>()
            .join(BLOCK_DELIMITER)
    }

    /// Input identifiers, for progress logging.
    pub fn input_ids(&self) -> Vec<String> {
        self.inputs.iter().map(|c| c.id.to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_id_display() {
        let file = ContentId::File(PathBuf::from("journal/2024-01-15.md"));
        assert_eq!(file.to_string(), "file:journal/2024-01-15.md");
        assert_eq!(file.as_file(), Some(Path::new("journal/2024-01-15.md")));

        let stage = ContentId::Stage("distill".to_string());
        assert_eq!(stage.to_string(), "distill");
        assert!(stage.as_file().is_none());
    }

    #[test]
    fn test_render_payload_labels_and_delimits() {
        let batch = Batch::new(
            vec![
                NamedContent::from_file("journal/a.md", "first entry"),
                NamedContent::from_stage("distill", "a summary"),
            ],
            None,
        );
        let payload = batch.render_payload();
        assert!(payload.starts_with("### file:journal/a.md\n\nfirst entry"));
        assert!(payload.contains("\n\n---\n\n### distill\n\na summary"));
    }

    #[test]
    fn test_render_payload_single_block_has_no_delimiter() {
        let batch = Batch::new(vec![NamedContent::from_file("a.md", "text")], None);
        assert_eq!(batch.render_payload(), "### file:a.md\n\ntext");
    }
}
