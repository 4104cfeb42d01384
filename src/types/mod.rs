//! Core data types shared by the scanner, the store and the watcher.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::{Path, PathBuf};

/// A single TODO/FIXME marker found in a source file.
///
/// Annotations are built once per scan pass and never mutated afterwards;
/// a rescan produces a fresh sequence that replaces the old one wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Annotation {
    /// Comment text with delimiters stripped.
    pub comment: String,
    /// File the marker was found in.
    #[serde(serialize_with = "lossy_path")]
    pub file_path: PathBuf,
    /// 1-based line of the comment start.
    pub line_number: u32,
    /// Innermost enclosing function or method, if any.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub function: Option<String>,
}

/// Identity used for deduplication: one annotation per physical line.
pub type AnnotationKey = (PathBuf, u32);

impl Annotation {
    pub fn new(
        comment: impl Into<String>,
        file_path: impl Into<PathBuf>,
        line_number: u32,
        function: Option<String>,
    ) -> Self {
        Self {
            comment: comment.into(),
            file_path: file_path.into(),
            line_number,
            function: function.filter(|f| !f.is_empty()),
        }
    }

    pub fn key(&self) -> AnnotationKey {
        (self.file_path.clone(), self.line_number)
    }

    /// Check whether this annotation sits at the given location.
    pub fn is_at(&self, path: &Path, line: u32) -> bool {
        self.line_number == line && self.file_path == path
    }
}

// Paths that are not valid UTF-8 are stored with replacement characters.
fn lossy_path<S>(path: &Path, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&path.to_string_lossy())
}

// Older documents wrote "" for "no enclosing function".
fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}
