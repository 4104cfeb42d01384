//! Durable per-project annotation collection.
//!
//! The whole store is a single JSON document:
//!
//! ```json
//! { "projects": { "<name>": [ { "comment": "...", "file_path": "...",
//!                               "line_number": 1, "function": null } ] } }
//! ```
//!
//! Saving writes a sibling temp file and renames it over the target, so the
//! document on disk is always the last complete write.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::io::{self, Write};
use std::path::Path;

use super::{StoreError, StoreResult};
use crate::types::{Annotation, AnnotationKey};

/// Annotations of one project, in discovery order.
pub type ProjectIndex = Vec<Annotation>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationStore {
    #[serde(default, deserialize_with = "null_tolerant")]
    projects: IndexMap<String, ProjectIndex>,
}

// Older writers emitted `null` for empty maps and empty lists.
fn null_tolerant<'de, D>(deserializer: D) -> Result<IndexMap<String, ProjectIndex>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<IndexMap<String, Option<ProjectIndex>>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(name, annotations)| (name, annotations.unwrap_or_default()))
        .collect())
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the store, or an empty one if the file does not exist yet.
    #[must_use = "Load errors should be handled appropriately"]
    pub fn load(path: &Path) -> StoreResult<Self> {
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                crate::debug_event!("store", "absent", "{}", path.display());
                return Ok(Self::new());
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::new());
        }

        serde_json::from_slice(&data).map_err(|e| StoreError::Malformed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Atomically replace the document at `path` with this store.
    #[must_use = "Save errors should be handled to ensure data is persisted"]
    pub fn save(&self, path: &Path) -> StoreResult<()> {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let io_err = |source| StoreError::Io {
            path: dir.to_path_buf(),
            source,
        };

        std::fs::create_dir_all(dir).map_err(io_err)?;

        let data = serde_json::to_vec_pretty(self)?;

        // Same directory as the target so the rename never crosses filesystems
        let mut temp = tempfile::Builder::new()
            .prefix(".todowatch-")
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(io_err)?;
        temp.write_all(&data).map_err(io_err)?;
        temp.as_file().sync_all().map_err(io_err)?;
        temp.persist(path).map_err(|e| StoreError::Persist {
            path: path.to_path_buf(),
            source: e.error,
        })?;

        crate::debug_event!(
            "store",
            "saved",
            "{} projects to {}",
            self.projects.len(),
            path.display()
        );
        Ok(())
    }

    /// Replace a project's annotations wholesale, returning the previous set.
    pub fn replace_project(
        &mut self,
        name: &str,
        annotations: ProjectIndex,
    ) -> Option<ProjectIndex> {
        self.projects.insert(name.to_string(), annotations)
    }

    /// Add one annotation unless the project already has one at that location.
    ///
    /// Returns whether the annotation was inserted.
    pub fn add_single(&mut self, name: &str, annotation: Annotation) -> bool {
        let entry = self.projects.entry(name.to_string()).or_default();
        if entry
            .iter()
            .any(|a| a.is_at(&annotation.file_path, annotation.line_number))
        {
            return false;
        }
        entry.push(annotation);
        true
    }

    /// Forget a project entirely.
    pub fn remove_project(&mut self, name: &str) -> Option<ProjectIndex> {
        self.projects.shift_remove(name)
    }

    pub fn project(&self, name: &str) -> Option<&[Annotation]> {
        self.projects.get(name).map(Vec::as_slice)
    }

    pub fn contains_project(&self, name: &str) -> bool {
        self.projects.contains_key(name)
    }

    pub fn project_names(&self) -> impl Iterator<Item = &str> {
        self.projects.keys().map(String::as_str)
    }

    pub fn projects(&self) -> impl Iterator<Item = (&str, &[Annotation])> {
        self.projects
            .iter()
            .map(|(name, annotations)| (name.as_str(), annotations.as_slice()))
    }

    /// Total annotations across every project.
    pub fn annotation_count(&self) -> usize {
        self.projects.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}

/// Annotations present in `old` whose location is absent from `new`.
pub fn resolved_since<'a>(old: &'a [Annotation], new: &[Annotation]) -> Vec<&'a Annotation> {
    let current: HashSet<AnnotationKey> = new.iter().map(Annotation::key).collect();
    old.iter().filter(|a| !current.contains(&a.key())).collect()
}
