//! The set of projects the watcher is subscribed to.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::filter::IgnoreFilter;

#[derive(Debug, Clone)]
pub struct WatchedProject {
    pub name: String,
    pub root: PathBuf,
    pub filter: Arc<IgnoreFilter>,
    /// Directories subscribed on behalf of this project
    pub dirs: Vec<PathBuf>,
}

impl WatchedProject {
    /// Whether the path, or any directory between it and the root, is ignored.
    pub fn rejects(&self, path: &Path) -> bool {
        self.filter.is_pruned(&self.root, path)
    }
}

/// Project name to root, resolved by path-prefix containment.
#[derive(Debug, Default)]
pub struct WatchSet {
    projects: Vec<WatchedProject>,
}

impl WatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a project. Returns the entry it replaced.
    pub fn insert(&mut self, project: WatchedProject) -> Option<WatchedProject> {
        let previous = self.remove(&project.name);
        self.projects.push(project);
        previous
    }

    pub fn remove(&mut self, name: &str) -> Option<WatchedProject> {
        let index = self.projects.iter().position(|p| p.name == name)?;
        Some(self.projects.remove(index))
    }

    pub fn get(&self, name: &str) -> Option<&WatchedProject> {
        self.projects.iter().find(|p| p.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut WatchedProject> {
        self.projects.iter_mut().find(|p| p.name == name)
    }

    /// The project whose root contains `path`.
    ///
    /// With nested roots the deepest one wins.
    pub fn resolve(&self, path: &Path) -> Option<&WatchedProject> {
        self.projects
            .iter()
            .filter(|p| path.starts_with(&p.root))
            .max_by_key(|p| p.root.components().count())
    }

    /// Whether any project other than `except` subscribed this directory.
    pub fn is_subscribed_elsewhere(&self, dir: &Path, except: &str) -> bool {
        self.projects
            .iter()
            .any(|p| p.name != except && p.dirs.iter().any(|d| d == dir))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.projects.iter().map(|p| p.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    pub fn dir_count(&self) -> usize {
        self.projects.iter().map(|p| p.dirs.len()).sum()
    }
}
