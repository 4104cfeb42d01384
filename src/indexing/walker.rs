//! Directory traversal shared by the scan engine and the watcher.
//!
//! Both sides prune through the same [`IgnoreFilter`], so the files a scan
//! visits are exactly the files living in directories the watcher subscribes.

use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::filter::IgnoreFilter;

/// Walks a project tree, skipping ignored entries and never descending
/// into ignored directories.
#[derive(Debug, Clone)]
pub struct ProjectWalker {
    filter: Arc<IgnoreFilter>,
}

impl ProjectWalker {
    pub fn new(filter: Arc<IgnoreFilter>) -> Self {
        Self { filter }
    }

    pub fn filter(&self) -> &IgnoreFilter {
        &self.filter
    }

    /// Files under `root`, in traversal order (entries sorted by name).
    pub fn files(&self, root: &Path) -> Vec<PathBuf> {
        self.collect(root, |file_type| file_type.is_file())
    }

    /// `root` and every directory below it that is not pruned.
    pub fn directories(&self, root: &Path) -> Vec<PathBuf> {
        self.collect(root, |file_type| file_type.is_dir())
    }

    fn collect(&self, root: &Path, keep: impl Fn(&std::fs::FileType) -> bool) -> Vec<PathBuf> {
        let filter = Arc::clone(&self.filter);

        let mut builder = WalkBuilder::new(root);
        builder
            .standard_filters(false) // Only our own rules apply
            .follow_links(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(move |entry| {
                // The root is never tested against the rules
                entry.depth() == 0 || !filter.should_ignore(entry.path())
            });

        let mut found = Vec::new();
        for result in builder.build() {
            match result {
                Ok(entry) => {
                    if entry.file_type().is_some_and(|ft| keep(&ft)) {
                        found.push(entry.into_path());
                    }
                }
                Err(e) => {
                    tracing::warn!("[walker] skipping unreadable entry under {}: {e}", root.display());
                }
            }
        }
        found
    }
}
