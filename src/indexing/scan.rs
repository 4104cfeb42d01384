//! One full scan pass: walk, filter, dispatch-parse, aggregate, persist.
//!
//! Every pass that writes the store goes through the engine's scan lock, which
//! is held from load to save. Clones of a [`ScanEngine`] share that lock, so
//! the daemon's startup batch, the CLI and the watcher's rescans never
//! interleave their writes.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use super::walker::ProjectWalker;
use super::{ScanError, ScanResult};
use crate::Settings;
use crate::filter::IgnoreFilter;
use crate::notifications::{NotificationBroadcaster, ScanEvent};
use crate::parsing::{ParserRegistry, extension_of};
use crate::registry::ProjectRegistry;
use crate::storage::{AnnotationStore, resolved_since};

/// Outcome of one successful pass over a project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub project: String,
    pub root: PathBuf,
    /// Files the walk yielded after ignore rules
    pub files_visited: usize,
    /// Files a parser handled successfully
    pub files_parsed: usize,
    pub parse_failures: usize,
    pub annotations: usize,
    /// Annotations present before this pass and gone after it
    pub resolved: usize,
    pub elapsed: Duration,
}

/// Result of scanning one project as part of a batch.
#[derive(Debug)]
pub struct ProjectOutcome {
    pub name: String,
    pub root: PathBuf,
    pub result: ScanResult<ScanReport>,
}

#[derive(Clone)]
pub struct ScanEngine {
    settings: Arc<Settings>,
    parsers: Arc<ParserRegistry>,
    store_path: PathBuf,
    scan_lock: Arc<Mutex<()>>,
    broadcaster: Option<NotificationBroadcaster>,
}

impl ScanEngine {
    pub fn new(settings: Arc<Settings>, parsers: ParserRegistry) -> Self {
        let store_path = settings.store_path();
        Self {
            settings,
            parsers: Arc::new(parsers),
            store_path,
            scan_lock: Arc::new(Mutex::new(())),
            broadcaster: None,
        }
    }

    /// Persist to a different store document than the settings name.
    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = path.into();
        self
    }

    pub fn with_broadcaster(mut self, broadcaster: NotificationBroadcaster) -> Self {
        self.broadcaster = Some(broadcaster);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn parsers(&self) -> &ParserRegistry {
        &self.parsers
    }

    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    /// Ignore rules for one project: defaults plus its own ignore file.
    pub fn filter_for(&self, root: &Path) -> IgnoreFilter {
        IgnoreFilter::for_project(root, &self.settings.ignore_file)
    }

    /// Read the current store without taking the scan lock.
    ///
    /// Saves replace the document atomically, so a reader always sees a
    /// complete write.
    pub fn load_store(&self) -> ScanResult<AnnotationStore> {
        Ok(AnnotationStore::load(&self.store_path)?)
    }

    /// Rebuild one project's index from its tree and persist the store.
    ///
    /// An empty `name` falls back to the root's directory name.
    pub async fn run_scan(&self, root: &Path, name: &str) -> ScanResult<ScanReport> {
        let project = project_name(root, name);

        let _guard = self.scan_lock.lock().await;
        let result = self.scan_locked(root, &project).await;

        match &result {
            Ok(report) => {
                crate::log_event!(
                    "scan",
                    "completed",
                    "{project}: {} annotations in {} files, {} resolved, {} failures ({:?})",
                    report.annotations,
                    report.files_parsed,
                    report.resolved,
                    report.parse_failures,
                    report.elapsed
                );
                self.notify(ScanEvent::Completed {
                    project: project.clone(),
                    root: root.to_path_buf(),
                    annotations: report.annotations,
                    resolved: report.resolved,
                });
            }
            Err(e) => {
                tracing::error!("[scan] {project} failed: {e}");
                self.notify(ScanEvent::Failed {
                    project: project.clone(),
                    root: root.to_path_buf(),
                    reason: e.to_string(),
                });
            }
        }

        result
    }

    async fn scan_locked(&self, root: &Path, project: &str) -> ScanResult<ScanReport> {
        let started = Instant::now();

        // An unreadable root is fatal; unreadable subdirectories are only skipped
        std::fs::read_dir(root).map_err(|source| ScanError::RootUnreadable {
            path: root.to_path_buf(),
            source,
        })?;

        let walker = ProjectWalker::new(Arc::new(self.filter_for(root)));
        let walk_root = root.to_path_buf();
        let files = tokio::task::spawn_blocking(move || walker.files(&walk_root))
            .await
            .map_err(|e| ScanError::WalkFailed {
                path: root.to_path_buf(),
                reason: e.to_string(),
            })?;

        let mut report = ScanReport {
            project: project.to_string(),
            root: root.to_path_buf(),
            ..ScanReport::default()
        };
        let mut annotations = Vec::new();

        for file in files {
            report.files_visited += 1;

            let Some(extension) = extension_of(&file) else {
                continue;
            };
            let Some(descriptor) = self.parsers.resolve_extension(&extension) else {
                continue;
            };

            match self.parsers.parse_file(descriptor, &file).await {
                Ok(found) => {
                    report.files_parsed += 1;
                    annotations.extend(found);
                }
                Err(e) => {
                    report.parse_failures += 1;
                    tracing::warn!("[scan] {project}: {e}");
                }
            }
        }

        let mut store = AnnotationStore::load(&self.store_path)?;
        report.resolved = store
            .project(project)
            .map(|previous| resolved_since(previous, &annotations).len())
            .unwrap_or(0);
        report.annotations = annotations.len();

        store.replace_project(project, annotations);
        store.save(&self.store_path)?;

        report.elapsed = started.elapsed();
        Ok(report)
    }

    /// Scan every tracked project, one after another.
    ///
    /// A project whose scan fails is reported in its outcome and does not stop
    /// the others. Only a registry that cannot be read fails the whole call.
    pub async fn scan_all(&self, projects: &dyn ProjectRegistry) -> ScanResult<Vec<ProjectOutcome>> {
        let tracked = projects.list_tracked()?;
        crate::log_event!("scan", "batch", "{} projects", tracked.len());

        let mut outcomes = Vec::with_capacity(tracked.len());
        for (name, root) in tracked {
            let result = self.run_scan(&root, &name).await;
            outcomes.push(ProjectOutcome { name, root, result });
        }
        Ok(outcomes)
    }

    /// Drop a project's index from the store. Returns whether it existed.
    pub async fn remove_project(&self, name: &str) -> ScanResult<bool> {
        let _guard = self.scan_lock.lock().await;

        let mut store = AnnotationStore::load(&self.store_path)?;
        if store.remove_project(name).is_none() {
            return Ok(false);
        }
        store.save(&self.store_path)?;

        crate::log_event!("scan", "removed", "{name}");
        self.notify(ScanEvent::ProjectRemoved {
            project: name.to_string(),
        });
        Ok(true)
    }

    fn notify(&self, event: ScanEvent) {
        if let Some(broadcaster) = &self.broadcaster {
            broadcaster.send(event);
        }
    }
}

fn project_name(root: &Path, name: &str) -> String {
    if !name.trim().is_empty() {
        return name.to_string();
    }
    root.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| root.display().to_string())
}
