//! Watcher that keeps every tracked project's index current.
//!
//! ```text
//! Idle --start--> Watching --stop--> ShuttingDown --> Stopped
//! ```
//!
//! `start` subscribes each project's non-ignored directories and spawns one
//! event loop. The loop owns the change source, the watch set and the pending
//! table, and consumes source events, commands and its own sweep timer one at
//! a time. Rescans run as separate tasks in a `JoinSet` that `stop` drains.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;

use super::debouncer::Debouncer;
use super::error::WatchError;
use super::project_set::{WatchSet, WatchedProject};
use super::source::{ChangeEvent, ChangeKind, ChangeSource, ChangeStream, NotifySource};
use crate::filter::IgnoreFilter;
use crate::indexing::{ProjectWalker, ScanEngine};
use crate::parsing::extension_of;
use crate::registry::ProjectRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Idle,
    Watching,
    ShuttingDown,
    Stopped,
}

enum Command {
    Track {
        name: String,
        root: PathBuf,
        reply: oneshot::Sender<usize>,
    },
    Untrack {
        name: String,
        reply: oneshot::Sender<bool>,
    },
    Shutdown,
}

pub struct ProjectWatcher {
    state: WatcherState,
    /// Present until `start` hands it to the event loop
    pending_loop: Option<EventLoop>,
    commands: Option<mpsc::Sender<Command>>,
    task: Option<JoinHandle<()>>,
}

impl ProjectWatcher {
    pub fn builder() -> ProjectWatcherBuilder {
        ProjectWatcherBuilder::new()
    }

    pub fn state(&self) -> WatcherState {
        self.state
    }

    /// Subscribe every tracked project and spawn the event loop.
    ///
    /// Must be called from within a tokio runtime. Returns the number of
    /// projects now watched.
    pub fn start(&mut self, projects: &dyn ProjectRegistry) -> Result<usize, WatchError> {
        if self.state != WatcherState::Idle {
            return Err(WatchError::InvalidState { state: self.state });
        }
        let tracked = projects
            .list_tracked()
            .map_err(|e| WatchError::RegistryFailed {
                reason: e.to_string(),
            })?;

        let mut event_loop = self
            .pending_loop
            .take()
            .ok_or(WatchError::InvalidState { state: self.state })?;

        let stream = event_loop
            .source
            .take_stream()
            .ok_or_else(|| WatchError::InitFailed {
                reason: "change source stream already taken".to_string(),
            })?;

        for (name, root) in tracked {
            event_loop.track(name, root);
        }
        let watched = event_loop.watch_set.len();
        crate::log_event!(
            "watcher",
            "monitoring",
            "{watched} projects in {} directories",
            event_loop.watch_set.dir_count()
        );

        let (tx, rx) = mpsc::channel(32);
        self.task = Some(tokio::spawn(event_loop.run(stream, rx)));
        self.commands = Some(tx);
        self.state = WatcherState::Watching;
        Ok(watched)
    }

    /// Start watching one more project and schedule its first scan.
    ///
    /// Returns the number of directories subscribed for it.
    pub async fn track_project(
        &self,
        name: impl Into<String>,
        root: impl Into<PathBuf>,
    ) -> Result<usize, WatchError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Track {
            name: name.into(),
            root: root.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| WatchError::ChannelClosed)
    }

    /// Stop watching a project. Its stored index is left alone.
    pub async fn untrack_project(&self, name: impl Into<String>) -> Result<bool, WatchError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Untrack {
            name: name.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| WatchError::ChannelClosed)
    }

    async fn send(&self, command: Command) -> Result<(), WatchError> {
        if self.state != WatcherState::Watching {
            return Err(WatchError::InvalidState { state: self.state });
        }
        let commands = self.commands.as_ref().ok_or(WatchError::ChannelClosed)?;
        commands
            .send(command)
            .await
            .map_err(|_| WatchError::ChannelClosed)
    }

    /// Stop the event loop, close the source and wait for in-flight rescans.
    ///
    /// Stopping an idle watcher moves it straight to `Stopped`.
    pub async fn stop(&mut self) -> Result<(), WatchError> {
        match self.state {
            WatcherState::Stopped => return Ok(()),
            WatcherState::Idle => {
                if let Some(mut event_loop) = self.pending_loop.take() {
                    event_loop.source.close();
                }
                self.state = WatcherState::Stopped;
                return Ok(());
            }
            WatcherState::Watching | WatcherState::ShuttingDown => {}
        }

        self.state = WatcherState::ShuttingDown;
        crate::log_event!("watcher", "stopping");

        if let Some(commands) = self.commands.take() {
            // A closed channel means the loop already exited
            let _ = commands.send(Command::Shutdown).await;
        }

        let joined = match self.task.take() {
            Some(task) => task.await.map_err(|e| WatchError::EventError {
                details: format!("event loop task failed: {e}"),
            }),
            None => Ok(()),
        };

        self.state = WatcherState::Stopped;
        crate::log_event!("watcher", "stopped");
        joined
    }
}

/// State owned by the event loop task.
struct EventLoop {
    engine: ScanEngine,
    source: Box<dyn ChangeSource>,
    watch_set: WatchSet,
    debouncer: Debouncer,
    sweep_interval: Duration,
    /// Extensions eligible for an immediate rescan
    fast_path: HashSet<String>,
    /// The store and registry documents
    own_paths: Vec<PathBuf>,
    default_filter: Arc<IgnoreFilter>,
    rescans: JoinSet<()>,
}

impl EventLoop {
    async fn run(mut self, mut stream: ChangeStream, mut commands: mpsc::Receiver<Command>) {
        let mut sweep = tokio::time::interval(self.sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut stream_open = true;

        crate::log_event!("watcher", "started");

        loop {
            tokio::select! {
                command = commands.recv() => {
                    match command {
                        Some(Command::Track { name, root, reply }) => {
                            let dirs = self.track(name.clone(), root.clone());
                            self.spawn_rescan(name, root);
                            let _ = reply.send(dirs);
                        }
                        Some(Command::Untrack { name, reply }) => {
                            let _ = reply.send(self.untrack(&name));
                        }
                        Some(Command::Shutdown) | None => break,
                    }
                }

                message = stream.recv(), if stream_open => {
                    match message {
                        Some(Ok(event)) => self.handle_event(event),
                        Some(Err(e)) => tracing::warn!("[watcher] {e}"),
                        None => {
                            tracing::warn!("[watcher] change source closed");
                            stream_open = false;
                        }
                    }
                }

                _ = sweep.tick() => self.sweep(),

                Some(joined) = self.rescans.join_next() => {
                    if let Err(e) = joined {
                        tracing::error!("[watcher] rescan task failed: {e}");
                    }
                }
            }
        }

        self.source.close();
        drop(stream);

        let in_flight = self.rescans.len();
        if in_flight > 0 {
            crate::debug_event!("watcher", "draining", "{in_flight} rescans");
        }
        while let Some(joined) = self.rescans.join_next().await {
            if let Err(e) = joined {
                tracing::error!("[watcher] rescan task failed: {e}");
            }
        }
    }

    fn handle_event(&mut self, event: ChangeEvent) {
        let path = &event.path;

        // Our own writes would otherwise trigger themselves
        if self.own_paths.iter().any(|own| own == path) {
            return;
        }

        let project = self.watch_set.resolve(path);
        if let Some(project) = project {
            if *path == project.root.join(&self.engine.settings().ignore_file) {
                let name = project.name.clone();
                self.reload_filter(&name);
                return;
            }
        }

        let ignored = match project {
            Some(project) => project.rejects(path),
            None => self.default_filter.should_ignore(path),
        };
        if ignored {
            crate::debug_event!("watcher", "ignored", "{}", path.display());
            return;
        }
        let project = project.map(|p| (p.name.clone(), p.root.clone()));

        if path.is_dir() {
            if event.kind == ChangeKind::Created {
                self.subscribe_new_dir(path, project.as_ref().map(|(name, _)| name.as_str()));
            }
            return;
        }

        let Some(extension) = extension_of(path) else {
            return;
        };

        match project {
            Some((name, root)) if self.fast_path.contains(&extension) => {
                crate::debug_event!("watcher", "fast path", "{}", path.display());
                self.spawn_rescan(name, root);
            }
            _ => self.debouncer.record(path.clone()),
        }
    }

    /// Fold quiet pending paths into one rescan per owning project.
    ///
    /// The rescan reads the whole tree, so the project's other pending paths
    /// are folded into it as well, even those still inside their window.
    fn sweep(&mut self) {
        if !self.debouncer.has_pending() {
            return;
        }

        let mut due = BTreeMap::new();
        for path in self.debouncer.take_ready() {
            match self.watch_set.resolve(&path) {
                Some(project) => {
                    due.entry(project.name.clone())
                        .or_insert_with(|| project.root.clone());
                }
                None => crate::debug_event!("watcher", "unowned", "{}", path.display()),
            }
        }

        let watch_set = &self.watch_set;
        for name in due.keys() {
            self.debouncer
                .take_where(|path| watch_set.resolve(path).is_some_and(|p| &p.name == name));
        }

        for (name, root) in due {
            self.spawn_rescan(name, root);
        }
    }

    fn spawn_rescan(&mut self, name: String, root: PathBuf) {
        crate::debug_event!("watcher", "rescan", "{name}");
        let engine = self.engine.clone();
        self.rescans.spawn(async move {
            // Outcome is logged and broadcast by the engine
            let _ = engine.run_scan(&root, &name).await;
        });
    }

    /// Subscribe a project's tree and add it to the watch set.
    fn track(&mut self, name: String, root: PathBuf) -> usize {
        let filter = Arc::new(self.engine.filter_for(&root));
        let dirs = ProjectWalker::new(Arc::clone(&filter)).directories(&root);

        let mut subscribed = Vec::with_capacity(dirs.len());
        for dir in dirs {
            match self.source.subscribe(&dir) {
                Ok(()) => subscribed.push(dir),
                Err(e) => tracing::warn!("[watcher] {e}"),
            }
        }
        if subscribed.is_empty() {
            tracing::warn!("[watcher] nothing to watch for {name} at {}", root.display());
        }

        let count = subscribed.len();
        crate::debug_event!("watcher", "tracking", "{name}: {count} directories");
        self.watch_set.insert(WatchedProject {
            name,
            root,
            filter,
            dirs: subscribed,
        });
        count
    }

    fn untrack(&mut self, name: &str) -> bool {
        let Some(project) = self.watch_set.remove(name) else {
            return false;
        };

        for dir in &project.dirs {
            if self.watch_set.is_subscribed_elsewhere(dir, name) {
                continue;
            }
            if let Err(e) = self.source.unsubscribe(dir) {
                crate::debug_event!("watcher", "unsubscribe failed", "{e}");
            }
        }
        self.debouncer.forget_under(&project.root);

        crate::log_event!("watcher", "untracked", "{name}");
        true
    }

    /// Re-read a project's ignore file and bring its subscriptions in line.
    ///
    /// Schedules a rescan so the stored index follows the new rules too.
    fn reload_filter(&mut self, name: &str) {
        let Some(project) = self.watch_set.get(name) else {
            return;
        };
        let root = project.root.clone();
        let filter = Arc::new(self.engine.filter_for(&root));
        let wanted: HashSet<PathBuf> = ProjectWalker::new(Arc::clone(&filter))
            .directories(&root)
            .into_iter()
            .collect();
        let current: HashSet<PathBuf> = project.dirs.iter().cloned().collect();

        for dir in current.difference(&wanted) {
            if self.watch_set.is_subscribed_elsewhere(dir, name) {
                continue;
            }
            if let Err(e) = self.source.unsubscribe(dir) {
                crate::debug_event!("watcher", "unsubscribe failed", "{e}");
            }
        }

        let mut dirs: Vec<PathBuf> = current.intersection(&wanted).cloned().collect();
        for dir in wanted.difference(&current) {
            match self.source.subscribe(dir) {
                Ok(()) => dirs.push(dir.clone()),
                Err(e) => tracing::warn!("[watcher] {e}"),
            }
        }
        dirs.sort();

        crate::log_event!(
            "watcher",
            "ignore rules reloaded",
            "{name}: {} directories",
            dirs.len()
        );
        if let Some(watched) = self.watch_set.get_mut(name) {
            watched.filter = filter;
            watched.dirs = dirs;
        }
        self.debouncer.forget_under(&root);
        self.spawn_rescan(name.to_string(), root);
    }

    /// Cover a directory created after start, including anything moved in with it.
    fn subscribe_new_dir(&mut self, dir: &Path, project: Option<&str>) {
        let filter = project
            .and_then(|name| self.watch_set.get(name))
            .map(|p| Arc::clone(&p.filter))
            .unwrap_or_else(|| Arc::clone(&self.default_filter));

        let mut added = Vec::new();
        for sub in ProjectWalker::new(filter).directories(dir) {
            match self.source.subscribe(&sub) {
                Ok(()) => added.push(sub),
                Err(e) => tracing::warn!("[watcher] {e}"),
            }
        }
        crate::debug_event!("watcher", "new directory", "{} ({} subscribed)", dir.display(), added.len());

        if let Some(watched) = project.and_then(|name| self.watch_set.get_mut(name)) {
            watched.dirs.extend(added);
        }
    }
}

/// The spellings an event may use for `path`: absolute, and with the parent
/// directory's symlinks resolved. The file itself need not exist yet.
fn path_forms(path: &Path) -> Vec<PathBuf> {
    let mut forms = vec![path.to_path_buf()];
    let Ok(absolute) = std::path::absolute(path) else {
        return forms;
    };
    if let (Some(parent), Some(file_name)) = (absolute.parent(), absolute.file_name()) {
        if let Ok(parent) = parent.canonicalize() {
            forms.push(parent.join(file_name));
        }
    }
    forms.push(absolute);
    forms
}

/// Builder for constructing a [`ProjectWatcher`].
pub struct ProjectWatcherBuilder {
    engine: Option<ScanEngine>,
    source: Option<Box<dyn ChangeSource>>,
    debounce_ms: Option<u64>,
    sweep_interval_ms: Option<u64>,
    fast_path: Option<bool>,
    own_paths: Vec<PathBuf>,
}

impl ProjectWatcherBuilder {
    pub fn new() -> Self {
        Self {
            engine: None,
            source: None,
            debounce_ms: None,
            sweep_interval_ms: None,
            fast_path: None,
            own_paths: Vec::new(),
        }
    }

    /// Engine used for rescans. Required.
    pub fn engine(mut self, engine: ScanEngine) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Change source to use instead of the `notify` backed one.
    pub fn source(mut self, source: impl ChangeSource) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Set the debounce duration in milliseconds.
    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.debounce_ms = Some(ms);
        self
    }

    pub fn sweep_interval_ms(mut self, ms: u64) -> Self {
        self.sweep_interval_ms = Some(ms);
        self
    }

    /// Whether built-in language files skip the debounce window.
    pub fn fast_path(mut self, enabled: bool) -> Self {
        self.fast_path = Some(enabled);
        self
    }

    /// Another file whose changes must never trigger a rescan.
    pub fn ignore_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.own_paths.push(path.into());
        self
    }

    /// Build an idle watcher. Unset options come from the engine's settings.
    pub fn build(self) -> Result<ProjectWatcher, WatchError> {
        let engine = self.engine.ok_or_else(|| WatchError::InitFailed {
            reason: "Scan engine is required".to_string(),
        })?;

        let source = match self.source {
            Some(source) => source,
            None => Box::new(NotifySource::new()?),
        };

        let settings = engine.settings();
        let debounce =
            Duration::from_millis(self.debounce_ms.unwrap_or(settings.watcher.debounce_ms));
        let sweep_interval = self
            .sweep_interval_ms
            .map(|ms| Duration::from_millis(ms.max(1)))
            .unwrap_or_else(|| settings.watcher.sweep_interval());
        let fast_path = if self.fast_path.unwrap_or(settings.watcher.fast_path) {
            engine.parsers().builtin_extensions()
        } else {
            HashSet::new()
        };

        let mut own_paths: Vec<PathBuf> = self
            .own_paths
            .into_iter()
            .chain([
                engine.store_path().to_path_buf(),
                settings.projects_path(),
                settings.plugins_path(),
            ])
            .flat_map(|path| path_forms(&path))
            .collect();
        own_paths.sort();
        own_paths.dedup();

        crate::debug_event!(
            "watcher",
            "configured",
            "debounce {debounce:?}, sweep {sweep_interval:?}, {} fast-path extensions",
            fast_path.len()
        );

        Ok(ProjectWatcher {
            state: WatcherState::Idle,
            pending_loop: Some(EventLoop {
                engine,
                source,
                watch_set: WatchSet::new(),
                debouncer: Debouncer::new(debounce),
                sweep_interval,
                fast_path,
                own_paths,
                default_filter: Arc::new(IgnoreFilter::with_defaults()),
                rescans: JoinSet::new(),
            }),
            commands: None,
            task: None,
        })
    }
}

impl Default for ProjectWatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_forms_include_absolute_spelling() {
        let forms = path_forms(Path::new(".todowatch/store.json"));
        let cwd = std::env::current_dir().unwrap();
        assert!(forms.contains(&PathBuf::from(".todowatch/store.json")));
        assert!(forms.contains(&cwd.join(".todowatch/store.json")));
    }

    #[cfg(unix)]
    #[test]
    fn test_path_forms_resolve_symlinked_parent() {
        let temp = tempfile::TempDir::new().unwrap();
        let real = temp.path().join("real");
        std::fs::create_dir(&real).unwrap();
        let link = temp.path().join("link");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        let forms = path_forms(&link.join("store.json"));
        assert!(forms.contains(&link.join("store.json")));
        assert!(forms.contains(&real.canonicalize().unwrap().join("store.json")));
    }
}
