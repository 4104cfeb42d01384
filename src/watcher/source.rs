//! Filesystem change notifications behind a small capability trait.
//!
//! The watcher only needs to subscribe and unsubscribe directories, read a
//! stream of events and errors, and close the subscription. [`NotifySource`]
//! provides that over `notify`; tests drive the watcher with their own source.

use std::path::{Path, PathBuf};

use notify::{Event, EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use super::WatchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

impl ChangeEvent {
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Events and subscription errors, in delivery order.
///
/// Unbounded: the producer side runs on the OS watcher's thread, which
/// `subscribe` also waits on, so a full queue would stall both.
pub type ChangeStream = mpsc::UnboundedReceiver<Result<ChangeEvent, WatchError>>;

pub trait ChangeSource: Send + 'static {
    /// Start receiving changes for the entries of one directory (not recursive).
    fn subscribe(&mut self, dir: &Path) -> Result<(), WatchError>;

    fn unsubscribe(&mut self, dir: &Path) -> Result<(), WatchError>;

    /// Hand over the event stream. Returns `None` once taken.
    fn take_stream(&mut self) -> Option<ChangeStream>;

    /// Release the OS subscription. Further calls are no-ops.
    fn close(&mut self);
}

/// [`ChangeSource`] backed by the platform's recommended `notify` watcher.
pub struct NotifySource {
    watcher: Option<notify::RecommendedWatcher>,
    stream: Option<ChangeStream>,
}

impl NotifySource {
    pub fn new() -> Result<Self, WatchError> {
        let (tx, rx) = mpsc::unbounded_channel();

        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                let Some(kind) = change_kind(&event.kind) else {
                    return;
                };
                for path in event.paths {
                    // Receiver gone means the watcher is shutting down
                    if tx.send(Ok(ChangeEvent { path, kind })).is_err() {
                        return;
                    }
                }
            }
            Err(e) => {
                let _ = tx.send(Err(WatchError::EventError {
                    details: e.to_string(),
                }));
            }
        })?;

        Ok(Self {
            watcher: Some(watcher),
            stream: Some(rx),
        })
    }
}

fn change_kind(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Created),
        EventKind::Modify(_) => Some(ChangeKind::Modified),
        EventKind::Remove(_) => Some(ChangeKind::Removed),
        EventKind::Access(_) => None,
        EventKind::Any | EventKind::Other => Some(ChangeKind::Other),
    }
}

impl ChangeSource for NotifySource {
    fn subscribe(&mut self, dir: &Path) -> Result<(), WatchError> {
        let watcher = self.watcher.as_mut().ok_or(WatchError::ChannelClosed)?;
        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| WatchError::PathWatchFailed {
                path: dir.to_path_buf(),
                reason: e.to_string(),
            })
    }

    fn unsubscribe(&mut self, dir: &Path) -> Result<(), WatchError> {
        let watcher = self.watcher.as_mut().ok_or(WatchError::ChannelClosed)?;
        watcher
            .unwatch(dir)
            .map_err(|e| WatchError::PathWatchFailed {
                path: dir.to_path_buf(),
                reason: e.to_string(),
            })
    }

    fn take_stream(&mut self) -> Option<ChangeStream> {
        self.stream.take()
    }

    fn close(&mut self) {
        // Dropping the watcher drops the callback's sender and ends the stream
        if self.watcher.take().is_some() {
            crate::debug_event!("watcher", "source closed");
        }
    }
}
