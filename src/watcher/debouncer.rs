//! Pending-change table for debounced rescans.
//!
//! A burst of saves to the same path keeps pushing its timestamp forward; the
//! path only comes out once it has been quiet for the whole window.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Debounces change events by path.
#[derive(Debug)]
pub struct Debouncer {
    /// Pending changes: path -> last change timestamp.
    pending: HashMap<PathBuf, Instant>,
    /// How long a path must be quiet before it is released.
    duration: Duration,
}

impl Debouncer {
    pub fn new(duration: Duration) -> Self {
        Self {
            pending: HashMap::new(),
            duration,
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Record a change, resetting the window for this path.
    pub fn record(&mut self, path: PathBuf) {
        self.record_at(path, Instant::now());
    }

    pub fn record_at(&mut self, path: PathBuf, at: Instant) {
        self.pending.insert(path, at);
    }

    /// Drop every pending path under `root`.
    pub fn forget_under(&mut self, root: &Path) {
        self.pending.retain(|path, _| !path.starts_with(root));
    }

    /// Take all paths that have been quiet for the debounce window.
    pub fn take_ready(&mut self) -> Vec<PathBuf> {
        self.take_ready_at(Instant::now())
    }

    pub fn take_ready_at(&mut self, now: Instant) -> Vec<PathBuf> {
        let mut ready = Vec::new();

        self.pending.retain(|path, last_change| {
            if now.saturating_duration_since(*last_change) >= self.duration {
                ready.push(path.clone());
                false
            } else {
                true
            }
        });

        ready.sort();
        ready
    }

    /// Take every pending path matching `pred`, quiet or not.
    pub fn take_where(&mut self, pred: impl Fn(&Path) -> bool) -> Vec<PathBuf> {
        let mut taken = Vec::new();
        self.pending.retain(|path, _| {
            if pred(path) {
                taken.push(path.clone());
                false
            } else {
                true
            }
        });
        taken
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
