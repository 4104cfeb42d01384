//! Keeps tracked projects' annotation indexes current as files change.
//!
//! # Architecture
//!
//! ```text
//! ChangeSource (notify, or a fake in tests)
//!        | events, errors
//!        v
//! ProjectWatcher event loop
//!   - WatchSet (project -> root, filter, subscribed dirs)
//!   - Debouncer (path -> last change)
//!   - sweep timer
//!        | rescans (JoinSet)
//!        v
//! ScanEngine (shared scan lock) -> AnnotationStore
//! ```

mod debouncer;
mod error;
mod project_set;
mod project_watcher;
mod source;

pub use debouncer::Debouncer;
pub use error::WatchError;
pub use project_set::{WatchSet, WatchedProject};
pub use project_watcher::{ProjectWatcher, ProjectWatcherBuilder, WatcherState};
pub use source::{ChangeEvent, ChangeKind, ChangeSource, ChangeStream, NotifySource};
