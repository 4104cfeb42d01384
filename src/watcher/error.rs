//! Error types for the project watcher.

use std::path::PathBuf;
use thiserror::Error;

use super::WatcherState;

/// Errors from watcher operations.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Failed to initialize watcher: {reason}")]
    InitFailed { reason: String },

    #[error("Cannot watch path {path}: {reason}")]
    PathWatchFailed { path: PathBuf, reason: String },

    #[error("File system event error: {details}")]
    EventError { details: String },

    #[error("Failed to list tracked projects: {reason}")]
    RegistryFailed { reason: String },

    #[error("Operation requires a watching watcher, current state is {state:?}")]
    InvalidState { state: WatcherState },

    #[error("Channel closed unexpectedly")]
    ChannelClosed,
}

impl From<notify::Error> for WatchError {
    fn from(e: notify::Error) -> Self {
        WatchError::InitFailed {
            reason: e.to_string(),
        }
    }
}
