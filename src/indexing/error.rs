use std::path::PathBuf;
use thiserror::Error;

use crate::registry::RegistryError;
use crate::storage::StoreError;

/// Failures that end one project's scan.
///
/// Per-file parse failures never surface here; they are logged and counted
/// in the [`ScanReport`](super::ScanReport).
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Cannot read project root {path}: {source}")]
    RootUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Walk of {path} failed: {reason}")]
    WalkFailed { path: PathBuf, reason: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Project registry error: {0}")]
    Registry(#[from] RegistryError),
}

pub type ScanResult<T> = Result<T, ScanError>;
