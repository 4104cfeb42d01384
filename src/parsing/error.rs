//! Errors raised while extracting annotations from a single file.
//!
//! Every variant is scoped to one file; the scan engine logs them and moves on.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to load {language} grammar: {reason}")]
    Grammar { language: String, reason: String },

    #[error("Parser produced no syntax tree for {path}")]
    Syntax { path: PathBuf },

    #[error("Failed to start parser '{command}': {source}")]
    Spawn {
        command: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parser '{command}' failed on {path} ({status}): {stderr}")]
    ExternalFailed {
        command: PathBuf,
        path: PathBuf,
        status: String,
        stderr: String,
    },

    #[error("Parser '{command}' timed out after {timeout_secs}s on {path}")]
    Timeout {
        command: PathBuf,
        path: PathBuf,
        timeout_secs: u64,
    },

    #[error("Parse task for {path} did not complete: {reason}")]
    Task { path: PathBuf, reason: String },
}

pub type ParseResult<T> = Result<T, ParseError>;
