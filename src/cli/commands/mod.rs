//! Command implementations for the CLI.
//!
//! Each command is implemented in its own module.

pub mod daemon;
pub mod init;
pub mod list;
pub mod scan;

use std::sync::Arc;

use crate::config::Settings;
use crate::indexing::ScanEngine;
use crate::parsing::ParserRegistry;
use crate::registry::JsonPluginRegistry;

/// Scan engine wired to the configured languages and plugin registry.
pub fn build_engine(settings: Arc<Settings>) -> ScanEngine {
    let plugins = JsonPluginRegistry::new(settings.plugins_path());
    let parsers = ParserRegistry::from_settings(&settings, &plugins);
    ScanEngine::new(settings, parsers)
}
