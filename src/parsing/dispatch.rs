//! Extension-based parser dispatch.
//!
//! Built-in languages are registered first, external plugins after them, and
//! the first descriptor claiming an extension wins.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::builtin::BuiltinParser;
use super::external::ExternalParser;
use super::language::BuiltinLanguage;
use super::{ParseError, ParseResult};
use crate::Settings;
use crate::registry::PluginRegistry;
use crate::types::Annotation;

/// How annotations are extracted for a set of extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability {
    BuiltIn(BuiltinLanguage),
    External(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserDescriptor {
    /// Lowercase extensions without the leading dot.
    pub extensions: BTreeSet<String>,
    pub capability: Capability,
}

impl ParserDescriptor {
    pub fn new<I, S>(extensions: I, capability: Capability) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| normalize_extension(e.as_ref()))
                .filter(|e| !e.is_empty())
                .collect(),
            capability,
        }
    }

    pub fn handles(&self, extension: &str) -> bool {
        self.extensions.contains(extension)
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self.capability, Capability::BuiltIn(_))
    }
}

/// Lowercase an extension and drop any leading dot.
pub fn normalize_extension(extension: &str) -> String {
    extension.trim().trim_start_matches('.').to_ascii_lowercase()
}

/// Normalized extension of a path, if it has one.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(normalize_extension)
        .filter(|e| !e.is_empty())
}

/// Ordered set of parser descriptors.
#[derive(Debug, Clone)]
pub struct ParserRegistry {
    descriptors: Vec<ParserDescriptor>,
    external_timeout: Duration,
}

impl ParserRegistry {
    /// An empty registry.
    pub fn new(external_timeout: Duration) -> Self {
        Self {
            descriptors: Vec::new(),
            external_timeout,
        }
    }

    /// Built-in languages enabled in settings, in registration order.
    pub fn builtin(settings: &Settings) -> Self {
        let mut registry = Self::new(settings.parsers.external_timeout());

        for language in BuiltinLanguage::ALL {
            let Some(config) = settings.languages.get(language.config_key()) else {
                continue;
            };
            if !config.enabled {
                crate::debug_event!("parsers", "disabled", "{language}");
                continue;
            }
            registry.register(ParserDescriptor::new(
                &config.extensions,
                Capability::BuiltIn(language),
            ));
        }

        registry
    }

    /// Built-ins followed by every plugin the registry lists.
    ///
    /// An unreadable plugin registry is logged and leaves only the built-ins.
    pub fn from_settings(settings: &Settings, plugins: &dyn PluginRegistry) -> Self {
        let mut registry = Self::builtin(settings);

        match plugins.list_descriptors() {
            Ok(descriptors) => {
                for (command, extensions) in descriptors {
                    crate::debug_event!(
                        "parsers",
                        "plugin",
                        "{} for {extensions:?}",
                        command.display()
                    );
                    registry.register_external(command, extensions);
                }
            }
            Err(e) => {
                tracing::warn!("[parsers] failed to load plugins, using built-ins only: {e}");
            }
        }

        registry
    }

    pub fn register(&mut self, descriptor: ParserDescriptor) {
        self.descriptors.push(descriptor);
    }

    pub fn register_external<I, S>(&mut self, command: impl Into<PathBuf>, extensions: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.register(ParserDescriptor::new(
            extensions,
            Capability::External(command.into()),
        ));
    }

    pub fn descriptors(&self) -> &[ParserDescriptor] {
        &self.descriptors
    }

    /// First descriptor claiming this extension.
    pub fn resolve_extension(&self, extension: &str) -> Option<&ParserDescriptor> {
        let extension = normalize_extension(extension);
        self.descriptors.iter().find(|d| d.handles(&extension))
    }

    /// First descriptor claiming this path's extension.
    pub fn resolve(&self, path: &Path) -> Option<&ParserDescriptor> {
        extension_of(path).and_then(|ext| self.resolve_extension(&ext))
    }

    /// Extensions whose resolved parser is a built-in.
    pub fn builtin_extensions(&self) -> HashSet<String> {
        let mut seen = HashSet::new();
        let mut builtin = HashSet::new();
        for descriptor in &self.descriptors {
            for ext in &descriptor.extensions {
                if seen.insert(ext.clone()) && descriptor.is_builtin() {
                    builtin.insert(ext.clone());
                }
            }
        }
        builtin
    }

    /// Parse one file with the given descriptor.
    ///
    /// Never touches the store; the caller decides what to do with the result.
    pub async fn parse_file(
        &self,
        descriptor: &ParserDescriptor,
        path: &Path,
    ) -> ParseResult<Vec<Annotation>> {
        match &descriptor.capability {
            Capability::BuiltIn(language) => {
                let language = *language;
                let owned = path.to_path_buf();
                let extension = extension_of(path).unwrap_or_default();
                tokio::task::spawn_blocking(move || {
                    BuiltinParser::new(language, &extension)?.parse_file(&owned)
                })
                .await
                .map_err(|e| ParseError::Task {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })?
            }
            Capability::External(command) => {
                ExternalParser::new(command, self.external_timeout)
                    .parse_file(path)
                    .await
            }
        }
    }
}
