//! Boundary with the project and plugin registries.
//!
//! The scan-and-watch core only reads from these: which projects are tracked
//! (and which one is active), and which external parsers are installed.
//! Adding, removing and choosing defaults happen elsewhere.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Failed to read registry {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Registry {path} is malformed: {reason}")]
    Parse { path: PathBuf, reason: String },
}

/// Source of tracked projects.
pub trait ProjectRegistry: Send + Sync {
    /// Every tracked project as `(name, root)`.
    fn list_tracked(&self) -> Result<Vec<(String, PathBuf)>, RegistryError>;

    /// Root of the active project, if one is selected.
    fn resolve_active(&self) -> Result<Option<PathBuf>, RegistryError>;
}

/// Source of external parser descriptors.
pub trait PluginRegistry: Send + Sync {
    /// Every installed plugin as `(command, extensions)`, in registration order.
    fn list_descriptors(&self) -> Result<Vec<(PathBuf, Vec<String>)>, RegistryError>;
}

/// In-memory registry, handy for embedding and tests. Nothing is active.
impl ProjectRegistry for BTreeMap<String, PathBuf> {
    fn list_tracked(&self) -> Result<Vec<(String, PathBuf)>, RegistryError> {
        Ok(self
            .iter()
            .map(|(name, root)| (name.clone(), root.clone()))
            .collect())
    }

    fn resolve_active(&self) -> Result<Option<PathBuf>, RegistryError> {
        Ok(None)
    }
}

/// On-disk shape of `projects.json`.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ProjectsDocument {
    #[serde(default)]
    pub projects: BTreeMap<String, PathBuf>,
    #[serde(default)]
    pub active: String,
}

/// On-disk shape of one plugin entry in `plugins.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginEntry {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub language: String,
    pub command: PathBuf,
    #[serde(default)]
    pub extensions: Vec<String>,
}

/// On-disk shape of `plugins.json`.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct PluginsDocument {
    #[serde(default)]
    pub plugins: Vec<PluginEntry>,
    #[serde(default)]
    pub defaults: IndexMap<String, String>,
}

/// Read a JSON document, treating a missing file as the default value.
fn read_document<T>(path: &Path) -> Result<T, RegistryError>
where
    T: for<'de> Deserialize<'de> + Default,
{
    let data = match std::fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(T::default()),
        Err(source) => {
            return Err(RegistryError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    if data.trim().is_empty() {
        return Ok(T::default());
    }

    serde_json::from_str(&data).map_err(|e| RegistryError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Project registry backed by `projects.json`.
#[derive(Debug, Clone)]
pub struct JsonProjectRegistry {
    path: PathBuf,
}

impl JsonProjectRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<ProjectsDocument, RegistryError> {
        read_document(&self.path)
    }
}

impl ProjectRegistry for JsonProjectRegistry {
    fn list_tracked(&self) -> Result<Vec<(String, PathBuf)>, RegistryError> {
        self.load()?.projects.list_tracked()
    }

    fn resolve_active(&self) -> Result<Option<PathBuf>, RegistryError> {
        let doc = self.load()?;
        Ok(doc.projects.get(&doc.active).cloned())
    }
}

/// Plugin registry backed by `plugins.json`.
#[derive(Debug, Clone)]
pub struct JsonPluginRegistry {
    path: PathBuf,
}

impl JsonPluginRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<PluginsDocument, RegistryError> {
        read_document(&self.path)
    }
}

impl PluginRegistry for JsonPluginRegistry {
    fn list_descriptors(&self) -> Result<Vec<(PathBuf, Vec<String>)>, RegistryError> {
        Ok(self
            .load()?
            .plugins
            .into_iter()
            .filter(|plugin| !plugin.command.as_os_str().is_empty())
            .map(|plugin| (plugin.command, plugin.extensions))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_missing_files_are_empty() {
        let temp = TempDir::new().unwrap();
        let projects = JsonProjectRegistry::new(temp.path().join("projects.json"));
        let plugins = JsonPluginRegistry::new(temp.path().join("plugins.json"));

        assert!(projects.list_tracked().unwrap().is_empty());
        assert_eq!(projects.resolve_active().unwrap(), None);
        assert!(plugins.list_descriptors().unwrap().is_empty());
    }

    #[test]
    fn test_projects_document() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("projects.json");
        fs::write(
            &path,
            r#"{"projects": {"web": "/src/web", "api": "/src/api"}, "active": "web"}"#,
        )
        .unwrap();

        let registry = JsonProjectRegistry::new(&path);
        let tracked = registry.list_tracked().unwrap();
        assert_eq!(
            tracked,
            vec![
                ("api".to_string(), PathBuf::from("/src/api")),
                ("web".to_string(), PathBuf::from("/src/web")),
            ]
        );
        assert_eq!(
            registry.resolve_active().unwrap(),
            Some(PathBuf::from("/src/web"))
        );
    }

    #[test]
    fn test_plugins_document_keeps_order() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("plugins.json");
        fs::write(
            &path,
            r#"{
  "plugins": [
    {"id": "py", "language": "python", "command": "/opt/pyparse", "extensions": [".py"]},
    {"id": "rb", "language": "ruby", "command": "/opt/rbparse", "extensions": [".rb", ".rake"]}
  ],
  "defaults": {"python": "py"}
}"#,
        )
        .unwrap();

        let descriptors = JsonPluginRegistry::new(&path).list_descriptors().unwrap();
        assert_eq!(descriptors.len(), 2);
        assert_eq!(descriptors[0].0, PathBuf::from("/opt/pyparse"));
        assert_eq!(descriptors[1].1, vec![".rb", ".rake"]);
    }

    #[test]
    fn test_malformed_registry_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("plugins.json");
        fs::write(&path, "{ not json").unwrap();
        let err = JsonPluginRegistry::new(&path).list_descriptors().unwrap_err();
        assert!(matches!(err, RegistryError::Parse { .. }));
    }
}
