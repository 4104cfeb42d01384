//! Configuration module for the annotation tracker.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `TW_` and use double underscores
//! to separate nested levels:
//! - `TW_WATCHER__DEBOUNCE_MS=500` sets `watcher.debounce_ms`
//! - `TW_PARSERS__EXTERNAL_TIMEOUT_SECS=10` sets `parsers.external_timeout_secs`
//! - `TW_LOGGING__DEFAULT=info` sets `logging.default`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

const STORE_FILE: &str = "todos.json";
const PROJECTS_FILE: &str = "projects.json";
const PLUGINS_FILE: &str = "plugins.json";
const SETTINGS_FILE: &str = "settings.toml";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Directory holding the store and registry documents
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Name of the per-project ignore file
    #[serde(default = "default_ignore_file")]
    pub ignore_file: String,

    /// Watcher configuration
    #[serde(default)]
    pub watcher: WatcherConfig,

    /// Parser configuration
    #[serde(default)]
    pub parsers: ParserConfig,

    /// Built-in language settings
    #[serde(default = "default_languages")]
    pub languages: HashMap<String, LanguageConfig>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WatcherConfig {
    /// Quiet period before a changed path is folded into a rescan
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// How often pending changes are swept
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,

    /// Rescan immediately on changes to built-in language files
    #[serde(default = "default_true")]
    pub fast_path: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ParserConfig {
    /// Upper bound on a single external parser run
    #[serde(default = "default_external_timeout_secs")]
    pub external_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LanguageConfig {
    /// Whether this language is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// File extensions for this language
    #[serde(default)]
    pub extensions: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default level for every target
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-target overrides, e.g. `watcher = "debug"` for `todowatch::watcher`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("todowatch"))
        .unwrap_or_else(|| PathBuf::from(".todowatch"))
}
fn default_ignore_file() -> String {
    ".todoignore".to_string()
}
fn default_true() -> bool {
    true
}
fn default_debounce_ms() -> u64 {
    2000
}
fn default_sweep_interval_ms() -> u64 {
    500
}
fn default_external_timeout_secs() -> u64 {
    30
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            data_dir: default_data_dir(),
            ignore_file: default_ignore_file(),
            watcher: WatcherConfig::default(),
            parsers: ParserConfig::default(),
            languages: default_languages(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            sweep_interval_ms: default_sweep_interval_ms(),
            fast_path: true,
        }
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            external_timeout_secs: default_external_timeout_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

fn default_languages() -> HashMap<String, LanguageConfig> {
    let lang = |exts: &[&str]| LanguageConfig {
        enabled: true,
        extensions: exts.iter().map(|e| e.to_string()).collect(),
    };

    let mut langs = HashMap::new();
    langs.insert("go".to_string(), lang(&["go"]));
    langs.insert("rust".to_string(), lang(&["rs"]));
    langs.insert("python".to_string(), lang(&["py", "pyi"]));
    langs.insert(
        "javascript".to_string(),
        lang(&["js", "jsx", "mjs", "cjs"]),
    );
    langs.insert("typescript".to_string(), lang(&["ts", "tsx", "mts", "cts"]));
    langs
}

impl WatcherConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms.max(1))
    }
}

impl ParserConfig {
    pub fn external_timeout(&self) -> Duration {
        Duration::from_secs(self.external_timeout_secs.max(1))
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        Self::load_from(Self::config_path())
    }

    /// Load configuration from a specific file, layered over defaults and under env vars
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            // Double underscore separates nesting; single underscores stay in field names
            .merge(Env::prefixed("TW_").map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
            .map_err(Box::new)
    }

    /// Default location of the settings file
    pub fn config_path() -> PathBuf {
        default_data_dir().join(SETTINGS_FILE)
    }

    /// Persisted annotation store
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(STORE_FILE)
    }

    /// Project registry document
    pub fn projects_path(&self) -> PathBuf {
        self.data_dir.join(PROJECTS_FILE)
    }

    /// Plugin registry document
    pub fn plugins_path(&self) -> PathBuf {
        self.data_dir.join(PLUGINS_FILE)
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file and a sample ignore file next to it
    pub fn init_config_file(
        path: impl AsRef<Path>,
        force: bool,
    ) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = path.as_ref().to_path_buf();

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        let settings = Settings::default();
        settings.save(&config_path)?;
        crate::log_event!("config", "written", "{}", config_path.display());

        if let Some(dir) = config_path.parent() {
            Self::create_sample_ignore_file(dir, &settings.ignore_file, force)?;
        }

        Ok(config_path)
    }

    /// Write a commented sample ignore file users can copy into their projects
    fn create_sample_ignore_file(
        dir: &Path,
        ignore_file: &str,
        force: bool,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let sample_path = dir.join(format!("{}.sample", ignore_file.trim_start_matches('.')));

        if !force && sample_path.exists() {
            return Ok(());
        }

        let content = format!(
            r#"# todowatch ignore patterns
#
# Copy this file to a tracked project root as `{ignore_file}`.
# Rules are added to the built-in defaults (.git/, node_modules/, build/, *.log ...).
#
# A trailing slash marks a directory rule, matched against the end of the path:
#   generated/
#   docs/api/
#
# Anything else is a glob matched against the file name only:
#   *.pb.go
#   *_generated.rs
"#
        );

        std::fs::write(&sample_path, content)?;
        Ok(())
    }
}
