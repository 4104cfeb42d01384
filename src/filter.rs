//! Ignore filter deciding which paths are excluded from walking and watching.
//!
//! Two kinds of rules exist:
//! - directory rules (written with a trailing `/`) match when the normalized,
//!   forward-slash path ends with the pattern on a component boundary
//! - file rules are shell globs matched against the base name only
//!
//! The built-in defaults are always active. A project-local ignore file adds
//! rules on top of them and never replaces them.

use glob::Pattern;
use std::io;
use std::path::Path;

/// A single ignore pattern.
#[derive(Debug, Clone)]
pub struct IgnoreRule {
    pub pattern: String,
    pub is_directory: bool,
    glob: Option<Pattern>,
}

impl IgnoreRule {
    pub fn directory(pattern: impl Into<String>) -> Self {
        let pattern = normalize(&pattern.into()).trim_end_matches('/').to_string();
        Self {
            pattern,
            is_directory: true,
            glob: None,
        }
    }

    pub fn file(pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        let glob = match Pattern::new(&pattern) {
            Ok(glob) => Some(glob),
            Err(e) => {
                tracing::warn!("[ignore] invalid glob '{pattern}': {e}");
                None
            }
        };
        Self {
            pattern,
            is_directory: false,
            glob,
        }
    }

    /// Parse one line of an ignore file. Blank lines and `#` comments yield `None`.
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }
        match line.strip_suffix('/') {
            Some(dir) if !dir.is_empty() => Some(Self::directory(dir)),
            Some(_) => None,
            None => Some(Self::file(line)),
        }
    }

    /// Test this rule against an already normalized path and its base name.
    fn matches(&self, normalized: &str, base_name: &str) -> bool {
        if self.is_directory {
            if self.pattern.is_empty() {
                return false;
            }
            normalized == self.pattern
                || normalized
                    .strip_suffix(self.pattern.as_str())
                    .is_some_and(|head| head.ends_with('/'))
        } else {
            self.glob
                .as_ref()
                .is_some_and(|glob| glob.matches(base_name))
        }
    }
}

/// Common folders and transient artifacts nobody wants scanned.
pub fn default_rules() -> Vec<IgnoreRule> {
    let dirs = [
        ".git",
        ".hg",
        ".svn",
        "node_modules",
        "vendor",
        "dist",
        "build",
        "target",
        "__pycache__",
        ".venv",
    ];
    let files = [".DS_Store", "Thumbs.db", "*.log", "*.tmp", "*.swp", "*~"];

    dirs.into_iter()
        .map(IgnoreRule::directory)
        .chain(files.into_iter().map(IgnoreRule::file))
        .collect()
}

/// Set of ignore rules for one project (or the defaults alone).
#[derive(Debug, Clone)]
pub struct IgnoreFilter {
    rules: Vec<IgnoreRule>,
}

impl Default for IgnoreFilter {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl IgnoreFilter {
    /// A filter with no rules at all.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// A filter preloaded with the built-in defaults.
    pub fn with_defaults() -> Self {
        Self {
            rules: default_rules(),
        }
    }

    /// Defaults plus the project's own ignore file, if it has one.
    ///
    /// A missing file is not an error; an unreadable one is logged and skipped.
    pub fn for_project(root: &Path, ignore_file: &str) -> Self {
        let mut filter = Self::with_defaults();
        let path = root.join(ignore_file);
        match filter.load_file(&path) {
            Ok(true) => {
                crate::debug_event!("ignore", "loaded", "{}", path.display());
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!("[ignore] failed to read {}: {e}", path.display());
            }
        }
        filter
    }

    /// Append rules from an ignore file. Returns `Ok(false)` when the file is absent.
    pub fn load_file(&mut self, path: &Path) -> io::Result<bool> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e),
        };
        self.load_str(&content);
        Ok(true)
    }

    /// Append rules from ignore-file text.
    pub fn load_str(&mut self, content: &str) {
        self.rules
            .extend(content.lines().filter_map(IgnoreRule::parse_line));
    }

    pub fn add_rule(&mut self, rule: IgnoreRule) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[IgnoreRule] {
        &self.rules
    }

    /// Whether any rule rejects this path.
    pub fn should_ignore(&self, path: &Path) -> bool {
        let normalized = normalize(&path.to_string_lossy());
        let normalized = normalized.trim_end_matches('/');
        let base_name = normalized.rsplit('/').next().unwrap_or(normalized);
        self.rules
            .iter()
            .any(|rule| rule.matches(normalized, base_name))
    }

    /// Whether the path, or any directory between it and `root`, is ignored.
    ///
    /// The root itself is never tested, matching what the walker does.
    pub fn is_pruned(&self, root: &Path, path: &Path) -> bool {
        let Ok(relative) = path.strip_prefix(root) else {
            return self.should_ignore(path);
        };
        let mut current = root.to_path_buf();
        for component in relative.components() {
            current.push(component);
            if self.should_ignore(&current) {
                return true;
            }
        }
        false
    }
}

fn normalize(path: &str) -> String {
    path.replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_directory_rules() {
        let filter = IgnoreFilter::with_defaults();
        assert!(filter.should_ignore(Path::new("/repo/.git")));
        assert!(filter.should_ignore(Path::new("/repo/web/node_modules")));
        assert!(!filter.should_ignore(Path::new("/repo/src")));
        assert!(!filter.should_ignore(Path::new("/repo/src/main.go")));
    }

    #[test]
    fn test_directory_rule_respects_component_boundary() {
        let filter = IgnoreFilter::with_defaults();
        assert!(!filter.should_ignore(Path::new("/repo/rebuild")));
        assert!(filter.should_ignore(Path::new("/repo/build")));
    }

    #[test]
    fn test_multi_component_directory_rule() {
        let mut filter = IgnoreFilter::empty();
        filter.load_str("docs/generated/\n");
        assert!(filter.should_ignore(Path::new("/repo/docs/generated")));
        assert!(!filter.should_ignore(Path::new("/repo/generated")));
    }

    #[test]
    fn test_file_rules_match_base_name_only() {
        let filter = IgnoreFilter::with_defaults();
        assert!(filter.should_ignore(Path::new("/repo/logs/server.log")));
        assert!(filter.should_ignore(Path::new("/repo/.DS_Store")));
        assert!(!filter.should_ignore(Path::new("/repo/server.log.go")));
    }

    #[test]
    fn test_windows_separators_normalized() {
        let filter = IgnoreFilter::with_defaults();
        assert!(filter.should_ignore(Path::new(r"C:\repo\node_modules")));
    }

    #[test]
    fn test_parse_line() {
        assert!(IgnoreRule::parse_line("").is_none());
        assert!(IgnoreRule::parse_line("   ").is_none());
        assert!(IgnoreRule::parse_line("# comment").is_none());

        let dir = IgnoreRule::parse_line("generated/").unwrap();
        assert!(dir.is_directory);
        assert_eq!(dir.pattern, "generated");

        let file = IgnoreRule::parse_line("  *.pb.go ").unwrap();
        assert!(!file.is_directory);
        assert_eq!(file.pattern, "*.pb.go");
    }

    #[test]
    fn test_project_file_adds_to_defaults() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(".todoignore"),
            "# local rules\n\nfixtures/\n*.gen.rs\n",
        )
        .unwrap();

        let filter = IgnoreFilter::for_project(temp.path(), ".todoignore");
        assert!(filter.should_ignore(&temp.path().join("fixtures")));
        assert!(filter.should_ignore(&temp.path().join("src/a.gen.rs")));
        // Defaults survive
        assert!(filter.should_ignore(&temp.path().join(".git")));
    }

    #[test]
    fn test_missing_ignore_file_is_not_an_error() {
        let temp = TempDir::new().unwrap();
        let mut filter = IgnoreFilter::empty();
        let loaded = filter.load_file(&temp.path().join(".todoignore")).unwrap();
        assert!(!loaded);
        assert!(filter.rules().is_empty());
    }

    #[test]
    fn test_rule_order_does_not_matter() {
        let mut forward = IgnoreFilter::empty();
        forward.load_str("out/\n*.bak\n");
        let mut reverse = IgnoreFilter::empty();
        reverse.load_str("*.bak\nout/\n");

        for p in ["/r/out", "/r/a.bak", "/r/src/a.rs", "/r/out/a.rs"] {
            assert_eq!(
                forward.should_ignore(Path::new(p)),
                reverse.should_ignore(Path::new(p)),
                "{p}"
            );
        }
    }

    #[test]
    fn test_is_pruned_checks_ancestors() {
        let filter = IgnoreFilter::with_defaults();
        let root = Path::new("/repo");
        assert!(filter.is_pruned(root, Path::new("/repo/node_modules/pkg/index.js")));
        assert!(!filter.is_pruned(root, Path::new("/repo/src/index.js")));
        // Root is never tested
        assert!(!filter.is_pruned(Path::new("/work/build"), Path::new("/work/build/a.go")));
    }
}
