//! Out-of-process parsers speaking the line protocol.
//!
//! The command is run as `command <file>` and must exit successfully. Each
//! stdout line is `<line>:<comment>` where the comment may end with
//! `[in function <name>]`. Anything else on stdout is skipped.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::process::Command;

use super::{ParseError, ParseResult};
use crate::types::Annotation;

static FUNCTION_SUFFIX: OnceLock<Regex> = OnceLock::new();

fn function_suffix() -> &'static Regex {
    FUNCTION_SUFFIX.get_or_init(|| {
        Regex::new(r"^(.*?)\s*\[in function\s+([^\]]+)\]\s*$")
            .expect("function suffix pattern is valid")
    })
}

/// Runs an external parser command with a hard time limit.
#[derive(Debug, Clone)]
pub struct ExternalParser {
    command: PathBuf,
    timeout: Duration,
}

impl ExternalParser {
    pub fn new(command: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
        }
    }

    pub fn command(&self) -> &Path {
        &self.command
    }

    /// Run the command on `path` and collect its annotations.
    ///
    /// A run that outlives the timeout is killed and reported as a failure
    /// for this file only.
    pub async fn parse_file(&self, path: &Path) -> ParseResult<Vec<Annotation>> {
        let mut command = Command::new(&self.command);
        command
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own group, so a timeout also reaches anything the parser forked
        #[cfg(unix)]
        command.process_group(0);

        let child = command.spawn().map_err(|source| ParseError::Spawn {
            command: self.command.clone(),
            source,
        })?;
        let pid = child.id();

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|source| ParseError::Io {
                path: path.to_path_buf(),
                source,
            })?,
            Err(_elapsed) => {
                // The direct child is also killed when its handle drops
                if let Some(pid) = pid {
                    kill_process_group(pid);
                }
                return Err(ParseError::Timeout {
                    command: self.command.clone(),
                    path: path.to_path_buf(),
                    timeout_secs: self.timeout.as_secs(),
                });
            }
        };

        if !output.status.success() {
            return Err(ParseError::ExternalFailed {
                command: self.command.clone(),
                path: path.to_path_buf(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_output(&stdout, path))
    }
}

#[cfg(unix)]
fn kill_process_group(pid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: kill(2) with a negative pid signals the group we created at spawn
    if unsafe { libc::kill(-pgid, libc::SIGKILL) } != 0 {
        crate::debug_event!(
            "external",
            "kill failed",
            "group {pgid}: {}",
            std::io::Error::last_os_error()
        );
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: u32) {}

/// Turn parser stdout into annotations for `path`.
pub fn parse_output(stdout: &str, path: &Path) -> Vec<Annotation> {
    stdout
        .lines()
        .filter_map(|line| parse_line(line, path))
        .collect()
}

fn parse_line(line: &str, path: &Path) -> Option<Annotation> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let (number, text) = line.split_once(':')?;
    let number: u32 = match number.trim().parse() {
        Ok(n) if n > 0 => n,
        _ => {
            crate::debug_event!("external", "skipped", "bad line number in '{line}'");
            return None;
        }
    };

    let text = text.trim();
    let (comment, function) = match function_suffix().captures(text) {
        Some(caps) => (
            caps[1].trim().to_string(),
            Some(caps[2].trim().to_string()),
        ),
        None => (text.to_string(), None),
    };

    Some(Annotation::new(comment, path, number, function))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_output_with_function_suffix() {
        let out = "12:TODO: cache this [in function Loader.load]\n30:FIXME: global\n";
        let annotations = parse_output(out, Path::new("/p/a.py"));
        assert_eq!(annotations.len(), 2);
        assert_eq!(annotations[0].line_number, 12);
        assert_eq!(annotations[0].comment, "TODO: cache this");
        assert_eq!(annotations[0].function.as_deref(), Some("Loader.load"));
        assert_eq!(annotations[1].comment, "FIXME: global");
        assert_eq!(annotations[1].function, None);
        assert_eq!(annotations[1].file_path, PathBuf::from("/p/a.py"));
    }

    #[test]
    fn test_comment_keeps_later_colons() {
        let annotations = parse_output("4:TODO: see http://x/y", Path::new("a"));
        assert_eq!(annotations[0].comment, "TODO: see http://x/y");
    }

    #[test]
    fn test_malformed_lines_discarded() {
        let out = "no colon here\n\n   \nabc:TODO bad number\n0:TODO zero\n-3:TODO negative\n7:TODO ok\n";
        let annotations = parse_output(out, Path::new("a"));
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].line_number, 7);
    }
}
