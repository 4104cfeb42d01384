//! Marker detection and comment text cleanup.
//!
//! A comment carries a marker when `TODO` or `FIXME` (any case) follows a
//! whitespace character and is itself followed by `:`, `(`, `[` or whitespace.
//! The test runs on the raw comment text so the delimiter's trailing space
//! counts as the leading boundary (`// TODO: x` matches, `//TODO: x` does not).

use regex::Regex;
use std::sync::OnceLock;

static MARKER_PATTERN: OnceLock<Regex> = OnceLock::new();

fn marker_pattern() -> &'static Regex {
    MARKER_PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\s(TODO|FIXME)[\s:(\[]").expect("marker pattern is valid")
    })
}

const LINE_PREFIXES: [&str; 4] = ["///", "//!", "//", "#"];

/// Whether the raw comment text contains a TODO/FIXME marker.
pub fn has_marker(raw: &str) -> bool {
    marker_pattern().is_match(raw)
}

/// Strip comment delimiters and surrounding whitespace.
///
/// Block comments are flattened onto one line, dropping the leading `*`
/// gutter that doc-style blocks use.
pub fn clean_comment(raw: &str) -> String {
    let trimmed = raw.trim();

    if let Some(block) = trimmed.strip_prefix("/*") {
        let block = block.strip_suffix("*/").unwrap_or(block);
        return block
            .lines()
            .map(|line| line.trim().trim_start_matches('*').trim())
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
    }

    LINE_PREFIXES
        .iter()
        .find_map(|prefix| trimmed.strip_prefix(prefix))
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}
