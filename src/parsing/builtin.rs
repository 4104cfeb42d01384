//! In-process annotation extraction over a tree-sitter syntax tree.

use std::path::Path;
use tree_sitter::{Node, Parser};

use super::language::BuiltinLanguage;
use super::marker::{clean_comment, has_marker};
use super::{ParseError, ParseResult};
use crate::types::Annotation;

pub struct BuiltinParser {
    language: BuiltinLanguage,
    parser: Parser,
}

impl std::fmt::Debug for BuiltinParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltinParser")
            .field("language", &self.language)
            .finish()
    }
}

impl BuiltinParser {
    /// Create a parser for `language`, picking the grammar variant for `extension`.
    pub fn new(language: BuiltinLanguage, extension: &str) -> ParseResult<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&language.grammar(extension))
            .map_err(|e| ParseError::Grammar {
                language: language.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self { language, parser })
    }

    pub fn language(&self) -> BuiltinLanguage {
        self.language
    }

    /// Read and parse a file from disk.
    ///
    /// Invalid UTF-8 is replaced rather than rejected; line numbers are
    /// unaffected.
    pub fn parse_file(&mut self, path: &Path) -> ParseResult<Vec<Annotation>> {
        let bytes = std::fs::read(path).map_err(|source| ParseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let code = String::from_utf8_lossy(&bytes);
        self.parse(&code, path)
    }

    /// Extract annotations from source text, attributing them to `path`.
    pub fn parse(&mut self, code: &str, path: &Path) -> ParseResult<Vec<Annotation>> {
        let tree = self
            .parser
            .parse(code, None)
            .ok_or_else(|| ParseError::Syntax {
                path: path.to_path_buf(),
            })?;

        let annotations: Vec<Annotation> = self
            .collect_comments(tree.root_node())
            .into_iter()
            .filter_map(|comment| {
                let raw = &code[comment.byte_range()];
                if !has_marker(raw) {
                    return None;
                }
                let line = comment.start_position().row as u32 + 1;
                let function = self.enclosing_function(comment, code);
                crate::debug_event!(
                    "parse",
                    "marker",
                    "{}:{line} in {}",
                    path.display(),
                    function.as_deref().unwrap_or("-")
                );
                Some(Annotation::new(clean_comment(raw), path, line, function))
            })
            .collect();

        Ok(annotations)
    }

    /// Gather comment nodes in tree order, without descending into them.
    fn collect_comments<'t>(&self, root: Node<'t>) -> Vec<Node<'t>> {
        let mut comments = Vec::new();
        let mut cursor = root.walk();

        loop {
            let node = cursor.node();
            let is_comment = self.language.is_comment(node.kind());
            if is_comment {
                comments.push(node);
            }

            if !is_comment && cursor.goto_first_child() {
                continue;
            }

            loop {
                if cursor.goto_next_sibling() {
                    break;
                }
                if !cursor.goto_parent() {
                    return comments;
                }
            }
        }
    }

    /// Innermost named function whose span contains the comment.
    fn enclosing_function(&self, comment: Node, code: &str) -> Option<String> {
        let mut current = comment.parent();
        while let Some(node) = current {
            if self.language.is_function(node.kind()) {
                if let Some(name) = self.language.function_name(node, code) {
                    return Some(name);
                }
            }
            current = node.parent();
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(language: BuiltinLanguage, ext: &str, code: &str) -> Vec<Annotation> {
        let mut parser = BuiltinParser::new(language, ext).unwrap();
        parser.parse(code, Path::new("/p/file")).unwrap()
    }

    #[test]
    fn test_go_todo_inside_function() {
        let code = r#"package main

import "fmt"

// Foo does things.
func Foo() {
	fmt.Println("a")
	fmt.Println("b")
	fmt.Println("c")
	// TODO: fix this
	fmt.Println("d")
}
"#;
        let annotations = parse(BuiltinLanguage::Go, "go", code);
        assert_eq!(annotations.len(), 1);
        let a = &annotations[0];
        assert_eq!(a.comment, "TODO: fix this");
        assert_eq!(a.line_number, 10);
        assert_eq!(a.function.as_deref(), Some("Foo"));
    }

    #[test]
    fn test_invalid_utf8_file_still_yields_annotations() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("latin1.go");
        let mut code = b"package main\n\nfunc F() {\n\ts := \"caf".to_vec();
        code.push(0xe9);
        code.extend_from_slice(b"\"\n\t// TODO: latin1 file\n\t_ = s\n}\n");
        std::fs::write(&path, code).unwrap();

        let mut parser = BuiltinParser::new(BuiltinLanguage::Go, "go").unwrap();
        let annotations = parser.parse_file(&path).unwrap();
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].comment, "TODO: latin1 file");
        assert_eq!(annotations[0].line_number, 5);
        assert_eq!(annotations[0].function.as_deref(), Some("F"));
    }

    #[test]
    fn test_go_method_and_top_level() {
        let code = r#"package main

// FIXME: package-level note
type T struct{}

func (t *T) Run() {
	// todo(bob) handle error
}
"#;
        let annotations = parse(BuiltinLanguage::Go, "go", code);
        assert_eq!(annotations.len(), 2);
        assert_eq!(annotations[0].line_number, 3);
        assert_eq!(annotations[0].function, None);
        assert_eq!(annotations[1].function.as_deref(), Some("Run"));
    }

    #[test]
    fn test_go_closure_reports_named_parent() {
        let code = r#"package main

func Outer() {
	f := func() {
		// TODO: inside closure
	}
	f()
}
"#;
        let annotations = parse(BuiltinLanguage::Go, "go", code);
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].function.as_deref(), Some("Outer"));
    }

    #[test]
    fn test_rust_innermost_function() {
        let code = r#"
fn outer() {
    fn inner() {
        // FIXME: nested
    }
    // TODO: outer body
}
"#;
        let annotations = parse(BuiltinLanguage::Rust, "rs", code);
        assert_eq!(annotations.len(), 2);
        assert_eq!(annotations[0].function.as_deref(), Some("inner"));
        assert_eq!(annotations[0].comment, "FIXME: nested");
        assert_eq!(annotations[1].function.as_deref(), Some("outer"));
    }

    #[test]
    fn test_rust_block_and_doc_comments() {
        let code = r#"
/// TODO: document the config
struct Config;

impl Config {
    fn load() {
        /* FIXME: handle missing file */
    }
}
"#;
        let annotations = parse(BuiltinLanguage::Rust, "rs", code);
        assert_eq!(annotations.len(), 2);
        assert_eq!(annotations[0].comment, "TODO: document the config");
        assert_eq!(annotations[0].function, None);
        assert_eq!(annotations[1].comment, "FIXME: handle missing file");
        assert_eq!(annotations[1].function.as_deref(), Some("load"));
    }

    #[test]
    fn test_python_method() {
        let code = r#"# FIXME: module level
class Loader:
    def load(self):
        # TODO: cache results
        return 1
"#;
        let annotations = parse(BuiltinLanguage::Python, "py", code);
        assert_eq!(annotations.len(), 2);
        assert_eq!(annotations[0].function, None);
        assert_eq!(annotations[1].function.as_deref(), Some("load"));
        assert_eq!(annotations[1].line_number, 4);
    }

    #[test]
    fn test_javascript_arrow_binding() {
        let code = r#"
const handler = () => {
  // TODO: debounce
};

class View {
  render() {
    // FIXME: flicker
  }
}
"#;
        let annotations = parse(BuiltinLanguage::JavaScript, "js", code);
        assert_eq!(annotations.len(), 2);
        assert_eq!(annotations[0].function.as_deref(), Some("handler"));
        assert_eq!(annotations[1].function.as_deref(), Some("render"));
    }

    #[test]
    fn test_typescript_function() {
        let code = r#"
export function total(xs: number[]): number {
  // TODO: overflow
  return xs.reduce((a, b) => a + b, 0);
}
"#;
        let annotations = parse(BuiltinLanguage::TypeScript, "ts", code);
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].function.as_deref(), Some("total"));
    }

    #[test]
    fn test_comments_without_markers_ignored() {
        let code = "fn main() {\n    // just a note\n    //TODO: no space\n}\n";
        assert!(parse(BuiltinLanguage::Rust, "rs", code).is_empty());
    }
}
