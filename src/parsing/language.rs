//! Languages with a built-in tree-sitter parser.

use std::fmt;
use tree_sitter::Node;

/// Languages parsed in-process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BuiltinLanguage {
    Go,
    Rust,
    Python,
    JavaScript,
    TypeScript,
}

impl BuiltinLanguage {
    /// Registration order for built-ins.
    pub const ALL: [BuiltinLanguage; 5] = [
        BuiltinLanguage::Go,
        BuiltinLanguage::Rust,
        BuiltinLanguage::Python,
        BuiltinLanguage::JavaScript,
        BuiltinLanguage::TypeScript,
    ];

    /// Key used under `[languages]` in settings.
    pub fn config_key(&self) -> &'static str {
        match self {
            BuiltinLanguage::Go => "go",
            BuiltinLanguage::Rust => "rust",
            BuiltinLanguage::Python => "python",
            BuiltinLanguage::JavaScript => "javascript",
            BuiltinLanguage::TypeScript => "typescript",
        }
    }

    pub fn from_config_key(key: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|lang| lang.config_key().eq_ignore_ascii_case(key))
    }

    /// Grammar to use for a file with the given (lowercase) extension.
    pub fn grammar(&self, extension: &str) -> tree_sitter::Language {
        match self {
            BuiltinLanguage::Go => tree_sitter_go::LANGUAGE.into(),
            BuiltinLanguage::Rust => tree_sitter_rust::LANGUAGE.into(),
            BuiltinLanguage::Python => tree_sitter_python::LANGUAGE.into(),
            BuiltinLanguage::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            BuiltinLanguage::TypeScript if extension == "tsx" => {
                tree_sitter_typescript::LANGUAGE_TSX.into()
            }
            BuiltinLanguage::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        }
    }

    /// Node kinds that represent comments.
    pub fn is_comment(&self, kind: &str) -> bool {
        match self {
            BuiltinLanguage::Rust => matches!(kind, "line_comment" | "block_comment"),
            _ => kind == "comment",
        }
    }

    /// Node kinds that declare a function or method.
    pub fn is_function(&self, kind: &str) -> bool {
        match self {
            BuiltinLanguage::Go => matches!(kind, "function_declaration" | "method_declaration"),
            BuiltinLanguage::Rust => kind == "function_item",
            BuiltinLanguage::Python => kind == "function_definition",
            BuiltinLanguage::JavaScript | BuiltinLanguage::TypeScript => matches!(
                kind,
                "function_declaration"
                    | "generator_function_declaration"
                    | "method_definition"
                    | "function_expression"
                    | "arrow_function"
            ),
        }
    }

    /// Name of a function node, if it has one.
    ///
    /// Anonymous JavaScript functions bound with `const name = ...` take the
    /// binding's name.
    pub fn function_name(&self, node: Node, code: &str) -> Option<String> {
        if let Some(name) = node.child_by_field_name("name") {
            return Some(code[name.byte_range()].to_string());
        }

        if matches!(self, BuiltinLanguage::JavaScript | BuiltinLanguage::TypeScript) {
            let parent = node.parent()?;
            if parent.kind() == "variable_declarator" {
                let name = parent.child_by_field_name("name")?;
                return Some(code[name.byte_range()].to_string());
            }
        }

        None
    }
}

impl fmt::Display for BuiltinLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.config_key())
    }
}
