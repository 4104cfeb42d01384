//! Annotation extraction.
//!
//! - [`marker`]: TODO/FIXME detection on raw comment text
//! - [`builtin`]: tree-sitter parsers for the built-in languages
//! - [`external`]: plugin commands speaking the `<line>:<text>` protocol
//! - [`dispatch`]: extension to parser resolution

pub mod builtin;
pub mod dispatch;
pub mod error;
pub mod external;
pub mod language;
pub mod marker;

pub use builtin::BuiltinParser;
pub use dispatch::{
    Capability, ParserDescriptor, ParserRegistry, extension_of, normalize_extension,
};
pub use error::{ParseError, ParseResult};
pub use external::ExternalParser;
pub use language::BuiltinLanguage;
