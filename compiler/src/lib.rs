//! idol-compiler
//!
//! This crate implements:
//!  1) A lexer + recursive-descent parser for `.idol` IDL files, producing a
//!     lossless concrete syntax tree (`syntax`),
//!  2) The semantic compiler: name and import resolution, option and value
//!     compilation, diagnostics (`compiler`),
//!  3) Merging of pre-compiled dependency schemas (`deps::SchemaSet`),
//!  4) The compiled schema's own message types (`schema_idl`),
//!  5) The line-oriented text rendering of compiled schemas (`textenc`).

pub mod compiler;
pub mod deps;
pub mod schema_idl;
pub mod syntax;
pub mod textenc;

pub use compiler::{compile, CompileOptions, CompileResult};
pub use deps::{merge, SchemaSet};

pub(crate) fn quote(text: &str) -> String {
    serde_json::to_string(text).unwrap()
}
