//! idol
//!
//! One-stop crate for working with Idol schemas:
//!
//! - `syntax` / `compiler` / `schema_idl` / `textenc` (re-exported from
//!   idol-compiler)
//! - the binary message format runtime (re-exported from idol-schema)
//! - small one-call helpers for common pipelines.

pub use idol_compiler::compiler;
pub use idol_compiler::deps;
pub use idol_compiler::schema_idl;
pub use idol_compiler::syntax;
pub use idol_compiler::textenc;

pub mod wire {
    pub use idol_schema::*;
}

use idol_compiler::compiler::{compile, CompileOptions, CompileResult};
use idol_schema::DecodeError;

/// Parses and compiles a standalone schema source (no dependencies).
pub fn compile_source(src: &[u8]) -> Result<CompileResult, syntax::Error> {
    let parsed = syntax::parse(src)?;
    Ok(compile(&parsed, CompileOptions::new()))
}

/// Decodes a compiled schema buffer and renders its text encoding.
pub fn schema_to_text(buf: &[u8]) -> Result<String, DecodeError> {
    let schema = schema_idl::Schema::decode(buf)?;
    Ok(textenc::encode(&schema))
}

/// Renders compile diagnostics as a JSON document with `errors` and
/// `warnings` arrays.
pub fn diagnostics_to_json(result: &CompileResult) -> String {
    let doc = serde_json::json!({
        "errors": result.errors,
        "warnings": result.warnings,
    });
    serde_json::to_string_pretty(&doc).unwrap()
}
