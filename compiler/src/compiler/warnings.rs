use crate::quote;
use crate::syntax::Span;
use serde::Serialize;
use std::fmt;

/// A non-fatal schema warning. Warnings never abort compilation and are
/// emitted alongside the schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    code: u32,
    message: String,
    span: Span,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "W{}: {}", self.code, self.message)
    }
}

impl Warning {
    pub fn code(&self) -> u32 {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn span(&self) -> Span {
        self.span
    }
}

pub(crate) fn warn_empty_import(ns: &str, span: Span) -> Warning {
    Warning {
        code: 4000,
        message: format!("Import from namespace {} is empty", quote(ns)),
        span,
    }
}

pub(crate) fn warn_unused_import(ns: &str, name: &str, span: Span) -> Warning {
    Warning {
        code: 4001,
        message: format!("Import '{}' from namespace {} is unused", name, quote(ns)),
        span,
    }
}

pub(crate) fn warn_unused_import_as(ns: &str, alias: &str, span: Span) -> Warning {
    Warning {
        code: 4002,
        message: format!(
            "Import of namespace {} (as {}) is unused",
            quote(ns),
            quote(alias),
        ),
        span,
    }
}

pub(crate) fn warn_duplicate_import(ns: &str, name: &str, span: Span) -> Warning {
    Warning {
        code: 4003,
        message: format!("Duplicate import '{}' from namespace {}", name, quote(ns)),
        span,
    }
}

pub(crate) fn warn_duplicate_import_as(ns: &str, alias: &str, span: Span) -> Warning {
    Warning {
        code: 4004,
        message: format!(
            "Duplicate import of namespace {} (as {})",
            quote(ns),
            quote(alias),
        ),
        span,
    }
}

pub(crate) fn warn_empty_export(span: Span) -> Warning {
    Warning {
        code: 4005,
        message: "Export is empty".to_owned(),
        span,
    }
}

pub(crate) fn warn_duplicate_export(type_name: &str, span: Span) -> Warning {
    Warning {
        code: 4006,
        message: format!("Duplicate export of '{}'", type_name),
        span,
    }
}

pub(crate) fn warn_export_as_same_name(name: &str, alias: &str, span: Span) -> Warning {
    Warning {
        code: 4007,
        message: format!("Export of '{}' as '{}' (same name)", name, alias),
        span,
    }
}

pub(crate) fn warn_export_local_decl(name: &str, span: Span) -> Warning {
    Warning {
        code: 4008,
        message: format!("Export of local declaration '{}' has no effect", name),
        span,
    }
}

pub(crate) fn warn_decl_shadows_builtin(name: &str, span: Span) -> Warning {
    Warning {
        code: 4009,
        message: format!("Local declaration '{}' shadows builtin", name),
        span,
    }
}

pub(crate) fn warn_duplicate_option(name: &str, span: Span) -> Warning {
    Warning {
        code: 4010,
        message: format!("Duplicate option '{}' with same value", name),
        span,
    }
}

pub(crate) fn warn_option_name_not_found(name: &str, span: Span) -> Warning {
    Warning {
        code: 4011,
        message: format!("Option name '{}' not found in schema", name),
        span,
    }
}
