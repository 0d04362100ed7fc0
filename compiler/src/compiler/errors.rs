use crate::quote;
use crate::schema_idl::Type;
use crate::syntax::Span;
use serde::Serialize;

/// A semantic (schema) error. These are collected rather than fatal: the
/// compiler keeps going to surface as many as possible, but no schema is
/// emitted once any have been reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("E{code}: {message}")]
pub struct Error {
    code: u32,
    message: String,
    span: Span,
}

impl Error {
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

fn type_lower(type_: Type) -> String {
    type_.name().to_lowercase()
}

pub(crate) fn err_invalid_namespace(namespace: &str, span: Span) -> Error {
    Error {
        code: 3000,
        message: format!("Invalid namespace name {}", quote(namespace)),
        span,
    }
}

pub(crate) fn err_import_namespace_not_found(ns: &str, span: Span) -> Error {
    Error {
        code: 3001,
        message: format!("Namespace {} not found in dependencies", quote(ns)),
        span,
    }
}

pub(crate) fn err_import_as_conflict(prev_ns: &str, ns: &str, alias: &str, span: Span) -> Error {
    Error {
        code: 3002,
        message: format!(
            "Import of namespace {} as '{}' conflicts with earlier import of namespace {} as '{}'",
            quote(ns),
            alias,
            quote(prev_ns),
            alias,
        ),
        span,
    }
}

pub(crate) fn err_import_as_not_found(alias: &str, span: Span) -> Error {
    Error {
        code: 3003,
        message: format!("No namespace imported as '{}'", alias),
        span,
    }
}

pub(crate) fn err_import_name_conflict(prev_ns: &str, ns: &str, name: &str, span: Span) -> Error {
    Error {
        code: 3004,
        message: format!(
            "Import of '{}' from namespace {} conflicts with earlier import of '{}' from namespace {}",
            name,
            quote(ns),
            name,
            quote(prev_ns),
        ),
        span,
    }
}

pub(crate) fn err_import_name_not_found(ns: &str, name: &str, span: Span) -> Error {
    Error {
        code: 3005,
        message: format!("Name '{}' not found in imported namespace {}", name, quote(ns)),
        span,
    }
}

pub(crate) fn err_import_name_definition_conflict(ns: &str, name: &str, span: Span) -> Error {
    Error {
        code: 3006,
        message: format!(
            "Name '{}' imported from namespace {} has conflicting definitions",
            name,
            quote(ns),
        ),
        span,
    }
}

pub(crate) fn err_imported_name_not_type(got: &str, ns: &str, name: &str, span: Span) -> Error {
    Error {
        code: 3007,
        message: format!(
            "Name '{}' imported from namespace {} is a {}, not a type",
            name,
            quote(ns),
            got,
        ),
        span,
    }
}

pub(crate) fn err_option_name_conflict(name: &str, span: Span) -> Error {
    Error {
        code: 3010,
        message: format!("Option '{}' already assigned", name),
        span,
    }
}

pub(crate) fn err_decl_name_conflict(
    decl_type: &str,
    decl_name: &str,
    prev_type: &str,
    prev_name: &str,
    span: Span,
) -> Error {
    Error {
        code: 3012,
        message: format!(
            "Declaration of {} '{}' conflicts with earlier declaration of {} '{}'",
            decl_type, decl_name, prev_type, prev_name,
        ),
        span,
    }
}

pub(crate) fn err_decl_name_conflicts_with_import(
    decl_type: &str,
    name: &str,
    namespace: &str,
    span: Span,
) -> Error {
    Error {
        code: 3013,
        message: format!(
            "Declaration of {} '{}' conflicts with name imported from namespace {}",
            decl_type,
            name,
            quote(namespace),
        ),
        span,
    }
}

pub(crate) fn err_decl_name_conflicts_with_import_as(
    decl_type: &str,
    name: &str,
    namespace: &str,
    span: Span,
) -> Error {
    Error {
        code: 3014,
        message: format!(
            "Declaration of {} '{}' conflicts with import of namespace {} as '{}'",
            decl_type,
            name,
            quote(namespace),
            name,
        ),
        span,
    }
}

pub(crate) fn err_value_type_mismatch(
    dst_node_type: &str,
    dst_name: &str,
    type_desc: &str,
    value: &str,
    span: Span,
) -> Error {
    Error {
        code: 3015,
        message: format!(
            "Cannot assign value {} to {} {} (type '{}')",
            value, dst_node_type, dst_name, type_desc,
        ),
        span,
    }
}

pub(crate) fn err_value_out_of_range(type_: Type, value: i128, span: Span) -> Error {
    let (type_name, value_min, value_max, range_desc): (&str, i128, i128, &str) = match type_ {
        Type::U8 => ("u8", 0, u8::MAX as i128, ""),
        Type::I8 => ("i8", i8::MIN as i128, i8::MAX as i128, ""),
        Type::U16 => ("u16", 0, u16::MAX as i128, ""),
        Type::I16 => ("i16", i16::MIN as i128, i16::MAX as i128, ""),
        Type::U32 => ("u32", 0, u32::MAX as i128, ""),
        Type::I32 => ("i32", i32::MIN as i128, i32::MAX as i128, ""),
        Type::U64 => ("u64", 0, u64::MAX as i128, ""),
        Type::I64 => ("i64", i64::MIN as i128, i64::MAX as i128, ""),
        Type::F32 => (
            "f32",
            -(1i128 << 24),
            1i128 << 24,
            "floating-point unrounded integer ",
        ),
        Type::F64 => (
            "f64",
            -(1i128 << 53),
            1i128 << 53,
            "floating-point unrounded integer ",
        ),
        _ => unreachable!(),
    };
    Error {
        code: 3016,
        message: format!(
            "Value {} out of {}range [{}, {}] for type '{}'",
            value, range_desc, value_min, value_max, type_name,
        ),
        span,
    }
}

pub(crate) fn err_invalid_bool_value(span: Span) -> Error {
    Error {
        code: 3017,
        message: "Invalid value for type 'bool' (expected '.true' or '.false')".to_owned(),
        span,
    }
}

pub(crate) fn err_invalid_asciz_value(span: Span) -> Error {
    Error {
        code: 3018,
        message: "Invalid value for type 'asciz' (contains NUL)".to_owned(),
        span,
    }
}

pub(crate) fn err_invalid_text_value(span: Span) -> Error {
    Error {
        code: 3019,
        message: "Invalid value for type 'text' (contains NUL and/or non-ASCII byte escape)"
            .to_owned(),
        span,
    }
}

pub(crate) fn err_const_type_invalid(type_name: &str, span: Span) -> Error {
    Error {
        code: 3020,
        message: format!("Invalid type '{}' for constant", type_name),
        span,
    }
}

pub(crate) fn err_enum_type_invalid(name: &str, span: Span) -> Error {
    Error {
        code: 3021,
        message: format!("Invalid type '{}' for enum", name),
        span,
    }
}

pub(crate) fn err_enum_item_name_conflict(name: &str, prev: &str, span: Span) -> Error {
    Error {
        code: 3022,
        message: format!(
            "Enum item '{}' conflicts with name of earlier item '{}' (= {})",
            name, name, prev,
        ),
        span,
    }
}

pub(crate) fn err_enum_item_value_conflict(
    enum_type: Type,
    value: u64,
    name: &str,
    prev_name: &str,
    span: Span,
) -> Error {
    let value_str = match enum_type {
        Type::I8 => format!("{}", value as u8 as i8),
        Type::I16 => format!("{}", value as u16 as i16),
        Type::I32 => format!("{}", value as u32 as i32),
        Type::I64 => format!("{}", value as i64),
        _ => format!("{}", value),
    };
    Error {
        code: 3023,
        message: format!(
            "Enum item '{}' value {} conflicts with value of earlier item '{}'",
            name, value_str, prev_name,
        ),
        span,
    }
}

pub(crate) fn err_struct_empty(name: &str, span: Span) -> Error {
    Error {
        code: 3024,
        message: format!("Struct '{}' contains no fields", name),
        span,
    }
}

fn fmt_tag_suffix(tag: Option<u64>) -> String {
    match tag {
        Some(tag) => format!(" (tag @{})", tag),
        None => String::new(),
    }
}

pub(crate) fn err_field_name_conflict(
    record_type: &str,
    field_name: &str,
    field_tag: Option<u64>,
    prev_name: &str,
    prev_tag: Option<u64>,
    span: Span,
) -> Error {
    Error {
        code: 3025,
        message: format!(
            "{} field name '{}'{} conflicts with name of earlier field '{}'{}",
            record_type,
            field_name,
            fmt_tag_suffix(field_tag),
            prev_name,
            fmt_tag_suffix(prev_tag),
        ),
        span,
    }
}

pub(crate) fn err_field_tag_conflict(
    record_type: &str,
    field_name: &str,
    tag: u16,
    prev_name: &str,
    span: Span,
) -> Error {
    Error {
        code: 3026,
        message: format!(
            "{} field '{}' (tag @{}) conflicts with tag of earlier field '{}'",
            record_type, field_name, tag, prev_name,
        ),
        span,
    }
}

pub(crate) fn err_field_tag_out_of_range(record_type: &str, value: i128, span: Span) -> Error {
    Error {
        code: 3027,
        message: format!(
            "Value {} out of range [1, 65535] for {} field tag",
            value, record_type,
        ),
        span,
    }
}

pub(crate) fn err_protocol_item_name_conflict(
    item_type: &str,
    name: &str,
    prev_item_type: &str,
    span: Span,
) -> Error {
    Error {
        code: 3028,
        message: format!(
            "Protocol {} '{}' conflicts with name of earlier {} '{}'",
            item_type, name, prev_item_type, name,
        ),
        span,
    }
}

pub(crate) fn err_protocol_item_tag_conflict(
    item_type: &str,
    name: &str,
    tag: u64,
    prev_item_type: &str,
    prev_name: &str,
    span: Span,
) -> Error {
    Error {
        code: 3029,
        message: format!(
            "Protocol {} '{}' (tag @{}) conflicts with tag of earlier {} '{}'",
            item_type, name, tag, prev_item_type, prev_name,
        ),
        span,
    }
}

pub(crate) fn err_protocol_tag_out_of_range(value: i128, span: Span) -> Error {
    Error {
        code: 3030,
        message: format!(
            "Value {} out of range [0, {}] for protocol item tag",
            value,
            u64::MAX,
        ),
        span,
    }
}

pub(crate) fn err_options_schema_must_be_message(got: Type, span: Span) -> Error {
    Error {
        code: 3031,
        message: format!(
            "Options schema must be an imported message (got '{}')",
            type_lower(got),
        ),
        span,
    }
}

pub(crate) fn err_options_schema_must_be_imported(span: Span) -> Error {
    Error {
        code: 3032,
        message: "Options schema must be an imported message".to_owned(),
        span,
    }
}

pub(crate) fn err_imported_name_not_const(got: &str, ns: &str, name: &str, span: Span) -> Error {
    Error {
        code: 3033,
        message: format!(
            "Name '{}' imported from namespace {} is a {}, not a constant",
            name,
            quote(ns),
            got,
        ),
        span,
    }
}

pub(crate) fn err_option_name_through_non_message(
    name: &str,
    type_: Type,
    type_name: &str,
    span: Span,
) -> Error {
    let via = if type_name.is_empty() {
        type_lower(type_)
    } else {
        type_name.replace('\u{1F}', ".")
    };
    Error {
        code: 3034,
        message: format!(
            "Option name '{}' traverses non-message field of type '{}'",
            name, via,
        ),
        span,
    }
}

pub(crate) fn err_option_type_invalid(type_: Type, type_name: &str, span: Span) -> Error {
    let desc = if type_name.is_empty() {
        type_lower(type_)
    } else {
        type_name.replace('\u{1F}', ".")
    };
    Error {
        code: 3035,
        message: format!("Option has invalid type '{}'", desc),
        span,
    }
}

pub(crate) fn err_enum_item_value_invalid(span: Span) -> Error {
    Error {
        code: 3036,
        message: "Enum item value must be an integer, alias, or constant".to_owned(),
        span,
    }
}

pub(crate) fn err_enum_alias_target_not_found(target: &str, span: Span) -> Error {
    Error {
        code: 3037,
        message: format!("Enum alias target '.{}' not found", target),
        span,
    }
}

pub(crate) fn err_struct_field_unsized_array(span: Span) -> Error {
    Error {
        code: 3038,
        message: "Struct fields cannot be unsized arrays".to_owned(),
        span,
    }
}

pub(crate) fn err_array_len_not_u32(span: Span) -> Error {
    Error {
        code: 3039,
        message: format!("Array length must be in range [1, {}]", u32::MAX - 1),
        span,
    }
}

pub(crate) fn err_array_len_zero(span: Span) -> Error {
    Error {
        code: 3040,
        message: "Array length must not be zero".to_owned(),
        span,
    }
}

pub(crate) fn err_array_len_max_u32(span: Span) -> Error {
    Error {
        code: 3041,
        message: format!("Array length must be less than {}", u32::MAX),
        span,
    }
}

pub(crate) fn err_resolved_decl_not_type(name: &str, span: Span) -> Error {
    Error {
        code: 3042,
        message: format!("Declaration '{}' is not a type", name),
        span,
    }
}

pub(crate) fn err_resolved_decl_not_const(name: &str, span: Span) -> Error {
    Error {
        code: 3043,
        message: format!("Declaration '{}' is not a constant", name),
        span,
    }
}

pub(crate) fn err_type_name_not_found(name: &str, span: Span) -> Error {
    Error {
        code: 3044,
        message: format!("Type name '{}' not found", name),
        span,
    }
}

pub(crate) fn err_export_name_not_found(name: &str, span: Span) -> Error {
    Error {
        code: 3045,
        message: format!("Export name '{}' not found", name),
        span,
    }
}

pub(crate) fn err_value_name_not_found(name: &str, span: Span) -> Error {
    Error {
        code: 3046,
        message: format!("Value name '{}' not found", name),
        span,
    }
}

pub(crate) fn err_imported_constant_corrupt(name: &str, span: Span) -> Error {
    Error {
        code: 3047,
        message: format!("Imported constant '{}' has a corrupt value", name),
        span,
    }
}

pub(crate) fn err_enum_ref_not_found(name: &str, span: Span) -> Error {
    Error {
        code: 3048,
        message: format!("Enum has no item named '.{}'", name),
        span,
    }
}

pub(crate) fn err_const_value_not_compiled(name: &str, span: Span) -> Error {
    Error {
        code: 3049,
        message: format!("Constant '{}' referenced before its value is known", name),
        span,
    }
}

pub(crate) fn err_enum_item_const_not_plain(type_name: &str, span: Span) -> Error {
    Error {
        code: 3050,
        message: format!(
            "Enum item value must be a plain integer constant (got type '{}')",
            type_name.replace('\u{1F}', "."),
        ),
        span,
    }
}
