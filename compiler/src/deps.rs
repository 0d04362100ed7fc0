//! Merging of pre-compiled dependency schemas.
//!
//! A [`SchemaSet`] groups the declarations of every dependency schema by
//! namespace and name. Two inputs may contribute the same name only when
//! they agree exactly (same category, same enum base type, bit-identical
//! payload); otherwise the entry is poisoned and every later resolution of
//! it reports a definition conflict.

use crate::compiler::errors::{
    err_import_name_definition_conflict, err_import_name_not_found, err_imported_name_not_const,
    err_imported_name_not_type, Error,
};
use crate::compiler::{ExportInfo, TypeInfo};
use crate::schema_idl::{self, ExportType, Type};
use crate::syntax::Span;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DeclKind {
    Unknown,
    Const,
    Enum,
    Struct,
    Message,
    Union,
    Protocol,
}

/// One dependency declaration, as a typed view over its schema's buffer.
#[derive(Clone, Copy)]
pub(crate) enum MergedValue<'a> {
    Const(schema_idl::Const<'a>),
    Enum(schema_idl::Enum<'a>),
    Struct(schema_idl::Struct<'a>),
    Message(schema_idl::Message<'a>),
    Union(schema_idl::Union<'a>),
    Protocol(schema_idl::Protocol<'a>),
}

impl<'a> MergedValue<'a> {
    fn as_bytes(&self) -> &'a [u8] {
        match self {
            MergedValue::Const(v) => v.as_bytes(),
            MergedValue::Enum(v) => v.as_bytes(),
            MergedValue::Struct(v) => v.as_bytes(),
            MergedValue::Message(v) => v.as_bytes(),
            MergedValue::Union(v) => v.as_bytes(),
            MergedValue::Protocol(v) => v.as_bytes(),
        }
    }
}

pub(crate) struct MergedDecl<'a> {
    kind: DeclKind,
    enum_type: Type,
    value: Option<MergedValue<'a>>,
    conflict: bool,
}

impl<'a> MergedDecl<'a> {
    fn new(kind: DeclKind, value: MergedValue<'a>) -> MergedDecl<'a> {
        MergedDecl {
            kind,
            enum_type: Type::Unknown,
            value: Some(value),
            conflict: false,
        }
    }

    fn conflict() -> MergedDecl<'a> {
        MergedDecl {
            kind: DeclKind::Unknown,
            enum_type: Type::Unknown,
            value: None,
            conflict: true,
        }
    }
}

fn can_unify(a: &MergedDecl<'_>, b: &MergedDecl<'_>) -> bool {
    if a.conflict || b.conflict {
        return false;
    }
    if a.kind != b.kind || a.kind == DeclKind::Unknown {
        return false;
    }
    if a.enum_type != b.enum_type {
        return false;
    }
    match (&a.value, &b.value) {
        (Some(a), Some(b)) => a.as_bytes() == b.as_bytes(),
        _ => false,
    }
}

/// A namespace-keyed, name-keyed table of compiled dependency declarations.
pub struct SchemaSet<'a> {
    decls: HashMap<String, HashMap<String, MergedDecl<'a>>>,
}

/// Merges already-compiled schemas into a [`SchemaSet`].
pub fn merge<'a>(schemas: &[schema_idl::Schema<'a>]) -> SchemaSet<'a> {
    fn set<'a>(decls: &mut HashMap<String, MergedDecl<'a>>, name: &str, value: MergedDecl<'a>) {
        if let Some(prev) = decls.get(name) {
            if !can_unify(&value, prev) {
                decls.insert(name.to_owned(), MergedDecl::conflict());
            }
            return;
        }
        decls.insert(name.to_owned(), value);
    }

    let mut decls_by_ns: HashMap<String, HashMap<String, MergedDecl<'a>>> = HashMap::new();
    for schema in schemas {
        let mut decls: HashMap<String, MergedDecl<'a>> = HashMap::new();
        for const_ in schema.consts().iter() {
            set(
                &mut decls,
                const_.name(),
                MergedDecl::new(DeclKind::Const, MergedValue::Const(const_)),
            );
        }
        for enum_ in schema.enums().iter() {
            let mut decl = MergedDecl::new(DeclKind::Enum, MergedValue::Enum(enum_));
            decl.enum_type = enum_.type_();
            set(&mut decls, enum_.name(), decl);
        }
        for struct_ in schema.structs().iter() {
            set(
                &mut decls,
                struct_.name(),
                MergedDecl::new(DeclKind::Struct, MergedValue::Struct(struct_)),
            );
        }
        for message in schema.messages().iter() {
            set(
                &mut decls,
                message.name(),
                MergedDecl::new(DeclKind::Message, MergedValue::Message(message)),
            );
        }
        for union in schema.unions().iter() {
            set(
                &mut decls,
                union.name(),
                MergedDecl::new(DeclKind::Union, MergedValue::Union(union)),
            );
        }
        for protocol in schema.protocols().iter() {
            set(
                &mut decls,
                protocol.name(),
                MergedDecl::new(DeclKind::Protocol, MergedValue::Protocol(protocol)),
            );
        }

        let ns = schema.namespace();
        match decls_by_ns.get_mut(ns) {
            Some(prev_decls) => {
                let mut merged: Vec<(String, MergedDecl<'a>)> = decls.into_iter().collect();
                merged.sort_by(|(a, _), (b, _)| a.cmp(b));
                for (name, decl) in merged {
                    set(prev_decls, &name, decl);
                }
            }
            None => {
                decls_by_ns.insert(ns.to_owned(), decls);
            }
        }
    }

    SchemaSet { decls: decls_by_ns }
}

impl<'a> SchemaSet<'a> {
    pub(crate) fn has_name(&self, namespace: &str, name: &str) -> bool {
        self.decls
            .get(namespace)
            .map_or(false, |decls| decls.contains_key(name))
    }

    pub(crate) fn has_namespace(&self, namespace: &str) -> bool {
        self.decls.contains_key(namespace)
    }

    fn lookup(
        &self,
        namespace: &str,
        name: &str,
        import_span: Span,
    ) -> Result<&MergedDecl<'a>, Error> {
        let decl = self
            .decls
            .get(namespace)
            .and_then(|decls| decls.get(name))
            .ok_or_else(|| err_import_name_not_found(namespace, name, import_span))?;
        if decl.conflict {
            return Err(err_import_name_definition_conflict(
                namespace,
                name,
                import_span,
            ));
        }
        Ok(decl)
    }

    /// Resolves `name` in a type position. The returned type name is local;
    /// the caller prefixes the namespace.
    pub(crate) fn resolve_type(
        &self,
        namespace: &str,
        name: &str,
        import_span: Span,
        use_span: Span,
    ) -> Result<TypeInfo<'a>, Error> {
        let decl = self.lookup(namespace, name, import_span)?;
        let type_ = match decl.kind {
            DeclKind::Unknown => Type::Unknown,
            DeclKind::Enum => decl.enum_type,
            DeclKind::Struct => Type::Struct,
            DeclKind::Message => Type::Message,
            DeclKind::Union => Type::Union,
            DeclKind::Const => {
                return Err(err_imported_name_not_type("const", namespace, name, use_span))
            }
            DeclKind::Protocol => {
                return Err(err_imported_name_not_type(
                    "protocol", namespace, name, use_span,
                ))
            }
        };
        Ok(TypeInfo {
            type_,
            type_name: name.to_owned(),
            imported: decl.value,
            decl: None,
        })
    }

    /// Resolves `name` in a constant position.
    pub(crate) fn resolve_const(
        &self,
        namespace: &str,
        name: &str,
        import_span: Span,
        use_span: Span,
    ) -> Result<schema_idl::Const<'a>, Error> {
        let decl = self.lookup(namespace, name, import_span)?;
        let got = match decl.kind {
            DeclKind::Const => match decl.value {
                Some(MergedValue::Const(const_)) => return Ok(const_),
                _ => unreachable!(),
            },
            DeclKind::Unknown => {
                return Err(err_import_name_not_found(namespace, name, import_span))
            }
            DeclKind::Enum => "enum",
            DeclKind::Struct => "struct",
            DeclKind::Message => "message",
            DeclKind::Union => "union",
            DeclKind::Protocol => "protocol",
        };
        Err(err_imported_name_not_const(got, namespace, name, use_span))
    }

    /// Resolves `name` in an export position.
    pub(crate) fn resolve_export(
        &self,
        namespace: &str,
        name: &str,
        name_span: Span,
    ) -> Result<ExportInfo<'a>, Error> {
        let decl = self.lookup(namespace, name, name_span)?;
        let type_ = match decl.kind {
            DeclKind::Unknown => ExportType::Unknown,
            DeclKind::Const => ExportType::Const,
            DeclKind::Enum => ExportType::Enum,
            DeclKind::Struct => ExportType::Struct,
            DeclKind::Message => ExportType::Message,
            DeclKind::Union => ExportType::Union,
            DeclKind::Protocol => ExportType::Protocol,
        };
        Ok(ExportInfo {
            type_,
            type_name: String::new(),
            imported: decl.value,
        })
    }
}
