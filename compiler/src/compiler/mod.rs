//! The semantic compiler: turns a parsed schema plus its merged dependencies
//! into a compiled schema builder, collecting every error and warning along
//! the way.
//!
//! Compilation runs in a fixed phase order so forward references resolve
//! consistently: namespace check, import registration, declaration
//! registration, exports, schema options, declarations (plain constants,
//! then enums, then enum-typed constants, then the structural types), and
//! finally import pruning.

pub(crate) mod errors;
pub(crate) mod warnings;

pub use errors::Error;
pub use warnings::Warning;

use errors::*;
use warnings::*;

use crate::deps::{MergedValue, SchemaSet};
use crate::quote;
use crate::schema_idl::{
    ConstBuilder, ConstOptionsBuilder, EnumBuilder, EnumItemBuilder, EnumItemOptionsBuilder,
    EnumOptionsBuilder, ExportBuilder, ExportType, ImportBuilder, MessageBuilder,
    MessageFieldBuilder, MessageFieldOptionsBuilder, MessageOptionsBuilder, ProtocolBuilder,
    ProtocolEventBuilder, ProtocolEventOptionsBuilder, ProtocolOptionsBuilder,
    ProtocolRpcBuilder, ProtocolRpcOptionsBuilder, SchemaBuilder, SchemaOptionsBuilder,
    StructBuilder, StructFieldBuilder, StructFieldOptionsBuilder, StructOptionsBuilder, Type,
    UninterpretedOptionBuilder, UninterpretedOptionsBuilder, UnionBuilder, UnionFieldBuilder,
    UnionFieldOptionsBuilder, UnionOptionsBuilder,
};
use crate::syntax::{self, unparse, Node, Span};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::debug;

const MAX_F32_INT: i64 = 1 << 24;
const MAX_F64_INT: i64 = 1 << 53;

const CODEGEN_OPTIONS_PREFIX: &str = "idol/codegen-options/";

fn is_codegen_options(namespace: &str) -> bool {
    namespace.starts_with(CODEGEN_OPTIONS_PREFIX)
}

fn builtin_type(name: &str) -> Option<Type> {
    match name {
        "bool" => Some(Type::Bool),
        "u8" => Some(Type::U8),
        "i8" => Some(Type::I8),
        "u16" => Some(Type::U16),
        "i16" => Some(Type::I16),
        "u32" => Some(Type::U32),
        "i32" => Some(Type::I32),
        "u64" => Some(Type::U64),
        "i64" => Some(Type::I64),
        "f32" => Some(Type::F32),
        "f64" => Some(Type::F64),
        "text" => Some(Type::Text),
        "asciz" => Some(Type::Asciz),
        "handle" => Some(Type::Handle),
        _ => None,
    }
}

fn scoped_name(namespace: &str, name: &str) -> String {
    format!("{}\u{1F}{}", namespace, name)
}

/// Compilation inputs beyond the parsed source: merged dependencies and the
/// optional source path recorded in the output.
#[derive(Default)]
pub struct CompileOptions<'a> {
    deps: Option<&'a SchemaSet<'a>>,
    source_path: Vec<String>,
}

impl<'a> CompileOptions<'a> {
    pub fn new() -> CompileOptions<'a> {
        CompileOptions::default()
    }

    pub fn with_dependencies(mut self, deps: &'a SchemaSet<'a>) -> CompileOptions<'a> {
        self.deps = Some(deps);
        self
    }

    pub fn with_source_path(mut self, source_path: Vec<String>) -> CompileOptions<'a> {
        self.source_path = source_path;
        self
    }
}

/// The outcome of one compilation: the schema builder (present only when no
/// errors were reported), plus all diagnostics in order.
pub struct CompileResult {
    schema: Option<SchemaBuilder>,
    pub errors: Vec<Error>,
    pub warnings: Vec<Warning>,
}

impl CompileResult {
    pub fn schema_builder(&self) -> Option<&SchemaBuilder> {
        self.schema.as_ref()
    }

    /// The deterministic byte encoding of the compiled schema.
    pub fn encoded_schema(&self) -> Option<Vec<u8>> {
        self.schema.as_ref().map(idol_schema::encode)
    }
}

/// Compiles a parsed schema.
pub fn compile<'a>(parsed: &'a syntax::Schema, opts: CompileOptions<'a>) -> CompileResult {
    let mut nodes = SchemaNodes::default();
    for node in parsed.children() {
        match node {
            Node::Namespace(n) => nodes.namespace = Some(n),
            Node::Import(n) => nodes.imports.push(n),
            Node::Export(n) => nodes.exports.push(n),
            Node::Options(n) => nodes.options.push(n),
            Node::Const(n) => nodes.consts.push(n),
            Node::Enum(n) => nodes.enums.push(n),
            Node::Struct(n) => nodes.structs.push(n),
            Node::Message(n) => nodes.messages.push(n),
            Node::Union(n) => nodes.unions.push(n),
            Node::Protocol(n) => nodes.protocols.push(n),
            _ => {}
        }
    }

    let mut c = Compiler {
        deps: opts.deps,
        nodes,
        schema: SchemaBuilder::default(),
        errors: Vec::new(),
        warnings: Vec::new(),
        imports: Vec::new(),
        imported_names: BTreeMap::new(),
        imports_by_namespace: HashMap::new(),
        imports_by_alias: HashMap::new(),
        decls: Vec::new(),
        decls_by_name: HashMap::new(),
    };
    for component in &opts.source_path {
        c.schema.source_path.add(component);
    }
    c.compile_schema();

    if c.errors.is_empty() {
        CompileResult {
            schema: Some(c.schema),
            errors: c.errors,
            warnings: c.warnings,
        }
    } else {
        CompileResult {
            schema: None,
            errors: c.errors,
            warnings: c.warnings,
        }
    }
}

#[derive(Default)]
struct SchemaNodes<'a> {
    namespace: Option<&'a syntax::Namespace>,
    imports: Vec<&'a syntax::Import>,
    exports: Vec<&'a syntax::Export>,
    options: Vec<&'a syntax::Options>,

    consts: Vec<&'a syntax::Const>,
    enums: Vec<&'a syntax::Enum>,
    structs: Vec<&'a syntax::Struct>,
    messages: Vec<&'a syntax::Message>,
    unions: Vec<&'a syntax::Union>,
    protocols: Vec<&'a syntax::Protocol>,
}

#[derive(Clone, Copy)]
enum DeclNode<'a> {
    Const(&'a syntax::Const),
    Enum(&'a syntax::Enum),
    Struct(&'a syntax::Struct),
    Message(&'a syntax::Message),
    Union(&'a syntax::Union),
    Protocol(&'a syntax::Protocol),
}

impl<'a> DeclNode<'a> {
    fn name(&self) -> &'a str {
        match self {
            DeclNode::Const(n) => n.name().get(),
            DeclNode::Enum(n) => n.name().get(),
            DeclNode::Struct(n) => n.name().get(),
            DeclNode::Message(n) => n.name().get(),
            DeclNode::Union(n) => n.name().get(),
            DeclNode::Protocol(n) => n.name().get(),
        }
    }

    fn name_span(&self) -> Span {
        match self {
            DeclNode::Const(n) => n.name().span(),
            DeclNode::Enum(n) => n.name().span(),
            DeclNode::Struct(n) => n.name().span(),
            DeclNode::Message(n) => n.name().span(),
            DeclNode::Union(n) => n.name().span(),
            DeclNode::Protocol(n) => n.name().span(),
        }
    }

    fn type_str(&self) -> &'static str {
        match self {
            DeclNode::Const(_) => "const",
            DeclNode::Enum(_) => "enum",
            DeclNode::Struct(_) => "struct",
            DeclNode::Message(_) => "message",
            DeclNode::Union(_) => "union",
            DeclNode::Protocol(_) => "protocol",
        }
    }
}

struct DeclInfo<'a> {
    node: DeclNode<'a>,

    // Set when registering enums.
    enum_type: Type,

    // Set when registering constants.
    const_type: Option<TypeInfo<'a>>,

    // Set when the constant's value compiles.
    const_value: Option<Vec<u8>>,

    // Set when the enum's items compile.
    enum_values: HashMap<String, u64>,
}

/// A resolved type reference: the wire type, the (possibly
/// namespace-qualified) type name, and where the definition lives.
#[derive(Clone, Default)]
pub(crate) struct TypeInfo<'a> {
    pub(crate) type_: Type,
    pub(crate) type_name: String,
    pub(crate) imported: Option<MergedValue<'a>>,
    pub(crate) decl: Option<usize>,
}

impl TypeInfo<'_> {
    fn is_imported(&self) -> bool {
        self.type_name.contains('\u{1F}')
    }

    fn is_enum(&self) -> bool {
        if self.type_name.is_empty() {
            return false;
        }
        matches!(
            self.type_,
            Type::U8
                | Type::I8
                | Type::U16
                | Type::I16
                | Type::U32
                | Type::I32
                | Type::U64
                | Type::I64
        )
    }

    fn can_compile_value(&self) -> bool {
        matches!(
            self.type_,
            Type::Bool
                | Type::U8
                | Type::I8
                | Type::U16
                | Type::I16
                | Type::U32
                | Type::I32
                | Type::U64
                | Type::I64
                | Type::F32
                | Type::F64
                | Type::Asciz
                | Type::Text
        )
    }

    /// Human-readable type description for diagnostics.
    fn display(&self) -> String {
        if !self.type_name.is_empty() {
            if let Some((ns, local)) = self.type_name.split_once('\u{1F}') {
                return format!("{}.{}", quote(ns), local);
            }
            return self.type_name.clone();
        }
        self.type_.name().to_lowercase()
    }
}

/// A resolved constant reference.
struct ConstInfo {
    type_: Type,
    type_name: String,
    value: Vec<u8>,
}

/// A resolved export reference.
pub(crate) struct ExportInfo<'a> {
    pub(crate) type_: ExportType,
    pub(crate) type_name: String,
    pub(crate) imported: Option<MergedValue<'a>>,
}

struct ImportCtx {
    namespace: String,
    used_names: BTreeSet<String>,
    unused_aliases: BTreeMap<String, Span>,
    // Names that registration could not resolve (missing namespace or name);
    // later references resolve to an unknown placeholder instead of
    // cascading errors.
    placeholders: HashSet<String>,
}

struct ImportedName {
    ictx: usize,
    span: Span,
    used: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BuiltinOptionsSchema {
    NotBuiltin,
    Schema,
    Const,
    Enum,
    EnumItem,
    Struct,
    StructField,
    Message,
    MessageField,
    Union,
    UnionField,
    Protocol,
    ProtocolRpc,
    ProtocolEvent,
}

struct OptionsSchema<'a> {
    type_name: String,
    imported: Option<crate::schema_idl::Message<'a>>,
    builtin: BuiltinOptionsSchema,
}

impl<'a> OptionsSchema<'a> {
    fn builtin(builtin: BuiltinOptionsSchema) -> OptionsSchema<'a> {
        OptionsSchema {
            type_name: String::new(),
            imported: None,
            builtin,
        }
    }

    fn is_codegen_options(&self) -> bool {
        is_codegen_options(&self.type_name)
    }
}

enum BuiltinUpdate {
    MessageFieldOptional,
}

#[derive(Default)]
struct OptionsCtx {
    uninterpreted: Vec<UninterpretedOptionsBuilder>,
    by_schema: HashMap<String, usize>,
    seen: HashMap<String, HashMap<String, Vec<u8>>>,
}

impl OptionsCtx {
    /// Records `(schema, name) -> value`. Returns `(conflict, newly_set)`.
    fn check_conflict(&mut self, schema: &str, name: &str, value: &[u8]) -> (bool, bool) {
        let opts = self.seen.entry(schema.to_owned()).or_default();
        if let Some(prev) = opts.get(name) {
            if prev.as_slice() == value {
                return (false, false);
            }
            return (true, false);
        }
        opts.insert(name.to_owned(), value.to_vec());
        (false, true)
    }

    fn bucket(&mut self, schema: &str) -> &mut UninterpretedOptionsBuilder {
        if let Some(&idx) = self.by_schema.get(schema) {
            return &mut self.uninterpreted[idx];
        }
        let mut b = UninterpretedOptionsBuilder::default();
        if !schema.is_empty() {
            b.schema_type.set(Type::Message);
            b.schema_type_name.set(schema);
        }
        let idx = self.uninterpreted.len();
        self.by_schema.insert(schema.to_owned(), idx);
        self.uninterpreted.push(b);
        &mut self.uninterpreted[idx]
    }
}

#[derive(Clone, Copy)]
enum ValueDst<'a> {
    Const(&'a syntax::Const),
    Option(&'a syntax::OptionPair),
}

impl ValueDst<'_> {
    fn kind(&self) -> &'static str {
        match self {
            ValueDst::Const(_) => "constant",
            ValueDst::Option(_) => "option",
        }
    }

    fn name(&self) -> String {
        match self {
            ValueDst::Const(node) => node.name().get().to_owned(),
            ValueDst::Option(node) => node.name().text(),
        }
    }

    fn span(&self) -> Span {
        match self {
            ValueDst::Const(node) => node.span(),
            ValueDst::Option(node) => node.span(),
        }
    }
}

fn check_namespace(node: &syntax::TextLit) -> (String, Option<Error>) {
    let namespace = node.get_text().unwrap_or("").to_owned();
    let ok = !namespace.is_empty()
        && namespace
            .chars()
            .all(|c| c == '\t' || ('\u{20}'..='\u{7E}').contains(&c) || c as u32 >= 0x80);
    if ok {
        (namespace, None)
    } else {
        let err = err_invalid_namespace(&namespace, node.span());
        (namespace, Some(err))
    }
}

fn fmt_scoped(scope: Option<&syntax::Ident>, name: &syntax::Ident) -> String {
    match scope {
        Some(scope) => format!("{}.{}", scope.get(), name.get()),
        None => name.get().to_owned(),
    }
}

/// The signed-or-unsigned numeric value of an integer literal, for
/// diagnostics.
fn int_lit_i128(lit: &syntax::IntLit) -> i128 {
    match lit.get_i64() {
        Some(v) => v as i128,
        None => lit.get_u64().unwrap_or(0) as i128,
    }
}

struct Compiler<'a> {
    deps: Option<&'a SchemaSet<'a>>,
    nodes: SchemaNodes<'a>,
    schema: SchemaBuilder,
    errors: Vec<Error>,
    warnings: Vec<Warning>,

    // Set by register_imports().
    imports: Vec<ImportCtx>,
    imported_names: BTreeMap<String, ImportedName>,
    imports_by_namespace: HashMap<String, usize>,
    imports_by_alias: HashMap<String, usize>,

    // Set by register_decls().
    decls: Vec<DeclInfo<'a>>,
    decls_by_name: HashMap<String, usize>,
}

impl<'a> Compiler<'a> {
    fn compile_schema(&mut self) {
        let Some(namespace_node) = self.nodes.namespace else {
            unreachable!()
        };
        let (namespace, err) = check_namespace(namespace_node.namespace());
        if let Some(err) = err {
            self.errors.push(err);
        }
        self.schema.namespace.set(&namespace);

        self.register_imports();
        self.register_decls();
        self.compile_exports();
        if let Some(opts) = self.compile_schema_options() {
            self.schema.options.set(opts);
        }
        self.compile_decls();
        self.compile_imports();
    }

    // Imports {{{

    fn register_imports(&mut self) {
        debug!(imports = self.nodes.imports.len(), "registering imports");
        let imports = self.nodes.imports.clone();
        for node in imports {
            self.register_import(node);
        }
    }

    fn register_import(&mut self, node: &'a syntax::Import) {
        let (namespace, err) = check_namespace(node.namespace());
        if let Some(err) = err {
            self.errors.push(err);
        }

        // How names imported from this namespace can be checked:
        // a codegen-options namespace has no real declarations; a namespace
        // absent from the dependency set was already reported once.
        let codegen = is_codegen_options(&namespace);
        let ns_found = !codegen && self.deps.map_or(false, |deps| deps.has_namespace(&namespace));
        let first_visit = !self.imports_by_namespace.contains_key(&namespace);
        if !codegen && !ns_found && first_visit {
            self.errors.push(err_import_namespace_not_found(
                &namespace,
                node.namespace().span(),
            ));
        }

        let ictx_idx = match self.imports_by_namespace.get(&namespace) {
            Some(&idx) => idx,
            None => {
                let idx = self.imports.len();
                self.imports.push(ImportCtx {
                    namespace: namespace.clone(),
                    used_names: BTreeSet::new(),
                    unused_aliases: BTreeMap::new(),
                    placeholders: HashSet::new(),
                });
                self.imports_by_namespace.insert(namespace.clone(), idx);
                idx
            }
        };

        if let Some(alias_node) = node.import_as() {
            let alias = alias_node.get().to_owned();
            match self.imports_by_alias.get(&alias) {
                Some(&prev_idx) => {
                    if prev_idx == ictx_idx {
                        self.warnings
                            .push(warn_duplicate_import_as(&namespace, &alias, node.span()));
                    } else {
                        let prev_ns = self.imports[prev_idx].namespace.clone();
                        self.errors.push(err_import_as_conflict(
                            &prev_ns,
                            &namespace,
                            &alias,
                            node.span(),
                        ));
                    }
                }
                None => {
                    self.imports_by_alias.insert(alias.clone(), ictx_idx);
                    self.imports[ictx_idx]
                        .unused_aliases
                        .insert(alias, node.span());
                }
            }
            return;
        }

        let mut has_names = false;
        for name_node in node.import_names() {
            has_names = true;
            let name = name_node.get().to_owned();
            if let Some(prev) = self.imported_names.get(&name) {
                if prev.ictx == ictx_idx {
                    self.warnings
                        .push(warn_duplicate_import(&namespace, &name, name_node.span()));
                } else {
                    let prev_ns = self.imports[prev.ictx].namespace.clone();
                    self.errors.push(err_import_name_conflict(
                        &prev_ns,
                        &namespace,
                        &name,
                        name_node.span(),
                    ));
                }
                continue;
            }

            let name_found =
                ns_found && self.deps.map_or(false, |deps| deps.has_name(&namespace, &name));
            if !name_found {
                if ns_found || codegen {
                    self.errors.push(err_import_name_not_found(
                        &namespace,
                        &name,
                        name_node.span(),
                    ));
                }
                self.imports[ictx_idx].placeholders.insert(name.clone());
            }
            self.imported_names.insert(
                name,
                ImportedName {
                    ictx: ictx_idx,
                    span: name_node.span(),
                    used: false,
                },
            );
        }

        if !has_names {
            self.warnings.push(warn_empty_import(&namespace, node.span()));
        }
    }

    fn compile_imports(&mut self) {
        for (name, imported) in &self.imported_names {
            if !imported.used {
                self.warnings.push(warn_unused_import(
                    &self.imports[imported.ictx].namespace,
                    name,
                    imported.span,
                ));
            }
        }

        let mut used: Vec<usize> = Vec::new();
        for (idx, ictx) in self.imports.iter().enumerate() {
            for (alias, &span) in &ictx.unused_aliases {
                self.warnings
                    .push(warn_unused_import_as(&ictx.namespace, alias, span));
            }
            if !ictx.used_names.is_empty() {
                used.push(idx);
            }
        }

        used.sort_by(|&a, &b| self.imports[a].namespace.cmp(&self.imports[b].namespace));
        for idx in used {
            let ictx = &self.imports[idx];
            let mut b = ImportBuilder::default();
            b.namespace.set(&ictx.namespace);
            for name in &ictx.used_names {
                b.names.add(name);
            }
            self.schema.imports.add(b);
        }
    }

    // }}}

    // Declarations registry {{{

    fn register_decls(&mut self) {
        debug!("registering declarations");
        let enums = self.nodes.enums.clone();
        for node in enums {
            let idx = self.register_decl(DeclNode::Enum(node));
            self.register_enum_type(idx, node);
        }
        let structs = self.nodes.structs.clone();
        for node in structs {
            self.register_decl(DeclNode::Struct(node));
        }
        let messages = self.nodes.messages.clone();
        for node in messages {
            self.register_decl(DeclNode::Message(node));
        }
        let unions = self.nodes.unions.clone();
        for node in unions {
            self.register_decl(DeclNode::Union(node));
        }
        let protocols = self.nodes.protocols.clone();
        for node in protocols {
            self.register_decl(DeclNode::Protocol(node));
        }

        let consts = self.nodes.consts.clone();
        for node in consts {
            let idx = self.register_decl(DeclNode::Const(node));
            self.register_const_type(idx, node);
        }
    }

    fn register_decl(&mut self, node: DeclNode<'a>) -> usize {
        let idx = self.decls.len();
        let name = node.name().to_owned();
        if let Some(&prev_idx) = self.decls_by_name.get(&name) {
            let prev = self.decls[prev_idx].node;
            self.errors.push(err_decl_name_conflict(
                node.type_str(),
                &name,
                prev.type_str(),
                prev.name(),
                node.name_span(),
            ));
        } else {
            self.decls_by_name.insert(name.clone(), idx);
        }
        if let Some(imported) = self.imported_names.get(&name) {
            let namespace = self.imports[imported.ictx].namespace.clone();
            self.errors.push(err_decl_name_conflicts_with_import(
                node.type_str(),
                &name,
                &namespace,
                node.name_span(),
            ));
        }
        if let Some(&ictx_idx) = self.imports_by_alias.get(&name) {
            let namespace = self.imports[ictx_idx].namespace.clone();
            self.errors.push(err_decl_name_conflicts_with_import_as(
                node.type_str(),
                &name,
                &namespace,
                node.name_span(),
            ));
        }
        if builtin_type(&name).is_some() {
            self.warnings
                .push(warn_decl_shadows_builtin(&name, node.name_span()));
        }
        self.decls.push(DeclInfo {
            node,
            enum_type: Type::Unknown,
            const_type: None,
            const_value: None,
            enum_values: HashMap::new(),
        });
        idx
    }

    fn register_enum_type(&mut self, idx: usize, node: &'a syntax::Enum) {
        let enum_type = match node.type_().get() {
            "u8" => Type::U8,
            "i8" => Type::I8,
            "u16" => Type::U16,
            "i16" => Type::I16,
            "u32" => Type::U32,
            "i32" => Type::I32,
            "u64" => Type::U64,
            "i64" => Type::I64,
            other => {
                self.errors
                    .push(err_enum_type_invalid(other, node.type_().span()));
                return;
            }
        };
        self.decls[idx].enum_type = enum_type;
    }

    fn register_const_type(&mut self, idx: usize, node: &'a syntax::Const) {
        match self.resolve_type(node.type_name(), false) {
            Ok(type_info) => self.decls[idx].const_type = Some(type_info),
            Err(err) => self.errors.push(err),
        }
    }

    // }}}

    // Exports {{{

    fn compile_exports(&mut self) {
        #[derive(Hash, PartialEq, Eq)]
        struct ExportKey {
            type_: ExportType,
            type_name: String,
            export_as: String,
        }

        let mut export_dupes: HashSet<ExportKey> = HashSet::new();
        let exports = self.nodes.exports.clone();
        for node in exports {
            let mut export_names: Vec<&'a syntax::ExportName> = Vec::new();
            let mut export_as = String::new();
            let mut redundant_export_as = false;
            if let Some((name, alias)) = node.export_as() {
                export_names.push(name);
                export_as = alias.get().to_owned();
                if name.name().get() == export_as {
                    self.warnings.push(warn_export_as_same_name(
                        &fmt_scoped(name.scope(), name.name()),
                        &export_as,
                        node.span(),
                    ));
                    redundant_export_as = true;
                }
            } else {
                export_names.extend(node.export_names());
                if export_names.is_empty() {
                    self.warnings.push(warn_empty_export(node.span()));
                    continue;
                }
            }

            for name in export_names {
                let resolved = match self.resolve_export(name) {
                    Ok(resolved) => resolved,
                    Err(err) => {
                        self.errors.push(err);
                        continue;
                    }
                };
                let Some(resolved) = resolved else { continue };

                let key = ExportKey {
                    type_: resolved.type_,
                    type_name: resolved.type_name.clone(),
                    export_as: if redundant_export_as {
                        String::new()
                    } else {
                        export_as.clone()
                    },
                };
                if !export_dupes.insert(key) {
                    self.warnings.push(warn_duplicate_export(
                        &fmt_scoped(name.scope(), name.name()),
                        name.span(),
                    ));
                    continue;
                }

                let mut b = ExportBuilder::default();
                b.export_type.set(resolved.type_);
                b.type_name.set(&resolved.type_name);
                b.export_as.set(&export_as);
                self.schema.exports.add(b);
                self.register_exported_decl(&resolved, &export_as);
            }
        }
    }

    /// Clones a re-exported dependency declaration into the compiled schema,
    /// applying the rename if one was given.
    fn register_exported_decl(&mut self, resolved: &ExportInfo<'a>, export_as: &str) {
        match resolved.imported {
            Some(MergedValue::Const(decl)) => {
                let mut cloned = decl.to_builder();
                if !export_as.is_empty() {
                    cloned.name.set(export_as);
                }
                self.schema.consts.add(cloned);
            }
            Some(MergedValue::Enum(decl)) => {
                let mut cloned = decl.to_builder();
                if !export_as.is_empty() {
                    cloned.name.set(export_as);
                }
                self.schema.enums.add(cloned);
            }
            Some(MergedValue::Struct(decl)) => {
                let mut cloned = decl.to_builder();
                if !export_as.is_empty() {
                    cloned.name.set(export_as);
                }
                self.schema.structs.add(cloned);
            }
            Some(MergedValue::Message(decl)) => {
                let mut cloned = decl.to_builder();
                if !export_as.is_empty() {
                    cloned.name.set(export_as);
                }
                self.schema.messages.add(cloned);
            }
            Some(MergedValue::Union(decl)) => {
                let mut cloned = decl.to_builder();
                if !export_as.is_empty() {
                    cloned.name.set(export_as);
                }
                self.schema.unions.add(cloned);
            }
            Some(MergedValue::Protocol(decl)) => {
                let mut cloned = decl.to_builder();
                if !export_as.is_empty() {
                    cloned.name.set(export_as);
                }
                self.schema.protocols.add(cloned);
            }
            None => {}
        }
    }

    fn resolve_export(
        &mut self,
        node: &'a syntax::ExportName,
    ) -> Result<Option<ExportInfo<'a>>, Error> {
        let name = node.name().get();

        if let Some(scope_node) = node.scope() {
            let scope = scope_node.get();
            let Some(&ictx_idx) = self.imports_by_alias.get(scope) else {
                return Err(err_import_as_not_found(scope, scope_node.span()));
            };
            self.imports[ictx_idx].unused_aliases.remove(scope);
            let namespace = self.imports[ictx_idx].namespace.clone();
            let mut decl = self.deps_resolve_export(ictx_idx, name, node.span())?;
            self.imports[ictx_idx].used_names.insert(name.to_owned());
            decl.type_name = scoped_name(&namespace, name);
            return Ok(Some(decl));
        }

        if let Some(imported) = self.imported_names.get(name) {
            let ictx_idx = imported.ictx;
            let namespace = self.imports[ictx_idx].namespace.clone();
            let mut decl = self.deps_resolve_export(ictx_idx, name, node.span())?;
            if let Some(imported) = self.imported_names.get_mut(name) {
                imported.used = true;
            }
            self.imports[ictx_idx].used_names.insert(name.to_owned());
            decl.type_name = scoped_name(&namespace, name);
            return Ok(Some(decl));
        }

        if self.decls_by_name.contains_key(name) {
            self.warnings
                .push(warn_export_local_decl(name, node.span()));
            return Ok(None);
        }

        Err(err_export_name_not_found(name, node.span()))
    }

    fn deps_resolve_export(
        &self,
        ictx_idx: usize,
        name: &str,
        span: Span,
    ) -> Result<ExportInfo<'a>, Error> {
        let ictx = &self.imports[ictx_idx];
        if ictx.placeholders.contains(name) {
            return Ok(ExportInfo {
                type_: ExportType::Unknown,
                type_name: String::new(),
                imported: None,
            });
        }
        match self.deps {
            Some(deps) => deps.resolve_export(&ictx.namespace, name, span),
            None => Err(err_import_name_not_found(&ictx.namespace, name, span)),
        }
    }

    // }}}

    // Name resolution {{{

    fn resolve_type(
        &mut self,
        node: &'a syntax::TypeName,
        for_options_schema: bool,
    ) -> Result<TypeInfo<'a>, Error> {
        let name = node.name().get();

        if let Some(scope_node) = node.scope() {
            let scope = scope_node.get();
            let Some(&ictx_idx) = self.imports_by_alias.get(scope) else {
                return Err(err_import_as_not_found(scope, scope_node.span()));
            };
            self.imports[ictx_idx].unused_aliases.remove(scope);
            let namespace = self.imports[ictx_idx].namespace.clone();

            if for_options_schema && is_codegen_options(&namespace) {
                self.imports[ictx_idx].used_names.insert(name.to_owned());
                return Ok(TypeInfo {
                    type_: Type::Message,
                    type_name: scoped_name(&namespace, name),
                    imported: None,
                    decl: None,
                });
            }

            let resolved = self.deps_resolve_type(ictx_idx, name, node.span(), node.span())?;
            self.imports[ictx_idx].used_names.insert(name.to_owned());
            return Ok(TypeInfo {
                type_: resolved.type_,
                type_name: scoped_name(&namespace, name),
                imported: resolved.imported,
                decl: None,
            });
        }

        if let Some(&decl_idx) = self.decls_by_name.get(name) {
            let decl = &self.decls[decl_idx];
            return match decl.node {
                DeclNode::Enum(_) => Ok(TypeInfo {
                    type_: decl.enum_type,
                    type_name: name.to_owned(),
                    imported: None,
                    decl: Some(decl_idx),
                }),
                DeclNode::Struct(_) => Ok(TypeInfo {
                    type_: Type::Struct,
                    type_name: name.to_owned(),
                    imported: None,
                    decl: Some(decl_idx),
                }),
                DeclNode::Message(_) => Ok(TypeInfo {
                    type_: Type::Message,
                    type_name: name.to_owned(),
                    imported: None,
                    decl: Some(decl_idx),
                }),
                DeclNode::Union(_) => Ok(TypeInfo {
                    type_: Type::Union,
                    type_name: name.to_owned(),
                    imported: None,
                    decl: Some(decl_idx),
                }),
                DeclNode::Const(_) | DeclNode::Protocol(_) => {
                    Err(err_resolved_decl_not_type(name, node.span()))
                }
            };
        }

        if let Some(imported) = self.imported_names.get(name) {
            let ictx_idx = imported.ictx;
            let import_span = imported.span;
            let namespace = self.imports[ictx_idx].namespace.clone();

            if for_options_schema && is_codegen_options(&namespace) {
                if let Some(imported) = self.imported_names.get_mut(name) {
                    imported.used = true;
                }
                self.imports[ictx_idx].used_names.insert(name.to_owned());
                return Ok(TypeInfo {
                    type_: Type::Message,
                    type_name: scoped_name(&namespace, name),
                    imported: None,
                    decl: None,
                });
            }

            let resolved = self.deps_resolve_type(ictx_idx, name, import_span, node.span())?;
            if let Some(imported) = self.imported_names.get_mut(name) {
                imported.used = true;
            }
            self.imports[ictx_idx].used_names.insert(name.to_owned());
            return Ok(TypeInfo {
                type_: resolved.type_,
                type_name: scoped_name(&namespace, name),
                imported: resolved.imported,
                decl: None,
            });
        }

        if let Some(type_) = builtin_type(name) {
            return Ok(TypeInfo {
                type_,
                type_name: String::new(),
                imported: None,
                decl: None,
            });
        }

        Err(err_type_name_not_found(name, node.span()))
    }

    fn deps_resolve_type(
        &self,
        ictx_idx: usize,
        name: &str,
        import_span: Span,
        use_span: Span,
    ) -> Result<TypeInfo<'a>, Error> {
        let ictx = &self.imports[ictx_idx];
        if ictx.placeholders.contains(name) {
            return Ok(TypeInfo {
                type_: Type::Unknown,
                type_name: name.to_owned(),
                imported: None,
                decl: None,
            });
        }
        match self.deps {
            Some(deps) => deps.resolve_type(&ictx.namespace, name, import_span, use_span),
            None => Err(err_import_name_not_found(&ictx.namespace, name, import_span)),
        }
    }

    /// Resolves a namespace-qualified name directly against the dependency
    /// set (used when walking an options schema's field tree).
    fn resolve_type2(
        &self,
        namespace: &str,
        name: &str,
        span: Span,
    ) -> Result<TypeInfo<'a>, Error> {
        let Some(deps) = self.deps else {
            return Err(err_import_name_not_found(namespace, name, span));
        };
        let resolved = deps.resolve_type(namespace, name, span, span)?;
        Ok(TypeInfo {
            type_: resolved.type_,
            type_name: scoped_name(namespace, name),
            imported: resolved.imported,
            decl: None,
        })
    }

    fn resolve_const(&mut self, node: &'a syntax::ValueName) -> Result<ConstInfo, Error> {
        let name = node.name().get();

        if let Some(scope_node) = node.scope() {
            let scope = scope_node.get();
            let Some(&ictx_idx) = self.imports_by_alias.get(scope) else {
                return Err(err_import_as_not_found(scope, scope_node.span()));
            };
            self.imports[ictx_idx].unused_aliases.remove(scope);
            let const_ = self.deps_resolve_const(ictx_idx, name, node.span(), node.span())?;
            self.imports[ictx_idx].used_names.insert(name.to_owned());
            return Ok(const_);
        }

        if let Some(imported) = self.imported_names.get(name) {
            let ictx_idx = imported.ictx;
            let import_span = imported.span;
            let const_ = self.deps_resolve_const(ictx_idx, name, import_span, node.span())?;
            if let Some(imported) = self.imported_names.get_mut(name) {
                imported.used = true;
            }
            self.imports[ictx_idx].used_names.insert(name.to_owned());
            return Ok(const_);
        }

        if let Some(&decl_idx) = self.decls_by_name.get(name) {
            let decl = &self.decls[decl_idx];
            return match decl.node {
                DeclNode::Const(_) => match (&decl.const_type, &decl.const_value) {
                    (Some(type_info), Some(value)) => Ok(ConstInfo {
                        type_: type_info.type_,
                        type_name: type_info.type_name.clone(),
                        value: value.clone(),
                    }),
                    _ => Err(err_const_value_not_compiled(name, node.span())),
                },
                _ => Err(err_resolved_decl_not_const(name, node.span())),
            };
        }

        Err(err_value_name_not_found(name, node.span()))
    }

    fn deps_resolve_const(
        &self,
        ictx_idx: usize,
        name: &str,
        import_span: Span,
        use_span: Span,
    ) -> Result<ConstInfo, Error> {
        let ictx = &self.imports[ictx_idx];
        if ictx.placeholders.contains(name) {
            return Err(err_import_name_not_found(&ictx.namespace, name, import_span));
        }
        let Some(deps) = self.deps else {
            return Err(err_import_name_not_found(&ictx.namespace, name, import_span));
        };
        let resolved = deps.resolve_const(&ictx.namespace, name, import_span, use_span)?;
        let mut type_name = resolved.type_name().to_owned();
        if !type_name.is_empty() && !type_name.contains('\u{1F}') {
            type_name = scoped_name(&ictx.namespace, &type_name);
        }
        Ok(ConstInfo {
            type_: resolved.type_(),
            type_name,
            value: resolved.value().as_slice().to_vec(),
        })
    }

    // }}}

    // Options {{{

    fn compile_schema_options(&mut self) -> Option<SchemaOptionsBuilder> {
        let mut ctx = OptionsCtx::default();
        let options_nodes = self.nodes.options.clone();
        for options in options_nodes {
            let schema = match options.schema() {
                Some(schema_node) => match self.resolve_options_schema(schema_node) {
                    Some(schema) => schema,
                    None => continue,
                },
                None => OptionsSchema::builtin(BuiltinOptionsSchema::Schema),
            };
            for option in options.options() {
                self.compile_option(&mut ctx, &schema, option);
            }
        }
        if ctx.uninterpreted.is_empty() {
            return None;
        }
        let mut b = SchemaOptionsBuilder::default();
        for ub in ctx.uninterpreted {
            b.uninterpreted.add(ub);
        }
        Some(b)
    }

    fn resolve_options_schema(
        &mut self,
        name: &'a syntax::TypeName,
    ) -> Option<OptionsSchema<'a>> {
        let resolved = match self.resolve_type(name, true) {
            Ok(resolved) => resolved,
            Err(err) => {
                self.errors.push(err);
                return None;
            }
        };
        if resolved.type_ != Type::Message {
            self.errors
                .push(err_options_schema_must_be_message(resolved.type_, name.span()));
            return None;
        }
        if !resolved.is_imported() {
            self.errors
                .push(err_options_schema_must_be_imported(name.span()));
            return None;
        }
        let imported = match resolved.imported {
            Some(MergedValue::Message(message)) => Some(message),
            _ => None,
        };
        Some(OptionsSchema {
            type_name: resolved.type_name,
            imported,
            builtin: BuiltinOptionsSchema::NotBuiltin,
        })
    }

    fn compile_option(
        &mut self,
        ctx: &mut OptionsCtx,
        schema: &OptionsSchema<'a>,
        option: &'a syntax::OptionPair,
    ) -> Option<BuiltinUpdate> {
        let name = option.name().text();

        let mut opt_type: Option<TypeInfo<'a>> = None;
        if !schema.is_codegen_options() {
            opt_type = self.resolve_option_type(schema, &name, option.name());
        }

        if opt_type.is_some() && schema.builtin != BuiltinOptionsSchema::NotBuiltin {
            return self.compile_builtin_option(schema.builtin, &name, option);
        }

        let mut opt_builder = UninterpretedOptionBuilder::default();
        opt_builder.name.set(&name);

        let value: Vec<u8> = match &opt_type {
            None => match option.value() {
                Some(value_node) => unparse(value_node).into_bytes(),
                None => Vec::new(),
            },
            Some(opt_type) => {
                match self.compile_value(ValueDst::Option(option), opt_type, option.value()) {
                    Ok(value) => {
                        opt_builder.type_.set(opt_type.type_);
                        value
                    }
                    Err(err) => {
                        self.errors.push(err);
                        return None;
                    }
                }
            }
        };

        let (conflict, newly_set) = ctx.check_conflict(&schema.type_name, &name, &value);
        if !newly_set {
            if conflict {
                self.errors.push(err_option_name_conflict(&name, option.span()));
            } else {
                self.warnings
                    .push(warn_duplicate_option(&name, option.span()));
            }
            return None;
        }

        opt_builder.value.set_bytes(&value);
        ctx.bucket(&schema.type_name).options.add(opt_builder);
        None
    }

    /// Resolves a dotted option name against the options schema's field
    /// tree. Intermediate fields must be messages; the leaf must have a
    /// compile-able type.
    fn resolve_option_type(
        &mut self,
        schema: &OptionsSchema<'a>,
        name: &str,
        name_node: &syntax::OptionName,
    ) -> Option<TypeInfo<'a>> {
        match schema.builtin {
            BuiltinOptionsSchema::NotBuiltin => {}
            BuiltinOptionsSchema::MessageField => {
                if name == "optional" {
                    return Some(TypeInfo {
                        type_: Type::Bool,
                        type_name: String::new(),
                        imported: None,
                        decl: None,
                    });
                }
                self.warnings
                    .push(warn_option_name_not_found(name, name_node.span()));
                return None;
            }
            _ => {
                self.warnings
                    .push(warn_option_name_not_found(name, name_node.span()));
                return None;
            }
        }

        let Some(mut schema_msg) = schema.imported else {
            self.warnings
                .push(warn_option_name_not_found(name, name_node.span()));
            return None;
        };
        let mut schema_ns = schema
            .type_name
            .split('\u{1F}')
            .next()
            .unwrap_or("")
            .to_owned();

        let mut name_part = name.to_owned();
        loop {
            let Some(dot) = name_part.find('.') else { break };
            let next_field = name_part[..dot].to_owned();
            let rest = name_part[dot + 1..].to_owned();

            let mut found = false;
            let fields = schema_msg.fields();
            for field in fields.iter() {
                if field.name() != next_field {
                    continue;
                }

                let (field_type_ns, field_type_name) = match field.type_name().split_once('\u{1F}')
                {
                    Some((ns, local)) => (ns.to_owned(), local.to_owned()),
                    None => (schema_ns.clone(), field.type_name().to_owned()),
                };

                let resolved =
                    match self.resolve_type2(&field_type_ns, &field_type_name, name_node.span()) {
                        Ok(resolved) => resolved,
                        Err(err) => {
                            self.errors.push(err);
                            return None;
                        }
                    };
                if resolved.type_ != Type::Message {
                    self.errors.push(err_option_name_through_non_message(
                        name,
                        resolved.type_,
                        &resolved.type_name,
                        name_node.span(),
                    ));
                    return None;
                }
                let Some(MergedValue::Message(field_type)) = resolved.imported else {
                    self.warnings
                        .push(warn_option_name_not_found(name, name_node.span()));
                    return None;
                };
                schema_msg = field_type;
                schema_ns = field_type_ns;
                found = true;
                break;
            }
            if !found {
                self.warnings
                    .push(warn_option_name_not_found(name, name_node.span()));
                return None;
            }
            name_part = rest;
        }

        let fields = schema_msg.fields();
        for field in fields.iter() {
            if field.name() != name_part {
                continue;
            }
            let field_type = TypeInfo {
                type_: field.type_(),
                type_name: field.type_name().to_owned(),
                imported: None,
                decl: None,
            };
            if !field_type.can_compile_value() {
                self.errors.push(err_option_type_invalid(
                    field.type_(),
                    field.type_name(),
                    name_node.span(),
                ));
                break;
            }
            return Some(field_type);
        }

        self.warnings
            .push(warn_option_name_not_found(name, name_node.span()));
        None
    }

    fn compile_builtin_option(
        &mut self,
        schema: BuiltinOptionsSchema,
        name: &str,
        option: &'a syntax::OptionPair,
    ) -> Option<BuiltinUpdate> {
        match schema {
            BuiltinOptionsSchema::MessageField if name == "optional" => {
                let value = match option.value() {
                    None => true,
                    Some(Node::EnumRef(enum_ref)) => match enum_ref.name().get() {
                        "true" => true,
                        "false" => false,
                        _ => {
                            self.errors.push(err_invalid_bool_value(enum_ref.span()));
                            return None;
                        }
                    },
                    Some(value_node) => {
                        let bool_type = TypeInfo {
                            type_: Type::Bool,
                            ..TypeInfo::default()
                        };
                        self.errors.push(self.value_type_mismatch(
                            ValueDst::Option(option),
                            &bool_type,
                            Some(value_node),
                        ));
                        return None;
                    }
                };
                if !value {
                    return None;
                }
                Some(BuiltinUpdate::MessageFieldOptional)
            }
            _ => unreachable!(),
        }
    }

    /// Compiles the decorators attached to a declaration or field, yielding
    /// the uninterpreted option buckets and whether the builtin
    /// `message-field.optional` flag was set.
    fn compile_decorators(
        &mut self,
        builtin: BuiltinOptionsSchema,
        decorators: impl Iterator<Item = &'a syntax::Decorator>,
    ) -> (Vec<UninterpretedOptionsBuilder>, bool) {
        let mut ctx = OptionsCtx::default();
        let mut optional = false;
        for decorator in decorators {
            if let Some(options) = decorator.options() {
                let schema = match options.schema() {
                    Some(schema_node) => match self.resolve_options_schema(schema_node) {
                        Some(schema) => schema,
                        None => continue,
                    },
                    None => OptionsSchema::builtin(builtin),
                };
                for option in options.options() {
                    if let Some(BuiltinUpdate::MessageFieldOptional) =
                        self.compile_option(&mut ctx, &schema, option)
                    {
                        optional = true;
                    }
                }
            }

            if let Some(option) = decorator.option() {
                let schema = OptionsSchema::builtin(builtin);
                if let Some(BuiltinUpdate::MessageFieldOptional) =
                    self.compile_option(&mut ctx, &schema, option)
                {
                    optional = true;
                }
            }
        }
        (ctx.uninterpreted, optional)
    }

    // }}}

    // Declarations {{{

    fn compile_decls(&mut self) {
        debug!(decls = self.decls.len(), "compiling declarations");
        for idx in 0..self.decls.len() {
            if let DeclNode::Const(node) = self.decls[idx].node {
                if let Some(b) = self.compile_const(idx, node, false) {
                    self.schema.consts.add(b);
                }
            }
        }
        for idx in 0..self.decls.len() {
            if let DeclNode::Enum(node) = self.decls[idx].node {
                let b = self.compile_enum(idx, node);
                self.schema.enums.add(b);
            }
        }
        for idx in 0..self.decls.len() {
            if let DeclNode::Const(node) = self.decls[idx].node {
                if let Some(b) = self.compile_const(idx, node, true) {
                    self.schema.consts.add(b);
                }
            }
        }

        for idx in 0..self.decls.len() {
            match self.decls[idx].node {
                DeclNode::Struct(node) => {
                    let b = self.compile_struct(node);
                    self.schema.structs.add(b);
                }
                DeclNode::Message(node) => {
                    let b = self.compile_message(node);
                    self.schema.messages.add(b);
                }
                DeclNode::Union(node) => {
                    let b = self.compile_union(node);
                    self.schema.unions.add(b);
                }
                DeclNode::Protocol(node) => {
                    let b = self.compile_protocol(node);
                    self.schema.protocols.add(b);
                }
                DeclNode::Const(_) | DeclNode::Enum(_) => {}
            }
        }
    }

    // }}}

    // Constants {{{

    /// Constants compile in two passes: plain constants before enums, and
    /// enum-typed constants after, so a constant can reference an enum
    /// declared in the same file.
    fn compile_const(
        &mut self,
        idx: usize,
        node: &'a syntax::Const,
        compiling_enum_consts: bool,
    ) -> Option<ConstBuilder> {
        let type_info = self.decls[idx].const_type.clone();
        match &type_info {
            None => {
                if compiling_enum_consts {
                    return None;
                }
            }
            Some(type_info) => {
                if compiling_enum_consts != type_info.is_enum() {
                    return None;
                }
            }
        }

        let mut b = ConstBuilder::default();
        b.name.set(node.name().get());
        if let Some(opts) = self.compile_const_options(node) {
            b.options.set(opts);
        }

        let Some(type_info) = type_info else {
            return Some(b);
        };
        b.type_.set(type_info.type_);
        b.type_name.set(&type_info.type_name);
        if !type_info.can_compile_value() {
            self.errors.push(err_const_type_invalid(
                &fmt_scoped(node.type_name().scope(), node.type_name().name()),
                node.type_name().span(),
            ));
            return Some(b);
        }
        match self.compile_value(ValueDst::Const(node), &type_info, Some(node.value())) {
            Ok(value) => {
                b.value.set_bytes(&value);
                self.decls[idx].const_value = Some(value);
            }
            Err(err) => self.errors.push(err),
        }
        Some(b)
    }

    fn compile_const_options(&mut self, node: &'a syntax::Const) -> Option<ConstOptionsBuilder> {
        let (uninterpreted, _) =
            self.compile_decorators(BuiltinOptionsSchema::Const, node.decorators());
        if uninterpreted.is_empty() {
            return None;
        }
        let mut b = ConstOptionsBuilder::default();
        for ub in uninterpreted {
            b.uninterpreted.add(ub);
        }
        Some(b)
    }

    // }}}

    // Value compilation {{{

    fn value_type_mismatch(
        &self,
        dst: ValueDst<'a>,
        value_type: &TypeInfo<'a>,
        value_node: Option<&syntax::Node>,
    ) -> Error {
        let (value, span) = match value_node {
            Some(node) => (unparse(node), node.span()),
            None => (String::new(), dst.span()),
        };
        err_value_type_mismatch(
            dst.kind(),
            &dst.name(),
            &value_type.display(),
            &value,
            span,
        )
    }

    /// Compiles a syntactic value into the little-endian byte encoding for
    /// the destination type.
    fn compile_value(
        &mut self,
        dst: ValueDst<'a>,
        value_type: &TypeInfo<'a>,
        value_node: Option<&'a syntax::Node>,
    ) -> Result<Vec<u8>, Error> {
        if let Some(Node::ValueName(value_name)) = value_node {
            return self.compile_named_value(dst, value_type, value_name);
        }

        if value_type.is_enum() {
            let Some(Node::EnumRef(enum_ref)) = value_node else {
                return Err(self.value_type_mismatch(dst, value_type, value_node));
            };
            let name = enum_ref.name().get().to_owned();
            return self.compile_enum_ref_value(value_type, enum_ref.span(), &name);
        }

        macro_rules! int_value {
            ($get:ident, $width:ty) => {{
                let Some(Node::IntLit(int_lit)) = value_node else {
                    return Err(self.value_type_mismatch(dst, value_type, value_node));
                };
                match int_lit.$get() {
                    Some(value) => Ok((value as $width).to_le_bytes().to_vec()),
                    None => Err(err_value_out_of_range(
                        value_type.type_,
                        int_lit_i128(int_lit),
                        int_lit.span(),
                    )),
                }
            }};
        }

        match value_type.type_ {
            Type::Bool => {
                let Some(Node::EnumRef(enum_ref)) = value_node else {
                    return Err(self.value_type_mismatch(dst, value_type, value_node));
                };
                match enum_ref.name().get() {
                    "true" => Ok(vec![1]),
                    "false" => Ok(vec![0]),
                    _ => Err(err_invalid_bool_value(enum_ref.span())),
                }
            }
            Type::U8 => int_value!(get_u8, u8),
            Type::I8 => int_value!(get_i8, u8),
            Type::U16 => int_value!(get_u16, u16),
            Type::I16 => int_value!(get_i16, u16),
            Type::U32 => int_value!(get_u32, u32),
            Type::I32 => int_value!(get_i32, u32),
            Type::U64 => int_value!(get_u64, u64),
            Type::I64 => int_value!(get_i64, u64),
            Type::F32 => {
                let Some(Node::IntLit(int_lit)) = value_node else {
                    return Err(self.value_type_mismatch(dst, value_type, value_node));
                };
                if let Some(value) = int_lit.get_i64() {
                    if !(-MAX_F32_INT..=MAX_F32_INT).contains(&value) {
                        return Err(err_value_out_of_range(
                            Type::F32,
                            value as i128,
                            int_lit.span(),
                        ));
                    }
                    return Ok((value as f32).to_bits().to_le_bytes().to_vec());
                }
                let value = int_lit.get_u64().unwrap_or(0);
                if value > MAX_F32_INT as u64 {
                    return Err(err_value_out_of_range(
                        Type::F32,
                        value as i128,
                        int_lit.span(),
                    ));
                }
                Ok((value as f32).to_bits().to_le_bytes().to_vec())
            }
            Type::F64 => {
                let Some(Node::IntLit(int_lit)) = value_node else {
                    return Err(self.value_type_mismatch(dst, value_type, value_node));
                };
                if let Some(value) = int_lit.get_i64() {
                    if !(-MAX_F64_INT..=MAX_F64_INT).contains(&value) {
                        return Err(err_value_out_of_range(
                            Type::F64,
                            value as i128,
                            int_lit.span(),
                        ));
                    }
                    return Ok((value as f64).to_bits().to_le_bytes().to_vec());
                }
                let value = int_lit.get_u64().unwrap_or(0);
                if value > MAX_F64_INT as u64 {
                    return Err(err_value_out_of_range(
                        Type::F64,
                        value as i128,
                        int_lit.span(),
                    ));
                }
                Ok((value as f64).to_bits().to_le_bytes().to_vec())
            }
            Type::Asciz => {
                let Some(Node::TextLit(text_lit)) = value_node else {
                    return Err(self.value_type_mismatch(dst, value_type, value_node));
                };
                match text_lit.get_asciz() {
                    Some(value) => {
                        let mut bytes = value.to_vec();
                        bytes.push(0x00);
                        Ok(bytes)
                    }
                    None => Err(err_invalid_asciz_value(text_lit.span())),
                }
            }
            Type::Text => {
                let Some(Node::TextLit(text_lit)) = value_node else {
                    return Err(self.value_type_mismatch(dst, value_type, value_node));
                };
                match text_lit.get_text() {
                    Some(value) => Ok(value.as_bytes().to_vec()),
                    None => Err(err_invalid_text_value(text_lit.span())),
                }
            }
            _ => unreachable!(),
        }
    }

    fn compile_named_value(
        &mut self,
        dst: ValueDst<'a>,
        value_type: &TypeInfo<'a>,
        name: &'a syntax::ValueName,
    ) -> Result<Vec<u8>, Error> {
        let const_ = self.resolve_const(name)?;
        let mismatch = || {
            let mut value = String::new();
            name.unparse_to(&mut value);
            err_value_type_mismatch(
                dst.kind(),
                &dst.name(),
                &value_type.display(),
                &value,
                name.span(),
            )
        };

        if value_type.is_enum() {
            let value_type_parts = value_type
                .type_name
                .split_once('\u{1F}')
                .map(|(ns, local)| (ns.to_owned(), local.to_owned()))
                .unwrap_or_else(|| (String::new(), value_type.type_name.clone()));
            let const_type_parts = const_
                .type_name
                .split_once('\u{1F}')
                .map(|(ns, local)| (ns.to_owned(), local.to_owned()))
                .unwrap_or_else(|| (String::new(), const_.type_name.clone()));
            if value_type_parts != const_type_parts {
                return Err(mismatch());
            }
        }

        if const_.type_ != value_type.type_ {
            return Err(mismatch());
        }

        let corrupt = || err_imported_constant_corrupt(name.name().get(), name.span());
        let value = const_.value;
        match const_.type_ {
            Type::Bool => {
                if value.len() != 1 || (value[0] != 0x00 && value[0] != 0x01) {
                    return Err(corrupt());
                }
                Ok(value)
            }
            Type::U8 | Type::I8 => {
                if value.len() != 1 {
                    return Err(corrupt());
                }
                Ok(value)
            }
            Type::U16 | Type::I16 => {
                if value.len() != 2 {
                    return Err(corrupt());
                }
                Ok(value)
            }
            Type::U32 | Type::I32 | Type::F32 => {
                if value.len() != 4 {
                    return Err(corrupt());
                }
                Ok(value)
            }
            Type::U64 | Type::I64 | Type::F64 => {
                if value.len() != 8 {
                    return Err(corrupt());
                }
                Ok(value)
            }
            Type::Asciz | Type::Text => Ok(value),
            _ => Err(corrupt()),
        }
    }

    fn compile_enum_ref_value(
        &mut self,
        value_type: &TypeInfo<'a>,
        span: Span,
        name: &str,
    ) -> Result<Vec<u8>, Error> {
        let value = if let Some(MergedValue::Enum(enum_)) = value_type.imported {
            let items = enum_.items();
            let mut found = None;
            for item in items.iter() {
                if item.name() == name {
                    found = Some(item.value());
                    break;
                }
            }
            match found {
                Some(value) => value,
                None => return Err(err_enum_ref_not_found(name, span)),
            }
        } else if let Some(decl_idx) = value_type.decl {
            match self.decls[decl_idx].enum_values.get(name) {
                Some(&value) => value,
                None => return Err(err_enum_ref_not_found(name, span)),
            }
        } else {
            return Err(err_enum_ref_not_found(name, span));
        };

        match value_type.type_ {
            Type::U8 => {
                if value > u8::MAX as u64 {
                    return Err(err_value_out_of_range(Type::U8, value as i128, span));
                }
                Ok(vec![value as u8])
            }
            Type::I8 => {
                if value > u8::MAX as u64 {
                    return Err(err_value_out_of_range(
                        Type::I8,
                        value as u8 as i8 as i128,
                        span,
                    ));
                }
                Ok(vec![value as u8])
            }
            Type::U16 | Type::I16 => {
                if value > u16::MAX as u64 {
                    return Err(err_value_out_of_range(value_type.type_, value as i128, span));
                }
                Ok((value as u16).to_le_bytes().to_vec())
            }
            Type::U32 | Type::I32 => {
                if value > u32::MAX as u64 {
                    return Err(err_value_out_of_range(value_type.type_, value as i128, span));
                }
                Ok((value as u32).to_le_bytes().to_vec())
            }
            Type::U64 | Type::I64 => Ok(value.to_le_bytes().to_vec()),
            _ => unreachable!(),
        }
    }

    // }}}

    // Enums {{{

    fn compile_enum(&mut self, idx: usize, node: &'a syntax::Enum) -> EnumBuilder {
        struct PendingAlias {
            target: String,
            target_span: Span,
            item_idx: usize,
        }

        let enum_type = self.decls[idx].enum_type;
        let enum_opts = self.compile_enum_options(node);

        let mut values_by_name: HashMap<String, u64> = HashMap::new();
        let mut aliases: HashMap<String, String> = HashMap::new();
        let mut names: HashSet<String> = HashSet::new();
        let mut names_by_value: HashMap<u64, String> = HashMap::new();
        let mut pending_aliases: Vec<PendingAlias> = Vec::new();

        let mut items: Vec<EnumItemBuilder> = Vec::new();
        for item in node.items() {
            let mut item_b = EnumItemBuilder::default();
            let item_name = item.name().get().to_owned();
            item_b.name.set(&item_name);
            if let Some(opts) = self.compile_enum_item_options(item) {
                item_b.options.set(opts);
            }

            if names.contains(&item_name) {
                let prev = if let Some(&prev_value) = values_by_name.get(&item_name) {
                    fmt_enum_value(enum_type, prev_value)
                } else if let Some(prev_alias) = aliases.get(&item_name) {
                    format!(".{}", prev_alias)
                } else {
                    String::new()
                };
                self.errors.push(err_enum_item_name_conflict(
                    &item_name,
                    &prev,
                    item.name().span(),
                ));
            }
            names.insert(item_name.clone());

            let mut value = 0u64;
            let mut is_alias = false;
            match item.value() {
                Node::IntLit(int_lit) => {
                    let parsed: Option<u64> = match enum_type {
                        Type::U8 => int_lit.get_u8().map(u64::from),
                        Type::U16 => int_lit.get_u16().map(u64::from),
                        Type::U32 => int_lit.get_u32().map(u64::from),
                        Type::U64 => int_lit.get_u64(),
                        Type::I8 => int_lit.get_i8().map(|v| v as u8 as u64),
                        Type::I16 => int_lit.get_i16().map(|v| v as u16 as u64),
                        Type::I32 => int_lit.get_i32().map(|v| v as u32 as u64),
                        Type::I64 => int_lit.get_i64().map(|v| v as u64),
                        _ => None,
                    };
                    match parsed {
                        Some(parsed) => {
                            value = parsed;
                            values_by_name.insert(item_name.clone(), value);
                            if let Some(prev_name) = names_by_value.get(&value) {
                                self.errors.push(err_enum_item_value_conflict(
                                    enum_type,
                                    value,
                                    &item_name,
                                    prev_name,
                                    item.value().span(),
                                ));
                            }
                            names_by_value.insert(value, item_name.clone());
                        }
                        None => {
                            if enum_type != Type::Unknown {
                                self.errors.push(err_value_out_of_range(
                                    enum_type,
                                    int_lit_i128(int_lit),
                                    int_lit.span(),
                                ));
                            }
                        }
                    }
                }
                Node::EnumRef(enum_ref) => {
                    is_alias = true;
                    let target = enum_ref.name().get().to_owned();
                    if let Some(&target_value) = values_by_name.get(&target) {
                        value = target_value;
                    } else {
                        pending_aliases.push(PendingAlias {
                            target: target.clone(),
                            target_span: enum_ref.span(),
                            item_idx: items.len(),
                        });
                    }
                    aliases.insert(item_name.clone(), target);
                }
                Node::ValueName(value_name) => {
                    match self.resolve_enum_item_value(value_name, enum_type) {
                        Ok(resolved) => {
                            value = resolved;
                            values_by_name.insert(item_name.clone(), value);
                            if let Some(prev_name) = names_by_value.get(&value) {
                                self.errors.push(err_enum_item_value_conflict(
                                    enum_type,
                                    value,
                                    &item_name,
                                    prev_name,
                                    item.value().span(),
                                ));
                            }
                            names_by_value.insert(value, item_name.clone());
                        }
                        Err(err) => self.errors.push(err),
                    }
                }
                other => {
                    self.errors.push(err_enum_item_value_invalid(other.span()));
                }
            }

            item_b.value.set(value);
            item_b.is_alias.set(is_alias);
            items.push(item_b);
        }

        // Aliases whose target appears later in source resolve now.
        for alias in pending_aliases {
            match values_by_name.get(&alias.target) {
                Some(&target_value) => items[alias.item_idx].value.set(target_value),
                None => self.errors.push(err_enum_alias_target_not_found(
                    &alias.target,
                    alias.target_span,
                )),
            }
        }

        self.decls[idx].enum_values = values_by_name;

        let mut b = EnumBuilder::default();
        b.name.set(node.name().get());
        b.type_.set(enum_type);
        if let Some(opts) = enum_opts {
            b.options.set(opts);
        }
        for item in items {
            b.items.add(item);
        }
        b
    }

    fn compile_enum_options(&mut self, node: &'a syntax::Enum) -> Option<EnumOptionsBuilder> {
        let (uninterpreted, _) =
            self.compile_decorators(BuiltinOptionsSchema::Enum, node.decorators());
        if uninterpreted.is_empty() {
            return None;
        }
        let mut b = EnumOptionsBuilder::default();
        for ub in uninterpreted {
            b.uninterpreted.add(ub);
        }
        Some(b)
    }

    fn compile_enum_item_options(
        &mut self,
        node: &'a syntax::EnumItem,
    ) -> Option<EnumItemOptionsBuilder> {
        let (uninterpreted, _) =
            self.compile_decorators(BuiltinOptionsSchema::EnumItem, node.decorators());
        if uninterpreted.is_empty() {
            return None;
        }
        let mut b = EnumItemOptionsBuilder::default();
        for ub in uninterpreted {
            b.uninterpreted.add(ub);
        }
        Some(b)
    }

    /// Resolves a constant used as an enum item value. The constant must be
    /// a plain builtin integer; the value is range-checked against the
    /// enum's base type and returned as its bit pattern.
    fn resolve_enum_item_value(
        &mut self,
        name: &'a syntax::ValueName,
        enum_type: Type,
    ) -> Result<u64, Error> {
        let span = name.span();
        let const_ = self.resolve_const(name)?;
        if !const_.type_name.is_empty() {
            return Err(err_enum_item_const_not_plain(&const_.type_name, span));
        }

        let corrupt = || err_imported_constant_corrupt(name.name().get(), span);
        let v = &const_.value;
        let (signed, value) = match const_.type_ {
            Type::U8 => {
                if v.len() != 1 {
                    return Err(corrupt());
                }
                (false, v[0] as u64)
            }
            Type::I8 => {
                if v.len() != 1 {
                    return Err(corrupt());
                }
                (true, v[0] as i8 as i64 as u64)
            }
            Type::U16 => {
                if v.len() != 2 {
                    return Err(corrupt());
                }
                (false, u16::from_le_bytes([v[0], v[1]]) as u64)
            }
            Type::I16 => {
                if v.len() != 2 {
                    return Err(corrupt());
                }
                (true, u16::from_le_bytes([v[0], v[1]]) as i16 as i64 as u64)
            }
            Type::U32 => {
                if v.len() != 4 {
                    return Err(corrupt());
                }
                (false, u32::from_le_bytes([v[0], v[1], v[2], v[3]]) as u64)
            }
            Type::I32 => {
                if v.len() != 4 {
                    return Err(corrupt());
                }
                (
                    true,
                    u32::from_le_bytes([v[0], v[1], v[2], v[3]]) as i32 as i64 as u64,
                )
            }
            Type::U64 | Type::I64 => {
                if v.len() != 8 {
                    return Err(corrupt());
                }
                (
                    const_.type_ == Type::I64,
                    u64::from_le_bytes([v[0], v[1], v[2], v[3], v[4], v[5], v[6], v[7]]),
                )
            }
            _ => return Err(err_enum_item_value_invalid(span)),
        };

        let out_of_range = |value: u64| {
            if signed {
                err_value_out_of_range(enum_type, value as i64 as i128, span)
            } else {
                err_value_out_of_range(enum_type, value as i128, span)
            }
        };
        match enum_type {
            Type::U8 => {
                if (signed && (value as i64) < 0) || value > u8::MAX as u64 {
                    return Err(out_of_range(value));
                }
            }
            Type::I8 => {
                let v = value as i64;
                if !(i8::MIN as i64..=i8::MAX as i64).contains(&v) {
                    return Err(out_of_range(value));
                }
            }
            Type::U16 => {
                if (signed && (value as i64) < 0) || value > u16::MAX as u64 {
                    return Err(out_of_range(value));
                }
            }
            Type::I16 => {
                let v = value as i64;
                if !(i16::MIN as i64..=i16::MAX as i64).contains(&v) {
                    return Err(out_of_range(value));
                }
            }
            Type::U32 => {
                if (signed && (value as i64) < 0) || value > u32::MAX as u64 {
                    return Err(out_of_range(value));
                }
            }
            Type::I32 => {
                let v = value as i64;
                if !(i32::MIN as i64..=i32::MAX as i64).contains(&v) {
                    return Err(out_of_range(value));
                }
            }
            Type::U64 => {
                if signed && (value as i64) < 0 {
                    return Err(out_of_range(value));
                }
            }
            Type::I64 => {}
            _ => return Err(err_enum_item_value_invalid(span)),
        }

        let pattern = match enum_type {
            Type::U8 | Type::I8 => value & 0xFF,
            Type::U16 | Type::I16 => value & 0xFFFF,
            Type::U32 | Type::I32 => value & 0xFFFF_FFFF,
            _ => value,
        };
        Ok(pattern)
    }

    // }}}

    // Structs, messages, unions {{{

    fn compile_struct(&mut self, node: &'a syntax::Struct) -> StructBuilder {
        let mut b = StructBuilder::default();
        b.name.set(node.name().get());
        if let Some(opts) = self.compile_struct_options(node) {
            b.options.set(opts);
        }

        let mut fields_by_name: HashSet<String> = HashSet::new();
        for field in node.fields() {
            let fb = self.compile_struct_field(field, &mut fields_by_name);
            b.fields.add(fb);
        }
        if fields_by_name.is_empty() {
            self.errors
                .push(err_struct_empty(node.name().get(), node.span()));
        }
        b
    }

    fn compile_struct_options(&mut self, node: &'a syntax::Struct) -> Option<StructOptionsBuilder> {
        let (uninterpreted, _) =
            self.compile_decorators(BuiltinOptionsSchema::Struct, node.decorators());
        if uninterpreted.is_empty() {
            return None;
        }
        let mut b = StructOptionsBuilder::default();
        for ub in uninterpreted {
            b.uninterpreted.add(ub);
        }
        Some(b)
    }

    fn compile_struct_field(
        &mut self,
        node: &'a syntax::StructField,
        fields_by_name: &mut HashSet<String>,
    ) -> StructFieldBuilder {
        let mut b = StructFieldBuilder::default();
        if let Some(opts) = self.compile_struct_field_options(node) {
            b.options.set(opts);
        }

        let field_name = node.name().get();
        b.name.set(field_name);
        if fields_by_name.contains(field_name) {
            self.errors.push(err_field_name_conflict(
                "Struct",
                field_name,
                None,
                field_name,
                None,
                node.name().span(),
            ));
        } else {
            fields_by_name.insert(field_name.to_owned());
        }

        let field_type = node.field_type();
        let resolved = match self.resolve_type(field_type.type_name(), false) {
            Ok(resolved) => resolved,
            Err(err) => {
                self.errors.push(err);
                TypeInfo::default()
            }
        };
        b.type_.set(resolved.type_);
        b.type_name.set(&resolved.type_name);

        let array_len = self.check_field_array_len(field_type, true);
        b.array_len.set(array_len);

        b
    }

    fn compile_struct_field_options(
        &mut self,
        node: &'a syntax::StructField,
    ) -> Option<StructFieldOptionsBuilder> {
        let (uninterpreted, _) =
            self.compile_decorators(BuiltinOptionsSchema::StructField, node.decorators());
        if uninterpreted.is_empty() {
            return None;
        }
        let mut b = StructFieldOptionsBuilder::default();
        for ub in uninterpreted {
            b.uninterpreted.add(ub);
        }
        Some(b)
    }

    fn compile_message(&mut self, node: &'a syntax::Message) -> MessageBuilder {
        let mut b = MessageBuilder::default();
        b.name.set(node.name().get());
        if let Some(opts) = self.compile_message_options(node) {
            b.options.set(opts);
        }

        let mut fields_by_tag: HashMap<u16, String> = HashMap::new();
        let mut fields_by_name: HashMap<String, Option<u64>> = HashMap::new();
        for field in node.fields() {
            let fb = self.compile_message_field(field, &mut fields_by_tag, &mut fields_by_name);
            b.fields.add(fb);
        }
        b
    }

    fn compile_message_options(
        &mut self,
        node: &'a syntax::Message,
    ) -> Option<MessageOptionsBuilder> {
        let (uninterpreted, _) =
            self.compile_decorators(BuiltinOptionsSchema::Message, node.decorators());
        if uninterpreted.is_empty() {
            return None;
        }
        let mut b = MessageOptionsBuilder::default();
        for ub in uninterpreted {
            b.uninterpreted.add(ub);
        }
        Some(b)
    }

    fn compile_message_field(
        &mut self,
        node: &'a syntax::MessageField,
        fields_by_tag: &mut HashMap<u16, String>,
        fields_by_name: &mut HashMap<String, Option<u64>>,
    ) -> MessageFieldBuilder {
        let mut b = MessageFieldBuilder::default();
        if let Some(opts) = self.compile_message_field_options(node) {
            b.options.set(opts);
        }

        let field_name = node.name().get();
        b.name.set(field_name);
        let field_tag = node.tag().value().get_u64();
        if let Some(&prev_tag) = fields_by_name.get(field_name) {
            self.errors.push(err_field_name_conflict(
                "Message",
                field_name,
                field_tag,
                field_name,
                prev_tag,
                node.name().span(),
            ));
        } else {
            fields_by_name.insert(field_name.to_owned(), field_tag);
        }

        if let Some(tag) = self.check_field_tag(node.tag(), "message") {
            if let Some(prev_name) = fields_by_tag.get(&tag) {
                self.errors.push(err_field_tag_conflict(
                    "Message",
                    field_name,
                    tag,
                    prev_name,
                    node.tag().span(),
                ));
            } else {
                fields_by_tag.insert(tag, field_name.to_owned());
            }
            b.tag.set(tag);
        }

        let field_type = node.field_type();
        let resolved = match self.resolve_type(field_type.type_name(), false) {
            Ok(resolved) => resolved,
            Err(err) => {
                self.errors.push(err);
                TypeInfo::default()
            }
        };
        b.type_.set(resolved.type_);
        b.type_name.set(&resolved.type_name);

        let array_len = self.check_field_array_len(field_type, false);
        b.array_len.set(array_len);

        b
    }

    fn compile_message_field_options(
        &mut self,
        node: &'a syntax::MessageField,
    ) -> Option<MessageFieldOptionsBuilder> {
        let (uninterpreted, optional) =
            self.compile_decorators(BuiltinOptionsSchema::MessageField, node.decorators());
        if uninterpreted.is_empty() && !optional {
            return None;
        }
        let mut b = MessageFieldOptionsBuilder::default();
        if optional {
            b.optional.set(true);
        }
        for ub in uninterpreted {
            b.uninterpreted.add(ub);
        }
        Some(b)
    }

    fn compile_union(&mut self, node: &'a syntax::Union) -> UnionBuilder {
        let mut b = UnionBuilder::default();
        b.name.set(node.name().get());
        if let Some(opts) = self.compile_union_options(node) {
            b.options.set(opts);
        }

        let mut fields_by_tag: HashMap<u16, String> = HashMap::new();
        let mut fields_by_name: HashMap<String, Option<u64>> = HashMap::new();
        for field in node.fields() {
            let fb = self.compile_union_field(field, &mut fields_by_tag, &mut fields_by_name);
            b.fields.add(fb);
        }
        b
    }

    fn compile_union_options(&mut self, node: &'a syntax::Union) -> Option<UnionOptionsBuilder> {
        let (uninterpreted, _) =
            self.compile_decorators(BuiltinOptionsSchema::Union, node.decorators());
        if uninterpreted.is_empty() {
            return None;
        }
        let mut b = UnionOptionsBuilder::default();
        for ub in uninterpreted {
            b.uninterpreted.add(ub);
        }
        Some(b)
    }

    fn compile_union_field(
        &mut self,
        node: &'a syntax::UnionField,
        fields_by_tag: &mut HashMap<u16, String>,
        fields_by_name: &mut HashMap<String, Option<u64>>,
    ) -> UnionFieldBuilder {
        let mut b = UnionFieldBuilder::default();
        if let Some(opts) = self.compile_union_field_options(node) {
            b.options.set(opts);
        }

        let field_name = node.name().get();
        b.name.set(field_name);
        let field_tag = node.tag().value().get_u64();
        if let Some(&prev_tag) = fields_by_name.get(field_name) {
            self.errors.push(err_field_name_conflict(
                "Union",
                field_name,
                field_tag,
                field_name,
                prev_tag,
                node.name().span(),
            ));
        } else {
            fields_by_name.insert(field_name.to_owned(), field_tag);
        }

        if let Some(tag) = self.check_field_tag(node.tag(), "union") {
            if let Some(prev_name) = fields_by_tag.get(&tag) {
                self.errors.push(err_field_tag_conflict(
                    "Union",
                    field_name,
                    tag,
                    prev_name,
                    node.tag().span(),
                ));
            } else {
                fields_by_tag.insert(tag, field_name.to_owned());
            }
            b.tag.set(tag);
        }

        let field_type = node.field_type();
        let resolved = match self.resolve_type(field_type.type_name(), false) {
            Ok(resolved) => resolved,
            Err(err) => {
                self.errors.push(err);
                TypeInfo::default()
            }
        };
        b.type_.set(resolved.type_);
        b.type_name.set(&resolved.type_name);

        let array_len = self.check_field_array_len(field_type, false);
        b.array_len.set(array_len);

        b
    }

    fn compile_union_field_options(
        &mut self,
        node: &'a syntax::UnionField,
    ) -> Option<UnionFieldOptionsBuilder> {
        let (uninterpreted, _) =
            self.compile_decorators(BuiltinOptionsSchema::UnionField, node.decorators());
        if uninterpreted.is_empty() {
            return None;
        }
        let mut b = UnionFieldOptionsBuilder::default();
        for ub in uninterpreted {
            b.uninterpreted.add(ub);
        }
        Some(b)
    }

    /// Message and union field tags must fit `[1, 65535]`.
    fn check_field_tag(&mut self, tag_node: &syntax::Tag, record_type: &str) -> Option<u16> {
        let value = tag_node.value();
        match value.get_u16() {
            Some(tag) if tag != 0 => Some(tag),
            _ => {
                self.errors.push(err_field_tag_out_of_range(
                    record_type,
                    int_lit_i128(value),
                    tag_node.span(),
                ));
                None
            }
        }
    }

    /// Returns the encoded array length for a field: 0 for non-arrays,
    /// `u32::MAX` for unsized arrays (message/union fields only).
    fn check_field_array_len(&mut self, field_type: &syntax::FieldType, is_struct_field: bool) -> u32 {
        if !field_type.is_array() {
            return 0;
        }
        let Some(len_node) = field_type.array_len() else {
            if is_struct_field {
                self.errors
                    .push(err_struct_field_unsized_array(field_type.span()));
                return 0;
            }
            return u32::MAX;
        };

        let Some(array_len) = len_node.get_u32() else {
            self.errors.push(err_array_len_not_u32(len_node.span()));
            return 0;
        };
        if array_len == 0 {
            self.errors.push(err_array_len_zero(len_node.span()));
        } else if array_len == u32::MAX {
            self.errors.push(err_array_len_max_u32(len_node.span()));
        }
        array_len
    }

    // }}}

    // Protocols {{{

    fn compile_protocol(&mut self, node: &'a syntax::Protocol) -> ProtocolBuilder {
        let mut b = ProtocolBuilder::default();
        b.name.set(node.name().get());
        if let Some(opts) = self.compile_protocol_options(node) {
            b.options.set(opts);
        }

        let mut items_by_name: HashMap<String, &'static str> = HashMap::new();
        let mut items_by_tag: HashMap<u64, (String, &'static str)> = HashMap::new();
        for rpc in node.rpcs() {
            let rb = self.compile_protocol_rpc(rpc, &mut items_by_name, &mut items_by_tag);
            b.rpcs.add(rb);
        }
        for event in node.events() {
            let eb = self.compile_protocol_event(event, &mut items_by_name, &mut items_by_tag);
            b.events.add(eb);
        }
        b
    }

    fn compile_protocol_options(
        &mut self,
        node: &'a syntax::Protocol,
    ) -> Option<ProtocolOptionsBuilder> {
        let (uninterpreted, _) =
            self.compile_decorators(BuiltinOptionsSchema::Protocol, node.decorators());
        if uninterpreted.is_empty() {
            return None;
        }
        let mut b = ProtocolOptionsBuilder::default();
        for ub in uninterpreted {
            b.uninterpreted.add(ub);
        }
        Some(b)
    }

    fn compile_protocol_rpc(
        &mut self,
        node: &'a syntax::ProtocolRpc,
        items_by_name: &mut HashMap<String, &'static str>,
        items_by_tag: &mut HashMap<u64, (String, &'static str)>,
    ) -> ProtocolRpcBuilder {
        let mut b = ProtocolRpcBuilder::default();
        if let Some(opts) = self.compile_protocol_rpc_options(node) {
            b.options.set(opts);
        }

        let name = node.name().get();
        b.name.set(name);
        if let Some(&prev_type) = items_by_name.get(name) {
            self.errors.push(err_protocol_item_name_conflict(
                "rpc",
                name,
                prev_type,
                node.name().span(),
            ));
        } else {
            items_by_name.insert(name.to_owned(), "rpc");
        }

        if let Some(tag_node) = node.tag() {
            match tag_node.value().get_u64() {
                Some(tag) => {
                    b.tag.set(tag);
                    if let Some((prev_name, prev_type)) = items_by_tag.get(&tag) {
                        self.errors.push(err_protocol_item_tag_conflict(
                            "rpc",
                            name,
                            tag,
                            prev_type,
                            prev_name,
                            tag_node.span(),
                        ));
                    } else {
                        items_by_tag.insert(tag, (name.to_owned(), "rpc"));
                    }
                }
                None => {
                    self.errors.push(err_protocol_tag_out_of_range(
                        int_lit_i128(tag_node.value()),
                        tag_node.value().span(),
                    ));
                }
            }
        }

        let request_type = match self.resolve_type(node.request_type(), false) {
            Ok(resolved) => resolved,
            Err(err) => {
                self.errors.push(err);
                TypeInfo::default()
            }
        };
        b.request_type.set(request_type.type_);
        b.request_type_name.set(&request_type.type_name);
        b.request_is_stream.set(node.request_is_stream());

        let response_type = match node.response_type() {
            Some(type_node) => match self.resolve_type(type_node, false) {
                Ok(resolved) => resolved,
                Err(err) => {
                    self.errors.push(err);
                    TypeInfo::default()
                }
            },
            None => TypeInfo::default(),
        };
        b.response_type.set(response_type.type_);
        b.response_type_name.set(&response_type.type_name);
        b.response_is_stream.set(node.response_is_stream());

        b
    }

    fn compile_protocol_rpc_options(
        &mut self,
        node: &'a syntax::ProtocolRpc,
    ) -> Option<ProtocolRpcOptionsBuilder> {
        let (uninterpreted, _) =
            self.compile_decorators(BuiltinOptionsSchema::ProtocolRpc, node.decorators());
        if uninterpreted.is_empty() {
            return None;
        }
        let mut b = ProtocolRpcOptionsBuilder::default();
        for ub in uninterpreted {
            b.uninterpreted.add(ub);
        }
        Some(b)
    }

    fn compile_protocol_event(
        &mut self,
        node: &'a syntax::ProtocolEvent,
        items_by_name: &mut HashMap<String, &'static str>,
        items_by_tag: &mut HashMap<u64, (String, &'static str)>,
    ) -> ProtocolEventBuilder {
        let mut b = ProtocolEventBuilder::default();
        if let Some(opts) = self.compile_protocol_event_options(node) {
            b.options.set(opts);
        }

        let name = node.name().get();
        b.name.set(name);
        if let Some(&prev_type) = items_by_name.get(name) {
            self.errors.push(err_protocol_item_name_conflict(
                "event",
                name,
                prev_type,
                node.name().span(),
            ));
        } else {
            items_by_name.insert(name.to_owned(), "event");
        }

        if let Some(tag_node) = node.tag() {
            match tag_node.value().get_u64() {
                Some(tag) => {
                    b.tag.set(tag);
                    if let Some((prev_name, prev_type)) = items_by_tag.get(&tag) {
                        self.errors.push(err_protocol_item_tag_conflict(
                            "event",
                            name,
                            tag,
                            prev_type,
                            prev_name,
                            tag_node.span(),
                        ));
                    } else {
                        items_by_tag.insert(tag, (name.to_owned(), "event"));
                    }
                }
                None => {
                    self.errors.push(err_protocol_tag_out_of_range(
                        int_lit_i128(tag_node.value()),
                        tag_node.value().span(),
                    ));
                }
            }
        }

        let payload_type = match self.resolve_type(node.payload_type(), false) {
            Ok(resolved) => resolved,
            Err(err) => {
                self.errors.push(err);
                TypeInfo::default()
            }
        };
        b.payload_type.set(payload_type.type_);
        b.payload_type_name.set(&payload_type.type_name);

        b
    }

    fn compile_protocol_event_options(
        &mut self,
        node: &'a syntax::ProtocolEvent,
    ) -> Option<ProtocolEventOptionsBuilder> {
        let (uninterpreted, _) =
            self.compile_decorators(BuiltinOptionsSchema::ProtocolEvent, node.decorators());
        if uninterpreted.is_empty() {
            return None;
        }
        let mut b = ProtocolEventOptionsBuilder::default();
        for ub in uninterpreted {
            b.uninterpreted.add(ub);
        }
        Some(b)
    }

    // }}}
}

fn fmt_enum_value(enum_type: Type, value: u64) -> String {
    match enum_type {
        Type::I8 => format!("{}", value as u8 as i8),
        Type::I16 => format!("{}", value as u16 as i16),
        Type::I32 => format!("{}", value as u32 as i32),
        Type::I64 => format!("{}", value as i64),
        _ => format!("{}", value),
    }
}
