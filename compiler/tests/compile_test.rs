use idol_compiler::compiler::{compile, CompileOptions, CompileResult};
use idol_compiler::schema_idl::{ExportType, Schema, Type};
use idol_compiler::syntax::{self, Span};
use idol_compiler::{merge, textenc, SchemaSet};

fn compile_ok(src: &str, deps: Option<&SchemaSet<'_>>) -> Vec<u8> {
    let parsed = syntax::parse(src.as_bytes()).expect("parse failed");
    let mut opts = CompileOptions::new();
    if let Some(deps) = deps {
        opts = opts.with_dependencies(deps);
    }
    let result = compile(&parsed, opts);
    assert!(
        result.errors.is_empty(),
        "unexpected errors: {:?}",
        result.errors
    );
    result.encoded_schema().expect("no schema emitted")
}

fn compile_errs(src: &str, deps: Option<&SchemaSet<'_>>) -> CompileResult {
    let parsed = syntax::parse(src.as_bytes()).expect("parse failed");
    let mut opts = CompileOptions::new();
    if let Some(deps) = deps {
        opts = opts.with_dependencies(deps);
    }
    compile(&parsed, opts)
}

fn span_text(src: &str, span: Span) -> &str {
    &src[span.start() as usize..span.end() as usize]
}

#[test]
fn minimal_schema() {
    let src = "namespace \"x\"\nmessage M {\n\ta @1 : u32\n}";
    let encoded = compile_ok(src, None);
    assert_eq!(encoded.len() % 8, 0);

    let schema = Schema::decode(&encoded).unwrap();
    assert_eq!(schema.namespace(), "x");
    assert_eq!(schema.messages().len(), 1);
    let message = schema.messages().get(0).unwrap();
    assert_eq!(message.name(), "M");
    assert_eq!(message.fields().len(), 1);
    let field = message.fields().get(0).unwrap();
    assert_eq!(field.name(), "a");
    assert_eq!(field.tag(), 1);
    assert_eq!(field.type_(), Type::U32);
    assert_eq!(field.array_len(), 0);
}

#[test]
fn compile_is_deterministic() {
    let src = "namespace \"x\"\nenum E : u16 {\n\tA = 1\n\tB = 2\n}\nmessage M {\n\ta @1 : E\n}";
    let first = compile_ok(src, None);
    let second = compile_ok(src, None);
    assert_eq!(first, second);
}

#[test]
fn minimal_schema_text_encoding() {
    let src = "namespace \"x\"\nmessage M {\n\ta @1 : u32\n}";
    let encoded = compile_ok(src, None);
    let schema = Schema::decode(&encoded).unwrap();
    assert_eq!(
        textenc::encode(&schema),
        "namespace = \"x\"\n\
         messages {\n\
         \tname = \"M\"\n\
         \tfields {\n\
         \t\tname = \"a\"\n\
         \t\ttag = 1\n\
         \t\ttype = .U32\n\
         \t}\n\
         }\n"
    );
}

#[test]
fn const_u8_overflow() {
    let src = "namespace \"t\"\nconst K : u8 = 257";
    let result = compile_errs(src, None);
    assert_eq!(result.errors.len(), 1);
    let err = &result.errors[0];
    assert_eq!(err.code(), 3016);
    assert_eq!(
        err.message(),
        "Value 257 out of range [0, 255] for type 'u8'"
    );
    assert_eq!(span_text(src, err.span()), "257");
    assert!(result.encoded_schema().is_none());
}

#[test]
fn enum_alias_resolution() {
    let src = "namespace \"t\"\nenum E : u8 {\n\tA = 1\n\tB = .A\n}";
    let encoded = compile_ok(src, None);
    let schema = Schema::decode(&encoded).unwrap();
    let enum_ = schema.enums().get(0).unwrap();
    assert_eq!(enum_.type_(), Type::U8);
    let items: Vec<_> = enum_.items().iter().collect();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].name(), "A");
    assert_eq!(items[0].value(), 1);
    assert!(!items[0].is_alias());
    assert_eq!(items[1].name(), "B");
    assert_eq!(items[1].value(), 1);
    assert!(items[1].is_alias());
}

#[test]
fn enum_alias_forward_reference() {
    let src = "namespace \"t\"\nenum E : u8 {\n\tA = .B\n\tB = 7\n}";
    let encoded = compile_ok(src, None);
    let schema = Schema::decode(&encoded).unwrap();
    let items: Vec<_> = schema.enums().get(0).unwrap().items().iter().collect();
    assert_eq!(items[0].value(), 7);
    assert!(items[0].is_alias());
}

#[test]
fn enum_diagnostics() {
    let src = "namespace \"t\"\nenum E : u8 {\n\tA = 1\n\tA = 2\n\tB = 1\n\tC = .X\n}";
    let result = compile_errs(src, None);
    let codes: Vec<u32> = result.errors.iter().map(|e| e.code()).collect();
    assert_eq!(codes, vec![3022, 3023, 3037]);
}

#[test]
fn enum_const_item_value() {
    let src = "namespace \"t\"\nconst SEVEN : u8 = 7\nenum E : u16 {\n\tA = SEVEN\n}";
    let encoded = compile_ok(src, None);
    let schema = Schema::decode(&encoded).unwrap();
    let items: Vec<_> = schema.enums().get(0).unwrap().items().iter().collect();
    assert_eq!(items[0].value(), 7);
}

#[test]
fn enum_typed_const() {
    let src =
        "namespace \"t\"\nenum E : u8 {\n\tA = 1\n\tB = 2\n}\nconst DEFAULT : E = .B";
    let encoded = compile_ok(src, None);
    let schema = Schema::decode(&encoded).unwrap();
    let const_ = schema.consts().get(0).unwrap();
    assert_eq!(const_.name(), "DEFAULT");
    assert_eq!(const_.type_(), Type::U8);
    assert_eq!(const_.type_name(), "E");
    assert_eq!(const_.value().collect(), vec![2]);
}

#[test]
fn const_value_encodings() {
    let src = "namespace \"t\"\n\
               const A : bool = .true\n\
               const B : i16 = -2\n\
               const C : f32 = 3\n\
               const D : text = \"hi\"\n\
               const E : asciz = \"hi\"";
    let encoded = compile_ok(src, None);
    let schema = Schema::decode(&encoded).unwrap();
    let consts: Vec<_> = schema.consts().iter().collect();
    assert_eq!(consts[0].value().collect(), vec![1]);
    assert_eq!(consts[1].value().collect(), vec![0xFE, 0xFF]);
    assert_eq!(consts[2].value().collect(), 3.0f32.to_bits().to_le_bytes().to_vec());
    assert_eq!(consts[3].value().collect(), b"hi".to_vec());
    assert_eq!(consts[4].value().collect(), b"hi\x00".to_vec());
}

#[test]
fn float_requires_exactly_representable_integer() {
    let src = "namespace \"t\"\nconst K : f32 = 16777217";
    let result = compile_errs(src, None);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].code(), 3016);
}

fn dep_set<'a>(schemas: &'a [Vec<u8>]) -> Vec<Schema<'a>> {
    schemas
        .iter()
        .map(|buf| Schema::decode(buf).unwrap())
        .collect()
}

#[test]
fn import_name_conflict() {
    let dep_bufs = vec![
        compile_ok("namespace \"ns1\"\nmessage N {\n}", None),
        compile_ok("namespace \"ns2\"\nmessage N {\n}", None),
    ];
    let dep_schemas = dep_set(&dep_bufs);
    let deps = merge(&dep_schemas);

    let src = "namespace \"t\"\nimport \"ns1\" { N }\nimport \"ns2\" { N }\nmessage M {\n\ta @1 : N\n}";
    let result = compile_errs(src, Some(&deps));
    assert_eq!(result.errors.len(), 1);
    let err = &result.errors[0];
    assert_eq!(err.code(), 3004);
    assert_eq!(span_text(src, err.span()), "N");
    // The second import's name is the one reported.
    assert_eq!(err.span().start(), src.rfind("{ N }").unwrap() as u32 + 2);
}

#[test]
fn import_namespace_not_found() {
    let src = "namespace \"t\"\nimport \"nowhere\" { N }\nmessage M {\n\ta @1 : N\n}";
    let result = compile_errs(src, None);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].code(), 3001);
}

#[test]
fn imports_are_pruned_and_sorted() {
    let dep_bufs = vec![
        compile_ok(
            "namespace \"zeta\"\nmessage Zed {\n}\nmessage Unused {\n}",
            None,
        ),
        compile_ok("namespace \"alpha\"\nmessage Beta {\n}\nmessage Alpha {\n}", None),
    ];
    let dep_schemas = dep_set(&dep_bufs);
    let deps = merge(&dep_schemas);

    let src = "namespace \"t\"\n\
               import \"zeta\" { Zed Unused }\n\
               import \"alpha\" { Beta Alpha }\n\
               message M {\n\
               \ta @1 : Zed\n\
               \tb @2 : Beta\n\
               \tc @3 : Alpha\n\
               }";
    let result = compile_errs(src, Some(&deps));
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    // 'Unused' was imported but never referenced.
    let warning_codes: Vec<u32> = result.warnings.iter().map(|w| w.code()).collect();
    assert_eq!(warning_codes, vec![4001]);

    let encoded = result.encoded_schema().unwrap();
    let schema = Schema::decode(&encoded).unwrap();
    let imports: Vec<_> = schema.imports().iter().collect();
    assert_eq!(imports.len(), 2);
    assert_eq!(imports[0].namespace(), "alpha");
    assert_eq!(imports[0].names().collect(), vec!["Alpha", "Beta"]);
    assert_eq!(imports[1].namespace(), "zeta");
    assert_eq!(imports[1].names().collect(), vec!["Zed"]);
}

#[test]
fn namespace_purity() {
    let dep_bufs = vec![compile_ok("namespace \"dep\"\nmessage Thing {\n}", None)];
    let dep_schemas = dep_set(&dep_bufs);
    let deps = merge(&dep_schemas);

    let src = "namespace \"t\"\nimport \"dep\" { Thing }\nmessage M {\n\ta @1 : Thing\n\tb @2 : M\n}";
    let encoded = compile_ok(src, Some(&deps));
    let schema = Schema::decode(&encoded).unwrap();

    let imported_namespaces: Vec<&str> =
        schema.imports().iter().map(|i| i.namespace()).collect();
    for message in schema.messages().iter() {
        for field in message.fields().iter() {
            if let Some((ns, _)) = field.type_name().split_once('\u{1F}') {
                assert!(
                    imported_namespaces.contains(&ns),
                    "field references unimported namespace {:?}",
                    ns
                );
            }
        }
    }
}

#[test]
fn export_with_rename_clones_declaration() {
    let dep_bufs = vec![compile_ok(
        "namespace \"ns1\"\nenum Color : u8 {\n\tRED = 1\n\tBLUE = 2\n}",
        None,
    )];
    let dep_schemas = dep_set(&dep_bufs);
    let deps = merge(&dep_schemas);

    let src = "namespace \"t\"\nimport \"ns1\" { Color }\nexport Color as Shade";
    let encoded = compile_ok(src, Some(&deps));
    let schema = Schema::decode(&encoded).unwrap();

    let exports: Vec<_> = schema.exports().iter().collect();
    assert_eq!(exports.len(), 1);
    assert_eq!(exports[0].export_type(), ExportType::Enum);
    assert_eq!(exports[0].type_name(), "ns1\u{1F}Color");
    assert_eq!(exports[0].export_as(), "Shade");

    let enums: Vec<_> = schema.enums().iter().collect();
    assert_eq!(enums.len(), 1);
    assert_eq!(enums[0].name(), "Shade");
    assert_eq!(enums[0].type_(), Type::U8);
    assert_eq!(enums[0].items().len(), 2);
    assert_eq!(enums[0].items().get(0).unwrap().name(), "RED");
}

#[test]
fn export_local_declaration_warns() {
    let src = "namespace \"t\"\nexport { M }\nmessage M {\n}";
    let result = compile_errs(src, None);
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    let warning_codes: Vec<u32> = result.warnings.iter().map(|w| w.code()).collect();
    assert_eq!(warning_codes, vec![4008]);
}

#[test]
fn schema_set_conflict() {
    // Two dependencies declare 'N' in the same namespace with different
    // definitions.
    let dep_bufs = vec![
        compile_ok("namespace \"ns\"\nmessage N {\n\ta @1 : u32\n}", None),
        compile_ok("namespace \"ns\"\nmessage N {\n\ta @1 : u64\n}", None),
    ];
    let dep_schemas = dep_set(&dep_bufs);
    let deps = merge(&dep_schemas);

    let src = "namespace \"t\"\nimport \"ns\" { N }\nmessage M {\n\ta @1 : N\n}";
    let result = compile_errs(src, Some(&deps));
    assert!(result.errors.iter().any(|e| e.code() == 3006), "{:?}", result.errors);
}

#[test]
fn schema_set_unifies_identical_decls() {
    let dep_src = "namespace \"ns\"\nmessage N {\n\ta @1 : u32\n}";
    let dep_bufs = vec![compile_ok(dep_src, None), compile_ok(dep_src, None)];
    let dep_schemas = dep_set(&dep_bufs);
    let deps = merge(&dep_schemas);

    let src = "namespace \"t\"\nimport \"ns\" { N }\nmessage M {\n\ta @1 : N\n}";
    compile_ok(src, Some(&deps));
}

#[test]
fn declaration_conflicts() {
    // Registration order is enums, structs, messages, unions, protocols,
    // constants; the conflict lands on whichever registers second.
    let src = "namespace \"t\"\nmessage M {\n}\nstruct M {\n\tx : u32\n}";
    let result = compile_errs(src, None);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].code(), 3012);
    assert_eq!(
        result.errors[0].message(),
        "Declaration of message 'M' conflicts with earlier declaration of struct 'M'"
    );
}

#[test]
fn builtin_shadow_warns() {
    let src = "namespace \"t\"\nmessage text {\n}";
    let result = compile_errs(src, None);
    assert!(result.errors.is_empty());
    assert_eq!(result.warnings.len(), 1);
    assert_eq!(result.warnings[0].code(), 4009);
}

#[test]
fn struct_rules() {
    let result = compile_errs("namespace \"t\"\nstruct S {\n}", None);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].code(), 3024);

    let result = compile_errs(
        "namespace \"t\"\nstruct S {\n\tx : u32[]\n}",
        None,
    );
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].code(), 3038);

    let result = compile_errs(
        "namespace \"t\"\nstruct S {\n\tx : u32[0]\n}",
        None,
    );
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].code(), 3040);
}

#[test]
fn message_tag_rules() {
    let src = "namespace \"t\"\nmessage M {\n\ta @1 : u32\n\tb @1 : u32\n}";
    let result = compile_errs(src, None);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].code(), 3026);

    let src = "namespace \"t\"\nmessage M {\n\ta @0 : u32\n}";
    let result = compile_errs(src, None);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].code(), 3027);

    let src = "namespace \"t\"\nmessage M {\n\ta @65536 : u32\n}";
    let result = compile_errs(src, None);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].code(), 3027);
}

#[test]
fn unsized_array_in_message() {
    let src = "namespace \"t\"\nmessage M {\n\ta @1 : text[]\n}";
    let encoded = compile_ok(src, None);
    let schema = Schema::decode(&encoded).unwrap();
    let field = schema.messages().get(0).unwrap().fields().get(0).unwrap();
    assert_eq!(field.array_len(), u32::MAX);
}

#[test]
fn protocol_rules() {
    let src = "namespace \"t\"\n\
               message M {\n}\n\
               protocol P {\n\
               \trpc Ping @0 (M) : M\n\
               \trpc Other @0 (M) : M\n\
               \tevent Ping @1 : M\n\
               }";
    let result = compile_errs(src, None);
    let codes: Vec<u32> = result.errors.iter().map(|e| e.code()).collect();
    // Tag 0 is legal for protocol items; the duplicate tag and the
    // rpc/event name collision are not.
    assert_eq!(codes, vec![3029, 3028]);
}

#[test]
fn message_field_optional_option() {
    let src = "namespace \"t\"\nmessage M {\n\t@{optional} a @1 : u32\n}";
    let encoded = compile_ok(src, None);
    let schema = Schema::decode(&encoded).unwrap();
    let field = schema.messages().get(0).unwrap().fields().get(0).unwrap();
    let options = field.options().expect("expected field options");
    assert!(options.optional());
}

#[test]
fn unknown_option_is_uninterpreted() {
    let src = "namespace \"t\"\nmessage M {\n\t@{weight = 42} a @1 : u32\n}";
    let result = compile_errs(src, None);
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    let warning_codes: Vec<u32> = result.warnings.iter().map(|w| w.code()).collect();
    assert_eq!(warning_codes, vec![4011]);

    let encoded = result.encoded_schema().unwrap();
    let schema = Schema::decode(&encoded).unwrap();
    let field = schema.messages().get(0).unwrap().fields().get(0).unwrap();
    let options = field.options().expect("expected field options");
    let buckets: Vec<_> = options.uninterpreted().iter().collect();
    assert_eq!(buckets.len(), 1);
    let opts: Vec<_> = buckets[0].options().iter().collect();
    assert_eq!(opts.len(), 1);
    assert_eq!(opts[0].name(), "weight");
    // Unrecognized options keep their verbatim source bytes.
    assert_eq!(opts[0].value().as_slice(), b"42");
}

#[test]
fn duplicate_option_diagnostics() {
    let src = "namespace \"t\"\nmessage M {\n\t@{weight = 42} @{weight = 42} a @1 : u32\n}";
    let result = compile_errs(src, None);
    assert!(result.errors.is_empty());
    let warning_codes: Vec<u32> = result.warnings.iter().map(|w| w.code()).collect();
    assert_eq!(warning_codes, vec![4011, 4011, 4010]);

    let src = "namespace \"t\"\nmessage M {\n\t@{weight = 42} @{weight = 43} a @1 : u32\n}";
    let result = compile_errs(src, None);
    let codes: Vec<u32> = result.errors.iter().map(|e| e.code()).collect();
    assert_eq!(codes, vec![3010]);
}

#[test]
fn codegen_options_namespace_is_synthesized() {
    let src = "namespace \"t\"\n\
               import \"idol/codegen-options/rust\" as rust\n\
               options : rust.Codegen {\n\
               \tderive = \"Clone\"\n\
               }";
    let result = compile_errs(src, None);
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    assert!(result.warnings.is_empty(), "{:?}", result.warnings);

    let encoded = result.encoded_schema().unwrap();
    let schema = Schema::decode(&encoded).unwrap();

    let options = schema.options().expect("expected schema options");
    let buckets: Vec<_> = options.uninterpreted().iter().collect();
    assert_eq!(buckets.len(), 1);
    assert_eq!(buckets[0].schema_type(), Type::Message);
    assert_eq!(
        buckets[0].schema_type_name(),
        "idol/codegen-options/rust\u{1F}Codegen"
    );
    let opts: Vec<_> = buckets[0].options().iter().collect();
    assert_eq!(opts[0].name(), "derive");
    assert_eq!(opts[0].value().as_slice(), b"\"Clone\"");

    // The synthesized import is recorded like a real one.
    let imports: Vec<_> = schema.imports().iter().collect();
    assert_eq!(imports.len(), 1);
    assert_eq!(imports[0].namespace(), "idol/codegen-options/rust");
    assert_eq!(imports[0].names().collect(), vec!["Codegen"]);
}

#[test]
fn options_schema_must_be_imported_message() {
    let src = "namespace \"t\"\noptions : M {\n\tx = 1\n}\nmessage M {\n}";
    let result = compile_errs(src, None);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].code(), 3032);
}

#[test]
fn invalid_namespace() {
    let result = compile_errs("namespace \"\"", None);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].code(), 3000);
}

#[test]
fn type_resolution_errors() {
    let result = compile_errs(
        "namespace \"t\"\nmessage M {\n\ta @1 : Missing\n}",
        None,
    );
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].code(), 3044);

    let result = compile_errs(
        "namespace \"t\"\nconst K : u8 = 1\nmessage M {\n\ta @1 : K\n}",
        None,
    );
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].code(), 3042);

    let result = compile_errs(
        "namespace \"t\"\nmessage M {\n\ta @1 : nowhere.T\n}",
        None,
    );
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].code(), 3003);
}

#[test]
fn source_path_is_recorded() {
    let parsed = syntax::parse("namespace \"t\"".as_bytes()).unwrap();
    let opts = CompileOptions::new()
        .with_source_path(vec!["schemas".to_owned(), "t.idol".to_owned()]);
    let result = compile(&parsed, opts);
    assert!(result.errors.is_empty());
    let encoded = result.encoded_schema().unwrap();
    let schema = Schema::decode(&encoded).unwrap();
    assert_eq!(schema.source_path().collect(), vec!["schemas", "t.idol"]);
}
