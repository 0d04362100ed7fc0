use idol_compiler::syntax::{self, parse, unparse, Node, Span};
use lazy_static::lazy_static;
use regex::Regex;

const FULL_SOURCE: &str = "\
# A schema exercising every declaration form.
namespace \"example/app\"

import \"example/dep\" as dep
import \"example/dep2\" {
\tThing
\tOtherThing
}

options {
\tanswer = 42
}

const GREETING : text = \"Hello\"

## Color channels.
enum E : u8 {
\tA = 1
\tB = .A
}

struct Vec4 {
\tx : f32
\ty : f32[3]
}

message M {
\ta @1 : u32
\t@{optional} b @2 : text[]
\tc @3 : dep.Thing
}

union U {
\tleft @1 : M
\tright @2 : Vec4[7]
}

protocol P {
\trpc Ping @1 (M) : M
\trpc Watch @2 (M) : (M stream)
\tevent Pinged @3 : M
}
";

#[test]
fn parse_round_trip() {
    let schema = parse(FULL_SOURCE.as_bytes()).expect("parse failed");
    assert_eq!(unparse(&Node::Schema(schema)), FULL_SOURCE);
}

#[test]
fn parse_round_trip_crlf() {
    let src = "namespace \"x\"\r\nmessage M {\r\n\ta @1 : u32\r\n}\r\n";
    let schema = parse(src.as_bytes()).expect("parse failed");
    assert_eq!(unparse(&Node::Schema(schema)), src);
}

#[test]
fn parsed_structure() {
    let schema = parse(FULL_SOURCE.as_bytes()).expect("parse failed");

    let mut imports = Vec::new();
    let mut messages = Vec::new();
    let mut protocols = Vec::new();
    for child in schema.children() {
        match child {
            Node::Import(import) => imports.push(import),
            Node::Message(message) => messages.push(message),
            Node::Protocol(protocol) => protocols.push(protocol),
            _ => {}
        }
    }

    assert_eq!(imports.len(), 2);
    assert_eq!(imports[0].namespace().get_text(), Some("example/dep"));
    assert_eq!(imports[0].import_as().map(|a| a.get()), Some("dep"));
    let names: Vec<&str> = imports[1].import_names().map(|n| n.get()).collect();
    assert_eq!(names, vec!["Thing", "OtherThing"]);

    assert_eq!(messages.len(), 1);
    let message = messages[0];
    assert_eq!(message.name().get(), "M");
    let fields: Vec<_> = message.fields().collect();
    assert_eq!(fields.len(), 3);
    assert_eq!(fields[0].name().get(), "a");
    assert_eq!(fields[0].tag().value().get_u16(), Some(1));
    assert!(!fields[0].field_type().is_array());
    assert_eq!(fields[1].decorators().count(), 1);
    assert!(fields[1].field_type().is_array());
    assert!(fields[1].field_type().array_len().is_none());
    let c_type = fields[2].field_type().type_name();
    assert_eq!(c_type.scope().map(|s| s.get()), Some("dep"));
    assert_eq!(c_type.name().get(), "Thing");

    assert_eq!(protocols.len(), 1);
    let protocol = protocols[0];
    let rpcs: Vec<_> = protocol.rpcs().collect();
    assert_eq!(rpcs.len(), 2);
    assert!(!rpcs[0].request_is_stream());
    assert!(!rpcs[0].response_is_stream());
    assert!(rpcs[1].response_is_stream());
    assert_eq!(protocol.events().count(), 1);
}

#[test]
fn spans_cover_source() {
    let schema = parse(FULL_SOURCE.as_bytes()).expect("parse failed");
    assert_eq!(schema.span(), Span::new(0, FULL_SOURCE.len() as u32));

    // Every child's unparse must reproduce exactly the bytes it spans.
    for child in schema.children() {
        let span = child.span();
        let expected = &FULL_SOURCE[span.start() as usize..span.end() as usize];
        let mut got = String::new();
        child.unparse_to(&mut got);
        assert_eq!(got, expected);
    }
}

fn parse_err(src: &str) -> syntax::Error {
    parse(src.as_bytes()).expect_err("expected a parse error")
}

#[test]
fn missing_namespace() {
    let err = parse_err("");
    assert_eq!(err.code(), 2014);

    let err = parse_err("message M {\n}");
    assert_eq!(err.code(), 2014);
    assert_eq!(err.message(), "Expected keyword 'namespace', got (IDENT \"message\")");
}

#[test]
fn namespace_requires_text() {
    let err = parse_err("namespace 42");
    assert_eq!(err.code(), 2011);
}

#[test]
fn unknown_declaration() {
    lazy_static! {
        static ref MESSAGE: Regex = Regex::new(r#"^Unknown declaration keyword "\w+"$"#).unwrap();
    }
    let err = parse_err("namespace \"x\"\nwidget W {\n}");
    assert_eq!(err.code(), 2016);
    assert!(MESSAGE.is_match(err.message()), "{}", err.message());
    assert_eq!(err.span(), Span::new(14, 6));
}

#[test]
fn expected_declaration() {
    let err = parse_err("namespace \"x\"\n42");
    assert_eq!(err.code(), 2015);
}

#[test]
fn message_field_requires_tag() {
    let err = parse_err("namespace \"x\"\nmessage M {\n\ta : u32\n}");
    assert_eq!(err.code(), 2000);
    assert!(err.message().starts_with("Expected sigil '@'"));
}

#[test]
fn expected_const_value() {
    let err = parse_err("namespace \"x\"\nconst K : u8 = }");
    assert_eq!(err.code(), 2019);
}

#[test]
fn unknown_decorator() {
    let err = parse_err("namespace \"x\"\n@deprecated\nconst K : u8 = 1");
    assert_eq!(err.code(), 2017);
}

#[test]
fn unterminated_import_block() {
    let err = parse_err("namespace \"x\"\nimport \"dep\" { A ");
    // The open brace loop runs into end of input looking for an identifier
    // or the closing brace.
    assert_eq!(err.code(), 2012);
}

#[test]
fn protocol_item_keyword() {
    let err = parse_err("namespace \"x\"\nprotocol P {\n\tcall X @1 (M) : M\n}");
    assert_eq!(err.code(), 2025);
}

#[test]
fn int_literal_too_positive() {
    let err = parse_err("namespace \"x\"\nconst K : u64 = 18446744073709551616");
    assert_eq!(err.code(), 2022);
}

#[test]
fn trivia_can_be_dropped() {
    let opts = syntax::ParseOptions {
        save_spaces: false,
        save_newlines: false,
        save_comments: false,
    };
    let schema = opts
        .parse_schema("namespace \"x\"\n# note\nmessage M {\n}".as_bytes())
        .expect("parse failed");
    let has_trivia = schema.children().iter().any(|child| {
        matches!(child, Node::Space(_) | Node::Newline(_) | Node::Comment(_))
    });
    assert!(!has_trivia);
}
