//! Line-oriented text rendering of a compiled schema, for diffing and as a
//! test oracle.
//!
//! Each present field prints on its own line in tag order. Nested messages
//! are braced with one level of TAB indentation; repeated messages print as
//! repeated `name { ... }` blocks; byte arrays as hex lists; text arrays as
//! quoted multi-line blocks; enum values with a leading dot.

use crate::schema_idl::{
    Const, Enum, EnumItem, Export, ExportType, Import, Message, MessageField,
    MessageFieldOptions, Protocol, ProtocolEvent, ProtocolRpc, Schema, Struct, StructField, Type,
    UninterpretedOption, UninterpretedOptions, Union, UnionField,
};
use idol_schema::{TextArray, Uint8Array};
use std::fmt::Write as _;

/// Renders a compiled schema to its text encoding.
pub fn encode(schema: &Schema<'_>) -> String {
    let mut e = Encoder {
        out: String::new(),
        indent: 0,
    };
    e.visit_schema(schema);
    e.out
}

struct Encoder {
    out: String,
    indent: usize,
}

impl Encoder {
    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.out.push('\t');
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn scalar(&mut self, name: &str, value: &str) {
        self.line(&format!("{} = {}", name, value));
    }

    fn text(&mut self, name: &str, value: &str) {
        if !value.is_empty() {
            self.scalar(name, &quote(value));
        }
    }

    fn enum_value(&mut self, name: &str, value: &str) {
        self.scalar(name, &format!(".{}", value));
    }

    fn bool_value(&mut self, name: &str, value: bool) {
        if value {
            self.scalar(name, ".true");
        }
    }

    fn bytes(&mut self, name: &str, value: Uint8Array<'_>) {
        if value.is_empty() {
            return;
        }
        let mut buf = String::new();
        for (ii, b) in value.iter().enumerate() {
            if ii != 0 {
                buf.push_str(", ");
            }
            let _ = write!(buf, "0x{:02X}", b);
        }
        self.scalar(name, &format!("[{}]", buf));
    }

    fn text_array(&mut self, name: &str, value: TextArray<'_>) {
        if value.is_empty() {
            return;
        }
        self.line(&format!("{} = [", name));
        self.indent += 1;
        for item in value.iter() {
            let quoted = quote(item);
            self.line(&quoted);
        }
        self.indent -= 1;
        self.line("]");
    }

    fn open(&mut self, header: &str) {
        self.line(header);
        self.indent += 1;
    }

    fn close(&mut self) {
        self.indent -= 1;
        self.line("}");
    }

    fn visit_schema(&mut self, schema: &Schema<'_>) {
        self.text("namespace", schema.namespace());
        self.text_array("sourcePath", schema.source_path());
        for import in schema.imports().iter() {
            self.visit_import(&import);
        }
        for export in schema.exports().iter() {
            self.visit_export(&export);
        }
        if let Some(options) = schema.options() {
            self.open("options = {");
            self.visit_uninterpreted_list(options.uninterpreted().iter());
            self.close();
        }
        for const_ in schema.consts().iter() {
            self.visit_const(&const_);
        }
        for enum_ in schema.enums().iter() {
            self.visit_enum(&enum_);
        }
        for struct_ in schema.structs().iter() {
            self.visit_struct(&struct_);
        }
        for message in schema.messages().iter() {
            self.visit_message(&message);
        }
        for union in schema.unions().iter() {
            self.visit_union(&union);
        }
        for protocol in schema.protocols().iter() {
            self.visit_protocol(&protocol);
        }
    }

    fn visit_import(&mut self, import: &Import<'_>) {
        self.open("imports {");
        self.text("namespace", import.namespace());
        self.text_array("names", import.names());
        self.close();
    }

    fn visit_export(&mut self, export: &Export<'_>) {
        self.open("exports {");
        if export.export_type() != ExportType::Unknown {
            self.enum_value("exportType", export.export_type().name());
        }
        self.text("typeName", &display_type_name(export.type_name()));
        self.text("exportAs", export.export_as());
        self.close();
    }

    fn visit_uninterpreted_list<'a>(
        &mut self,
        options: impl Iterator<Item = UninterpretedOptions<'a>>,
    ) {
        for opts in options {
            self.open("uninterpreted {");
            if opts.schema_type() != Type::Unknown {
                self.enum_value("schemaType", opts.schema_type().name());
            }
            self.text("schemaTypeName", &display_type_name(opts.schema_type_name()));
            for option in opts.options().iter() {
                self.visit_uninterpreted_option(&option);
            }
            self.close();
        }
    }

    fn visit_uninterpreted_option(&mut self, option: &UninterpretedOption<'_>) {
        self.open("options {");
        self.text("name", option.name());
        if option.type_() != Type::Unknown {
            self.enum_value("type", option.type_().name());
        }
        self.bytes("value", option.value());
        self.close();
    }

    fn visit_const(&mut self, const_: &Const<'_>) {
        self.open("consts {");
        self.text("name", const_.name());
        if const_.type_() != Type::Unknown {
            self.enum_value("type", const_.type_().name());
        }
        self.text("typeName", &display_type_name(const_.type_name()));
        self.bytes("value", const_.value());
        if let Some(options) = const_.options() {
            self.open("options = {");
            self.visit_uninterpreted_list(options.uninterpreted().iter());
            self.close();
        }
        self.close();
    }

    fn visit_enum(&mut self, enum_: &Enum<'_>) {
        self.open("enums {");
        self.text("name", enum_.name());
        if enum_.type_() != Type::Unknown {
            self.enum_value("type", enum_.type_().name());
        }
        for item in enum_.items().iter() {
            self.visit_enum_item(&item);
        }
        if let Some(options) = enum_.options() {
            self.open("options = {");
            self.visit_uninterpreted_list(options.uninterpreted().iter());
            self.close();
        }
        self.close();
    }

    fn visit_enum_item(&mut self, item: &EnumItem<'_>) {
        self.open("items {");
        self.text("name", item.name());
        if item.value() != 0 {
            self.scalar("value", &item.value().to_string());
        }
        self.bool_value("isAlias", item.is_alias());
        if let Some(options) = item.options() {
            self.open("options = {");
            self.visit_uninterpreted_list(options.uninterpreted().iter());
            self.close();
        }
        self.close();
    }

    fn visit_struct(&mut self, struct_: &Struct<'_>) {
        self.open("structs {");
        self.text("name", struct_.name());
        for field in struct_.fields().iter() {
            self.visit_struct_field(&field);
        }
        if let Some(options) = struct_.options() {
            self.open("options = {");
            self.visit_uninterpreted_list(options.uninterpreted().iter());
            self.close();
        }
        self.close();
    }

    fn visit_struct_field(&mut self, field: &StructField<'_>) {
        self.open("fields {");
        self.text("name", field.name());
        if field.type_() != Type::Unknown {
            self.enum_value("type", field.type_().name());
        }
        self.text("typeName", &display_type_name(field.type_name()));
        if field.array_len() != 0 {
            self.scalar("arrayLen", &field.array_len().to_string());
        }
        if let Some(options) = field.options() {
            self.open("options = {");
            self.visit_uninterpreted_list(options.uninterpreted().iter());
            self.close();
        }
        self.close();
    }

    fn visit_message(&mut self, message: &Message<'_>) {
        self.open("messages {");
        self.text("name", message.name());
        for field in message.fields().iter() {
            self.visit_message_field(&field);
        }
        if let Some(options) = message.options() {
            self.open("options = {");
            self.visit_uninterpreted_list(options.uninterpreted().iter());
            self.close();
        }
        self.close();
    }

    fn visit_message_field(&mut self, field: &MessageField<'_>) {
        self.open("fields {");
        self.text("name", field.name());
        if field.tag() != 0 {
            self.scalar("tag", &field.tag().to_string());
        }
        if field.type_() != Type::Unknown {
            self.enum_value("type", field.type_().name());
        }
        self.text("typeName", &display_type_name(field.type_name()));
        if field.array_len() != 0 {
            self.scalar("arrayLen", &field.array_len().to_string());
        }
        if let Some(options) = field.options() {
            self.visit_message_field_options(&options);
        }
        self.close();
    }

    fn visit_message_field_options(&mut self, options: &MessageFieldOptions<'_>) {
        self.open("options = {");
        self.bool_value("optional", options.optional());
        self.visit_uninterpreted_list(options.uninterpreted().iter());
        self.close();
    }

    fn visit_union(&mut self, union: &Union<'_>) {
        self.open("unions {");
        self.text("name", union.name());
        for field in union.fields().iter() {
            self.visit_union_field(&field);
        }
        if let Some(options) = union.options() {
            self.open("options = {");
            self.visit_uninterpreted_list(options.uninterpreted().iter());
            self.close();
        }
        self.close();
    }

    fn visit_union_field(&mut self, field: &UnionField<'_>) {
        self.open("fields {");
        self.text("name", field.name());
        if field.tag() != 0 {
            self.scalar("tag", &field.tag().to_string());
        }
        if field.type_() != Type::Unknown {
            self.enum_value("type", field.type_().name());
        }
        self.text("typeName", &display_type_name(field.type_name()));
        if field.array_len() != 0 {
            self.scalar("arrayLen", &field.array_len().to_string());
        }
        if let Some(options) = field.options() {
            self.open("options = {");
            self.visit_uninterpreted_list(options.uninterpreted().iter());
            self.close();
        }
        self.close();
    }

    fn visit_protocol(&mut self, protocol: &Protocol<'_>) {
        self.open("protocols {");
        self.text("name", protocol.name());
        for rpc in protocol.rpcs().iter() {
            self.visit_protocol_rpc(&rpc);
        }
        for event in protocol.events().iter() {
            self.visit_protocol_event(&event);
        }
        if let Some(options) = protocol.options() {
            self.open("options = {");
            self.visit_uninterpreted_list(options.uninterpreted().iter());
            self.close();
        }
        self.close();
    }

    fn visit_protocol_rpc(&mut self, rpc: &ProtocolRpc<'_>) {
        self.open("rpcs {");
        self.text("name", rpc.name());
        if rpc.tag() != 0 {
            self.scalar("tag", &rpc.tag().to_string());
        }
        if rpc.request_type() != Type::Unknown {
            self.enum_value("requestType", rpc.request_type().name());
        }
        self.text("requestTypeName", &display_type_name(rpc.request_type_name()));
        self.bool_value("requestIsStream", rpc.request_is_stream());
        if rpc.response_type() != Type::Unknown {
            self.enum_value("responseType", rpc.response_type().name());
        }
        self.text(
            "responseTypeName",
            &display_type_name(rpc.response_type_name()),
        );
        self.bool_value("responseIsStream", rpc.response_is_stream());
        if let Some(options) = rpc.options() {
            self.open("options = {");
            self.visit_uninterpreted_list(options.uninterpreted().iter());
            self.close();
        }
        self.close();
    }

    fn visit_protocol_event(&mut self, event: &ProtocolEvent<'_>) {
        self.open("events {");
        self.text("name", event.name());
        if event.tag() != 0 {
            self.scalar("tag", &event.tag().to_string());
        }
        if event.payload_type() != Type::Unknown {
            self.enum_value("payloadType", event.payload_type().name());
        }
        self.text(
            "payloadTypeName",
            &display_type_name(event.payload_type_name()),
        );
        if let Some(options) = event.options() {
            self.open("options = {");
            self.visit_uninterpreted_list(options.uninterpreted().iter());
            self.close();
        }
        self.close();
    }
}

/// Imported type names are stored as `namespace \x1F name`; render the
/// separator as a dot.
fn display_type_name(type_name: &str) -> String {
    type_name.replace('\u{1F}', ".")
}

fn quote(text: &str) -> String {
    let mut buf = String::with_capacity(text.len() + 2);
    buf.push('"');
    for c in text.chars() {
        match c {
            '"' | '\\' => {
                buf.push('\\');
                buf.push(c);
            }
            '\t' => buf.push_str("\\t"),
            '\n' => buf.push_str("\\n"),
            c if (c as u32) < 0x20 || c as u32 == 0x7F => {
                let _ = write!(buf, "\\x{:02X}", c as u32);
            }
            c => buf.push(c),
        }
    }
    buf.push('"');
    buf
}
