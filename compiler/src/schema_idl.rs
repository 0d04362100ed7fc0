//! The compiled schema's own message types: zero-copy views and builders
//! over the binary message format.
//!
//! The compiled output of [`crate::compiler::compile`] is a single `Schema`
//! message; dependency schemas enter the compiler as these views. Imported
//! type names are stored as `namespace \x1F name` (US separator); local names
//! are bare.

use idol_schema as wire;
use idol_schema::DecodeError;
use std::fmt;

macro_rules! fmt_name {
    () => {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.name())
        }
    };
}

/// The wire type of a field, constant, or option value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Type {
    #[default]
    Unknown = 0,
    Bool = 1,
    U8 = 2,
    I8 = 3,
    U16 = 4,
    I16 = 5,
    U32 = 6,
    I32 = 7,
    U64 = 8,
    I64 = 9,
    F32 = 10,
    F64 = 11,
    Asciz = 12,
    Text = 13,
    Handle = 14,
    Struct = 15,
    Message = 16,
    Union = 17,
}

impl Type {
    pub fn from_u32(value: u32) -> Type {
        match value {
            1 => Type::Bool,
            2 => Type::U8,
            3 => Type::I8,
            4 => Type::U16,
            5 => Type::I16,
            6 => Type::U32,
            7 => Type::I32,
            8 => Type::U64,
            9 => Type::I64,
            10 => Type::F32,
            11 => Type::F64,
            12 => Type::Asciz,
            13 => Type::Text,
            14 => Type::Handle,
            15 => Type::Struct,
            16 => Type::Message,
            17 => Type::Union,
            _ => Type::Unknown,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Type::Unknown => "UNKNOWN",
            Type::Bool => "BOOL",
            Type::U8 => "U8",
            Type::I8 => "I8",
            Type::U16 => "U16",
            Type::I16 => "I16",
            Type::U32 => "U32",
            Type::I32 => "I32",
            Type::U64 => "U64",
            Type::I64 => "I64",
            Type::F32 => "F32",
            Type::F64 => "F64",
            Type::Asciz => "ASCIZ",
            Type::Text => "TEXT",
            Type::Handle => "HANDLE",
            Type::Struct => "STRUCT",
            Type::Message => "MESSAGE",
            Type::Union => "UNION",
        }
    }
}

impl fmt::Display for Type {
    fmt_name!();
}

/// The declaration category of an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExportType {
    #[default]
    Unknown = 0,
    Const = 1,
    Enum = 2,
    Struct = 3,
    Message = 4,
    Union = 5,
    Protocol = 6,
}

impl ExportType {
    pub fn from_u32(value: u32) -> ExportType {
        match value {
            1 => ExportType::Const,
            2 => ExportType::Enum,
            3 => ExportType::Struct,
            4 => ExportType::Message,
            5 => ExportType::Union,
            6 => ExportType::Protocol,
            _ => ExportType::Unknown,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExportType::Unknown => "UNKNOWN",
            ExportType::Const => "CONST",
            ExportType::Enum => "ENUM",
            ExportType::Struct => "STRUCT",
            ExportType::Message => "MESSAGE",
            ExportType::Union => "UNION",
            ExportType::Protocol => "PROTOCOL",
        }
    }
}

impl fmt::Display for ExportType {
    fmt_name!();
}

impl wire::EnumScalar for Type {
    fn to_scalar(self) -> u32 {
        self as u32
    }
}

impl wire::EnumScalar for ExportType {
    fn to_scalar(self) -> u32 {
        self as u32
    }
}

macro_rules! message_view {
    ($name:ident) => {
        #[derive(Clone, Copy)]
        pub struct $name<'a> {
            msg: wire::Message<'a>,
        }

        impl<'a> From<wire::Message<'a>> for $name<'a> {
            fn from(msg: wire::Message<'a>) -> Self {
                Self { msg }
            }
        }

        impl<'a> $name<'a> {
            /// The raw message view backing this value.
            pub fn message(&self) -> wire::Message<'a> {
                self.msg
            }

            /// The encoded bytes backing this value.
            pub fn as_bytes(&self) -> &'a [u8] {
                self.msg.data()
            }
        }
    };
}

macro_rules! message_builder {
    ($name:ident, $($tag:expr => $field:ident),+ $(,)?) => {
        impl $name {
            fn field_builders(&self) -> Vec<(u16, &dyn wire::FieldBuilder)> {
                vec![$(($tag, &self.$field as &dyn wire::FieldBuilder)),+]
            }
        }

        impl wire::MessageBuilder for $name {
            fn size(&self) -> u32 {
                wire::message_size(&self.field_builders()).0
            }

            fn encode_to(&self, out: &mut Vec<u8>) {
                wire::encode_message(&self.field_builders(), out);
            }
        }
    };
}

macro_rules! uninterpreted_options {
    ($view:ident, $builder:ident) => {
        message_view!($view);

        impl<'a> $view<'a> {
            pub fn uninterpreted(&self) -> wire::MessageArray<'a, UninterpretedOptions<'a>> {
                self.msg.get_message_array(1).unwrap_or_default()
            }

            fn validate(&self) -> Result<(), DecodeError> {
                for opts in self.msg.get_message_array::<UninterpretedOptions>(1)?.iter() {
                    opts.validate()?;
                }
                Ok(())
            }

            pub fn to_builder(&self) -> $builder {
                let mut b = $builder::default();
                for opts in self.uninterpreted().iter() {
                    b.uninterpreted.add(opts.to_builder());
                }
                b
            }
        }

        #[derive(Default)]
        pub struct $builder {
            pub uninterpreted: wire::MessageArrayFieldBuilder<UninterpretedOptionsBuilder>,
        }

        message_builder!($builder, 1 => uninterpreted);
    };
}

// UninterpretedOption / UninterpretedOptions {{{

message_view!(UninterpretedOption);

impl<'a> UninterpretedOption<'a> {
    pub fn name(&self) -> &'a str {
        self.msg.get_text(1)
    }

    pub fn type_(&self) -> Type {
        Type::from_u32(self.msg.get_u32(2))
    }

    pub fn value(&self) -> wire::Uint8Array<'a> {
        self.msg.get_u8_array(3)
    }

    pub fn to_builder(&self) -> UninterpretedOptionBuilder {
        let mut b = UninterpretedOptionBuilder::default();
        b.name.set(self.name());
        b.type_.set(self.type_());
        b.value.set_bytes(self.value().as_slice());
        b
    }
}

#[derive(Default)]
pub struct UninterpretedOptionBuilder {
    pub name: wire::TextFieldBuilder,
    pub type_: wire::EnumFieldBuilder<Type>,
    pub value: wire::Uint8ArrayFieldBuilder,
}

message_builder!(UninterpretedOptionBuilder, 1 => name, 2 => type_, 3 => value);

message_view!(UninterpretedOptions);

impl<'a> UninterpretedOptions<'a> {
    pub fn schema_type(&self) -> Type {
        Type::from_u32(self.msg.get_u32(1))
    }

    pub fn schema_type_name(&self) -> &'a str {
        self.msg.get_text(2)
    }

    pub fn options(&self) -> wire::MessageArray<'a, UninterpretedOption<'a>> {
        self.msg.get_message_array(3).unwrap_or_default()
    }

    fn validate(&self) -> Result<(), DecodeError> {
        self.msg.get_message_array::<UninterpretedOption>(3)?;
        Ok(())
    }

    pub fn to_builder(&self) -> UninterpretedOptionsBuilder {
        let mut b = UninterpretedOptionsBuilder::default();
        b.schema_type.set(self.schema_type());
        b.schema_type_name.set(self.schema_type_name());
        for option in self.options().iter() {
            b.options.add(option.to_builder());
        }
        b
    }
}

#[derive(Default)]
pub struct UninterpretedOptionsBuilder {
    pub schema_type: wire::EnumFieldBuilder<Type>,
    pub schema_type_name: wire::TextFieldBuilder,
    pub options: wire::MessageArrayFieldBuilder<UninterpretedOptionBuilder>,
}

message_builder!(UninterpretedOptionsBuilder, 1 => schema_type, 2 => schema_type_name, 3 => options);

// }}}

// Options messages {{{

uninterpreted_options!(SchemaOptions, SchemaOptionsBuilder);
uninterpreted_options!(ConstOptions, ConstOptionsBuilder);
uninterpreted_options!(EnumOptions, EnumOptionsBuilder);
uninterpreted_options!(EnumItemOptions, EnumItemOptionsBuilder);
uninterpreted_options!(StructOptions, StructOptionsBuilder);
uninterpreted_options!(StructFieldOptions, StructFieldOptionsBuilder);
uninterpreted_options!(MessageOptions, MessageOptionsBuilder);
uninterpreted_options!(UnionOptions, UnionOptionsBuilder);
uninterpreted_options!(UnionFieldOptions, UnionFieldOptionsBuilder);
uninterpreted_options!(ProtocolOptions, ProtocolOptionsBuilder);
uninterpreted_options!(ProtocolRpcOptions, ProtocolRpcOptionsBuilder);
uninterpreted_options!(ProtocolEventOptions, ProtocolEventOptionsBuilder);

/// Message-field options carry the one built-in typed option, `optional`.
message_view!(MessageFieldOptions);

impl<'a> MessageFieldOptions<'a> {
    pub fn optional(&self) -> bool {
        self.msg.get_bool(1)
    }

    pub fn uninterpreted(&self) -> wire::MessageArray<'a, UninterpretedOptions<'a>> {
        self.msg.get_message_array(2).unwrap_or_default()
    }

    fn validate(&self) -> Result<(), DecodeError> {
        for opts in self.msg.get_message_array::<UninterpretedOptions>(2)?.iter() {
            opts.validate()?;
        }
        Ok(())
    }

    pub fn to_builder(&self) -> MessageFieldOptionsBuilder {
        let mut b = MessageFieldOptionsBuilder::default();
        b.optional.set(self.optional());
        for opts in self.uninterpreted().iter() {
            b.uninterpreted.add(opts.to_builder());
        }
        b
    }
}

#[derive(Default)]
pub struct MessageFieldOptionsBuilder {
    pub optional: wire::BoolFieldBuilder,
    pub uninterpreted: wire::MessageArrayFieldBuilder<UninterpretedOptionsBuilder>,
}

message_builder!(MessageFieldOptionsBuilder, 1 => optional, 2 => uninterpreted);

// }}}

// Const {{{

message_view!(Const);

impl<'a> Const<'a> {
    pub fn name(&self) -> &'a str {
        self.msg.get_text(1)
    }

    pub fn type_(&self) -> Type {
        Type::from_u32(self.msg.get_u32(2))
    }

    pub fn type_name(&self) -> &'a str {
        self.msg.get_text(3)
    }

    pub fn value(&self) -> wire::Uint8Array<'a> {
        self.msg.get_u8_array(4)
    }

    pub fn options(&self) -> Option<ConstOptions<'a>> {
        self.msg.get_message(5).ok().flatten().map(ConstOptions::from)
    }

    fn validate(&self) -> Result<(), DecodeError> {
        if let Some(options) = self.msg.get_message(5)? {
            ConstOptions::from(options).validate()?;
        }
        Ok(())
    }

    pub fn to_builder(&self) -> ConstBuilder {
        let mut b = ConstBuilder::default();
        b.name.set(self.name());
        b.type_.set(self.type_());
        b.type_name.set(self.type_name());
        b.value.set_bytes(self.value().as_slice());
        if let Some(options) = self.options() {
            b.options.set(options.to_builder());
        }
        b
    }
}

#[derive(Default)]
pub struct ConstBuilder {
    pub name: wire::TextFieldBuilder,
    pub type_: wire::EnumFieldBuilder<Type>,
    pub type_name: wire::TextFieldBuilder,
    pub value: wire::Uint8ArrayFieldBuilder,
    pub options: wire::MessageFieldBuilder<ConstOptionsBuilder>,
}

message_builder!(ConstBuilder, 1 => name, 2 => type_, 3 => type_name, 4 => value, 5 => options);

// }}}

// Enum {{{

message_view!(EnumItem);

impl<'a> EnumItem<'a> {
    pub fn name(&self) -> &'a str {
        self.msg.get_text(1)
    }

    /// The item's value, as a two's-complement bit pattern of the enum's
    /// base type.
    pub fn value(&self) -> u64 {
        self.msg.get_u64(2)
    }

    pub fn is_alias(&self) -> bool {
        self.msg.get_bool(3)
    }

    pub fn options(&self) -> Option<EnumItemOptions<'a>> {
        self.msg
            .get_message(4)
            .ok()
            .flatten()
            .map(EnumItemOptions::from)
    }

    fn validate(&self) -> Result<(), DecodeError> {
        if let Some(options) = self.msg.get_message(4)? {
            EnumItemOptions::from(options).validate()?;
        }
        Ok(())
    }

    pub fn to_builder(&self) -> EnumItemBuilder {
        let mut b = EnumItemBuilder::default();
        b.name.set(self.name());
        b.value.set(self.value());
        b.is_alias.set(self.is_alias());
        if let Some(options) = self.options() {
            b.options.set(options.to_builder());
        }
        b
    }
}

#[derive(Default)]
pub struct EnumItemBuilder {
    pub name: wire::TextFieldBuilder,
    pub value: wire::Uint64FieldBuilder,
    pub is_alias: wire::BoolFieldBuilder,
    pub options: wire::MessageFieldBuilder<EnumItemOptionsBuilder>,
}

message_builder!(EnumItemBuilder, 1 => name, 2 => value, 3 => is_alias, 4 => options);

message_view!(Enum);

impl<'a> Enum<'a> {
    pub fn name(&self) -> &'a str {
        self.msg.get_text(1)
    }

    /// The enum's integer base type.
    pub fn type_(&self) -> Type {
        Type::from_u32(self.msg.get_u32(2))
    }

    pub fn items(&self) -> wire::MessageArray<'a, EnumItem<'a>> {
        self.msg.get_message_array(3).unwrap_or_default()
    }

    pub fn options(&self) -> Option<EnumOptions<'a>> {
        self.msg.get_message(4).ok().flatten().map(EnumOptions::from)
    }

    fn validate(&self) -> Result<(), DecodeError> {
        for item in self.msg.get_message_array::<EnumItem>(3)?.iter() {
            item.validate()?;
        }
        if let Some(options) = self.msg.get_message(4)? {
            EnumOptions::from(options).validate()?;
        }
        Ok(())
    }

    pub fn to_builder(&self) -> EnumBuilder {
        let mut b = EnumBuilder::default();
        b.name.set(self.name());
        b.type_.set(self.type_());
        for item in self.items().iter() {
            b.items.add(item.to_builder());
        }
        if let Some(options) = self.options() {
            b.options.set(options.to_builder());
        }
        b
    }
}

#[derive(Default)]
pub struct EnumBuilder {
    pub name: wire::TextFieldBuilder,
    pub type_: wire::EnumFieldBuilder<Type>,
    pub items: wire::MessageArrayFieldBuilder<EnumItemBuilder>,
    pub options: wire::MessageFieldBuilder<EnumOptionsBuilder>,
}

message_builder!(EnumBuilder, 1 => name, 2 => type_, 3 => items, 4 => options);

// }}}

// Struct {{{

message_view!(StructField);

impl<'a> StructField<'a> {
    pub fn name(&self) -> &'a str {
        self.msg.get_text(1)
    }

    pub fn type_(&self) -> Type {
        Type::from_u32(self.msg.get_u32(2))
    }

    pub fn type_name(&self) -> &'a str {
        self.msg.get_text(3)
    }

    /// 0 when the field is not an array.
    pub fn array_len(&self) -> u32 {
        self.msg.get_u32(4)
    }

    pub fn options(&self) -> Option<StructFieldOptions<'a>> {
        self.msg
            .get_message(5)
            .ok()
            .flatten()
            .map(StructFieldOptions::from)
    }

    fn validate(&self) -> Result<(), DecodeError> {
        if let Some(options) = self.msg.get_message(5)? {
            StructFieldOptions::from(options).validate()?;
        }
        Ok(())
    }

    pub fn to_builder(&self) -> StructFieldBuilder {
        let mut b = StructFieldBuilder::default();
        b.name.set(self.name());
        b.type_.set(self.type_());
        b.type_name.set(self.type_name());
        b.array_len.set(self.array_len());
        if let Some(options) = self.options() {
            b.options.set(options.to_builder());
        }
        b
    }
}

#[derive(Default)]
pub struct StructFieldBuilder {
    pub name: wire::TextFieldBuilder,
    pub type_: wire::EnumFieldBuilder<Type>,
    pub type_name: wire::TextFieldBuilder,
    pub array_len: wire::Uint32FieldBuilder,
    pub options: wire::MessageFieldBuilder<StructFieldOptionsBuilder>,
}

message_builder!(StructFieldBuilder, 1 => name, 2 => type_, 3 => type_name, 4 => array_len, 5 => options);

message_view!(Struct);

impl<'a> Struct<'a> {
    pub fn name(&self) -> &'a str {
        self.msg.get_text(1)
    }

    pub fn fields(&self) -> wire::MessageArray<'a, StructField<'a>> {
        self.msg.get_message_array(2).unwrap_or_default()
    }

    pub fn options(&self) -> Option<StructOptions<'a>> {
        self.msg.get_message(3).ok().flatten().map(StructOptions::from)
    }

    fn validate(&self) -> Result<(), DecodeError> {
        for field in self.msg.get_message_array::<StructField>(2)?.iter() {
            field.validate()?;
        }
        if let Some(options) = self.msg.get_message(3)? {
            StructOptions::from(options).validate()?;
        }
        Ok(())
    }

    pub fn to_builder(&self) -> StructBuilder {
        let mut b = StructBuilder::default();
        b.name.set(self.name());
        for field in self.fields().iter() {
            b.fields.add(field.to_builder());
        }
        if let Some(options) = self.options() {
            b.options.set(options.to_builder());
        }
        b
    }
}

#[derive(Default)]
pub struct StructBuilder {
    pub name: wire::TextFieldBuilder,
    pub fields: wire::MessageArrayFieldBuilder<StructFieldBuilder>,
    pub options: wire::MessageFieldBuilder<StructOptionsBuilder>,
}

message_builder!(StructBuilder, 1 => name, 2 => fields, 3 => options);

// }}}

// Message {{{

message_view!(MessageField);

impl<'a> MessageField<'a> {
    pub fn name(&self) -> &'a str {
        self.msg.get_text(1)
    }

    pub fn tag(&self) -> u16 {
        self.msg.get_u32(2) as u16
    }

    pub fn type_(&self) -> Type {
        Type::from_u32(self.msg.get_u32(3))
    }

    pub fn type_name(&self) -> &'a str {
        self.msg.get_text(4)
    }

    /// 0 when not an array; `u32::MAX` for an unsized array.
    pub fn array_len(&self) -> u32 {
        self.msg.get_u32(5)
    }

    pub fn options(&self) -> Option<MessageFieldOptions<'a>> {
        self.msg
            .get_message(6)
            .ok()
            .flatten()
            .map(MessageFieldOptions::from)
    }

    fn validate(&self) -> Result<(), DecodeError> {
        if let Some(options) = self.msg.get_message(6)? {
            MessageFieldOptions::from(options).validate()?;
        }
        Ok(())
    }

    pub fn to_builder(&self) -> MessageFieldBuilder {
        let mut b = MessageFieldBuilder::default();
        b.name.set(self.name());
        b.tag.set(self.tag());
        b.type_.set(self.type_());
        b.type_name.set(self.type_name());
        b.array_len.set(self.array_len());
        if let Some(options) = self.options() {
            b.options.set(options.to_builder());
        }
        b
    }
}

#[derive(Default)]
pub struct MessageFieldBuilder {
    pub name: wire::TextFieldBuilder,
    pub tag: wire::Uint16FieldBuilder,
    pub type_: wire::EnumFieldBuilder<Type>,
    pub type_name: wire::TextFieldBuilder,
    pub array_len: wire::Uint32FieldBuilder,
    pub options: wire::MessageFieldBuilder<MessageFieldOptionsBuilder>,
}

message_builder!(MessageFieldBuilder, 1 => name, 2 => tag, 3 => type_, 4 => type_name, 5 => array_len, 6 => options);

message_view!(Message);

impl<'a> Message<'a> {
    pub fn name(&self) -> &'a str {
        self.msg.get_text(1)
    }

    pub fn fields(&self) -> wire::MessageArray<'a, MessageField<'a>> {
        self.msg.get_message_array(2).unwrap_or_default()
    }

    pub fn options(&self) -> Option<MessageOptions<'a>> {
        self.msg.get_message(3).ok().flatten().map(MessageOptions::from)
    }

    fn validate(&self) -> Result<(), DecodeError> {
        for field in self.msg.get_message_array::<MessageField>(2)?.iter() {
            field.validate()?;
        }
        if let Some(options) = self.msg.get_message(3)? {
            MessageOptions::from(options).validate()?;
        }
        Ok(())
    }

    pub fn to_builder(&self) -> MessageBuilder {
        let mut b = MessageBuilder::default();
        b.name.set(self.name());
        for field in self.fields().iter() {
            b.fields.add(field.to_builder());
        }
        if let Some(options) = self.options() {
            b.options.set(options.to_builder());
        }
        b
    }
}

#[derive(Default)]
pub struct MessageBuilder {
    pub name: wire::TextFieldBuilder,
    pub fields: wire::MessageArrayFieldBuilder<MessageFieldBuilder>,
    pub options: wire::MessageFieldBuilder<MessageOptionsBuilder>,
}

message_builder!(MessageBuilder, 1 => name, 2 => fields, 3 => options);

// }}}

// Union {{{

message_view!(UnionField);

impl<'a> UnionField<'a> {
    pub fn name(&self) -> &'a str {
        self.msg.get_text(1)
    }

    pub fn tag(&self) -> u16 {
        self.msg.get_u32(2) as u16
    }

    pub fn type_(&self) -> Type {
        Type::from_u32(self.msg.get_u32(3))
    }

    pub fn type_name(&self) -> &'a str {
        self.msg.get_text(4)
    }

    pub fn array_len(&self) -> u32 {
        self.msg.get_u32(5)
    }

    pub fn options(&self) -> Option<UnionFieldOptions<'a>> {
        self.msg
            .get_message(6)
            .ok()
            .flatten()
            .map(UnionFieldOptions::from)
    }

    fn validate(&self) -> Result<(), DecodeError> {
        if let Some(options) = self.msg.get_message(6)? {
            UnionFieldOptions::from(options).validate()?;
        }
        Ok(())
    }

    pub fn to_builder(&self) -> UnionFieldBuilder {
        let mut b = UnionFieldBuilder::default();
        b.name.set(self.name());
        b.tag.set(self.tag());
        b.type_.set(self.type_());
        b.type_name.set(self.type_name());
        b.array_len.set(self.array_len());
        if let Some(options) = self.options() {
            b.options.set(options.to_builder());
        }
        b
    }
}

#[derive(Default)]
pub struct UnionFieldBuilder {
    pub name: wire::TextFieldBuilder,
    pub tag: wire::Uint16FieldBuilder,
    pub type_: wire::EnumFieldBuilder<Type>,
    pub type_name: wire::TextFieldBuilder,
    pub array_len: wire::Uint32FieldBuilder,
    pub options: wire::MessageFieldBuilder<UnionFieldOptionsBuilder>,
}

message_builder!(UnionFieldBuilder, 1 => name, 2 => tag, 3 => type_, 4 => type_name, 5 => array_len, 6 => options);

message_view!(Union);

impl<'a> Union<'a> {
    pub fn name(&self) -> &'a str {
        self.msg.get_text(1)
    }

    pub fn fields(&self) -> wire::MessageArray<'a, UnionField<'a>> {
        self.msg.get_message_array(2).unwrap_or_default()
    }

    pub fn options(&self) -> Option<UnionOptions<'a>> {
        self.msg.get_message(3).ok().flatten().map(UnionOptions::from)
    }

    fn validate(&self) -> Result<(), DecodeError> {
        for field in self.msg.get_message_array::<UnionField>(2)?.iter() {
            field.validate()?;
        }
        if let Some(options) = self.msg.get_message(3)? {
            UnionOptions::from(options).validate()?;
        }
        Ok(())
    }

    pub fn to_builder(&self) -> UnionBuilder {
        let mut b = UnionBuilder::default();
        b.name.set(self.name());
        for field in self.fields().iter() {
            b.fields.add(field.to_builder());
        }
        if let Some(options) = self.options() {
            b.options.set(options.to_builder());
        }
        b
    }
}

#[derive(Default)]
pub struct UnionBuilder {
    pub name: wire::TextFieldBuilder,
    pub fields: wire::MessageArrayFieldBuilder<UnionFieldBuilder>,
    pub options: wire::MessageFieldBuilder<UnionOptionsBuilder>,
}

message_builder!(UnionBuilder, 1 => name, 2 => fields, 3 => options);

// }}}

// Protocol {{{

message_view!(ProtocolRpc);

impl<'a> ProtocolRpc<'a> {
    pub fn name(&self) -> &'a str {
        self.msg.get_text(1)
    }

    pub fn tag(&self) -> u64 {
        self.msg.get_u64(2)
    }

    pub fn request_type(&self) -> Type {
        Type::from_u32(self.msg.get_u32(3))
    }

    pub fn request_type_name(&self) -> &'a str {
        self.msg.get_text(4)
    }

    pub fn request_is_stream(&self) -> bool {
        self.msg.get_bool(5)
    }

    pub fn response_type(&self) -> Type {
        Type::from_u32(self.msg.get_u32(6))
    }

    pub fn response_type_name(&self) -> &'a str {
        self.msg.get_text(7)
    }

    pub fn response_is_stream(&self) -> bool {
        self.msg.get_bool(8)
    }

    pub fn options(&self) -> Option<ProtocolRpcOptions<'a>> {
        self.msg
            .get_message(9)
            .ok()
            .flatten()
            .map(ProtocolRpcOptions::from)
    }

    fn validate(&self) -> Result<(), DecodeError> {
        if let Some(options) = self.msg.get_message(9)? {
            ProtocolRpcOptions::from(options).validate()?;
        }
        Ok(())
    }

    pub fn to_builder(&self) -> ProtocolRpcBuilder {
        let mut b = ProtocolRpcBuilder::default();
        b.name.set(self.name());
        b.tag.set(self.tag());
        b.request_type.set(self.request_type());
        b.request_type_name.set(self.request_type_name());
        b.request_is_stream.set(self.request_is_stream());
        b.response_type.set(self.response_type());
        b.response_type_name.set(self.response_type_name());
        b.response_is_stream.set(self.response_is_stream());
        if let Some(options) = self.options() {
            b.options.set(options.to_builder());
        }
        b
    }
}

#[derive(Default)]
pub struct ProtocolRpcBuilder {
    pub name: wire::TextFieldBuilder,
    pub tag: wire::Uint64FieldBuilder,
    pub request_type: wire::EnumFieldBuilder<Type>,
    pub request_type_name: wire::TextFieldBuilder,
    pub request_is_stream: wire::BoolFieldBuilder,
    pub response_type: wire::EnumFieldBuilder<Type>,
    pub response_type_name: wire::TextFieldBuilder,
    pub response_is_stream: wire::BoolFieldBuilder,
    pub options: wire::MessageFieldBuilder<ProtocolRpcOptionsBuilder>,
}

message_builder!(
    ProtocolRpcBuilder,
    1 => name,
    2 => tag,
    3 => request_type,
    4 => request_type_name,
    5 => request_is_stream,
    6 => response_type,
    7 => response_type_name,
    8 => response_is_stream,
    9 => options,
);

message_view!(ProtocolEvent);

impl<'a> ProtocolEvent<'a> {
    pub fn name(&self) -> &'a str {
        self.msg.get_text(1)
    }

    pub fn tag(&self) -> u64 {
        self.msg.get_u64(2)
    }

    pub fn payload_type(&self) -> Type {
        Type::from_u32(self.msg.get_u32(3))
    }

    pub fn payload_type_name(&self) -> &'a str {
        self.msg.get_text(4)
    }

    pub fn options(&self) -> Option<ProtocolEventOptions<'a>> {
        self.msg
            .get_message(5)
            .ok()
            .flatten()
            .map(ProtocolEventOptions::from)
    }

    fn validate(&self) -> Result<(), DecodeError> {
        if let Some(options) = self.msg.get_message(5)? {
            ProtocolEventOptions::from(options).validate()?;
        }
        Ok(())
    }

    pub fn to_builder(&self) -> ProtocolEventBuilder {
        let mut b = ProtocolEventBuilder::default();
        b.name.set(self.name());
        b.tag.set(self.tag());
        b.payload_type.set(self.payload_type());
        b.payload_type_name.set(self.payload_type_name());
        if let Some(options) = self.options() {
            b.options.set(options.to_builder());
        }
        b
    }
}

#[derive(Default)]
pub struct ProtocolEventBuilder {
    pub name: wire::TextFieldBuilder,
    pub tag: wire::Uint64FieldBuilder,
    pub payload_type: wire::EnumFieldBuilder<Type>,
    pub payload_type_name: wire::TextFieldBuilder,
    pub options: wire::MessageFieldBuilder<ProtocolEventOptionsBuilder>,
}

message_builder!(ProtocolEventBuilder, 1 => name, 2 => tag, 3 => payload_type, 4 => payload_type_name, 5 => options);

message_view!(Protocol);

impl<'a> Protocol<'a> {
    pub fn name(&self) -> &'a str {
        self.msg.get_text(1)
    }

    pub fn rpcs(&self) -> wire::MessageArray<'a, ProtocolRpc<'a>> {
        self.msg.get_message_array(2).unwrap_or_default()
    }

    pub fn events(&self) -> wire::MessageArray<'a, ProtocolEvent<'a>> {
        self.msg.get_message_array(3).unwrap_or_default()
    }

    pub fn options(&self) -> Option<ProtocolOptions<'a>> {
        self.msg.get_message(4).ok().flatten().map(ProtocolOptions::from)
    }

    fn validate(&self) -> Result<(), DecodeError> {
        for rpc in self.msg.get_message_array::<ProtocolRpc>(2)?.iter() {
            rpc.validate()?;
        }
        for event in self.msg.get_message_array::<ProtocolEvent>(3)?.iter() {
            event.validate()?;
        }
        if let Some(options) = self.msg.get_message(4)? {
            ProtocolOptions::from(options).validate()?;
        }
        Ok(())
    }

    pub fn to_builder(&self) -> ProtocolBuilder {
        let mut b = ProtocolBuilder::default();
        b.name.set(self.name());
        for rpc in self.rpcs().iter() {
            b.rpcs.add(rpc.to_builder());
        }
        for event in self.events().iter() {
            b.events.add(event.to_builder());
        }
        if let Some(options) = self.options() {
            b.options.set(options.to_builder());
        }
        b
    }
}

#[derive(Default)]
pub struct ProtocolBuilder {
    pub name: wire::TextFieldBuilder,
    pub rpcs: wire::MessageArrayFieldBuilder<ProtocolRpcBuilder>,
    pub events: wire::MessageArrayFieldBuilder<ProtocolEventBuilder>,
    pub options: wire::MessageFieldBuilder<ProtocolOptionsBuilder>,
}

message_builder!(ProtocolBuilder, 1 => name, 2 => rpcs, 3 => events, 4 => options);

// }}}

// Import / Export / Schema {{{

message_view!(Import);

impl<'a> Import<'a> {
    pub fn namespace(&self) -> &'a str {
        self.msg.get_text(1)
    }

    /// The imported names actually used, sorted.
    pub fn names(&self) -> wire::TextArray<'a> {
        self.msg.get_text_array(2).unwrap_or_default()
    }

    fn validate(&self) -> Result<(), DecodeError> {
        self.msg.get_text_array(2)?;
        Ok(())
    }
}

#[derive(Default)]
pub struct ImportBuilder {
    pub namespace: wire::TextFieldBuilder,
    pub names: wire::TextArrayFieldBuilder,
}

message_builder!(ImportBuilder, 1 => namespace, 2 => names);

message_view!(Export);

impl<'a> Export<'a> {
    pub fn export_type(&self) -> ExportType {
        ExportType::from_u32(self.msg.get_u32(1))
    }

    pub fn type_name(&self) -> &'a str {
        self.msg.get_text(2)
    }

    pub fn export_as(&self) -> &'a str {
        self.msg.get_text(3)
    }
}

#[derive(Default)]
pub struct ExportBuilder {
    pub export_type: wire::EnumFieldBuilder<ExportType>,
    pub type_name: wire::TextFieldBuilder,
    pub export_as: wire::TextFieldBuilder,
}

message_builder!(ExportBuilder, 1 => export_type, 2 => type_name, 3 => export_as);

message_view!(Schema);

impl<'a> Schema<'a> {
    /// Validates `buf` as a compiled schema: the root message, every nested
    /// message field, and every message array element.
    pub fn decode(buf: &'a [u8]) -> Result<Schema<'a>, DecodeError> {
        let schema = Schema {
            msg: wire::Message::new(buf)?,
        };
        schema.validate()?;
        Ok(schema)
    }

    pub fn namespace(&self) -> &'a str {
        self.msg.get_text(1)
    }

    pub fn source_path(&self) -> wire::TextArray<'a> {
        self.msg.get_text_array(2).unwrap_or_default()
    }

    pub fn imports(&self) -> wire::MessageArray<'a, Import<'a>> {
        self.msg.get_message_array(3).unwrap_or_default()
    }

    pub fn exports(&self) -> wire::MessageArray<'a, Export<'a>> {
        self.msg.get_message_array(4).unwrap_or_default()
    }

    pub fn options(&self) -> Option<SchemaOptions<'a>> {
        self.msg.get_message(5).ok().flatten().map(SchemaOptions::from)
    }

    pub fn consts(&self) -> wire::MessageArray<'a, Const<'a>> {
        self.msg.get_message_array(6).unwrap_or_default()
    }

    pub fn enums(&self) -> wire::MessageArray<'a, Enum<'a>> {
        self.msg.get_message_array(7).unwrap_or_default()
    }

    pub fn structs(&self) -> wire::MessageArray<'a, Struct<'a>> {
        self.msg.get_message_array(8).unwrap_or_default()
    }

    pub fn messages(&self) -> wire::MessageArray<'a, Message<'a>> {
        self.msg.get_message_array(9).unwrap_or_default()
    }

    pub fn unions(&self) -> wire::MessageArray<'a, Union<'a>> {
        self.msg.get_message_array(10).unwrap_or_default()
    }

    pub fn protocols(&self) -> wire::MessageArray<'a, Protocol<'a>> {
        self.msg.get_message_array(11).unwrap_or_default()
    }

    fn validate(&self) -> Result<(), DecodeError> {
        self.msg.get_text_array(2)?;
        for import in self.msg.get_message_array::<Import>(3)?.iter() {
            import.validate()?;
        }
        self.msg.get_message_array::<Export>(4)?;
        if let Some(options) = self.msg.get_message(5)? {
            SchemaOptions::from(options).validate()?;
        }
        for const_ in self.msg.get_message_array::<Const>(6)?.iter() {
            const_.validate()?;
        }
        for enum_ in self.msg.get_message_array::<Enum>(7)?.iter() {
            enum_.validate()?;
        }
        for struct_ in self.msg.get_message_array::<Struct>(8)?.iter() {
            struct_.validate()?;
        }
        for message in self.msg.get_message_array::<Message>(9)?.iter() {
            message.validate()?;
        }
        for union in self.msg.get_message_array::<Union>(10)?.iter() {
            union.validate()?;
        }
        for protocol in self.msg.get_message_array::<Protocol>(11)?.iter() {
            protocol.validate()?;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct SchemaBuilder {
    pub namespace: wire::TextFieldBuilder,
    pub source_path: wire::TextArrayFieldBuilder,
    pub imports: wire::MessageArrayFieldBuilder<ImportBuilder>,
    pub exports: wire::MessageArrayFieldBuilder<ExportBuilder>,
    pub options: wire::MessageFieldBuilder<SchemaOptionsBuilder>,
    pub consts: wire::MessageArrayFieldBuilder<ConstBuilder>,
    pub enums: wire::MessageArrayFieldBuilder<EnumBuilder>,
    pub structs: wire::MessageArrayFieldBuilder<StructBuilder>,
    pub messages: wire::MessageArrayFieldBuilder<MessageBuilder>,
    pub unions: wire::MessageArrayFieldBuilder<UnionBuilder>,
    pub protocols: wire::MessageArrayFieldBuilder<ProtocolBuilder>,
}

message_builder!(
    SchemaBuilder,
    1 => namespace,
    2 => source_path,
    3 => imports,
    4 => exports,
    5 => options,
    6 => consts,
    7 => enums,
    8 => structs,
    9 => messages,
    10 => unions,
    11 => protocols,
);

// }}}

#[cfg(test)]
mod tests {
    use super::*;
    use idol_schema::encode;

    #[test]
    fn schema_round_trip() {
        let mut schema = SchemaBuilder::default();
        schema.namespace.set("example");

        let mut message = MessageBuilder::default();
        message.name.set("M");
        let mut field = MessageFieldBuilder::default();
        field.name.set("a");
        field.tag.set(1);
        field.type_.set(Type::U32);
        message.fields.add(field);
        schema.messages.add(message);

        let buf = encode(&schema);
        assert_eq!(buf.len() % 8, 0);

        let decoded = Schema::decode(&buf).unwrap();
        assert_eq!(decoded.namespace(), "example");
        assert_eq!(decoded.messages().len(), 1);
        let message = decoded.messages().get(0).unwrap();
        assert_eq!(message.name(), "M");
        let field = message.fields().get(0).unwrap();
        assert_eq!(field.name(), "a");
        assert_eq!(field.tag(), 1);
        assert_eq!(field.type_(), Type::U32);
        assert_eq!(field.array_len(), 0);
    }

    #[test]
    fn clone_with_rename() {
        let mut enum_b = EnumBuilder::default();
        enum_b.name.set("Color");
        enum_b.type_.set(Type::U8);
        let mut item = EnumItemBuilder::default();
        item.name.set("RED");
        item.value.set(1);
        enum_b.items.add(item);

        let buf = encode(&enum_b);
        let view = Enum::from(idol_schema::Message::new(&buf).unwrap());

        let mut cloned = view.to_builder();
        cloned.name.set("Shade");
        let buf2 = encode(&cloned);
        let view2 = Enum::from(idol_schema::Message::new(&buf2).unwrap());
        assert_eq!(view2.name(), "Shade");
        assert_eq!(view2.type_(), Type::U8);
        assert_eq!(view2.items().len(), 1);
        assert_eq!(view2.items().get(0).unwrap().name(), "RED");
        assert_eq!(view2.items().get(0).unwrap().value(), 1);
    }

    #[test]
    fn empty_schema_encodes_empty() {
        assert!(encode(&SchemaBuilder::default()).is_empty());
    }
}
