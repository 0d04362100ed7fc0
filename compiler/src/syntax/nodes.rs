use super::errors::{
    err_int_lit_too_negative, err_int_lit_too_positive, err_text_lit_invalid, Error,
};
use super::tokens::{TokenKind, TOKEN_FLAG_TEXT_HAS_NO_ESCAPES};
use serde::Serialize;

/// A byte range in the source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Span {
    start: u32,
    len: u32,
}

impl Span {
    pub fn new(start: u32, len: u32) -> Span {
        Span { start, len }
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.start + self.len
    }

    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// One concrete syntax tree node. Composite nodes own every child (trivia
/// included) in source order; re-unparsing any node reproduces exactly the
/// bytes it spans.
#[derive(Debug)]
pub enum Node {
    Space(Space),
    Newline(Newline),
    Comment(Comment),
    Sigil(Sigil),
    Keyword(Keyword),
    Ident(Ident),
    IntLit(IntLit),
    TextLit(TextLit),

    TypeName(TypeName),
    ValueName(ValueName),
    ExportName(ExportName),
    EnumRef(EnumRef),
    Tag(Tag),
    FieldType(FieldType),

    Namespace(Namespace),
    Import(Import),
    Export(Export),
    Options(Options),
    OptionPair(OptionPair),
    OptionName(OptionName),
    Decorator(Decorator),

    Const(Const),
    Enum(Enum),
    EnumItem(EnumItem),
    Struct(Struct),
    StructField(StructField),
    Message(Message),
    MessageField(MessageField),
    Union(Union),
    UnionField(UnionField),
    Protocol(Protocol),
    ProtocolRpc(ProtocolRpc),
    ProtocolEvent(ProtocolEvent),

    Schema(Schema),
}

macro_rules! for_each_node {
    ($node:expr, $n:ident => $e:expr) => {
        match $node {
            Node::Space($n) => $e,
            Node::Newline($n) => $e,
            Node::Comment($n) => $e,
            Node::Sigil($n) => $e,
            Node::Keyword($n) => $e,
            Node::Ident($n) => $e,
            Node::IntLit($n) => $e,
            Node::TextLit($n) => $e,
            Node::TypeName($n) => $e,
            Node::ValueName($n) => $e,
            Node::ExportName($n) => $e,
            Node::EnumRef($n) => $e,
            Node::Tag($n) => $e,
            Node::FieldType($n) => $e,
            Node::Namespace($n) => $e,
            Node::Import($n) => $e,
            Node::Export($n) => $e,
            Node::Options($n) => $e,
            Node::OptionPair($n) => $e,
            Node::OptionName($n) => $e,
            Node::Decorator($n) => $e,
            Node::Const($n) => $e,
            Node::Enum($n) => $e,
            Node::EnumItem($n) => $e,
            Node::Struct($n) => $e,
            Node::StructField($n) => $e,
            Node::Message($n) => $e,
            Node::MessageField($n) => $e,
            Node::Union($n) => $e,
            Node::UnionField($n) => $e,
            Node::Protocol($n) => $e,
            Node::ProtocolRpc($n) => $e,
            Node::ProtocolEvent($n) => $e,
            Node::Schema($n) => $e,
        }
    };
}

impl Node {
    pub fn span(&self) -> Span {
        for_each_node!(self, n => n.span())
    }

    pub fn children(&self) -> &[Node] {
        for_each_node!(self, n => n.children())
    }

    pub fn unparse_to(&self, out: &mut String) {
        for_each_node!(self, n => n.unparse_to(out))
    }

    pub(crate) fn as_ident(&self) -> &Ident {
        match self {
            Node::Ident(n) => n,
            _ => unreachable!(),
        }
    }

    pub(crate) fn as_int_lit(&self) -> &IntLit {
        match self {
            Node::IntLit(n) => n,
            _ => unreachable!(),
        }
    }

    pub(crate) fn as_text_lit(&self) -> &TextLit {
        match self {
            Node::TextLit(n) => n,
            _ => unreachable!(),
        }
    }

    pub(crate) fn as_type_name(&self) -> &TypeName {
        match self {
            Node::TypeName(n) => n,
            _ => unreachable!(),
        }
    }

    pub(crate) fn as_field_type(&self) -> &FieldType {
        match self {
            Node::FieldType(n) => n,
            _ => unreachable!(),
        }
    }

    pub(crate) fn as_tag(&self) -> &Tag {
        match self {
            Node::Tag(n) => n,
            _ => unreachable!(),
        }
    }

    pub(crate) fn as_decorator(&self) -> &Decorator {
        match self {
            Node::Decorator(n) => n,
            _ => unreachable!(),
        }
    }
}

/// Re-unparses a node into a fresh string.
pub fn unparse(node: &Node) -> String {
    let mut out = String::new();
    node.unparse_to(&mut out);
    out
}

/// Depth-first walk over a node and all of its children.
pub fn walk<'a>(node: &'a Node, walk_fn: &mut dyn FnMut(&'a Node) -> bool) {
    if !walk_fn(node) {
        return;
    }
    for child in node.children() {
        walk(child, walk_fn);
    }
}

macro_rules! leaf_node {
    ($name:ident) => {
        impl $name {
            pub fn children(&self) -> &[Node] {
                &[]
            }
        }
    };
}

macro_rules! composite_node {
    ($name:ident) => {
        impl $name {
            pub fn span(&self) -> Span {
                self.span
            }

            pub fn children(&self) -> &[Node] {
                &self.children
            }

            pub fn unparse_to(&self, out: &mut String) {
                for child in &self.children {
                    child.unparse_to(out);
                }
            }
        }
    };
}

// Trivia and leaves {{{

#[derive(Debug)]
pub struct Space {
    pub(super) raw: String,
    pub(super) start: u32,
}

leaf_node!(Space);

impl Space {
    pub fn span(&self) -> Span {
        Span::new(self.start, self.raw.len() as u32)
    }

    pub fn unparse_to(&self, out: &mut String) {
        out.push_str(&self.raw);
    }
}

#[derive(Debug)]
pub struct Newline {
    pub(super) start: u32,
    pub(super) crlf: bool,
}

leaf_node!(Newline);

impl Newline {
    pub fn span(&self) -> Span {
        Span::new(self.start, if self.crlf { 2 } else { 1 })
    }

    pub fn unparse_to(&self, out: &mut String) {
        out.push_str(if self.crlf { "\r\n" } else { "\n" });
    }
}

#[derive(Debug)]
pub struct Comment {
    pub(super) raw: String,
    pub(super) start: u32,
}

leaf_node!(Comment);

impl Comment {
    pub fn span(&self) -> Span {
        Span::new(self.start, self.raw.len() as u32)
    }

    pub fn unparse_to(&self, out: &mut String) {
        out.push_str(&self.raw);
    }

    pub fn text(&self) -> &str {
        &self.raw
    }

    pub fn is_doc_comment(&self) -> bool {
        self.raw.starts_with("##")
    }
}

#[derive(Debug)]
pub struct Sigil {
    pub(super) raw: u8,
    pub(super) start: u32,
}

leaf_node!(Sigil);

impl Sigil {
    pub fn span(&self) -> Span {
        Span::new(self.start, 1)
    }

    pub fn unparse_to(&self, out: &mut String) {
        out.push(self.raw as char);
    }
}

#[derive(Debug)]
pub struct Keyword {
    pub(super) raw: &'static str,
    pub(super) start: u32,
}

leaf_node!(Keyword);

impl Keyword {
    pub fn span(&self) -> Span {
        Span::new(self.start, self.raw.len() as u32)
    }

    pub fn unparse_to(&self, out: &mut String) {
        out.push_str(self.raw);
    }
}

#[derive(Debug)]
pub struct Ident {
    pub(super) raw: String,
    pub(super) start: u32,
}

leaf_node!(Ident);

impl Ident {
    pub fn span(&self) -> Span {
        Span::new(self.start, self.raw.len() as u32)
    }

    pub fn unparse_to(&self, out: &mut String) {
        out.push_str(&self.raw);
    }

    pub fn get(&self) -> &str {
        &self.raw
    }
}

/// An integer literal. The raw text (base prefix, sign, underscores) is kept
/// verbatim; the value is stored as the two's-complement bit pattern.
#[derive(Debug)]
pub struct IntLit {
    pub(super) raw: String,
    pub(super) value: u64,
    pub(super) start: u32,
}

leaf_node!(IntLit);

impl IntLit {
    pub(super) fn new(raw: &str, kind: TokenKind, start: u32) -> Result<IntLit, Error> {
        let unsigned = raw.strip_prefix('-').unwrap_or(raw);
        let (base, digits) = match kind {
            TokenKind::BinIntLit => (2, &unsigned[2..]),
            TokenKind::OctIntLit => (8, &unsigned[2..]),
            TokenKind::DecIntLit => (10, &unsigned[2..]),
            TokenKind::HexIntLit => (16, &unsigned[2..]),
            _ => (10, unsigned),
        };
        let digits = digits.replace('_', "");

        let mut value = u64::from_str_radix(&digits, base)
            .map_err(|_| err_int_lit_too_positive(start, raw))?;
        if raw.starts_with('-') {
            if value > i64::MAX as u64 + 1 {
                return Err(err_int_lit_too_negative(start, raw));
            }
            value = value.wrapping_neg();
        }

        Ok(IntLit {
            raw: raw.to_owned(),
            value,
            start,
        })
    }

    pub fn span(&self) -> Span {
        Span::new(self.start, self.raw.len() as u32)
    }

    pub fn unparse_to(&self, out: &mut String) {
        out.push_str(&self.raw);
    }

    fn is_negative(&self) -> bool {
        self.raw.starts_with('-')
    }

    pub fn get_u8(&self) -> Option<u8> {
        if !self.is_negative() && self.value <= u8::MAX as u64 {
            return Some(self.value as u8);
        }
        None
    }

    pub fn get_u16(&self) -> Option<u16> {
        if !self.is_negative() && self.value <= u16::MAX as u64 {
            return Some(self.value as u16);
        }
        None
    }

    pub fn get_u32(&self) -> Option<u32> {
        if !self.is_negative() && self.value <= u32::MAX as u64 {
            return Some(self.value as u32);
        }
        None
    }

    pub fn get_u64(&self) -> Option<u64> {
        if !self.is_negative() {
            return Some(self.value);
        }
        None
    }

    pub fn get_i8(&self) -> Option<i8> {
        if self.is_negative() {
            let v = self.value as i64;
            if (i8::MIN as i64..=i8::MAX as i64).contains(&v) {
                return Some(v as i8);
            }
            return None;
        }
        if self.value <= i8::MAX as u64 {
            return Some(self.value as i8);
        }
        None
    }

    pub fn get_i16(&self) -> Option<i16> {
        if self.is_negative() {
            let v = self.value as i64;
            if (i16::MIN as i64..=i16::MAX as i64).contains(&v) {
                return Some(v as i16);
            }
            return None;
        }
        if self.value <= i16::MAX as u64 {
            return Some(self.value as i16);
        }
        None
    }

    pub fn get_i32(&self) -> Option<i32> {
        if self.is_negative() {
            let v = self.value as i64;
            if (i32::MIN as i64..=i32::MAX as i64).contains(&v) {
                return Some(v as i32);
            }
            return None;
        }
        if self.value <= i32::MAX as u64 {
            return Some(self.value as i32);
        }
        None
    }

    pub fn get_i64(&self) -> Option<i64> {
        if self.is_negative() || self.value <= i64::MAX as u64 {
            return Some(self.value as i64);
        }
        None
    }
}

/// A text literal: the raw source text plus the decoded bytes and their
/// validity as `asciz` (no NUL) and `text` (no NUL, no non-ASCII byte
/// escapes).
#[derive(Debug)]
pub struct TextLit {
    pub(super) raw: String,
    pub(super) value: Vec<u8>,
    pub(super) start: u32,
    pub(super) valid_asciz: bool,
    pub(super) valid_text: bool,
}

leaf_node!(TextLit);

impl TextLit {
    pub(super) fn new(raw: &str, start: u32, flags: u8) -> Result<TextLit, Error> {
        let inner = &raw[1..raw.len() - 1];
        if flags & TOKEN_FLAG_TEXT_HAS_NO_ESCAPES != 0 {
            return Ok(TextLit {
                raw: raw.to_owned(),
                value: inner.as_bytes().to_vec(),
                start,
                valid_asciz: true,
                valid_text: true,
            });
        }

        let invalid = || err_text_lit_invalid(start, raw);

        let mut value = Vec::with_capacity(inner.len());
        let mut valid_asciz = true;
        let mut valid_text = true;
        let mut rest = inner.as_bytes();
        while let Some((&c, tail)) = rest.split_first() {
            if c != b'\\' {
                value.push(c);
                rest = tail;
                continue;
            }
            let Some((&esc, tail)) = tail.split_first() else {
                return Err(invalid());
            };
            rest = tail;
            match esc {
                0x22 | 0x5C => value.push(esc),
                b'n' => value.push(0x0A),
                b't' => value.push(0x09),
                b'x' => {
                    let Some(hex) = rest.get(..2) else {
                        return Err(invalid());
                    };
                    let hex = std::str::from_utf8(hex).map_err(|_| invalid())?;
                    let b = u8::from_str_radix(hex, 16).map_err(|_| invalid())?;
                    if b == 0 {
                        valid_asciz = false;
                        valid_text = false;
                    }
                    if b > 0x7F {
                        valid_text = false;
                    }
                    value.push(b);
                    rest = &rest[2..];
                }
                b'u' => {
                    let Some((&open, tail)) = rest.split_first() else {
                        return Err(invalid());
                    };
                    if open != b'{' {
                        return Err(invalid());
                    }
                    rest = tail;

                    let Some(close) = rest.iter().position(|&hc| hc == b'}') else {
                        return Err(invalid());
                    };
                    let hex = &rest[..close];
                    rest = &rest[close + 1..];
                    if hex.is_empty() || hex.len() > 6 {
                        return Err(invalid());
                    }
                    let hex = std::str::from_utf8(hex).map_err(|_| invalid())?;
                    let scalar = u32::from_str_radix(hex, 16).map_err(|_| invalid())?;
                    if scalar == 0 {
                        valid_asciz = false;
                        valid_text = false;
                    }
                    if scalar > 0x10FFFF {
                        return Err(invalid());
                    }
                    let Some(r) = char::from_u32(scalar) else {
                        return Err(invalid());
                    };
                    let mut utf8 = [0u8; 4];
                    value.extend_from_slice(r.encode_utf8(&mut utf8).as_bytes());
                }
                _ => return Err(invalid()),
            }
        }

        Ok(TextLit {
            raw: raw.to_owned(),
            value,
            start,
            valid_asciz,
            valid_text,
        })
    }

    pub fn span(&self) -> Span {
        Span::new(self.start, self.raw.len() as u32)
    }

    pub fn unparse_to(&self, out: &mut String) {
        out.push_str(&self.raw);
    }

    /// The decoded bytes, if valid as an `asciz` value (no interior NUL).
    pub fn get_asciz(&self) -> Option<&[u8]> {
        if self.valid_asciz {
            Some(&self.value)
        } else {
            None
        }
    }

    /// The decoded text, if valid as a `text` value.
    pub fn get_text(&self) -> Option<&str> {
        if !self.valid_text {
            return None;
        }
        std::str::from_utf8(&self.value).ok()
    }
}

// }}}

// Names, tags, and field types {{{

#[derive(Debug)]
pub struct TypeName {
    pub(super) span: Span,
    pub(super) children: Vec<Node>,
    pub(super) scope: Option<usize>,
    pub(super) name: usize,
}

composite_node!(TypeName);

impl TypeName {
    pub fn scope(&self) -> Option<&Ident> {
        self.scope.map(|idx| self.children[idx].as_ident())
    }

    pub fn name(&self) -> &Ident {
        self.children[self.name].as_ident()
    }
}

#[derive(Debug)]
pub struct ValueName {
    pub(super) span: Span,
    pub(super) children: Vec<Node>,
    pub(super) scope: Option<usize>,
    pub(super) name: usize,
}

composite_node!(ValueName);

impl ValueName {
    pub fn scope(&self) -> Option<&Ident> {
        self.scope.map(|idx| self.children[idx].as_ident())
    }

    pub fn name(&self) -> &Ident {
        self.children[self.name].as_ident()
    }
}

#[derive(Debug)]
pub struct ExportName {
    pub(super) span: Span,
    pub(super) children: Vec<Node>,
    pub(super) scope: Option<usize>,
    pub(super) name: usize,
}

composite_node!(ExportName);

impl ExportName {
    pub fn scope(&self) -> Option<&Ident> {
        self.scope.map(|idx| self.children[idx].as_ident())
    }

    pub fn name(&self) -> &Ident {
        self.children[self.name].as_ident()
    }
}

/// A `.name` reference to an enum item (or `.true` / `.false`).
#[derive(Debug)]
pub struct EnumRef {
    pub(super) span: Span,
    pub(super) children: Vec<Node>,
    pub(super) name: usize,
}

composite_node!(EnumRef);

impl EnumRef {
    pub fn name(&self) -> &Ident {
        self.children[self.name].as_ident()
    }
}

/// A `@TAG` field or protocol-item tag.
#[derive(Debug)]
pub struct Tag {
    pub(super) span: Span,
    pub(super) children: Vec<Node>,
    pub(super) value: usize,
}

composite_node!(Tag);

impl Tag {
    pub fn value(&self) -> &IntLit {
        self.children[self.value].as_int_lit()
    }
}

/// A field's type: a type name plus an optional `[]` or `[N]` array suffix.
#[derive(Debug)]
pub struct FieldType {
    pub(super) span: Span,
    pub(super) children: Vec<Node>,
    pub(super) type_name: usize,
    pub(super) is_array: bool,
    pub(super) array_len: Option<usize>,
}

composite_node!(FieldType);

impl FieldType {
    pub fn type_name(&self) -> &TypeName {
        self.children[self.type_name].as_type_name()
    }

    pub fn is_array(&self) -> bool {
        self.is_array
    }

    pub fn array_len(&self) -> Option<&IntLit> {
        self.array_len.map(|idx| self.children[idx].as_int_lit())
    }
}

// }}}

// Schema prelude {{{

#[derive(Debug)]
pub struct Namespace {
    pub(super) span: Span,
    pub(super) children: Vec<Node>,
    pub(super) namespace: usize,
}

composite_node!(Namespace);

impl Namespace {
    pub fn namespace(&self) -> &TextLit {
        self.children[self.namespace].as_text_lit()
    }
}

#[derive(Debug)]
pub struct Import {
    pub(super) span: Span,
    pub(super) children: Vec<Node>,
    pub(super) namespace: usize,
    pub(super) import_as: Option<usize>,
    pub(super) import_names: Vec<usize>,
}

composite_node!(Import);

impl Import {
    pub fn namespace(&self) -> &TextLit {
        self.children[self.namespace].as_text_lit()
    }

    pub fn import_as(&self) -> Option<&Ident> {
        self.import_as.map(|idx| self.children[idx].as_ident())
    }

    pub fn import_names(&self) -> impl Iterator<Item = &Ident> {
        self.import_names
            .iter()
            .map(|&idx| self.children[idx].as_ident())
    }

    pub fn has_import_names(&self) -> bool {
        !self.import_names.is_empty()
    }
}

#[derive(Debug)]
pub struct Export {
    pub(super) span: Span,
    pub(super) children: Vec<Node>,
    pub(super) export_as: Option<(usize, usize)>,
    pub(super) export_names: Vec<usize>,
}

composite_node!(Export);

impl Export {
    /// The `export NAME as ALIAS` form, if used.
    pub fn export_as(&self) -> Option<(&ExportName, &Ident)> {
        self.export_as.map(|(name_idx, as_idx)| {
            let name = match &self.children[name_idx] {
                Node::ExportName(n) => n,
                _ => unreachable!(),
            };
            (name, self.children[as_idx].as_ident())
        })
    }

    pub fn export_names(&self) -> impl Iterator<Item = &ExportName> {
        self.export_names.iter().map(|&idx| match &self.children[idx] {
            Node::ExportName(n) => n,
            _ => unreachable!(),
        })
    }
}

// }}}

// Options and decorators {{{

/// An `options { ... }` block, optionally bound to an options schema type
/// (`options : alias.Type { ... }`).
#[derive(Debug)]
pub struct Options {
    pub(super) span: Span,
    pub(super) children: Vec<Node>,
    pub(super) schema: Option<usize>,
    pub(super) options: Vec<usize>,
}

composite_node!(Options);

impl Options {
    pub fn schema(&self) -> Option<&TypeName> {
        self.schema.map(|idx| self.children[idx].as_type_name())
    }

    pub fn options(&self) -> impl Iterator<Item = &OptionPair> {
        self.options.iter().map(|&idx| match &self.children[idx] {
            Node::OptionPair(n) => n,
            _ => unreachable!(),
        })
    }
}

/// One `name = value` pair, either inside an options block or as the
/// `@{name}` / `@{name = value}` single-option decorator form.
#[derive(Debug)]
pub struct OptionPair {
    pub(super) span: Span,
    pub(super) children: Vec<Node>,
    pub(super) name: usize,
    pub(super) value: Option<usize>,
}

composite_node!(OptionPair);

impl OptionPair {
    pub fn name(&self) -> &OptionName {
        match &self.children[self.name] {
            Node::OptionName(n) => n,
            _ => unreachable!(),
        }
    }

    pub fn value(&self) -> Option<&Node> {
        self.value.map(|idx| &self.children[idx])
    }
}

/// A dotted option name (`a.b.c`).
#[derive(Debug)]
pub struct OptionName {
    pub(super) span: Span,
    pub(super) children: Vec<Node>,
}

composite_node!(OptionName);

impl OptionName {
    /// The dotted name as written (no trivia can occur inside).
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.unparse_to(&mut out);
        out
    }
}

/// A `@...` decorator: either a full options block or a single option.
#[derive(Debug)]
pub struct Decorator {
    pub(super) span: Span,
    pub(super) children: Vec<Node>,
    pub(super) value: usize,
}

composite_node!(Decorator);

impl Decorator {
    pub fn options(&self) -> Option<&Options> {
        match &self.children[self.value] {
            Node::Options(n) => Some(n),
            _ => None,
        }
    }

    pub fn option(&self) -> Option<&OptionPair> {
        match &self.children[self.value] {
            Node::OptionPair(n) => Some(n),
            _ => None,
        }
    }
}

// }}}

// Declarations {{{

macro_rules! decorated {
    ($name:ident) => {
        impl $name {
            pub fn decorators(&self) -> impl Iterator<Item = &Decorator> {
                self.decorators
                    .iter()
                    .map(|&idx| self.children[idx].as_decorator())
            }
        }
    };
}

#[derive(Debug)]
pub struct Const {
    pub(super) span: Span,
    pub(super) children: Vec<Node>,
    pub(super) name: usize,
    pub(super) type_name: usize,
    pub(super) value: usize,
    pub(super) decorators: Vec<usize>,
}

composite_node!(Const);
decorated!(Const);

impl Const {
    pub fn name(&self) -> &Ident {
        self.children[self.name].as_ident()
    }

    pub fn type_name(&self) -> &TypeName {
        self.children[self.type_name].as_type_name()
    }

    pub fn value(&self) -> &Node {
        &self.children[self.value]
    }
}

#[derive(Debug)]
pub struct Enum {
    pub(super) span: Span,
    pub(super) children: Vec<Node>,
    pub(super) name: usize,
    pub(super) type_: usize,
    pub(super) items: Vec<usize>,
    pub(super) decorators: Vec<usize>,
}

composite_node!(Enum);
decorated!(Enum);

impl Enum {
    pub fn name(&self) -> &Ident {
        self.children[self.name].as_ident()
    }

    /// The enum's integer base type (`u8` ... `i64`).
    pub fn type_(&self) -> &Ident {
        self.children[self.type_].as_ident()
    }

    pub fn items(&self) -> impl Iterator<Item = &EnumItem> {
        self.items.iter().map(|&idx| match &self.children[idx] {
            Node::EnumItem(n) => n,
            _ => unreachable!(),
        })
    }
}

#[derive(Debug)]
pub struct EnumItem {
    pub(super) span: Span,
    pub(super) children: Vec<Node>,
    pub(super) name: usize,
    pub(super) value: usize,
    pub(super) decorators: Vec<usize>,
}

composite_node!(EnumItem);
decorated!(EnumItem);

impl EnumItem {
    pub fn name(&self) -> &Ident {
        self.children[self.name].as_ident()
    }

    pub fn value(&self) -> &Node {
        &self.children[self.value]
    }
}

#[derive(Debug)]
pub struct Struct {
    pub(super) span: Span,
    pub(super) children: Vec<Node>,
    pub(super) name: usize,
    pub(super) fields: Vec<usize>,
    pub(super) decorators: Vec<usize>,
}

composite_node!(Struct);
decorated!(Struct);

impl Struct {
    pub fn name(&self) -> &Ident {
        self.children[self.name].as_ident()
    }

    pub fn fields(&self) -> impl Iterator<Item = &StructField> {
        self.fields.iter().map(|&idx| match &self.children[idx] {
            Node::StructField(n) => n,
            _ => unreachable!(),
        })
    }
}

#[derive(Debug)]
pub struct StructField {
    pub(super) span: Span,
    pub(super) children: Vec<Node>,
    pub(super) name: usize,
    pub(super) field_type: usize,
    pub(super) decorators: Vec<usize>,
}

composite_node!(StructField);
decorated!(StructField);

impl StructField {
    pub fn name(&self) -> &Ident {
        self.children[self.name].as_ident()
    }

    pub fn field_type(&self) -> &FieldType {
        self.children[self.field_type].as_field_type()
    }
}

#[derive(Debug)]
pub struct Message {
    pub(super) span: Span,
    pub(super) children: Vec<Node>,
    pub(super) name: usize,
    pub(super) fields: Vec<usize>,
    pub(super) decorators: Vec<usize>,
}

composite_node!(Message);
decorated!(Message);

impl Message {
    pub fn name(&self) -> &Ident {
        self.children[self.name].as_ident()
    }

    pub fn fields(&self) -> impl Iterator<Item = &MessageField> {
        self.fields.iter().map(|&idx| match &self.children[idx] {
            Node::MessageField(n) => n,
            _ => unreachable!(),
        })
    }
}

#[derive(Debug)]
pub struct MessageField {
    pub(super) span: Span,
    pub(super) children: Vec<Node>,
    pub(super) name: usize,
    pub(super) tag: usize,
    pub(super) field_type: usize,
    pub(super) decorators: Vec<usize>,
}

composite_node!(MessageField);
decorated!(MessageField);

impl MessageField {
    pub fn name(&self) -> &Ident {
        self.children[self.name].as_ident()
    }

    pub fn tag(&self) -> &Tag {
        self.children[self.tag].as_tag()
    }

    pub fn field_type(&self) -> &FieldType {
        self.children[self.field_type].as_field_type()
    }
}

#[derive(Debug)]
pub struct Union {
    pub(super) span: Span,
    pub(super) children: Vec<Node>,
    pub(super) name: usize,
    pub(super) fields: Vec<usize>,
    pub(super) decorators: Vec<usize>,
}

composite_node!(Union);
decorated!(Union);

impl Union {
    pub fn name(&self) -> &Ident {
        self.children[self.name].as_ident()
    }

    pub fn fields(&self) -> impl Iterator<Item = &UnionField> {
        self.fields.iter().map(|&idx| match &self.children[idx] {
            Node::UnionField(n) => n,
            _ => unreachable!(),
        })
    }
}

#[derive(Debug)]
pub struct UnionField {
    pub(super) span: Span,
    pub(super) children: Vec<Node>,
    pub(super) name: usize,
    pub(super) tag: usize,
    pub(super) field_type: usize,
    pub(super) decorators: Vec<usize>,
}

composite_node!(UnionField);
decorated!(UnionField);

impl UnionField {
    pub fn name(&self) -> &Ident {
        self.children[self.name].as_ident()
    }

    pub fn tag(&self) -> &Tag {
        self.children[self.tag].as_tag()
    }

    pub fn field_type(&self) -> &FieldType {
        self.children[self.field_type].as_field_type()
    }
}

#[derive(Debug)]
pub struct Protocol {
    pub(super) span: Span,
    pub(super) children: Vec<Node>,
    pub(super) name: usize,
    pub(super) rpcs: Vec<usize>,
    pub(super) events: Vec<usize>,
    pub(super) decorators: Vec<usize>,
}

composite_node!(Protocol);
decorated!(Protocol);

impl Protocol {
    pub fn name(&self) -> &Ident {
        self.children[self.name].as_ident()
    }

    pub fn rpcs(&self) -> impl Iterator<Item = &ProtocolRpc> {
        self.rpcs.iter().map(|&idx| match &self.children[idx] {
            Node::ProtocolRpc(n) => n,
            _ => unreachable!(),
        })
    }

    pub fn events(&self) -> impl Iterator<Item = &ProtocolEvent> {
        self.events.iter().map(|&idx| match &self.children[idx] {
            Node::ProtocolEvent(n) => n,
            _ => unreachable!(),
        })
    }
}

#[derive(Debug)]
pub struct ProtocolRpc {
    pub(super) span: Span,
    pub(super) children: Vec<Node>,
    pub(super) name: usize,
    pub(super) tag: Option<usize>,
    pub(super) request_type: usize,
    pub(super) request_is_stream: bool,
    pub(super) response_type: Option<usize>,
    pub(super) response_is_stream: bool,
    pub(super) decorators: Vec<usize>,
}

composite_node!(ProtocolRpc);
decorated!(ProtocolRpc);

impl ProtocolRpc {
    pub fn name(&self) -> &Ident {
        self.children[self.name].as_ident()
    }

    pub fn tag(&self) -> Option<&Tag> {
        self.tag.map(|idx| self.children[idx].as_tag())
    }

    pub fn request_type(&self) -> &TypeName {
        self.children[self.request_type].as_type_name()
    }

    pub fn request_is_stream(&self) -> bool {
        self.request_is_stream
    }

    pub fn response_type(&self) -> Option<&TypeName> {
        self.response_type
            .map(|idx| self.children[idx].as_type_name())
    }

    pub fn response_is_stream(&self) -> bool {
        self.response_is_stream
    }
}

#[derive(Debug)]
pub struct ProtocolEvent {
    pub(super) span: Span,
    pub(super) children: Vec<Node>,
    pub(super) name: usize,
    pub(super) tag: Option<usize>,
    pub(super) payload_type: usize,
    pub(super) decorators: Vec<usize>,
}

composite_node!(ProtocolEvent);
decorated!(ProtocolEvent);

impl ProtocolEvent {
    pub fn name(&self) -> &Ident {
        self.children[self.name].as_ident()
    }

    pub fn tag(&self) -> Option<&Tag> {
        self.tag.map(|idx| self.children[idx].as_tag())
    }

    pub fn payload_type(&self) -> &TypeName {
        self.children[self.payload_type].as_type_name()
    }
}

// }}}

/// The root of a parsed source file.
#[derive(Debug)]
pub struct Schema {
    pub(super) span: Span,
    pub(super) children: Vec<Node>,
}

composite_node!(Schema);

#[cfg(test)]
mod tests {
    use super::*;

    fn int_lit(raw: &str, kind: TokenKind) -> IntLit {
        IntLit::new(raw, kind, 0).unwrap()
    }

    #[test]
    fn int_lit_ranges() {
        assert_eq!(int_lit("255", TokenKind::IntLit).get_u8(), Some(255));
        assert_eq!(int_lit("256", TokenKind::IntLit).get_u8(), None);
        assert_eq!(int_lit("-1", TokenKind::IntLit).get_u8(), None);
        assert_eq!(int_lit("-128", TokenKind::IntLit).get_i8(), Some(-128));
        assert_eq!(int_lit("-129", TokenKind::IntLit).get_i8(), None);
        assert_eq!(int_lit("0xFFFF", TokenKind::HexIntLit).get_u16(), Some(0xFFFF));
        assert_eq!(int_lit("0b1_0", TokenKind::BinIntLit).get_u8(), Some(2));
        assert_eq!(
            int_lit("-9223372036854775808", TokenKind::IntLit).get_i64(),
            Some(i64::MIN)
        );
        assert_eq!(
            int_lit("18446744073709551615", TokenKind::IntLit).get_u64(),
            Some(u64::MAX)
        );
    }

    #[test]
    fn int_lit_overflow() {
        assert_eq!(
            IntLit::new("18446744073709551616", TokenKind::IntLit, 0)
                .unwrap_err()
                .code(),
            2022
        );
        assert_eq!(
            IntLit::new("-9223372036854775809", TokenKind::IntLit, 0)
                .unwrap_err()
                .code(),
            2023
        );
    }

    #[test]
    fn text_lit_escapes() {
        let lit = TextLit::new(r#""a\tb\n\"\\""#, 0, 0).unwrap();
        assert_eq!(lit.get_text(), Some("a\tb\n\"\\"));
        assert_eq!(lit.get_asciz(), Some("a\tb\n\"\\".as_bytes()));

        let pizza = TextLit::new(r#""\u{1F355}""#, 0, 0).unwrap();
        assert_eq!(pizza.get_text(), Some("\u{1F355}"));

        let high_byte = TextLit::new(r#""\xC3""#, 0, 0).unwrap();
        assert_eq!(high_byte.get_text(), None);
        assert_eq!(high_byte.get_asciz(), Some(&[0xC3u8][..]));

        let nul = TextLit::new(r#""\x00""#, 0, 0).unwrap();
        assert_eq!(nul.get_text(), None);
        assert_eq!(nul.get_asciz(), None);
    }

    #[test]
    fn text_lit_invalid_escapes() {
        for raw in [r#""\q""#, r#""\x1""#, r#""\u{}""#, r#""\u{1234567}""#, r#""\u{110000}""#] {
            assert_eq!(TextLit::new(raw, 0, 0).unwrap_err().code(), 2024, "{}", raw);
        }
    }
}
