//! Lexer, concrete syntax tree, and recursive-descent parser for `.idol`
//! source files.
//!
//! The parser keeps one token of lookahead and stops at the first error.
//! Trivia (spaces, newlines, comments) is recorded as child nodes of the
//! enclosing construct, which is what makes every node losslessly
//! reprintable via [`unparse`].

mod errors;
mod nodes;
mod tokens;

pub use errors::Error;
pub use nodes::*;
pub use tokens::{Token, TokenKind, Tokens};

use errors::*;

/// Controls which trivia the parser records. Dropping trivia makes the tree
/// smaller but no longer byte-for-byte reprintable.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    pub save_spaces: bool,
    pub save_newlines: bool,
    pub save_comments: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            save_spaces: true,
            save_newlines: true,
            save_comments: true,
        }
    }
}

/// Parses a complete schema source file with default options.
pub fn parse(src: &[u8]) -> Result<Schema, Error> {
    ParseOptions::default().parse_schema(src)
}

impl ParseOptions {
    pub fn parse_schema(&self, src: &[u8]) -> Result<Schema, Error> {
        let tokens = Tokens::new(src)?;
        let Ok(text) = std::str::from_utf8(src) else {
            unreachable!()
        };
        let mut parser = Parser {
            src: text,
            pos: 0,
            tokens,
            lookahead: None,
            opts: self,
        };
        parser.parse_schema()
    }
}

/// Accumulates the children of one node under construction.
struct B {
    start: u32,
    children: Vec<Node>,
}

impl B {
    fn push(&mut self, node: Node) -> usize {
        self.children.push(node);
        self.children.len() - 1
    }
}

struct Parser<'a, 'o> {
    src: &'a str,
    pos: u32,
    tokens: Tokens<'a>,
    lookahead: Option<Token>,
    opts: &'o ParseOptions,
}

impl<'a, 'o> Parser<'a, 'o> {
    fn begin(&self) -> B {
        B {
            start: self.pos,
            children: Vec::new(),
        }
    }

    fn span_from(&self, start: u32) -> Span {
        Span::new(start, self.pos - start)
    }

    fn peek(&mut self) -> Result<Token, Error> {
        if let Some(token) = self.lookahead {
            return Ok(token);
        }
        let token = self.tokens.next()?;
        self.lookahead = Some(token);
        Ok(token)
    }

    fn read_token(&self, token: Token) -> &'a str {
        let start = self.pos as usize;
        &self.src[start..start + token.len as usize]
    }

    fn token_span(&self, token: Token) -> Span {
        Span::new(self.pos, token.len as u32)
    }

    fn consume(&mut self, b: &mut B, node: Option<Node>) {
        let Some(token) = self.lookahead.take() else {
            unreachable!()
        };
        self.pos += token.len as u32;
        if let Some(node) = node {
            b.push(node);
        }
    }

    /// Consumes a single space token, if present.
    fn space(&mut self, b: &mut B) -> Result<(), Error> {
        if self.peek()?.kind != TokenKind::Space {
            return Ok(());
        }
        self.consume_space(b);
        Ok(())
    }

    fn consume_space(&mut self, b: &mut B) {
        let node = if self.opts.save_spaces {
            let Some(token) = self.lookahead else {
                unreachable!()
            };
            Some(Node::Space(Space {
                raw: self.read_token(token).to_owned(),
                start: self.pos,
            }))
        } else {
            None
        };
        self.consume(b, node);
    }

    /// Consumes any run of spaces, newlines, and comments.
    fn comments(&mut self, b: &mut B) -> Result<(), Error> {
        loop {
            let token = self.peek()?;
            match token.kind {
                TokenKind::Space => self.consume_space(b),
                TokenKind::Newline => {
                    let node = self.opts.save_newlines.then(|| {
                        Node::Newline(Newline {
                            start: self.pos,
                            crlf: token.len == 2,
                        })
                    });
                    self.consume(b, node);
                }
                TokenKind::Comment => {
                    let node = self.opts.save_comments.then(|| {
                        Node::Comment(Comment {
                            raw: self.read_token(token).to_owned(),
                            start: self.pos,
                        })
                    });
                    self.consume(b, node);
                }
                _ => return Ok(()),
            }
        }
    }

    fn sigil(&mut self, kind: TokenKind, b: &mut B) -> Result<(), Error> {
        let token = self.peek()?;
        if token.kind != kind {
            return Err(err_expected_sigil(
                kind,
                token.kind,
                self.read_token(token),
                self.token_span(token),
            ));
        }
        let node = Node::Sigil(Sigil {
            raw: self.src.as_bytes()[self.pos as usize],
            start: self.pos,
        });
        self.consume(b, Some(node));
        Ok(())
    }

    fn try_sigil(&mut self, kind: TokenKind, b: &mut B) -> Result<bool, Error> {
        if self.peek()?.kind != kind {
            return Ok(false);
        }
        let node = Node::Sigil(Sigil {
            raw: self.src.as_bytes()[self.pos as usize],
            start: self.pos,
        });
        self.consume(b, Some(node));
        Ok(true)
    }

    fn try_keyword(&mut self, keyword: &'static str, b: &mut B) -> Result<bool, Error> {
        let token = self.peek()?;
        if token.kind != TokenKind::Ident || self.read_token(token) != keyword {
            return Ok(false);
        }
        let node = Node::Keyword(Keyword {
            raw: keyword,
            start: self.pos,
        });
        self.consume(b, Some(node));
        Ok(true)
    }

    fn ident(&mut self, b: &mut B) -> Result<usize, Error> {
        let token = self.peek()?;
        if token.kind != TokenKind::Ident {
            return Err(err_expected_ident(
                token.kind,
                self.read_token(token),
                self.token_span(token),
            ));
        }
        let node = Node::Ident(Ident {
            raw: self.read_token(token).to_owned(),
            start: self.pos,
        });
        self.consume(b, None);
        Ok(b.push(node))
    }

    fn int(&mut self, b: &mut B) -> Result<usize, Error> {
        let token = self.peek()?;
        match token.kind {
            TokenKind::IntLit
            | TokenKind::BinIntLit
            | TokenKind::OctIntLit
            | TokenKind::DecIntLit
            | TokenKind::HexIntLit => {}
            _ => {
                return Err(err_expected_int_lit(
                    token.kind,
                    self.read_token(token),
                    self.token_span(token),
                ))
            }
        }
        let node = IntLit::new(self.read_token(token), token.kind, self.pos)?;
        self.consume(b, None);
        Ok(b.push(Node::IntLit(node)))
    }

    fn text(&mut self, b: &mut B) -> Result<usize, Error> {
        let token = self.peek()?;
        if token.kind != TokenKind::TextLit {
            return Err(err_expected_text_lit(
                token.kind,
                self.read_token(token),
                self.token_span(token),
            ));
        }
        let node = TextLit::new(self.read_token(token), self.pos, token.flags)?;
        self.consume(b, None);
        Ok(b.push(Node::TextLit(node)))
    }

    // Schema structure {{{

    fn parse_schema(&mut self) -> Result<Schema, Error> {
        let mut b = self.begin();
        self.comments(&mut b)?;
        let namespace = self.parse_namespace()?;
        b.push(Node::Namespace(namespace));

        loop {
            let before = self.pos;
            self.comments(&mut b)?;
            self.try_parse_import(&mut b)?;
            if self.pos == before {
                break;
            }
        }

        loop {
            let before = self.pos;
            self.comments(&mut b)?;
            self.try_parse_export(&mut b)?;
            if self.pos == before {
                break;
            }
        }

        loop {
            let before = self.pos;
            self.comments(&mut b)?;
            self.try_parse_options(&mut b)?;
            if self.pos == before {
                break;
            }
        }

        loop {
            self.comments(&mut b)?;
            if self.peek()?.kind == TokenKind::Eof {
                break;
            }
            let decl = self.parse_declaration()?;
            b.push(decl);
        }

        Ok(Schema {
            span: self.span_from(b.start),
            children: b.children,
        })
    }

    fn parse_namespace(&mut self) -> Result<Namespace, Error> {
        let mut b = self.begin();
        if !self.try_keyword("namespace", &mut b)? {
            let token = self.peek()?;
            return Err(err_expected_keyword_namespace(
                token.kind,
                self.read_token(token),
                self.token_span(token),
            ));
        }
        self.space(&mut b)?;
        let namespace = self.text(&mut b)?;
        Ok(Namespace {
            span: self.span_from(b.start),
            children: b.children,
            namespace,
        })
    }

    fn try_parse_import(&mut self, parent: &mut B) -> Result<bool, Error> {
        let mut b = self.begin();
        if !self.try_keyword("import", &mut b)? {
            return Ok(false);
        }
        self.space(&mut b)?;
        let namespace = self.text(&mut b)?;
        self.space(&mut b)?;

        let mut import_as = None;
        let mut import_names = Vec::new();
        if self.try_keyword("as", &mut b)? {
            self.space(&mut b)?;
            import_as = Some(self.ident(&mut b)?);
        } else {
            self.sigil(TokenKind::OpenCurl, &mut b)?;
            self.comments(&mut b)?;
            loop {
                if self.try_sigil(TokenKind::CloseCurl, &mut b)? {
                    break;
                }
                import_names.push(self.ident(&mut b)?);
                self.comments(&mut b)?;
            }
        }

        let node = Import {
            span: self.span_from(b.start),
            children: b.children,
            namespace,
            import_as,
            import_names,
        };
        parent.push(Node::Import(node));
        Ok(true)
    }

    fn try_parse_export(&mut self, parent: &mut B) -> Result<bool, Error> {
        let mut b = self.begin();
        if !self.try_keyword("export", &mut b)? {
            return Ok(false);
        }
        self.space(&mut b)?;

        let mut export_as = None;
        let mut export_names = Vec::new();
        if self.peek()?.kind == TokenKind::Ident {
            let name = self.parse_export_name_into(&mut b)?;
            self.space(&mut b)?;
            if !self.try_keyword("as", &mut b)? {
                let token = self.peek()?;
                return Err(err_expected_keyword_as(
                    token.kind,
                    self.read_token(token),
                    self.token_span(token),
                ));
            }
            self.space(&mut b)?;
            let alias = self.ident(&mut b)?;
            export_as = Some((name, alias));
        } else {
            self.sigil(TokenKind::OpenCurl, &mut b)?;
            self.comments(&mut b)?;
            loop {
                if self.try_sigil(TokenKind::CloseCurl, &mut b)? {
                    break;
                }
                export_names.push(self.parse_export_name_into(&mut b)?);
                self.comments(&mut b)?;
            }
        }

        let node = Export {
            span: self.span_from(b.start),
            children: b.children,
            export_as,
            export_names,
        };
        parent.push(Node::Export(node));
        Ok(true)
    }

    // }}}

    // Names {{{

    fn parse_type_name_into(&mut self, parent: &mut B) -> Result<usize, Error> {
        let token = self.peek()?;
        if token.kind != TokenKind::Ident {
            return Err(err_expected_type_name(
                token.kind,
                self.read_token(token),
                self.token_span(token),
            ));
        }
        let mut b = self.begin();
        let mut name = self.ident(&mut b)?;
        let mut scope = None;
        if self.try_sigil(TokenKind::Dot, &mut b)? {
            scope = Some(name);
            name = self.ident(&mut b)?;
        }
        let node = TypeName {
            span: self.span_from(b.start),
            children: b.children,
            scope,
            name,
        };
        Ok(parent.push(Node::TypeName(node)))
    }

    fn parse_value_name_into(&mut self, parent: &mut B) -> Result<usize, Error> {
        let token = self.peek()?;
        if token.kind != TokenKind::Ident {
            return Err(err_expected_value_name(
                token.kind,
                self.read_token(token),
                self.token_span(token),
            ));
        }
        let mut b = self.begin();
        let mut name = self.ident(&mut b)?;
        let mut scope = None;
        if self.try_sigil(TokenKind::Dot, &mut b)? {
            scope = Some(name);
            name = self.ident(&mut b)?;
        }
        let node = ValueName {
            span: self.span_from(b.start),
            children: b.children,
            scope,
            name,
        };
        Ok(parent.push(Node::ValueName(node)))
    }

    fn parse_export_name_into(&mut self, parent: &mut B) -> Result<usize, Error> {
        let token = self.peek()?;
        if token.kind != TokenKind::Ident {
            return Err(err_expected_export_name(
                token.kind,
                self.read_token(token),
                self.token_span(token),
            ));
        }
        let mut b = self.begin();
        let mut name = self.ident(&mut b)?;
        let mut scope = None;
        if self.try_sigil(TokenKind::Dot, &mut b)? {
            scope = Some(name);
            name = self.ident(&mut b)?;
        }
        let node = ExportName {
            span: self.span_from(b.start),
            children: b.children,
            scope,
            name,
        };
        Ok(parent.push(Node::ExportName(node)))
    }

    // }}}

    // Options and decorators {{{

    fn try_parse_options(&mut self, parent: &mut B) -> Result<Option<usize>, Error> {
        let mut b = self.begin();
        if !self.try_keyword("options", &mut b)? {
            return Ok(None);
        }
        self.space(&mut b)?;

        let mut schema = None;
        if self.try_sigil(TokenKind::Colon, &mut b)? {
            self.space(&mut b)?;
            schema = Some(self.parse_type_name_into(&mut b)?);
            self.space(&mut b)?;
        }

        let mut options = Vec::new();
        self.sigil(TokenKind::OpenCurl, &mut b)?;
        self.comments(&mut b)?;
        loop {
            if self.try_sigil(TokenKind::CloseCurl, &mut b)? {
                break;
            }
            options.push(self.parse_options_option_into(&mut b)?);
            self.comments(&mut b)?;
        }

        let node = Options {
            span: self.span_from(b.start),
            children: b.children,
            schema,
            options,
        };
        Ok(Some(parent.push(Node::Options(node))))
    }

    fn parse_options_option_into(&mut self, parent: &mut B) -> Result<usize, Error> {
        let mut b = self.begin();
        let name = self.parse_option_name_into(&mut b)?;
        self.space(&mut b)?;
        self.sigil(TokenKind::Eq, &mut b)?;
        self.space(&mut b)?;
        let value = Some(self.parse_option_value(&mut b)?);

        let node = OptionPair {
            span: self.span_from(b.start),
            children: b.children,
            name,
            value,
        };
        Ok(parent.push(Node::OptionPair(node)))
    }

    fn try_parse_option(&mut self, parent: &mut B) -> Result<Option<usize>, Error> {
        let mut b = self.begin();
        if !self.try_sigil(TokenKind::OpenCurl, &mut b)? {
            return Ok(None);
        }
        self.space(&mut b)?;
        let name = self.parse_option_name_into(&mut b)?;
        self.space(&mut b)?;

        let mut value = None;
        if self.try_sigil(TokenKind::Eq, &mut b)? {
            self.space(&mut b)?;
            value = Some(self.parse_option_value(&mut b)?);
        }

        self.space(&mut b)?;
        self.sigil(TokenKind::CloseCurl, &mut b)?;

        let node = OptionPair {
            span: self.span_from(b.start),
            children: b.children,
            name,
            value,
        };
        Ok(Some(parent.push(Node::OptionPair(node))))
    }

    fn parse_option_name_into(&mut self, parent: &mut B) -> Result<usize, Error> {
        let token = self.peek()?;
        if token.kind != TokenKind::Ident {
            return Err(err_expected_option_name(
                token.kind,
                self.read_token(token),
                self.token_span(token),
            ));
        }
        let mut b = self.begin();
        self.ident(&mut b)?;
        while self.try_sigil(TokenKind::Dot, &mut b)? {
            self.ident(&mut b)?;
        }
        let node = OptionName {
            span: self.span_from(b.start),
            children: b.children,
        };
        Ok(parent.push(Node::OptionName(node)))
    }

    fn parse_value(&mut self, b: &mut B) -> Result<Option<usize>, Error> {
        let token = self.peek()?;
        match token.kind {
            TokenKind::IntLit
            | TokenKind::BinIntLit
            | TokenKind::OctIntLit
            | TokenKind::DecIntLit
            | TokenKind::HexIntLit => Ok(Some(self.int(b)?)),
            TokenKind::TextLit => Ok(Some(self.text(b)?)),
            TokenKind::Dot => Ok(Some(self.parse_enum_ref_into(b)?)),
            TokenKind::Ident => Ok(Some(self.parse_value_name_into(b)?)),
            _ => Ok(None),
        }
    }

    fn parse_const_value(&mut self, b: &mut B) -> Result<usize, Error> {
        if let Some(idx) = self.parse_value(b)? {
            return Ok(idx);
        }
        let token = self.peek()?;
        Err(err_expected_const_value(
            token.kind,
            self.read_token(token),
            self.token_span(token),
        ))
    }

    fn parse_option_value(&mut self, b: &mut B) -> Result<usize, Error> {
        if let Some(idx) = self.parse_value(b)? {
            return Ok(idx);
        }
        let token = self.peek()?;
        Err(err_expected_option_value(
            token.kind,
            self.read_token(token),
            self.token_span(token),
        ))
    }

    fn parse_enum_ref_into(&mut self, parent: &mut B) -> Result<usize, Error> {
        let mut b = self.begin();
        self.sigil(TokenKind::Dot, &mut b)?;
        let name = self.ident(&mut b)?;
        let node = EnumRef {
            span: self.span_from(b.start),
            children: b.children,
            name,
        };
        Ok(parent.push(Node::EnumRef(node)))
    }

    fn try_parse_decorator(&mut self, parent: &mut B) -> Result<Option<usize>, Error> {
        let mut b = self.begin();
        if !self.try_sigil(TokenKind::At, &mut b)? {
            return Ok(None);
        }

        let value = if let Some(idx) = self.try_parse_options(&mut b)? {
            idx
        } else if let Some(idx) = self.try_parse_option(&mut b)? {
            idx
        } else {
            let token = self.peek()?;
            return Err(err_unknown_decorator(
                self.read_token(token),
                self.token_span(token),
            ));
        };

        let node = Decorator {
            span: self.span_from(b.start),
            children: b.children,
            value,
        };
        Ok(Some(parent.push(Node::Decorator(node))))
    }

    /// Parses any number of decorators (with their surrounding trivia) into
    /// `b`, recording their child indices.
    fn parse_decorators(&mut self, b: &mut B, decorators: &mut Vec<usize>) -> Result<(), Error> {
        loop {
            let before = self.pos;
            if let Some(idx) = self.try_parse_decorator(b)? {
                decorators.push(idx);
                self.comments(b)?;
            }
            if self.pos == before {
                return Ok(());
            }
        }
    }

    // }}}

    // Declarations {{{

    fn parse_declaration(&mut self) -> Result<Node, Error> {
        let mut b = self.begin();
        let mut decorators = Vec::new();
        self.parse_decorators(&mut b, &mut decorators)?;

        if self.try_keyword("const", &mut b)? {
            return Ok(Node::Const(self.parse_const_body(b, decorators)?));
        }
        if self.try_keyword("enum", &mut b)? {
            return Ok(Node::Enum(self.parse_enum_body(b, decorators)?));
        }
        if self.try_keyword("struct", &mut b)? {
            return Ok(Node::Struct(self.parse_struct_body(b, decorators)?));
        }
        if self.try_keyword("message", &mut b)? {
            return Ok(Node::Message(self.parse_message_body(b, decorators)?));
        }
        if self.try_keyword("union", &mut b)? {
            return Ok(Node::Union(self.parse_union_body(b, decorators)?));
        }
        if self.try_keyword("protocol", &mut b)? {
            return Ok(Node::Protocol(self.parse_protocol_body(b, decorators)?));
        }

        let token = self.peek()?;
        let text = self.read_token(token);
        if token.kind == TokenKind::Ident {
            Err(err_unknown_declaration(text, self.token_span(token)))
        } else {
            Err(err_expected_declaration(
                token.kind,
                text,
                self.token_span(token),
            ))
        }
    }

    fn parse_const_body(&mut self, mut b: B, decorators: Vec<usize>) -> Result<Const, Error> {
        self.space(&mut b)?;
        let name = self.ident(&mut b)?;
        self.space(&mut b)?;
        self.sigil(TokenKind::Colon, &mut b)?;
        self.space(&mut b)?;
        let type_name = self.parse_type_name_into(&mut b)?;
        self.space(&mut b)?;
        self.sigil(TokenKind::Eq, &mut b)?;
        self.space(&mut b)?;
        let value = self.parse_const_value(&mut b)?;

        Ok(Const {
            span: self.span_from(b.start),
            children: b.children,
            name,
            type_name,
            value,
            decorators,
        })
    }

    fn parse_enum_body(&mut self, mut b: B, decorators: Vec<usize>) -> Result<Enum, Error> {
        self.space(&mut b)?;
        let name = self.ident(&mut b)?;
        self.space(&mut b)?;
        self.sigil(TokenKind::Colon, &mut b)?;
        self.space(&mut b)?;
        let type_ = self.ident(&mut b)?;
        self.space(&mut b)?;

        let mut items = Vec::new();
        self.sigil(TokenKind::OpenCurl, &mut b)?;
        self.comments(&mut b)?;
        loop {
            if self.try_sigil(TokenKind::CloseCurl, &mut b)? {
                break;
            }
            let item = self.parse_enum_item()?;
            items.push(b.push(Node::EnumItem(item)));
            self.comments(&mut b)?;
        }

        Ok(Enum {
            span: self.span_from(b.start),
            children: b.children,
            name,
            type_,
            items,
            decorators,
        })
    }

    fn parse_enum_item(&mut self) -> Result<EnumItem, Error> {
        let mut b = self.begin();
        let mut decorators = Vec::new();
        self.parse_decorators(&mut b, &mut decorators)?;

        let name = self.ident(&mut b)?;
        self.space(&mut b)?;
        self.sigil(TokenKind::Eq, &mut b)?;
        self.space(&mut b)?;

        let value = match self.peek()?.kind {
            TokenKind::Dot => self.parse_enum_ref_into(&mut b)?,
            TokenKind::Ident => self.parse_value_name_into(&mut b)?,
            _ => self.int(&mut b)?,
        };

        Ok(EnumItem {
            span: self.span_from(b.start),
            children: b.children,
            name,
            value,
            decorators,
        })
    }

    fn parse_struct_body(&mut self, mut b: B, decorators: Vec<usize>) -> Result<Struct, Error> {
        self.space(&mut b)?;
        let name = self.ident(&mut b)?;
        self.space(&mut b)?;

        let mut fields = Vec::new();
        self.sigil(TokenKind::OpenCurl, &mut b)?;
        self.comments(&mut b)?;
        loop {
            if self.try_sigil(TokenKind::CloseCurl, &mut b)? {
                break;
            }
            let field = self.parse_struct_field()?;
            fields.push(b.push(Node::StructField(field)));
            self.comments(&mut b)?;
        }

        Ok(Struct {
            span: self.span_from(b.start),
            children: b.children,
            name,
            fields,
            decorators,
        })
    }

    fn parse_struct_field(&mut self) -> Result<StructField, Error> {
        let mut b = self.begin();
        let mut decorators = Vec::new();
        self.parse_decorators(&mut b, &mut decorators)?;

        let name = self.ident(&mut b)?;
        self.space(&mut b)?;
        self.sigil(TokenKind::Colon, &mut b)?;
        self.space(&mut b)?;
        let field_type = self.parse_field_type_into(&mut b)?;

        Ok(StructField {
            span: self.span_from(b.start),
            children: b.children,
            name,
            field_type,
            decorators,
        })
    }

    fn parse_message_body(&mut self, mut b: B, decorators: Vec<usize>) -> Result<Message, Error> {
        self.space(&mut b)?;
        let name = self.ident(&mut b)?;
        self.space(&mut b)?;

        let mut fields = Vec::new();
        self.sigil(TokenKind::OpenCurl, &mut b)?;
        self.comments(&mut b)?;
        loop {
            if self.try_sigil(TokenKind::CloseCurl, &mut b)? {
                break;
            }
            let field = self.parse_message_field()?;
            fields.push(b.push(Node::MessageField(field)));
            self.comments(&mut b)?;
        }

        Ok(Message {
            span: self.span_from(b.start),
            children: b.children,
            name,
            fields,
            decorators,
        })
    }

    fn parse_message_field(&mut self) -> Result<MessageField, Error> {
        let mut b = self.begin();
        let mut decorators = Vec::new();
        self.parse_decorators(&mut b, &mut decorators)?;

        let name = self.ident(&mut b)?;
        self.space(&mut b)?;
        let tag = self.parse_field_tag_into(&mut b)?;
        self.space(&mut b)?;
        self.sigil(TokenKind::Colon, &mut b)?;
        self.space(&mut b)?;
        let field_type = self.parse_field_type_into(&mut b)?;

        Ok(MessageField {
            span: self.span_from(b.start),
            children: b.children,
            name,
            tag,
            field_type,
            decorators,
        })
    }

    fn parse_union_body(&mut self, mut b: B, decorators: Vec<usize>) -> Result<Union, Error> {
        self.space(&mut b)?;
        let name = self.ident(&mut b)?;
        self.space(&mut b)?;

        let mut fields = Vec::new();
        self.sigil(TokenKind::OpenCurl, &mut b)?;
        self.comments(&mut b)?;
        loop {
            if self.try_sigil(TokenKind::CloseCurl, &mut b)? {
                break;
            }
            let field = self.parse_union_field()?;
            fields.push(b.push(Node::UnionField(field)));
            self.comments(&mut b)?;
        }

        Ok(Union {
            span: self.span_from(b.start),
            children: b.children,
            name,
            fields,
            decorators,
        })
    }

    fn parse_union_field(&mut self) -> Result<UnionField, Error> {
        let mut b = self.begin();
        let mut decorators = Vec::new();
        self.parse_decorators(&mut b, &mut decorators)?;

        let name = self.ident(&mut b)?;
        self.space(&mut b)?;
        let tag = self.parse_field_tag_into(&mut b)?;
        self.space(&mut b)?;
        self.sigil(TokenKind::Colon, &mut b)?;
        self.space(&mut b)?;
        let field_type = self.parse_field_type_into(&mut b)?;

        Ok(UnionField {
            span: self.span_from(b.start),
            children: b.children,
            name,
            tag,
            field_type,
            decorators,
        })
    }

    fn parse_field_tag_into(&mut self, parent: &mut B) -> Result<usize, Error> {
        let mut b = self.begin();
        self.sigil(TokenKind::At, &mut b)?;
        self.space(&mut b)?;
        let value = self.int(&mut b)?;
        let node = Tag {
            span: self.span_from(b.start),
            children: b.children,
            value,
        };
        Ok(parent.push(Node::Tag(node)))
    }

    fn try_parse_protocol_tag(&mut self, parent: &mut B) -> Result<Option<usize>, Error> {
        let mut b = self.begin();
        if !self.try_sigil(TokenKind::At, &mut b)? {
            return Ok(None);
        }
        self.space(&mut b)?;
        let value = self.int(&mut b)?;
        let node = Tag {
            span: self.span_from(b.start),
            children: b.children,
            value,
        };
        Ok(Some(parent.push(Node::Tag(node))))
    }

    fn parse_field_type_into(&mut self, parent: &mut B) -> Result<usize, Error> {
        let mut b = self.begin();
        let type_name = self.parse_type_name_into(&mut b)?;

        let mut is_array = false;
        let mut array_len = None;
        if self.try_sigil(TokenKind::OpenSquare, &mut b)? {
            is_array = true;
            self.space(&mut b)?;
            if !self.try_sigil(TokenKind::CloseSquare, &mut b)? {
                array_len = Some(self.int(&mut b)?);
                self.space(&mut b)?;
                self.sigil(TokenKind::CloseSquare, &mut b)?;
            }
        }

        let node = FieldType {
            span: self.span_from(b.start),
            children: b.children,
            type_name,
            is_array,
            array_len,
        };
        Ok(parent.push(Node::FieldType(node)))
    }

    fn parse_protocol_body(&mut self, mut b: B, decorators: Vec<usize>) -> Result<Protocol, Error> {
        self.space(&mut b)?;
        let name = self.ident(&mut b)?;
        self.space(&mut b)?;

        let mut rpcs = Vec::new();
        let mut events = Vec::new();
        self.sigil(TokenKind::OpenCurl, &mut b)?;
        self.comments(&mut b)?;
        loop {
            if self.try_sigil(TokenKind::CloseCurl, &mut b)? {
                break;
            }

            let mut ib = self.begin();
            let mut item_decorators = Vec::new();
            self.parse_decorators(&mut ib, &mut item_decorators)?;

            if self.try_keyword("rpc", &mut ib)? {
                let rpc = self.parse_protocol_rpc_body(ib, item_decorators)?;
                rpcs.push(b.push(Node::ProtocolRpc(rpc)));
            } else if self.try_keyword("event", &mut ib)? {
                let event = self.parse_protocol_event_body(ib, item_decorators)?;
                events.push(b.push(Node::ProtocolEvent(event)));
            } else {
                let token = self.peek()?;
                return Err(err_expected_protocol_item(
                    token.kind,
                    self.read_token(token),
                    self.token_span(token),
                ));
            }

            self.comments(&mut b)?;
        }

        Ok(Protocol {
            span: self.span_from(b.start),
            children: b.children,
            name,
            rpcs,
            events,
            decorators,
        })
    }

    fn parse_protocol_rpc_body(
        &mut self,
        mut b: B,
        decorators: Vec<usize>,
    ) -> Result<ProtocolRpc, Error> {
        self.space(&mut b)?;
        let name = self.ident(&mut b)?;
        self.space(&mut b)?;
        let tag = self.try_parse_protocol_tag(&mut b)?;
        self.space(&mut b)?;

        self.sigil(TokenKind::OpenParen, &mut b)?;
        self.space(&mut b)?;
        let request_type = self.parse_type_name_into(&mut b)?;
        self.space(&mut b)?;
        let mut request_is_stream = false;
        if self.try_keyword("stream", &mut b)? {
            request_is_stream = true;
            self.space(&mut b)?;
        }
        self.sigil(TokenKind::CloseParen, &mut b)?;

        self.space(&mut b)?;
        self.sigil(TokenKind::Colon, &mut b)?;
        self.space(&mut b)?;

        let mut response_type = None;
        let mut response_is_stream = false;
        if self.try_sigil(TokenKind::OpenParen, &mut b)? {
            self.space(&mut b)?;
            if self.peek()?.kind == TokenKind::Ident {
                response_type = Some(self.parse_type_name_into(&mut b)?);
                self.space(&mut b)?;
                if self.try_keyword("stream", &mut b)? {
                    response_is_stream = true;
                    self.space(&mut b)?;
                }
            }
            self.sigil(TokenKind::CloseParen, &mut b)?;
        } else {
            response_type = Some(self.parse_type_name_into(&mut b)?);
        }

        Ok(ProtocolRpc {
            span: self.span_from(b.start),
            children: b.children,
            name,
            tag,
            request_type,
            request_is_stream,
            response_type,
            response_is_stream,
            decorators,
        })
    }

    fn parse_protocol_event_body(
        &mut self,
        mut b: B,
        decorators: Vec<usize>,
    ) -> Result<ProtocolEvent, Error> {
        self.space(&mut b)?;
        let name = self.ident(&mut b)?;
        self.space(&mut b)?;
        let tag = self.try_parse_protocol_tag(&mut b)?;
        self.space(&mut b)?;
        self.sigil(TokenKind::Colon, &mut b)?;
        self.space(&mut b)?;
        let payload_type = self.parse_type_name_into(&mut b)?;

        Ok(ProtocolEvent {
            span: self.span_from(b.start),
            children: b.children,
            name,
            tag,
            payload_type,
            decorators,
        })
    }

    // }}}
}
