use super::errors::{
    err_forbidden_control_character, err_ident_invalid, err_int_lit_invalid, err_invalid_utf8,
    err_source_too_long, err_text_lit_contains_newline, err_text_lit_unterminated,
    err_token_too_long, err_unexpected_character, Error,
};
use std::fmt;

pub(crate) const MAX_SRC_LEN: usize = 0x7FFF_FFFF;
pub(crate) const MAX_TOKEN_LEN: usize = u16::MAX as usize;

pub(crate) const TOKEN_FLAG_TEXT_HAS_NO_ESCAPES: u8 = 0x01;

/// One lexed token: a kind and a byte length. The lexer never allocates; the
/// caller advances its own cursor by `len` and slices the source to recover
/// the token text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub len: u16,
    pub kind: TokenKind,
    pub(crate) flags: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Eof,

    Space,
    Newline,
    Comment,

    At,
    Colon,
    Dot,
    Eq,

    OpenCurl,
    CloseCurl,
    OpenParen,
    CloseParen,
    OpenSquare,
    CloseSquare,

    IntLit,
    BinIntLit,
    OctIntLit,
    DecIntLit,
    HexIntLit,

    TextLit,

    Ident,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Eof => "EOF",
            TokenKind::Space => "SPACE",
            TokenKind::Newline => "NEWLINE",
            TokenKind::Comment => "COMMENT",
            TokenKind::At => "AT",
            TokenKind::Colon => "COLON",
            TokenKind::Dot => "DOT",
            TokenKind::Eq => "EQ",
            TokenKind::OpenCurl => "OPEN_CURL",
            TokenKind::CloseCurl => "CLOSE_CURL",
            TokenKind::OpenParen => "OPEN_PAREN",
            TokenKind::CloseParen => "CLOSE_PAREN",
            TokenKind::OpenSquare => "OPEN_SQUARE",
            TokenKind::CloseSquare => "CLOSE_SQUARE",
            TokenKind::IntLit => "INT_LIT",
            TokenKind::BinIntLit => "BIN_INT_LIT",
            TokenKind::OctIntLit => "OCT_INT_LIT",
            TokenKind::DecIntLit => "DEC_INT_LIT",
            TokenKind::HexIntLit => "HEX_INT_LIT",
            TokenKind::TextLit => "TEXT_LIT",
            TokenKind::Ident => "IDENT",
        };
        f.write_str(name)
    }
}

/// The lexer: an iterator over the tokens of one source file.
pub struct Tokens<'a> {
    src: &'a str,
    offset: u32,
}

impl<'a> Tokens<'a> {
    /// Validates the source size and encoding, then wraps it. The source must
    /// be UTF-8 and at most `2^31 - 1` bytes.
    pub fn new(src: &'a [u8]) -> Result<Tokens<'a>, Error> {
        if src.len() > MAX_SRC_LEN {
            return Err(err_source_too_long(src.len()));
        }
        let src = std::str::from_utf8(src).map_err(|e| err_invalid_utf8(e.valid_up_to()))?;
        Ok(Tokens { src, offset: 0 })
    }

    /// Lexes the next token. At end of input an `Eof` token of length zero is
    /// returned indefinitely.
    pub fn next(&mut self) -> Result<Token, Error> {
        let bytes = self.src.as_bytes();
        if bytes.is_empty() {
            return Ok(Token {
                len: 0,
                kind: TokenKind::Eof,
                flags: 0,
            });
        }

        let c = bytes[0];
        let kind = match c {
            b'\t' | b' ' => return self.next_space(),
            b'\n' => TokenKind::Newline,
            b'@' => TokenKind::At,
            b':' => TokenKind::Colon,
            b'.' => TokenKind::Dot,
            b'=' => TokenKind::Eq,
            b'{' => TokenKind::OpenCurl,
            b'}' => TokenKind::CloseCurl,
            b'(' => TokenKind::OpenParen,
            b')' => TokenKind::CloseParen,
            b'[' => TokenKind::OpenSquare,
            b']' => TokenKind::CloseSquare,
            b'#' => return self.next_comment(),
            b'"' => return self.next_text_lit(),
            b'\r' => {
                if bytes.len() < 2 || bytes[1] != b'\n' {
                    return Err(err_forbidden_control_character(self.offset, c));
                }
                self.advance(2);
                return Ok(Token {
                    len: 2,
                    kind: TokenKind::Newline,
                    flags: 0,
                });
            }
            b'0'..=b'9' | b'-' => return self.next_num_lit(),
            b'A'..=b'Z' | b'a'..=b'z' => return self.next_ident(),
            _ => {
                let Some(r) = self.src.chars().next() else {
                    unreachable!()
                };
                if r == '\u{00A0}' {
                    return self.next_space();
                }
                if (r as u32) < 0x20 || r as u32 == 0x7F {
                    return Err(err_forbidden_control_character(self.offset, c));
                }
                return Err(err_unexpected_character(self.offset, r));
            }
        };

        self.advance(1);
        Ok(Token {
            len: 1,
            kind,
            flags: 0,
        })
    }

    fn advance(&mut self, len: usize) {
        self.offset += len as u32;
        self.src = &self.src[len..];
    }

    fn emit(&mut self, kind: TokenKind, len: usize, flags: u8) -> Result<Token, Error> {
        if len > MAX_TOKEN_LEN {
            return Err(err_token_too_long(self.offset, len));
        }
        self.advance(len);
        Ok(Token {
            len: len as u16,
            kind,
            flags,
        })
    }

    fn next_space(&mut self) -> Result<Token, Error> {
        let bytes = self.src.as_bytes();
        let mut len = 0;
        while len < bytes.len() {
            match bytes[len] {
                b' ' | b'\t' => len += 1,
                // NO-BREAK SPACE, encoded as C2 A0.
                0xC2 if bytes.get(len + 1) == Some(&0xA0) => len += 2,
                _ => break,
            }
        }
        self.emit(TokenKind::Space, len, 0)
    }

    fn next_comment(&mut self) -> Result<Token, Error> {
        let bytes = self.src.as_bytes();
        let len = bytes
            .iter()
            .position(|&c| c == b'\n' || c == b'\r')
            .unwrap_or(bytes.len());
        self.emit(TokenKind::Comment, len, 0)
    }

    fn next_num_lit(&mut self) -> Result<Token, Error> {
        let bytes = self.src.as_bytes();
        let mut token_len = 0usize;
        let mut num = bytes;

        let neg = num[0] == b'-';
        if neg {
            if num.len() == 1 {
                return Err(err_int_lit_invalid(self.offset, &self.src[..1]));
            }
            token_len += 1;
            num = &num[1..];
        }

        let mut kind = TokenKind::IntLit;
        let mut invalid = false;
        if num[0] == b'0' {
            if num.len() == 1 {
                if neg {
                    return Err(err_int_lit_invalid(self.offset, &self.src[..2]));
                }
                return self.emit(TokenKind::IntLit, 1, 0);
            }
            match num[1] {
                b'0'..=b'9' => invalid = true,
                b'b' => kind = TokenKind::BinIntLit,
                b'o' => kind = TokenKind::OctIntLit,
                b'd' => kind = TokenKind::DecIntLit,
                b'x' => kind = TokenKind::HexIntLit,
                _ => invalid = true,
            }
            if kind != TokenKind::IntLit {
                token_len += 2;
                num = &num[2..];
            }
        }

        let mut scan_len = num.len();
        for (ii, &c) in num.iter().enumerate() {
            let (digit, letter) = match kind {
                TokenKind::IntLit | TokenKind::DecIntLit => (
                    c.is_ascii_digit() || c == b'_',
                    c.is_ascii_alphabetic(),
                ),
                TokenKind::HexIntLit => (
                    c.is_ascii_hexdigit() || c == b'_',
                    c.is_ascii_alphabetic(),
                ),
                TokenKind::OctIntLit => (
                    (b'0'..=b'7').contains(&c) || c == b'_',
                    c == b'8' || c == b'9' || c.is_ascii_alphabetic(),
                ),
                TokenKind::BinIntLit => (
                    c == b'0' || c == b'1' || c == b'_',
                    (b'2'..=b'9').contains(&c) || c.is_ascii_alphabetic(),
                ),
                _ => unreachable!(),
            };
            if digit {
                continue;
            }
            if letter {
                invalid = true;
                continue;
            }
            scan_len = ii;
            break;
        }
        let num = &num[..scan_len];

        if num.is_empty() {
            invalid = true;
        } else {
            token_len += num.len();
            if token_len == 1 && num[0] == b'0' {
                invalid = false;
            }
        }
        if invalid {
            return Err(err_int_lit_invalid(self.offset, &self.src[..token_len]));
        }
        self.emit(kind, token_len, 0)
    }

    fn next_text_lit(&mut self) -> Result<Token, Error> {
        let bytes = self.src.as_bytes();
        let mut escaped = false;
        let mut has_escapes = false;
        let mut token_len = None;
        for (ii, &c) in bytes.iter().enumerate() {
            if ii == 0 {
                continue;
            }
            if escaped {
                escaped = false;
                continue;
            }
            if c == b'"' {
                token_len = Some(ii + 1);
                break;
            }
            if (c <= 0x1F || c == 0x7F) && c != 0x09 {
                let off = self.offset + ii as u32;
                if c == 0x0A {
                    return Err(err_text_lit_contains_newline(off, 1));
                }
                if c == 0x0D && bytes.get(ii + 1) == Some(&0x0A) {
                    return Err(err_text_lit_contains_newline(off, 2));
                }
                return Err(err_forbidden_control_character(off, c));
            }
            if c == b'\\' {
                escaped = true;
                has_escapes = true;
            }
        }
        let Some(token_len) = token_len else {
            return Err(err_text_lit_unterminated(self.offset, bytes.len() as u32));
        };

        let mut flags = 0;
        if !has_escapes {
            flags |= TOKEN_FLAG_TEXT_HAS_NO_ESCAPES;
        }
        self.emit(TokenKind::TextLit, token_len, flags)
    }

    fn next_ident(&mut self) -> Result<Token, Error> {
        let bytes = self.src.as_bytes();
        let mut underscore = false;
        let mut invalid = false;
        let mut len = bytes.len();
        for (ii, &c) in bytes.iter().enumerate() {
            if ii == 0 {
                continue;
            }
            if c == b'_' {
                if underscore {
                    invalid = true;
                }
                underscore = true;
                continue;
            }
            if c.is_ascii_alphanumeric() {
                underscore = false;
                continue;
            }
            len = ii;
            break;
        }

        if underscore || invalid {
            return Err(err_ident_invalid(self.offset, &self.src[..len]));
        }
        self.emit(TokenKind::Ident, len, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(src: &str) -> Result<Vec<(TokenKind, String)>, Error> {
        let mut tokens = Tokens::new(src.as_bytes())?;
        let mut out = Vec::new();
        let mut rest = src;
        loop {
            let token = tokens.next()?;
            if token.kind == TokenKind::Eof {
                return Ok(out);
            }
            out.push((token.kind, rest[..token.len as usize].to_owned()));
            rest = &rest[token.len as usize..];
        }
    }

    fn lex_err(src: &str) -> Error {
        lex(src).expect_err("expected a lex error")
    }

    #[test]
    fn sigils_and_spaces() {
        let got = lex("@ :\u{00A0}.={}()[]").unwrap();
        let kinds: Vec<TokenKind> = got.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::At,
                TokenKind::Space,
                TokenKind::Colon,
                TokenKind::Space,
                TokenKind::Dot,
                TokenKind::Eq,
                TokenKind::OpenCurl,
                TokenKind::CloseCurl,
                TokenKind::OpenParen,
                TokenKind::CloseParen,
                TokenKind::OpenSquare,
                TokenKind::CloseSquare,
            ]
        );
        assert_eq!(got[3].1, "\u{00A0}");
    }

    #[test]
    fn newlines() {
        let got = lex("\n\r\n").unwrap();
        assert_eq!(
            got,
            vec![
                (TokenKind::Newline, "\n".to_owned()),
                (TokenKind::Newline, "\r\n".to_owned()),
            ]
        );
        assert_eq!(lex_err("\rx").code(), 1003);
    }

    #[test]
    fn comments() {
        let got = lex("# plain\n## doc").unwrap();
        assert_eq!(got[0], (TokenKind::Comment, "# plain".to_owned()));
        assert_eq!(got[2], (TokenKind::Comment, "## doc".to_owned()));
    }

    #[test]
    fn int_literals() {
        let got = lex("0 -12 0b1_0 0o17 0d9 0xFF_e0").unwrap();
        let ints: Vec<(TokenKind, String)> = got
            .into_iter()
            .filter(|(k, _)| *k != TokenKind::Space)
            .collect();
        assert_eq!(
            ints,
            vec![
                (TokenKind::IntLit, "0".to_owned()),
                (TokenKind::IntLit, "-12".to_owned()),
                (TokenKind::BinIntLit, "0b1_0".to_owned()),
                (TokenKind::OctIntLit, "0o17".to_owned()),
                (TokenKind::DecIntLit, "0d9".to_owned()),
                (TokenKind::HexIntLit, "0xFF_e0".to_owned()),
            ]
        );
    }

    #[test]
    fn invalid_int_literals() {
        for src in ["-", "-0", "01", "12abc", "0b2", "0o8", "0x", "0z"] {
            assert_eq!(lex_err(src).code(), 1005, "source {:?}", src);
        }
    }

    #[test]
    fn idents() {
        let got = lex("abc a1_b2").unwrap();
        assert_eq!(got[0], (TokenKind::Ident, "abc".to_owned()));
        assert_eq!(got[2], (TokenKind::Ident, "a1_b2".to_owned()));

        for src in ["a__b", "trailing_", "x_"] {
            assert_eq!(lex_err(src).code(), 1008, "source {:?}", src);
        }
    }

    #[test]
    fn text_literals() {
        let got = lex(r#""" "a\tb" "\u{1F355}""#).unwrap();
        let texts: Vec<String> = got
            .into_iter()
            .filter(|(k, _)| *k == TokenKind::TextLit)
            .map(|(_, raw)| raw)
            .collect();
        assert_eq!(texts, vec![r#""""#, r#""a\tb""#, r#""\u{1F355}""#]);

        assert_eq!(lex_err("\"abc").code(), 1006);
        assert_eq!(lex_err("\"a\nb\"").code(), 1007);
        assert_eq!(lex_err("\"a\x01b\"").code(), 1003);
    }

    #[test]
    fn unexpected_characters() {
        let err = lex_err("é");
        assert_eq!(err.code(), 1002);
        assert_eq!(err.span().len(), 2);

        assert_eq!(lex_err("\x01").code(), 1003);
    }

    #[test]
    fn lex_round_trip() {
        let src = "namespace \"x\"\nmessage M {\n  a @1 : u32 # tail\n}\n";
        let mut tokens = Tokens::new(src.as_bytes()).unwrap();
        let mut rebuilt = String::new();
        let mut rest = src;
        loop {
            let token = tokens.next().unwrap();
            if token.kind == TokenKind::Eof {
                break;
            }
            rebuilt.push_str(&rest[..token.len as usize]);
            rest = &rest[token.len as usize..];
        }
        assert_eq!(rebuilt, src);
    }
}
