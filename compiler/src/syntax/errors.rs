use super::nodes::Span;
use super::tokens::{TokenKind, MAX_SRC_LEN, MAX_TOKEN_LEN};
use crate::quote;
use serde::Serialize;

/// A fatal lexical (E1xxx) or syntax (E2xxx) error. Lexing and parsing stop
/// at the first one.
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

pub(crate) fn err_source_too_long(src_len: usize) -> Error {
    Error {
        code: 1000,
        message: format!(
            "Source file size ({} bytes) exceeds maximum ({} bytes)",
            src_len, MAX_SRC_LEN,
        ),
        span: Span::new(0, u32::try_from(src_len).unwrap_or(u32::MAX)),
    }
}

pub(crate) fn err_invalid_utf8(valid_up_to: usize) -> Error {
    Error {
        code: 1001,
        message: "Source file contains invalid UTF-8".to_owned(),
        span: Span::new(valid_up_to as u32, 1),
    }
}

pub(crate) fn err_unexpected_character(start: u32, r: char) -> Error {
    Error {
        code: 1002,
        message: format!("Unexpected character '{}' (U+{:04X})", r, r as u32),
        span: Span::new(start, r.len_utf8() as u32),
    }
}

pub(crate) fn err_forbidden_control_character(start: u32, c: u8) -> Error {
    Error {
        code: 1003,
        message: format!("Forbidden control character U+{:04X}", c),
        span: Span::new(start, 1),
    }
}

pub(crate) fn err_token_too_long(start: u32, token_len: usize) -> Error {
    Error {
        code: 1004,
        message: format!(
            "Token size ({} bytes) exceeds maximum ({} bytes)",
            token_len, MAX_TOKEN_LEN,
        ),
        span: Span::new(start, u32::try_from(token_len).unwrap_or(u32::MAX)),
    }
}

pub(crate) fn err_int_lit_invalid(start: u32, token: &str) -> Error {
    Error {
        code: 1005,
        message: format!("Invalid integer literal {}", quote(token)),
        span: Span::new(start, token.len() as u32),
    }
}

pub(crate) fn err_text_lit_unterminated(start: u32, token_len: u32) -> Error {
    Error {
        code: 1006,
        message: "Unterminated text literal".to_owned(),
        span: Span::new(start, token_len),
    }
}

pub(crate) fn err_text_lit_contains_newline(start: u32, newline_len: u32) -> Error {
    Error {
        code: 1007,
        message: "Text literal contains unescaped newline".to_owned(),
        span: Span::new(start, newline_len),
    }
}

pub(crate) fn err_ident_invalid(start: u32, token: &str) -> Error {
    Error {
        code: 1008,
        message: format!("Invalid identifier {}", quote(token)),
        span: Span::new(start, token.len() as u32),
    }
}

pub(crate) fn err_expected_sigil(
    want_kind: TokenKind,
    got_kind: TokenKind,
    got_token: &str,
    span: Span,
) -> Error {
    let (code, want) = match want_kind {
        TokenKind::At => (2000, "@"),
        TokenKind::Colon => (2001, ":"),
        TokenKind::Dot => (2002, "."),
        TokenKind::Eq => (2003, "="),
        TokenKind::OpenCurl => (2004, "{"),
        TokenKind::CloseCurl => (2005, "}"),
        TokenKind::OpenParen => (2006, "("),
        TokenKind::CloseParen => (2007, ")"),
        TokenKind::OpenSquare => (2008, "["),
        TokenKind::CloseSquare => (2009, "]"),
        _ => unreachable!(),
    };
    Error {
        code,
        message: format!(
            "Expected sigil '{}', got ({} {})",
            want,
            got_kind,
            quote(got_token)
        ),
        span,
    }
}

fn expected(code: u32, what: &str, got_kind: TokenKind, got_token: &str, span: Span) -> Error {
    Error {
        code,
        message: format!("Expected {}, got ({} {})", what, got_kind, quote(got_token)),
        span,
    }
}

pub(crate) fn err_expected_int_lit(got_kind: TokenKind, got_token: &str, span: Span) -> Error {
    expected(2010, "integer literal", got_kind, got_token, span)
}

pub(crate) fn err_expected_text_lit(got_kind: TokenKind, got_token: &str, span: Span) -> Error {
    expected(2011, "text literal", got_kind, got_token, span)
}

pub(crate) fn err_expected_ident(got_kind: TokenKind, got_token: &str, span: Span) -> Error {
    expected(2012, "identifier", got_kind, got_token, span)
}

pub(crate) fn err_expected_keyword_as(got_kind: TokenKind, got_token: &str, span: Span) -> Error {
    expected(2013, "keyword 'as'", got_kind, got_token, span)
}

pub(crate) fn err_expected_keyword_namespace(
    got_kind: TokenKind,
    got_token: &str,
    span: Span,
) -> Error {
    expected(2014, "keyword 'namespace'", got_kind, got_token, span)
}

pub(crate) fn err_expected_declaration(got_kind: TokenKind, got_token: &str, span: Span) -> Error {
    expected(2015, "declaration keyword", got_kind, got_token, span)
}

pub(crate) fn err_unknown_declaration(token: &str, span: Span) -> Error {
    Error {
        code: 2016,
        message: format!("Unknown declaration keyword {}", quote(token)),
        span,
    }
}

pub(crate) fn err_unknown_decorator(token: &str, span: Span) -> Error {
    Error {
        code: 2017,
        message: format!("Unknown decorator keyword {}", quote(token)),
        span,
    }
}

pub(crate) fn err_expected_type_name(got_kind: TokenKind, got_token: &str, span: Span) -> Error {
    expected(2018, "type name", got_kind, got_token, span)
}

pub(crate) fn err_expected_const_value(got_kind: TokenKind, got_token: &str, span: Span) -> Error {
    expected(2019, "const value", got_kind, got_token, span)
}

pub(crate) fn err_expected_option_name(got_kind: TokenKind, got_token: &str, span: Span) -> Error {
    expected(2020, "option name", got_kind, got_token, span)
}

pub(crate) fn err_expected_option_value(got_kind: TokenKind, got_token: &str, span: Span) -> Error {
    expected(2021, "option value", got_kind, got_token, span)
}

pub(crate) fn err_int_lit_too_positive(start: u32, token: &str) -> Error {
    Error {
        code: 2022,
        message: format!("Integer literal too positive (must be <= {})", u64::MAX),
        span: Span::new(start, token.len() as u32),
    }
}

pub(crate) fn err_int_lit_too_negative(start: u32, token: &str) -> Error {
    Error {
        code: 2023,
        message: format!("Integer literal too negative (must be >= {})", i64::MIN),
        span: Span::new(start, token.len() as u32),
    }
}

pub(crate) fn err_text_lit_invalid(start: u32, token: &str) -> Error {
    Error {
        code: 2024,
        message: format!("Invalid text literal {}", quote(token)),
        span: Span::new(start, token.len() as u32),
    }
}

pub(crate) fn err_expected_protocol_item(
    got_kind: TokenKind,
    got_token: &str,
    span: Span,
) -> Error {
    expected(2025, "protocol item", got_kind, got_token, span)
}

pub(crate) fn err_expected_value_name(got_kind: TokenKind, got_token: &str, span: Span) -> Error {
    expected(2026, "value name", got_kind, got_token, span)
}

pub(crate) fn err_expected_export_name(got_kind: TokenKind, got_token: &str, span: Span) -> Error {
    expected(2027, "export name", got_kind, got_token, span)
}
