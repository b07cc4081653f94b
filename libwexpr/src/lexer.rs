//! Tokenizer
//!
//! The lexer walks the source one lexeme at a time. At each position it tries
//! the lexeme rules in a fixed priority order and takes the first that
//! matches:
//!
//! 1. whitespace
//! 2. block comment `;(-- ... --)`
//! 3. line comment `; ...`
//! 4. quoted string
//! 5. number, only when whitespace follows it directly
//! 6. bareword
//! 7. reference `*[name]`
//! 8. reference definition `[name]`
//! 9. binary `<base64>`
//! 10. array open `#(`
//! 11. map open `@(`
//! 12. close scope `)`
//!
//! Anything else is an unknown token. The order matters: comments must win
//! over barewords, and `5)` is a bareword because the number rule needs
//! trailing whitespace.

use crate::error::{DecodeError, ErrorKind};
use std::fmt;

/// Classification of a lexeme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Whitespace,
    BlockComment,
    LineComment,
    String,
    Number,
    Word,
    Reference,
    ReferenceDefinition,
    Binary,
    ArrayOpen,
    MapOpen,
    CloseScope,
    Unknown,
}

impl TokenKind {
    /// Whether the parser ever sees this kind.
    pub fn is_significant(self) -> bool {
        !matches!(
            self,
            TokenKind::Whitespace | TokenKind::BlockComment | TokenKind::LineComment
        )
    }

    /// Whether a token of this kind evaluates to a value.
    pub fn carries_value(self) -> bool {
        matches!(
            self,
            TokenKind::String
                | TokenKind::Number
                | TokenKind::Word
                | TokenKind::Reference
                | TokenKind::ReferenceDefinition
                | TokenKind::Binary
                | TokenKind::ArrayOpen
                | TokenKind::MapOpen
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Whitespace => "whitespace",
            TokenKind::BlockComment => "block comment",
            TokenKind::LineComment => "line comment",
            TokenKind::String => "string",
            TokenKind::Number => "number",
            TokenKind::Word => "word",
            TokenKind::Reference => "reference",
            TokenKind::ReferenceDefinition => "reference definition",
            TokenKind::Binary => "binary",
            TokenKind::ArrayOpen => "array",
            TokenKind::MapOpen => "map",
            TokenKind::CloseScope => "close scope",
            TokenKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// A single lexeme borrowed from the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub offset: usize,
}

impl Token<'_> {
    /// Length in characters, used to size error underlines.
    pub fn width(&self) -> usize {
        self.text.chars().count()
    }
}

/// Lexer over one source string.
pub struct Lexer<'a> {
    source: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self { source, pos: 0 }
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    /// Next significant token; running out of input is an error.
    pub fn next_token(&mut self) -> Result<Token<'a>, DecodeError> {
        match self.next_token_or_end()? {
            Some(token) => Ok(token),
            None => Err(DecodeError::report(
                self.source,
                ErrorKind::UnexpectedEnd,
                self.source.len(),
                0,
            )),
        }
    }

    /// Next significant token, or `None` once only whitespace and comments
    /// remain.
    pub fn next_token_or_end(&mut self) -> Result<Option<Token<'a>>, DecodeError> {
        while self.pos < self.source.len() {
            let rest = &self.source[self.pos..];
            let (kind, len) = scan(rest);
            let token = Token {
                kind,
                text: &rest[..len],
                offset: self.pos,
            };
            self.pos += len;

            if kind == TokenKind::Unknown {
                return Err(DecodeError::report(
                    self.source,
                    ErrorKind::UnknownToken,
                    token.offset,
                    0,
                ));
            }
            if kind.is_significant() {
                return Ok(Some(token));
            }
        }
        Ok(None)
    }
}

/// Classify the lexeme at the start of `rest` and return its byte length.
///
/// `rest` must be non-empty.
fn scan(rest: &str) -> (TokenKind, usize) {
    let matchers: [(TokenKind, fn(&str) -> Option<usize>); 12] = [
        (TokenKind::Whitespace, match_whitespace),
        (TokenKind::BlockComment, match_block_comment),
        (TokenKind::LineComment, match_line_comment),
        (TokenKind::String, match_string),
        (TokenKind::Number, match_number),
        (TokenKind::Word, match_word),
        (TokenKind::Reference, match_reference),
        (TokenKind::ReferenceDefinition, match_reference_definition),
        (TokenKind::Binary, match_binary),
        (TokenKind::ArrayOpen, match_array_open),
        (TokenKind::MapOpen, match_map_open),
        (TokenKind::CloseScope, match_close_scope),
    ];

    for (kind, matcher) in matchers {
        if let Some(len) = matcher(rest) {
            return (kind, len);
        }
    }

    // Unknown swallows the rest of the line.
    let len = rest.find(['\n', '\r']).unwrap_or(rest.len()).max(1);
    (TokenKind::Unknown, len)
}

/// Whitespace as the tokenizer sees it.
pub(crate) fn is_space(c: char) -> bool {
    c.is_whitespace() || c == '\u{feff}'
}

/// Characters allowed in a bareword.
pub(crate) fn is_word_char(c: char) -> bool {
    !matches!(
        c,
        '<' | '>' | '"' | '*' | '#' | '@' | '(' | ')' | ';' | '[' | ']'
    ) && !is_space(c)
}

/// Whether `s` is exactly a number lexeme: `-?\d*\.?\d+`.
pub(crate) fn is_number_literal(s: &str) -> bool {
    let body = s.strip_prefix('-').unwrap_or(s);
    let (int_part, frac_part) = match body.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => ("", body),
    };
    int_part.bytes().all(|b| b.is_ascii_digit())
        && !frac_part.is_empty()
        && frac_part.bytes().all(|b| b.is_ascii_digit())
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn match_literal(rest: &str, literal: &str) -> Option<usize> {
    rest.starts_with(literal).then_some(literal.len())
}

fn match_array_open(rest: &str) -> Option<usize> {
    match_literal(rest, "#(")
}

fn match_map_open(rest: &str) -> Option<usize> {
    match_literal(rest, "@(")
}

fn match_close_scope(rest: &str) -> Option<usize> {
    match_literal(rest, ")")
}

fn match_whitespace(rest: &str) -> Option<usize> {
    let len = rest
        .char_indices()
        .find(|&(_, c)| !is_space(c))
        .map_or(rest.len(), |(i, _)| i);
    (len > 0).then_some(len)
}

/// `;(-- ... --)` up to the first `--)`. The body may hold `\n` but no other
/// line terminator; otherwise the text falls through to a line comment.
fn match_block_comment(rest: &str) -> Option<usize> {
    let body = rest.strip_prefix(";(--")?;
    let end = body.find("--)")?;
    if body[..end].contains(&['\r', '\u{2028}', '\u{2029}'][..]) {
        return None;
    }
    Some(4 + end + 3)
}

fn match_line_comment(rest: &str) -> Option<usize> {
    if !rest.starts_with(';') {
        return None;
    }
    Some(rest.find('\n').unwrap_or(rest.len()))
}

fn match_string(rest: &str) -> Option<usize> {
    let mut chars = rest.char_indices();
    if chars.next()?.1 != '"' {
        return None;
    }
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Some(i + 1),
            '\\' => match chars.next() {
                Some((_, '\n' | '\r')) | None => return None,
                Some(_) => {}
            },
            _ => {}
        }
    }
    None
}

fn match_number(rest: &str) -> Option<usize> {
    let start = usize::from(rest.starts_with('-'));
    let len = start
        + rest[start..]
            .bytes()
            .take_while(|b| b.is_ascii_digit() || *b == b'.')
            .count();
    let followed_by_space = rest[len..].chars().next().is_some_and(is_space);
    (followed_by_space && is_number_literal(&rest[..len])).then_some(len)
}

fn match_word(rest: &str) -> Option<usize> {
    let len = rest
        .char_indices()
        .find(|&(_, c)| !is_word_char(c))
        .map_or(rest.len(), |(i, _)| i);
    (len > 0).then_some(len)
}

fn match_bracketed(rest: &str, open: &str) -> Option<usize> {
    let body = rest.strip_prefix(open)?;
    let end = body.find(']')?;
    is_identifier(&body[..end]).then_some(open.len() + end + 1)
}

fn match_reference(rest: &str) -> Option<usize> {
    match_bracketed(rest, "*[")
}

fn match_reference_definition(rest: &str) -> Option<usize> {
    match_bracketed(rest, "[")
}

fn match_binary(rest: &str) -> Option<usize> {
    let body = rest.strip_prefix('<')?;
    let end = body.find('>')?;
    let data = &body[..end];
    let valid = !data.is_empty()
        && data
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'='));
    valid.then_some(end + 2)
}

/// Name inside a `*[name]` or `[name]` token.
pub(crate) fn reference_name(text: &str) -> &str {
    let start = text.find('[').map_or(0, |i| i + 1);
    let end = text.rfind(']').unwrap_or(text.len());
    &text[start..end]
}
