//! Error types for Wexpr decoding.

use crate::lexer::TokenKind;
use std::fmt;
use thiserror::Error;

/// Result type for Wexpr decoding operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the public decode surface.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The document could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Caller supplied references that are not a map.
    #[error("Error: Expected references as a map but instead found {0}")]
    InvalidReferences(&'static str),
}

/// Broad class of a decode failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed or misplaced tokens.
    Syntax,
    /// Use of an undefined reference.
    Reference,
    /// A well-formed document describing an impossible value.
    Structural,
}

/// Every fatal condition the tokenizer and parser can hit.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ErrorKind {
    /// No lexeme rule matched.
    #[error("Syntax Error: Unknown token.")]
    UnknownToken,

    /// Input ran out while a value or scope was still open.
    #[error("Syntax Error: File ended unexpectedly.")]
    UnexpectedEnd,

    /// Escape other than `\\ \" \r \n \t` inside a string.
    #[error("Syntax Error: Invalid escape sequence.")]
    InvalidEscape,

    /// Binary blob whose body is not valid base64.
    #[error("Syntax Error: Invalid binary data: {0}")]
    InvalidBinary(String),

    /// The document does not start with a value.
    #[error("Syntax Error: Expected base value for Wexpr but instead found {0}.")]
    ExpectedBaseValue(TokenKind),

    /// Non-value token inside an array scope.
    #[error("Syntax Error: Expected value to insert into array but instead found {0}.")]
    ExpectedArrayValue(TokenKind),

    /// Map key that is not a string, number, or word.
    #[error("Syntax Error: Expected map key as word, number, or string but instead found {0}.")]
    ExpectedMapKey(TokenKind),

    /// Map key not followed by a value.
    #[error(
        "Syntax Error: Expected value for map key {key} as word, number, or string but instead found {found}."
    )]
    ExpectedMapValue { key: String, found: TokenKind },

    /// Reference definition not followed by a value.
    #[error("Syntax Error: Expected value to define reference [{name}] but instead found {found}.")]
    ExpectedReferenceValue { name: String, found: TokenKind },

    /// Significant tokens after the root value.
    #[error("Syntax Error: Garbage at end of file.")]
    TrailingGarbage,

    /// `*[name]` before any `[name]` definition.
    #[error("Reference Error: Reference [{0}] is undefined.")]
    UndefinedReference(String),

    /// Map key word that evaluates to null.
    #[error("Structural Error: Map key cannot be null.")]
    NullMapKey,

    /// Arrays, maps, or reference definitions nested past `MAX_DEPTH`.
    #[error("Syntax Error: Maximum nesting depth exceeded.")]
    NestingTooDeep,
}

impl ErrorKind {
    /// The class of failure this kind belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            ErrorKind::UndefinedReference(_) => ErrorCategory::Reference,
            ErrorKind::NullMapKey => ErrorCategory::Structural,
            _ => ErrorCategory::Syntax,
        }
    }
}

/// A decode failure pinned to a location in the source.
///
/// `Display` renders the positioned diagnostic:
///
/// ```text
/// 1:4:Syntax Error: Unknown token.
/// #( < )
///    ^
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeError {
    kind: ErrorKind,
    offset: usize,
    length: usize,
    line: usize,
    column: usize,
    excerpt: String,
}

impl DecodeError {
    /// Locate `offset` in `source` and capture the surrounding line.
    ///
    /// `length` is the number of characters to underline; zero and one both
    /// render a single caret.
    pub(crate) fn report(source: &str, kind: ErrorKind, offset: usize, length: usize) -> Self {
        let offset = offset.min(source.len());
        let before = &source[..offset];
        let line_start = before.rfind('\n').map_or(0, |i| i + 1);
        let line = before.matches('\n').count() + 1;
        let column = before[line_start..].chars().count() + 1;
        let line_end = source[line_start..]
            .find('\n')
            .map_or(source.len(), |i| line_start + i);
        let excerpt = source[line_start..line_end]
            .trim_end_matches('\r')
            .to_string();

        DecodeError {
            kind,
            offset,
            length,
            line,
            column,
            excerpt,
        }
    }

    /// What went wrong.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Byte offset into the source.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// 1-based line number.
    pub fn line(&self) -> usize {
        self.line
    }

    /// 1-based column, counted in characters.
    pub fn column(&self) -> usize {
        self.column
    }

    /// The source line containing the error.
    pub fn excerpt(&self) -> &str {
        &self.excerpt
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:{}:{}", self.line, self.column, self.kind)?;
        writeln!(f, "{}", self.excerpt)?;
        write!(
            f,
            "{}^{}",
            " ".repeat(self.column - 1),
            "~".repeat(self.length.saturating_sub(1))
        )
    }
}

impl std::error::Error for DecodeError {}
