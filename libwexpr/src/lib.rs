//! Wexpr parser and encoder.
//!
//! Wexpr is a small s-expression flavored data format with nulls, booleans,
//! numbers, strings, arrays `#( ... )`, maps `@( ... )`, base64 binary blobs
//! `<...>`, and in-document references (`[name] value` defines, `*[name]`
//! reuses).
//!
//! # Decoding Pipeline
//!
//! 1. **Lexer**: Scans source text into classified tokens, skipping
//!    whitespace and comments.
//!
//! 2. **Value Parser**: Recursively turns the token stream into a [`Value`],
//!    resolving references against a per-call [`References`] table.
//!
//! Every failure is a [`DecodeError`] that renders with line, column, and a
//! caret under the offending text.
//!
//! # Encoding
//!
//! [`encode`] and [`encode_with`] write a [`Value`] back out, compact or
//! pretty, optionally turning selected strings into binary blobs.

mod encode;
mod error;
mod lexer;
mod parser;
mod references;
mod value;

pub use encode::{encode_with, EncodeError, EncodeOptions, Encoded, Warning, ROOT_PATH};
pub use error::{DecodeError, Error, ErrorCategory, ErrorKind, Result};
pub use lexer::TokenKind;
pub use references::References;
pub use value::{Map, Value};

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use tracing::debug;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Revision of the Wexpr format this crate reads and writes.
pub const SPEC_VERSION: &str = "0.1";

/// Deepest nesting of arrays, maps, and reference definitions that decode
/// and encode accept. Deeper input fails instead of exhausting the stack.
pub const MAX_DEPTH: usize = 128;

/// Standard alphabet, padded on output, padding optional on input.
pub(crate) const BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decode a Wexpr document from a string.
///
/// # Example
///
/// ```
/// use libwexpr::{decode, Value};
///
/// let value = decode("#( a \"b c\" )").unwrap();
/// assert_eq!(value, Value::Array(vec!["a".into(), "b c".into()]));
/// ```
pub fn decode(input: &str) -> Result<Value> {
    decode_with_references(input, References::new())
}

/// Decode a Wexpr document with references already defined.
///
/// The table is consumed; definitions made by the document do not leak back
/// to the caller.
pub fn decode_with_references(input: &str, references: References) -> Result<Value> {
    parser::Parser::new(input, references)
        .parse_document()
        .map_err(|err| {
            debug!(line = err.line(), column = err.column(), "decode failed: {}", err.kind());
            Error::from(err)
        })
}

/// Encode a value as compact Wexpr text.
///
/// # Example
///
/// ```
/// use libwexpr::{encode, Value};
///
/// let encoded = encode(&Value::Array(vec![1.into(), "x y".into()])).unwrap();
/// assert_eq!(encoded.text, "#( 1 \"x y\" )");
/// ```
pub fn encode(value: &Value) -> std::result::Result<Encoded, EncodeError> {
    encode_with(value, &EncodeOptions::default())
}
