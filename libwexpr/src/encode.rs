//! Encode values to Wexpr text.
//!
//! The encoder walks the value tree and tracks a dotted path for every node,
//! starting at [`ROOT_PATH`] and extended with `.<index>` for array items and
//! `.<key>` for map entries. Paths select which strings are written as base64
//! blobs and name the location in warnings.
//!
//! Values that cannot be written (NaN) are left out of the output and
//! reported as [`Warning`]s; encoding carries on with the rest of the tree.

use crate::lexer::{is_number_literal, is_word_char};
use crate::value::{format_number, Map, Value};
use crate::{BASE64, MAX_DEPTH};
use base64::Engine as _;
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;
use tracing::warn;

/// Path of the root value.
pub const ROOT_PATH: &str = "-";

/// Options for [`encode_with`](crate::encode_with).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodeOptions {
    /// One element per line, indented with tabs.
    pub pretty: bool,
    /// Paths of strings to write as base64 blobs.
    pub binary_paths: HashSet<String>,
}

impl EncodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Write the string at `path` (e.g. `-.field.2`) as a binary blob.
    pub fn binary_path(mut self, path: impl Into<String>) -> Self {
        self.binary_paths.insert(path.into());
        self
    }
}

/// A value that was left out of the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// NaN has no Wexpr spelling.
    NotANumber { path: String },
}

impl Warning {
    /// Path of the omitted value.
    pub fn path(&self) -> &str {
        match self {
            Warning::NotANumber { path } => path,
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::NotANumber { path } => write!(f, "Warning: Cannot insert NaN at {}", path),
        }
    }
}

/// Output of a successful encode.
#[derive(Debug, Clone, PartialEq)]
pub struct Encoded {
    pub text: String,
    pub warnings: Vec<Warning>,
}

/// Failure to produce any text at all.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodeError {
    /// The root value itself was omitted, so there is no document.
    #[error("Error: Nothing to encode because the root value was omitted.")]
    RootOmitted(Vec<Warning>),

    /// Arrays and maps nested past [`MAX_DEPTH`](crate::MAX_DEPTH).
    #[error("Error: Maximum nesting depth exceeded at {path}.")]
    TooDeep { path: String },
}

/// Encode `value` with the given options.
pub fn encode_with(value: &Value, options: &EncodeOptions) -> Result<Encoded, EncodeError> {
    let mut encoder = Encoder {
        options,
        path: ROOT_PATH.to_string(),
        warnings: Vec::new(),
        depth: 0,
    };
    let indent = options.pretty.then_some(0);

    match encoder.value(value, indent)? {
        Some(text) => Ok(Encoded {
            text,
            warnings: encoder.warnings,
        }),
        None => Err(EncodeError::RootOmitted(encoder.warnings)),
    }
}

/// State for a single encode call.
struct Encoder<'o> {
    options: &'o EncodeOptions,
    path: String,
    warnings: Vec<Warning>,
    /// Nodes currently being written, counted the same way decode counts them.
    depth: usize,
}

impl Encoder<'_> {
    /// Encode one node; `None` means the node is omitted. Fails once the
    /// tree is deeper than [`MAX_DEPTH`].
    ///
    /// `indent` is `None` for compact output, otherwise the nesting depth of
    /// the enclosing scope.
    fn value(
        &mut self,
        value: &Value,
        indent: Option<usize>,
    ) -> Result<Option<String>, EncodeError> {
        if self.depth == MAX_DEPTH {
            return Err(EncodeError::TooDeep {
                path: self.path.clone(),
            });
        }
        self.depth += 1;
        let chunk = match value {
            Value::Null => Ok(Some("null".to_string())),
            Value::Bool(b) => Ok(Some(b.to_string())),
            Value::Number(n) => Ok(self.number(*n)),
            Value::String(s) => {
                if self.options.binary_paths.contains(self.path.as_str()) {
                    Ok(Some(encode_binary(s.as_bytes())))
                } else {
                    Ok(Some(encode_string(s)))
                }
            }
            Value::Binary(b) => Ok(Some(encode_binary(b))),
            Value::Array(items) => self.array(items, indent.map(|depth| depth + 1)).map(Some),
            Value::Map(map) => self.map(map, indent.map(|depth| depth + 1)).map(Some),
        };
        self.depth -= 1;
        chunk
    }

    fn number(&mut self, n: f64) -> Option<String> {
        if n.is_nan() {
            warn!(path = %self.path, "cannot insert NaN");
            self.warnings.push(Warning::NotANumber {
                path: self.path.clone(),
            });
            return None;
        }
        Some(format_number(n))
    }

    fn array(&mut self, items: &[Value], indent: Option<usize>) -> Result<String, EncodeError> {
        let (item_sep, close_sep) = separators(indent);
        let mut out = String::from("#(");

        for (i, item) in items.iter().enumerate() {
            let mark = self.enter(&i.to_string());
            if let Some(chunk) = self.value(item, indent)? {
                out.push_str(&item_sep);
                out.push_str(&chunk);
            }
            self.path.truncate(mark);
        }

        out.push_str(&close_sep);
        out.push(')');
        Ok(out)
    }

    fn map(&mut self, map: &Map, indent: Option<usize>) -> Result<String, EncodeError> {
        let (item_sep, close_sep) = separators(indent);
        let mut out = String::from("@(");

        for (key, value) in map {
            let mark = self.enter(key);
            if let Some(chunk) = self.value(value, indent)? {
                out.push_str(&item_sep);
                out.push_str(&encode_string(key));
                out.push(' ');
                out.push_str(&chunk);
            }
            self.path.truncate(mark);
        }

        out.push_str(&close_sep);
        out.push(')');
        Ok(out)
    }

    /// Extend the path with `segment`, returning the length to truncate back to.
    fn enter(&mut self, segment: &str) -> usize {
        let mark = self.path.len();
        self.path.push('.');
        self.path.push_str(segment);
        mark
    }
}

/// Separator before each child and before the closing paren.
fn separators(indent: Option<usize>) -> (String, String) {
    match indent {
        None => (" ".to_string(), " ".to_string()),
        Some(depth) => (
            format!("\n{}", "\t".repeat(depth)),
            format!("\n{}", "\t".repeat(depth.saturating_sub(1))),
        ),
    }
}

/// Whether `s` reads back as the same string when written without quotes.
fn is_bare_word(s: &str) -> bool {
    !s.is_empty()
        && s.chars().all(is_word_char)
        && !matches!(s, "true" | "false" | "null" | "nil")
        && !is_number_literal(s)
}

fn encode_string(s: &str) -> String {
    if is_bare_word(s) {
        return s.to_string();
    }

    let mut result = String::with_capacity(s.len() + 2);
    result.push('"');
    for c in s.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '\r' => result.push_str("\\r"),
            '\n' => result.push_str("\\n"),
            '\t' => result.push_str("\\t"),
            '"' => result.push_str("\\\""),
            c => result.push(c),
        }
    }
    result.push('"');
    result
}

fn encode_binary(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        // `<>` is not a valid blob; an empty byte sequence reads back as "".
        return "\"\"".to_string();
    }
    format!("<{}>", BASE64.encode(bytes))
}
