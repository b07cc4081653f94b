//! Value Parser
//!
//! The value parser consumes significant tokens from the lexer and builds a
//! value tree by recursive descent. Every token kind that carries a value has
//! its own routine:
//!
//! - Scalars: strings, numbers, words (`true`, `false`, `null`, `nil`)
//! - References: `*[name]` uses and `[name] value` definitions
//! - Binary: base64 blobs
//! - Compounds: arrays `#( ... )` and maps `@( ... )`

use crate::error::{DecodeError, ErrorKind};
use crate::lexer::{self, Lexer, Token, TokenKind};
use crate::references::References;
use crate::value::{Map, Value};
use crate::{BASE64, MAX_DEPTH};
use base64::Engine as _;
use tracing::trace;

type ParseResult<T> = std::result::Result<T, DecodeError>;

/// Position a value is being read for. Decides which error is raised when
/// the token found there carries no value.
#[derive(Clone, Copy)]
enum Slot<'k> {
    Root,
    ArrayItem,
    MapValue(&'k str),
    ReferenceDefinition(&'k str),
}

/// State for a single decode call.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    references: References,
    /// Values currently being read, outermost first.
    depth: usize,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str, references: References) -> Self {
        Self {
            lexer: Lexer::new(source),
            references,
            depth: 0,
        }
    }

    /// Parse exactly one root value and require the input to end after it.
    pub fn parse_document(mut self) -> ParseResult<Value> {
        let token = self.lexer.next_token()?;
        let value = self.parse_value(token, Slot::Root)?;

        if let Some(extra) = self.lexer.next_token_or_end()? {
            return Err(self.error(ErrorKind::TrailingGarbage, extra.offset, 0));
        }
        Ok(value)
    }

    fn error(&self, kind: ErrorKind, offset: usize, length: usize) -> DecodeError {
        DecodeError::report(self.lexer.source(), kind, offset, length)
    }

    fn unexpected(&self, token: Token<'_>, slot: Slot<'_>) -> DecodeError {
        let found = token.kind;
        let kind = match slot {
            Slot::Root => ErrorKind::ExpectedBaseValue(found),
            Slot::ArrayItem => ErrorKind::ExpectedArrayValue(found),
            Slot::MapValue(key) => ErrorKind::ExpectedMapValue {
                key: key.to_string(),
                found,
            },
            Slot::ReferenceDefinition(name) => ErrorKind::ExpectedReferenceValue {
                name: name.to_string(),
                found,
            },
        };
        self.error(kind, token.offset, token.width())
    }

    // ========================================================================
    // Value Dispatch
    // ========================================================================

    fn parse_value(&mut self, token: Token<'a>, slot: Slot<'_>) -> ParseResult<Value> {
        if self.depth == MAX_DEPTH {
            return Err(self.error(ErrorKind::NestingTooDeep, token.offset, token.width()));
        }
        self.depth += 1;
        let value = self.parse_token(token, slot);
        self.depth -= 1;
        value
    }

    fn parse_token(&mut self, token: Token<'a>, slot: Slot<'_>) -> ParseResult<Value> {
        match token.kind {
            TokenKind::String => self.parse_string(token).map(Value::String),
            TokenKind::Number => Ok(Value::Number(parse_number(token.text))),
            TokenKind::Word => Ok(parse_word(token.text)),
            TokenKind::Reference => self.parse_reference(token),
            TokenKind::ReferenceDefinition => self.parse_reference_definition(token),
            TokenKind::Binary => self.parse_binary(token),
            TokenKind::ArrayOpen => self.parse_array(),
            TokenKind::MapOpen => self.parse_map(),
            _ => Err(self.unexpected(token, slot)),
        }
    }

    // ========================================================================
    // Scalars
    // ========================================================================

    /// Strip the quotes and substitute escapes.
    fn parse_string(&self, token: Token<'_>) -> ParseResult<String> {
        let body = &token.text[1..token.text.len() - 1];
        let mut result = String::with_capacity(body.len());
        let mut chars = body.char_indices();

        while let Some((i, c)) = chars.next() {
            if c != '\\' {
                result.push(c);
                continue;
            }
            let escaped = match chars.next() {
                Some((_, '\\')) => '\\',
                Some((_, '"')) => '"',
                Some((_, 'r')) => '\r',
                Some((_, 'n')) => '\n',
                Some((_, 't')) => '\t',
                _ => {
                    // +1 for the opening quote
                    return Err(self.error(ErrorKind::InvalidEscape, token.offset + 1 + i, 2));
                }
            };
            result.push(escaped);
        }

        Ok(result)
    }

    fn parse_binary(&self, token: Token<'_>) -> ParseResult<Value> {
        let data = &token.text[1..token.text.len() - 1];
        BASE64.decode(data).map(Value::Binary).map_err(|e| {
            self.error(
                ErrorKind::InvalidBinary(e.to_string()),
                token.offset,
                token.width(),
            )
        })
    }

    // ========================================================================
    // References
    // ========================================================================

    fn parse_reference(&self, token: Token<'_>) -> ParseResult<Value> {
        let name = lexer::reference_name(token.text);
        match self.references.resolve(name) {
            Some(value) => Ok(value.clone()),
            None => Err(self.error(
                ErrorKind::UndefinedReference(name.to_string()),
                token.offset,
                token.width(),
            )),
        }
    }

    /// Bind the following value to the name and yield it in place.
    fn parse_reference_definition(&mut self, token: Token<'a>) -> ParseResult<Value> {
        let name = lexer::reference_name(token.text);
        let next = self.lexer.next_token()?;
        let value = self.parse_value(next, Slot::ReferenceDefinition(name))?;

        trace!(name, offset = token.offset, "defined reference");
        self.references.define(name, value.clone());
        Ok(value)
    }

    // ========================================================================
    // Compounds
    // ========================================================================

    fn parse_array(&mut self) -> ParseResult<Value> {
        let mut items = Vec::new();
        loop {
            let token = self.lexer.next_token()?;
            if token.kind == TokenKind::CloseScope {
                return Ok(Value::Array(items));
            }
            items.push(self.parse_value(token, Slot::ArrayItem)?);
        }
    }

    fn parse_map(&mut self) -> ParseResult<Value> {
        let mut map = Map::new();
        loop {
            let token = self.lexer.next_token()?;
            let key = match token.kind {
                TokenKind::CloseScope => return Ok(Value::Map(map)),
                TokenKind::String | TokenKind::Number | TokenKind::Word => self.parse_key(token)?,
                found => {
                    return Err(self.error(
                        ErrorKind::ExpectedMapKey(found),
                        token.offset,
                        token.width(),
                    ))
                }
            };

            let next = self.lexer.next_token()?;
            let value = self.parse_value(next, Slot::MapValue(&key))?;
            // An existing key keeps its position and takes the new value.
            map.insert(key, value);
        }
    }

    /// Evaluate a key token and normalize it to its text form.
    fn parse_key(&self, token: Token<'_>) -> ParseResult<String> {
        let key = match token.kind {
            TokenKind::String => Value::String(self.parse_string(token)?),
            TokenKind::Number => Value::Number(parse_number(token.text)),
            _ => parse_word(token.text),
        };
        key.to_map_key()
            .ok_or_else(|| self.error(ErrorKind::NullMapKey, token.offset, token.width()))
    }
}

fn parse_number(text: &str) -> f64 {
    // The lexer only admits `-?\d*\.?\d+`, which always parses.
    text.parse().unwrap_or(f64::NAN)
}

fn parse_word(text: &str) -> Value {
    match text {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" | "nil" => Value::Null,
        _ => Value::String(text.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> ParseResult<Value> {
        Parser::new(source, References::new()).parse_document()
    }

    fn map(entries: Vec<(&str, Value)>) -> Value {
        entries.into_iter().collect()
    }

    #[test]
    fn test_words() {
        assert_eq!(parse("true").unwrap(), Value::Bool(true));
        assert_eq!(parse("false").unwrap(), Value::Bool(false));
        assert_eq!(parse("null").unwrap(), Value::Null);
        assert_eq!(parse("nil").unwrap(), Value::Null);
        assert_eq!(parse("hello").unwrap(), Value::from("hello"));
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            parse(r#""a\tb\nc\r\"d\"\\""#).unwrap(),
            Value::from("a\tb\nc\r\"d\"\\")
        );
    }

    #[test]
    fn test_invalid_escape_points_at_backslash() {
        let err = parse(r#""ab\qc""#).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidEscape);
        assert_eq!(err.offset(), 3);
        assert_eq!(
            err.to_string(),
            "1:4:Syntax Error: Invalid escape sequence.\n\"ab\\qc\"\n   ^~"
        );
    }

    #[test]
    fn test_numbers_need_whitespace() {
        assert_eq!(
            parse("#( 5 -1.5 .25 )").unwrap(),
            Value::Array(vec![
                Value::Number(5.0),
                Value::Number(-1.5),
                Value::Number(0.25)
            ])
        );
        assert_eq!(
            parse("#(5)").unwrap(),
            Value::Array(vec![Value::from("5")])
        );
        assert_eq!(parse("42").unwrap(), Value::from("42"));
        assert_eq!(parse("42\n").unwrap(), Value::Number(42.0));
    }

    #[test]
    fn test_binary() {
        assert_eq!(
            parse("<aGVsbG8=>").unwrap(),
            Value::Binary(b"hello".to_vec())
        );
        assert_eq!(
            parse("<aGVsbG8>").unwrap(),
            Value::Binary(b"hello".to_vec())
        );
    }

    #[test]
    fn test_invalid_binary() {
        let err = parse("<a=b=>").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidBinary(_)));
        assert_eq!(err.column(), 1);
    }

    #[test]
    fn test_nested_structures() {
        let value = parse("@( list #( a \"b c\" ) inner @( k v ) )").unwrap();
        assert_eq!(
            value,
            map(vec![
                (
                    "list",
                    Value::Array(vec![Value::from("a"), Value::from("b c")])
                ),
                ("inner", map(vec![("k", Value::from("v"))])),
            ])
        );
    }

    #[test]
    fn test_map_keys_are_normalized() {
        let value = parse("@( 1 one 2.50 two true yes \"q\" quoted )").unwrap();
        let keys: Vec<&String> = value.as_map().unwrap().keys().collect();
        assert_eq!(keys, vec!["1", "2.5", "true", "q"]);
    }

    #[test]
    fn test_duplicate_keys_last_wins() {
        let value = parse(r#"@( "a" 1 "b" 3 "a" 2 )"#).unwrap();
        assert_eq!(
            value,
            map(vec![("a", Value::Number(2.0)), ("b", Value::Number(3.0))])
        );
        let keys: Vec<&String> = value.as_map().unwrap().keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_null_key_is_structural_error() {
        let err = parse("@( nil 1 )").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::NullMapKey);
        assert_eq!(err.column(), 4);
    }

    #[test]
    fn test_bad_map_key() {
        let err = parse("@( #( ) 1 )").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ExpectedMapKey(TokenKind::ArrayOpen));
    }

    #[test]
    fn test_missing_map_value() {
        let err = parse("@( a )").unwrap_err();
        assert_eq!(
            err.kind(),
            &ErrorKind::ExpectedMapValue {
                key: "a".into(),
                found: TokenKind::CloseScope
            }
        );
        assert_eq!(
            err.kind().to_string(),
            "Syntax Error: Expected value for map key a as word, number, or string but instead found close scope."
        );
    }

    #[test]
    fn test_references_resolve_in_order() {
        assert_eq!(
            parse("#( [x] 5 *[x] )").unwrap(),
            Value::Array(vec![Value::Number(5.0), Value::Number(5.0)])
        );
        let err = parse("#( *[x] [x] 5 )").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::UndefinedReference("x".into()));
        assert_eq!(err.column(), 4);
    }

    #[test]
    fn test_redefinition_shadows_later_uses_only() {
        let value = parse("#( [x] a *[x] [x] b *[x] )").unwrap();
        assert_eq!(
            value,
            Value::Array(vec!["a".into(), "a".into(), "b".into(), "b".into()])
        );
    }

    #[test]
    fn test_reference_definition_needs_value() {
        let err = parse("#( [x] )").unwrap_err();
        assert_eq!(
            err.kind(),
            &ErrorKind::ExpectedReferenceValue {
                name: "x".into(),
                found: TokenKind::CloseScope
            }
        );
    }

    #[test]
    fn test_seeded_references() {
        let refs: References = vec![("greeting", Value::from("hi"))].into_iter().collect();
        let value = Parser::new("#( *[greeting] )", refs)
            .parse_document()
            .unwrap();
        assert_eq!(value, Value::Array(vec!["hi".into()]));
    }

    #[test]
    fn test_crlf_ends_block_comment() {
        assert_eq!(
            parse("#( a ;(-- b\r\nc --)").unwrap(),
            Value::Array(vec!["a".into(), "c".into(), "--".into()])
        );
        assert_eq!(
            parse("#( a ;(-- b\nc --) )").unwrap(),
            Value::Array(vec!["a".into()])
        );
    }

    #[test]
    fn test_null_reference_is_undefined() {
        let err = parse("#( [x] null *[x] )").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::UndefinedReference("x".into()));
        assert_eq!(err.column(), 13);

        let refs: References = vec![("x", Value::Null)].into_iter().collect();
        let err = Parser::new("*[x]", refs).parse_document().unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::UndefinedReference("x".into()));
    }

    #[test]
    fn test_nesting_depth_limit() {
        let deep = format!("{}{}", "#( ".repeat(5000), ")".repeat(5000));
        let err = parse(&deep).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::NestingTooDeep);
        assert_eq!(err.line(), 1);
        assert_eq!(err.column(), 3 * MAX_DEPTH + 1);

        let deep_maps = format!("{}{}", "@( k ".repeat(5000), ")".repeat(5000));
        let err = parse(&deep_maps).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::NestingTooDeep);
    }

    #[test]
    fn test_nesting_at_limit_decodes() {
        let source = format!("{}{}", "#( ".repeat(MAX_DEPTH - 1), ")".repeat(MAX_DEPTH - 1));
        let mut value = parse(&source).unwrap();
        let mut depth = 1;
        while let Value::Array(mut items) = value {
            match items.pop() {
                Some(inner) => {
                    value = inner;
                    depth += 1;
                }
                None => break,
            }
        }
        assert_eq!(depth, MAX_DEPTH - 1);

        // One more level, counting the scalar inside.
        let source = format!("{}a{}", "#( ".repeat(MAX_DEPTH - 1), " )".repeat(MAX_DEPTH - 1));
        assert!(parse(&source).is_ok());
        let source = format!("{}a{}", "#( ".repeat(MAX_DEPTH), " )".repeat(MAX_DEPTH));
        assert_eq!(parse(&source).unwrap_err().kind(), &ErrorKind::NestingTooDeep);
    }

    #[test]
    fn test_definition_chain_depth_limit() {
        let chain: String = (0..5000).map(|i| format!("[r{}] ", i)).collect();
        let err = parse(&format!("{}a", chain)).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::NestingTooDeep);
    }

    #[test]
    fn test_trailing_garbage() {
        let err = parse("[x] 5 *[x]").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::TrailingGarbage);
        assert_eq!(err.column(), 7);
    }

    #[test]
    fn test_close_scope_at_root() {
        let err = parse(")").unwrap_err();
        assert_eq!(
            err.kind(),
            &ErrorKind::ExpectedBaseValue(TokenKind::CloseScope)
        );
    }

    #[test]
    fn test_unclosed_array() {
        let err = parse("#( a").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::UnexpectedEnd);
        assert_eq!(err.column(), 5);
    }
}
