//! PDF Object Parser
//!
//! Builds [`Object`] values from lexer tokens according to ISO 32000-1 Section 7.3,
//! including indirect objects and their stream payloads.

use super::lexer::{Lexer, Token};
use super::{ParseError, ParseResult};
use crate::objects::{Dictionary, Object, ObjectId, PdfString, Stream};

/// Looks up an indirect `/Length` value while a stream is being read.
pub type LengthResolver<'r> = &'r dyn Fn(ObjectId) -> Option<i64>;

const DEFAULT_MAX_DEPTH: usize = 256;

pub struct ObjectParser<'a> {
    lexer: Lexer<'a>,
    max_depth: usize,
}

impl<'a> ObjectParser<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::at(data, 0)
    }

    pub fn at(data: &'a [u8], position: usize) -> Self {
        Self {
            lexer: Lexer::at(data, position),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn position(&self) -> usize {
        self.lexer.position()
    }

    pub fn lexer_mut(&mut self) -> &mut Lexer<'a> {
        &mut self.lexer
    }

    /// Parse one direct object. A `stream` keyword after a dictionary is left unread.
    pub fn parse_object(&mut self) -> ParseResult<Object> {
        let token = self.lexer.next_token()?;
        self.parse_value(token, 0)
    }

    /// Parse `n g obj ... endobj`, reading the stream body when present.
    pub fn parse_indirect_object(
        &mut self,
        resolve_length: Option<LengthResolver<'_>>,
    ) -> ParseResult<(ObjectId, Object)> {
        let number = self.expect_unsigned("object number")?;
        let generation = self.expect_unsigned("generation number")?;
        let number = u32::try_from(number).map_err(|_| self.syntax_error("object number too large"))?;
        let generation =
            u16::try_from(generation).map_err(|_| self.syntax_error("generation number too large"))?;

        match self.lexer.next_token()? {
            Token::Obj => {}
            other => {
                return Err(ParseError::UnexpectedToken {
                    expected: "obj".to_string(),
                    found: format!("{other:?}"),
                })
            }
        }

        let token = self.lexer.next_token()?;
        let object = match token {
            // "n g obj endobj" is an empty object
            Token::EndObj => return Ok((ObjectId::new(number, generation), Object::Null)),
            token => self.parse_value(token, 0)?,
        };

        let object = match object {
            Object::Dictionary(dict) if matches!(self.lexer.peek_token(), Ok(Token::Stream)) => {
                self.lexer.next_token()?;
                let data = self.read_stream_data(&dict, resolve_length)?;
                let mut dict = dict;
                dict.set("Length", data.len());
                Object::Stream(Stream::with_dictionary(dict, data))
            }
            other => other,
        };

        // A missing endobj is tolerated
        if matches!(self.lexer.peek_token(), Ok(Token::EndObj)) {
            self.lexer.next_token()?;
        }

        Ok((ObjectId::new(number, generation), object))
    }

    fn expect_unsigned(&mut self, what: &str) -> ParseResult<i64> {
        match self.lexer.next_token()? {
            Token::Integer(n) if n >= 0 => Ok(n),
            other => Err(ParseError::UnexpectedToken {
                expected: what.to_string(),
                found: format!("{other:?}"),
            }),
        }
    }

    fn syntax_error(&self, message: &str) -> ParseError {
        ParseError::SyntaxError {
            position: self.lexer.position(),
            message: message.to_string(),
        }
    }

    fn parse_value(&mut self, token: Token, depth: usize) -> ParseResult<Object> {
        match token {
            Token::Null => Ok(Object::Null),
            Token::Boolean(b) => Ok(Object::Boolean(b)),
            Token::Integer(n) => Ok(self.try_reference(n).unwrap_or(Object::Integer(n))),
            Token::Real(r) => Ok(Object::Real(r)),
            Token::String(bytes) => Ok(Object::String(PdfString::new(bytes))),
            Token::HexString(bytes) => Ok(Object::String(PdfString::hex(bytes))),
            Token::Name(name) => Ok(Object::Name(name)),
            Token::ArrayStart => self.parse_array(depth + 1),
            Token::DictStart => self.parse_dictionary(depth + 1),
            Token::Eof => Err(self.syntax_error("Unexpected end of data")),
            other => Err(ParseError::UnexpectedToken {
                expected: "object".to_string(),
                found: format!("{other:?}"),
            }),
        }
    }

    /// `n g R` lookahead; restores the position when it is not a reference.
    fn try_reference(&mut self, number: i64) -> Option<Object> {
        let saved = self.lexer.position();
        let reference = (|| {
            let number = u32::try_from(number).ok()?;
            let generation = match self.lexer.next_token().ok()? {
                Token::Integer(g) => u16::try_from(g).ok()?,
                _ => return None,
            };
            match self.lexer.next_token().ok()? {
                Token::Keyword(k) if k == "R" => {
                    Some(Object::Reference(ObjectId::new(number, generation)))
                }
                _ => None,
            }
        })();
        if reference.is_none() {
            self.lexer.seek(saved);
        }
        reference
    }

    fn parse_array(&mut self, depth: usize) -> ParseResult<Object> {
        if depth > self.max_depth {
            return Err(ParseError::NestingTooDeep(self.max_depth));
        }
        let mut items = Vec::new();
        loop {
            match self.lexer.next_token()? {
                Token::ArrayEnd => break,
                Token::Eof => return Err(self.syntax_error("Unterminated array")),
                token => items.push(self.parse_value(token, depth)?),
            }
        }
        Ok(Object::Array(items))
    }

    fn parse_dictionary(&mut self, depth: usize) -> ParseResult<Object> {
        if depth > self.max_depth {
            return Err(ParseError::NestingTooDeep(self.max_depth));
        }
        let mut dict = Dictionary::new();
        loop {
            let key = match self.lexer.next_token()? {
                Token::DictEnd => break,
                Token::Name(key) => key,
                Token::Eof => return Err(self.syntax_error("Unterminated dictionary")),
                other => {
                    return Err(ParseError::UnexpectedToken {
                        expected: "dictionary key".to_string(),
                        found: format!("{other:?}"),
                    })
                }
            };

            let value = match self.lexer.next_token()? {
                // "/Key >>" leaves the key without a value
                Token::DictEnd => break,
                token => self.parse_value(token, depth)?,
            };

            // A null value is equivalent to an absent entry
            if !value.is_null() {
                dict.set(key, value);
            }
        }
        Ok(Object::Dictionary(dict))
    }

    fn read_stream_data(
        &mut self,
        dict: &Dictionary,
        resolve_length: Option<LengthResolver<'_>>,
    ) -> ParseResult<Vec<u8>> {
        self.lexer.skip_stream_eol();
        let data = self.lexer.data();
        let start = self.lexer.position();

        let declared = match dict.get("Length") {
            Some(Object::Integer(n)) => Some(*n),
            Some(Object::Reference(id)) => resolve_length.and_then(|resolve| resolve(*id)),
            _ => None,
        };

        if let Some(length) = declared.and_then(|n| usize::try_from(n).ok()) {
            if let Some(end) = start.checked_add(length).filter(|end| *end <= data.len()) {
                let mut probe = Lexer::at(data, end);
                if matches!(probe.next_token(), Ok(Token::EndStream)) {
                    self.lexer.seek(probe.position());
                    return Ok(data[start..end].to_vec());
                }
            }
            tracing::debug!("stream Length {length} at offset {start} is wrong, scanning for endstream");
        }

        let marker = self
            .lexer
            .find_ahead(b"endstream")
            .ok_or_else(|| self.syntax_error("Missing endstream"))?;

        let mut end = marker;
        if end > start && data[end - 1] == b'\n' {
            end -= 1;
        }
        if end > start && data[end - 1] == b'\r' {
            end -= 1;
        }

        self.lexer.seek(marker + b"endstream".len());
        Ok(data[start..end].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &[u8]) -> Object {
        ObjectParser::new(input).parse_object().unwrap()
    }

    #[test]
    fn test_parse_primitives() {
        assert_eq!(parse(b"null"), Object::Null);
        assert_eq!(parse(b"true"), Object::Boolean(true));
        assert_eq!(parse(b"-17"), Object::Integer(-17));
        assert_eq!(parse(b"2.5"), Object::Real(2.5));
        assert_eq!(parse(b"/Page"), Object::name("Page"));
        assert_eq!(parse(b"(abc)"), Object::String(PdfString::new(b"abc".to_vec())));
    }

    #[test]
    fn test_parse_reference_vs_integers() {
        assert_eq!(parse(b"12 0 R"), Object::Reference(ObjectId::new(12, 0)));
        assert_eq!(
            parse(b"[1 2 3 0 R 4]"),
            Object::Array(vec![
                Object::Integer(1),
                Object::Integer(2),
                Object::Reference(ObjectId::new(3, 0)),
                Object::Integer(4),
            ])
        );
        assert_eq!(
            parse(b"[0 0 612 792]"),
            Object::Array(vec![0.into(), 0.into(), 612.into(), 792.into()])
        );
    }

    #[test]
    fn test_parse_nested_dictionary() {
        let object = parse(b"<< /Type /Page /MediaBox [0 0 612 792] /Resources << /Font << /F1 5 0 R >> >> /Gone null >>");
        let dict = object.as_dict().unwrap();
        assert_eq!(dict.get_name("Type"), Some("Page"));
        assert_eq!(dict.get_array("MediaBox").unwrap().len(), 4);
        let font = dict.get_dict("Resources").unwrap().get_dict("Font").unwrap();
        assert_eq!(font.get_reference("F1"), Some(ObjectId::new(5, 0)));
        assert!(!dict.contains_key("Gone"));
    }

    #[test]
    fn test_nesting_limit() {
        let mut input = Vec::new();
        input.extend(std::iter::repeat(b'[').take(50));
        input.extend(std::iter::repeat(b']').take(50));
        let err = ObjectParser::new(&input)
            .with_max_depth(10)
            .parse_object()
            .unwrap_err();
        assert!(matches!(err, ParseError::NestingTooDeep(10)));
    }

    #[test]
    fn test_indirect_object_with_stream() {
        let input = b"4 0 obj\n<< /Length 11 >>\nstream\r\nhello world\nendstream\nendobj";
        let (id, object) = ObjectParser::new(input).parse_indirect_object(None).unwrap();
        assert_eq!(id, ObjectId::new(4, 0));
        let stream = object.as_stream().unwrap();
        assert_eq!(stream.data(), b"hello world");
    }

    #[test]
    fn test_stream_with_wrong_length_is_recovered() {
        let input = b"4 0 obj << /Length 3 >> stream\nhello world\nendstream endobj";
        let (_, object) = ObjectParser::new(input).parse_indirect_object(None).unwrap();
        assert_eq!(object.as_stream().unwrap().data(), b"hello world");
        assert_eq!(object.as_dict().unwrap().get_integer("Length"), Some(11));
    }

    #[test]
    fn test_stream_with_indirect_length() {
        let input = b"4 0 obj << /Length 9 0 R >> stream\nabcdendstream\nendobj";
        let resolver = |id: ObjectId| (id == ObjectId::new(9, 0)).then_some(4);
        let (_, object) = ObjectParser::new(input)
            .parse_indirect_object(Some(&resolver))
            .unwrap();
        assert_eq!(object.as_stream().unwrap().data(), b"abcd");
    }

    #[test]
    fn test_missing_endobj_is_tolerated() {
        let input = b"7 0 obj << /A 1 >> 8 0 obj null endobj";
        let mut parser = ObjectParser::new(input);
        let (id, _) = parser.parse_indirect_object(None).unwrap();
        assert_eq!(id.number(), 7);
        let (next, object) = parser.parse_indirect_object(None).unwrap();
        assert_eq!(next.number(), 8);
        assert!(object.is_null());
    }

    #[test]
    fn test_malformed_input() {
        assert!(ObjectParser::new(b"<< /A 1").parse_object().is_err());
        assert!(ObjectParser::new(b"[1 2").parse_object().is_err());
        assert!(ObjectParser::new(b"<< 1 2 >>").parse_object().is_err());
        assert!(ObjectParser::new(b"1 0 foo").parse_indirect_object(None).is_err());
    }
}
