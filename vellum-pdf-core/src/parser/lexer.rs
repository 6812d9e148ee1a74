//! PDF Lexer
//!
//! Tokenizes PDF syntax according to ISO 32000-1 Section 7.2. The lexer works
//! on an in-memory byte slice so callers can save and restore positions freely
//! (reference lookahead, stream data, xref recovery).

use super::{ParseError, ParseResult};

/// PDF Token types
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Boolean: true or false
    Boolean(bool),

    /// Integer number
    Integer(i64),

    /// Real number
    Real(f64),

    /// Literal string `( ... )`
    String(Vec<u8>),

    /// Hexadecimal string `< ... >`
    HexString(Vec<u8>),

    /// Name object (e.g., /Type)
    Name(String),

    /// Left square bracket [
    ArrayStart,

    /// Right square bracket ]
    ArrayEnd,

    /// Dictionary start <<
    DictStart,

    /// Dictionary end >>
    DictEnd,

    /// Stream keyword
    Stream,

    /// Endstream keyword
    EndStream,

    /// Obj keyword
    Obj,

    /// Endobj keyword
    EndObj,

    /// StartXRef keyword
    StartXRef,

    /// Null object
    Null,

    /// Any other bare word: `R`, `xref`, `trailer`, content stream operators
    Keyword(String),

    /// End of input
    Eof,
}

pub(crate) fn is_whitespace(ch: u8) -> bool {
    matches!(ch, b' ' | b'\t' | b'\n' | b'\r' | b'\x0C' | b'\0')
}

pub(crate) fn is_delimiter(ch: u8) -> bool {
    matches!(
        ch,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

fn is_regular(ch: u8) -> bool {
    !is_whitespace(ch) && !is_delimiter(ch)
}

/// PDF Lexer for tokenizing PDF content
pub struct Lexer<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    pub fn at(data: &'a [u8], position: usize) -> Self {
        Self {
            data,
            position: position.min(data.len()),
        }
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn seek(&mut self, position: usize) {
        self.position = position.min(self.data.len());
    }

    pub fn is_eof(&self) -> bool {
        self.position >= self.data.len()
    }

    fn peek_char(&self) -> Option<u8> {
        self.data.get(self.position).copied()
    }

    fn consume_char(&mut self) -> Option<u8> {
        let ch = self.peek_char()?;
        self.position += 1;
        Some(ch)
    }

    fn syntax_error(&self, message: impl Into<String>) -> ParseError {
        ParseError::SyntaxError {
            position: self.position,
            message: message.into(),
        }
    }

    /// Skip whitespace and comments
    pub fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek_char() {
            if is_whitespace(ch) {
                self.position += 1;
            } else if ch == b'%' {
                while let Some(c) = self.peek_char() {
                    if c == b'\n' || c == b'\r' {
                        break;
                    }
                    self.position += 1;
                }
            } else {
                break;
            }
        }
    }

    /// Get the next token
    pub fn next_token(&mut self) -> ParseResult<Token> {
        self.skip_whitespace();

        let ch = match self.peek_char() {
            Some(ch) => ch,
            None => return Ok(Token::Eof),
        };

        match ch {
            b'/' => self.read_name(),
            b'(' => self.read_literal_string(),
            b'<' => self.read_angle_bracket(),
            b'>' => {
                self.consume_char();
                if self.peek_char() == Some(b'>') {
                    self.consume_char();
                    Ok(Token::DictEnd)
                } else {
                    Err(self.syntax_error("Expected '>' after '>'"))
                }
            }
            b'[' => {
                self.consume_char();
                Ok(Token::ArrayStart)
            }
            b']' => {
                self.consume_char();
                Ok(Token::ArrayEnd)
            }
            b'{' | b'}' => {
                self.consume_char();
                Ok(Token::Keyword((ch as char).to_string()))
            }
            b'+' | b'-' | b'0'..=b'9' | b'.' => self.read_number(),
            b')' => {
                self.consume_char();
                Err(self.syntax_error("Unbalanced ')'"))
            }
            _ => self.read_keyword(),
        }
    }

    /// Peek the next token without consuming it
    pub fn peek_token(&mut self) -> ParseResult<Token> {
        let saved = self.position;
        let token = self.next_token();
        self.position = saved;
        token
    }

    /// Read a name object (e.g., /Type)
    fn read_name(&mut self) -> ParseResult<Token> {
        self.consume_char(); // consume '/'
        let mut name = String::new();

        while let Some(ch) = self.peek_char() {
            if !is_regular(ch) {
                break;
            }
            self.consume_char();

            // Handle hex codes in names (e.g., /A#20B means /A B)
            if ch == b'#' {
                let hex = self
                    .data
                    .get(self.position..self.position + 2)
                    .and_then(|pair| std::str::from_utf8(pair).ok())
                    .and_then(|pair| u8::from_str_radix(pair, 16).ok());
                match hex {
                    Some(value) => {
                        self.position += 2;
                        name.push(value as char);
                    }
                    // A lone '#' is kept literally
                    None => name.push('#'),
                }
            } else {
                name.push(ch as char);
            }
        }

        Ok(Token::Name(name))
    }

    /// Read a literal string (parentheses)
    fn read_literal_string(&mut self) -> ParseResult<Token> {
        self.consume_char(); // consume '('
        let mut string = Vec::new();
        let mut paren_depth = 1;

        while paren_depth > 0 {
            let ch = self
                .consume_char()
                .ok_or_else(|| self.syntax_error("Unterminated string"))?;

            match ch {
                b'\\' => {
                    let escaped = self
                        .consume_char()
                        .ok_or_else(|| self.syntax_error("Unterminated string"))?;
                    match escaped {
                        b'n' => string.push(b'\n'),
                        b'r' => string.push(b'\r'),
                        b't' => string.push(b'\t'),
                        b'b' => string.push(b'\x08'),
                        b'f' => string.push(b'\x0C'),
                        b'0'..=b'7' => {
                            let mut value = (escaped - b'0') as u32;
                            for _ in 0..2 {
                                match self.peek_char() {
                                    Some(next @ b'0'..=b'7') => {
                                        self.consume_char();
                                        value = value * 8 + (next - b'0') as u32;
                                    }
                                    _ => break,
                                }
                            }
                            string.push((value & 0xFF) as u8);
                        }
                        // Backslash at end of line: line continuation
                        b'\r' => {
                            if self.peek_char() == Some(b'\n') {
                                self.consume_char();
                            }
                        }
                        b'\n' => {}
                        other => string.push(other),
                    }
                }
                b'(' => {
                    paren_depth += 1;
                    string.push(ch);
                }
                b')' => {
                    paren_depth -= 1;
                    if paren_depth > 0 {
                        string.push(ch);
                    }
                }
                // Unescaped EOL sequences read as a single line feed
                b'\r' => {
                    if self.peek_char() == Some(b'\n') {
                        self.consume_char();
                    }
                    string.push(b'\n');
                }
                _ => string.push(ch),
            }
        }

        Ok(Token::String(string))
    }

    /// Read angle bracket tokens (hex strings or dict markers)
    fn read_angle_bracket(&mut self) -> ParseResult<Token> {
        self.consume_char(); // consume '<'

        if self.peek_char() == Some(b'<') {
            self.consume_char();
            return Ok(Token::DictStart);
        }

        let mut nibbles = Vec::new();
        loop {
            let ch = self
                .consume_char()
                .ok_or_else(|| self.syntax_error("Unterminated hex string"))?;
            match ch {
                b'>' => break,
                b'0'..=b'9' => nibbles.push(ch - b'0'),
                b'a'..=b'f' => nibbles.push(ch - b'a' + 10),
                b'A'..=b'F' => nibbles.push(ch - b'A' + 10),
                _ if is_whitespace(ch) => {}
                _ => return Err(self.syntax_error("Invalid character in hex string")),
            }
        }

        // Pad with 0 if odd number of digits
        if nibbles.len() % 2 != 0 {
            nibbles.push(0);
        }

        let bytes = nibbles
            .chunks(2)
            .map(|pair| (pair[0] << 4) | pair[1])
            .collect();
        Ok(Token::HexString(bytes))
    }

    /// Read a number (integer or real)
    fn read_number(&mut self) -> ParseResult<Token> {
        let start = self.position;
        let mut has_dot = false;
        let mut digits = 0usize;

        if matches!(self.peek_char(), Some(b'+') | Some(b'-')) {
            self.consume_char();
            // Tolerate doubled signs such as "--5"
            while matches!(self.peek_char(), Some(b'+') | Some(b'-')) {
                self.consume_char();
            }
        }

        while let Some(ch) = self.peek_char() {
            match ch {
                b'0'..=b'9' => {
                    self.consume_char();
                    digits += 1;
                }
                b'.' if !has_dot => {
                    self.consume_char();
                    has_dot = true;
                }
                _ => break,
            }
        }

        // Swallow garbage glued to a number ("12.5.3", "7abc") up to the next delimiter
        let end = self.position;
        while let Some(ch) = self.peek_char() {
            if !is_regular(ch) {
                break;
            }
            self.consume_char();
        }

        let text = String::from_utf8_lossy(&self.data[start..end]).into_owned();
        let normalized = normalize_sign(&text);

        if digits == 0 {
            if has_dot || normalized.len() < text.len() || text == "+" || text == "-" {
                // "-" or "." alone: readers treat these as zero
                return Ok(Token::Integer(0));
            }
            return Err(self.syntax_error(format!("Invalid number: '{text}'")));
        }

        if has_dot {
            normalized
                .parse::<f64>()
                .map(Token::Real)
                .map_err(|_| self.syntax_error(format!("Invalid real number: '{text}'")))
        } else {
            match normalized.parse::<i64>() {
                Ok(value) => Ok(Token::Integer(value)),
                // Out of range integers degrade to reals
                Err(_) => normalized
                    .parse::<f64>()
                    .map(Token::Real)
                    .map_err(|_| self.syntax_error(format!("Invalid integer: '{text}'"))),
            }
        }
    }

    /// Read a keyword
    fn read_keyword(&mut self) -> ParseResult<Token> {
        let word = self.read_word();
        if word.is_empty() {
            let ch = self.consume_char().unwrap_or(0);
            return Err(self.syntax_error(format!("Unexpected character: {}", ch as char)));
        }
        Ok(match word.as_str() {
            "true" => Token::Boolean(true),
            "false" => Token::Boolean(false),
            "null" => Token::Null,
            "stream" => Token::Stream,
            "endstream" => Token::EndStream,
            "obj" => Token::Obj,
            "endobj" => Token::EndObj,
            "startxref" => Token::StartXRef,
            _ => Token::Keyword(word),
        })
    }

    /// Read a word (sequence of regular characters)
    fn read_word(&mut self) -> String {
        let start = self.position;
        while let Some(ch) = self.peek_char() {
            if !is_regular(ch) {
                break;
            }
            self.position += 1;
        }
        String::from_utf8_lossy(&self.data[start..self.position]).into_owned()
    }

    /// Skip the end-of-line marker that follows the `stream` keyword.
    pub fn skip_stream_eol(&mut self) {
        match self.peek_char() {
            Some(b'\r') => {
                self.consume_char();
                if self.peek_char() == Some(b'\n') {
                    self.consume_char();
                }
            }
            Some(b'\n') => {
                self.consume_char();
            }
            // Some writers put spaces before the EOL
            Some(b' ') => {
                let saved = self.position;
                while self.peek_char() == Some(b' ') {
                    self.consume_char();
                }
                if !matches!(self.peek_char(), Some(b'\r') | Some(b'\n')) {
                    self.position = saved;
                } else {
                    self.skip_stream_eol();
                }
            }
            _ => {}
        }
    }

    /// Read exactly n bytes
    pub fn read_bytes(&mut self, n: usize) -> ParseResult<&'a [u8]> {
        let end = self
            .position
            .checked_add(n)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| self.syntax_error(format!("Cannot read {n} bytes past end of data")))?;
        let bytes = &self.data[self.position..end];
        self.position = end;
        Ok(bytes)
    }

    /// Offset of the next occurrence of `needle` at or after the current position.
    pub fn find_ahead(&self, needle: &[u8]) -> Option<usize> {
        find_subslice(&self.data[self.position..], needle).map(|i| i + self.position)
    }

    /// Skip binary inline-image data after an `ID` operator, up to and including `EI`.
    pub fn skip_inline_image_data(&mut self) {
        // A single whitespace byte separates ID from the data
        self.consume_char();
        while self.position < self.data.len() {
            if self.data[self.position..].starts_with(b"EI")
                && self.position > 0
                && is_whitespace(self.data[self.position - 1])
                && self
                    .data
                    .get(self.position + 2)
                    .map_or(true, |&c| !is_regular(c))
            {
                self.position += 2;
                return;
            }
            self.position += 1;
        }
    }
}

fn normalize_sign(text: &str) -> String {
    let negative = text.starts_with('-');
    let body = text.trim_start_matches(['+', '-']);
    if negative {
        format!("-{body}")
    } else {
        body.to_string()
    }
}

/// First index of `needle` within `haystack`.
pub fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Last index of `needle` within `haystack`.
pub fn rfind_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).rposition(|w| w == needle)
}
