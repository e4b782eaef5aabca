//! Pull-based JSON token cursor.
//!
//! The cursor tracks container nesting itself, so callers only ever see value tokens and
//! member keys: separators (`,` `:`) are consumed and checked internally. A member key is
//! returned as a [`Token::String`] while the enclosing object expects a key.

use crate::error::DecodeError;
use std::borrow::Cow;

#[derive(Debug, Clone, PartialEq)]
pub enum Token<'a> {
    ObjectStart,
    ObjectEnd,
    ArrayStart,
    ArrayEnd,
    Null,
    Bool(bool),
    /// Number text exactly as written.
    Number(&'a str),
    String(Cow<'a, str>),
}

impl Token<'_> {
    /// Short name used in type errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Token::ObjectStart | Token::ObjectEnd => "object",
            Token::ArrayStart | Token::ArrayEnd => "array",
            Token::Null => "null",
            Token::Bool(_) => "boolean",
            Token::Number(_) => "number",
            Token::String(_) => "string",
        }
    }

    pub fn is_container_start(&self) -> bool {
        matches!(self, Token::ObjectStart | Token::ArrayStart)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Frame {
    Array { started: bool },
    Object { started: bool, want_key: bool },
}

#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    src: &'a str,
    pos: usize,
    stack: Vec<Frame>,
    last_start: usize,
    top_done: bool,
}

impl<'a> Cursor<'a> {
    pub fn new(src: &'a str) -> Self {
        Cursor {
            src,
            pos: 0,
            stack: Vec::new(),
            last_start: 0,
            top_done: false,
        }
    }

    pub fn from_slice(bytes: &'a [u8]) -> Result<Self, DecodeError> {
        let src = std::str::from_utf8(bytes).map_err(|e| DecodeError::syntax(e.valid_up_to(), "invalid UTF-8"))?;
        Ok(Cursor::new(src))
    }

    /// Byte offset where the most recently returned token begins.
    pub fn last_start(&self) -> usize {
        self.last_start
    }

    pub fn offset(&self) -> usize {
        self.pos
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    fn err(&self, offset: usize, message: impl Into<String>) -> DecodeError {
        DecodeError::syntax(offset, message)
    }

    fn skip_ws(&mut self) {
        let bytes = self.src.as_bytes();
        while self.pos < bytes.len() && matches!(bytes[self.pos], b' ' | b'\t' | b'\n' | b'\r') {
            self.pos += 1;
        }
    }

    fn peek_byte(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn expect_byte(&mut self, b: u8) -> Result<(), DecodeError> {
        self.skip_ws();
        match self.peek_byte() {
            Some(c) if c == b => {
                self.pos += 1;
                Ok(())
            }
            Some(c) => Err(self.err(self.pos, format!("expected '{}', found '{}'", b as char, c as char))),
            None => Err(self.err(self.pos, format!("expected '{}', found end of input", b as char))),
        }
    }

    /// Next token, or a syntax error. Returns an error at end of input.
    pub fn next_token(&mut self) -> Result<Token<'a>, DecodeError> {
        self.skip_ws();
        match self.stack.last().copied() {
            None => {
                if self.top_done {
                    return Err(self.err(self.pos, "unexpected data after value"));
                }
            }
            Some(Frame::Array { started }) => {
                if self.peek_byte() == Some(b']') {
                    self.last_start = self.pos;
                    self.pos += 1;
                    self.stack.pop();
                    self.value_done();
                    return Ok(Token::ArrayEnd);
                }
                if started {
                    self.expect_byte(b',')?;
                    self.skip_ws();
                }
                if let Some(Frame::Array { started }) = self.stack.last_mut() {
                    *started = true;
                }
            }
            Some(Frame::Object { started, want_key: true }) => {
                if self.peek_byte() == Some(b'}') {
                    self.last_start = self.pos;
                    self.pos += 1;
                    self.stack.pop();
                    self.value_done();
                    return Ok(Token::ObjectEnd);
                }
                if started {
                    self.expect_byte(b',')?;
                    self.skip_ws();
                }
                self.last_start = self.pos;
                if self.peek_byte() != Some(b'"') {
                    return Err(self.err(self.pos, "expected member name"));
                }
                let key = self.read_string()?;
                self.expect_byte(b':')?;
                if let Some(Frame::Object { started, want_key }) = self.stack.last_mut() {
                    *started = true;
                    *want_key = false;
                }
                return Ok(Token::String(key));
            }
            Some(Frame::Object { want_key: false, .. }) => {
                if let Some(Frame::Object { want_key, .. }) = self.stack.last_mut() {
                    *want_key = true;
                }
            }
        }
        self.read_value_token()
    }

    fn value_done(&mut self) {
        if self.stack.is_empty() {
            self.top_done = true;
        }
    }

    fn read_value_token(&mut self) -> Result<Token<'a>, DecodeError> {
        self.skip_ws();
        self.last_start = self.pos;
        let b = match self.peek_byte() {
            Some(b) => b,
            None => return Err(self.err(self.pos, "unexpected end of input")),
        };
        let tok = match b {
            b'{' => {
                self.pos += 1;
                self.stack.push(Frame::Object {
                    started: false,
                    want_key: true,
                });
                return Ok(Token::ObjectStart);
            }
            b'[' => {
                self.pos += 1;
                self.stack.push(Frame::Array { started: false });
                return Ok(Token::ArrayStart);
            }
            b'"' => Token::String(self.read_string()?),
            b't' => self.read_literal("true", Token::Bool(true))?,
            b'f' => self.read_literal("false", Token::Bool(false))?,
            b'n' => self.read_literal("null", Token::Null)?,
            b'-' | b'0'..=b'9' => Token::Number(self.read_number()?),
            b']' | b'}' => return Err(self.err(self.pos, format!("unexpected '{}'", b as char))),
            other => return Err(self.err(self.pos, format!("unexpected character '{}'", other as char))),
        };
        self.value_done();
        Ok(tok)
    }

    fn read_literal(&mut self, word: &str, tok: Token<'a>) -> Result<Token<'a>, DecodeError> {
        if self.src[self.pos..].starts_with(word) {
            self.pos += word.len();
            Ok(tok)
        } else {
            Err(self.err(self.pos, "invalid literal"))
        }
    }

    fn read_number(&mut self) -> Result<&'a str, DecodeError> {
        let bytes = self.src.as_bytes();
        let start = self.pos;
        let mut i = self.pos;
        let digits = |i: &mut usize| {
            let s = *i;
            while *i < bytes.len() && bytes[*i].is_ascii_digit() {
                *i += 1;
            }
            *i - s
        };
        if bytes.get(i) == Some(&b'-') {
            i += 1;
        }
        let int_start = i;
        let n = digits(&mut i);
        if n == 0 || (n > 1 && bytes[int_start] == b'0') {
            return Err(self.err(start, "invalid number"));
        }
        if bytes.get(i) == Some(&b'.') {
            i += 1;
            if digits(&mut i) == 0 {
                return Err(self.err(start, "invalid number"));
            }
        }
        if matches!(bytes.get(i), Some(b'e' | b'E')) {
            i += 1;
            if matches!(bytes.get(i), Some(b'+' | b'-')) {
                i += 1;
            }
            if digits(&mut i) == 0 {
                return Err(self.err(start, "invalid number"));
            }
        }
        self.pos = i;
        Ok(&self.src[start..i])
    }

    fn read_string(&mut self) -> Result<Cow<'a, str>, DecodeError> {
        let start = self.pos;
        self.pos += 1;
        let body_start = self.pos;
        let bytes = self.src.as_bytes();
        // Fast path: no escapes.
        while self.pos < bytes.len() {
            match bytes[self.pos] {
                b'"' => {
                    let s = &self.src[body_start..self.pos];
                    self.pos += 1;
                    return Ok(Cow::Borrowed(s));
                }
                b'\\' => break,
                c if c < 0x20 => return Err(self.err(self.pos, "control character in string")),
                _ => self.pos += 1,
            }
        }
        let mut out = String::from(&self.src[body_start..self.pos]);
        loop {
            let c = match self.src[self.pos..].chars().next() {
                Some(c) => c,
                None => return Err(self.err(start, "unterminated string")),
            };
            match c {
                '"' => {
                    self.pos += 1;
                    return Ok(Cow::Owned(out));
                }
                '\\' => {
                    self.pos += 1;
                    let e = self.peek_byte().ok_or_else(|| self.err(start, "unterminated string"))?;
                    self.pos += 1;
                    match e {
                        b'"' => out.push('"'),
                        b'\\' => out.push('\\'),
                        b'/' => out.push('/'),
                        b'b' => out.push('\u{8}'),
                        b'f' => out.push('\u{c}'),
                        b'n' => out.push('\n'),
                        b'r' => out.push('\r'),
                        b't' => out.push('\t'),
                        b'u' => out.push(self.read_unicode_escape()?),
                        _ => return Err(self.err(self.pos - 1, "invalid escape")),
                    }
                }
                c if (c as u32) < 0x20 => return Err(self.err(self.pos, "control character in string")),
                c => {
                    out.push(c);
                    self.pos += c.len_utf8();
                }
            }
        }
    }

    fn read_hex4(&mut self) -> Result<u32, DecodeError> {
        let hex = self
            .src
            .get(self.pos..self.pos + 4)
            .ok_or_else(|| self.err(self.pos, "truncated \\u escape"))?;
        let v = u32::from_str_radix(hex, 16).map_err(|_| self.err(self.pos, "invalid \\u escape"))?;
        self.pos += 4;
        Ok(v)
    }

    fn read_unicode_escape(&mut self) -> Result<char, DecodeError> {
        let at = self.pos;
        let hi = self.read_hex4()?;
        let code = if (0xD800..0xDC00).contains(&hi) {
            if !self.src[self.pos..].starts_with("\\u") {
                return Err(self.err(at, "unpaired surrogate"));
            }
            self.pos += 2;
            let lo = self.read_hex4()?;
            if !(0xDC00..0xE000).contains(&lo) {
                return Err(self.err(at, "unpaired surrogate"));
            }
            0x10000 + ((hi - 0xD800) << 10) + (lo - 0xDC00)
        } else {
            hi
        };
        char::from_u32(code).ok_or_else(|| self.err(at, "invalid code point"))
    }

    /// Consume the rest of a value whose first token was `first`.
    pub fn skip_from(&mut self, first: &Token<'_>) -> Result<(), DecodeError> {
        if !first.is_container_start() {
            return Ok(());
        }
        let target = self.stack.len() - 1;
        while self.stack.len() > target {
            self.next_token()?;
        }
        Ok(())
    }

    /// Consume the rest of a value and return its verbatim source text.
    pub fn capture_from(&mut self, first: &Token<'_>) -> Result<&'a str, DecodeError> {
        let start = self.last_start;
        self.skip_from(first)?;
        Ok(&self.src[start..self.pos])
    }

    /// Require that only whitespace remains.
    pub fn finish(&mut self) -> Result<(), DecodeError> {
        self.skip_ws();
        if self.pos < self.src.len() {
            return Err(DecodeError::TrailingData { offset: self.pos });
        }
        Ok(())
    }
}
