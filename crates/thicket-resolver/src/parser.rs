//! Recursive-descent parser for version expressions.
//!
//! ```text
//! expression := factor ( ws "||" ws factor )*
//! factor     := term ( ws "-"? ws term )?
//! term       := "*" | url | op? ws version
//! version    := "v"? number ( "." number ( "." number tail? )? )?
//! tail       := "-" digits ( ("-" | ".") tag )? | ("-" | ".")? tag
//! number     := digits | "x" | "X"
//! ```

use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

use crate::expression::{Expression, Op};
use crate::version::Version;

/// URL schemes accepted in expressions.
const SCHEMES: [&str; 6] = ["git+https", "git+http", "git+ssh", "https", "http", "git"];

/// Malformed version expression.
#[derive(Debug, Error, Diagnostic)]
#[error("invalid version expression `{input}`: {message}")]
#[diagnostic(code(thicket::parse))]
pub struct ParseError {
    #[source_code]
    input: String,
    #[label("here")]
    span: SourceSpan,
    offset: usize,
    message: String,
    expected: Vec<&'static str>,
}

impl ParseError {
    fn new(input: &str, offset: usize, message: String, expected: Vec<&'static str>) -> Self {
        let len = usize::from(offset < input.len());
        Self {
            input: input.to_string(),
            span: (offset, len).into(),
            offset,
            message,
            expected,
        }
    }

    /// Byte offset of the offending input.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Tokens that would have been accepted at [`ParseError::offset`].
    pub fn expected(&self) -> &[&'static str] {
        &self.expected
    }

    pub fn input(&self) -> &str {
        &self.input
    }
}

/// Parse a full expression. Blank input is [`Expression::Any`].
pub fn parse(input: &str) -> Result<Expression, ParseError> {
    if input.trim().is_empty() {
        return Ok(Expression::Any);
    }
    let mut parser = Parser::new(input);
    parser.skip_ws();
    let expr = parser.expression()?;
    parser.skip_ws();
    if !parser.at_end() {
        return Err(parser.expected(&["\"||\"", "end of input"]));
    }
    Ok(expr)
}

/// Parse a single version with no operator.
pub fn parse_version(input: &str) -> Result<Version, ParseError> {
    let mut parser = Parser::new(input);
    parser.skip_ws();
    let version = parser.version()?;
    parser.skip_ws();
    if !parser.at_end() {
        return Err(parser.expected(&["end of input"]));
    }
    Ok(version)
}

enum Prefix {
    Relational(Op),
    Tilde,
}

enum Number {
    Value(u64),
    Wildcard,
}

struct Parser<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.peek_at(0)
    }

    fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.bytes.get(self.pos + ahead).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.bytes[self.pos..].starts_with(token.as_bytes()) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn expected(&self, tokens: &[&'static str]) -> ParseError {
        let message = format!("expected {} at offset {}", tokens.join(" or "), self.pos);
        ParseError::new(self.input, self.pos, message, tokens.to_vec())
    }

    fn error_at(&self, offset: usize, message: &str) -> ParseError {
        ParseError::new(
            self.input,
            offset,
            format!("{message} at offset {offset}"),
            Vec::new(),
        )
    }

    fn expression(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.factor()?;
        loop {
            let save = self.pos;
            self.skip_ws();
            if !self.eat("||") {
                self.pos = save;
                return Ok(left);
            }
            self.skip_ws();
            let right = self.factor()?;
            left = Expression::Or(Box::new(left), Box::new(right));
        }
    }

    fn factor(&mut self) -> Result<Expression, ParseError> {
        let left = self.term()?;
        let save = self.pos;
        self.skip_ws();
        let dashed = self.eat("-");
        self.skip_ws();
        if !dashed && !self.at_term_start() {
            self.pos = save;
            return Ok(left);
        }
        let right = self.term()?;
        Ok(Expression::juxtapose(left, right))
    }

    fn at_term_start(&self) -> bool {
        match self.peek() {
            Some(b) if b.is_ascii_digit() => true,
            Some(b'v' | b'x' | b'X' | b'*' | b'=' | b'<' | b'>' | b'~') => true,
            _ => self.scheme_len().is_some(),
        }
    }

    fn term(&mut self) -> Result<Expression, ParseError> {
        if self.eat("*") {
            return Ok(Expression::Any);
        }
        if let Some(url) = self.url()? {
            return Ok(Expression::Url(url));
        }
        let prefix = self.prefix();
        if prefix.is_some() {
            self.skip_ws();
        }
        let version = self.version()?;
        Ok(match prefix {
            None if version.has_wildcard() => Expression::XRange(version),
            None => Expression::Exact(version),
            Some(Prefix::Tilde) => Expression::Tilde(version),
            Some(Prefix::Relational(op)) => Expression::Relational(op, version),
        })
    }

    fn prefix(&mut self) -> Option<Prefix> {
        // Two-character operators first.
        const OPS: [(&str, Op); 5] = [
            (">=", Op::Ge),
            ("<=", Op::Le),
            (">", Op::Gt),
            ("<", Op::Lt),
            ("=", Op::Eq),
        ];
        if self.eat("~") {
            return Some(Prefix::Tilde);
        }
        OPS.iter()
            .find(|(token, _)| self.eat(token))
            .map(|(_, op)| Prefix::Relational(*op))
    }

    /// Length of a recognized `scheme://` at the cursor.
    fn scheme_len(&self) -> Option<usize> {
        let rest = &self.bytes[self.pos..];
        SCHEMES.iter().find_map(|scheme| {
            let n = scheme.len();
            let matches = rest.len() > n + 3
                && rest[..n].eq_ignore_ascii_case(scheme.as_bytes())
                && rest[n..].starts_with(b"://");
            matches.then_some(n + 3)
        })
    }

    fn url(&mut self) -> Result<Option<String>, ParseError> {
        let Some(len) = self.scheme_len() else {
            return Ok(None);
        };
        let start = self.pos;
        self.pos += len;
        let body = self.pos;
        while self.peek().is_some_and(is_uri_char) {
            self.pos += 1;
        }
        if self.pos == body {
            return Err(self.expected(&["uri"]));
        }
        Ok(Some(self.input[start..self.pos].to_string()))
    }

    fn version(&mut self) -> Result<Version, ParseError> {
        let start = self.pos;
        self.eat("v");

        let mut numbers = [0u64; 4];
        let mut wildcard = None;
        let major_at = self.pos;
        match self.number()? {
            Number::Value(n) => numbers[0] = n,
            Number::Wildcard => return Err(self.error_at(major_at, "`x` is not allowed for major")),
        }

        let mut components = 1u8;
        for slot in 1..3 {
            if self.peek() != Some(b'.') || !self.peek_at(1).is_some_and(is_number_start) {
                break;
            }
            self.pos += 1;
            match self.number()? {
                Number::Value(n) => numbers[slot] = n,
                Number::Wildcard => {
                    wildcard.get_or_insert(slot as u8);
                }
            }
            components += 1;
        }

        let tag = if components == 3 {
            self.tail(&mut numbers[3])?
        } else {
            None
        };

        let text = self.input[start..self.pos].to_string();
        Ok(Version::from_parts(numbers, tag, text, components, wildcard))
    }

    fn number(&mut self) -> Result<Number, ParseError> {
        match self.peek() {
            Some(b'x' | b'X') => {
                self.pos += 1;
                Ok(Number::Wildcard)
            }
            Some(b) if b.is_ascii_digit() => self.digits().map(Number::Value),
            _ => Err(self.expected(&["number", "\"x\""])),
        }
    }

    fn digits(&mut self) -> Result<u64, ParseError> {
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.expected(&["number"]));
        }
        self.input[start..self.pos]
            .parse()
            .map_err(|_| self.error_at(start, "number is too large"))
    }

    /// Build number and/or tag after `major.minor.incremental`.
    fn tail(&mut self, build: &mut u64) -> Result<Option<String>, ParseError> {
        let separated_tag = |p: &Self| {
            matches!(p.peek(), Some(b'-' | b'.')) && p.peek_at(1).is_some_and(is_tag_start)
        };

        if self.peek() == Some(b'-') && self.peek_at(1).is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
            *build = self.digits()?;
            if separated_tag(self) {
                self.pos += 1;
                return Ok(Some(self.tag()));
            }
            return Ok(None);
        }
        if separated_tag(self) {
            self.pos += 1;
            return Ok(Some(self.tag()));
        }
        if self.peek().is_some_and(|b| b.is_ascii_alphabetic()) {
            return Ok(Some(self.tag()));
        }
        Ok(None)
    }

    fn tag(&mut self) -> String {
        let start = self.pos;
        while self.peek().is_some_and(is_tag_char) {
            self.pos += 1;
        }
        self.input[start..self.pos].to_string()
    }
}

fn is_number_start(b: u8) -> bool {
    b.is_ascii_digit() || b == b'x' || b == b'X'
}

fn is_tag_start(b: u8) -> bool {
    b.is_ascii_alphanumeric()
}

fn is_tag_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'.' || b == b'-'
}

fn is_uri_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"-+&@/%#?=~_|!:,.;".contains(&b)
}
