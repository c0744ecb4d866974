use std::fmt;

use tracing::trace;

use super::parse_string_field;

/// The kinds of tokens an ATerm token stream is made of.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    LParen,
    RParen,
    LBracket,
    RBracket,
    String,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::LParen => f.write_str("'('"),
            TokenKind::RParen => f.write_str("')'"),
            TokenKind::LBracket => f.write_str("'['"),
            TokenKind::RBracket => f.write_str("']'"),
            TokenKind::String => f.write_str("string"),
        }
    }
}

/// A single ATerm token. String tokens carry their unescaped value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    LParen,
    RParen,
    LBracket,
    RBracket,
    String(String),
}

impl Token {
    pub fn kind(&self) -> TokenKind {
        match self {
            Token::LParen => TokenKind::LParen,
            Token::RParen => TokenKind::RParen,
            Token::LBracket => TokenKind::LBracket,
            Token::RBracket => TokenKind::RBracket,
            Token::String(_) => TokenKind::String,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::String(s) => write!(f, "{:?}", s),
            other => other.kind().fmt(f),
        }
    }
}

/// Errors produced while reading tokens.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("unexpected character {:?}", char::from(*.0))]
    UnexpectedByte(u8),
    #[error("invalid string literal")]
    InvalidString,
    #[error("expected {expected}, found {found}")]
    UnexpectedToken { expected: String, found: Token },
    #[error("no token to unread")]
    NothingToUnread,
    #[error("expected ','")]
    MissingSeparator,
    #[error("unexpected ','")]
    UnexpectedSeparator,
}

/// A pull-based source of ATerm tokens with one token of pushback.
pub trait TokenSource {
    /// Returns the next token.
    fn read_token(&mut self) -> Result<Token, Error>;

    /// Pushes the token last returned by [TokenSource::read_token] back,
    /// so the next read returns it again.
    /// Only a single token can be pushed back.
    fn unread_token(&mut self) -> Result<(), Error>;

    /// Reads the next token and fails unless it is of the given kind.
    fn expect_token(&mut self, kind: TokenKind) -> Result<Token, Error> {
        let token = self.read_token()?;
        if token.kind() != kind {
            return Err(Error::UnexpectedToken {
                expected: kind.to_string(),
                found: token,
            });
        }
        Ok(token)
    }

    /// Reads the next token, which must be a string, and returns its value.
    fn expect_string(&mut self) -> Result<String, Error> {
        match self.expect_token(TokenKind::String)? {
            Token::String(s) => Ok(s),
            // expect_token checked the kind.
            found => Err(Error::UnexpectedToken {
                expected: TokenKind::String.to_string(),
                found,
            }),
        }
    }
}

/// Splits a byte slice into ATerm tokens.
///
/// Elements of a list or tuple are separated by exactly one `,`. There is
/// no separator after an opening or before a closing bracket, and no
/// whitespace anywhere.
#[derive(Debug)]
pub struct Scanner<'a> {
    input: &'a [u8],
    last: Option<Token>,
    unread: bool,
    /// Whether the last token ended an element, so the next element must be
    /// preceded by a separator.
    after_element: bool,
}

impl<'a> Scanner<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            last: None,
            unread: false,
            after_element: false,
        }
    }

    /// Returns the input that has not been tokenized yet.
    /// A pushed back token is not part of it.
    pub fn remaining(&self) -> &'a [u8] {
        self.input
    }

    fn scan(&mut self) -> Result<Token, Error> {
        let separated = match self.input.split_first() {
            Some((b',', rest)) => {
                self.input = rest;
                true
            }
            _ => false,
        };

        let (token, rest) = match self.input.first() {
            None => return Err(Error::UnexpectedEof),
            Some(b'(') => (Token::LParen, &self.input[1..]),
            Some(b')') => (Token::RParen, &self.input[1..]),
            Some(b'[') => (Token::LBracket, &self.input[1..]),
            Some(b']') => (Token::RBracket, &self.input[1..]),
            Some(b'"') => {
                let (rest, s) = parse_string_field(self.input).map_err(|_| Error::InvalidString)?;
                (Token::String(s), rest)
            }
            Some(b',') => return Err(Error::UnexpectedSeparator),
            Some(c) => return Err(Error::UnexpectedByte(*c)),
        };

        let closing = matches!(token, Token::RParen | Token::RBracket);
        match (self.after_element && !closing, separated) {
            (true, false) => return Err(Error::MissingSeparator),
            (false, true) => return Err(Error::UnexpectedSeparator),
            _ => {}
        }

        self.input = rest;
        self.after_element = closing || matches!(token, Token::String(_));

        Ok(token)
    }
}

impl TokenSource for Scanner<'_> {
    fn read_token(&mut self) -> Result<Token, Error> {
        if self.unread {
            self.unread = false;
            if let Some(token) = &self.last {
                return Ok(token.clone());
            }
        }

        let token = self.scan()?;
        trace!(%token, "scanned token");
        self.last = Some(token.clone());
        Ok(token)
    }

    fn unread_token(&mut self) -> Result<(), Error> {
        if self.unread || self.last.is_none() {
            return Err(Error::NothingToUnread);
        }
        self.unread = true;
        Ok(())
    }
}
