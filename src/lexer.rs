//! Tokenizer for litelog source text.
//!
//! Identifiers are ASCII `[A-Za-z0-9_]+`. An identifier starting with a
//! lowercase letter or a digit is a symbol (constant or predicate name); one
//! starting with an uppercase letter or `_` is a variable. Whitespace and `%`
//! line comments separate tokens and are never emitted.

use std::fmt;

use nom::{
    branch::alt,
    bytes::complete::{tag, take_till, take_while},
    character::complete::{char, multispace1, satisfy},
    combinator::{map, recognize, value},
    multi::many0_count,
    sequence::pair,
    IResult,
};

use crate::error::LexError;

/// A lexical token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    /// Lowercase- or digit-leading identifier
    Symbol(&'a str),
    /// Uppercase- or underscore-leading identifier
    Variable(&'a str),
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `,`
    Comma,
    /// `.`
    Period,
    /// `:-`
    Implies,
    /// End of input
    End,
}

impl Token<'_> {
    /// The token's class.
    #[must_use]
    pub fn kind(&self) -> TokenKind {
        match self {
            Token::Symbol(_) => TokenKind::Symbol,
            Token::Variable(_) => TokenKind::Variable,
            Token::LParen => TokenKind::LParen,
            Token::RParen => TokenKind::RParen,
            Token::Comma => TokenKind::Comma,
            Token::Period => TokenKind::Period,
            Token::Implies => TokenKind::Implies,
            Token::End => TokenKind::End,
        }
    }
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Symbol(name) => write!(f, "symbol `{name}`"),
            Token::Variable(name) => write!(f, "variable `{name}`"),
            other => other.kind().fmt(f),
        }
    }
}

/// Token classes, used to describe what the parser expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TokenKind {
    /// See [`Token::Symbol`]
    Symbol,
    /// See [`Token::Variable`]
    Variable,
    /// See [`Token::LParen`]
    LParen,
    /// See [`Token::RParen`]
    RParen,
    /// See [`Token::Comma`]
    Comma,
    /// See [`Token::Period`]
    Period,
    /// See [`Token::Implies`]
    Implies,
    /// See [`Token::End`]
    End,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TokenKind::Symbol => "symbol",
            TokenKind::Variable => "variable",
            TokenKind::LParen => "`(`",
            TokenKind::RParen => "`)`",
            TokenKind::Comma => "`,`",
            TokenKind::Period => "`.`",
            TokenKind::Implies => "`:-`",
            TokenKind::End => "end of input",
        })
    }
}

/// A token together with the byte offset where it starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned<'a> {
    /// The token
    pub token: Token<'a>,
    /// Byte offset into the source
    pub offset: usize,
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn symbol(input: &str) -> IResult<&str, Token<'_>> {
    map(
        recognize(pair(
            satisfy(|c| c.is_ascii_lowercase() || c.is_ascii_digit()),
            take_while(is_ident_char),
        )),
        Token::Symbol,
    )(input)
}

fn variable(input: &str) -> IResult<&str, Token<'_>> {
    map(
        recognize(pair(
            satisfy(|c| c.is_ascii_uppercase() || c == '_'),
            take_while(is_ident_char),
        )),
        Token::Variable,
    )(input)
}

fn punctuation(input: &str) -> IResult<&str, Token<'_>> {
    alt((
        value(Token::Implies, tag(":-")),
        value(Token::LParen, char('(')),
        value(Token::RParen, char(')')),
        value(Token::Comma, char(',')),
        value(Token::Period, char('.')),
    ))(input)
}

fn token(input: &str) -> IResult<&str, Token<'_>> {
    alt((symbol, variable, punctuation))(input)
}

fn comment(input: &str) -> IResult<&str, &str> {
    recognize(pair(char('%'), take_till(|c: char| c == '\n')))(input)
}

fn trivia(input: &str) -> IResult<&str, usize> {
    many0_count(alt((multispace1, comment)))(input)
}

/// Lazy token stream over a source string.
///
/// Yields [`Token::End`] exactly once at the end of input, then `None`.
/// After an error the stream is exhausted too. [`Lexer::reset`] rewinds it.
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    source: &'a str,
    offset: usize,
    done: bool,
}

impl<'a> Lexer<'a> {
    /// Create a lexer positioned at the start of `source`.
    #[must_use]
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            offset: 0,
            done: false,
        }
    }

    /// Rewind to the start of the source.
    pub fn reset(&mut self) {
        self.offset = 0;
        self.done = false;
    }

    /// Current byte offset.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The whole source text.
    #[must_use]
    pub fn source(&self) -> &'a str {
        self.source
    }

    fn next_token(&mut self) -> Result<Spanned<'a>, LexError> {
        let rest = &self.source[self.offset..];
        let rest = trivia(rest).map_or(rest, |(rest, _)| rest);
        self.offset = self.source.len() - rest.len();

        if rest.is_empty() {
            self.done = true;
            return Ok(Spanned {
                token: Token::End,
                offset: self.offset,
            });
        }

        match token(rest) {
            Ok((remaining, token)) => {
                let spanned = Spanned {
                    token,
                    offset: self.offset,
                };
                self.offset = self.source.len() - remaining.len();
                log::trace!(target: "lexer", "{:?} at {}", spanned.token, spanned.offset);
                Ok(spanned)
            }
            Err(_) => {
                self.done = true;
                let character = rest.chars().next().unwrap_or_default();
                Err(LexError {
                    offset: self.offset,
                    character,
                })
            }
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Spanned<'a>, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        Some(self.next_token())
    }
}
