//! Recursive-descent parser.
//!
//! ```text
//! program := clause*
//! clause  := atom ('.' | ':-' body '.')
//! body    := atom (',' atom)*
//! atom    := SYMBOL '(' (term (',' term)*)? ')' | SYMBOL
//! term    := SYMBOL | VARIABLE
//! ```

use crate::ast::{Atom, Clause, Interner, Rule, Term, Variable};
use crate::error::{ParseError, Result, SemanticError};
use crate::lexer::{Lexer, Spanned, Token, TokenKind};
use crate::program::Program;

/// Parse and validate a complete program.
///
/// # Errors
///
/// Returns the first lexical, syntactic or semantic error found.
pub fn parse_program(source: &str) -> Result<Program> {
    Parser::new(source).parse_program()
}

/// Parser state for one source text.
///
/// Owns its lexer and symbol interner; nothing is shared between parsers.
#[derive(Debug, Clone)]
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    lookahead: Option<Spanned<'a>>,
    interner: Interner,
}

impl<'a> Parser<'a> {
    /// Create a parser over `source`.
    #[must_use]
    pub fn new(source: &'a str) -> Self {
        Self::with_interner(source, Interner::default())
    }

    /// Create a parser that continues interning into `interner`.
    #[must_use]
    pub fn with_interner(source: &'a str, interner: Interner) -> Self {
        Self {
            lexer: Lexer::new(source),
            lookahead: None,
            interner,
        }
    }

    /// Give back the interner, e.g. to parse further sources with it.
    #[must_use]
    pub fn into_interner(self) -> Interner {
        self.interner
    }

    /// Parse all clauses and build a validated [`Program`].
    ///
    /// # Errors
    ///
    /// Fails on the first lexical, syntactic or semantic error.
    pub fn parse_program(&mut self) -> Result<Program> {
        let clauses = self.parse_clauses()?;
        Ok(Program::new(clauses)?)
    }

    /// Parse all clauses without the program-wide checks.
    ///
    /// Ground facts are still enforced here.
    ///
    /// # Errors
    ///
    /// Fails on the first lexical or syntactic error, or on a non-ground fact.
    pub fn parse_clauses(&mut self) -> Result<Vec<Clause>> {
        let mut clauses = Vec::new();
        while self.peek()?.token != Token::End {
            clauses.push(self.parse_clause()?);
        }
        log::debug!(target: "parser", "parsed {} clauses", clauses.len());
        Ok(clauses)
    }

    /// Parse a single atom, optionally terminated by `.`, spanning the whole input.
    ///
    /// # Errors
    ///
    /// Fails if the input is not exactly one atom.
    pub fn parse_atom(&mut self) -> Result<Atom> {
        let atom = self.atom()?;
        if self.peek()?.token == Token::Period {
            self.advance()?;
        }
        self.expect(TokenKind::End)?;
        Ok(atom)
    }

    fn parse_clause(&mut self) -> Result<Clause> {
        let head_offset = self.peek()?.offset;
        let head = self.atom()?;

        let next = self.advance()?;
        match next.token {
            Token::Period => {
                if let Some(var) = head.variables().next() {
                    return Err(SemanticError::UngroundedFact {
                        predicate: head.predicate.to_string(),
                        variable: var.to_string(),
                        offset: head_offset,
                    }
                    .into());
                }
                log::trace!(target: "parser", "fact {head}");
                Ok(Clause::Fact(head))
            }
            Token::Implies => {
                let body = self.body()?;
                self.expect(TokenKind::Period)?;
                let rule = Rule { head, body };
                log::trace!(target: "parser", "rule {rule}");
                Ok(Clause::Rule(rule))
            }
            _ => Err(unexpected(&next, &[TokenKind::Period, TokenKind::Implies])),
        }
    }

    fn body(&mut self) -> Result<Vec<Atom>> {
        let mut atoms = vec![self.atom()?];
        while self.peek()?.token == Token::Comma {
            self.advance()?;
            atoms.push(self.atom()?);
        }
        Ok(atoms)
    }

    fn atom(&mut self) -> Result<Atom> {
        let spanned = self.advance()?;
        let Token::Symbol(name) = spanned.token else {
            return Err(unexpected(&spanned, &[TokenKind::Symbol]));
        };
        let predicate = self.interner.intern(name);

        let mut terms = Vec::new();
        if self.peek()?.token == Token::LParen {
            self.advance()?;
            if self.peek()?.token == Token::RParen {
                self.advance()?;
            } else {
                terms.push(self.term()?);
                loop {
                    let next = self.advance()?;
                    match next.token {
                        Token::Comma => terms.push(self.term()?),
                        Token::RParen => break,
                        _ => return Err(unexpected(&next, &[TokenKind::Comma, TokenKind::RParen])),
                    }
                }
            }
        }
        Ok(Atom { predicate, terms })
    }

    fn term(&mut self) -> Result<Term> {
        let spanned = self.advance()?;
        match spanned.token {
            Token::Symbol(name) => Ok(Term::Constant(self.interner.intern(name))),
            Token::Variable(name) => Ok(Term::Variable(Variable::new(name))),
            _ => Err(unexpected(&spanned, &[TokenKind::Symbol, TokenKind::Variable])),
        }
    }

    fn peek(&mut self) -> Result<&Spanned<'a>> {
        let spanned = match self.lookahead.take() {
            Some(spanned) => spanned,
            None => self.pull()?,
        };
        Ok(self.lookahead.insert(spanned))
    }

    fn advance(&mut self) -> Result<Spanned<'a>> {
        match self.lookahead.take() {
            Some(spanned) => Ok(spanned),
            None => self.pull(),
        }
    }

    fn pull(&mut self) -> Result<Spanned<'a>> {
        match self.lexer.next() {
            Some(spanned) => Ok(spanned?),
            // past the end: keep answering End at the final offset
            None => Ok(Spanned {
                token: Token::End,
                offset: self.lexer.source().len(),
            }),
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Spanned<'a>> {
        let spanned = self.advance()?;
        if spanned.token.kind() == kind {
            Ok(spanned)
        } else {
            Err(unexpected(&spanned, &[kind]))
        }
    }
}

fn unexpected(spanned: &Spanned<'_>, expected: &[TokenKind]) -> crate::Error {
    ParseError {
        found: spanned.token.to_string(),
        expected: expected.to_vec(),
        offset: spanned.offset,
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Symbol;
    use crate::Error;

    #[test]
    fn test_sample_program() {
        let clauses = Parser::new("foo(bar,biz) :- flum(), flim(). baz(boz).")
            .parse_clauses()
            .unwrap();
        assert_eq!(clauses.len(), 2);

        let Clause::Rule(rule) = &clauses[0] else {
            panic!("first clause should be a rule");
        };
        assert_eq!(rule.head.predicate.as_str(), "foo");
        assert_eq!(
            rule.head.terms,
            vec![Term::constant("bar"), Term::constant("biz")]
        );
        assert_eq!(rule.body.len(), 2);
        assert!(rule.body.iter().all(|atom| atom.arity() == 0));

        assert_eq!(
            clauses[1],
            Clause::Fact(Atom::new("baz", vec![Term::constant("boz")]))
        );
    }

    #[test]
    fn test_bare_and_empty_parens_are_both_zero_arity() {
        let clauses = Parser::new("baz. baz(). q :- baz, baz().")
            .parse_clauses()
            .unwrap();
        assert_eq!(clauses[0], clauses[1]);
        assert_eq!(clauses[0], Clause::Fact(Atom::new("baz", vec![])));
        let Clause::Rule(rule) = &clauses[2] else {
            panic!("expected a rule");
        };
        assert_eq!(rule.body[0], rule.body[1]);
    }

    #[test]
    fn test_variables_parse_as_variables() {
        let clauses = Parser::new("path(X, Z) :- edge(X, Y), path(Y, Z).")
            .parse_clauses()
            .unwrap();
        let head = clauses[0].head();
        assert_eq!(head.terms, vec![Term::variable("X"), Term::variable("Z")]);
    }

    #[test]
    fn test_ungrounded_fact_is_rejected() {
        let err = Parser::new("ok(a).\nfoo(a, X).").parse_clauses().unwrap_err();
        match err {
            Error::Semantic(SemanticError::UngroundedFact {
                predicate,
                variable,
                offset,
            }) => {
                assert_eq!(predicate, "foo");
                assert_eq!(variable, "X");
                assert_eq!(offset, 7);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_period_reports_expected_tokens() {
        let err = Parser::new("foo(a)").parse_clauses().unwrap_err();
        match err {
            Error::Parse(ParseError {
                expected, offset, ..
            }) => {
                assert_eq!(expected, vec![TokenKind::Period, TokenKind::Implies]);
                assert_eq!(offset, 6);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_variable_predicate_is_rejected() {
        let err = Parser::new("X(a).").parse_clauses().unwrap_err();
        match err {
            Error::Parse(err) => {
                assert_eq!(err.found, "variable `X`");
                assert_eq!(err.expected, vec![TokenKind::Symbol]);
                assert_eq!(err.offset, 0);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_empty_body_is_rejected() {
        let err = Parser::new("foo :- .").parse_clauses().unwrap_err();
        assert!(matches!(err, Error::Parse(ParseError { offset: 7, .. })));
    }

    #[test]
    fn test_trailing_comma_in_arguments_is_rejected() {
        let err = Parser::new("foo(a,).").parse_clauses().unwrap_err();
        match err {
            Error::Parse(err) => {
                assert_eq!(err.expected, vec![TokenKind::Symbol, TokenKind::Variable]);
                assert_eq!(err.offset, 6);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_lex_error_propagates() {
        let err = Parser::new("foo(a) :- bar(b); baz.").parse_clauses().unwrap_err();
        assert!(matches!(err, Error::Lex(_)));
    }

    #[test]
    fn test_empty_source_is_empty_program() {
        let clauses = Parser::new("  % nothing here\n").parse_clauses().unwrap();
        assert!(clauses.is_empty());
    }

    #[test]
    fn test_parse_atom_for_queries() {
        let atom = Parser::new("path(1, X)").parse_atom().unwrap();
        assert_eq!(atom.predicate, Symbol::new("path"));
        assert_eq!(atom.terms, vec![Term::constant("1"), Term::variable("X")]);

        let atom = Parser::new("path(1, X).").parse_atom().unwrap();
        assert_eq!(atom.arity(), 2);

        assert!(Parser::new("path(1, X) extra").parse_atom().is_err());
    }

    #[test]
    fn test_constants_share_interned_symbols() {
        let mut parser = Parser::new("edge(a, b). edge(b, a).");
        parser.parse_clauses().unwrap();
        // edge, a, b
        assert_eq!(parser.into_interner().len(), 3);
    }
}
