//! Error types for every stage of loading and evaluating a program.

use thiserror::Error;

use crate::config::ConfigError;
use crate::lexer::TokenKind;

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Any error produced by `litelog`.
#[derive(Debug, Error)]
pub enum Error {
    /// The source text contains a character outside the accepted set.
    #[error(transparent)]
    Lex(#[from] LexError),
    /// The token sequence does not follow the grammar.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// The program is well-formed but violates a semantic restriction.
    #[error(transparent)]
    Semantic(#[from] SemanticError),
    /// Evaluation could not reach a fixpoint.
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
    /// The evaluator configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// An invalid character in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unexpected character {character:?} at offset {offset}")]
pub struct LexError {
    /// Byte offset of the offending character.
    pub offset: usize,
    /// The offending character.
    pub character: char,
}

/// A token that does not fit the grammar at its position.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unexpected {found} at offset {offset}, expected {}", display_expected(.expected))]
pub struct ParseError {
    /// Rendering of the token that was found.
    pub found: String,
    /// The token classes that would have been accepted.
    pub expected: Vec<TokenKind>,
    /// Byte offset of the offending token.
    pub offset: usize,
}

fn display_expected(expected: &[TokenKind]) -> String {
    match expected {
        [] => "nothing".to_string(),
        [single] => single.to_string(),
        [init @ .., last] => {
            let init: Vec<String> = init.iter().map(ToString::to_string).collect();
            format!("{} or {last}", init.join(", "))
        }
    }
}

/// Violations of the program's semantic restrictions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SemanticError {
    /// A predicate is used with two different arities.
    #[error("predicate `{predicate}` used with arity {found}, but it has arity {expected}")]
    ArityMismatch {
        /// The predicate name.
        predicate: String,
        /// Arity of the first occurrence.
        expected: usize,
        /// Arity of the conflicting occurrence.
        found: usize,
    },
    /// A clause without body mentions a variable.
    #[error("fact `{predicate}` at offset {offset} contains variable `{variable}`")]
    UngroundedFact {
        /// The predicate name.
        predicate: String,
        /// The first variable found.
        variable: String,
        /// Byte offset of the fact's head.
        offset: usize,
    },
    /// A head variable does not occur in the body of its rule.
    #[error("variable `{variable}` appears in the head of a `{predicate}` rule but not in its body")]
    UnboundHeadVariable {
        /// The head predicate name.
        predicate: String,
        /// The unbound variable.
        variable: String,
    },
}

/// Failures while running the evaluator.
#[derive(Debug, Error)]
pub enum EvaluationError {
    /// A stratum still derived tuples after the configured number of rounds.
    #[error("stratum {stratum} did not reach a fixpoint within {limit} rounds")]
    RoundLimitExceeded {
        /// Index of the stratum in evaluation order.
        stratum: usize,
        /// The configured limit.
        limit: usize,
    },
    /// The relation store rejected an operation.
    #[error("relation store failure: {0}")]
    Store(#[from] StoreError),
}

/// Errors reported by a [`RelationStore`](crate::store::RelationStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// The relation was never created.
    #[error("unknown relation `{0}`")]
    UnknownRelation(String),
    /// A relation or tuple does not have the relation's arity.
    #[error("relation `{relation}` has arity {expected}, got {found}")]
    ArityMismatch {
        /// The relation name.
        relation: String,
        /// The relation's arity.
        expected: usize,
        /// The arity that was supplied.
        found: usize,
    },
    /// An external backend failed.
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        Error::Evaluation(EvaluationError::Store(err))
    }
}
