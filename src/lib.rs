//! # Litelog
//!
//! A small Datalog engine: facts and rules over constant symbols, evaluated
//! bottom-up to a fixpoint.
//!
//! ## Features
//!
//! - Hand-written lexer and recursive-descent parser with byte offsets in errors
//! - Arity and range-restriction checks before anything is evaluated
//! - Stratification by strongly connected components of the predicate graph
//! - Semi-naive evaluation with per-position indexes
//! - Pluggable relation storage through [`RelationStore`]
//! - Optional provenance and per-rule timings
//!
//! ## Example
//!
//! ```rust
//! use litelog::DatalogEngine;
//!
//! let mut engine = DatalogEngine::new();
//! engine.load(
//!     "edge(a, b). edge(b, c).
//!      path(X, Y) :- edge(X, Y).
//!      path(X, Z) :- edge(X, Y), path(Y, Z).",
//! )?;
//! let report = engine.run()?;
//! assert_eq!(report.derived(), 3);
//!
//! let from_a = engine.query("path(a, X)")?;
//! assert_eq!(from_a.len(), 2);
//! # Ok::<(), litelog::Error>(())
//! ```
//!
//! The stages can also be driven one by one:
//!
//! ```rust
//! use litelog::{parse_program, EvalConfig, Evaluator, MemoryStore, RelationStore, Stratification};
//!
//! let program = parse_program("baz(boz). foo(X) :- baz(X).")?;
//! let strata = Stratification::new(&program);
//! let mut store = MemoryStore::new();
//! strata.materialize(&program, &mut store)?;
//! Evaluator::new(EvalConfig::default()).run(&strata, &mut store)?;
//! assert_eq!(store.scan("foo")?.len(), 1);
//! # Ok::<(), litelog::Error>(())
//! ```

/// Dependency graph and stratification.
pub mod analysis;
/// Syntax tree and symbols.
pub mod ast;
/// Evaluator settings.
pub mod config;
/// High-level engine.
pub mod engine;
/// Error types.
pub mod error;
/// Fixpoint evaluation.
pub mod eval;
/// Tokenizer.
pub mod lexer;
/// Parser.
pub mod parser;
/// Validated programs.
pub mod program;
/// Relation storage.
pub mod store;

pub use analysis::{DependencyGraph, Stratification, Stratum};
pub use ast::{Atom, Clause, Interner, Rule, Symbol, Term, Tuple, Variable};
pub use config::{ConfigError, EvalConfig, Strategy};
pub use engine::{DatalogEngine, QueryResult};
pub use error::{
    Error, EvaluationError, LexError, ParseError, Result, SemanticError, StoreError,
};
pub use eval::{Derivation, EvalReport, Evaluator, StratumReport};
pub use lexer::{Lexer, Token, TokenKind};
pub use parser::{parse_program, Parser};
pub use program::{PredicateInfo, Program};
pub use store::{MemoryStore, RelationStore};
