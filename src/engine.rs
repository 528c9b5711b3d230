//! High-level entry point tying the pipeline together.

use indexmap::IndexMap;

use crate::analysis::Stratification;
use crate::ast::{Atom, Clause, Interner, Rule, Symbol, Tuple};
use crate::config::EvalConfig;
use crate::error::Result;
use crate::eval::{match_atom, pattern, EvalReport, Evaluator, Substitution};
use crate::parser::Parser;
use crate::program::Program;
use crate::store::{MemoryStore, RelationStore};

/// Result of a query - one set of variable bindings
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct QueryResult {
    /// Variable bindings that satisfy the query, in argument order
    pub bindings: IndexMap<String, Symbol>,
}

/// A program plus the store it is evaluated against.
///
/// Sources can be loaded in several steps; each load is validated against
/// everything loaded before and is rejected as a whole on error, leaving
/// the program and the store untouched.
///
/// ```
/// use litelog::DatalogEngine;
///
/// let mut engine = DatalogEngine::new();
/// engine
///     .load("edge(1,2). edge(2,3). path(X,Y) :- edge(X,Y). path(X,Z) :- edge(X,Y), path(Y,Z).")
///     .unwrap();
/// engine.run().unwrap();
/// assert_eq!(engine.get_facts("path").len(), 3);
/// assert!(engine.ask("path(1, 3)").unwrap());
/// ```
#[derive(Debug)]
pub struct DatalogEngine<S = MemoryStore> {
    program: Program,
    store: S,
    config: EvalConfig,
    interner: Interner,
    last_report: Option<EvalReport>,
}

impl Default for DatalogEngine<MemoryStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl DatalogEngine<MemoryStore> {
    /// Create an engine over an empty in-memory store
    #[must_use]
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new(), EvalConfig::default())
    }

    /// Create an engine over an empty in-memory store with custom settings
    #[must_use]
    pub fn with_config(config: EvalConfig) -> Self {
        Self::with_store(MemoryStore::new(), config)
    }
}

impl<S: RelationStore> DatalogEngine<S> {
    /// Create an engine over an existing store.
    ///
    /// Relations already in the store act as base facts for rules that
    /// mention them.
    #[must_use]
    pub fn with_store(store: S, config: EvalConfig) -> Self {
        Self {
            program: Program::default(),
            store,
            config,
            interner: Interner::default(),
            last_report: None,
        }
    }

    /// Parse `source` and add its clauses to the program.
    ///
    /// # Errors
    ///
    /// Lexical, syntactic and semantic errors; nothing is added on error.
    pub fn load(&mut self, source: &str) -> Result<()> {
        let mut parser = Parser::with_interner(source, std::mem::take(&mut self.interner));
        let parsed = parser.parse_clauses();
        self.interner = parser.into_interner();
        self.program.extend(parsed?)?;
        Ok(())
    }

    /// Add a ground fact to the program.
    ///
    /// # Errors
    ///
    /// Fails if the atom has variables or conflicts with a known arity.
    pub fn add_fact(&mut self, atom: Atom) -> Result<()> {
        self.program.extend(vec![Clause::Fact(atom)])?;
        Ok(())
    }

    /// Add a rule to the program.
    ///
    /// # Errors
    ///
    /// Fails if the rule is not range-restricted or conflicts with a known arity.
    pub fn add_rule(&mut self, rule: Rule) -> Result<()> {
        self.program.extend(vec![Clause::Rule(rule)])?;
        Ok(())
    }

    /// Stratify the program, seed its facts and evaluate to the fixpoint.
    ///
    /// # Errors
    ///
    /// Invalid configuration, store failures, or an exceeded round limit.
    /// Tuples committed before a failure remain in the store.
    pub fn run(&mut self) -> Result<&EvalReport> {
        self.config.validate()?;
        let stratification = Stratification::new(&self.program);
        stratification.materialize(&self.program, &mut self.store)?;
        let report = Evaluator::new(self.config).run(&stratification, &mut self.store)?;
        Ok(self.last_report.insert(report))
    }

    /// All tuples of a relation; empty if the relation does not exist.
    #[must_use]
    pub fn get_facts(&self, predicate: &str) -> Vec<Tuple> {
        self.store.scan(predicate).unwrap_or_default()
    }

    /// Returns all variable bindings that make the query pattern true.
    ///
    /// The pattern is a single atom such as `path(1, X)`. Unknown relations
    /// have no answers.
    ///
    /// # Errors
    ///
    /// Fails if the pattern does not parse or has the wrong arity.
    pub fn query(&self, pattern: &str) -> Result<Vec<QueryResult>> {
        let atom = Parser::new(pattern).parse_atom()?;
        self.query_atom(&atom)
    }

    /// Like [`query`](Self::query) for an already built atom.
    ///
    /// # Errors
    ///
    /// Fails if the atom has the wrong arity for its relation.
    pub fn query_atom(&self, atom: &Atom) -> Result<Vec<QueryResult>> {
        if self.store.arity(atom.predicate.as_str()).is_none() {
            return Ok(Vec::new());
        }

        let empty = Substitution::new();
        let tuples = self
            .store
            .match_pattern(atom.predicate.as_str(), &pattern(atom, &empty))?;

        Ok(tuples
            .iter()
            .filter_map(|tuple| match_atom(atom, tuple, &empty))
            .map(|binding| QueryResult {
                bindings: binding
                    .into_iter()
                    .map(|(var, value)| (var.to_string(), value))
                    .collect(),
            })
            .collect())
    }

    /// Returns whether the query pattern has at least one answer.
    ///
    /// # Errors
    ///
    /// See [`query`](Self::query).
    pub fn ask(&self, pattern: &str) -> Result<bool> {
        Ok(!self.query(pattern)?.is_empty())
    }

    /// The accumulated program.
    #[must_use]
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Mutable access to the store, e.g. to seed base relations.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Hand back the store.
    #[must_use]
    pub fn into_store(self) -> S {
        self.store
    }

    /// The report of the most recent successful [`run`](Self::run).
    #[must_use]
    pub fn last_report(&self) -> Option<&EvalReport> {
        self.last_report.as_ref()
    }

    /// The evaluator settings.
    #[must_use]
    pub fn config(&self) -> &EvalConfig {
        &self.config
    }
}
