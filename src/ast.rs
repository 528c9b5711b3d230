//! Clause syntax tree.
//!
//! A parsed program is a sequence of [`Clause`]s. Each clause is either a
//! ground [`Clause::Fact`] or a [`Clause::Rule`] with a non-empty body.
//! All nodes own their children; the `Display` impls render the same
//! concrete syntax the parser accepts.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexSet;
use smallvec::SmallVec;

/// An interned constant.
///
/// Cloning is cheap; every occurrence of one name produced by a single
/// [`Parser`](crate::parser::Parser) shares one allocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Symbol(Arc<str>);

impl Symbol {
    /// Create a symbol that is not shared with any interner.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    /// The symbol's text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Symbol {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl Borrow<str> for Symbol {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Deduplicates symbol allocations.
#[derive(Debug, Default, Clone)]
pub struct Interner {
    symbols: IndexSet<Symbol>,
}

impl Interner {
    /// Return the shared symbol for `name`, allocating it on first use.
    pub fn intern(&mut self, name: &str) -> Symbol {
        if let Some(symbol) = self.symbols.get(name) {
            return symbol.clone();
        }
        let symbol = Symbol::new(name);
        self.symbols.insert(symbol.clone());
        symbol
    }

    /// Number of distinct symbols seen.
    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Whether no symbol was interned yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// A row of a relation.
pub type Tuple = SmallVec<[Symbol; 4]>;

/// A variable, identified by its name within one clause.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Variable(String);

impl Variable {
    /// Create a variable with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The variable's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An argument of an atom.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Term {
    /// A constant (e.g. `alice`, `42`)
    Constant(Symbol),
    /// A variable (e.g. `X`, `_tmp`)
    Variable(Variable),
}

impl Term {
    /// Shorthand for a constant term.
    #[must_use]
    pub fn constant(name: &str) -> Self {
        Term::Constant(Symbol::new(name))
    }

    /// Shorthand for a variable term.
    #[must_use]
    pub fn variable(name: &str) -> Self {
        Term::Variable(Variable::new(name))
    }

    /// The variable, if this term is one.
    #[must_use]
    pub fn as_variable(&self) -> Option<&Variable> {
        match self {
            Term::Variable(var) => Some(var),
            Term::Constant(_) => None,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Constant(sym) => sym.fmt(f),
            Term::Variable(var) => var.fmt(f),
        }
    }
}

/// A predicate applied to arguments (e.g. `edge(X, b)`)
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Atom {
    /// The name of the predicate (e.g. `"edge"`, `"path"`)
    pub predicate: Symbol,
    /// The arguments of the predicate
    pub terms: Vec<Term>,
}

impl Atom {
    /// Build an atom from a predicate name and its arguments.
    #[must_use]
    pub fn new(predicate: &str, terms: Vec<Term>) -> Self {
        Self {
            predicate: Symbol::new(predicate),
            terms,
        }
    }

    /// Number of arguments.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.terms.len()
    }

    /// Variables in argument order, repeats included.
    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.terms.iter().filter_map(Term::as_variable)
    }

    /// Whether every argument is a constant.
    #[must_use]
    pub fn is_ground(&self) -> bool {
        self.variables().next().is_none()
    }

    /// The argument values if the atom is ground.
    #[must_use]
    pub fn to_tuple(&self) -> Option<Tuple> {
        self.terms
            .iter()
            .map(|term| match term {
                Term::Constant(sym) => Some(sym.clone()),
                Term::Variable(_) => None,
            })
            .collect()
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.predicate)?;
        for (idx, term) in self.terms.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            term.fmt(f)?;
        }
        f.write_str(")")
    }
}

/// A rule (e.g. `path(X, Z) :- edge(X, Y), path(Y, Z).`)
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rule {
    /// The conclusion of the rule
    pub head: Atom,
    /// The conditions that must hold together
    pub body: Vec<Atom>,
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} :- ", self.head)?;
        for (idx, atom) in self.body.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            atom.fmt(f)?;
        }
        f.write_str(".")
    }
}

/// A top-level program statement.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Clause {
    /// A ground atom, unconditionally true
    Fact(Atom),
    /// A head derivable from a conjunctive body
    Rule(Rule),
}

impl Clause {
    /// The head atom (the fact itself for facts).
    #[must_use]
    pub fn head(&self) -> &Atom {
        match self {
            Clause::Fact(atom) => atom,
            Clause::Rule(rule) => &rule.head,
        }
    }

    /// All atoms of the clause, head first.
    pub fn atoms(&self) -> impl Iterator<Item = &Atom> {
        let body: &[Atom] = match self {
            Clause::Fact(_) => &[],
            Clause::Rule(rule) => &rule.body,
        };
        std::iter::once(self.head()).chain(body)
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Clause::Fact(atom) => write!(f, "{atom}."),
            Clause::Rule(rule) => rule.fmt(f),
        }
    }
}
