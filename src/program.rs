//! Validated program model.

use std::fmt;

use indexmap::{IndexMap, IndexSet};

use crate::ast::{Atom, Clause, Rule, Symbol};
use crate::error::SemanticError;

/// What the program says about one predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredicateInfo {
    /// Number of arguments, shared by every occurrence
    pub arity: usize,
    /// Indices of the facts for this predicate in [`Program::clauses`]
    pub facts: Vec<usize>,
    /// Indices of the rules with this predicate as head in [`Program::clauses`]
    pub rules: Vec<usize>,
}

impl PredicateInfo {
    /// Drop clause indices at or past `base`.
    fn forget_from(&mut self, base: usize) {
        while self.facts.last().is_some_and(|&idx| idx >= base) {
            self.facts.pop();
        }
        while self.rules.last().is_some_and(|&idx| idx >= base) {
            self.rules.pop();
        }
    }
}

/// An ordered list of clauses that passed the semantic checks.
///
/// Every predicate has a single arity, every fact is ground and every rule
/// is range-restricted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    clauses: Vec<Clause>,
    predicates: IndexMap<Symbol, PredicateInfo>,
}

impl Program {
    /// Validate `clauses` and index them by predicate.
    ///
    /// # Errors
    ///
    /// Returns the first [`SemanticError`] found, in clause order.
    pub fn new(clauses: Vec<Clause>) -> Result<Self, SemanticError> {
        let mut program = Self::default();
        program.extend(clauses)?;
        Ok(program)
    }

    /// Append more clauses, validated together with the existing ones.
    ///
    /// On error the program is left unchanged.
    ///
    /// # Errors
    ///
    /// Returns the first [`SemanticError`] found among the new clauses.
    pub fn extend(&mut self, clauses: Vec<Clause>) -> Result<(), SemanticError> {
        let known = self.predicates.len();
        let base = self.clauses.len();

        if let Err(err) = self.index_clauses(&clauses, base) {
            // new predicates sit at the end of the map, new indices at the end of each list
            self.predicates.truncate(known);
            for info in self.predicates.values_mut() {
                info.forget_from(base);
            }
            return Err(err);
        }

        log::debug!(
            target: "program",
            "program extended by {} clauses, {} predicates",
            clauses.len(),
            self.predicates.len()
        );
        self.clauses.extend(clauses);
        Ok(())
    }

    fn index_clauses(&mut self, clauses: &[Clause], base: usize) -> Result<(), SemanticError> {
        for (offset, clause) in clauses.iter().enumerate() {
            validate_clause(clause)?;
            for atom in clause.atoms() {
                register(&mut self.predicates, atom)?;
            }
            let info = register(&mut self.predicates, clause.head())?;
            match clause {
                Clause::Fact(_) => info.facts.push(base + offset),
                Clause::Rule(_) => info.rules.push(base + offset),
            }
        }
        Ok(())
    }

    /// The clauses in source order.
    #[must_use]
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// All facts in source order.
    pub fn facts(&self) -> impl Iterator<Item = &Atom> {
        self.clauses.iter().filter_map(|clause| match clause {
            Clause::Fact(atom) => Some(atom),
            Clause::Rule(_) => None,
        })
    }

    /// All rules in source order.
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.clauses.iter().filter_map(|clause| match clause {
            Clause::Fact(_) => None,
            Clause::Rule(rule) => Some(rule),
        })
    }

    /// Predicates in order of first occurrence.
    #[must_use]
    pub fn predicates(&self) -> &IndexMap<Symbol, PredicateInfo> {
        &self.predicates
    }

    /// Information about one predicate.
    #[must_use]
    pub fn predicate(&self, name: &str) -> Option<&PredicateInfo> {
        self.predicates.get(name)
    }

    /// The rules whose head is `name`.
    pub fn rules_for<'p>(&'p self, name: &str) -> impl Iterator<Item = &'p Rule> + 'p {
        self.predicate(name)
            .map(|info| info.rules.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(|&idx| match &self.clauses[idx] {
                Clause::Rule(rule) => Some(rule),
                Clause::Fact(_) => None,
            })
    }

    /// Whether the program has no clauses.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for clause in &self.clauses {
            writeln!(f, "{clause}")?;
        }
        Ok(())
    }
}

fn validate_clause(clause: &Clause) -> Result<(), SemanticError> {
    match clause {
        Clause::Fact(atom) => match atom.variables().next() {
            Some(var) => Err(SemanticError::UngroundedFact {
                predicate: atom.predicate.to_string(),
                variable: var.to_string(),
                offset: 0,
            }),
            None => Ok(()),
        },
        Clause::Rule(rule) => {
            let body_vars: IndexSet<_> = rule.body.iter().flat_map(Atom::variables).collect();
            match rule.head.variables().find(|var| !body_vars.contains(var)) {
                Some(var) => Err(SemanticError::UnboundHeadVariable {
                    predicate: rule.head.predicate.to_string(),
                    variable: var.to_string(),
                }),
                None => Ok(()),
            }
        }
    }
}

fn register<'m>(
    predicates: &'m mut IndexMap<Symbol, PredicateInfo>,
    atom: &Atom,
) -> Result<&'m mut PredicateInfo, SemanticError> {
    let info = predicates
        .entry(atom.predicate.clone())
        .or_insert_with(|| PredicateInfo {
            arity: atom.arity(),
            facts: Vec::new(),
            rules: Vec::new(),
        });
    if info.arity == atom.arity() {
        Ok(info)
    } else {
        Err(SemanticError::ArityMismatch {
            predicate: atom.predicate.to_string(),
            expected: info.arity,
            found: atom.arity(),
        })
    }
}
