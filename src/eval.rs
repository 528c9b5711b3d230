//! Bottom-up fixpoint evaluation.
//!
//! Strata are evaluated in dependency order. Within a stratum:
//!
//! - Round 1 joins every rule against the full relations (naive).
//! - Later rounds (semi-naive) evaluate each recursive rule once per body
//!   atom over the stratum's own predicates, reading only the tuples the
//!   previous round inserted for that atom and full relations for the rest.
//!   The previous round's tuples sit in an indexed scratch store, so a bound
//!   delta atom is a lookup, not a scan.
//! - Derived tuples are buffered and committed at the end of the round, so
//!   a round only sees what earlier rounds committed.
//! - A round that commits nothing is the fixpoint.
//!
//! ## Example
//!
//! For `path(X,Z) :- edge(X,Y), path(Y,Z)` over the chain `1 -> 2 -> 3 -> 4`,
//! round 1 derives the three direct paths from the base rule, round 2 joins
//! `edge` with those three and finds `(1,3)` and `(2,4)`, round 3 joins with
//! only those two and finds `(1,4)`, and round 4 finds nothing.

use std::time::{Duration, Instant};

use indexmap::{IndexMap, IndexSet};

use crate::analysis::{Stratification, Stratum};
use crate::ast::{Atom, Rule, Symbol, Term, Tuple, Variable};
use crate::config::{EvalConfig, Strategy};
use crate::error::{EvaluationError, StoreError};
use crate::store::{MemoryStore, RelationStore};

/// Variable bindings collected while joining a rule body.
pub type Substitution<'r> = IndexMap<&'r Variable, Symbol>;

/// Head tuples derived in a round, per predicate, before they are committed.
type Candidates = IndexMap<Symbol, IndexSet<Tuple>>;

/// Where a derived tuple was first inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Derivation {
    /// Index of the stratum in evaluation order
    pub stratum: usize,
    /// Round within the stratum, starting at 1
    pub round: usize,
}

/// What happened while evaluating one stratum.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StratumReport {
    /// Predicates of the stratum
    pub predicates: Vec<Symbol>,
    /// Whether the stratum is recursive
    pub recursive: bool,
    /// Rounds executed, including the final round that found nothing
    pub rounds: usize,
    /// Tuples inserted in each round
    pub new_per_round: Vec<usize>,
    /// Tuples fetched from relations and deltas while joining rule bodies
    pub tuples_scanned: usize,
}

impl StratumReport {
    /// Total tuples inserted by this stratum.
    #[must_use]
    pub fn derived(&self) -> usize {
        self.new_per_round.iter().sum()
    }
}

/// Summary of one evaluator run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct EvalReport {
    /// One entry per stratum, in evaluation order
    pub strata: Vec<StratumReport>,
    /// Cumulative join time per rule, keyed by the rule's source text
    pub rule_timings: IndexMap<String, Duration>,
    #[cfg_attr(feature = "serde", serde(skip))]
    derivations: IndexMap<Symbol, IndexMap<Tuple, Derivation>>,
}

impl EvalReport {
    /// Total tuples inserted by the run.
    #[must_use]
    pub fn derived(&self) -> usize {
        self.strata.iter().map(StratumReport::derived).sum()
    }

    /// Total rounds over all strata.
    #[must_use]
    pub fn rounds(&self) -> usize {
        self.strata.iter().map(|s| s.rounds).sum()
    }

    /// The report for the stratum holding `predicate`.
    #[must_use]
    pub fn stratum_for(&self, predicate: &str) -> Option<&StratumReport> {
        self.strata
            .iter()
            .find(|s| s.predicates.iter().any(|p| p.as_str() == predicate))
    }

    /// When `tuple` was derived for `predicate`, if provenance was tracked
    /// and the tuple was derived by this run.
    #[must_use]
    pub fn derivation(&self, predicate: &str, tuple: &[Symbol]) -> Option<Derivation> {
        self.derivations.get(predicate)?.get(tuple).copied()
    }
}

/// Runs strata to their fixpoints against a [`RelationStore`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Evaluator {
    config: EvalConfig,
}

impl Evaluator {
    /// Create an evaluator with the given settings.
    #[must_use]
    pub fn new(config: EvalConfig) -> Self {
        Self { config }
    }

    /// The evaluator's settings.
    #[must_use]
    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    /// Evaluate every stratum in order.
    ///
    /// The store must already hold a relation for every predicate, as set up
    /// by [`Stratification::materialize`]. Relations only ever grow; on
    /// error, tuples committed before the failure stay in the store.
    ///
    /// # Errors
    ///
    /// Fails if a stratum exceeds the round limit or the store fails.
    pub fn run<S: RelationStore + ?Sized>(
        &self,
        stratification: &Stratification,
        store: &mut S,
    ) -> Result<EvalReport, EvaluationError> {
        let mut report = EvalReport::default();
        for (idx, stratum) in stratification.strata().iter().enumerate() {
            let stratum_report = self.run_stratum(idx, stratum, store, &mut report)?;
            report.strata.push(stratum_report);
        }
        log::debug!(
            target: "evaluator",
            "fixpoint reached: {} tuples derived in {} rounds",
            report.derived(),
            report.rounds()
        );
        Ok(report)
    }

    fn run_stratum<S: RelationStore + ?Sized>(
        &self,
        idx: usize,
        stratum: &Stratum,
        store: &mut S,
        report: &mut EvalReport,
    ) -> Result<StratumReport, EvaluationError> {
        let mut stratum_report = StratumReport {
            predicates: stratum.predicates.iter().cloned().collect(),
            recursive: stratum.recursive,
            rounds: 0,
            new_per_round: Vec::new(),
            tuples_scanned: 0,
        };
        if stratum.rules.is_empty() {
            return Ok(stratum_report);
        }
        log::debug!(
            target: "evaluator",
            "stratum {idx}: {} rules over {:?}",
            stratum.rules.len(),
            stratum_report.predicates.iter().map(Symbol::as_str).collect::<Vec<_>>()
        );

        let mut delta = MemoryStore::new();
        loop {
            let round = stratum_report.rounds + 1;
            let candidates = self.join_round(
                round,
                stratum,
                &*store,
                &delta,
                report,
                &mut stratum_report.tuples_scanned,
            )?;
            let inserted = commit(candidates, store)?;
            let count = inserted.total_tuples();

            stratum_report.rounds = round;
            stratum_report.new_per_round.push(count);
            log::debug!(target: "evaluator", "stratum {idx} round {round}: {count} new tuples");

            if self.config.track_provenance {
                let derivation = Derivation { stratum: idx, round };
                for predicate in inserted.relation_names() {
                    let entry = report.derivations.entry(Symbol::new(predicate)).or_default();
                    for tuple in inserted.scan(predicate)? {
                        entry.entry(tuple).or_insert(derivation);
                    }
                }
            }

            // no rule reads this stratum's own relations, so nothing can change
            if count == 0 || !stratum.recursive {
                break;
            }
            // the limit counts productive rounds; the confirming empty round is free
            if let Some(limit) = self.config.max_rounds {
                if round > limit {
                    return Err(EvaluationError::RoundLimitExceeded { stratum: idx, limit });
                }
            }
            delta = inserted;
        }

        Ok(stratum_report)
    }

    /// Collect every head tuple derivable in this round, without inserting.
    fn join_round<S: RelationStore + ?Sized>(
        &self,
        round: usize,
        stratum: &Stratum,
        store: &S,
        delta: &MemoryStore,
        report: &mut EvalReport,
        scanned: &mut usize,
    ) -> Result<Candidates, StoreError> {
        let mut candidates = Candidates::new();

        for rule in &stratum.rules {
            let start = self.config.collect_timings.then(Instant::now);

            let derived = if round == 1 || self.config.strategy == Strategy::Naive {
                if round > 1 && !stratum.is_recursive_rule(rule) {
                    continue;
                }
                evaluate_rule(rule, store, None, scanned)?
            } else {
                let mut derived = IndexSet::new();
                for (atom_idx, atom) in rule.body.iter().enumerate() {
                    if stratum.is_local(atom) {
                        derived.extend(evaluate_rule(
                            rule,
                            store,
                            Some((atom_idx, delta)),
                            scanned,
                        )?);
                    }
                }
                derived
            };

            if let Some(start) = start {
                *report.rule_timings.entry(rule.to_string()).or_default() += start.elapsed();
            }
            if !derived.is_empty() {
                log::trace!(target: "evaluator", "{rule} -> {} candidates", derived.len());
                candidates
                    .entry(rule.head.predicate.clone())
                    .or_default()
                    .extend(derived);
            }
        }

        Ok(candidates)
    }
}

/// Insert candidates, returning the tuples that were new as the next delta.
fn commit<S: RelationStore + ?Sized>(
    candidates: Candidates,
    store: &mut S,
) -> Result<MemoryStore, StoreError> {
    let mut inserted = MemoryStore::new();
    for (predicate, tuples) in candidates {
        for tuple in tuples {
            if store.insert(predicate.as_str(), tuple.clone())? {
                log::trace!(target: "evaluator", "derived {predicate}{:?}", tuple.as_slice());
                inserted.create_relation(predicate.as_str(), tuple.len())?;
                inserted.insert(predicate.as_str(), tuple)?;
            }
        }
    }
    Ok(inserted)
}

/// Join a rule body from left to right and instantiate the head.
///
/// With `delta` set to `(i, tuples)`, body atom `i` only ranges over
/// `tuples`; every other atom reads the store. Every tuple fetched for a
/// body atom is added to `scanned`.
fn evaluate_rule<'r, S: RelationStore + ?Sized>(
    rule: &'r Rule,
    store: &S,
    delta: Option<(usize, &MemoryStore)>,
    scanned: &mut usize,
) -> Result<IndexSet<Tuple>, StoreError> {
    let mut bindings: Vec<Substitution<'r>> = vec![Substitution::new()];

    for (atom_idx, atom) in rule.body.iter().enumerate() {
        let mut next = Vec::new();
        for binding in &bindings {
            let lookup = pattern(atom, binding);
            let candidates = match delta {
                Some((delta_idx, delta)) if delta_idx == atom_idx => {
                    if delta.arity(atom.predicate.as_str()).is_some() {
                        delta.match_pattern(atom.predicate.as_str(), &lookup)?
                    } else {
                        Vec::new()
                    }
                }
                _ => store.match_pattern(atom.predicate.as_str(), &lookup)?,
            };
            *scanned += candidates.len();
            next.extend(
                candidates
                    .iter()
                    .filter_map(|tuple| match_atom(atom, tuple, binding)),
            );
        }
        if next.is_empty() {
            return Ok(IndexSet::new());
        }
        bindings = next;
    }

    Ok(bindings
        .iter()
        .filter_map(|binding| instantiate(&rule.head, binding))
        .collect())
}

/// The store pattern for `atom` under `binding`: constants and bound
/// variables become values, unbound variables become holes.
#[must_use]
pub(crate) fn pattern(atom: &Atom, binding: &Substitution<'_>) -> Vec<Option<Symbol>> {
    atom.terms
        .iter()
        .map(|term| match term {
            Term::Constant(sym) => Some(sym.clone()),
            Term::Variable(var) => binding.get(var).cloned(),
        })
        .collect()
}

/// Match an atom against a tuple, extending `binding`.
///
/// Returns `None` on a constant mismatch, a conflict with an existing
/// binding, or a repeated variable bound to two different values.
#[must_use]
pub(crate) fn match_atom<'r>(
    atom: &'r Atom,
    tuple: &[Symbol],
    binding: &Substitution<'r>,
) -> Option<Substitution<'r>> {
    if atom.terms.len() != tuple.len() {
        return None;
    }

    let mut new_binding = binding.clone();
    for (term, value) in atom.terms.iter().zip(tuple) {
        match term {
            Term::Constant(sym) => {
                if sym != value {
                    return None;
                }
            }
            Term::Variable(var) => match new_binding.get(var) {
                Some(bound) if bound != value => return None,
                Some(_) => {}
                None => {
                    new_binding.insert(var, value.clone());
                }
            },
        }
    }
    Some(new_binding)
}

/// Apply a substitution to the head; `None` if a head variable is unbound.
fn instantiate(head: &Atom, binding: &Substitution<'_>) -> Option<Tuple> {
    head.terms
        .iter()
        .map(|term| match term {
            Term::Constant(sym) => Some(sym.clone()),
            Term::Variable(var) => binding.get(var).cloned(),
        })
        .collect()
}
