#![allow(missing_docs)]

use std::collections::{BTreeMap, BTreeSet, HashMap};

use litelog::{
    parse_program, Atom, Clause, DatalogEngine, EvalConfig, MemoryStore, Program, RelationStore,
    Rule, Stratification, Symbol, Term,
};
use proptest::prelude::*;

const PREDICATES: [(&str, usize); 4] = [("a", 1), ("b", 2), ("c", 2), ("d", 1)];
const CONSTANTS: [&str; 4] = ["x", "y", "z", "1"];
const VARIABLES: [&str; 3] = ["X", "Y", "Z"];

type Relations = BTreeMap<String, BTreeSet<Vec<String>>>;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn fact() -> impl Strategy<Value = Clause> {
    (0..PREDICATES.len(), prop::collection::vec(0..CONSTANTS.len(), 2)).prop_map(|(p, args)| {
        let (name, arity) = PREDICATES[p];
        let terms = args[..arity].iter().map(|&c| Term::constant(CONSTANTS[c])).collect();
        Clause::Fact(Atom::new(name, terms))
    })
}

fn body_atom() -> impl Strategy<Value = Atom> {
    (0..PREDICATES.len(), prop::collection::vec(0..7usize, 2)).prop_map(|(p, args)| {
        let (name, arity) = PREDICATES[p];
        let terms = args[..arity]
            .iter()
            .map(|&t| match VARIABLES.get(t) {
                Some(var) => Term::variable(var),
                None => Term::constant(CONSTANTS[t - VARIABLES.len()]),
            })
            .collect();
        Atom::new(name, terms)
    })
}

/// Range-restricted rules: head variables are drawn from the body.
fn rule() -> impl Strategy<Value = Clause> {
    (
        0..PREDICATES.len(),
        prop::collection::vec(any::<usize>(), 2),
        prop::collection::vec(body_atom(), 1..=3),
    )
        .prop_map(|(p, picks, body)| {
            let (name, arity) = PREDICATES[p];
            let vars: Vec<String> = body
                .iter()
                .flat_map(Atom::variables)
                .map(ToString::to_string)
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            let terms = picks[..arity]
                .iter()
                .map(|&k| {
                    if vars.is_empty() {
                        Term::constant(CONSTANTS[k % CONSTANTS.len()])
                    } else {
                        Term::variable(&vars[k % vars.len()])
                    }
                })
                .collect();
            Clause::Rule(Rule {
                head: Atom::new(name, terms),
                body,
            })
        })
}

fn clauses() -> impl Strategy<Value = Vec<Clause>> {
    (
        prop::collection::vec(fact(), 0..12),
        prop::collection::vec(rule(), 0..5),
    )
        .prop_map(|(mut facts, rules)| {
            facts.extend(rules);
            facts
        })
}

fn source(clauses: &[Clause]) -> String {
    clauses.iter().map(|c| format!("{c}\n")).collect()
}

fn relations(store: &MemoryStore) -> Relations {
    store
        .relation_names()
        .map(|name| {
            let rows = store
                .scan(name)
                .unwrap()
                .iter()
                .map(|t| t.iter().map(ToString::to_string).collect())
                .collect();
            (name.to_string(), rows)
        })
        .collect()
}

fn evaluate(source: &str, config: EvalConfig) -> Relations {
    let mut engine = DatalogEngine::with_config(config);
    engine.load(source).unwrap();
    engine.run().unwrap();
    relations(engine.store())
}

/// Brute-force fixpoint over all rules at once, ignoring strata.
fn reference_fixpoint(program: &Program) -> Relations {
    let mut facts: Relations = program
        .predicates()
        .keys()
        .map(|p| (p.to_string(), BTreeSet::new()))
        .collect();
    for fact in program.facts() {
        let row = fact.terms.iter().map(ToString::to_string).collect();
        facts.entry(fact.predicate.to_string()).or_default().insert(row);
    }

    loop {
        let mut changed = false;
        for rule in program.rules() {
            let mut bindings: Vec<HashMap<String, String>> = vec![HashMap::new()];
            for atom in &rule.body {
                let rows = facts.get(atom.predicate.as_str()).cloned().unwrap_or_default();
                bindings = bindings
                    .iter()
                    .flat_map(|binding| rows.iter().filter_map(|row| unify(atom, row, binding)))
                    .collect();
            }
            for binding in bindings {
                let row = rule
                    .head
                    .terms
                    .iter()
                    .map(|term| match term {
                        Term::Constant(c) => c.to_string(),
                        Term::Variable(v) => binding[v.name()].clone(),
                    })
                    .collect();
                changed |= facts
                    .entry(rule.head.predicate.to_string())
                    .or_default()
                    .insert(row);
            }
        }
        if !changed {
            return facts;
        }
    }
}

fn unify(
    atom: &Atom,
    row: &[String],
    binding: &HashMap<String, String>,
) -> Option<HashMap<String, String>> {
    let mut binding = binding.clone();
    for (term, value) in atom.terms.iter().zip(row) {
        match term {
            Term::Constant(c) if c.as_str() != value => return None,
            Term::Constant(_) => {}
            Term::Variable(v) => {
                if binding.entry(v.name().to_string()).or_insert_with(|| value.clone()) != value {
                    return None;
                }
            }
        }
    }
    Some(binding)
}

proptest! {
    #[test]
    fn prop_display_then_parse_is_identity(clauses in clauses()) {
        let program = Program::new(clauses).unwrap();
        let reparsed = parse_program(&program.to_string()).unwrap();
        prop_assert_eq!(reparsed, program);
    }

    #[test]
    fn prop_clause_order_does_not_change_results(
        (original, shuffled) in clauses().prop_flat_map(|c| (Just(c.clone()), Just(c).prop_shuffle()))
    ) {
        init_logger();
        prop_assert_eq!(
            evaluate(&source(&original), EvalConfig::default()),
            evaluate(&source(&shuffled), EvalConfig::default())
        );
    }

    #[test]
    fn prop_rerun_derives_nothing(clauses in clauses()) {
        let mut engine = DatalogEngine::new();
        engine.load(&source(&clauses)).unwrap();
        engine.run().unwrap();
        let first = relations(engine.store());

        let report = engine.run().unwrap();
        prop_assert_eq!(report.derived(), 0);
        prop_assert_eq!(relations(engine.store()), first);
    }

    #[test]
    fn prop_more_clauses_never_remove_tuples(clauses in clauses(), split in any::<prop::sample::Index>()) {
        let cut = split.index(clauses.len() + 1);
        let mut engine = DatalogEngine::new();
        engine.load(&source(&clauses[..cut])).unwrap();
        engine.run().unwrap();
        let before = relations(engine.store());

        engine.load(&source(&clauses[cut..])).unwrap();
        engine.run().unwrap();
        let after = relations(engine.store());

        for (name, rows) in &before {
            prop_assert!(rows.is_subset(&after[name]), "{} lost tuples", name);
        }
        prop_assert_eq!(after, evaluate(&source(&clauses), EvalConfig::default()));
    }

    #[test]
    fn prop_strata_only_read_completed_or_own_predicates(clauses in clauses()) {
        let program = Program::new(clauses).unwrap();
        let strat = Stratification::new(&program);
        for (idx, stratum) in strat.strata().iter().enumerate() {
            for rule in &stratum.rules {
                prop_assert_eq!(strat.stratum_of(rule.head.predicate.as_str()), Some(idx));
                for atom in &rule.body {
                    let dep = strat.stratum_of(atom.predicate.as_str()).unwrap();
                    prop_assert!(dep <= idx);
                    if dep == idx {
                        prop_assert!(stratum.recursive);
                    }
                }
            }
        }
    }

    #[test]
    fn prop_matches_brute_force_fixpoint(clauses in clauses()) {
        let program = Program::new(clauses.clone()).unwrap();
        let expected = reference_fixpoint(&program);
        prop_assert_eq!(evaluate(&source(&clauses), EvalConfig::default()), expected.clone());
        prop_assert_eq!(
            evaluate(&source(&clauses), EvalConfig::default().with_strategy(litelog::Strategy::Naive)),
            expected
        );
    }
}

fn rows(engine: &DatalogEngine, name: &str) -> BTreeSet<Vec<String>> {
    relations(engine.store()).remove(name).unwrap_or_default()
}

fn set(rows: &[&[&str]]) -> BTreeSet<Vec<String>> {
    rows.iter()
        .map(|row| row.iter().map(ToString::to_string).collect())
        .collect()
}

#[test]
fn test_facts_only() {
    init_logger();
    let mut engine = DatalogEngine::new();
    engine.load("baz(boz).").unwrap();
    engine.run().unwrap();
    assert_eq!(rows(&engine, "baz"), set(&[&["boz"]]));
}

#[test]
fn test_rule_over_seeded_nullary_relations() {
    let mut store = MemoryStore::new();
    for name in ["flum", "flim"] {
        store.create_relation(name, 0).unwrap();
        store.insert(name, Default::default()).unwrap();
    }
    let mut engine = DatalogEngine::with_store(store, EvalConfig::default());
    engine.load("foo(bar,biz) :- flum(), flim().").unwrap();
    engine.run().unwrap();
    assert_eq!(rows(&engine, "foo"), set(&[&["bar", "biz"]]));

    let mut store = MemoryStore::new();
    store.create_relation("flum", 0).unwrap();
    store.insert("flum", Default::default()).unwrap();
    let mut engine = DatalogEngine::with_store(store, EvalConfig::default());
    engine.load("foo(bar,biz) :- flum(), flim().").unwrap();
    engine.run().unwrap();
    assert!(rows(&engine, "foo").is_empty());
}

#[test]
fn test_transitive_closure_over_seeded_edges() {
    init_logger();
    let mut store = MemoryStore::new();
    store.create_relation("edge", 2).unwrap();
    store.create_relation("path", 2).unwrap();
    for (from, to) in [("1", "2"), ("2", "3"), ("3", "4")] {
        store
            .insert("edge", [Symbol::new(from), Symbol::new(to)].into_iter().collect())
            .unwrap();
    }

    let mut engine = DatalogEngine::with_store(store, EvalConfig::default().with_provenance(true));
    engine
        .load("path(X,Y) :- edge(X,Y).\npath(X,Z) :- edge(X,Y), path(Y,Z).")
        .unwrap();
    let report = engine.run().unwrap().clone();

    let path = report.stratum_for("path").unwrap();
    assert_eq!(path.new_per_round, vec![3, 2, 1, 0]);
    assert_eq!(path.rounds, 4);
    assert_eq!(
        report.derivation("path", &[Symbol::new("1"), Symbol::new("4")]).map(|d| d.round),
        Some(3)
    );
    assert_eq!(
        rows(&engine, "path"),
        set(&[
            &["1", "2"],
            &["2", "3"],
            &["3", "4"],
            &["1", "3"],
            &["2", "4"],
            &["1", "4"],
        ])
    );
}

#[test]
fn test_unbound_head_variable_mutates_nothing() {
    let mut store = MemoryStore::new();
    store.create_relation("bar", 0).unwrap();
    let mut engine = DatalogEngine::with_store(store, EvalConfig::default());

    let err = engine.load("foo(X) :- bar().").unwrap_err();
    assert!(matches!(err, litelog::Error::Semantic(_)), "{err}");
    assert!(engine.program().is_empty());
    assert_eq!(engine.store().relation_names().collect::<Vec<_>>(), vec!["bar"]);
    assert_eq!(engine.store().total_tuples(), 0);
}
