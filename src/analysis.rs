//! Predicate dependency analysis and stratification.
//!
//! A rule for `A` with a body atom over `B` makes `A` depend on `B`. The
//! strongly connected components of this graph are the strata; they are
//! returned dependencies first, so evaluating them in order means every
//! body predicate from another stratum is already complete.

use indexmap::{IndexMap, IndexSet};

use crate::ast::{Atom, Rule, Symbol};
use crate::error::StoreError;
use crate::program::Program;
use crate::store::RelationStore;

/// Directed graph from predicates to the predicates their rules read.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: IndexSet<Symbol>,
    /// `edges[i]` holds the indices of the predicates node `i` depends on
    edges: Vec<IndexSet<usize>>,
}

impl DependencyGraph {
    /// Build the graph for every predicate of `program`.
    #[must_use]
    pub fn new(program: &Program) -> Self {
        let nodes: IndexSet<Symbol> = program.predicates().keys().cloned().collect();
        let mut edges = vec![IndexSet::new(); nodes.len()];

        for rule in program.rules() {
            let Some(head) = nodes.get_index_of(&rule.head.predicate) else {
                continue;
            };
            for atom in &rule.body {
                if let Some(dep) = nodes.get_index_of(&atom.predicate) {
                    edges[head].insert(dep);
                }
            }
        }

        Self { nodes, edges }
    }

    /// Whether `from` directly depends on `to`.
    #[must_use]
    pub fn depends_on(&self, from: &str, to: &str) -> bool {
        match (self.nodes.get_index_of(from), self.nodes.get_index_of(to)) {
            (Some(from), Some(to)) => self.edges[from].contains(&to),
            _ => false,
        }
    }

    /// Number of predicates in the graph.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no predicates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Tarjan's algorithm, iterative.
    ///
    /// Components come out after every component they can reach, which with
    /// edges pointing at dependencies means dependencies first. Members of a
    /// component are sorted by first occurrence.
    fn strongly_connected_components(&self) -> Vec<Vec<usize>> {
        let n = self.nodes.len();
        let mut index: Vec<Option<usize>> = vec![None; n];
        let mut lowlink = vec![0; n];
        let mut on_stack = vec![false; n];
        let mut stack = Vec::new();
        let mut next_index = 0;
        let mut components = Vec::new();

        for root in 0..n {
            if index[root].is_some() {
                continue;
            }
            // (node, position of the next successor to visit)
            let mut work = vec![(root, 0)];
            while let Some((node, edge_pos)) = work.pop() {
                if index[node].is_none() {
                    index[node] = Some(next_index);
                    lowlink[node] = next_index;
                    next_index += 1;
                    stack.push(node);
                    on_stack[node] = true;
                }

                if let Some(&succ) = self.edges[node].get_index(edge_pos) {
                    work.push((node, edge_pos + 1));
                    match index[succ] {
                        None => work.push((succ, 0)),
                        Some(succ_index) if on_stack[succ] => {
                            lowlink[node] = lowlink[node].min(succ_index);
                        }
                        Some(_) => {}
                    }
                    continue;
                }

                if index[node] == Some(lowlink[node]) {
                    let mut component = Vec::new();
                    while let Some(member) = stack.pop() {
                        on_stack[member] = false;
                        component.push(member);
                        if member == node {
                            break;
                        }
                    }
                    component.sort_unstable();
                    components.push(component);
                }
                if let Some(&(parent, _)) = work.last() {
                    lowlink[parent] = lowlink[parent].min(lowlink[node]);
                }
            }
        }

        components
    }
}

/// A set of mutually recursive predicates and the rules defining them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stratum {
    /// Predicates of this stratum, in first-occurrence order
    pub predicates: IndexSet<Symbol>,
    /// Rules whose head predicate is in this stratum, in program order
    pub rules: Vec<Rule>,
    /// Whether some predicate depends on itself, directly or not
    pub recursive: bool,
}

impl Stratum {
    /// Whether `atom` reads a predicate defined in this stratum.
    #[must_use]
    pub fn is_local(&self, atom: &Atom) -> bool {
        self.predicates.contains(&atom.predicate)
    }

    /// Whether any body atom of `rule` reads a predicate of this stratum.
    #[must_use]
    pub fn is_recursive_rule(&self, rule: &Rule) -> bool {
        rule.body.iter().any(|atom| self.is_local(atom))
    }
}

/// Strata in evaluation order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stratification {
    strata: Vec<Stratum>,
    stratum_of: IndexMap<Symbol, usize>,
}

impl Stratification {
    /// Partition the predicates of `program` into strata.
    #[must_use]
    pub fn new(program: &Program) -> Self {
        let graph = DependencyGraph::new(program);
        let mut stratum_of = IndexMap::new();
        let mut strata = Vec::new();

        for component in graph.strongly_connected_components() {
            let recursive = component.len() > 1
                || component
                    .first()
                    .is_some_and(|&node| graph.edges[node].contains(&node));
            let predicates: IndexSet<Symbol> = component
                .iter()
                .filter_map(|&node| graph.nodes.get_index(node).cloned())
                .collect();
            let rules = program
                .rules()
                .filter(|rule| predicates.contains(&rule.head.predicate))
                .cloned()
                .collect();

            for predicate in &predicates {
                stratum_of.insert(predicate.clone(), strata.len());
            }
            log::debug!(
                target: "analysis",
                "stratum {}: {:?} (recursive: {recursive})",
                strata.len(),
                predicates.iter().map(Symbol::as_str).collect::<Vec<_>>()
            );
            strata.push(Stratum {
                predicates,
                rules,
                recursive,
            });
        }

        Self { strata, stratum_of }
    }

    /// The strata, dependencies first.
    #[must_use]
    pub fn strata(&self) -> &[Stratum] {
        &self.strata
    }

    /// The index of the stratum holding `predicate`.
    #[must_use]
    pub fn stratum_of(&self, predicate: &str) -> Option<usize> {
        self.stratum_of.get(predicate).copied()
    }

    /// Create one relation per predicate and insert the program's facts.
    ///
    /// Returns the number of fact tuples that were new to the store.
    ///
    /// # Errors
    ///
    /// Propagates the first store failure.
    pub fn materialize<S: RelationStore + ?Sized>(
        &self,
        program: &Program,
        store: &mut S,
    ) -> Result<usize, StoreError> {
        for stratum in &self.strata {
            for predicate in &stratum.predicates {
                let arity = program.predicate(predicate.as_str()).map_or(0, |p| p.arity);
                store.create_relation(predicate.as_str(), arity)?;
            }
        }

        let mut inserted = 0;
        for fact in program.facts() {
            if let Some(tuple) = fact.to_tuple() {
                if store.insert(fact.predicate.as_str(), tuple)? {
                    inserted += 1;
                }
            }
        }
        log::debug!(target: "analysis", "seeded {inserted} fact tuples");
        Ok(inserted)
    }
}
