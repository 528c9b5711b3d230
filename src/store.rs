//! Relation storage used as input and output of evaluation.
//!
//! [`RelationStore`] is the narrow interface the evaluator needs from a
//! backend. [`MemoryStore`] is the in-memory implementation, with
//! per-position value indexes for pattern lookups.

use indexmap::{IndexMap, IndexSet};

use crate::ast::{Symbol, Tuple};
use crate::error::StoreError;

/// A relational backend holding named, fixed-arity sets of tuples.
///
/// Inserts must be visible to every later `scan` or `match_pattern` call.
pub trait RelationStore {
    /// Create an empty relation, or do nothing if it exists with this arity.
    ///
    /// # Errors
    ///
    /// Fails if the relation exists with another arity.
    fn create_relation(&mut self, name: &str, arity: usize) -> Result<(), StoreError>;

    /// Insert a tuple; returns `true` if it was not present before.
    ///
    /// # Errors
    ///
    /// Fails for unknown relations or tuples of the wrong arity.
    fn insert(&mut self, name: &str, tuple: Tuple) -> Result<bool, StoreError>;

    /// All tuples of a relation.
    ///
    /// # Errors
    ///
    /// Fails for unknown relations.
    fn scan(&self, name: &str) -> Result<Vec<Tuple>, StoreError>;

    /// Tuples equal to `pattern` at every position where it holds a value.
    ///
    /// # Errors
    ///
    /// Fails for unknown relations or patterns of the wrong arity.
    fn match_pattern(&self, name: &str, pattern: &[Option<Symbol>])
        -> Result<Vec<Tuple>, StoreError>;

    /// The arity of a relation, or `None` if it does not exist.
    fn arity(&self, name: &str) -> Option<usize>;

    /// Whether a relation holds `tuple`.
    ///
    /// # Errors
    ///
    /// Fails for unknown relations or tuples of the wrong arity.
    fn contains(&self, name: &str, tuple: &[Symbol]) -> Result<bool, StoreError> {
        let pattern: Vec<Option<Symbol>> = tuple.iter().cloned().map(Some).collect();
        Ok(!self.match_pattern(name, &pattern)?.is_empty())
    }
}

/// Index for fast tuple lookup by argument position and value
#[derive(Debug, Clone, Default)]
struct PositionIndex {
    /// For each argument position, maps values to the indices of tuples holding them
    /// For relation `edge(a,b), edge(a,c), edge(b,c)`:
    /// - Position 0 index: `{"a" -> {0, 1}, "b" -> {2}}`
    /// - Position 1 index: `{"b" -> {0}, "c" -> {1, 2}}`
    by_position: Vec<IndexMap<Symbol, IndexSet<usize>>>,
}

impl PositionIndex {
    fn new(arity: usize) -> Self {
        Self {
            by_position: (0..arity).map(|_| IndexMap::new()).collect(),
        }
    }

    fn add(&mut self, tuple: &[Symbol], id: usize) {
        for (pos, value) in tuple.iter().enumerate() {
            self.by_position[pos]
                .entry(value.clone())
                .or_default()
                .insert(id);
        }
    }

    /// Tuple ids holding `value` at `position`
    fn lookup(&self, position: usize, value: &Symbol) -> Option<&IndexSet<usize>> {
        self.by_position
            .get(position)
            .and_then(|pos_map| pos_map.get(value))
    }
}

#[derive(Debug, Clone)]
struct Relation {
    arity: usize,
    tuples: IndexSet<Tuple>,
    index: PositionIndex,
}

impl Relation {
    fn new(arity: usize) -> Self {
        Self {
            arity,
            tuples: IndexSet::new(),
            index: PositionIndex::new(arity),
        }
    }

    fn check_arity(&self, name: &str, found: usize) -> Result<(), StoreError> {
        if self.arity == found {
            Ok(())
        } else {
            Err(StoreError::ArityMismatch {
                relation: name.to_string(),
                expected: self.arity,
                found,
            })
        }
    }

    /// Uses the most selective bound position, then checks the remaining ones.
    fn matching(&self, pattern: &[Option<Symbol>]) -> Vec<Tuple> {
        let matches = |tuple: &Tuple| {
            pattern
                .iter()
                .zip(tuple)
                .all(|(bound, value)| bound.as_ref().map_or(true, |b| b == value))
        };

        let mut best: Option<&IndexSet<usize>> = None;
        for (pos, bound) in pattern.iter().enumerate() {
            let Some(value) = bound else { continue };
            match self.index.lookup(pos, value) {
                // a bound value that never occurs rules everything out
                None => return Vec::new(),
                Some(ids) if best.map_or(true, |b| ids.len() < b.len()) => best = Some(ids),
                Some(_) => {}
            }
        }

        match best {
            Some(ids) => ids
                .iter()
                .filter_map(|&id| self.tuples.get_index(id))
                .filter(|tuple| matches(*tuple))
                .cloned()
                .collect(),
            None => self.tuples.iter().cloned().collect(),
        }
    }
}

/// In-memory [`RelationStore`].
///
/// Relations keep insertion order, so scans are deterministic.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    relations: IndexMap<String, Relation>,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of all relations, in creation order.
    pub fn relation_names(&self) -> impl Iterator<Item = &str> {
        self.relations.keys().map(String::as_str)
    }

    /// Number of tuples in a relation (0 if it does not exist).
    #[must_use]
    pub fn len(&self, name: &str) -> usize {
        self.relations.get(name).map_or(0, |rel| rel.tuples.len())
    }

    /// Total number of tuples across relations.
    #[must_use]
    pub fn total_tuples(&self) -> usize {
        self.relations.values().map(|rel| rel.tuples.len()).sum()
    }

    fn relation(&self, name: &str) -> Result<&Relation, StoreError> {
        self.relations
            .get(name)
            .ok_or_else(|| StoreError::UnknownRelation(name.to_string()))
    }
}

impl RelationStore for MemoryStore {
    fn create_relation(&mut self, name: &str, arity: usize) -> Result<(), StoreError> {
        match self.relations.get(name) {
            Some(rel) => rel.check_arity(name, arity),
            None => {
                log::trace!(target: "store", "create relation {name}/{arity}");
                self.relations.insert(name.to_string(), Relation::new(arity));
                Ok(())
            }
        }
    }

    fn insert(&mut self, name: &str, tuple: Tuple) -> Result<bool, StoreError> {
        let rel = self
            .relations
            .get_mut(name)
            .ok_or_else(|| StoreError::UnknownRelation(name.to_string()))?;
        rel.check_arity(name, tuple.len())?;

        let (id, inserted) = rel.tuples.insert_full(tuple);
        if inserted {
            let Relation { tuples, index, .. } = rel;
            if let Some(tuple) = tuples.get_index(id) {
                index.add(tuple, id);
            }
        }
        Ok(inserted)
    }

    fn scan(&self, name: &str) -> Result<Vec<Tuple>, StoreError> {
        Ok(self.relation(name)?.tuples.iter().cloned().collect())
    }

    fn match_pattern(
        &self,
        name: &str,
        pattern: &[Option<Symbol>],
    ) -> Result<Vec<Tuple>, StoreError> {
        let rel = self.relation(name)?;
        rel.check_arity(name, pattern.len())?;
        Ok(rel.matching(pattern))
    }

    fn arity(&self, name: &str) -> Option<usize> {
        self.relations.get(name).map(|rel| rel.arity)
    }

    fn contains(&self, name: &str, tuple: &[Symbol]) -> Result<bool, StoreError> {
        let rel = self.relation(name)?;
        rel.check_arity(name, tuple.len())?;
        Ok(rel.tuples.contains(tuple))
    }
}
