use indexmap::{Equivalent, IndexMap};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

use crate::term::{fresh_block, Term, VarId};

/// Name and arity of a predicate (e.g. `has_target/2`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PredicateKey {
    /// Predicate name
    pub name: Arc<str>,
    /// Number of arguments
    pub arity: usize,
}

impl fmt::Display for PredicateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.arity)
    }
}

/// Borrowed form of [`PredicateKey`]; hashes the same way
#[derive(Hash)]
struct KeyRef<'a>(&'a str, usize);

impl Equivalent<PredicateKey> for KeyRef<'_> {
    fn equivalent(&self, key: &PredicateKey) -> bool {
        *key.name == *self.0 && key.arity == self.1
    }
}

/// A fact (empty body) or rule `head :- body1, ..., bodyN`.
///
/// Variables are numbered `0..var_count` within the clause; [`Clause::renamed`]
/// maps them onto fresh global ids.
#[derive(Debug, Clone)]
pub struct Clause {
    /// Clause head, an atom or compound
    pub head: Term,
    /// Conjunction of body goals, empty for facts
    pub body: Vec<Term>,
    var_count: u64,
}

impl Clause {
    /// Builds a clause whose variable ids are already clause-local and dense
    /// (`0..var_count`), as produced by the parser.
    #[must_use]
    pub fn new(head: Term, body: Vec<Term>, var_count: u64) -> Self {
        Self {
            head,
            body,
            var_count,
        }
    }

    /// Builds a fact
    #[must_use]
    pub fn fact(head: Term, var_count: u64) -> Self {
        Self::new(head, Vec::new(), var_count)
    }

    /// Returns true if the clause has no body
    #[must_use]
    pub fn is_fact(&self) -> bool {
        self.body.is_empty()
    }

    /// Number of distinct variables in the clause
    #[must_use]
    pub fn var_count(&self) -> u64 {
        self.var_count
    }

    /// Predicate this clause defines
    ///
    /// # Panics
    ///
    /// Panics if the head is not callable; the parser and [`ClauseStore::push`]
    /// never let such a clause in.
    #[must_use]
    pub fn key(&self) -> PredicateKey {
        let (name, arity) = self
            .head
            .functor()
            .expect("clause head must be an atom or compound");
        PredicateKey {
            name: name.into(),
            arity,
        }
    }

    /// Copy of the clause with fresh variables, so that a recursive or
    /// repeated use never aliases the variables of another call.
    #[must_use]
    pub fn renamed(&self) -> (Term, Vec<Term>) {
        let base: VarId = fresh_block(self.var_count);
        (
            self.head.offset_vars(base),
            self.body.iter().map(|goal| goal.offset_vars(base)).collect(),
        )
    }

    /// Clause equivalence: same head and body up to variable renaming
    #[must_use]
    pub fn is_variant(&self, other: &Clause) -> bool {
        if self.body.len() != other.body.len() {
            return false;
        }
        let mut mapping = crate::term::VariantMap::default();
        mapping.check(&self.head, &other.head)
            && self
                .body
                .iter()
                .zip(&other.body)
                .all(|(a, b)| mapping.check(a, b))
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.head)?;
        for (i, goal) in self.body.iter().enumerate() {
            f.write_str(if i == 0 { " :- " } else { ", " })?;
            write!(f, "{goal}")?;
        }
        f.write_str(".")
    }
}

/// Ordered clause database, indexed by predicate.
///
/// A store is immutable once published through [`SharedStore`]; a policy load
/// builds a complete new store and swaps it in.
#[derive(Debug, Clone, Default)]
pub struct ClauseStore {
    /// All clauses, in insertion order
    clauses: Vec<Arc<Clause>>,
    /// For each predicate, the positions of its clauses in `clauses`
    by_predicate: IndexMap<PredicateKey, Vec<usize>>,
}

impl ClauseStore {
    /// Creates an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a clause. Non-callable heads are ignored and reported as
    /// `false`.
    pub fn push(&mut self, clause: Clause) -> bool {
        if !clause.head.is_callable() {
            return false;
        }
        let position = self.clauses.len();
        self.by_predicate
            .entry(clause.key())
            .or_default()
            .push(position);
        self.clauses.push(Arc::new(clause));
        true
    }

    /// Number of clauses
    #[must_use]
    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    /// Returns true if the store holds no clauses
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// All clauses in insertion order
    pub fn clauses(&self) -> impl Iterator<Item = &Clause> {
        self.clauses.iter().map(AsRef::as_ref)
    }

    /// Clause at an insertion position
    #[must_use]
    pub fn clause(&self, position: usize) -> Option<&Clause> {
        self.clauses.get(position).map(AsRef::as_ref)
    }

    /// Positions of the clauses defining `name/arity`, in store order.
    /// Unknown predicates have no candidates.
    #[must_use]
    pub fn candidates(&self, name: &str, arity: usize) -> &[usize] {
        self.by_predicate
            .get(&KeyRef(name, arity))
            .map_or(&[], Vec::as_slice)
    }

    /// Predicates defined in the store, in order of first definition
    pub fn predicates(&self) -> impl Iterator<Item = &PredicateKey> {
        self.by_predicate.keys()
    }

    /// Renders every clause, one per line, in a form the policy parser
    /// reads back to an equivalent store.
    #[must_use]
    pub fn serialize(&self) -> String {
        let mut text = String::new();
        for clause in &self.clauses {
            text.push_str(&clause.to_string());
            text.push('\n');
        }
        text
    }
}

impl FromIterator<Clause> for ClauseStore {
    fn from_iter<I: IntoIterator<Item = Clause>>(iter: I) -> Self {
        let mut store = ClauseStore::new();
        for clause in iter {
            store.push(clause);
        }
        store
    }
}

/// The engine's current clause store.
///
/// Readers take an `Arc` snapshot and never hold the lock while solving;
/// writers publish a fully built store with a single pointer swap. A query
/// therefore sees exactly one store version from start to finish.
#[derive(Debug, Default)]
pub struct SharedStore {
    current: RwLock<Published>,
}

#[derive(Debug, Default)]
struct Published {
    store: Arc<ClauseStore>,
    generation: u64,
}

impl SharedStore {
    /// Creates a shared handle around an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The store as of now. Later replacements do not affect the snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<ClauseStore> {
        Arc::clone(&self.current.read().store)
    }

    /// Publishes `store`, returning the previous one and the generation
    /// number `store` was published under
    pub fn replace(&self, store: ClauseStore) -> (Arc<ClauseStore>, u64) {
        let store = Arc::new(store);
        let mut current = self.current.write();
        current.generation += 1;
        let previous = std::mem::replace(&mut current.store, store);
        (previous, current.generation)
    }

    /// Number of successful replacements so far
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.current.read().generation
    }
}
