//! Substitutions and first-order unification.
//!
//! [`Bindings`] is a substitution whose insertion order doubles as the
//! backtracking trail: a choice point only needs to remember `len()` and
//! [`Bindings::undo_to`] drops every binding made after it. Bound terms are
//! shared, never copied, so keeping a substitution alive across backtracking
//! costs one entry per binding.

use indexmap::IndexMap;

use crate::term::{Term, VarId};

/// A substitution from variable ids to terms
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bindings {
    slots: IndexMap<VarId, Term>,
}

impl Bindings {
    /// Creates an empty substitution
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bindings, which is also the current trail mark
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if nothing is bound
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Direct binding of a variable, without dereferencing
    #[must_use]
    pub fn get(&self, id: VarId) -> Option<&Term> {
        self.slots.get(&id)
    }

    /// Binds an unbound variable
    fn bind(&mut self, id: VarId, term: Term) {
        let previous = self.slots.insert(id, term);
        debug_assert!(previous.is_none(), "variable {id} bound twice");
    }

    /// Drops every binding made after `mark` was taken
    pub fn undo_to(&mut self, mark: usize) {
        self.slots.truncate(mark);
    }

    /// Follows variable chains until a non-variable or an unbound variable
    #[must_use]
    pub fn dereference<'a>(&'a self, term: &'a Term) -> &'a Term {
        let mut current = term;
        while let Term::Var(var) = current {
            match self.slots.get(&var.id) {
                Some(bound) => current = bound,
                None => break,
            }
        }
        current
    }

    /// Returns true if variable `id` occurs in `term` once fully dereferenced
    #[must_use]
    pub fn occurs(&self, id: VarId, term: &Term) -> bool {
        match self.dereference(term) {
            Term::Var(var) => var.id == id,
            Term::Compound(_, args) => args.iter().any(|arg| self.occurs(id, arg)),
            Term::Atom(_) | Term::Number(_) => false,
        }
    }

    /// Applies the substitution all the way down, leaving unbound variables
    /// in place
    #[must_use]
    pub fn resolve(&self, term: &Term) -> Term {
        match self.dereference(term) {
            Term::Compound(functor, args) => Term::Compound(
                functor.clone(),
                args.iter().map(|arg| self.resolve(arg)).collect(),
            ),
            other => other.clone(),
        }
    }

    /// Iterates over the bindings in the order they were made
    pub fn iter(&self) -> impl Iterator<Item = (VarId, &Term)> {
        self.slots.iter().map(|(id, term)| (*id, term))
    }
}

/// Unifies `a` with `b`, extending `bindings` with the most general unifier.
///
/// Unbound variables are bound to the other side (variable to variable
/// binds the left one). With `occurs_check` a binding that would make a
/// variable contain itself fails the unification; without it such cyclic
/// bindings are accepted, which is faster but unsound.
///
/// On failure `bindings` is restored to what it was on entry, so a failed
/// attempt never leaves partial bindings behind.
pub fn unify(a: &Term, b: &Term, bindings: &mut Bindings, occurs_check: bool) -> bool {
    let mark = bindings.len();
    if unify_inner(a, b, bindings, occurs_check) {
        true
    } else {
        bindings.undo_to(mark);
        false
    }
}

fn unify_inner(a: &Term, b: &Term, bindings: &mut Bindings, occurs_check: bool) -> bool {
    let left = bindings.dereference(a).clone();
    let right = bindings.dereference(b).clone();

    match (&left, &right) {
        (Term::Var(x), Term::Var(y)) if x.id == y.id => true,
        (Term::Var(var), other) | (other, Term::Var(var)) => {
            if occurs_check && bindings.occurs(var.id, other) {
                return false;
            }
            bindings.bind(var.id, other.clone());
            true
        }
        (Term::Atom(x), Term::Atom(y)) => x == y,
        (Term::Number(x), Term::Number(y)) => x == y,
        (Term::Compound(f, xs), Term::Compound(g, ys)) => {
            f == g
                && xs.len() == ys.len()
                && xs
                    .iter()
                    .zip(ys.iter())
                    .all(|(x, y)| unify_inner(x, y, bindings, occurs_check))
        }
        _ => false,
    }
}

/// Most general unifier of two terms under an empty substitution
#[must_use]
pub fn mgu(a: &Term, b: &Term, occurs_check: bool) -> Option<Bindings> {
    let mut bindings = Bindings::new();
    unify(a, b, &mut bindings, occurs_check).then_some(bindings)
}
