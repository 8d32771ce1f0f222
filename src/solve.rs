//! SLD resolution with chronological backtracking.
//!
//! [`Solutions`] is a lazy iterator over the answers of a [`Goal`]. Pending
//! goals form a shared linked list, so a choice point can keep the
//! continuation it must resume without copying it. Bindings live in a
//! single [`Bindings`] whose length is the trail mark saved by each choice
//! point; backtracking truncates it.
//!
//! Builtins: `true`, `fail`, `false`, `!`, `,/2`, `;/2`, `\+/1`, `=/2`,
//! `\=/2`, `==/2`, `\==/2` and the numeric comparisons `< > =< >= =:= =\=`.
//! A predicate with no clauses simply fails.

use indexmap::{IndexMap, IndexSet};
use log::trace;
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::config::{EngineConfig, QueryBudget};
use crate::error::{Error, Limit, Result};
use crate::store::ClauseStore;
use crate::term::{fresh_block, Number, Term, Var, VarId};
use crate::unify::{unify, Bindings};

/// How often (in inferences) the wall clock is consulted
const CLOCK_INTERVAL: u64 = 256;

/// A conjunction of goals to prove
#[derive(Debug, Clone)]
pub struct Goal {
    goals: Vec<Term>,
    var_count: u64,
}

impl Goal {
    /// Builds a goal from terms built in code. Variables are renumbered, so
    /// any ids may be used as long as equal ids mean the same variable.
    #[must_use]
    pub fn new(goals: Vec<Term>) -> Self {
        let mut vars = IndexSet::new();
        for goal in &goals {
            goal.collect_vars(&mut vars);
        }
        let dense: IndexMap<VarId, u64> = vars
            .iter()
            .enumerate()
            .map(|(i, var)| (var.id, i as u64))
            .collect();
        let goals = goals.iter().map(|goal| renumber(goal, &dense)).collect();
        Self::from_dense(goals, dense.len() as u64)
    }

    /// Goal whose variables are already numbered `0..var_count`
    pub(crate) fn from_dense(goals: Vec<Term>, var_count: u64) -> Self {
        Self { goals, var_count }
    }

    /// The conjuncts, left to right
    #[must_use]
    pub fn terms(&self) -> &[Term] {
        &self.goals
    }
}

fn renumber(term: &Term, dense: &IndexMap<VarId, u64>) -> Term {
    match term {
        Term::Var(var) => Term::Var(Var {
            id: dense[&var.id],
            name: var.name.clone(),
        }),
        Term::Compound(functor, args) => Term::Compound(
            functor.clone(),
            args.iter().map(|arg| renumber(arg, dense)).collect(),
        ),
        Term::Atom(_) | Term::Number(_) => term.clone(),
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, goal) in self.goals.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{goal}")?;
        }
        f.write_str(".")
    }
}

/// One answer: the values of the goal's named variables. Variables whose
/// name starts with `_` are not reported. Every solution produced is a
/// success; failure is the end of the sequence.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Solution {
    bindings: IndexMap<Arc<str>, Term>,
}

impl Solution {
    /// Value of a query variable; unbound variables come back as variables
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Term> {
        self.bindings.get(name)
    }

    /// Value of a query variable, or `None` if it is missing or still unbound
    #[must_use]
    pub fn bound(&self, name: &str) -> Option<&Term> {
        self.get(name).filter(|term| !matches!(term, Term::Var(_)))
    }

    /// Variables and values, in order of first appearance in the goal
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Term)> {
        self.bindings.iter().map(|(name, term)| (&**name, term))
    }

    /// Number of reported variables
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns true for a goal without named variables
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl fmt::Display for Solution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bindings.is_empty() {
            return f.write_str("true");
        }
        for (i, (name, term)) in self.bindings.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name} = {term}")?;
        }
        Ok(())
    }
}

/// Pending goals, innermost first
type Conj = Option<Arc<Frame>>;

#[derive(Debug)]
struct Frame {
    goal: Term,
    /// Height the choice stack is cut back to when this goal is `!`
    cut_barrier: usize,
    next: Conj,
}

impl Drop for Frame {
    // Unlink iteratively so long continuations don't recurse on drop
    fn drop(&mut self) {
        let mut next = self.next.take();
        while let Some(frame) = next {
            match Arc::try_unwrap(frame) {
                Ok(mut frame) => next = frame.next.take(),
                Err(_) => break,
            }
        }
    }
}

fn push(goal: Term, cut_barrier: usize, next: Conj) -> Conj {
    Some(Arc::new(Frame {
        goal,
        cut_barrier,
        next,
    }))
}

#[derive(Debug)]
enum Alternative {
    /// Retry `goal` against the clauses from candidate `next` on
    Clauses {
        goal: Term,
        next: usize,
        continuation: Conj,
    },
    /// Resume with these goals (the other side of `;`, or the success
    /// path of `\+`)
    Resume(Conj),
}

#[derive(Debug)]
struct ChoicePoint {
    trail_mark: usize,
    alternative: Alternative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Running,
    /// An answer was returned; continue by backtracking
    Suspended,
    Exhausted,
}

/// Lazy sequence of the answers to a goal against one store snapshot.
///
/// Each call to `next` resumes the search where the previous answer left
/// it. After an error the iterator is finished.
#[derive(Debug)]
pub struct Solutions {
    store: Arc<ClauseStore>,
    bindings: Bindings,
    goals: Conj,
    choices: Vec<ChoicePoint>,
    answer_vars: SmallVec<[(Arc<str>, VarId); 4]>,
    occurs_check: bool,
    budget: QueryBudget,
    inferences: u64,
    started: Instant,
    state: State,
}

impl Solutions {
    /// Starts solving `goal` using the engine settings
    #[must_use]
    pub fn new(store: Arc<ClauseStore>, goal: &Goal, config: &EngineConfig) -> Self {
        Self::with_budget(store, goal, config.occurs_check, config.budget)
    }

    /// Starts solving `goal` under an explicit budget
    #[must_use]
    pub fn with_budget(
        store: Arc<ClauseStore>,
        goal: &Goal,
        occurs_check: bool,
        budget: QueryBudget,
    ) -> Self {
        let base = fresh_block(goal.var_count);
        let terms: Vec<Term> = goal.goals.iter().map(|t| t.offset_vars(base)).collect();

        let mut vars = IndexSet::new();
        for term in &terms {
            term.collect_vars(&mut vars);
        }
        let answer_vars = vars
            .into_iter()
            .filter_map(|var| {
                var.name
                    .filter(|name| !name.starts_with('_'))
                    .map(|name| (name, var.id))
            })
            .collect();

        let goals = terms
            .into_iter()
            .rev()
            .fold(None, |next, goal| push(goal, 0, next));

        Self {
            store,
            bindings: Bindings::new(),
            goals,
            choices: Vec::new(),
            answer_vars,
            occurs_check,
            budget,
            inferences: 0,
            started: Instant::now(),
            state: State::Running,
        }
    }

    /// Resolution steps taken so far
    #[must_use]
    pub fn inferences(&self) -> u64 {
        self.inferences
    }

    /// The store snapshot this query runs against
    #[must_use]
    pub fn store(&self) -> &Arc<ClauseStore> {
        &self.store
    }

    fn next_solution(&mut self) -> Result<Option<Solution>> {
        match self.state {
            State::Exhausted => return Ok(None),
            State::Suspended => {
                if !self.backtrack()? {
                    self.state = State::Exhausted;
                    return Ok(None);
                }
                self.state = State::Running;
            }
            State::Running => {}
        }

        loop {
            let Some(frame) = self.goals.take() else {
                self.state = if self.choices.is_empty() {
                    State::Exhausted
                } else {
                    State::Suspended
                };
                return Ok(Some(self.answer()));
            };
            self.goals = frame.next.clone();
            self.tick()?;
            if !self.call(&frame.goal, frame.cut_barrier)? && !self.backtrack()? {
                self.state = State::Exhausted;
                return Ok(None);
            }
        }
    }

    fn tick(&mut self) -> Result<()> {
        self.inferences += 1;
        if let Some(max) = self.budget.max_inferences {
            if self.inferences > max {
                return Err(Error::ResolutionLimit(Limit::Inferences(max)));
            }
        }
        if let Some(timeout) = self.budget.timeout {
            if self.inferences % CLOCK_INTERVAL == 0 && self.started.elapsed() > timeout {
                return Err(Error::ResolutionLimit(Limit::Time(timeout)));
            }
        }
        Ok(())
    }

    fn answer(&self) -> Solution {
        Solution {
            bindings: self
                .answer_vars
                .iter()
                .map(|(name, id)| {
                    let value = self.bindings.resolve(&Term::var(*id));
                    (name.clone(), self.unname_fresh(&value))
                })
                .collect(),
        }
    }

    /// Drops the clause-source names of variables that are not query
    /// variables; two renamed copies of `X` must not both print as `X`.
    fn unname_fresh(&self, term: &Term) -> Term {
        match term {
            Term::Var(var) if var.name.is_some() => {
                if self.answer_vars.iter().any(|(_, id)| *id == var.id) {
                    term.clone()
                } else {
                    Term::var(var.id)
                }
            }
            Term::Compound(functor, args) => Term::Compound(
                functor.clone(),
                args.iter().map(|arg| self.unname_fresh(arg)).collect(),
            ),
            _ => term.clone(),
        }
    }

    /// Pops choice points until one yields an alternative. Returns false
    /// when the search space is exhausted.
    fn backtrack(&mut self) -> Result<bool> {
        while let Some(choice) = self.choices.pop() {
            self.bindings.undo_to(choice.trail_mark);
            match choice.alternative {
                Alternative::Resume(goals) => {
                    self.goals = goals;
                    return Ok(true);
                }
                Alternative::Clauses {
                    goal,
                    next,
                    continuation,
                } => {
                    self.tick()?;
                    if self.resolve(&goal, next, continuation) {
                        return Ok(true);
                    }
                }
            }
        }
        Ok(false)
    }

    /// Proves one goal. `self.goals` already holds the continuation.
    fn call(&mut self, goal: &Term, cut_barrier: usize) -> Result<bool> {
        let goal = self.bindings.dereference(goal).clone();
        match &goal {
            Term::Var(var) => Err(Error::Instantiation(format!(
                "goal {var} is an unbound variable"
            ))),
            Term::Number(_) => Err(Error::Type {
                expected: "callable",
                found: goal.to_string(),
            }),
            Term::Atom(name) => match &**name {
                "true" => Ok(true),
                "fail" | "false" => Ok(false),
                "!" => {
                    self.choices.truncate(cut_barrier);
                    Ok(true)
                }
                _ => {
                    let continuation = self.goals.clone();
                    Ok(self.resolve(&goal, 0, continuation))
                }
            },
            Term::Compound(name, args) => match (&**name, args.len()) {
                (",", 2) => {
                    let rest = self.goals.take();
                    let rest = push(args[1].clone(), cut_barrier, rest);
                    self.goals = push(args[0].clone(), cut_barrier, rest);
                    Ok(true)
                }
                (";", 2) => {
                    let rest = self.goals.take();
                    self.choices.push(ChoicePoint {
                        trail_mark: self.bindings.len(),
                        alternative: Alternative::Resume(push(
                            args[1].clone(),
                            cut_barrier,
                            rest.clone(),
                        )),
                    });
                    self.goals = push(args[0].clone(), cut_barrier, rest);
                    Ok(true)
                }
                ("\\+", 1) => {
                    // \+ G runs G, !, fail with the continuation parked in a
                    // choice point that is reached only if G has no proof
                    let height = self.choices.len();
                    self.choices.push(ChoicePoint {
                        trail_mark: self.bindings.len(),
                        alternative: Alternative::Resume(self.goals.take()),
                    });
                    let commit = push(Term::atom("!"), height, push(Term::atom("fail"), 0, None));
                    self.goals = push(args[0].clone(), height + 1, commit);
                    Ok(true)
                }
                ("=", 2) => Ok(unify(
                    &args[0],
                    &args[1],
                    &mut self.bindings,
                    self.occurs_check,
                )),
                ("\\=", 2) => {
                    let mark = self.bindings.len();
                    let unifiable = unify(&args[0], &args[1], &mut self.bindings, self.occurs_check);
                    self.bindings.undo_to(mark);
                    Ok(!unifiable)
                }
                ("==", 2) => Ok(self.identical(&args[0], &args[1])),
                ("\\==", 2) => Ok(!self.identical(&args[0], &args[1])),
                ("<", 2) => self.compare(&args[0], &args[1], Ordering::is_lt),
                (">", 2) => self.compare(&args[0], &args[1], Ordering::is_gt),
                ("=<", 2) => self.compare(&args[0], &args[1], Ordering::is_le),
                (">=", 2) => self.compare(&args[0], &args[1], Ordering::is_ge),
                ("=:=", 2) => self.compare(&args[0], &args[1], Ordering::is_eq),
                ("=\\=", 2) => self.compare(&args[0], &args[1], Ordering::is_ne),
                _ => {
                    let continuation = self.goals.clone();
                    Ok(self.resolve(&goal, 0, continuation))
                }
            },
        }
    }

    fn identical(&self, a: &Term, b: &Term) -> bool {
        self.bindings.resolve(a) == self.bindings.resolve(b)
    }

    fn number(&self, term: &Term) -> Result<Number> {
        match self.bindings.dereference(term) {
            Term::Number(n) => Ok(*n),
            Term::Var(var) => Err(Error::Instantiation(format!(
                "{var} is unbound in a numeric comparison"
            ))),
            other => Err(Error::Type {
                expected: "number",
                found: other.to_string(),
            }),
        }
    }

    fn compare(&self, a: &Term, b: &Term, test: fn(Ordering) -> bool) -> Result<bool> {
        Ok(test(self.number(a)?.compare(self.number(b)?)))
    }

    /// Tries the clauses for `goal` starting at candidate `start`. On the
    /// first head that unifies, leaves a choice point for the remaining
    /// candidates and schedules the clause body before `continuation`.
    fn resolve(&mut self, goal: &Term, start: usize, continuation: Conj) -> bool {
        let Some((name, arity)) = goal.functor() else {
            return false;
        };
        let store = Arc::clone(&self.store);
        let candidates = store.candidates(name, arity);
        let cut_barrier = self.choices.len();

        for (offset, &position) in candidates.iter().enumerate().skip(start) {
            let Some(clause) = store.clause(position) else {
                continue;
            };
            let mark = self.bindings.len();
            let (head, body) = clause.renamed();
            if !unify(goal, &head, &mut self.bindings, self.occurs_check) {
                continue;
            }
            trace!("{goal} resolved with clause #{position}");
            if offset + 1 < candidates.len() {
                self.choices.push(ChoicePoint {
                    trail_mark: mark,
                    alternative: Alternative::Clauses {
                        goal: goal.clone(),
                        next: offset + 1,
                        continuation: continuation.clone(),
                    },
                });
            }
            self.goals = body
                .into_iter()
                .rev()
                .fold(continuation, |next, goal| push(goal, cut_barrier, next));
            return true;
        }
        false
    }
}

impl Iterator for Solutions {
    type Item = Result<Solution>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_solution() {
            Ok(solution) => solution.map(Ok),
            Err(e) => {
                self.state = State::Exhausted;
                self.choices.clear();
                self.goals = None;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_goal, parse_program};

    fn store(source: &str) -> Arc<ClauseStore> {
        Arc::new(parse_program(source).unwrap().into_iter().collect())
    }

    fn solve(source: &str, goal: &str) -> Vec<Solution> {
        let goal = parse_goal(goal).unwrap();
        Solutions::new(store(source), &goal, &EngineConfig::default())
            .collect::<Result<Vec<_>>>()
            .unwrap()
    }

    fn values(solutions: &[Solution], var: &str) -> Vec<String> {
        solutions
            .iter()
            .map(|s| s.get(var).unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_backtracking_enumerates_in_store_order() {
        let solutions = solve("p(1). p(2). p(3).", "p(X)");
        assert_eq!(values(&solutions, "X"), vec!["1", "2", "3"]);
    }

    #[test]
    fn test_lazy_iteration_resumes() {
        let goal = parse_goal("p(X)").unwrap();
        let mut solutions = Solutions::new(store("p(a). p(b)."), &goal, &EngineConfig::default());
        let first = solutions.next().unwrap().unwrap();
        assert_eq!(first.get("X"), Some(&Term::atom("a")));
        let second = solutions.next().unwrap().unwrap();
        assert_eq!(second.get("X"), Some(&Term::atom("b")));
        assert!(solutions.next().is_none());
        assert!(solutions.next().is_none());
    }

    #[test]
    fn test_conjunction_joins_on_shared_variables() {
        let source = "
            rule(r1). rule(r2).
            has_target(r1, hadoop). has_target(r2, mail).
            has_property(hadoop, personal).
        ";
        let solutions = solve(source, "rule(R), has_target(R, S), has_property(S, P)");
        assert_eq!(solutions.len(), 1);
        assert_eq!(solutions[0].to_string(), "R = r1, S = hadoop, P = personal");
    }

    #[test]
    fn test_recursive_rules_rename_variables() {
        let source = "
            edge(a, b). edge(b, c). edge(c, d).
            path(X, Y) :- edge(X, Y).
            path(X, Z) :- edge(X, Y), path(Y, Z).
        ";
        let solutions = solve(source, "path(a, T)");
        assert_eq!(values(&solutions, "T"), vec!["b", "c", "d"]);
    }

    #[test]
    fn test_undefined_predicate_has_no_solutions() {
        assert!(solve("p(1).", "q(X)").is_empty());
        assert!(solve("p(1).", "p(X, Y)").is_empty());
    }

    #[test]
    fn test_rule_with_unsatisfiable_body() {
        assert!(solve("allowed(X) :- trusted(X), certified(X). trusted(a).", "allowed(Y)").is_empty());
    }

    #[test]
    fn test_cut_commits_to_first_clause() {
        let source = "
            first(X) :- p(X), !.
            p(1). p(2).
            classify(X, small) :- X < 10, !.
            classify(_, large).
        ";
        assert_eq!(values(&solve(source, "first(X)"), "X"), vec!["1"]);
        assert_eq!(values(&solve(source, "classify(3, C)"), "C"), vec!["small"]);
        assert_eq!(values(&solve(source, "classify(30, C)"), "C"), vec!["large"]);
    }

    #[test]
    fn test_cut_is_local_to_its_clause() {
        let source = "
            q(X) :- r(X).
            q(c).
            r(X) :- s(X), !.
            s(a). s(b).
        ";
        assert_eq!(values(&solve(source, "q(X)"), "X"), vec!["a", "c"]);
    }

    #[test]
    fn test_negation_as_failure() {
        let source = "
            service(hadoop). service(mail).
            blocked(mail).
            open(S) :- service(S), \\+ blocked(S).
        ";
        assert_eq!(values(&solve(source, "open(S)"), "S"), vec!["hadoop"]);
    }

    #[test]
    fn test_negation_does_not_bind() {
        let solutions = solve("p(a).", "\\+ \\+ p(X)");
        assert_eq!(solutions.len(), 1);
        assert!(matches!(solutions[0].get("X"), Some(Term::Var(_))));
    }

    #[test]
    fn test_disjunction() {
        let source = "label(public). label(secret). label(internal).";
        let solutions = solve(source, "label(L), (L = public ; L = internal)");
        assert_eq!(values(&solutions, "L"), vec!["public", "internal"]);
    }

    #[test]
    fn test_equality_builtins() {
        assert_eq!(solve("", "X = f(Y), Y = a").len(), 1);
        assert!(solve("", "a \\= a").is_empty());
        assert_eq!(solve("", "a \\= b").len(), 1);
        assert!(solve("", "X == Y").is_empty());
        assert_eq!(solve("", "X = Y, X == Y").len(), 1);
        assert_eq!(solve("", "f(a) \\== f(b)").len(), 1);
    }

    #[test]
    fn test_numeric_comparisons() {
        assert_eq!(solve("", "1 < 2, 2.5 >= 2, 3 =:= 3.0, 1 =\\= 2").len(), 1);
        assert!(solve("", "2 =< 1").is_empty());
    }

    #[test]
    fn test_comparison_type_errors() {
        let goal = parse_goal("a < 1").unwrap();
        let mut solutions = Solutions::new(store(""), &goal, &EngineConfig::default());
        assert!(matches!(solutions.next(), Some(Err(Error::Type { .. }))));
        assert!(solutions.next().is_none());

        let goal = parse_goal("X < 1").unwrap();
        let mut solutions = Solutions::new(store(""), &goal, &EngineConfig::default());
        assert!(matches!(solutions.next(), Some(Err(Error::Instantiation(_)))));
    }

    #[test]
    fn test_unbound_goal_is_an_error() {
        let goal = parse_goal("call_me(G) , G").unwrap();
        let mut solutions = Solutions::new(store("call_me(_)."), &goal, &EngineConfig::default());
        assert!(matches!(solutions.next(), Some(Err(Error::Instantiation(_)))));
    }

    #[test]
    fn test_variable_goal_is_called_once_bound() {
        let solutions = solve("p(1). p(2).", "G = p(X), G");
        assert_eq!(values(&solutions, "X"), vec!["1", "2"]);
    }

    #[test]
    fn test_inference_budget_stops_runaway_recursion() {
        let goal = parse_goal("loop").unwrap();
        let budget = QueryBudget::unlimited().with_max_inferences(500);
        let mut solutions = Solutions::with_budget(store("loop :- loop."), &goal, true, budget);
        match solutions.next() {
            Some(Err(Error::ResolutionLimit(Limit::Inferences(500)))) => {}
            other => panic!("expected inference limit, got {other:?}"),
        }
        assert!(solutions.next().is_none());
    }

    #[test]
    fn test_time_budget() {
        let goal = parse_goal("loop").unwrap();
        let budget = QueryBudget::unlimited().with_timeout(std::time::Duration::from_millis(10));
        let mut solutions = Solutions::with_budget(store("loop :- loop."), &goal, true, budget);
        assert!(matches!(
            solutions.next(),
            Some(Err(Error::ResolutionLimit(Limit::Time(_))))
        ));
    }

    #[test]
    fn test_occurs_check_setting() {
        let source = "same(X, X).";
        assert!(solve(source, "same(Y, f(Y))").is_empty());

        let goal = parse_goal("same(Y, f(Y))").unwrap();
        let unchecked = Solutions::with_budget(store(source), &goal, false, QueryBudget::default());
        assert_eq!(unchecked.count(), 1);
    }

    #[test]
    fn test_underscore_variables_not_reported() {
        let solutions = solve("p(a, b).", "p(_Ignored, Y)");
        assert_eq!(solutions.len(), 1);
        assert_eq!(solutions[0].len(), 1);
        assert_eq!(solutions[0].get("Y"), Some(&Term::atom("b")));
    }

    #[test]
    fn test_unbound_clause_variables_get_distinct_names() {
        let solutions = solve("pair(f(X, Y)).", "pair(P)");
        let Some(Term::Compound(_, args)) = solutions[0].get("P") else {
            panic!("expected a compound answer");
        };
        let (first, second) = (args[0].to_string(), args[1].to_string());
        assert_ne!(first, second);
        assert!(first.starts_with("_G") && second.starts_with("_G"), "{first} {second}");

        // query variables keep their own names
        let solutions = solve("twice(g(X), g(X)).", "twice(A, B)");
        assert_eq!(solutions[0].get("A"), solutions[0].get("B"));
        assert!(!solutions[0].to_string().contains('X'));
    }

    #[test]
    fn test_ground_goal_reports_true() {
        let solutions = solve("p(a).", "p(a)");
        assert_eq!(solutions.len(), 1);
        assert_eq!(solutions[0].to_string(), "true");
    }

    #[test]
    fn test_long_continuations() {
        // every level leaves a pending `true` behind the recursive call
        let mut nested = Term::atom("z");
        for _ in 0..2000 {
            nested = Term::compound("s", vec![nested]);
        }
        let goal = Goal::new(vec![Term::compound("nest", vec![nested])]);
        let source = "nest(z). nest(s(X)) :- nest(X), true.";
        let solutions = Solutions::new(store(source), &goal, &EngineConfig::default());
        assert_eq!(solutions.count(), 1);
    }

    #[test]
    fn test_goal_new_renumbers_variables() {
        let goal = Goal::new(vec![Term::compound(
            "p",
            vec![Term::named_var(77, "X"), Term::named_var(12, "Y"), Term::named_var(77, "X")],
        )]);
        assert_eq!(goal.to_string(), "p(X, Y, X).");
        let solutions: Vec<_> = Solutions::new(store("p(a, b, a)."), &goal, &EngineConfig::default())
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(solutions.len(), 1);
    }
}
