use bstr::ByteSlice;
use log::{debug, error, info};
use std::io::Read;
use std::sync::Arc;
use std::time::Instant;

use crate::config::{EngineConfig, QueryBudget};
use crate::error::{Error, Limit, Result};
use crate::parser::{parse_goal, parse_program};
use crate::solve::{Goal, Solution, Solutions};
use crate::store::{ClauseStore, SharedStore};

/// The logic engine: a published clause store plus the query executor.
///
/// Queries run against a snapshot of the store taken when they start, so
/// they never block on, or observe half of, a concurrent policy load. The
/// engine is `Sync` and meant to be shared (e.g. behind an `Arc`) between
/// threads answering requests.
#[derive(Debug, Default)]
pub struct LogicEngine {
    store: SharedStore,
    config: EngineConfig,
}

impl LogicEngine {
    /// Create an engine with an empty store and default settings
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine with an empty store
    #[must_use]
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            store: SharedStore::new(),
            config,
        }
    }

    /// Engine settings
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Parses a policy program and, if it is well formed, replaces the
    /// current store with it. Returns the number of clauses loaded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PolicySyntax`] with the location of the first bad
    /// clause; the previous policy stays in effect.
    pub fn load_policy(&self, text: &str) -> Result<usize> {
        let started = Instant::now();
        let clauses = parse_program(text).map_err(|e| {
            error!("Rejected policy: {e}");
            Error::PolicySyntax(e)
        })?;
        let store: ClauseStore = clauses.into_iter().collect();
        let count = store.len();
        let (_, generation) = self.store.replace(store);
        info!(
            "Loaded policy with {count} clauses in {:?} (generation {generation})",
            started.elapsed()
        );
        Ok(count)
    }

    /// Reads a policy from a byte stream and loads it like
    /// [`load_policy`](Self::load_policy).
    ///
    /// # Errors
    ///
    /// Fails on I/O errors, on bytes that are not UTF-8 and on syntax errors.
    /// In every case the previous policy stays in effect.
    pub fn load_policy_reader<R: Read>(&self, mut reader: R) -> Result<usize> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        let text = bytes.to_str().map_err(|e| {
            error!("Policy is not valid UTF-8 after byte {}", e.valid_up_to());
            Error::Encoding {
                offset: e.valid_up_to(),
            }
        })?;
        self.load_policy(text)
    }

    /// Publishes an already built store, returning the one it replaces
    pub fn install(&self, store: ClauseStore) -> Arc<ClauseStore> {
        self.store.replace(store).0
    }

    /// The store queries started now would run against
    #[must_use]
    pub fn snapshot(&self) -> Arc<ClauseStore> {
        self.store.snapshot()
    }

    /// Number of clauses in the current store
    #[must_use]
    pub fn clause_count(&self) -> usize {
        self.store.snapshot().len()
    }

    /// Number of stores published since the engine was created
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.store.generation()
    }

    /// The current policy as text that [`load_policy`](Self::load_policy)
    /// accepts
    #[must_use]
    pub fn theory(&self) -> String {
        self.store.snapshot().serialize()
    }

    /// Lazily enumerates the solutions of `goal` with the engine's default
    /// budget
    #[must_use]
    pub fn solve(&self, goal: &Goal) -> Solutions {
        Solutions::new(self.snapshot(), goal, &self.config)
    }

    /// Runs a goal given as text. With `all_solutions` the search is run to
    /// exhaustion, otherwise it stops after the first solution. An empty
    /// vector means the goal has no solution.
    ///
    /// # Errors
    ///
    /// [`Error::GoalSyntax`] for malformed goal text, plus everything
    /// [`query_goal`](Self::query_goal) can return.
    pub fn query(&self, goal_text: &str, all_solutions: bool) -> Result<Vec<Solution>> {
        self.query_with_budget(goal_text, all_solutions, &self.config.budget)
    }

    /// Like [`query`](Self::query) with a caller-imposed budget
    ///
    /// # Errors
    ///
    /// [`Error::GoalSyntax`] for malformed goal text, plus everything
    /// [`query_goal`](Self::query_goal) can return.
    pub fn query_with_budget(
        &self,
        goal_text: &str,
        all_solutions: bool,
        budget: &QueryBudget,
    ) -> Result<Vec<Solution>> {
        let goal = parse_goal(goal_text).map_err(Error::GoalSyntax)?;
        self.query_goal(&goal, all_solutions, budget)
    }

    /// Runs a parsed goal to its first solution or to exhaustion.
    ///
    /// # Errors
    ///
    /// [`Error::ResolutionLimit`] when the budget runs out (including more
    /// solutions than `budget.max_solutions`), and the instantiation and
    /// type errors raised by builtins.
    pub fn query_goal(
        &self,
        goal: &Goal,
        all_solutions: bool,
        budget: &QueryBudget,
    ) -> Result<Vec<Solution>> {
        let mut solutions =
            Solutions::with_budget(self.snapshot(), goal, self.config.occurs_check, *budget);

        if !all_solutions {
            return solutions.next().transpose().map(|first| first.into_iter().collect());
        }

        let mut collected = Vec::new();
        for solution in solutions.by_ref() {
            let solution = solution?;
            if let Some(max) = budget.max_solutions {
                if collected.len() == max {
                    return Err(Error::ResolutionLimit(Limit::Solutions(max)));
                }
            }
            collected.push(solution);
        }
        debug!(
            "{goal} has {} solutions ({} inferences)",
            collected.len(),
            solutions.inferences()
        );
        Ok(collected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::Term;

    fn engine(source: &str) -> LogicEngine {
        let engine = LogicEngine::new();
        engine.load_policy(source).unwrap();
        engine
    }

    fn column(solutions: &[Solution], var: &str) -> Vec<String> {
        solutions
            .iter()
            .map(|s| s.get(var).unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_transitive_closure_with_path_rules() {
        let engine = engine(
            "edge(a, b). edge(b, c).
             path(X, Y) :- edge(X, Y).
             path(X, Z) :- edge(X, Y), path(Y, Z).",
        );

        let mut pairs: Vec<String> = engine
            .query("path(X, Y)", true)
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect();
        pairs.sort();

        assert_eq!(
            pairs,
            vec!["X = a, Y = b", "X = a, Y = c", "X = b, Y = c"],
            "Should have exactly 3 path facts"
        );
    }

    #[test]
    fn test_empty_engine_returns_no_solutions() {
        let engine = LogicEngine::new();
        assert!(engine.query("anything(X)", true).unwrap().is_empty());
        assert_eq!(engine.clause_count(), 0);
        assert_eq!(engine.theory(), "");
    }

    #[test]
    fn test_first_solution_only() {
        let engine = engine("p(1). p(2). p(3).");
        let first = engine.query("p(X).", false).unwrap();
        assert_eq!(column(&first, "X"), vec!["1"]);
        let all = engine.query("p(X).", true).unwrap();
        assert_eq!(column(&all, "X"), vec!["1", "2", "3"]);
    }

    #[test]
    fn test_query_with_constants_only() {
        let engine = engine("edge(a, b).");
        assert_eq!(engine.query("edge(a, b)", true).unwrap().len(), 1);
        assert!(engine.query("edge(b, a)", true).unwrap().is_empty());
    }

    #[test]
    fn test_repeated_variable_unification() {
        let engine = engine("edge(a, a). edge(a, b). edge(c, c).");
        let loops = engine.query("edge(X, X)", true).unwrap();
        assert_eq!(column(&loops, "X"), vec!["a", "c"]);
    }

    #[test]
    fn test_malformed_goal_is_an_error() {
        let engine = engine("p(1).");
        match engine.query("p(X", true) {
            Err(Error::GoalSyntax(e)) => assert_eq!(e.line, 1),
            other => panic!("expected a goal syntax error, got {other:?}"),
        }
    }

    #[test]
    fn test_failed_load_keeps_previous_store() {
        let engine = engine("rule(r1). rule(r2).");
        assert_eq!(engine.generation(), 1);

        let err = engine.load_policy("rule(r3).\nrule(r4").unwrap_err();
        assert!(matches!(err, Error::PolicySyntax(ref e) if e.line == 2));
        assert_eq!(engine.clause_count(), 2);
        assert_eq!(engine.generation(), 1);
        assert_eq!(column(&engine.query("rule(X)", true).unwrap(), "X"), vec!["r1", "r2"]);
    }

    #[test]
    fn test_load_replaces_wholesale() {
        let engine = engine("rule(r1).");
        engine.load_policy("rule(r2). rule(r3).").unwrap();
        assert_eq!(column(&engine.query("rule(X)", true).unwrap(), "X"), vec!["r2", "r3"]);
        assert_eq!(engine.generation(), 2);
    }

    #[test]
    fn test_snapshot_outlives_load() {
        let engine = engine("p(1). p(2).");
        let goal = parse_goal("p(X)").unwrap();
        let mut running = engine.solve(&goal);
        assert_eq!(running.next().unwrap().unwrap().get("X"), Some(&Term::int(1)));

        engine.load_policy("p(10).").unwrap();
        // the query started before the load keeps its store
        assert_eq!(running.next().unwrap().unwrap().get("X"), Some(&Term::int(2)));
        assert!(running.next().is_none());
        assert_eq!(column(&engine.query("p(X)", true).unwrap(), "X"), vec!["10"]);
    }

    #[test]
    fn test_solution_budget_is_reported() {
        let engine = engine("p(1). p(2). p(3).");
        let budget = QueryBudget::default().with_max_solutions(2);
        match engine.query_with_budget("p(X)", true, &budget) {
            Err(Error::ResolutionLimit(Limit::Solutions(2))) => {}
            other => panic!("expected solution limit, got {other:?}"),
        }
        // exactly at the limit is fine
        let budget = QueryBudget::default().with_max_solutions(3);
        assert_eq!(engine.query_with_budget("p(X)", true, &budget).unwrap().len(), 3);
        // first-solution queries never hit it
        let budget = QueryBudget::default().with_max_solutions(0);
        assert_eq!(engine.query_with_budget("p(X)", false, &budget).unwrap().len(), 1);
    }

    #[test]
    fn test_runaway_query_reports_limit() {
        let engine = LogicEngine::with_config(EngineConfig {
            budget: QueryBudget::unlimited().with_max_inferences(10_000),
            ..EngineConfig::default()
        });
        engine.load_policy("nat(0). nat(s(X)) :- nat(X).").unwrap();
        assert!(matches!(
            engine.query("nat(X)", true),
            Err(Error::ResolutionLimit(Limit::Inferences(10_000)))
        ));
        // first solution is still cheap
        assert_eq!(engine.query("nat(X)", false).unwrap().len(), 1);
    }

    #[test]
    fn test_load_from_reader() {
        let engine = LogicEngine::new();
        let count = engine
            .load_policy_reader("rule(r1).\nrule(r2).\n".as_bytes())
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_load_from_reader_rejects_invalid_utf8() {
        let engine = engine("rule(r1).");
        let bytes: &[u8] = b"rule(r2).\nrule(\xff).";
        match engine.load_policy_reader(bytes) {
            Err(Error::Encoding { offset }) => assert_eq!(offset, 15),
            other => panic!("expected an encoding error, got {other:?}"),
        }
        assert_eq!(engine.clause_count(), 1);
    }

    #[test]
    fn test_theory_round_trips() {
        let source = "
            % flow rules
            rule(deny_hadoop).
            has_target(deny_hadoop, 'Hadoop Cluster').
            has_obligation(deny_hadoop, act(log)).
            labels(R, [personal, 'PII' | _]) :- rule(R), \\+ exempt(R).
            check(X) :- X >= 0.5 ; X = none.
        ";
        let engine = engine(source);
        let text = engine.theory();

        let reloaded = LogicEngine::new();
        reloaded.load_policy(&text).unwrap();
        assert_eq!(reloaded.theory(), text);

        let original = engine.snapshot();
        let copy = reloaded.snapshot();
        assert_eq!(original.len(), copy.len());
        for (a, b) in original.clauses().zip(copy.clauses()) {
            assert!(a.is_variant(b), "{a} vs {b}");
        }
    }

    fn assert_reloads(source: &str) {
        let engine = engine(source);
        let text = engine.theory();
        let reloaded = LogicEngine::new();
        reloaded
            .load_policy(&text)
            .unwrap_or_else(|e| panic!("{text:?} does not reload: {e}"));
        let (original, copy) = (engine.snapshot(), reloaded.snapshot());
        assert_eq!(original.len(), copy.len());
        for (a, b) in original.clauses().zip(copy.clauses()) {
            assert!(a.is_variant(b), "{a} vs {b}");
        }
    }

    #[test]
    fn test_float_overflow_cannot_enter_the_store() {
        let engine = engine("p(1.0).");
        assert!(matches!(
            engine.load_policy("p(1e999)."),
            Err(Error::PolicySyntax(ref e)) if e.message.contains("a number in range")
        ));
        assert_eq!(engine.theory(), "p(1.0).\n");

        assert_reloads("p(1e300, -1e300, 5e-324, -0.0, 1e-7).");
    }

    #[test]
    fn test_operator_heads_round_trip() {
        assert_reloads("'\\\\+'(a).");
        assert_reloads("\\+ blocked(X) :- open(X).");
        assert_reloads("','(a, b). ';'(a, b) :- c. '='(x, y).");
        assert_reloads("p(\\+ a, (a, b), (a ; b), ','(a), '\\\\+'(a, b)).");
        assert_eq!(engine("'\\\\+'(a).").theory(), "\\+ a.\n");
    }

    #[test]
    fn test_install_prebuilt_store() {
        let engine = LogicEngine::new();
        let store: ClauseStore = parse_program("p(a).").unwrap().into_iter().collect();
        let previous = engine.install(store);
        assert!(previous.is_empty());
        assert_eq!(engine.query("p(X)", true).unwrap().len(), 1);
    }

    mod proptests {
        use super::*;
        use crate::store::Clause;
        use crate::term::Number;
        use proptest::prelude::*;

        fn arb_leaf() -> impl Strategy<Value = Term> {
            prop_oneof![
                prop::sample::select(vec![
                    "a", "log", "Hadoop Cluster", "it's", "[]", "x\\y", "", "\\+", ",", ";",
                ])
                .prop_map(Term::atom),
                (-5i64..5).prop_map(Term::int),
                prop::sample::select(vec![i64::MIN, i64::MAX]).prop_map(Term::int),
                prop::sample::select(vec![
                    0.5,
                    2.0,
                    -3.25,
                    -0.0,
                    1e-7,
                    1e300,
                    -1e300,
                    f64::MAX,
                    f64::MIN_POSITIVE,
                    5e-324,
                ])
                .prop_map(|f| Term::Number(Number::Float(f))),
                prop::sample::select(vec![(0u64, "X"), (1, "Y"), (2, "Z")])
                    .prop_map(|(id, name)| Term::named_var(id, name)),
            ]
        }

        fn arb_term() -> impl Strategy<Value = Term> {
            arb_leaf().prop_recursive(3, 24, 3, |inner| {
                prop_oneof![
                    (
                        prop::sample::select(vec!["f", "act", "Odd Name", "=", "<", "\\+", ",", ";"]),
                        prop::collection::vec(inner.clone(), 1..3),
                    )
                        .prop_map(|(functor, args)| Term::compound(functor, args)),
                    (prop::collection::vec(inner.clone(), 0..3), inner)
                        .prop_map(|(items, tail)| Term::list(items, tail)),
                ]
            })
        }

        fn arb_callable(names: Vec<&'static str>) -> impl Strategy<Value = Term> {
            (
                prop::sample::select(names),
                prop::collection::vec(arb_term(), 0..3),
            )
                .prop_map(|(name, args)| Term::compound(name, args))
        }

        // a top-level `,` goal would be split into two by the reader
        fn arb_clause() -> impl Strategy<Value = Clause> {
            (
                arb_callable(vec!["rule", "has_target", "Quoted Pred", "\\+", ",", ";"]),
                prop::collection::vec(arb_callable(vec!["rule", "Quoted Pred", "\\+", ";"]), 0..3),
            )
                .prop_map(|(head, body)| Clause::new(head, body, 3))
        }

        proptest! {
            #[test]
            fn serialize_then_load_is_clause_equivalent(
                clauses in prop::collection::vec(arb_clause(), 0..6)
            ) {
                let store: ClauseStore = clauses.into_iter().collect();
                let text = store.serialize();

                let engine = LogicEngine::new();
                engine.load_policy(&text).unwrap();
                let loaded = engine.snapshot();

                prop_assert_eq!(loaded.len(), store.len());
                for (a, b) in store.clauses().zip(loaded.clauses()) {
                    prop_assert!(a.is_variant(b), "{} vs {}", a, b);
                }
                prop_assert_eq!(loaded.serialize(), text);
            }

            #[test]
            fn all_solutions_follow_store_order(values in prop::collection::vec(-100i64..100, 0..20)) {
                let source: String = values.iter().map(|v| format!("p({v}).\n")).collect();
                let engine = engine(&source);
                let found: Vec<Term> = engine
                    .query("p(X)", true)
                    .unwrap()
                    .into_iter()
                    .map(|s| s.get("X").unwrap().clone())
                    .collect();
                let expected: Vec<Term> = values.into_iter().map(Term::int).collect();
                prop_assert_eq!(found, expected);
            }
        }
    }
}
