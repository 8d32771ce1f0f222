//! Policy decision point: maps data flow requests onto the logic engine.
//!
//! A request asks whether data carrying some labels may flow from one
//! service to another. The decision goal looks for a rule that targets the
//! receiving service, whose declared property is one of the labels, and
//! reads the obligation that rule imposes:
//!
//! ```text
//! rule(R), has_target(R, to), has_property(to, Prop), (Prop = l1 ; ...),
//! has_obligation(R, Obl), requires_action(Obl, Act).
//! ```
//!
//! No solution falls back to [`PdpConfig::no_match`] (ALLOW unless
//! configured otherwise). A solution allows the flow with the obligation
//! bound in the first solution. Any error while resolving denies it.

use log::{debug, error, log_enabled, warn, Level};
use std::fmt;
use std::io::Read;
use std::time::Instant;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::config::PdpConfig;
use crate::engine::LogicEngine;
use crate::error::Result;
use crate::solve::Goal;
use crate::term::Term;

const RULE: &str = "R";
const SERVICE_PROPERTY: &str = "Prop";
const OBLIGATION: &str = "Obl";
const ACTION: &str = "Act";

/// Outcome of a decision request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "UPPERCASE"))]
pub enum Decision {
    /// The flow may proceed
    Allow,
    /// The flow must be blocked
    Deny,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Allow => f.write_str("ALLOW"),
            Decision::Deny => f.write_str("DENY"),
        }
    }
}

/// A proposed data flow between two services
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DecisionRequest {
    /// Sending service
    pub from: String,
    /// Receiving service
    pub to: String,
    /// Labels attached to the data, in request order
    pub labels: Vec<String>,
}

impl DecisionRequest {
    /// Builds a request
    pub fn new<I, S>(from: impl Into<String>, to: impl Into<String>, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            from: from.into(),
            to: to.into(),
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    /// The decision goal for this request
    #[must_use]
    pub fn goal(&self) -> Goal {
        let rule = Term::named_var(0, RULE);
        let property = Term::named_var(1, SERVICE_PROPERTY);
        let obligation = Term::named_var(2, OBLIGATION);
        let action = Term::named_var(3, ACTION);
        let service = Term::atom(self.to.as_str());

        let mut goals = vec![
            Term::compound("rule", vec![rule.clone()]),
            Term::compound("has_target", vec![rule.clone(), service.clone()]),
            Term::compound("has_property", vec![service, property.clone()]),
        ];
        goals.push(
            self.labels
                .iter()
                .rev()
                .map(|label| Term::compound("=", vec![property.clone(), Term::atom(label.as_str())]))
                .reduce(|rest, choice| Term::compound(";", vec![choice, rest]))
                .unwrap_or_else(|| Term::atom("fail")),
        );
        goals.push(Term::compound("has_obligation", vec![rule, obligation.clone()]));
        goals.push(Term::compound("requires_action", vec![obligation, action]));
        Goal::new(goals)
    }
}

/// Answer to a decision request
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PolicyDecision {
    /// Allow or deny
    pub decision: Decision,
    /// Obligation term, rendered as policy text
    pub obligation: Option<String>,
    /// Why the decision was taken
    pub reason: String,
}

impl PolicyDecision {
    fn new(decision: Decision, reason: impl Into<String>) -> Self {
        Self {
            decision,
            obligation: None,
            reason: reason.into(),
        }
    }
}

/// Decides data flows against a loaded policy.
///
/// Decisions never fail: errors while resolving are folded into
/// [`Decision::Deny`] with the error as reason. Loading and listing
/// surface their errors to the caller.
#[derive(Debug, Default)]
pub struct PolicyDecisionPoint {
    engine: LogicEngine,
    config: PdpConfig,
}

impl PolicyDecisionPoint {
    /// A decision point with an empty policy and default settings
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A decision point with an empty policy
    #[must_use]
    pub fn with_config(config: PdpConfig) -> Self {
        Self {
            engine: LogicEngine::with_config(config.engine),
            config,
        }
    }

    /// The engine holding the policy
    #[must_use]
    pub fn engine(&self) -> &LogicEngine {
        &self.engine
    }

    /// Decision point settings
    #[must_use]
    pub fn config(&self) -> &PdpConfig {
        &self.config
    }

    /// Decides whether a flow may proceed
    pub fn request_decision(&self, request: &DecisionRequest) -> PolicyDecision {
        debug!(
            "Decision requested {} -> {} : {}",
            request.from,
            request.to,
            request.labels.join(", ")
        );
        let goal = request.goal();
        let started = Instant::now();
        let outcome = self
            .engine
            .query_goal(&goal, false, &self.config.engine.budget);
        debug!("Policy decision took {:?}", started.elapsed());

        let solutions = match outcome {
            Ok(solutions) => solutions,
            Err(e) => {
                error!("Denying {} -> {}: {e}", request.from, request.to);
                return PolicyDecision::new(Decision::Deny, e.to_string());
            }
        };

        let Some(first) = solutions.first() else {
            warn!(
                "No rule matches {} -> {}, falling back to {}",
                request.from, request.to, self.config.no_match
            );
            return PolicyDecision::new(self.config.no_match, "no rule matches the flow");
        };

        if log_enabled!(Level::Debug) {
            for (name, value) in first.iter() {
                debug!(
                    "{name}: {value} bound: {}",
                    !matches!(value, Term::Var(_))
                );
            }
        }

        let reason = match first.bound(RULE) {
            Some(rule) => format!("matched rule {rule}"),
            None => "matched a rule".to_string(),
        };
        PolicyDecision {
            decision: Decision::Allow,
            obligation: first.bound(OBLIGATION).map(ToString::to_string),
            reason,
        }
    }

    /// Replaces the policy with `text`
    ///
    /// # Errors
    ///
    /// Returns a syntax error locating the first bad clause; the previous
    /// policy stays in effect.
    pub fn load_policy(&self, text: &str) -> Result<usize> {
        self.engine.load_policy(text)
    }

    /// Replaces the policy with the contents of a byte stream
    ///
    /// # Errors
    ///
    /// I/O, encoding and syntax errors; the previous policy stays in effect.
    pub fn load_policy_reader<R: Read>(&self, reader: R) -> Result<usize> {
        self.engine.load_policy_reader(reader)
    }

    /// Every rule identifier, i.e. each `X` with `rule(X)`, in policy order
    ///
    /// # Errors
    ///
    /// Fails if listing runs past the engine's query budget.
    pub fn list_rules(&self) -> Result<Vec<String>> {
        let goal = Goal::new(vec![Term::compound("rule", vec![Term::named_var(0, "X")])]);
        let solutions = self
            .engine
            .query_goal(&goal, true, &self.config.engine.budget)
            .map_err(|e| {
                error!("Error while retrieving rules: {e}");
                e
            })?;
        Ok(solutions
            .iter()
            .filter_map(|solution| solution.get("X"))
            .map(ToString::to_string)
            .collect())
    }

    /// The current policy as loadable text
    #[must_use]
    pub fn get_policy(&self) -> String {
        self.engine.theory()
    }

    /// Drops cached decisions. Decisions are not cached, so there is nothing
    /// to drop.
    pub fn clear_all_caches(&self) {}
}
