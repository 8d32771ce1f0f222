//! # Policylog
//!
//! A logic-rule policy decision point: data flow requests are decided by
//! SLD resolution over a policy written as facts and rules.
//!
//! ## Features
//!
//! - Terms, unification with occurs check and a backtracking resolver
//! - Cut, negation as failure, disjunction and term comparison builtins
//! - Copy-on-write policy store: loads never disturb running queries
//! - Query budgets (solutions, inferences, wall clock)
//! - ALLOW/DENY decisions with obligations
//!
//! ## Example
//!
//! ```rust
//! use policylog::{Decision, DecisionRequest, PolicyDecisionPoint};
//!
//! let pdp = PolicyDecisionPoint::new();
//! pdp.load_policy(
//!     "rule(r1).
//!      has_target(r1, hadoop).
//!      has_property(hadoop, personal).
//!      has_obligation(r1, act(log)).
//!      requires_action(act(log), log).",
//! )?;
//!
//! let decision = pdp.request_decision(&DecisionRequest::new("camel", "hadoop", ["personal"]));
//! assert_eq!(decision.decision, Decision::Allow);
//! assert_eq!(decision.obligation.as_deref(), Some("act(log)"));
//! # Ok::<(), policylog::Error>(())
//! ```

/// Engine and decision point settings.
pub mod config;
/// Query executor, policy loader and serializer.
pub mod engine;
/// Error types.
pub mod error;
/// Policy and goal text parser.
pub mod parser;
/// Decision mapping.
pub mod pdp;
/// Resolution engine.
pub mod solve;
/// Clause storage.
pub mod store;
/// Term model.
pub mod term;
/// Unification.
pub mod unify;

/// Async front end.
#[cfg(feature = "async")]
pub mod service;

pub use config::{EngineConfig, PdpConfig, QueryBudget};
pub use engine::LogicEngine;
pub use error::{Error, Limit, Result};
pub use parser::{parse_goal, parse_program, ParseError};
pub use pdp::{Decision, DecisionRequest, PolicyDecision, PolicyDecisionPoint};
pub use solve::{Goal, Solution, Solutions};
pub use store::{Clause, ClauseStore, PredicateKey, SharedStore};
pub use term::{Number, Term, Var, VarId};
pub use unify::{mgu, unify, Bindings};

#[cfg(feature = "async")]
pub use service::AsyncPolicyDecisionPoint;
