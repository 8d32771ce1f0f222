//! Engine and decision point settings.

use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::pdp::Decision;

/// Default cap on resolution steps per query
pub const DEFAULT_MAX_INFERENCES: u64 = 1_000_000;

/// Limits applied to a single query. Exceeding any of them is reported as
/// [`Error::ResolutionLimit`](crate::Error::ResolutionLimit), never as a
/// silently shortened answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct QueryBudget {
    /// Largest number of solutions an all-solutions query may return
    pub max_solutions: Option<usize>,
    /// Largest number of resolution steps
    pub max_inferences: Option<u64>,
    /// Wall-clock limit
    pub timeout: Option<Duration>,
}

impl Default for QueryBudget {
    fn default() -> Self {
        Self {
            max_solutions: None,
            max_inferences: Some(DEFAULT_MAX_INFERENCES),
            timeout: None,
        }
    }
}

impl QueryBudget {
    /// No limits at all
    #[must_use]
    pub fn unlimited() -> Self {
        Self {
            max_solutions: None,
            max_inferences: None,
            timeout: None,
        }
    }

    /// Sets the solution cap
    #[must_use]
    pub fn with_max_solutions(mut self, max: usize) -> Self {
        self.max_solutions = Some(max);
        self
    }

    /// Sets the inference cap
    #[must_use]
    pub fn with_max_inferences(mut self, max: u64) -> Self {
        self.max_inferences = Some(max);
        self
    }

    /// Sets the wall-clock limit
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Settings of a [`LogicEngine`](crate::LogicEngine)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    /// Reject bindings that would make a term contain itself. Turning this
    /// off is faster but lets cyclic terms through.
    pub occurs_check: bool,
    /// Default budget for queries that do not bring their own
    pub budget: QueryBudget,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            occurs_check: true,
            budget: QueryBudget::default(),
        }
    }
}

/// Settings of a [`PolicyDecisionPoint`](crate::PolicyDecisionPoint)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PdpConfig {
    /// Engine settings
    pub engine: EngineConfig,
    /// Decision when no rule matches a flow. Defaults to `Allow`
    /// (fail-open); set to `Deny` for a fail-closed deployment.
    pub no_match: Decision,
}

impl Default for PdpConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            no_match: Decision::Allow,
        }
    }
}

#[cfg(feature = "serde")]
impl EngineConfig {
    /// Reads engine settings from JSON; missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) for malformed JSON.
    pub fn from_json(text: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(feature = "serde")]
impl PdpConfig {
    /// Reads decision point settings from JSON; missing fields take their
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) for malformed JSON.
    pub fn from_json(text: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
