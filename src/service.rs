//! Tokio front end for the decision point.
//!
//! Resolution is CPU bound, so every decision and listing runs on the
//! blocking pool instead of an async worker thread.

use log::error;
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinError;

use crate::error::Result;
use crate::pdp::{Decision, DecisionRequest, PolicyDecision, PolicyDecisionPoint};

/// Cloneable async handle around a shared [`PolicyDecisionPoint`]
#[derive(Debug, Clone, Default)]
pub struct AsyncPolicyDecisionPoint {
    inner: Arc<PolicyDecisionPoint>,
}

fn join_failed(e: &JoinError) -> io::Error {
    io::Error::new(io::ErrorKind::Other, format!("spawn_blocking failed: {e}"))
}

impl AsyncPolicyDecisionPoint {
    /// Wraps a decision point
    #[must_use]
    pub fn new(pdp: PolicyDecisionPoint) -> Self {
        Self {
            inner: Arc::new(pdp),
        }
    }

    /// The shared decision point
    #[must_use]
    pub fn inner(&self) -> &Arc<PolicyDecisionPoint> {
        &self.inner
    }

    /// Decides a flow on the blocking pool. A decision task that panics is
    /// reported as DENY.
    pub async fn request_decision(&self, request: DecisionRequest) -> PolicyDecision {
        let pdp = Arc::clone(&self.inner);
        match tokio::task::spawn_blocking(move || pdp.request_decision(&request)).await {
            Ok(decision) => decision,
            Err(e) => {
                error!("Decision task failed: {e}");
                PolicyDecision {
                    decision: Decision::Deny,
                    obligation: None,
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Reads a whole policy from `reader` and loads it
    ///
    /// # Errors
    ///
    /// I/O, encoding and syntax errors; the previous policy stays in effect.
    pub async fn load_policy_from<R>(&self, mut reader: R) -> Result<usize>
    where
        R: AsyncRead + Unpin,
    {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).await?;
        let pdp = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || pdp.load_policy_reader(bytes.as_slice()))
            .await
            .map_err(|e| join_failed(&e))?
    }

    /// Lists rule identifiers on the blocking pool
    ///
    /// # Errors
    ///
    /// Fails if listing runs past the query budget.
    pub async fn list_rules(&self) -> Result<Vec<String>> {
        let pdp = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || pdp.list_rules())
            .await
            .map_err(|e| join_failed(&e))?
    }

    /// The current policy as loadable text
    #[must_use]
    pub fn get_policy(&self) -> String {
        self.inner.get_policy()
    }
}

impl From<PolicyDecisionPoint> for AsyncPolicyDecisionPoint {
    fn from(pdp: PolicyDecisionPoint) -> Self {
        Self::new(pdp)
    }
}
