//! Conditional routing: branch targets, routing functions, and bounded
//! self-retry policies.
//!
//! Two independent patterns route through the same mechanism:
//!
//! - **Fallback** — a branch whose routing function inspects the node's own
//!   result for an error/empty marker and picks one of two successors.
//!   Evaluated once, no counter.
//! - **Bounded self-retry** — a branch that may name its own node as a
//!   candidate, paired with a [`RetryPolicy`]. The engine counts executions
//!   per node per invocation and forces the policy's exhausted target once
//!   the cap is reached, so a routing function that always says "retry" can
//!   never loop forever.

use crate::error::{GraphError, Result};
use crate::events::{emit, Event, EventHandler};
use crate::state::State;
use std::collections::HashMap;
use std::sync::Arc;

/// The terminal sentinel name. Routing functions and edges that use the
/// string form resolve this to [`Target::End`].
pub const END: &str = "__end__";

/// A transition target: either a named node or the terminal sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    /// Transition to the named node.
    Node(String),
    /// The invocation is complete.
    End,
}

impl Target {
    /// A node target by name.
    pub fn node(name: impl Into<String>) -> Self {
        Target::Node(name.into())
    }

    /// Whether this is the terminal sentinel.
    pub fn is_end(&self) -> bool {
        matches!(self, Target::End)
    }

    /// The node name, or [`END`] for the sentinel.
    pub fn as_str(&self) -> &str {
        match self {
            Target::Node(name) => name,
            Target::End => END,
        }
    }
}

impl From<&str> for Target {
    fn from(s: &str) -> Self {
        if s == END {
            Target::End
        } else {
            Target::Node(s.to_string())
        }
    }
}

impl From<String> for Target {
    fn from(s: String) -> Self {
        Target::from(s.as_str())
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A routing function: a pure function from accumulated state to the next
/// target. Must return one of the branch's declared candidates.
pub type RouterFn = Arc<dyn Fn(&State) -> Target + Send + Sync>;

/// Cap on bounded self-retry, with the transition the engine forces once
/// the cap is reached.
///
/// The cap is enforced by the engine, not left to routing-function
/// discipline: once a node has executed `max_attempts` times in one
/// invocation, a self-choice is overridden with the `exhausted` target.
///
/// # Example
///
/// ```
/// use agent_graph::router::RetryPolicy;
///
/// // Up to 3 executions, then force a transition to "give_up".
/// let policy = RetryPolicy::new(3, "give_up");
/// assert_eq!(policy.max_attempts, 3);
/// ```
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum executions of the node per invocation (including the first).
    pub max_attempts: u32,
    /// Where the engine routes once the cap is reached.
    pub exhausted: Target,
}

impl RetryPolicy {
    /// Allow up to `max_attempts` executions, then force `exhausted`.
    pub fn new(max_attempts: u32, exhausted: impl Into<Target>) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            exhausted: exhausted.into(),
        }
    }
}

/// A conditional edge: routing function plus its declared candidate set,
/// optionally with a retry policy when the candidates include the source
/// node itself.
pub struct Branch {
    pub(crate) router: RouterFn,
    pub(crate) candidates: Vec<Target>,
    pub(crate) retry: Option<RetryPolicy>,
}

impl Branch {
    pub(crate) fn new(router: RouterFn, candidates: Vec<Target>, retry: Option<RetryPolicy>) -> Self {
        Self {
            router,
            candidates,
            retry,
        }
    }

    /// Resolve this branch for `node`, given the accumulated state and the
    /// per-invocation execution counts.
    ///
    /// `executions[node]` is the number of times `node` has already run in
    /// this invocation (at least 1 when a branch is being resolved).
    pub(crate) fn resolve(
        &self,
        node: &str,
        state: &State,
        executions: &HashMap<String, u32>,
        events: &Option<Arc<dyn EventHandler>>,
    ) -> Result<Target> {
        let chosen = (self.router)(state);

        if !self.candidates.contains(&chosen) {
            return Err(GraphError::UndeclaredOutcome {
                node: node.to_string(),
                target: chosen.as_str().to_string(),
            });
        }

        let is_self = matches!(&chosen, Target::Node(name) if name == node);
        if !is_self {
            return Ok(chosen);
        }

        let policy = match &self.retry {
            Some(p) => p,
            // A self-edge without a policy is rejected at compile time.
            None => return Ok(chosen),
        };

        let attempts = executions.get(node).copied().unwrap_or(0);
        if attempts >= policy.max_attempts {
            tracing::warn!(
                node,
                attempts,
                max = policy.max_attempts,
                to = %policy.exhausted,
                "retry cap reached, forcing transition away from node"
            );
            emit(
                events,
                Event::RetryExhausted {
                    node: node.to_string(),
                    attempts,
                    to: policy.exhausted.clone(),
                },
            );
            return Ok(policy.exhausted.clone());
        }

        emit(
            events,
            Event::Retry {
                node: node.to_string(),
                attempt: attempts + 1,
            },
        );
        Ok(chosen)
    }
}

impl std::fmt::Debug for Branch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Branch")
            .field("candidates", &self.candidates)
            .field("retry", &self.retry)
            .finish()
    }
}
