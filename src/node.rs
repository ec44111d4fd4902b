//! Node handler trait.
//!
//! A node is one unit of graph work: an asynchronous handler taking the
//! accumulated state and returning a partial state (the keys it writes).
//! The trait is object-safe so handlers can be stored as `Box<dyn NodeHandler>`
//! inside a compiled graph without generic constraints.

use crate::ctx::GraphCtx;
use crate::error::Result;
use crate::state::{State, StateDelta};
use std::future::Future;
use std::pin::Pin;

/// A boxed, pinned, Send future — the return type of [`NodeHandler::call`].
pub type BoxFut<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Object-safe trait for node handlers.
///
/// Handlers read from the accumulated [`State`], reach collaborators through
/// the injected [`GraphCtx`], and return a [`StateDelta`] with the keys they
/// want merged. Implement the trait on a struct for substantial nodes, or
/// register an inline closure through [`node_fn`].
pub trait NodeHandler: Send + Sync {
    /// Execute the node against the current state.
    ///
    /// This is the only point in the engine loop where an invocation may
    /// suspend — typically while awaiting a collaborator call.
    fn call<'a>(&'a self, ctx: &'a GraphCtx, state: &'a State) -> BoxFut<'a, Result<StateDelta>>;
}

impl<F> NodeHandler for F
where
    F: for<'a> Fn(&'a GraphCtx, &'a State) -> BoxFut<'a, Result<StateDelta>> + Send + Sync,
{
    fn call<'a>(&'a self, ctx: &'a GraphCtx, state: &'a State) -> BoxFut<'a, Result<StateDelta>> {
        self(ctx, state)
    }
}

/// Constrain a closure to the [`NodeHandler`] shape.
///
/// Inference needs the expected signature to coerce `Box::pin(async { .. })`
/// into a [`BoxFut`], so inline closures are registered through this
/// identity function:
///
/// ```
/// use agent_graph::node::node_fn;
/// use agent_graph::state::delta;
/// use serde_json::json;
///
/// let handler = node_fn(|_ctx, state| {
///     let count = state.get_i64("count").unwrap_or(0);
///     Box::pin(async move { Ok(delta(json!({"count": count + 1}))) })
/// });
/// # let _ = handler;
/// ```
pub fn node_fn<F>(f: F) -> F
where
    F: for<'a> Fn(&'a GraphCtx, &'a State) -> BoxFut<'a, Result<StateDelta>> + Send + Sync,
{
    f
}
