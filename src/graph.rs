//! Graph declaration and compilation.
//!
//! [`GraphBuilder`] collects node and edge registrations in the style of the
//! usual state-graph builders: `add_node`, `add_edge`, `add_conditional_edges`,
//! `set_entry_point`, then [`compile`](GraphBuilder::compile). Compilation
//! validates the whole topology — entry point, duplicate names, every edge
//! target — and freezes it into an immutable [`CompiledGraph`]. A structural
//! defect is a build-time [`DefinitionError`]; it can never surface during
//! execution. Compilation performs no I/O.

use crate::ctx::GraphCtx;
use crate::engine::{self, EngineConfig};
use crate::error::{DefinitionError, Result};
use crate::node::NodeHandler;
use crate::router::{Branch, RetryPolicy, RouterFn, Target};
use crate::state::State;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// An outgoing edge: unconditional or routing-function-guarded.
pub(crate) enum Edge {
    /// Always transition to the target.
    To(Target),
    /// Ask the branch's routing function.
    Branch(Branch),
}

/// Builder for a state graph.
///
/// # Example
///
/// ```
/// use agent_graph::{GraphBuilder, END};
/// use agent_graph::node::node_fn;
/// use agent_graph::state::delta;
/// use serde_json::json;
///
/// # fn main() -> agent_graph::Result<()> {
/// let graph = GraphBuilder::new()
///     .add_node("greet", node_fn(|_ctx, _state| {
///         Box::pin(async { Ok(delta(json!({"greeting": "hello"}))) })
///     }))
///     .set_entry_point("greet")
///     .add_edge("greet", END)
///     .compile()?;
/// # let _ = graph;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct GraphBuilder {
    nodes: Vec<(String, Box<dyn NodeHandler>)>,
    edges: Vec<(String, Edge)>,
    failure_edges: Vec<(String, String)>,
    entry: Option<String>,
    config: EngineConfig,
}

impl GraphBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node under a name unique within this graph.
    pub fn add_node(mut self, name: impl Into<String>, handler: impl NodeHandler + 'static) -> Self {
        self.nodes.push((name.into(), Box::new(handler)));
        self
    }

    /// Declare an unconditional edge. `to` may be a node name or [`END`](crate::END).
    pub fn add_edge(mut self, from: impl Into<String>, to: impl Into<Target>) -> Self {
        self.edges.push((from.into(), Edge::To(to.into())));
        self
    }

    /// Declare a conditional edge: the routing function picks one of the
    /// declared candidates each time the node finishes.
    pub fn add_conditional_edges<R, T, I>(mut self, from: impl Into<String>, router: R, candidates: I) -> Self
    where
        R: Fn(&State) -> Target + Send + Sync + 'static,
        I: IntoIterator<Item = T>,
        T: Into<Target>,
    {
        let router: RouterFn = Arc::new(router);
        let candidates = candidates.into_iter().map(Into::into).collect();
        self.edges
            .push((from.into(), Edge::Branch(Branch::new(router, candidates, None))));
        self
    }

    /// Declare a conditional edge whose candidates include the node itself,
    /// bounded by a [`RetryPolicy`].
    ///
    /// The engine counts the node's executions and forces the policy's
    /// exhausted target once the cap is reached, regardless of what the
    /// routing function returns.
    pub fn add_retry_edges<R, T, I>(
        mut self,
        from: impl Into<String>,
        router: R,
        candidates: I,
        policy: RetryPolicy,
    ) -> Self
    where
        R: Fn(&State) -> Target + Send + Sync + 'static,
        I: IntoIterator<Item = T>,
        T: Into<Target>,
    {
        let router: RouterFn = Arc::new(router);
        let candidates = candidates.into_iter().map(Into::into).collect();
        self.edges.push((
            from.into(),
            Edge::Branch(Branch::new(router, candidates, Some(policy))),
        ));
        self
    }

    /// Declare a failure branch: if the node's handler returns an error, the
    /// engine writes `error` and `failed_node` into state and routes to `to`
    /// instead of propagating.
    pub fn add_failure_edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.failure_edges.push((from.into(), to.into()));
        self
    }

    /// Set the node executed first.
    pub fn set_entry_point(mut self, name: impl Into<String>) -> Self {
        self.entry = Some(name.into());
        self
    }

    /// Override the engine configuration (step ceiling).
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Validate the declaration and freeze it into a [`CompiledGraph`].
    ///
    /// Checks, in order: entry point set and declared, no duplicate node
    /// names, every edge source declared, at most one outgoing edge per
    /// node, every target (unconditional, candidate, retry-exhausted,
    /// failure) declared or [`END`](crate::END), and retry policies only on
    /// branches that actually route back to their own node.
    pub fn compile(self) -> Result<CompiledGraph> {
        let mut names = HashSet::new();
        for (name, _) in &self.nodes {
            if !names.insert(name.clone()) {
                return Err(DefinitionError::DuplicateNode(name.clone()).into());
            }
        }

        let entry = self.entry.ok_or(DefinitionError::MissingEntry)?;
        if !names.contains(&entry) {
            return Err(DefinitionError::UnknownEntry(entry).into());
        }

        let check_target = |from: &str, target: &Target| -> std::result::Result<(), DefinitionError> {
            match target {
                Target::End => Ok(()),
                Target::Node(to) if names.contains(to) => Ok(()),
                Target::Node(to) => Err(DefinitionError::DanglingTarget {
                    from: from.to_string(),
                    to: to.clone(),
                }),
            }
        };

        let mut edges: HashMap<String, Edge> = HashMap::new();
        for (from, edge) in self.edges {
            if !names.contains(&from) {
                return Err(DefinitionError::UnknownEdgeSource(from).into());
            }
            match &edge {
                Edge::To(target) => check_target(&from, target)?,
                Edge::Branch(branch) => {
                    for candidate in &branch.candidates {
                        check_target(&from, candidate)?;
                    }
                    if let Some(policy) = &branch.retry {
                        let self_target = Target::node(from.clone());
                        if !branch.candidates.contains(&self_target) {
                            return Err(DefinitionError::RetryWithoutSelfEdge(from).into());
                        }
                        if policy.exhausted == self_target {
                            return Err(DefinitionError::RetryExhaustsToSelf(from).into());
                        }
                        check_target(&from, &policy.exhausted)?;
                    }
                }
            }
            if edges.insert(from.clone(), edge).is_some() {
                return Err(DefinitionError::ConflictingEdges(from).into());
            }
        }

        let mut failure: HashMap<String, String> = HashMap::new();
        for (from, to) in self.failure_edges {
            if !names.contains(&from) {
                return Err(DefinitionError::UnknownEdgeSource(from).into());
            }
            if !names.contains(&to) {
                return Err(DefinitionError::DanglingTarget { from, to }.into());
            }
            if failure.insert(from.clone(), to).is_some() {
                return Err(DefinitionError::ConflictingEdges(from).into());
            }
        }

        Ok(CompiledGraph {
            inner: Arc::new(GraphInner {
                nodes: self.nodes.into_iter().collect(),
                edges,
                failure,
                entry,
                config: self.config,
            }),
        })
    }
}

pub(crate) struct GraphInner {
    pub(crate) nodes: HashMap<String, Box<dyn NodeHandler>>,
    pub(crate) edges: HashMap<String, Edge>,
    pub(crate) failure: HashMap<String, String>,
    pub(crate) entry: String,
    pub(crate) config: EngineConfig,
}

/// An immutable, runnable graph.
///
/// Built once per process lifetime (or per configuration reload) and shared
/// read-only across concurrent invocations — cloning is an `Arc` bump. Each
/// [`run`](CompiledGraph::run) holds its own state and retry counters, so
/// arbitrarily many invocations may be in flight at once.
#[derive(Clone)]
pub struct CompiledGraph {
    inner: Arc<GraphInner>,
}

impl CompiledGraph {
    /// Drive one invocation from the entry node to the terminal sentinel.
    ///
    /// Nodes execute sequentially; the only suspension points are inside
    /// the handlers' own collaborator calls. Returns the accumulated state
    /// once the terminal sentinel is reached.
    pub async fn run(&self, ctx: &GraphCtx, initial: State) -> Result<State> {
        engine::run(&self.inner, ctx, initial).await
    }

    /// The entry node's name.
    pub fn entry_point(&self) -> &str {
        &self.inner.entry
    }

    /// Names of all declared nodes (unordered).
    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.inner.nodes.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for CompiledGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledGraph")
            .field("entry", &self.inner.entry)
            .field("nodes", &self.inner.nodes.len())
            .field("edges", &self.inner.edges.len())
            .field("max_steps", &self.inner.config.max_steps)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GraphError;
    use crate::node::node_fn;
    use crate::state::delta;
    use crate::END;
    use serde_json::json;

    fn noop() -> impl NodeHandler {
        node_fn(|_ctx, _state| Box::pin(async { Ok(delta(json!({}))) }))
    }

    fn assert_definition_err(result: Result<CompiledGraph>) -> DefinitionError {
        match result {
            Err(GraphError::Definition(e)) => e,
            Err(other) => panic!("expected definition error, got {other:?}"),
            Ok(_) => panic!("expected compile to fail"),
        }
    }

    #[test]
    fn compile_minimal_graph() {
        let graph = GraphBuilder::new()
            .add_node("only", noop())
            .set_entry_point("only")
            .add_edge("only", END)
            .compile()
            .unwrap();
        assert_eq!(graph.entry_point(), "only");
    }

    #[test]
    fn missing_entry_rejected() {
        let err = assert_definition_err(GraphBuilder::new().add_node("a", noop()).compile());
        assert!(matches!(err, DefinitionError::MissingEntry));
    }

    #[test]
    fn unknown_entry_rejected() {
        let err = assert_definition_err(
            GraphBuilder::new()
                .add_node("a", noop())
                .set_entry_point("ghost")
                .compile(),
        );
        assert!(matches!(err, DefinitionError::UnknownEntry(name) if name == "ghost"));
    }

    #[test]
    fn duplicate_node_rejected() {
        let err = assert_definition_err(
            GraphBuilder::new()
                .add_node("a", noop())
                .add_node("a", noop())
                .set_entry_point("a")
                .compile(),
        );
        assert!(matches!(err, DefinitionError::DuplicateNode(name) if name == "a"));
    }

    #[test]
    fn dangling_edge_target_rejected() {
        let err = assert_definition_err(
            GraphBuilder::new()
                .add_node("a", noop())
                .set_entry_point("a")
                .add_edge("a", "nowhere")
                .compile(),
        );
        assert!(matches!(err, DefinitionError::DanglingTarget { to, .. } if to == "nowhere"));
    }

    #[test]
    fn unknown_edge_source_rejected() {
        let err = assert_definition_err(
            GraphBuilder::new()
                .add_node("a", noop())
                .set_entry_point("a")
                .add_edge("ghost", END)
                .compile(),
        );
        assert!(matches!(err, DefinitionError::UnknownEdgeSource(name) if name == "ghost"));
    }

    #[test]
    fn conflicting_edges_rejected() {
        let err = assert_definition_err(
            GraphBuilder::new()
                .add_node("a", noop())
                .add_node("b", noop())
                .set_entry_point("a")
                .add_edge("a", "b")
                .add_edge("a", END)
                .add_edge("b", END)
                .compile(),
        );
        assert!(matches!(err, DefinitionError::ConflictingEdges(name) if name == "a"));
    }

    #[test]
    fn conditional_candidate_must_be_declared() {
        // A routing function that could name an undeclared node is rejected
        // at compile time — it can never reach run().
        let err = assert_definition_err(
            GraphBuilder::new()
                .add_node("a", noop())
                .add_node("b", noop())
                .set_entry_point("a")
                .add_conditional_edges("a", |_: &State| Target::node("b"), ["b", "undeclared"])
                .add_edge("b", END)
                .compile(),
        );
        assert!(matches!(err, DefinitionError::DanglingTarget { to, .. } if to == "undeclared"));
    }

    #[test]
    fn failure_edge_target_must_be_declared() {
        let err = assert_definition_err(
            GraphBuilder::new()
                .add_node("a", noop())
                .set_entry_point("a")
                .add_edge("a", END)
                .add_failure_edge("a", "missing")
                .compile(),
        );
        assert!(matches!(err, DefinitionError::DanglingTarget { to, .. } if to == "missing"));
    }

    #[test]
    fn retry_policy_requires_self_candidate() {
        let err = assert_definition_err(
            GraphBuilder::new()
                .add_node("a", noop())
                .add_node("b", noop())
                .set_entry_point("a")
                .add_retry_edges(
                    "a",
                    |_: &State| Target::node("b"),
                    ["b"],
                    RetryPolicy::new(3, "b"),
                )
                .add_edge("b", END)
                .compile(),
        );
        assert!(matches!(err, DefinitionError::RetryWithoutSelfEdge(name) if name == "a"));
    }

    #[test]
    fn retry_exhausted_target_cannot_be_self() {
        let err = assert_definition_err(
            GraphBuilder::new()
                .add_node("a", noop())
                .add_node("b", noop())
                .set_entry_point("a")
                .add_retry_edges(
                    "a",
                    |_: &State| Target::node("a"),
                    ["a", "b"],
                    RetryPolicy::new(3, "a"),
                )
                .add_edge("b", END)
                .compile(),
        );
        assert!(matches!(err, DefinitionError::RetryExhaustsToSelf(name) if name == "a"));
    }

    #[test]
    fn compiled_graph_is_cheap_to_clone() {
        let graph = GraphBuilder::new()
            .add_node("a", noop())
            .set_entry_point("a")
            .add_edge("a", END)
            .compile()
            .unwrap();
        let copy = graph.clone();
        assert_eq!(copy.entry_point(), "a");
    }
}
