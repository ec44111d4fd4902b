use std::time::Duration;
use thiserror::Error;

/// Structural defects detected when a graph is compiled.
///
/// These are always raised at build time — an invalid graph never becomes
/// runnable, so none of these can surface during execution.
#[derive(Error, Debug)]
pub enum DefinitionError {
    /// No entry point was set before `compile()`.
    #[error("graph has no entry point")]
    MissingEntry,

    /// The entry point names a node that was never declared.
    #[error("entry point '{0}' is not a declared node")]
    UnknownEntry(String),

    /// Two nodes were registered under the same name.
    #[error("duplicate node name '{0}'")]
    DuplicateNode(String),

    /// An edge was declared from a node that does not exist.
    #[error("edge source '{0}' is not a declared node")]
    UnknownEdgeSource(String),

    /// A node has more than one outgoing edge declaration.
    #[error("node '{0}' has conflicting outgoing edges")]
    ConflictingEdges(String),

    /// An edge (or conditional candidate, or failure branch) targets a node
    /// that was never declared.
    #[error("edge from '{from}' targets undeclared node '{to}'")]
    DanglingTarget { from: String, to: String },

    /// A retry policy was attached to a branch that never routes back to
    /// its own node, so the attempt counter could never apply.
    #[error("retry policy on '{0}' requires the node itself among the branch candidates")]
    RetryWithoutSelfEdge(String),

    /// A retry policy's exhausted target would route back into the node it
    /// is supposed to force away from.
    #[error("retry policy on '{0}' cannot use the node itself as the exhausted target")]
    RetryExhaustsToSelf(String),
}

/// Errors produced by the graph engine and its collaborator clients.
#[derive(Error, Debug)]
pub enum GraphError {
    /// A structural defect found at compile time.
    #[error("invalid graph definition: {0}")]
    Definition(#[from] DefinitionError),

    /// The invocation executed more steps than the configured ceiling.
    /// Guards against misconfigured cycles.
    #[error("step limit of {limit} exceeded at node '{node}'")]
    StepLimitExceeded {
        /// The node that would have executed next.
        node: String,
        /// The configured ceiling.
        limit: u32,
    },

    /// A routing function returned a target outside its declared candidates.
    #[error("router for '{node}' chose undeclared target '{target}'")]
    UndeclaredOutcome {
        /// The node whose branch was being resolved.
        node: String,
        /// The target the routing function returned.
        target: String,
    },

    /// A node handler failed and the node has no declared failure branch.
    #[error("node '{node}' failed: {source}")]
    NodeHandler {
        /// Name of the failing node.
        node: String,
        /// The handler's original error.
        #[source]
        source: Box<GraphError>,
    },

    /// Low-level HTTP transport failure (connection refused, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// JSON parsing failed at the serde level.
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP error with status code, response body, and optional Retry-After hint.
    ///
    /// Returned by collaborator clients when a service responds with a
    /// non-success status. `retry_after` is populated from the `Retry-After`
    /// response header when present.
    #[error("HTTP {status}: {body}")]
    Http {
        /// HTTP status code (e.g. 429, 500, 503).
        status: u16,
        /// Response body text.
        body: String,
        /// Parsed `Retry-After` header value, if present.
        retry_after: Option<Duration>,
    },

    /// The invocation was cancelled via the cancellation flag.
    #[error("invocation was cancelled")]
    Cancelled,

    /// Catch-all for other errors.
    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for GraphError {
    fn from(err: anyhow::Error) -> Self {
        GraphError::Other(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GraphError>;
