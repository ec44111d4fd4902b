//! Per-invocation context shared with every node handler.
//!
//! [`GraphCtx`] carries the injected collaborator capabilities (model
//! client, source control, record store), template variables, cancellation
//! handle, and optional event handler. Topology is compiled once; a context
//! is bound at `run()` time, so the same graph can be exercised against
//! mock capabilities in tests and live clients in production.

use crate::clients::{ModelClient, RecordStore, SourceControl};
use crate::error::Result;
use crate::events::EventHandler;
use crate::GraphError;
use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Execution context for one (or many) graph invocations.
///
/// Capabilities are optional: a graph that never touches source control can
/// run against a context without one. Handlers fail with a descriptive
/// error if they ask for a capability that was not injected.
///
/// # Example
///
/// ```
/// use agent_graph::GraphCtx;
/// use agent_graph::clients::MockModel;
/// use std::sync::Arc;
///
/// let ctx = GraphCtx::builder()
///     .model(Arc::new(MockModel::fixed(r#"{"ok": true}"#)))
///     .var("environment", "dev")
///     .build();
/// ```
pub struct GraphCtx {
    model: Option<Arc<dyn ModelClient>>,
    source_control: Option<Arc<dyn SourceControl>>,
    store: Option<Arc<dyn RecordStore>>,
    /// Template variables available to handlers (e.g. prompt placeholders).
    pub vars: HashMap<String, String>,
    /// Optional cancellation flag; the engine checks it between steps and
    /// handlers should check it before starting expensive work.
    pub cancellation: Option<Arc<AtomicBool>>,
    /// Optional handler for graph lifecycle events.
    pub event_handler: Option<Arc<dyn EventHandler>>,
}

impl GraphCtx {
    /// Create a new builder.
    pub fn builder() -> GraphCtxBuilder {
        GraphCtxBuilder::default()
    }

    /// The language-model collaborator.
    pub fn model(&self) -> Result<&dyn ModelClient> {
        self.model
            .as_deref()
            .ok_or_else(|| GraphError::Other("no model client configured for this invocation".into()))
    }

    /// The source-control collaborator.
    pub fn source_control(&self) -> Result<&dyn SourceControl> {
        self.source_control
            .as_deref()
            .ok_or_else(|| GraphError::Other("no source-control client configured for this invocation".into()))
    }

    /// The persistence collaborator.
    pub fn store(&self) -> Result<&dyn RecordStore> {
        self.store
            .as_deref()
            .ok_or_else(|| GraphError::Other("no record store configured for this invocation".into()))
    }

    /// Look up a template variable.
    pub fn var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|c| c.load(Ordering::Relaxed))
    }

    /// Return an error if cancellation has been requested.
    pub fn check_cancelled(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(GraphError::Cancelled);
        }
        Ok(())
    }
}

impl std::fmt::Debug for GraphCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphCtx")
            .field("has_model", &self.model.is_some())
            .field("has_source_control", &self.source_control.is_some())
            .field("has_store", &self.store.is_some())
            .field("vars_count", &self.vars.len())
            .field("has_cancellation", &self.cancellation.is_some())
            .field("has_event_handler", &self.event_handler.is_some())
            .finish()
    }
}

/// Builder for [`GraphCtx`].
#[derive(Default)]
pub struct GraphCtxBuilder {
    model: Option<Arc<dyn ModelClient>>,
    source_control: Option<Arc<dyn SourceControl>>,
    store: Option<Arc<dyn RecordStore>>,
    vars: HashMap<String, String>,
    cancellation: Option<Arc<AtomicBool>>,
    event_handler: Option<Arc<dyn EventHandler>>,
}

impl GraphCtxBuilder {
    /// Inject the language-model collaborator.
    pub fn model(mut self, model: Arc<dyn ModelClient>) -> Self {
        self.model = Some(model);
        self
    }

    /// Inject the source-control collaborator.
    pub fn source_control(mut self, client: Arc<dyn SourceControl>) -> Self {
        self.source_control = Some(client);
        self
    }

    /// Inject the persistence collaborator.
    pub fn store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set all template variables at once.
    pub fn vars(mut self, vars: HashMap<String, String>) -> Self {
        self.vars = vars;
        self
    }

    /// Insert a single template variable.
    pub fn var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    /// Set the cancellation flag.
    pub fn cancellation(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancellation = Some(cancel);
        self
    }

    /// Set the event handler.
    pub fn event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    /// Build the context.
    pub fn build(self) -> GraphCtx {
        GraphCtx {
            model: self.model,
            source_control: self.source_control,
            store: self.store,
            vars: self.vars,
            cancellation: self.cancellation,
            event_handler: self.event_handler,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_capabilities_are_reported() {
        let ctx = GraphCtx::builder().build();
        assert!(ctx.model().is_err());
        assert!(ctx.source_control().is_err());
        assert!(ctx.store().is_err());
    }

    #[test]
    fn vars_are_readable() {
        let ctx = GraphCtx::builder().var("audience", "platform team").build();
        assert_eq!(ctx.var("audience"), Some("platform team"));
        assert_eq!(ctx.var("missing"), None);
    }

    #[test]
    fn cancellation_flag_is_observed() {
        let flag = Arc::new(AtomicBool::new(false));
        let ctx = GraphCtx::builder().cancellation(flag.clone()).build();

        assert!(!ctx.is_cancelled());
        assert!(ctx.check_cancelled().is_ok());

        flag.store(true, Ordering::Relaxed);
        assert!(ctx.is_cancelled());
        assert!(matches!(ctx.check_cancelled(), Err(GraphError::Cancelled)));
    }
}
