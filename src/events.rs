//! Event system for graph lifecycle hooks.
//!
//! Provides an optional, non-intrusive way to observe an invocation.
//! The engine emits events as nodes start and finish, retries fire, and
//! the run completes. Users can implement [`EventHandler`] to receive
//! these events for logging, progress tracking, or streaming UIs.

use crate::router::Target;
use std::sync::Arc;

/// The lifecycle status of one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// `run` has not been called yet.
    NotStarted,
    /// The engine loop is active.
    Running,
    /// The terminal sentinel was reached.
    Completed,
    /// An unrecovered handler error, cancellation, or the step ceiling
    /// aborted the invocation.
    Aborted,
}

/// Events emitted during one graph invocation.
#[derive(Debug, Clone)]
pub enum Event {
    /// The engine loop has started.
    RunStart {
        /// Name of the entry node.
        entry: String,
    },
    /// A node handler is about to execute.
    NodeStart {
        /// Node name.
        node: String,
        /// 1-indexed step number within this invocation.
        step: u32,
    },
    /// A node handler has finished.
    NodeEnd {
        /// Node name.
        node: String,
        /// Whether the handler succeeded.
        ok: bool,
    },
    /// A self-retry transition is being taken.
    Retry {
        /// The node retrying itself.
        node: String,
        /// The attempt number about to execute (2 = first retry).
        attempt: u32,
    },
    /// The retry cap was reached and the engine forced a transition away.
    RetryExhausted {
        /// The node whose retries ran out.
        node: String,
        /// Total attempts executed.
        attempts: u32,
        /// Where the engine routed instead.
        to: Target,
    },
    /// A handler failed and the engine routed to its declared failure branch.
    FailureRouted {
        /// The failing node.
        node: String,
        /// The failure branch target.
        to: String,
    },
    /// The invocation has ended.
    RunEnd {
        /// Final status — [`RunStatus::Completed`] or [`RunStatus::Aborted`].
        status: RunStatus,
        /// Total node executions performed.
        steps: u32,
    },
}

/// Handler for graph lifecycle events.
///
/// Implement this trait to receive progress updates during execution.
/// This is entirely optional — graphs run without an event handler.
///
/// # Example
///
/// ```
/// use agent_graph::events::{Event, EventHandler};
///
/// struct PrintHandler;
///
/// impl EventHandler for PrintHandler {
///     fn on_event(&self, event: Event) {
///         match event {
///             Event::NodeStart { node, step } => println!("[{}] {}", step, node),
///             Event::RunEnd { status, steps } => println!("done: {:?} in {} steps", status, steps),
///             _ => {}
///         }
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    /// Called when the engine emits an event.
    fn on_event(&self, event: Event);
}

/// Emit an event if a handler is present. No-op otherwise.
pub(crate) fn emit(handler: &Option<Arc<dyn EventHandler>>, event: Event) {
    if let Some(ref h) = handler {
        h.on_event(event);
    }
}

/// An [`EventHandler`] backed by a closure.
///
/// # Example
///
/// ```
/// use agent_graph::events::{Event, FnEventHandler};
/// use std::sync::Arc;
///
/// let handler = Arc::new(FnEventHandler(|event: Event| {
///     if let Event::Retry { node, attempt } = event {
///         eprintln!("retrying {} (attempt {})", node, attempt);
///     }
/// }));
/// ```
pub struct FnEventHandler<F: Fn(Event) + Send + Sync>(pub F);

impl<F: Fn(Event) + Send + Sync> EventHandler for FnEventHandler<F> {
    fn on_event(&self, event: Event) {
        (self.0)(event);
    }
}
