//! # Agent Graph
//!
//! Typed state-graph workflows for LLM agents.
//!
//! This crate provides the orchestration core shared by LLM-driven
//! automation agents: a **compiled state graph** with conditional routing,
//! declared failure branches, and bounded self-retry, plus an
//! **output-repair pipeline** that recovers structured records from
//! unreliable free-text model output.
//!
//! Business logic (what a "generate code" node actually produces) belongs
//! in your node handlers; this crate governs how they compose and run.
//!
//! ## Core Concepts
//!
//! - **[`GraphBuilder`]** — declares nodes and edges, validates the
//!   topology, and freezes it into a [`CompiledGraph`]. Structural defects
//!   fail at compile time, never at run time.
//! - **[`CompiledGraph::run`]** — drives one invocation: execute the
//!   current node, merge its returned delta into the accumulated
//!   [`State`], route, repeat until [`END`]. Immutable and safely shared
//!   across concurrent invocations.
//! - **[`GraphCtx`]** — per-invocation context carrying injected
//!   collaborator capabilities (model, source control, record store),
//!   cancellation, and event hooks.
//! - **[`repair`](crate::repair::repair)** — staged recovery of a JSON
//!   record from messy model output. Never raises; strategy 4 salvages
//!   known fields and reports failure.
//!
//! ## Quick Start
//!
//! ```no_run
//! use agent_graph::{GraphBuilder, GraphCtx, State, END};
//! use agent_graph::clients::{MockModel, ModelRequest};
//! use agent_graph::node::node_fn;
//! use agent_graph::repair::repair;
//! use agent_graph::state::delta;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> agent_graph::Result<()> {
//!     let graph = GraphBuilder::new()
//!         .add_node("classify", node_fn(|ctx, state| {
//!             let message = state.get_str("message").unwrap_or("").to_string();
//!             Box::pin(async move {
//!                 let text = ctx
//!                     .model()?
//!                     .complete(&ModelRequest::new(format!("Classify: {message}")))
//!                     .await?;
//!                 let parsed = repair(&text);
//!                 Ok(delta(json!({"intent": parsed.record.get("intent")})))
//!             })
//!         }))
//!         .set_entry_point("classify")
//!         .add_edge("classify", END)
//!         .compile()?;
//!
//!     let ctx = GraphCtx::builder()
//!         .model(Arc::new(MockModel::fixed(r#"{"intent": "help"}"#)))
//!         .build();
//!
//!     let out = graph
//!         .run(&ctx, State::from_value(json!({"message": "what can you do?"})))
//!         .await?;
//!     println!("{}", out.into_value());
//!     Ok(())
//! }
//! ```

pub mod clients;
pub mod ctx;
pub mod engine;
pub mod error;
pub mod events;
pub mod graph;
pub mod node;
pub mod repair;
pub mod router;
pub mod state;

pub use ctx::{GraphCtx, GraphCtxBuilder};
pub use engine::EngineConfig;
pub use error::{DefinitionError, GraphError, Result};
pub use events::{Event, EventHandler, FnEventHandler, RunStatus};
pub use graph::{CompiledGraph, GraphBuilder};
pub use node::{node_fn, BoxFut, NodeHandler};
pub use router::{RetryPolicy, Target, END};
pub use state::{State, StateDelta};
