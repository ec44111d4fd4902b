//! Demo: planning workflow with an AI-planner fallback branch.
//!
//! Topology:
//!
//! ```text
//! plan_tasks ──(tasks present)──► store_workflow ──► dispatch_tasks ──► END
//!     │
//!  (empty/failed)
//!     ▼
//! fallback_plan ──► store_workflow ──► ...
//! ```
//!
//! Run with: `cargo run --example plan_fallback`

use agent_graph::clients::{FailingModel, MemoryStore, ModelRequest};
use agent_graph::node::node_fn;
use agent_graph::repair::repair;
use agent_graph::state::delta;
use agent_graph::{GraphBuilder, GraphCtx, State, Target, END};
use serde_json::json;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let graph = GraphBuilder::new()
        .add_node("plan_tasks", node_fn(|ctx, state| {
            let request = state.get_str("request").unwrap_or("").to_string();
            Box::pin(async move {
                // Ask the model to decompose the request into tasks. A model
                // failure is recorded as an empty plan, not an error — the
                // conditional edge below picks the fallback.
                let prompt = format!(
                    "Decompose into a JSON object {{\"tasks\": [...]}}: {request}"
                );
                match ctx.model()?.complete(&ModelRequest::new(prompt)).await {
                    Ok(text) => {
                        let parsed = repair(&text);
                        let tasks = parsed
                            .record
                            .get("tasks")
                            .cloned()
                            .unwrap_or(json!([]));
                        Ok(delta(json!({"tasks": tasks, "status": "planned"})))
                    }
                    Err(e) => Ok(delta(json!({
                        "tasks": [],
                        "status": "plan_failed",
                        "plan_error": e.to_string(),
                    }))),
                }
            })
        }))
        .add_node("fallback_plan", node_fn(|_ctx, state| {
            let request = state.get_str("request").unwrap_or("").to_string();
            Box::pin(async move {
                // Deterministic single-task plan when AI planning fails.
                Ok(delta(json!({
                    "tasks": [{"task_id": "task-1", "description": request}],
                    "status": "planned_fallback",
                })))
            })
        }))
        .add_node("store_workflow", node_fn(|ctx, state| {
            let workflow_id = state.get_str("workflow_id").unwrap_or("wf-0").to_string();
            let tasks = state.get("tasks").cloned().unwrap_or(json!([]));
            Box::pin(async move {
                ctx.store()?
                    .put("workflows", &workflow_id, json!({"tasks": tasks}))
                    .await?;
                Ok(delta(json!({"status": "stored"})))
            })
        }))
        .add_node("dispatch_tasks", node_fn(|_ctx, state| {
            let count = state
                .get("tasks")
                .and_then(|t| t.as_array())
                .map_or(0, Vec::len);
            Box::pin(async move {
                Ok(delta(json!({"dispatched": count, "status": "in_progress"})))
            })
        }))
        .set_entry_point("plan_tasks")
        .add_conditional_edges(
            "plan_tasks",
            |state: &State| {
                if state.has_payload("tasks") {
                    Target::node("store_workflow")
                } else {
                    Target::node("fallback_plan")
                }
            },
            ["store_workflow", "fallback_plan"],
        )
        .add_edge("fallback_plan", "store_workflow")
        .add_edge("store_workflow", "dispatch_tasks")
        .add_edge("dispatch_tasks", END)
        .compile()?;

    // The model is down — the fallback branch keeps the workflow moving.
    let ctx = GraphCtx::builder()
        .model(Arc::new(FailingModel::new("model endpoint unreachable")))
        .store(Arc::new(MemoryStore::new()))
        .build();

    let out = graph
        .run(
            &ctx,
            State::from_value(json!({
                "workflow_id": "wf-42",
                "request": "set up CI for the payments service",
            })),
        )
        .await?;

    println!("status:     {}", out.get_str("status").unwrap_or("?"));
    println!("dispatched: {}", out.get_i64("dispatched").unwrap_or(0));
    Ok(())
}
