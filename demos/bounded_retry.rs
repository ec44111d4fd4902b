//! Demo: remediation workflow with an engine-enforced retry cap.
//!
//! Topology:
//!
//! ```text
//! analyze ──► execute_playbook ──(verified)──► store_and_notify ──► END
//!                   ▲  │
//!                   └──┘ (not verified, ≤3 attempts;
//!                         cap reached forces store_and_notify)
//! ```
//!
//! Run with: `cargo run --example bounded_retry`

use agent_graph::node::node_fn;
use agent_graph::state::delta;
use agent_graph::{Event, FnEventHandler, GraphBuilder, GraphCtx, RetryPolicy, State, Target, END};
use serde_json::json;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let graph = GraphBuilder::new()
        .add_node("analyze", node_fn(|_ctx, state| {
            let pipeline = state.get_str("pipeline_id").unwrap_or("?").to_string();
            Box::pin(async move {
                Ok(delta(json!({
                    "analysis": {"category": "flaky-test", "pipeline": pipeline},
                })))
            })
        }))
        .add_node("execute_playbook", node_fn(|_ctx, _state| {
            Box::pin(async {
                // The fix never takes in this demo, so the retry edge keeps
                // choosing the node itself until the engine steps in.
                Ok(delta(json!({"verified": false})))
            })
        }))
        .add_node("store_and_notify", node_fn(|_ctx, state| {
            let verified = state.get_bool("verified").unwrap_or(false);
            Box::pin(async move {
                let outcome = if verified { "remediated" } else { "manual_intervention_required" };
                Ok(delta(json!({"outcome": outcome, "notification_sent": true})))
            })
        }))
        .set_entry_point("analyze")
        .add_edge("analyze", "execute_playbook")
        .add_retry_edges(
            "execute_playbook",
            |state: &State| {
                if state.get_bool("verified").unwrap_or(false) {
                    Target::node("store_and_notify")
                } else {
                    Target::node("execute_playbook")
                }
            },
            ["execute_playbook", "store_and_notify"],
            RetryPolicy::new(3, "store_and_notify"),
        )
        .add_edge("store_and_notify", END)
        .compile()?;

    let ctx = GraphCtx::builder()
        .event_handler(Arc::new(FnEventHandler(|event: Event| match event {
            Event::Retry { node, attempt } => println!("retry    {node} (attempt {attempt})"),
            Event::RetryExhausted { node, attempts, to } => {
                println!("exhausted {node} after {attempts} attempts, routing to {to}")
            }
            _ => {}
        })))
        .build();

    let out = graph
        .run(&ctx, State::from_value(json!({"pipeline_id": "build-1871"})))
        .await?;

    println!("outcome:  {}", out.get_str("outcome").unwrap_or("?"));
    Ok(())
}
