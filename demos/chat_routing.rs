//! Demo: conversational dispatch with intent-based branching.
//!
//! Topology:
//!
//! ```text
//! analyze_intent ──(action needed)──► execute_action ──► compose_response ──► END
//!        │
//!   (no action)
//!        ▼
//! compose_response ──► END
//! ```
//!
//! Run with: `cargo run --example chat_routing`

use agent_graph::clients::{MockModel, ModelRequest, RecordingSourceControl};
use agent_graph::node::node_fn;
use agent_graph::repair::repair_with_fields;
use agent_graph::state::delta;
use agent_graph::{GraphBuilder, GraphCtx, State, Target, END};
use serde_json::json;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let graph = GraphBuilder::new()
        .add_node("analyze_intent", node_fn(|ctx, state| {
            let message = state.get_str("user_message").unwrap_or("").to_string();
            Box::pin(async move {
                let prompt = format!(
                    "Classify this message as JSON with intent, action_needed, \
                     repo_name, response: {message}"
                );
                let text = ctx.model()?.complete(&ModelRequest::new(prompt)).await?;
                // Even when the model ignores the format instructions, the
                // known fields are salvageable.
                let parsed = repair_with_fields(
                    &text,
                    &["intent", "action_needed", "repo_name", "response"],
                );
                Ok(delta(json!({
                    "intent": parsed.record.get("intent").cloned().unwrap_or(json!("general")),
                    "action_needed": parsed
                        .record
                        .get("action_needed")
                        .and_then(|v| v.as_bool())
                        .unwrap_or(false),
                    "repo_name": parsed.record.get("repo_name").cloned().unwrap_or(json!(null)),
                    "intent_response": parsed
                        .record
                        .get("response")
                        .cloned()
                        .unwrap_or(json!("I'm here to help with your DevOps tasks!")),
                })))
            })
        }))
        .add_node("execute_action", node_fn(|ctx, state| {
            let repo = state.get_str("repo_name").unwrap_or("sandbox").to_string();
            Box::pin(async move {
                let created = ctx
                    .source_control()?
                    .create_repository(&repo, "created by chat dispatch", false)
                    .await?;
                Ok(delta(json!({"action_result": created})))
            })
        }))
        .add_node("compose_response", node_fn(|_ctx, state| {
            let mut response = state.get_str("intent_response").unwrap_or("").to_string();
            if let Some(result) = state.get("action_result") {
                let url = result.pointer("/html_url").and_then(|v| v.as_str()).unwrap_or("");
                response = format!("{response} Done: {url}");
            }
            Box::pin(async move { Ok(delta(json!({"final_response": response}))) })
        }))
        .set_entry_point("analyze_intent")
        .add_conditional_edges(
            "analyze_intent",
            |state: &State| {
                if state.get_bool("action_needed").unwrap_or(false) {
                    Target::node("execute_action")
                } else {
                    Target::node("compose_response")
                }
            },
            ["execute_action", "compose_response"],
        )
        .add_edge("execute_action", "compose_response")
        .add_edge("compose_response", END)
        .compile()?;

    let source_control = Arc::new(RecordingSourceControl::new());
    let ctx = GraphCtx::builder()
        .model(Arc::new(MockModel::fixed(
            r#"{"intent": "github", "action_needed": true, "repo_name": "payments-service", "response": "Creating that repository now."}"#,
        )))
        .source_control(source_control.clone())
        .build();

    let out = graph
        .run(
            &ctx,
            State::from_value(json!({"user_message": "create a repo called payments-service"})),
        )
        .await?;

    println!("reply: {}", out.get_str("final_response").unwrap_or("?"));
    println!("operations: {:?}", source_control.operations());
    Ok(())
}
