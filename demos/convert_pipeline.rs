//! Demo: pipeline-conversion workflow with dual fallback branches.
//!
//! Topology:
//!
//! ```text
//! parse_with_model ──(ok)──► generate_with_model ──(ok)──► build_report ──► END
//!        │                          │
//!    (failed)                   (failed)
//!        ▼                          ▼
//! parse_with_rules          generate_with_template
//!        └──► generate_with_model   └──► build_report ──► END
//! ```
//!
//! Run with: `cargo run --example convert_pipeline`

use agent_graph::clients::{MockModel, ModelRequest};
use agent_graph::node::node_fn;
use agent_graph::repair::repair;
use agent_graph::state::delta;
use agent_graph::{GraphBuilder, GraphCtx, State, Target, END};
use serde_json::json;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let graph = GraphBuilder::new()
        .add_node("parse_with_model", node_fn(|ctx, state| {
            let source = state.get_str("pipeline_source").unwrap_or("").to_string();
            Box::pin(async move {
                let prompt = format!("Extract stages as JSON from this pipeline:\n{source}");
                match ctx.model()?.complete(&ModelRequest::new(prompt)).await {
                    Ok(text) => {
                        let parsed = repair(&text);
                        if parsed.succeeded {
                            return Ok(delta(json!({
                                "pipeline_data": parsed.record,
                                "parse_method": "model",
                            })));
                        }
                        Ok(delta(json!({"pipeline_data": {}, "parse_method": "model_failed"})))
                    }
                    Err(_) => Ok(delta(json!({"pipeline_data": {}, "parse_method": "model_failed"}))),
                }
            })
        }))
        .add_node("parse_with_rules", node_fn(|_ctx, state| {
            let source = state.get_str("pipeline_source").unwrap_or("").to_string();
            Box::pin(async move {
                // Crude structural fallback: one stage per "stage" line.
                let stages: Vec<_> = source
                    .lines()
                    .filter(|l| l.trim_start().starts_with("stage"))
                    .map(|l| json!({"name": l.trim(), "steps": []}))
                    .collect();
                Ok(delta(json!({
                    "pipeline_data": {"stages": stages},
                    "parse_method": "rules",
                })))
            })
        }))
        .add_node("generate_with_model", node_fn(|ctx, state| {
            let data = state.get("pipeline_data").cloned().unwrap_or(json!({}));
            Box::pin(async move {
                let prompt = format!("Convert to target workflow YAML: {data}");
                match ctx.model()?.complete(&ModelRequest::new(prompt)).await {
                    Ok(yaml) if !yaml.trim().is_empty() => Ok(delta(json!({
                        "workflow": yaml,
                        "generation_method": "model",
                    }))),
                    _ => Ok(delta(json!({"workflow": "", "generation_method": "model_failed"}))),
                }
            })
        }))
        .add_node("generate_with_template", node_fn(|_ctx, state| {
            let stages = state
                .get("pipeline_data")
                .and_then(|d| d.get("stages"))
                .and_then(|s| s.as_array())
                .map_or(0, Vec::len);
            Box::pin(async move {
                let workflow = format!("name: converted\njobs: {stages} stage(s)\n");
                Ok(delta(json!({"workflow": workflow, "generation_method": "template"})))
            })
        }))
        .add_node("build_report", node_fn(|_ctx, state| {
            let report = json!({
                "parse_method": state.get_str("parse_method").unwrap_or("unknown"),
                "generation_method": state.get_str("generation_method").unwrap_or("unknown"),
                "stages_converted": state
                    .get("pipeline_data")
                    .and_then(|d| d.get("stages"))
                    .and_then(|s| s.as_array())
                    .map_or(0, Vec::len),
            });
            Box::pin(async move { Ok(delta(json!({"report": report, "success": true}))) })
        }))
        .set_entry_point("parse_with_model")
        .add_conditional_edges(
            "parse_with_model",
            |state: &State| {
                if state.get_str("parse_method") == Some("model_failed")
                    || !state.has_payload("pipeline_data")
                {
                    Target::node("parse_with_rules")
                } else {
                    Target::node("generate_with_model")
                }
            },
            ["parse_with_rules", "generate_with_model"],
        )
        .add_edge("parse_with_rules", "generate_with_model")
        .add_conditional_edges(
            "generate_with_model",
            |state: &State| {
                if state.get_str("generation_method") == Some("model_failed")
                    || !state.has_payload("workflow")
                {
                    Target::node("generate_with_template")
                } else {
                    Target::node("build_report")
                }
            },
            ["generate_with_template", "build_report"],
        )
        .add_edge("generate_with_template", "build_report")
        .add_edge("build_report", END)
        .compile()?;

    // First call returns a parseable record; second returns an empty
    // completion, pushing generation onto the template branch.
    let ctx = GraphCtx::builder()
        .model(Arc::new(MockModel::new(vec![
            r#"```json
{"stages": [{"name": "build", "steps": ["make"]}, {"name": "test", "steps": ["make test"]}]}
```"#
                .to_string(),
            String::new(),
        ])))
        .build();

    let source = "pipeline {\n  stage('build') { }\n  stage('test') { }\n}";
    let out = graph
        .run(&ctx, State::from_value(json!({"pipeline_source": source})))
        .await?;

    println!("report: {}", out.get("report").cloned().unwrap_or(json!({})));
    Ok(())
}
