//! The execution engine: drives one invocation of a compiled graph.
//!
//! Single-threaded and cooperative per invocation. The loop invokes the
//! current node's handler against the accumulated state, merges the returned
//! delta, asks the node's edge for the next target, and stops at the terminal
//! sentinel. A handler error routes to the node's declared failure branch if
//! one exists, otherwise it propagates as
//! [`GraphError::NodeHandler`](crate::GraphError::NodeHandler). A configurable
//! step ceiling guards against misconfigured cycles.

use crate::ctx::GraphCtx;
use crate::error::{GraphError, Result};
use crate::events::{emit, Event, RunStatus};
use crate::graph::{Edge, GraphInner};
use crate::router::Target;
use crate::state::State;
use std::collections::HashMap;

/// Engine configuration for one graph.
///
/// The step ceiling is deliberately a configuration parameter, not an
/// engine invariant — tune it to the longest legitimate path through your
/// topology, retries included.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum node executions per invocation. Default: 20.
    pub max_steps: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { max_steps: 20 }
    }
}

/// State keys the engine writes when routing a handler failure.
pub const ERROR_KEY: &str = "error";
/// Companion to [`ERROR_KEY`]: the name of the node that failed.
pub const FAILED_NODE_KEY: &str = "failed_node";

pub(crate) async fn run(graph: &GraphInner, ctx: &GraphCtx, initial: State) -> Result<State> {
    let events = &ctx.event_handler;
    let mut state = initial;
    let mut current = graph.entry.clone();
    let mut steps: u32 = 0;
    // Executions per node in this invocation, for bounded self-retry.
    let mut executions: HashMap<String, u32> = HashMap::new();

    emit(events, Event::RunStart { entry: current.clone() });

    loop {
        if let Err(e) = ctx.check_cancelled() {
            emit(events, Event::RunEnd { status: RunStatus::Aborted, steps });
            return Err(e);
        }

        if steps >= graph.config.max_steps {
            tracing::warn!(
                node = current.as_str(),
                limit = graph.config.max_steps,
                "step ceiling exceeded, aborting invocation"
            );
            emit(events, Event::RunEnd { status: RunStatus::Aborted, steps });
            return Err(GraphError::StepLimitExceeded {
                node: current,
                limit: graph.config.max_steps,
            });
        }
        steps += 1;
        *executions.entry(current.clone()).or_insert(0) += 1;

        // Compilation guarantees every reachable name is a declared node.
        let handler = graph
            .nodes
            .get(&current)
            .ok_or_else(|| GraphError::Other(format!("node '{}' missing from compiled graph", current)))?;

        emit(events, Event::NodeStart { node: current.clone(), step: steps });
        tracing::debug!(node = current.as_str(), step = steps, "executing node");

        match handler.call(ctx, &state).await {
            Ok(delta) => {
                state.merge(delta);
                emit(events, Event::NodeEnd { node: current.clone(), ok: true });
            }
            Err(e) => {
                emit(events, Event::NodeEnd { node: current.clone(), ok: false });
                match graph.failure.get(&current) {
                    Some(to) => {
                        // Expected control flow: record the failure and take
                        // the declared branch.
                        tracing::debug!(
                            node = current.as_str(),
                            to = to.as_str(),
                            "handler failed, taking failure branch"
                        );
                        state.insert(ERROR_KEY, serde_json::Value::String(e.to_string()));
                        state.insert(FAILED_NODE_KEY, serde_json::Value::String(current.clone()));
                        emit(
                            events,
                            Event::FailureRouted { node: current.clone(), to: to.clone() },
                        );
                        current = to.clone();
                        continue;
                    }
                    None => {
                        emit(events, Event::RunEnd { status: RunStatus::Aborted, steps });
                        return Err(GraphError::NodeHandler {
                            node: current,
                            source: Box::new(e),
                        });
                    }
                }
            }
        }

        let next = match graph.edges.get(&current) {
            // A node without an outgoing edge completes the invocation.
            None => Target::End,
            Some(Edge::To(target)) => target.clone(),
            Some(Edge::Branch(branch)) => {
                match branch.resolve(&current, &state, &executions, events) {
                    Ok(target) => target,
                    Err(e) => {
                        emit(events, Event::RunEnd { status: RunStatus::Aborted, steps });
                        return Err(e);
                    }
                }
            }
        };

        match next {
            Target::End => {
                emit(events, Event::RunEnd { status: RunStatus::Completed, steps });
                return Ok(state);
            }
            Target::Node(name) => current = name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventHandler, FnEventHandler};
    use crate::graph::GraphBuilder;
    use crate::node::node_fn;
    use crate::router::RetryPolicy;
    use crate::state::delta;
    use crate::END;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    fn ctx() -> GraphCtx {
        GraphCtx::builder().build()
    }

    // Two nodes: `a` writes {x:1}, `b` reads x and writes {y:x+1}.
    #[tokio::test]
    async fn sequential_accumulation() {
        let graph = GraphBuilder::new()
            .add_node("a", node_fn(|_ctx, _state| {
                Box::pin(async { Ok(delta(json!({"x": 1}))) })
            }))
            .add_node("b", node_fn(|_ctx, state| {
                let x = state.get_i64("x").unwrap_or(0);
                Box::pin(async move { Ok(delta(json!({"y": x + 1}))) })
            }))
            .set_entry_point("a")
            .add_edge("a", "b")
            .add_edge("b", END)
            .compile()
            .unwrap();

        let out = graph.run(&ctx(), State::new()).await.unwrap();
        assert_eq!(out.get("x"), Some(&json!(1)));
        assert_eq!(out.get("y"), Some(&json!(2)));
    }

    // A failing node with no failure branch propagates a wrapped error
    // naming the node.
    #[tokio::test]
    async fn handler_error_without_failure_branch_propagates() {
        let graph = GraphBuilder::new()
            .add_node("fetch", node_fn(|_ctx, _state| {
                Box::pin(async { Err(GraphError::Other("connection refused".into())) })
            }))
            .set_entry_point("fetch")
            .add_edge("fetch", END)
            .compile()
            .unwrap();

        let err = graph.run(&ctx(), State::new()).await.unwrap_err();
        match err {
            GraphError::NodeHandler { node, source } => {
                assert_eq!(node, "fetch");
                assert!(source.to_string().contains("connection refused"));
            }
            other => panic!("expected NodeHandler error, got {other:?}"),
        }
    }

    // A failing node with a declared failure branch routes there with the
    // error recorded in state.
    #[tokio::test]
    async fn handler_error_takes_failure_branch() {
        let graph = GraphBuilder::new()
            .add_node("risky", node_fn(|_ctx, _state| {
                Box::pin(async { Err(GraphError::Other("boom".into())) })
            }))
            .add_node("recover", node_fn(|_ctx, state| {
                let seen = state.get_str(ERROR_KEY).unwrap_or("").to_string();
                Box::pin(async move { Ok(delta(json!({"recovered_from": seen}))) })
            }))
            .set_entry_point("risky")
            .add_edge("risky", END)
            .add_edge("recover", END)
            .add_failure_edge("risky", "recover")
            .compile()
            .unwrap();

        let out = graph.run(&ctx(), State::new()).await.unwrap();
        assert_eq!(out.get_str(FAILED_NODE_KEY), Some("risky"));
        assert_eq!(out.get_str("recovered_from"), Some("boom"));
    }

    // Bounded self-retry: a handler that never succeeds executes exactly
    // max_attempts times, then the engine forces the exhausted transition.
    #[tokio::test]
    async fn self_retry_capped_by_engine() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in_node = calls.clone();

        let graph = GraphBuilder::new()
            .add_node("call_model", node_fn(move |_ctx, _state| {
                let calls = calls_in_node.clone();
                Box::pin(async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(delta(json!({"ok": false})))
                })
            }))
            .add_node("give_up", node_fn(|_ctx, _state| {
                Box::pin(async { Ok(delta(json!({"outcome": "gave_up"}))) })
            }))
            .set_entry_point("call_model")
            .add_retry_edges(
                "call_model",
                |state: &State| {
                    if state.get_bool("ok").unwrap_or(false) {
                        Target::End
                    } else {
                        Target::node("call_model")
                    }
                },
                [Target::node("call_model"), Target::node("give_up"), Target::End],
                RetryPolicy::new(3, "give_up"),
            )
            .add_edge("give_up", END)
            .compile()
            .unwrap();

        let out = graph.run(&ctx(), State::new()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3, "a 4th execution must never happen");
        assert_eq!(out.get_str("outcome"), Some("gave_up"));
    }

    // A retrying node that eventually succeeds advances normally.
    #[tokio::test]
    async fn self_retry_stops_when_router_advances() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in_node = calls.clone();

        let graph = GraphBuilder::new()
            .add_node("verify", node_fn(move |_ctx, _state| {
                let calls = calls_in_node.clone();
                Box::pin(async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    Ok(delta(json!({"ok": n >= 2})))
                })
            }))
            .add_node("report", node_fn(|_ctx, _state| {
                Box::pin(async { Ok(delta(json!({"outcome": "fixed"}))) })
            }))
            .set_entry_point("verify")
            .add_retry_edges(
                "verify",
                |state: &State| {
                    if state.get_bool("ok").unwrap_or(false) {
                        Target::node("report")
                    } else {
                        Target::node("verify")
                    }
                },
                [Target::node("verify"), Target::node("report")],
                RetryPolicy::new(3, "report"),
            )
            .add_edge("report", END)
            .compile()
            .unwrap();

        let out = graph.run(&ctx(), State::new()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(out.get_str("outcome"), Some("fixed"));
    }

    // A cycle with no working exit hits the step ceiling.
    #[tokio::test]
    async fn step_ceiling_aborts_runaway_cycle() {
        let graph = GraphBuilder::new()
            .add_node("ping", node_fn(|_ctx, _state| {
                Box::pin(async { Ok(delta(json!({}))) })
            }))
            .add_node("pong", node_fn(|_ctx, _state| {
                Box::pin(async { Ok(delta(json!({}))) })
            }))
            .set_entry_point("ping")
            .add_edge("ping", "pong")
            .add_edge("pong", "ping")
            .with_config(EngineConfig { max_steps: 7 })
            .compile()
            .unwrap();

        let err = graph.run(&ctx(), State::new()).await.unwrap_err();
        assert!(matches!(err, GraphError::StepLimitExceeded { limit: 7, .. }));
    }

    // Monotonic accumulation: a key written by the first node is unchanged
    // at the third unless the second overwrote it.
    #[tokio::test]
    async fn state_accumulation_is_monotonic() {
        let graph = GraphBuilder::new()
            .add_node("a", node_fn(|_ctx, _state| {
                Box::pin(async { Ok(delta(json!({"kept": "from_a", "clobbered": "from_a"}))) })
            }))
            .add_node("b", node_fn(|_ctx, _state| {
                Box::pin(async { Ok(delta(json!({"clobbered": "from_b"}))) })
            }))
            .add_node("c", node_fn(|_ctx, state| {
                let kept = state.get_str("kept").unwrap_or("").to_string();
                let clobbered = state.get_str("clobbered").unwrap_or("").to_string();
                Box::pin(async move { Ok(delta(json!({"saw": [kept, clobbered]}))) })
            }))
            .set_entry_point("a")
            .add_edge("a", "b")
            .add_edge("b", "c")
            .add_edge("c", END)
            .compile()
            .unwrap();

        let out = graph.run(&ctx(), State::new()).await.unwrap();
        assert_eq!(out.get("saw"), Some(&json!(["from_a", "from_b"])));
    }

    #[tokio::test]
    async fn cancellation_aborts_between_steps() {
        let cancel = Arc::new(AtomicBool::new(false));
        let flag = cancel.clone();

        let graph = GraphBuilder::new()
            .add_node("first", node_fn(move |_ctx, _state| {
                let flag = flag.clone();
                Box::pin(async move {
                    // Request cancellation mid-run; the engine notices
                    // before the next node executes.
                    flag.store(true, Ordering::Relaxed);
                    Ok(delta(json!({"first": true})))
                })
            }))
            .add_node("second", node_fn(|_ctx, _state| {
                Box::pin(async { Ok(delta(json!({"second": true}))) })
            }))
            .set_entry_point("first")
            .add_edge("first", "second")
            .add_edge("second", END)
            .compile()
            .unwrap();

        let ctx = GraphCtx::builder().cancellation(cancel).build();
        let err = graph.run(&ctx, State::new()).await.unwrap_err();
        assert!(matches!(err, GraphError::Cancelled));
    }

    // Fallback branch: chosen by inspecting the node's own result.
    #[tokio::test]
    async fn fallback_branch_on_empty_result() {
        let graph = GraphBuilder::new()
            .add_node("plan", node_fn(|_ctx, _state| {
                Box::pin(async { Ok(delta(json!({"tasks": [], "status": "plan_failed"}))) })
            }))
            .add_node("fallback_plan", node_fn(|_ctx, _state| {
                Box::pin(async { Ok(delta(json!({"tasks": ["manual"], "status": "planned_fallback"}))) })
            }))
            .add_node("store", node_fn(|_ctx, _state| {
                Box::pin(async { Ok(delta(json!({"stored": true}))) })
            }))
            .set_entry_point("plan")
            .add_conditional_edges(
                "plan",
                |state: &State| {
                    if state.has_payload("tasks") {
                        Target::node("store")
                    } else {
                        Target::node("fallback_plan")
                    }
                },
                ["store", "fallback_plan"],
            )
            .add_edge("fallback_plan", "store")
            .add_edge("store", END)
            .compile()
            .unwrap();

        let out = graph.run(&ctx(), State::new()).await.unwrap();
        assert_eq!(out.get_str("status"), Some("planned_fallback"));
        assert_eq!(out.get("stored"), Some(&json!(true)));
    }

    // The compiled graph is shared read-only across concurrent invocations,
    // each with independent state.
    #[tokio::test]
    async fn concurrent_invocations_are_isolated() {
        let graph = GraphBuilder::new()
            .add_node("double", node_fn(|_ctx, state| {
                let n = state.get_i64("n").unwrap_or(0);
                Box::pin(async move { Ok(delta(json!({"doubled": n * 2}))) })
            }))
            .set_entry_point("double")
            .add_edge("double", END)
            .compile()
            .unwrap();

        let ctx = ctx();
        let runs = (0..8).map(|n| {
            let graph = graph.clone();
            let ctx = &ctx;
            async move {
                graph
                    .run(ctx, State::from_value(json!({"n": n})))
                    .await
                    .unwrap()
            }
        });

        let outputs = futures::future::join_all(runs).await;
        for (n, out) in outputs.iter().enumerate() {
            assert_eq!(out.get_i64("doubled"), Some(n as i64 * 2));
        }
    }

    #[tokio::test]
    async fn events_trace_one_invocation() {
        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler: Arc<dyn EventHandler> = Arc::new(FnEventHandler(move |event: Event| {
            let tag = match event {
                Event::RunStart { .. } => "run_start".to_string(),
                Event::NodeStart { node, .. } => format!("start:{node}"),
                Event::NodeEnd { node, ok } => format!("end:{node}:{ok}"),
                Event::RunEnd { status, .. } => format!("run_end:{status:?}"),
                _ => return,
            };
            sink.lock().unwrap().push(tag);
        }));

        let graph = GraphBuilder::new()
            .add_node("a", node_fn(|_ctx, _state| {
                Box::pin(async { Ok(delta(json!({}))) })
            }))
            .set_entry_point("a")
            .add_edge("a", END)
            .compile()
            .unwrap();

        let ctx = GraphCtx::builder().event_handler(handler).build();
        graph.run(&ctx, State::new()).await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec!["run_start", "start:a", "end:a:true", "run_end:Completed"]
        );
    }
}
