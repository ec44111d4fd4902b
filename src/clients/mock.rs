//! Mock collaborators for testing without live services.
//!
//! [`MockModel`] returns pre-configured responses in order, and
//! [`RecordingSourceControl`] logs every operation it receives, allowing
//! downstream consumers to write deterministic workflow tests.

use super::{ModelClient, ModelRequest, SourceControl};
use crate::error::Result;
use crate::GraphError;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// A test model that returns canned responses in order.
///
/// Cycles back to the beginning when all responses have been consumed.
///
/// # Example
///
/// ```
/// use agent_graph::clients::MockModel;
///
/// let model = MockModel::new(vec![
///     r#"{"ok": false}"#.to_string(),
///     r#"{"ok": true}"#.to_string(),
/// ]);
/// ```
#[derive(Debug)]
pub struct MockModel {
    responses: Vec<String>,
    index: AtomicUsize,
}

impl MockModel {
    /// Create a mock with the given canned responses.
    ///
    /// Responses are returned in order; when exhausted, cycles from the
    /// beginning.
    pub fn new(responses: Vec<String>) -> Self {
        assert!(!responses.is_empty(), "MockModel requires at least one response");
        Self {
            responses,
            index: AtomicUsize::new(0),
        }
    }

    /// A mock that always returns the same response.
    pub fn fixed(response: impl Into<String>) -> Self {
        Self::new(vec![response.into()])
    }

    /// Number of completions served so far.
    pub fn calls(&self) -> usize {
        self.index.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ModelClient for MockModel {
    async fn complete(&self, _request: &ModelRequest) -> Result<String> {
        let idx = self.index.fetch_add(1, Ordering::Relaxed) % self.responses.len();
        Ok(self.responses[idx].clone())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// A model that fails every call, for exercising fallback and failure
/// branches.
#[derive(Debug)]
pub struct FailingModel {
    message: String,
}

impl FailingModel {
    /// Fail every completion with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl ModelClient for FailingModel {
    async fn complete(&self, _request: &ModelRequest) -> Result<String> {
        Err(GraphError::Other(self.message.clone()))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// A [`SourceControl`] that records every operation and returns canned
/// success payloads.
#[derive(Debug, Default)]
pub struct RecordingSourceControl {
    ops: Mutex<Vec<String>>,
}

impl RecordingSourceControl {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// The operations received so far, in order, as `"op name"` strings.
    pub fn operations(&self) -> Vec<String> {
        self.ops
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn record(&self, op: String) {
        self.ops
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(op);
    }
}

#[async_trait]
impl SourceControl for RecordingSourceControl {
    async fn create_repository(&self, name: &str, _description: &str, private: bool) -> Result<Value> {
        self.record(format!("create_repository {}", name));
        Ok(json!({
            "name": name,
            "private": private,
            "html_url": format!("https://example.test/{}", name),
        }))
    }

    async fn put_file(&self, repo: &str, path: &str, _content: &str, _message: &str) -> Result<Value> {
        self.record(format!("put_file {}/{}", repo, path));
        Ok(json!({"content": {"path": path}}))
    }

    async fn create_branch(&self, repo: &str, branch: &str, from: &str) -> Result<Value> {
        self.record(format!("create_branch {}:{} from {}", repo, branch, from));
        Ok(json!({"ref": format!("refs/heads/{}", branch)}))
    }

    async fn list_repositories(&self) -> Result<Vec<Value>> {
        self.record("list_repositories".to_string());
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_cycles_responses() {
        let model = MockModel::new(vec!["first".into(), "second".into()]);
        let req = ModelRequest::new("x");

        assert_eq!(model.complete(&req).await.unwrap(), "first");
        assert_eq!(model.complete(&req).await.unwrap(), "second");
        assert_eq!(model.complete(&req).await.unwrap(), "first");
        assert_eq!(model.calls(), 3);
    }

    #[tokio::test]
    async fn failing_model_always_errors() {
        let model = FailingModel::new("model unavailable");
        let err = model.complete(&ModelRequest::new("x")).await.unwrap_err();
        assert!(err.to_string().contains("model unavailable"));
    }

    #[tokio::test]
    async fn recorder_logs_operations_in_order() {
        let sc = RecordingSourceControl::new();
        sc.create_repository("svc", "", false).await.unwrap();
        sc.put_file("svc", "README.md", "# svc", "init").await.unwrap();
        sc.create_branch("svc", "develop", "main").await.unwrap();

        assert_eq!(
            sc.operations(),
            vec![
                "create_repository svc",
                "put_file svc/README.md",
                "create_branch svc:develop from main",
            ]
        );
    }
}
