//! Collaborator capability traits and implementations.
//!
//! Node handlers reach the outside world through three narrow interfaces:
//! a language-model client, a source-control client, and a record store.
//! Concrete implementations are injected into
//! [`GraphCtx`](crate::ctx::GraphCtx) at build time, so the same graph
//! runs against live services in production and mocks in tests.
//!
//! ```text
//! handler ──► ctx.model()          ──► HttpModelClient │ MockModel
//!         ──► ctx.source_control() ──► GitHubClient    │ RecordingSourceControl
//!         ──► ctx.store()          ──► MemoryStore
//! ```

pub mod backoff;
pub mod github;
pub mod mock;
pub mod model;
pub mod store;

pub use backoff::{BackoffConfig, JitterStrategy};
pub use github::GitHubClient;
pub use mock::{FailingModel, MockModel, RecordingSourceControl};
pub use model::HttpModelClient;
pub use store::MemoryStore;

use crate::error::Result;
use crate::GraphError;
use async_trait::async_trait;
use serde_json::Value;

/// A request to the language-model collaborator.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    /// The user prompt text.
    pub prompt: String,
    /// Optional system prompt.
    pub system: Option<String>,
    /// Sampling temperature.
    pub temperature: f32,
    /// Completion token budget.
    pub max_tokens: u32,
}

impl ModelRequest {
    /// A request with the default sampling settings (temperature 0.2,
    /// 2048 tokens).
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            temperature: 0.2,
            max_tokens: 2048,
        }
    }

    /// Set the system prompt.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the completion token budget.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// The language-model collaborator: prompt in, text out.
///
/// The returned text is raw — callers expecting an encoded record run it
/// through [`repair`](crate::repair::repair).
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Execute one completion. May fail or time out; transport retry is an
    /// implementation concern.
    async fn complete(&self, request: &ModelRequest) -> Result<String>;

    /// Human-readable name for logging and diagnostics.
    fn name(&self) -> &'static str;
}

/// The source-control collaborator: repository, file, and branch
/// operations over HTTPS.
#[async_trait]
pub trait SourceControl: Send + Sync {
    /// Create a repository. Returns the provider's repository record.
    async fn create_repository(&self, name: &str, description: &str, private: bool) -> Result<Value>;

    /// Create or update a file on the default branch.
    async fn put_file(&self, repo: &str, path: &str, content: &str, message: &str) -> Result<Value>;

    /// Create a branch pointing at the head of `from`.
    async fn create_branch(&self, repo: &str, branch: &str, from: &str) -> Result<Value>;

    /// List repositories visible to the authenticated user.
    async fn list_repositories(&self) -> Result<Vec<Value>>;
}

/// The persistence collaborator: records by table name and key. Used to
/// load configuration (e.g. policy rules) and store final reports.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch a record, `None` when absent.
    async fn get(&self, table: &str, key: &str) -> Result<Option<Value>>;

    /// Write a record, overwriting any previous value under the key.
    async fn put(&self, table: &str, key: &str, record: Value) -> Result<()>;

    /// All records in a table.
    async fn scan(&self, table: &str) -> Result<Vec<Value>>;
}

/// Check whether an error is transient according to the backoff config.
///
/// Retryable conditions:
/// - [`GraphError::Http`] with a status in `config.retryable_statuses`
/// - [`GraphError::Request`] (connection/transport errors)
pub fn is_retryable(error: &GraphError, config: &BackoffConfig) -> bool {
    match error {
        GraphError::Http { status, .. } => config.retryable_statuses.contains(status),
        GraphError::Request(_) => true,
        _ => false,
    }
}
