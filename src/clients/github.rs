//! GitHub source-control client.
//!
//! [`GitHubClient`] implements [`SourceControl`] against the GitHub REST
//! API: repository creation, contents upload, branch creation, and
//! repository listing. Errors surface as
//! [`GraphError::Http`](crate::GraphError::Http) with the response body,
//! so callers can decide whether a 422 (already exists) is fatal.

use super::SourceControl;
use crate::error::Result;
use crate::GraphError;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::{Client, Method, RequestBuilder};
use serde_json::{json, Value};
use std::time::Duration;

const DEFAULT_API_BASE: &str = "https://api.github.com";

/// A [`SourceControl`] implementation over the GitHub REST API.
///
/// # Example
///
/// ```
/// use agent_graph::clients::GitHubClient;
///
/// let github = GitHubClient::new("acme-automation", "ghp_...");
/// ```
pub struct GitHubClient {
    client: Client,
    api_base: String,
    owner: String,
    token: String,
}

impl GitHubClient {
    /// Create a client for the given repository owner, authenticating with
    /// a personal access token.
    pub fn new(owner: impl Into<String>, token: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_base: DEFAULT_API_BASE.to_string(),
            owner: owner.into(),
            token: token.into(),
        }
    }

    /// Point at a different API base (GitHub Enterprise, test server).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    /// Use a custom HTTP client.
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.api_base, path))
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            // GitHub rejects requests without a User-Agent.
            .header("User-Agent", "agent-graph")
    }

    async fn send(&self, req: RequestBuilder) -> Result<Value> {
        let resp = req.send().await?;
        let status = resp.status().as_u16();

        if !resp.status().is_success() {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            let body = resp.text().await.unwrap_or_default();
            return Err(GraphError::Http {
                status,
                body,
                retry_after,
            });
        }

        Ok(resp.json().await?)
    }
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("api_base", &self.api_base)
            .field("owner", &self.owner)
            .finish()
    }
}

#[async_trait]
impl SourceControl for GitHubClient {
    async fn create_repository(&self, name: &str, description: &str, private: bool) -> Result<Value> {
        let body = json!({
            "name": name,
            "description": description,
            "private": private,
            "auto_init": true,
        });
        self.send(self.request(Method::POST, "/user/repos").json(&body))
            .await
    }

    async fn put_file(&self, repo: &str, path: &str, content: &str, message: &str) -> Result<Value> {
        let url = format!("/repos/{}/{}/contents/{}", self.owner, repo, path);
        let body = json!({
            "message": message,
            "content": BASE64.encode(content.as_bytes()),
        });
        self.send(self.request(Method::PUT, &url).json(&body)).await
    }

    async fn create_branch(&self, repo: &str, branch: &str, from: &str) -> Result<Value> {
        // Resolve the source branch head, then create the ref.
        let head_url = format!("/repos/{}/{}/git/ref/heads/{}", self.owner, repo, from);
        let head = self.send(self.request(Method::GET, &head_url)).await?;
        let sha = head
            .pointer("/object/sha")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                GraphError::Other(format!("branch '{}' in '{}' has no resolvable head", from, repo))
            })?;

        let refs_url = format!("/repos/{}/{}/git/refs", self.owner, repo);
        let body = json!({
            "ref": format!("refs/heads/{}", branch),
            "sha": sha,
        });
        self.send(self.request(Method::POST, &refs_url).json(&body))
            .await
    }

    async fn list_repositories(&self) -> Result<Vec<Value>> {
        let listing = self
            .send(self.request(Method::GET, "/user/repos?per_page=100&sort=updated"))
            .await?;
        match listing {
            Value::Array(repos) => Ok(repos),
            other => {
                let snippet: String = other.to_string().chars().take(120).collect();
                Err(GraphError::Other(format!(
                    "expected repository array, got: {}",
                    snippet
                )))
            }
        }
    }
}
