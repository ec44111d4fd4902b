//! HTTP language-model client.
//!
//! [`HttpModelClient`] talks to any OpenAI-compatible chat-completions
//! endpoint (hosted APIs, vLLM, llama.cpp server, Ollama's `/v1/`), with
//! optional transport-level retry via [`BackoffConfig`].

use super::backoff::BackoffConfig;
use super::{is_retryable, ModelClient, ModelRequest};
use crate::error::Result;
use crate::GraphError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

/// A [`ModelClient`] over an OpenAI-compatible `/v1/chat/completions`
/// endpoint.
///
/// # Example
///
/// ```
/// use agent_graph::clients::{BackoffConfig, HttpModelClient};
///
/// let client = HttpModelClient::new("https://api.example.com", "small-planner")
///     .with_api_key("sk-...")
///     .with_backoff(BackoffConfig::standard());
/// ```
pub struct HttpModelClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    backoff: BackoffConfig,
}

impl HttpModelClient {
    /// Create a client for the given provider base URL and model id.
    ///
    /// The built-in HTTP client uses a 60 second request timeout; supply
    /// your own via [`with_client`](Self::with_client) to change it.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: None,
            backoff: BackoffConfig::none(),
        }
    }

    /// Set the API key, sent as `Authorization: Bearer {key}`.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the transport retry configuration. Default: no retry.
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    /// Use a custom HTTP client (connection pool, proxy, timeout).
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    fn build_body(&self, request: &ModelRequest) -> Value {
        let mut messages = Vec::new();
        if let Some(ref system) = request.system {
            if !system.is_empty() {
                messages.push(json!({"role": "system", "content": system}));
            }
        }
        messages.push(json!({"role": "user", "content": request.prompt}));

        json!({
            "model": self.model,
            "messages": messages,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
            "stream": false,
        })
    }

    async fn send_once(&self, body: &Value) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let mut req = self.client.post(&url).json(body);
        if let Some(ref key) = self.api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        let resp = req.send().await?;
        let status = resp.status().as_u16();

        if !resp.status().is_success() {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            let body = resp.text().await.unwrap_or_default();
            return Err(GraphError::Http {
                status,
                body,
                retry_after,
            });
        }

        let json_resp: Value = resp.json().await?;
        let text = json_resp
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        Ok(text)
    }
}

impl std::fmt::Debug for HttpModelClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpModelClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("has_api_key", &self.api_key.is_some())
            .field("max_retries", &self.backoff.max_retries)
            .finish()
    }
}

#[async_trait]
impl ModelClient for HttpModelClient {
    async fn complete(&self, request: &ModelRequest) -> Result<String> {
        let body = self.build_body(request);
        let mut last_error: Option<GraphError> = None;

        for attempt in 0..=self.backoff.max_retries {
            if attempt > 0 {
                let delay = match &last_error {
                    Some(GraphError::Http {
                        retry_after: Some(ra),
                        ..
                    }) if self.backoff.respect_retry_after => *ra,
                    _ => self.backoff.delay_for_attempt(attempt - 1),
                };
                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %last_error.as_ref().map(ToString::to_string).unwrap_or_default(),
                    "retrying model call after transient failure"
                );
                tokio::time::sleep(delay).await;
            }

            match self.send_once(&body).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    if attempt < self.backoff.max_retries && is_retryable(&e, &self.backoff) {
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_error.unwrap_or(GraphError::Other("retry loop exited unexpectedly".into())))
    }

    fn name(&self) -> &'static str {
        "http-chat-completions"
    }
}

/// Parse a `Retry-After` header value as seconds.
fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
