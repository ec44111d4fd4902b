//! Transport-level retry with exponential backoff and jitter.
//!
//! [`BackoffConfig`] controls how transient HTTP errors (429, 5xx) from a
//! collaborator are retried with increasing delays. This is transport
//! plumbing, independent of the graph-level retry edges — a model call may
//! be transport-retried inside one node execution.

use std::time::Duration;

/// Configuration for transport-level retry.
///
/// # Example
///
/// ```
/// use agent_graph::clients::BackoffConfig;
///
/// // No retry (the default)
/// let none = BackoffConfig::none();
/// assert_eq!(none.max_retries, 0);
///
/// // Sensible settings for hosted APIs
/// let standard = BackoffConfig::standard();
/// assert_eq!(standard.max_retries, 3);
/// ```
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Maximum number of transport retries. Default: 0 (no retry).
    pub max_retries: u32,

    /// Delay before the first retry. Default: 1 second.
    pub initial_delay: Duration,

    /// Multiplier applied after each retry. Default: 2.0.
    pub multiplier: f64,

    /// Cap on the delay between retries. Default: 60 seconds.
    pub max_delay: Duration,

    /// Jitter strategy. Default: [`JitterStrategy::Full`].
    pub jitter: JitterStrategy,

    /// HTTP status codes that trigger retry. Default: `[429, 500, 502, 503, 504]`.
    pub retryable_statuses: Vec<u16>,

    /// Whether to honor `Retry-After` headers over the computed delay.
    /// Default: `true`.
    pub respect_retry_after: bool,
}

/// Jitter applied to computed delays, so concurrent invocations sharing a
/// rate limit don't retry in lockstep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JitterStrategy {
    /// Delay is exactly the computed value.
    None,
    /// Random value in `[0, computed_delay]`.
    Full,
    /// `computed_delay/2` plus a random value in `[0, computed_delay/2]`.
    Equal,
}

impl BackoffConfig {
    /// No transport retry.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::standard()
        }
    }

    /// 3 retries, 1s initial delay, 2x multiplier, 60s cap, full jitter,
    /// honors `Retry-After`.
    pub fn standard() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(60),
            jitter: JitterStrategy::Full,
            retryable_statuses: vec![429, 500, 502, 503, 504],
            respect_retry_after: true,
        }
    }

    /// Delay for attempt N (0-indexed): `initial_delay * multiplier^N`,
    /// capped at `max_delay`, with jitter applied.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay.as_secs_f64());

        let jittered = match self.jitter {
            JitterStrategy::None => capped,
            JitterStrategy::Full => fastrand::f64() * capped,
            JitterStrategy::Equal => capped / 2.0 + fastrand::f64() * (capped / 2.0),
        };

        Duration::from_secs_f64(jittered)
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self::none()
    }
}
