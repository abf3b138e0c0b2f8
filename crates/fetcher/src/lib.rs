/// Fixture Sync — Fetcher
/// One logical "get page": host politeness, bounded retries, typed failure.
///
/// Retried: timeouts, connection errors, 408/425/429, 5xx.
/// Not retried: every other non-2xx (404 is how the site says "no such round").

pub mod cancel;
pub mod limiter;
pub mod transport;

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};

pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use limiter::HostLimiter;
pub use transport::{HttpTransport, RawResponse, Transport, TransportError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub url:    String,
    pub status: u16,
    pub body:   String,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchFailure {
    #[error("{url}: gave up after {attempts} attempts ({last_error})")]
    TransientExhausted { url: String, attempts: u32, last_error: String },
    #[error("{url}: HTTP {status}")]
    NonRetryable { url: String, status: u16 },
    #[error("{url}: cancelled")]
    Cancelled { url: String },
}

impl FetchFailure {
    pub fn url(&self) -> &str {
        match self {
            FetchFailure::TransientExhausted { url, .. }
            | FetchFailure::NonRetryable { url, .. }
            | FetchFailure::Cancelled { url } => url,
        }
    }

    pub fn is_non_retryable(&self) -> bool {
        matches!(self, FetchFailure::NonRetryable { .. })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub delay:       Duration,
}

impl RetryPolicy {
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 3, delay: Duration::from_secs(2) }
    }
}

fn is_transient_status(status: u16) -> bool {
    matches!(status, 408 | 425 | 429 | 500..=599)
}

pub struct Fetcher<T = HttpTransport> {
    transport: T,
    limiter:   Arc<HostLimiter>,
    policy:    RetryPolicy,
    cancel:    CancelSignal,
}

impl<T: Transport> Fetcher<T> {
    pub fn new(transport: T, limiter: Arc<HostLimiter>, policy: RetryPolicy, cancel: CancelSignal) -> Self {
        Self { transport, limiter, policy, cancel }
    }

    pub fn cancel_signal(&self) -> &CancelSignal {
        &self.cancel
    }

    pub async fn fetch(&self, url: &str) -> Result<Page, FetchFailure> {
        let attempts = self.policy.max_attempts();
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            if !self.limiter.acquire(url, &self.cancel).await || self.cancel.is_cancelled() {
                return Err(FetchFailure::Cancelled { url: url.to_string() });
            }

            debug!(url, attempt, "GET");
            match self.transport.get(url).await {
                Ok(resp) if (200..300).contains(&resp.status) => {
                    return Ok(Page { url: url.to_string(), status: resp.status, body: resp.body });
                }
                Ok(resp) if is_transient_status(resp.status) => {
                    last_error = format!("HTTP {}", resp.status);
                }
                Ok(resp) => {
                    debug!(url, status = resp.status, "non-retryable response");
                    return Err(FetchFailure::NonRetryable { url: url.to_string(), status: resp.status });
                }
                Err(e) => last_error = e.to_string(),
            }

            if attempt < attempts {
                warn!("Request to {} failed: {}. Retrying ({}/{})...", url, last_error, attempt, self.policy.max_retries);
                if !self.cancel.sleep(self.policy.delay).await {
                    return Err(FetchFailure::Cancelled { url: url.to_string() });
                }
            }
        }

        error!("Request to {} failed after {} attempts: {}", url, attempts, last_error);
        Err(FetchFailure::TransientExhausted { url: url.to_string(), attempts, last_error })
    }
}
