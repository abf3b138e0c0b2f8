//! Per-host politeness limiter shared by all workers. Adding workers does not
//! raise the request rate against a host.

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::time::Duration;

use crate::cancel::CancelSignal;

pub struct HostLimiter {
    inner: Option<DefaultKeyedRateLimiter<String>>,
}

impl HostLimiter {
    /// One request per `min_interval` per host. A zero interval disables limiting.
    pub fn new(min_interval: Duration) -> Self {
        Self {
            inner: Quota::with_period(min_interval).map(RateLimiter::keyed),
        }
    }

    pub fn unlimited() -> Self {
        Self { inner: None }
    }

    /// Wait for this URL's host slot. Returns false if cancelled while waiting.
    pub async fn acquire(&self, url: &str, cancel: &CancelSignal) -> bool {
        let Some(limiter) = &self.inner else {
            return !cancel.is_cancelled();
        };
        let host = host_of(url);
        tokio::select! {
            _ = limiter.until_key_ready(&host) => true,
            _ = cancel.cancelled() => false,
        }
    }
}

pub fn host_of(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_owned))
        .unwrap_or_default()
}
