use std::future::Future;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body:   String,
}

/// Network-level failures. All of them count as transient.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request failed: {0}")]
    Other(String),
}

/// One GET, no retries. The retry loop lives in [`crate::Fetcher`].
pub trait Transport: Send + Sync {
    fn get(&self, url: &str) -> impl Future<Output = Result<RawResponse, TransportError>> + Send;
}

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36")
            .timeout(timeout)
            .connect_timeout(timeout)
            .gzip(true)
            .build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<RawResponse, TransportError> {
        let resp = self.client.get(url).send().await.map_err(map_reqwest)?;
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(map_reqwest)?;
        Ok(RawResponse { status, body })
    }
}

fn map_reqwest(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else {
        TransportError::Other(e.to_string())
    }
}
