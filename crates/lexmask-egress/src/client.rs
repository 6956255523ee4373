//! Shared HTTP client utilities

use crate::{EgressError, Result};
use reqwest::{Client, ClientBuilder};
use std::time::Duration;
use tracing::{debug, warn};

/// Upper bound on a server-requested retry delay
const MAX_RETRY_AFTER_SECS: u64 = 10;

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,

    /// Maximum number of idle connections per host
    pub pool_max_idle_per_host: usize,

    /// Maximum number of retries for transient errors
    pub max_retries: u32,

    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            connect_timeout_secs: 5,
            pool_max_idle_per_host: 16,
            max_retries: 2,
            user_agent: format!("LexMask/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    /// Config with the given request timeout
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// Create a configured HTTP client with connection pooling
pub fn create_client(config: &HttpClientConfig) -> Result<Client> {
    ClientBuilder::new()
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        // expire idle connections before the inference server drops them
        .pool_idle_timeout(Duration::from_secs(90))
        .user_agent(&config.user_agent)
        .tcp_keepalive(Duration::from_secs(60))
        .build()
        .map_err(|e| EgressError::ConfigError(format!("Failed to create HTTP client: {}", e)))
}

/// Map a send failure, keeping timeouts distinct
pub(crate) fn send_error(err: reqwest::Error, timeout_secs: u64) -> EgressError {
    if err.is_timeout() {
        EgressError::Timeout(timeout_secs)
    } else {
        EgressError::HttpError(err)
    }
}

/// Retry policy for transient errors
pub async fn with_retry<F, Fut, T>(max_retries: u32, operation: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut last_error = None;
    let mut requested_delay: Option<u64> = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let backoff_ms = match requested_delay.take() {
                Some(secs) => secs.min(MAX_RETRY_AFTER_SECS) * 1000,
                None => 2u64.pow(attempt - 1) * 100,
            };
            debug!(
                "Retrying detector request after {}ms (attempt {}/{})",
                backoff_ms, attempt, max_retries
            );
            tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
        }

        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                let should_retry = match &e {
                    EgressError::HttpError(req_err) => req_err.is_connect() || req_err.is_request(),
                    EgressError::ProviderError { status_code, .. } => {
                        matches!(status_code, 500 | 502 | 504)
                    }
                    EgressError::Busy { retry_after_secs } => {
                        requested_delay = *retry_after_secs;
                        true
                    }
                    _ => false,
                };

                if should_retry && attempt < max_retries {
                    warn!(
                        "Detector request failed (attempt {}/{}): {}",
                        attempt + 1,
                        max_retries + 1,
                        e
                    );
                    last_error = Some(e);
                } else {
                    return Err(e);
                }
            }
        }
    }

    Err(last_error
        .unwrap_or_else(|| EgressError::ConfigError("Retry loop exited unexpectedly".to_string())))
}
