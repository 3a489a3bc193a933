//! HTTP fetcher for page checks with rate limiting and error folding
//!
//! Reqwest-backed implementation of the `Fetcher` gateway. Transport
//! errors are folded into the engine's structured `FailureKind`
//! vocabulary so the failure classifier never sees raw client errors.
//! A token-bucket rate limiter caps requests per second across all
//! workers, independently of the batch concurrency bound.

use std::num::NonZeroU32;
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{Client, ClientBuilder};
use tracing::{debug, warn};
use url::Url;

use crate::domain::gateways::{FailureKind, FetchedPage, Fetcher};
use crate::infrastructure::config::HttpConfig;

/// HTTP client with built-in rate limiting and structured error folding.
pub struct HttpFetcher {
    client: Client,
    limiter: Option<DefaultDirectRateLimiter>,
    timeout_seconds: u64,
}

impl HttpFetcher {
    /// Create a fetcher from the engine's HTTP configuration.
    pub fn from_config(config: &HttpConfig) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .user_agent(&config.user_agent)
            .cookie_store(true)
            .gzip(true)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| anyhow!("Failed to create HTTP client: {}", e))?;

        let limiter = NonZeroU32::new(config.max_requests_per_second)
            .map(|rate| RateLimiter::direct(Quota::per_second(rate)));

        Ok(Self {
            client,
            limiter,
            timeout_seconds: config.request_timeout_seconds,
        })
    }

    /// Folds a transport error into the classifier's vocabulary.
    ///
    /// Reqwest nests the interesting cause (DNS, TLS, refused, reset)
    /// several sources deep, so the full chain is matched textually.
    fn fold_error(&self, url: &str, err: &reqwest::Error) -> FailureKind {
        if err.is_timeout() {
            return FailureKind::Timeout {
                seconds: self.timeout_seconds,
            };
        }

        let detail = error_chain(err);
        let lower = detail.to_lowercase();
        let host = host_of(url);

        if lower.contains("dns") || lower.contains("resolve") || lower.contains("no such host") {
            FailureKind::Dns { host }
        } else if lower.contains("certificate")
            || lower.contains("tls")
            || lower.contains("ssl")
            || lower.contains("handshake")
        {
            FailureKind::Tls { detail }
        } else if lower.contains("connection refused") {
            FailureKind::ConnectionRefused { host }
        } else if lower.contains("reset") || lower.contains("broken pipe") {
            FailureKind::ConnectionReset
        } else if err.is_builder() {
            FailureKind::InvalidInput { detail }
        } else {
            FailureKind::Other { detail }
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FailureKind> {
        let parsed = Url::parse(url).map_err(|e| FailureKind::InvalidInput {
            detail: format!("invalid URL '{url}': {e}"),
        })?;

        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }

        debug!("Fetching page: {}", parsed);
        let response = self
            .client
            .get(parsed.clone())
            .send()
            .await
            .map_err(|e| self.fold_error(url, &e))?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = response.text().await.map_err(|e| {
            warn!("Failed to read body from {}: {}", final_url, e);
            self.fold_error(url, &e)
        })?;

        Ok(FetchedPage {
            status,
            body,
            final_url,
        })
    }
}

/// Joins an error with its full source chain into one line.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        parts.push(cause.to_string());
        source = cause.source();
    }
    parts.join(": ")
}

fn host_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}
