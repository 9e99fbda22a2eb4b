//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - GET requests for listing and detail pages
//! - Retry logic for transient failures
//! - Error classification

use crate::config::Config;
use crate::crawler::rate_limit::{RateLimiter, RequestKind};
use crate::crawler::retry::RetryPolicy;
use crate::FetchError;
use reqwest::{redirect::Policy, Client};
use std::sync::Arc;
use std::time::Duration;

/// A successfully fetched page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// HTTP status code
    pub status: u16,
    /// Page body content
    pub body: String,
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The crawler configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &Config) -> Result<Client, reqwest::Error> {
    // Format: CrawlerName/Version (+ContactURL; ContactEmail)
    let user_agent = config.user_agent.header_value();

    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(config.fetcher.timeout_secs))
        .connect_timeout(Duration::from_secs(config.fetcher.connect_timeout_secs))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches pages with pacing and retries
///
/// Cheap to clone; clones share the HTTP connection pool and the rate limiter.
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | HTTP 4xx | Immediate → `FetchError::Http` |
/// | HTTP 5xx | Retry with backoff, then `FetchError::Http` |
/// | Timeout | Retry with backoff, then `FetchError::Timeout` |
/// | Connection failure | Retry with backoff, then `FetchError::Connection` |
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    policy: RetryPolicy,
    limiter: Arc<RateLimiter>,
}

impl Fetcher {
    pub fn new(client: Client, policy: RetryPolicy, limiter: Arc<RateLimiter>) -> Self {
        Self {
            client,
            policy,
            limiter,
        }
    }

    /// Builds a fetcher from the configuration
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let client = build_http_client(config)?;
        Ok(Self::new(
            client,
            RetryPolicy::from_config(&config.fetcher),
            Arc::new(RateLimiter::new(config.rate_limit.clone())),
        ))
    }

    pub async fn fetch_listing(&self, url: &str) -> Result<FetchedPage, FetchError> {
        self.fetch(url, RequestKind::Listing).await
    }

    pub async fn fetch_record(&self, url: &str) -> Result<FetchedPage, FetchError> {
        self.fetch(url, RequestKind::Record).await
    }

    /// Fetches a URL, retrying transient failures per the retry policy
    ///
    /// Every attempt, including retries, waits on the rate limiter first.
    pub async fn fetch(&self, url: &str, kind: RequestKind) -> Result<FetchedPage, FetchError> {
        let mut attempt = 0;
        loop {
            self.limiter.wait(kind).await;

            match self.fetch_once(url).await {
                Ok(page) => return Ok(page),
                Err(e) if e.is_transient() && self.policy.should_retry(attempt) => {
                    let delay = self.policy.delay(attempt);
                    tracing::warn!(
                        "Attempt {}/{} for {} failed ({}), retrying in {:?}",
                        attempt + 1,
                        self.policy.max_attempts(),
                        url,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::debug!("Giving up on {} after {} attempt(s): {}", url, attempt + 1, e);
                    return Err(e);
                }
            }
        }
    }

    async fn fetch_once(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| classify_error(url, e))?;

        Ok(FetchedPage {
            status: status.as_u16(),
            body,
        })
    }
}

/// Maps a transport-level reqwest error onto the fetch error taxonomy
fn classify_error(url: &str, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Connection {
            url: url.to_string(),
            message: e.to_string(),
        }
    }
}
