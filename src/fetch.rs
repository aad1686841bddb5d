//! Outbound HTTP layer.
//!
//! The `Fetcher` trait is the seam the pipeline depends on; `HttpFetcher`
//! is the reqwest-backed implementation and `RateLimitedFetcher` wraps
//! any fetcher with a request-rate ceiling using the governor crate.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use tracing::debug;

use crate::error::{FetchError, FetchResult};

/// Browser-style identity; several of the target sites serve bot
/// responses to default client user agents.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";
const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9,ja;q=0.8";

/// Bodies smaller than this are treated as block pages or errors.
const MIN_BODY_BYTES: usize = 100;

/// Per-request options.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Overall request time budget.
    pub timeout_ms: u64,

    /// Referer header value, when the site expects one.
    pub referer: Option<String>,
}

impl FetchOptions {
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            timeout_ms,
            referer: None,
        }
    }

    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }
}

/// A fetched HTML page.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL after redirects.
    pub final_url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

/// Outbound page fetching.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch a page, following redirects.
    async fn fetch(&self, url: &str, options: &FetchOptions) -> FetchResult<FetchedPage>;
}

/// reqwest-backed fetcher with browser-like headers.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpFetcher {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(10))
            .gzip(true)
            .brotli(true)
            .build()
            .unwrap_or_default();
        Self { client }
    }

    /// Use an externally configured client (proxies, cookie store).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, options: &FetchOptions) -> FetchResult<FetchedPage> {
        if url::Url::parse(url).is_err() {
            return Err(FetchError::InvalidUrl {
                url: url.to_string(),
            });
        }

        let mut request = self
            .client
            .get(url)
            .timeout(Duration::from_millis(options.timeout_ms))
            .header(reqwest::header::ACCEPT, ACCEPT)
            .header(reqwest::header::ACCEPT_LANGUAGE, ACCEPT_LANGUAGE);
        if let Some(referer) = &options.referer {
            request = request.header(reqwest::header::REFERER, referer.as_str());
        }

        let response = request.send().await.map_err(|err| {
            if err.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                    timeout_ms: options.timeout_ms,
                }
            } else {
                FetchError::Network {
                    url: url.to_string(),
                    source: Box::new(err),
                }
            }
        })?;

        let status = response.status();
        let final_url = response.url().to_string();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: final_url,
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        if let Some(ct) = &content_type {
            let ct = ct.to_lowercase();
            if !ct.contains("html") && !ct.contains("xml") {
                return Err(FetchError::ContentType {
                    url: final_url,
                    content_type,
                });
            }
        }

        let body = response.text().await.map_err(|err| {
            if err.is_timeout() {
                FetchError::Timeout {
                    url: final_url.clone(),
                    timeout_ms: options.timeout_ms,
                }
            } else {
                FetchError::Network {
                    url: final_url.clone(),
                    source: Box::new(err),
                }
            }
        })?;

        if body.trim().len() < MIN_BODY_BYTES {
            return Err(FetchError::EmptyBody {
                url: final_url,
                length: body.len(),
            });
        }

        debug!(url = %final_url, status = status.as_u16(), bytes = body.len(), "fetched page");
        Ok(FetchedPage {
            final_url,
            status: status.as_u16(),
            content_type,
            body,
        })
    }
}

type DirectRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// A fetcher wrapper that enforces a requests-per-second ceiling.
pub struct RateLimitedFetcher<F: Fetcher> {
    inner: F,
    limiter: Arc<DirectRateLimiter>,
}

impl<F: Fetcher> RateLimitedFetcher<F> {
    /// Wrap `fetcher` with a sustained per-second rate.
    pub fn new(fetcher: F, requests_per_second: u32) -> Self {
        let quota = Quota::per_second(
            NonZeroU32::new(requests_per_second).expect("requests_per_second must be > 0"),
        );
        Self {
            inner: fetcher,
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    /// Wrap with a custom quota (burst support).
    pub fn with_quota(fetcher: F, quota: Quota) -> Self {
        Self {
            inner: fetcher,
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }
}

#[async_trait]
impl<F: Fetcher> Fetcher for RateLimitedFetcher<F> {
    async fn fetch(&self, url: &str, options: &FetchOptions) -> FetchResult<FetchedPage> {
        self.limiter.until_ready().await;
        self.inner.fetch(url, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockFetcher;

    #[tokio::test]
    async fn test_invalid_url_rejected_without_network() {
        let fetcher = HttpFetcher::new();
        let err = fetcher
            .fetch("not a url", &FetchOptions::new(1000))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));
    }

    #[tokio::test]
    async fn test_rate_limited_wrapper_delegates() {
        let mock = MockFetcher::new().with_page("https://x.com/a", "<html><body>ok</body></html>");
        let fetcher = RateLimitedFetcher::new(mock, 100);

        let page = fetcher
            .fetch("https://x.com/a", &FetchOptions::new(1000))
            .await
            .unwrap();
        assert!(page.body.contains("ok"));
    }
}
