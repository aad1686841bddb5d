//! Testing utilities including mock implementations.
//!
//! These are useful for testing applications that use the extraction
//! library without making real network calls.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::error::{FetchError, FetchResult};
use crate::fetch::{FetchOptions, FetchedPage, Fetcher};

/// A mock fetcher for testing.
///
/// Returns deterministic, configurable responses keyed by URL and
/// records every call for assertions.
#[derive(Default, Clone)]
pub struct MockFetcher {
    /// Predefined page bodies by URL
    pages: Arc<RwLock<HashMap<String, String>>>,

    /// URLs that fail, with the error kind to raise and how many calls
    /// it applies to (`None` = every call)
    failures: Arc<RwLock<HashMap<String, (MockFailure, Option<u32>)>>>,

    /// Redirect targets by URL (final_url differs from requested)
    redirects: Arc<RwLock<HashMap<String, String>>>,

    /// Artificial latency applied to every fetch
    delay: Arc<RwLock<Option<Duration>>>,

    /// Call tracking for assertions
    calls: Arc<RwLock<Vec<MockFetchCall>>>,
}

/// Failure kinds the mock can raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    Timeout,
    Status(u16),
    EmptyBody,
    NotHtml,
}

/// Record of a call made to the mock fetcher.
#[derive(Debug, Clone)]
pub struct MockFetchCall {
    pub url: String,
    pub referer: Option<String>,
}

impl MockFetcher {
    /// Create a new mock fetcher with no configured pages.
    ///
    /// Fetching an unconfigured URL raises `FetchError::Status { 404 }`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for `url`.
    pub fn with_page(self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.pages.write().unwrap().insert(url.into(), body.into());
        self
    }

    /// Raise `failure` for every fetch of `url`.
    pub fn with_failure(self, url: impl Into<String>, failure: MockFailure) -> Self {
        self.failures
            .write()
            .unwrap()
            .insert(url.into(), (failure, None));
        self
    }

    /// Raise `failure` for the first `times` fetches of `url`, then
    /// serve the configured page.
    pub fn failing_times(self, url: impl Into<String>, failure: MockFailure, times: u32) -> Self {
        self.failures
            .write()
            .unwrap()
            .insert(url.into(), (failure, Some(times)));
        self
    }

    /// Report `final_url` for `url` after a simulated redirect.
    pub fn with_redirect(self, url: impl Into<String>, final_url: impl Into<String>) -> Self {
        self.redirects
            .write()
            .unwrap()
            .insert(url.into(), final_url.into());
        self
    }

    /// Apply a fixed delay to every fetch.
    pub fn with_delay(self, delay: Duration) -> Self {
        *self.delay.write().unwrap() = Some(delay);
        self
    }

    /// Replace the body served for a URL after construction.
    pub fn set_page(&self, url: impl Into<String>, body: impl Into<String>) {
        self.pages.write().unwrap().insert(url.into(), body.into());
    }

    /// Clear a configured failure so later fetches of the URL succeed.
    pub fn clear_failure(&self, url: &str) {
        self.failures.write().unwrap().remove(url);
    }

    /// All calls made so far.
    pub fn calls(&self) -> Vec<MockFetchCall> {
        self.calls.read().unwrap().clone()
    }

    /// Number of fetches issued for a specific URL.
    pub fn call_count(&self, url: &str) -> usize {
        self.calls
            .read()
            .unwrap()
            .iter()
            .filter(|c| c.url == url)
            .count()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str, options: &FetchOptions) -> FetchResult<FetchedPage> {
        self.calls.write().unwrap().push(MockFetchCall {
            url: url.to_string(),
            referer: options.referer.clone(),
        });

        let delay = *self.delay.read().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = {
            let mut failures = self.failures.write().unwrap();
            match failures.get_mut(url) {
                Some((failure, None)) => Some(*failure),
                Some((failure, Some(remaining))) => {
                    let failure = *failure;
                    *remaining -= 1;
                    if *remaining == 0 {
                        failures.remove(url);
                    }
                    Some(failure)
                }
                None => None,
            }
        };
        if let Some(failure) = failure {
            return Err(match failure {
                MockFailure::Timeout => FetchError::Timeout {
                    url: url.to_string(),
                    timeout_ms: options.timeout_ms,
                },
                MockFailure::Status(status) => FetchError::Status {
                    url: url.to_string(),
                    status,
                },
                MockFailure::EmptyBody => FetchError::EmptyBody {
                    url: url.to_string(),
                    length: 0,
                },
                MockFailure::NotHtml => FetchError::ContentType {
                    url: url.to_string(),
                    content_type: Some("application/octet-stream".into()),
                },
            });
        }

        let body = self.pages.read().unwrap().get(url).cloned();
        let Some(body) = body else {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            });
        };

        let final_url = self
            .redirects
            .read()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or_else(|| url.to_string());

        Ok(FetchedPage {
            final_url,
            status: 200,
            content_type: Some("text/html; charset=utf-8".into()),
            body,
        })
    }
}

/// Minimal search-page HTML with the given anchors in the body.
pub fn search_page_html(anchors: &[(&str, &str)]) -> String {
    let links: String = anchors
        .iter()
        .map(|(href, text)| format!(r#"<a href="{href}">{text}</a>"#))
        .collect();
    format!("<html><head><title>search</title></head><body>{links}</body></html>")
}

/// Minimal detail-page HTML with a title, a code-bearing heading, and
/// an optional magnet anchor.
pub fn detail_page_html(title: &str, magnet: Option<&str>) -> String {
    let magnet = magnet
        .map(|m| format!(r#"<a href="{m}">{title}</a>"#))
        .unwrap_or_default();
    format!(
        "<html><head><title>{title}</title></head><body><h1>{title}</h1>{magnet}</body></html>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_serves_configured_pages() {
        let mock = MockFetcher::new().with_page("https://x.com/a", "<html>a</html>");

        let page = mock
            .fetch("https://x.com/a", &FetchOptions::new(1000))
            .await
            .unwrap();
        assert_eq!(page.final_url, "https://x.com/a");
        assert_eq!(page.body, "<html>a</html>");

        let err = mock
            .fetch("https://x.com/missing", &FetchOptions::new(1000))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_mock_records_calls() {
        let mock = MockFetcher::new().with_page("https://x.com/a", "x");
        let options = FetchOptions::new(1000).with_referer("https://x.com/");
        mock.fetch("https://x.com/a", &options).await.unwrap();
        mock.fetch("https://x.com/a", &FetchOptions::new(1000))
            .await
            .unwrap();

        assert_eq!(mock.call_count("https://x.com/a"), 2);
        assert_eq!(mock.calls()[0].referer.as_deref(), Some("https://x.com/"));
    }

    #[tokio::test]
    async fn test_mock_failures() {
        let mock = MockFetcher::new()
            .with_failure("https://x.com/t", MockFailure::Timeout)
            .with_failure("https://x.com/e", MockFailure::EmptyBody);

        assert!(matches!(
            mock.fetch("https://x.com/t", &FetchOptions::new(5)).await,
            Err(FetchError::Timeout { timeout_ms: 5, .. })
        ));
        assert!(matches!(
            mock.fetch("https://x.com/e", &FetchOptions::new(5)).await,
            Err(FetchError::EmptyBody { .. })
        ));

        mock.clear_failure("https://x.com/t");
        mock.set_page("https://x.com/t", "recovered");
        assert!(mock
            .fetch("https://x.com/t", &FetchOptions::new(5))
            .await
            .is_ok());
    }
}
