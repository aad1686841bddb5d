//! Single-item extraction: resolve, fetch, parse, validate.

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::cache::{CacheManager, KvStore};
use crate::detail::{parse_detail_page, DetailPageContext};
use crate::error::{ErrorCategory, ExtractionError, Result};
use crate::fetch::{FetchOptions, FetchedPage, Fetcher};
use crate::rules::{RuleRegistry, SiteId};
use crate::search::{extract_detail_links, SearchPageContext};
use crate::types::record::{DetailRecord, ExtractionStatus, RecordMeta};
use crate::types::{ExtractOptions, ExtractionConfig, SearchResultStub};
use crate::validate::{
    contains_search_indicators, extract_domain, is_domain_or_subdomain_match, is_spam_domain,
    looks_like_detail_url, normalize_url,
};

/// Structured failure payload attached to error outcomes.
#[derive(Debug, Clone, Serialize)]
pub struct FailureInfo {
    pub message: String,
    pub category: ErrorCategory,
    pub retryable: bool,
    pub hint: String,
}

impl FailureInfo {
    fn from_error(err: &ExtractionError) -> Self {
        Self {
            message: err.to_string(),
            category: err.category(),
            retryable: err.retryable(),
            hint: err.hint().to_string(),
        }
    }
}

/// The per-item result. Always produced; failures are carried inside,
/// never thrown past the item boundary.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractOutcome {
    /// Caller's stub id, echoed back.
    pub id: String,
    pub status: ExtractionStatus,
    pub record: DetailRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureInfo>,
}

impl ExtractOutcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self.status,
            ExtractionStatus::Success | ExtractionStatus::Partial | ExtractionStatus::Cached
        )
    }
}

/// The extraction pipeline for single items.
///
/// All collaborators are injected; swap in `MockFetcher` and
/// `MemoryKvStore` for tests, or a rate-limited fetcher and a durable
/// store in production.
pub struct DetailExtractor<F: Fetcher, S: KvStore> {
    fetcher: F,
    cache: CacheManager<S>,
    registry: RuleRegistry,
    config: ExtractionConfig,
}

impl<F: Fetcher, S: KvStore> DetailExtractor<F, S> {
    /// Create a pipeline with the built-in rule tables.
    pub fn new(fetcher: F, store: S, config: ExtractionConfig) -> Self {
        let cache = CacheManager::new(store, config.cache_ttl_ms, config.cache_max_entries);
        Self {
            fetcher,
            cache,
            registry: RuleRegistry::new(),
            config,
        }
    }

    /// Replace the rule registry (e.g. tables loaded from JSON).
    pub fn with_registry(mut self, registry: RuleRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    pub fn cache(&self) -> &CacheManager<S> {
        &self.cache
    }

    /// Run the full pipeline for one stub.
    ///
    /// Never returns an error: validation failures, fetch failures, and
    /// parse failures all land in the outcome's `failure` payload with
    /// an error-status record.
    pub async fn extract_one(
        &self,
        stub: &SearchResultStub,
        options: &ExtractOptions,
    ) -> ExtractOutcome {
        let started = std::time::Instant::now();

        if let Err(err) = validate_stub(stub, &self.config) {
            return self.error_outcome(stub, &err, started.elapsed().as_millis() as u64);
        }

        if !options.bypass_cache {
            if let Some(mut record) = self.cache.get(&stub.url).await {
                debug!(id = %stub.id, url = %stub.url, "cache hit");
                if let Some(meta) = record.meta.as_mut() {
                    meta.cache_hit = true;
                    meta.extraction_status = ExtractionStatus::Cached;
                    meta.extraction_time_ms = 0;
                }
                return ExtractOutcome {
                    id: stub.id.clone(),
                    status: ExtractionStatus::Cached,
                    record: record.filtered(&self.config.display),
                    failure: None,
                };
            }
        }

        let mut attempt = self.run_attempt(stub, options).await;
        if let Err(err) = &attempt {
            if err.retryable() && options.retry_enabled(&self.config) {
                warn!(id = %stub.id, error = %err, "extraction failed, retrying once");
                tokio::time::sleep(std::time::Duration::from_millis(self.config.retry_delay_ms))
                    .await;
                attempt = self.run_attempt(stub, options).await;
            }
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match attempt {
            Ok((mut record, status)) => {
                if let Some(meta) = record.meta.as_mut() {
                    meta.extraction_time_ms = elapsed_ms;
                }
                // The cache keeps the full record; display filtering
                // applies only to what the caller sees.
                if !options.bypass_cache {
                    self.cache.put(&stub.url, &record).await;
                    // A search URL that resolved elsewhere gets a second
                    // entry under the detail URL, so a later stub carrying
                    // the detail URL directly hits without a fetch.
                    if let Some(meta) = &record.meta {
                        if normalize_url(&meta.detail_url) != normalize_url(&stub.url) {
                            self.cache.put(&meta.detail_url, &record).await;
                        }
                    }
                }
                info!(
                    id = %stub.id,
                    status = ?status,
                    elapsed_ms,
                    "extraction complete"
                );
                ExtractOutcome {
                    id: stub.id.clone(),
                    status,
                    record: record.filtered(&self.config.display),
                    failure: None,
                }
            }
            Err(err) => {
                warn!(id = %stub.id, url = %stub.url, error = %err, "extraction failed");
                self.error_outcome(stub, &err, elapsed_ms)
            }
        }
    }

    /// One full resolve-fetch-parse pass.
    async fn run_attempt(
        &self,
        stub: &SearchResultStub,
        options: &ExtractOptions,
    ) -> Result<(DetailRecord, ExtractionStatus)> {
        let site = detect_site(stub);
        let domain = extract_domain(&stub.url).ok_or_else(|| ExtractionError::Validation {
            reason: format!("URL has no host: {}", stub.url),
        })?;

        let fetch_options = {
            let mut o = FetchOptions::new(options.timeout_ms(&self.config));
            if let Some(referer) = site.referer() {
                o.referer = Some(referer.to_string());
            }
            o
        };

        // Resolve the true detail page. A URL that already looks like a
        // detail page is fetched directly; otherwise the page is treated
        // as a search page and mined for candidates.
        let direct = looks_like_detail_url(&stub.url, &domain)
            && !contains_search_indicators(&stub.url);

        let (detail_url, page) = if direct {
            let page = self.fetcher.fetch(&stub.url, &fetch_options).await?;
            (page.final_url.clone(), page)
        } else {
            self.resolve_via_search(stub, site, &domain, &fetch_options)
                .await?
        };

        let ctx = DetailPageContext {
            site,
            original_url: &detail_url,
            original_title: Some(&stub.title),
        };
        let parsed = parse_detail_page(&page.body, &self.registry, &self.config, &ctx);
        let mut record = parsed.record;

        if !record.has_content() {
            return Err(ExtractionError::Parse {
                url: detail_url,
                reason: "no usable fields, even from the generic pass".into(),
            });
        }

        let mut status = if parsed.fallback_error.is_some() {
            ExtractionStatus::Partial
        } else {
            ExtractionStatus::Success
        };
        let mut note = parsed.fallback_error;

        enhance(&mut record);
        if options.content_match(&self.config) {
            if let Some(mismatch) = content_mismatch(stub, &record) {
                status = ExtractionStatus::Partial;
                note = Some(mismatch);
            }
        }
        if let Some(blocked) = content_filter_hit(&self.config, &record) {
            return Err(ExtractionError::Validation {
                reason: format!("filtered by content keyword {blocked:?}"),
            });
        }

        record.meta = Some(RecordMeta {
            source_type: site.as_str().to_string(),
            detail_url,
            search_url: stub.url.clone(),
            extraction_status: status,
            extraction_time_ms: 0,
            extracted_at: Utc::now(),
            cache_hit: false,
            extraction_error: note,
        });
        Ok((record, status))
    }

    /// Fetch the stub URL as a search page, mine it for detail-link
    /// candidates, and fetch the winner. When no candidate survives, the
    /// already-fetched page stands in for the detail page; the original
    /// URL is never re-fetched.
    async fn resolve_via_search(
        &self,
        stub: &SearchResultStub,
        site: SiteId,
        domain: &str,
        fetch_options: &FetchOptions,
    ) -> Result<(String, FetchedPage)> {
        let page = self.fetcher.fetch(&stub.url, fetch_options).await?;

        let ctx = SearchPageContext {
            site,
            base_url: &page.final_url,
            stub,
        };
        let mut candidates = extract_detail_links(&page.body, &self.registry, &self.config, &ctx);

        // The rule layer already filters; re-check here so a bad rule
        // table can never route the fetch off-site.
        candidates.retain(|c| {
            let Some(cd) = extract_domain(&c.url) else {
                return false;
            };
            if is_spam_domain(&cd) {
                return false;
            }
            if self.config.strict_domain {
                is_domain_or_subdomain_match(&cd, domain)
                    || site.domains().iter().any(|d| is_domain_or_subdomain_match(&cd, d))
            } else {
                true
            }
        });

        match candidates.first() {
            Some(best) if normalize_url(&best.url) != normalize_url(&stub.url) => {
                debug!(
                    id = %stub.id,
                    url = %best.url,
                    score = best.score,
                    rule = %best.extracted_from,
                    "resolved detail link"
                );
                let detail = self.fetcher.fetch(&best.url, fetch_options).await?;
                Ok((detail.final_url.clone(), detail))
            }
            _ => {
                debug!(id = %stub.id, url = %stub.url, "no better candidate, parsing original page");
                Ok((page.final_url.clone(), page))
            }
        }
    }

    fn error_outcome(
        &self,
        stub: &SearchResultStub,
        err: &ExtractionError,
        elapsed_ms: u64,
    ) -> ExtractOutcome {
        let mut record = DetailRecord::error_stub(&stub.title);
        record.meta = Some(RecordMeta {
            source_type: detect_site(stub).as_str().to_string(),
            detail_url: stub.url.clone(),
            search_url: stub.url.clone(),
            extraction_status: ExtractionStatus::Error,
            extraction_time_ms: elapsed_ms,
            extracted_at: Utc::now(),
            cache_hit: false,
            extraction_error: Some(err.to_string()),
        });
        ExtractOutcome {
            id: stub.id.clone(),
            status: ExtractionStatus::Error,
            record,
            failure: Some(FailureInfo::from_error(err)),
        }
    }
}

/// Site detection: URL host first, the stub's source tag as a tiebreak.
fn detect_site(stub: &SearchResultStub) -> SiteId {
    match SiteId::from_url(&stub.url) {
        SiteId::Generic => SiteId::from_name(&stub.source),
        site => site,
    }
}

fn validate_stub(stub: &SearchResultStub, config: &ExtractionConfig) -> Result<()> {
    if !config.enabled {
        return Err(ExtractionError::Validation {
            reason: "extraction is disabled".into(),
        });
    }
    if stub.id.trim().is_empty() {
        return Err(ExtractionError::Validation {
            reason: "stub id is empty".into(),
        });
    }
    let url = stub.url.trim();
    if url.is_empty() {
        return Err(ExtractionError::Validation {
            reason: "stub URL is empty".into(),
        });
    }
    match Url::parse(url) {
        Ok(parsed) if parsed.host_str().is_some() => Ok(()),
        _ => Err(ExtractionError::Validation {
            reason: format!("stub URL is not absolute: {url}"),
        }),
    }
}

/// Post-parse field validation: clamp the rating, drop non-ISO dates.
fn enhance(record: &mut DetailRecord) {
    if let Some(rating) = record.rating {
        record.rating = Some(rating.clamp(0.0, 10.0));
    }
    if let Some(date) = &record.release_date {
        if NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() {
            record.release_date = None;
        }
    }
}

/// When both sides carry a catalog code and they disagree, the page is
/// probably the wrong one.
fn content_mismatch(stub: &SearchResultStub, record: &DetailRecord) -> Option<String> {
    let wanted = crate::validate::extract_code_from_title(&stub.title)
        .or_else(|| stub.keyword.as_deref().and_then(crate::validate::extract_code_from_text))?;
    let got = record.code.as_deref()?;
    if got.eq_ignore_ascii_case(&wanted) {
        None
    } else {
        Some(format!("extracted code {got} does not match requested {wanted}"))
    }
}

fn content_filter_hit(config: &ExtractionConfig, record: &DetailRecord) -> Option<String> {
    if config.content_filter_keywords.is_empty() {
        return None;
    }
    let haystack = format!(
        "{} {}",
        record.title.as_deref().unwrap_or_default(),
        record.description.as_deref().unwrap_or_default()
    )
    .to_lowercase();
    config
        .content_filter_keywords
        .iter()
        .find(|kw| !kw.is_empty() && haystack.contains(&kw.to_lowercase()))
        .cloned()
}
