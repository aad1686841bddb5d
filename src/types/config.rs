//! Configuration types consumed by the pipeline.
//!
//! All knobs here are read-only inputs owned by the user-settings layer;
//! the pipeline never mutates or persists them.

use serde::{Deserialize, Serialize};

/// Default minimum score a generic-rule candidate must reach to survive.
///
/// Empirically chosen threshold carried over from production tuning;
/// override through [`ExtractionConfig::min_candidate_score`].
pub const MIN_CANDIDATE_SCORE: u8 = 20;

/// Default cap on raw anchors scanned by the generic extractor.
pub const MAX_GENERIC_ANCHORS: usize = 200;

/// Per-user configuration for the extraction pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Master switch; a disabled config short-circuits every call.
    pub enabled: bool,

    /// Per-fetch timeout in milliseconds.
    pub timeout_ms: u64,

    /// Allow one automatic retry of a failed pipeline.
    pub retry_enabled: bool,

    /// Fixed delay before the retry attempt, milliseconds.
    pub retry_delay_ms: u64,

    /// Maximum screenshots kept per record.
    pub max_screenshots: usize,

    /// Maximum download links kept per record.
    pub max_download_links: usize,

    /// Maximum magnet links kept per record.
    pub max_magnet_links: usize,

    /// Cache TTL in milliseconds.
    pub cache_ttl_ms: u64,

    /// Global cache size cap (entries); LRU eviction beyond this.
    pub cache_max_entries: usize,

    /// Items dispatched concurrently per batch chunk.
    pub max_concurrent_extractions: usize,

    /// Politeness delay between batch chunks, milliseconds.
    pub chunk_delay_ms: u64,

    /// Reject cross-domain links even when a site allow-list matches.
    pub strict_domain: bool,

    /// Keywords that disqualify a candidate title when content
    /// matching is enabled.
    #[serde(default)]
    pub content_filter_keywords: Vec<String>,

    /// Minimum score for generic-rule candidates.
    pub min_candidate_score: u8,

    /// Cap on raw anchors scanned by the generic extractor.
    pub max_generic_anchors: usize,

    /// Which record fields the caller wants returned.
    #[serde(default)]
    pub display: DisplayConfig,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: 15_000,
            retry_enabled: true,
            retry_delay_ms: 1_000,
            max_screenshots: 10,
            max_download_links: 10,
            max_magnet_links: 10,
            cache_ttl_ms: 24 * 60 * 60 * 1000,
            cache_max_entries: 500,
            max_concurrent_extractions: 3,
            chunk_delay_ms: 500,
            strict_domain: true,
            content_filter_keywords: vec![],
            min_candidate_score: MIN_CANDIDATE_SCORE,
            max_generic_anchors: MAX_GENERIC_ANCHORS,
            display: DisplayConfig::default(),
        }
    }
}

impl ExtractionConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-fetch timeout.
    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }

    /// Set the cache TTL.
    pub fn with_cache_ttl_ms(mut self, ms: u64) -> Self {
        self.cache_ttl_ms = ms;
        self
    }

    /// Set batch concurrency.
    pub fn with_max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent_extractions = n.max(1);
        self
    }

    /// Disable the automatic retry.
    pub fn without_retry(mut self) -> Self {
        self.retry_enabled = false;
        self
    }

    /// Set content-filter keywords.
    pub fn with_content_filter(
        mut self,
        keywords: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.content_filter_keywords = keywords.into_iter().map(|k| k.into()).collect();
        self
    }
}

/// Which record fields to include in returned output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    pub show_screenshots: bool,
    pub show_actresses: bool,
    pub show_download_links: bool,
    pub show_magnet_links: bool,
    pub show_tags: bool,
    pub show_description: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            show_screenshots: true,
            show_actresses: true,
            show_download_links: true,
            show_magnet_links: true,
            show_tags: true,
            show_description: true,
        }
    }
}

/// Per-call overrides layered over the persisted [`ExtractionConfig`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractOptions {
    /// Override the per-fetch timeout.
    pub timeout_ms: Option<u64>,

    /// Override the retry flag.
    pub retry: Option<bool>,

    /// Toggle content-keyword matching for this call.
    pub content_match: Option<bool>,

    /// Skip the cache entirely (read and write) for this call.
    pub bypass_cache: bool,
}

impl ExtractOptions {
    /// Create empty options (everything inherited from the config).
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the timeout.
    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = Some(ms);
        self
    }

    /// Disable retry for this call.
    pub fn without_retry(mut self) -> Self {
        self.retry = Some(false);
        self
    }

    /// Bypass the cache for this call.
    pub fn bypassing_cache(mut self) -> Self {
        self.bypass_cache = true;
        self
    }

    /// Resolve the effective timeout.
    pub fn timeout_ms(&self, config: &ExtractionConfig) -> u64 {
        self.timeout_ms.unwrap_or(config.timeout_ms)
    }

    /// Resolve the effective retry flag.
    pub fn retry_enabled(&self, config: &ExtractionConfig) -> bool {
        self.retry.unwrap_or(config.retry_enabled)
    }

    /// Resolve whether content-keyword matching applies.
    pub fn content_match(&self, config: &ExtractionConfig) -> bool {
        self.content_match
            .unwrap_or(!config.content_filter_keywords.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ExtractionConfig::default();
        assert!(config.enabled);
        assert_eq!(config.min_candidate_score, MIN_CANDIDATE_SCORE);
        assert_eq!(config.max_concurrent_extractions, 3);
    }

    #[test]
    fn test_options_layer_over_config() {
        let config = ExtractionConfig::default().with_timeout_ms(10_000);
        let options = ExtractOptions::new().with_timeout_ms(2_000);

        assert_eq!(options.timeout_ms(&config), 2_000);
        assert_eq!(ExtractOptions::new().timeout_ms(&config), 10_000);
    }

    #[test]
    fn test_retry_override() {
        let config = ExtractionConfig::default();
        assert!(ExtractOptions::new().retry_enabled(&config));
        assert!(!ExtractOptions::new().without_retry().retry_enabled(&config));
    }

    #[test]
    fn test_concurrency_floor() {
        let config = ExtractionConfig::default().with_max_concurrent(0);
        assert_eq!(config.max_concurrent_extractions, 1);
    }
}
