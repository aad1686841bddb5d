//! Catalog Detail Extraction Library
//!
//! Takes a search-result link from a catalog site, re-derives the true
//! detail-page URL by mining and scoring the links on the page, and
//! parses the detail page into a structured record (code, cast, images,
//! magnet and download links, tags, rating).
//!
//! # Design Philosophy
//!
//! - Rule-driven: per-site selector tables, not per-site code
//! - Never trust the input URL; resolve the real detail page
//! - One item's failure never sinks a batch
//! - Every collaborator behind a trait, injected explicitly
//!
//! # Usage
//!
//! ```rust,ignore
//! use linkminer::{DetailExtractor, ExtractOptions, ExtractionConfig, SearchResultStub};
//! use linkminer::cache::MemoryKvStore;
//! use linkminer::fetch::HttpFetcher;
//!
//! let pipeline = DetailExtractor::new(
//!     HttpFetcher::new(),
//!     MemoryKvStore::new(),
//!     ExtractionConfig::default(),
//! );
//!
//! let stub = SearchResultStub::new(
//!     "1",
//!     "IPX-156 ...",
//!     "https://www.javbus.com/search/IPX-156",
//!     "javbus",
//! );
//! let outcome = pipeline.extract_one(&stub, &ExtractOptions::new()).await;
//! println!("{:?}", outcome.record.code);
//! ```
//!
//! # Modules
//!
//! - [`rules`] - Per-site selector tables and the site registry
//! - [`search`] - Search-page detail-link mining and scoring
//! - [`detail`] - Detail-page field parsing with generic fallback
//! - [`pipeline`] - Single-item and batched orchestration
//! - [`cache`] - TTL + LRU record cache over a key-value seam
//! - [`fetch`] - HTTP layer with rate-limited wrapper
//! - [`validate`] - URL, domain, and link hygiene
//! - [`testing`] - Mock implementations for testing

pub mod cache;
pub mod detail;
pub mod dom;
pub mod error;
pub mod fetch;
pub mod pipeline;
pub mod rules;
pub mod search;
pub mod testing;
pub mod types;
pub mod validate;

// Common API at the crate root.
pub use cache::{CacheManager, CacheStats, KvStore, MemoryKvStore};
pub use error::{ErrorCategory, ExtractionError, FetchError, Result};
pub use fetch::{Fetcher, HttpFetcher, RateLimitedFetcher};
pub use pipeline::{extract_batch, BatchOutcome, BatchStats, DetailExtractor, ExtractOutcome};
pub use rules::{RuleRegistry, SiteId};
pub use types::{
    DetailRecord, ExtractOptions, ExtractionConfig, ExtractionStatus, LinkCandidate,
    SearchResultStub,
};
