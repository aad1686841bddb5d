//! The extraction pipeline.
//!
//! `DetailExtractor` resolves a search-result stub to its true detail
//! page, parses it, and returns a validated record. `extract_batch`
//! runs many stubs with bounded concurrency. Both never let one item's
//! failure escape past that item's result.

pub mod batch;
pub mod extract;

pub use batch::{extract_batch, BatchOutcome, BatchStats, Progress};
pub use extract::{DetailExtractor, ExtractOutcome, FailureInfo};
