//! Core data types for the extraction pipeline.

pub mod config;
pub mod record;
pub mod stub;

pub use config::{ExtractOptions, ExtractionConfig};
pub use record::{
    Actress, DetailRecord, DownloadLink, ExtractionStatus, MagnetLink, RecordMeta,
};
pub use stub::{LinkCandidate, SearchResultStub};
