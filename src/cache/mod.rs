//! TTL + LRU record cache over a pluggable key-value store.
//!
//! The storage seam is the `KvStore` trait; `CacheManager` layers keying,
//! expiry, and eviction on top of it. Store failures never fail an
//! extraction, they degrade to cache misses.

pub mod manager;
pub mod store;

pub use manager::{CacheManager, CacheStats};
pub use store::{KvStore, MemoryKvStore};
