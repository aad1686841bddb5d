//! Cache keying, TTL expiry, and LRU eviction.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::store::KvStore;
use crate::types::record::DetailRecord;
use crate::validate::normalize_url;

/// Namespace prefix for detail-record cache keys.
const KEY_PREFIX: &str = "detail:";

/// One cached record with its bookkeeping. Stored as plain JSON; the
/// payload is small enough that compression buys nothing here.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    key: String,
    url: String,
    data: DetailRecord,
    created_at: i64,
    expires_at: i64,
    last_accessed: i64,
    access_count: u32,
    /// Byte length of the serialized `data` payload.
    size: usize,
}

/// Aggregate cache counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Entries currently stored, including expired ones not yet purged.
    pub entries: usize,
    /// Stored entries past their TTL.
    pub expired: usize,
    /// Sum of serialized record payload sizes in bytes.
    pub total_size_bytes: usize,
    pub hits: u64,
    pub misses: u64,
}

/// TTL + LRU cache for detail records.
///
/// Keys are derived from the normalized URL, so URLs differing only in
/// query order, fragment, or trailing slash share an entry. Store errors
/// are logged and treated as misses; they never propagate.
pub struct CacheManager<S: KvStore> {
    store: S,
    ttl_ms: i64,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<S: KvStore> CacheManager<S> {
    pub fn new(store: S, ttl_ms: u64, max_entries: usize) -> Self {
        Self {
            store,
            ttl_ms: ttl_ms as i64,
            max_entries: max_entries.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Cache key for a URL: fixed-length digest of the normalized form.
    pub fn key_for(url: &str) -> String {
        let normalized = normalize_url(url);
        let digest = Sha256::digest(normalized.as_bytes());
        format!("{KEY_PREFIX}{digest:x}")
    }

    /// Look up a record. Expired or unreadable entries are dropped and
    /// reported as misses.
    pub async fn get(&self, url: &str) -> Option<DetailRecord> {
        let key = Self::key_for(url);
        let raw = match self.store.get(&key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            Err(err) => {
                warn!(%key, error = %err, "cache read failed, treating as miss");
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        let mut entry: CacheEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(err) => {
                warn!(%key, error = %err, "dropping unreadable cache entry");
                let _ = self.store.delete(&key).await;
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        let now = Utc::now().timestamp_millis();
        if now >= entry.expires_at {
            debug!(%key, url = %entry.url, "cache entry expired");
            let _ = self.store.delete(&key).await;
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        entry.last_accessed = now;
        entry.access_count += 1;
        // Touch bookkeeping is best-effort; the record is already in hand.
        if let Ok(raw) = serde_json::to_string(&entry) {
            let _ = self.store.put(&key, &raw).await;
        }

        self.hits.fetch_add(1, Ordering::Relaxed);
        Some(entry.data)
    }

    /// Store a record, evicting least-recently-accessed entries when the
    /// cache is full. Failures are logged and skipped.
    pub async fn put(&self, url: &str, record: &DetailRecord) {
        let key = Self::key_for(url);
        // `size` is the record payload's byte length, stamped before the
        // entry itself is serialized.
        let size = match serde_json::to_string(record) {
            Ok(raw) => raw.len(),
            Err(err) => {
                warn!(%key, error = %err, "record not serializable, skipping cache write");
                return;
            }
        };
        let now = Utc::now().timestamp_millis();
        let entry = CacheEntry {
            key: key.clone(),
            url: url.to_string(),
            data: record.clone(),
            created_at: now,
            expires_at: now + self.ttl_ms,
            last_accessed: now,
            access_count: 0,
            size,
        };
        let raw = match serde_json::to_string(&entry) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(%key, error = %err, "cache entry not serializable, skipping");
                return;
            }
        };

        if let Err(err) = self.evict_for(&key).await {
            warn!(%key, error = %err, "cache eviction failed, skipping write");
            return;
        }
        if let Err(err) = self.store.put(&key, &raw).await {
            warn!(%key, error = %err, "cache write failed");
        }
    }

    /// Delete the entry for a URL, if any.
    pub async fn remove(&self, url: &str) {
        let key = Self::key_for(url);
        if let Err(err) = self.store.delete(&key).await {
            warn!(%key, error = %err, "cache delete failed");
        }
    }

    /// Delete every entry in the namespace.
    pub async fn clear(&self) -> crate::error::Result<usize> {
        let keys = self.store.keys(KEY_PREFIX).await?;
        let count = keys.len();
        for key in keys {
            self.store.delete(&key).await?;
        }
        Ok(count)
    }

    /// Delete entries past their TTL. Returns the number purged.
    pub async fn purge_expired(&self) -> crate::error::Result<usize> {
        let now = Utc::now().timestamp_millis();
        let mut purged = 0;
        for (key, entry) in self.load_entries().await? {
            if now >= entry.expires_at {
                self.store.delete(&key).await?;
                purged += 1;
            }
        }
        if purged > 0 {
            debug!(purged, "purged expired cache entries");
        }
        Ok(purged)
    }

    /// Current counters. Expired-but-unpurged entries still count toward
    /// `entries`.
    pub async fn stats(&self) -> crate::error::Result<CacheStats> {
        let now = Utc::now().timestamp_millis();
        let mut stats = CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            ..Default::default()
        };
        for (_, entry) in self.load_entries().await? {
            stats.entries += 1;
            stats.total_size_bytes += entry.size;
            if now >= entry.expires_at {
                stats.expired += 1;
            }
        }
        Ok(stats)
    }

    /// Background task that purges expired entries on an interval.
    pub fn spawn_sweeper(manager: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()>
    where
        S: 'static,
    {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(err) = manager.purge_expired().await {
                    warn!(error = %err, "cache sweep failed");
                }
            }
        })
    }

    /// Make room for `incoming`: drop least-recently-accessed entries
    /// until the count (plus the new entry) fits `max_entries`.
    async fn evict_for(&self, incoming: &str) -> crate::error::Result<()> {
        let mut entries = self.load_entries().await?;
        entries.retain(|(key, _)| key != incoming);
        if entries.len() < self.max_entries {
            return Ok(());
        }

        entries.sort_by_key(|(_, e)| e.last_accessed);
        let excess = entries.len() + 1 - self.max_entries;
        for (key, entry) in entries.into_iter().take(excess) {
            debug!(%key, url = %entry.url, "evicting least-recently-used cache entry");
            self.store.delete(&key).await?;
        }
        Ok(())
    }

    async fn load_entries(&self) -> crate::error::Result<Vec<(String, CacheEntry)>> {
        let keys = self.store.keys(KEY_PREFIX).await?;
        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            let Some(raw) = self.store.get(&key).await? else {
                continue;
            };
            match serde_json::from_str::<CacheEntry>(&raw) {
                Ok(entry) => entries.push((key, entry)),
                Err(_) => {
                    // unreadable entries get dropped on sight
                    self.store.delete(&key).await?;
                }
            }
        }
        Ok(entries)
    }
}
