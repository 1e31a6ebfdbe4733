//! Fingerprint result cache
//!
//! Maps the SHA-256 of an original upload to the result it produced, with
//! time-based expiry and a bounded entry count. Exact-byte identity only:
//! two encodings of the same picture are different entries.
//!
//! # Thread Safety
//!
//! A single `parking_lot::Mutex` serializes access. Every operation holds it
//! for one map lookup, insert or eviction and never across an await point.

mod fingerprint;

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;

use crate::pipeline::OcrResult;

pub use fingerprint::ContentFingerprint;

/// Default entry time-to-live
pub const DEFAULT_TTL_SECS: u64 = 7200;

/// Default maximum number of entries
pub const DEFAULT_CAPACITY: usize = 500;

/// Cache configuration options
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    /// How long an entry stays visible after insertion
    pub ttl: Duration,
    /// Maximum number of entries
    pub capacity: usize,
    /// Whether "no text detected" outcomes are stored
    pub cache_empty_results: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            capacity: DEFAULT_CAPACITY,
            cache_empty_results: true,
        }
    }
}

/// Stored result with its bookkeeping
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub fingerprint: ContentFingerprint,
    pub result: OcrResult,
    pub inserted_at: DateTime<Utc>,
    pub expires_at: Instant,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// A result served from the cache
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResult {
    pub result: OcrResult,
    pub cached_at: DateTime<Utc>,
}

/// Whether a response came from the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit { cached_at: DateTime<Utc> },
    Miss,
}

impl CacheStatus {
    pub fn is_hit(&self) -> bool {
        matches!(self, CacheStatus::Hit { .. })
    }

    /// Value for the `X-Cache` header
    pub fn header_value(&self) -> &'static str {
        match self {
            CacheStatus::Hit { .. } => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }

    /// Insertion timestamp for hits
    pub fn cached_at(&self) -> Option<DateTime<Utc>> {
        match self {
            CacheStatus::Hit { cached_at } => Some(*cached_at),
            CacheStatus::Miss => None,
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    /// Entries currently held (expired entries included until reclaimed)
    pub entries: usize,
    pub capacity: usize,
    pub ttl_seconds: u64,
    pub hits: u64,
    pub misses: u64,
    /// Live entries dropped to make room
    pub evictions: u64,
    /// Entries reclaimed after their TTL elapsed
    pub expirations: u64,
}

struct CacheInner {
    entries: LruCache<ContentFingerprint, CacheEntry>,
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
}

impl CacheInner {
    /// Drop every expired entry, returning how many were removed
    fn purge_expired(&mut self, now: Instant) -> usize {
        let expired: Vec<ContentFingerprint> = self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_live(now))
            .map(|(key, _)| *key)
            .collect();

        for key in &expired {
            self.entries.pop(key);
        }
        self.expirations += expired.len() as u64;
        expired.len()
    }
}

/// Thread-safe, time-aware LRU cache of pipeline results
#[derive(Clone)]
pub struct FingerprintCache {
    inner: Arc<Mutex<CacheInner>>,
    config: CacheConfig,
}

impl Default for FingerprintCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl FingerprintCache {
    pub fn new(config: CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.capacity).unwrap_or(NonZeroUsize::MIN);

        Self {
            inner: Arc::new(Mutex::new(CacheInner {
                entries: LruCache::new(capacity),
                hits: 0,
                misses: 0,
                evictions: 0,
                expirations: 0,
            })),
            config,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Whether a result is eligible for storage under the configured policy
    pub fn admits(&self, result: &OcrResult) -> bool {
        result.success || (self.config.cache_empty_results && result.is_empty_recognition())
    }

    /// Look up a live entry, promoting it to most recently used
    pub fn lookup(&self, fingerprint: &ContentFingerprint) -> Option<CachedResult> {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        let live = inner.entries.get(fingerprint).map(|entry| entry.is_live(now));
        match live {
            Some(true) => {
                inner.hits += 1;
                inner.entries.peek(fingerprint).map(|entry| CachedResult {
                    result: entry.result.clone(),
                    cached_at: entry.inserted_at,
                })
            }
            Some(false) => {
                inner.entries.pop(fingerprint);
                inner.expirations += 1;
                inner.misses += 1;
                tracing::debug!(fingerprint = %fingerprint, "Cache entry expired");
                None
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Store a result, returning its insertion timestamp.
    ///
    /// When the cache is full, expired entries are reclaimed first and the
    /// least recently used live entry only if that frees nothing.
    pub fn store(&self, fingerprint: ContentFingerprint, result: OcrResult) -> DateTime<Utc> {
        let now = Instant::now();
        let inserted_at = Utc::now();
        let entry = CacheEntry {
            fingerprint,
            result,
            inserted_at,
            expires_at: now + self.config.ttl,
        };

        let mut inner = self.inner.lock();

        let full = inner.entries.len() >= inner.entries.cap().get();
        if full && !inner.entries.contains(&fingerprint) {
            let purged = inner.purge_expired(now);
            if purged > 0 {
                tracing::debug!(purged, "Reclaimed expired cache entries");
            }
        }

        if let Some((evicted, _)) = inner.entries.push(fingerprint, entry) {
            if evicted != fingerprint {
                inner.evictions += 1;
                tracing::debug!(fingerprint = %evicted, "Evicted least recently used cache entry");
            }
        }

        inserted_at
    }

    /// Remove every entry
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        tracing::debug!("Cleared fingerprint cache");
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            entries: inner.entries.len(),
            capacity: inner.entries.cap().get(),
            ttl_seconds: self.config.ttl.as_secs(),
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
            expirations: inner.expirations,
        }
    }
}
