//! Logscope Query Cache
//!
//! Memory-resident cache of fetched query pages. Entries are immutable once
//! stored and are replaced wholesale on every `put`; readers get an `Arc` to
//! the entry that was current when they looked, never a half-written one.
//!
//! Expiry is lazy: a stale entry is reported as a miss and stays in place
//! until the next `put` under the same fingerprint overwrites it. TTLs are
//! supplied per lookup so different query kinds can use different freshness
//! windows against the same store.

pub mod clock;
pub mod fingerprint;

pub use clock::{Clock, ManualClock, SystemClock};
pub use fingerprint::QueryFingerprint;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use logscope_core::LogRecord;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// One cached page of results
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub records: Vec<LogRecord>,
    pub fetched_at: DateTime<Utc>,
    /// Cursor for the page after this one, if any
    pub next_cursor: Option<String>,
}

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups with no usable entry, stale ones included
    pub misses: u64,
    /// Misses caused by an expired entry
    pub stale: u64,
    pub writes: u64,
    pub entries: usize,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    stale: AtomicU64,
    writes: AtomicU64,
}

/// TTL cache keyed by [`QueryFingerprint`]
pub struct QueryCache {
    entries: DashMap<QueryFingerprint, Arc<CacheEntry>>,
    clock: Arc<dyn Clock>,
    counters: Counters,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
            counters: Counters::default(),
        }
    }

    /// Look up a fresh entry
    ///
    /// Returns `None` when nothing is stored or when the entry is at least
    /// `ttl` old.
    pub fn get(&self, fingerprint: &QueryFingerprint, ttl: Duration) -> Option<Arc<CacheEntry>> {
        let entry = match self.entries.get(fingerprint) {
            Some(entry) => Arc::clone(entry.value()),
            None => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                debug!(%fingerprint, "cache miss");
                return None;
            }
        };

        let age = self.clock.now().signed_duration_since(entry.fetched_at);
        // a negative age (clock stepped back) counts as fresh
        let fresh = age.to_std().map(|age| age < ttl).unwrap_or(true);
        if fresh {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            debug!(%fingerprint, records = entry.records.len(), "cache hit");
            Some(entry)
        } else {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            self.counters.stale.fetch_add(1, Ordering::Relaxed);
            debug!(%fingerprint, age_ms = age.num_milliseconds(), "cache entry stale");
            None
        }
    }

    /// Store a page, replacing any previous entry for the fingerprint
    pub fn put(
        &self,
        fingerprint: QueryFingerprint,
        records: Vec<LogRecord>,
        next_cursor: Option<String>,
    ) -> Arc<CacheEntry> {
        let entry = Arc::new(CacheEntry {
            records,
            fetched_at: self.clock.now(),
            next_cursor: next_cursor.filter(|c| !c.is_empty()),
        });
        debug!(%fingerprint, records = entry.records.len(), "cache store");
        self.entries.insert(fingerprint, Arc::clone(&entry));
        self.counters.writes.fetch_add(1, Ordering::Relaxed);
        entry
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            stale: self.counters.stale.load(Ordering::Relaxed),
            writes: self.counters.writes.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry; statistics are kept
    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("entries", &self.entries.len())
            .field("stats", &self.stats())
            .finish()
    }
}
