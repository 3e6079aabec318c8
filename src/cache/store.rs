//! Cache Store Module
//!
//! In-process key/value storage with per-entry TTL, lazy eviction and
//! prefix invalidation.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;

use crate::cache::{CacheEntry, CacheStats, Clock, SystemClock, MAX_KEY_LENGTH};
use crate::error::{CacheError, Result};

/// Store shared between query modules, the sweeper and the admin API.
pub type SharedCache = Arc<RwLock<CacheStore>>;

/// Number of recent invalidations remembered for `set_if_unchanged`.
const INVALIDATION_LOG_CAPACITY: usize = 1024;

// == Cache Store ==
/// Main cache storage with TTL support.
///
/// The store is never a source of truth: losing its contents only costs
/// extra data source round-trips.
#[derive(Debug)]
pub struct CacheStore {
    /// Key-value storage
    entries: HashMap<String, CacheEntry>,
    /// Performance statistics
    stats: CacheStats,
    /// Time source for TTL checks
    clock: Arc<dyn Clock>,
    /// Bumped on every invalidation
    generation: u64,
    /// Recent invalidations as (generation, prefix), oldest first
    invalidation_log: VecDeque<(u64, String)>,
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStore {
    // == Constructor ==
    /// Creates an empty store driven by the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty store driven by the given clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: HashMap::new(),
            stats: CacheStats::new(),
            clock,
            generation: 0,
            invalidation_log: VecDeque::new(),
        }
    }

    /// Wraps the store for sharing across tasks.
    pub fn into_shared(self) -> SharedCache {
        Arc::new(RwLock::new(self))
    }

    // == Set ==
    /// Stores a snapshot under `key` for `ttl_ms` milliseconds.
    ///
    /// Overwrites any existing entry and restarts its TTL. A TTL of zero or
    /// below is rejected and nothing is stored.
    pub fn set(&mut self, key: impl Into<String>, value: Value, ttl_ms: i64) -> Result<()> {
        let key = key.into();
        validate_key(&key)?;

        if ttl_ms <= 0 {
            return Err(CacheError::InvalidTtl(ttl_ms));
        }

        let entry = CacheEntry::new(value, self.clock.now_ms(), ttl_ms as u64);
        self.entries.insert(key, entry);
        self.stats.set_total_entries(self.entries.len());

        Ok(())
    }

    // == Set If Unchanged ==
    /// Stores the snapshot only if no invalidation covering `key` ran since
    /// `generation` was read.
    ///
    /// A read that fetched from the data source while a write was being
    /// acknowledged may hold pre-write data; skipping the insert keeps it out
    /// of the cache. Invalidations of other prefixes do not block it.
    /// Returns whether the entry was stored.
    pub fn set_if_unchanged(
        &mut self,
        key: impl Into<String>,
        value: Value,
        ttl_ms: i64,
        generation: u64,
    ) -> Result<bool> {
        let key = key.into();
        if self.invalidated_since(&key, generation) {
            // Still surface bad input even when skipping.
            validate_key(&key)?;
            if ttl_ms <= 0 {
                return Err(CacheError::InvalidTtl(ttl_ms));
            }
            return Ok(false);
        }
        self.set(key, value, ttl_ms)?;
        Ok(true)
    }

    /// Whether an invalidation after `generation` may have covered `key`.
    ///
    /// Answers yes when the log no longer reaches back to `generation`.
    fn invalidated_since(&self, key: &str, generation: u64) -> bool {
        if generation >= self.generation {
            return false;
        }
        match self.invalidation_log.front() {
            Some((oldest, _)) if *oldest <= generation + 1 => self
                .invalidation_log
                .iter()
                .any(|(seen, prefix)| *seen > generation && key.starts_with(prefix.as_str())),
            _ => true,
        }
    }

    fn record_invalidation(&mut self, prefix: &str) {
        self.generation += 1;
        self.invalidation_log
            .push_back((self.generation, prefix.to_string()));
        if self.invalidation_log.len() > INVALIDATION_LOG_CAPACITY {
            self.invalidation_log.pop_front();
        }
    }

    /// Invalidation counter observed by readers before a data source call.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    // == Get ==
    /// Returns a copy of the stored value if present and unexpired.
    ///
    /// An expired entry is removed as a side effect and counted as a miss.
    pub fn get(&mut self, key: &str) -> Option<Value> {
        let now = self.clock.now_ms();

        match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                let value = entry.value.clone();
                self.stats.record_hit();
                Some(value)
            }
            Some(_) => {
                self.entries.remove(key);
                self.stats.record_expirations(1);
                self.stats.record_miss();
                self.stats.set_total_entries(self.entries.len());
                None
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    // == Invalidate ==
    /// Removes one entry. Returns whether anything was removed.
    pub fn invalidate(&mut self, key: &str) -> bool {
        self.record_invalidation(key);
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.stats.record_invalidations(1);
            self.stats.set_total_entries(self.entries.len());
        }
        removed
    }

    // == Invalidate Pattern ==
    /// Removes every entry whose key starts with `prefix`.
    ///
    /// Returns the number of entries removed; zero matches is not an error.
    pub fn invalidate_pattern(&mut self, prefix: &str) -> usize {
        self.record_invalidation(prefix);
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(prefix));
        let removed = before - self.entries.len();

        self.stats.record_invalidations(removed);
        self.stats.set_total_entries(self.entries.len());
        removed
    }

    // == Cleanup Expired ==
    /// Removes all expired entries from the cache.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&mut self) -> usize {
        let now = self.clock.now_ms();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - self.entries.len();

        self.stats.record_expirations(removed);
        self.stats.set_total_entries(self.entries.len());
        removed
    }

    // == Corruption ==
    /// Drops an entry whose payload failed a shape check on read.
    ///
    /// The `get` that returned it counted a hit; that hit becomes a miss.
    pub fn discard_corrupted(&mut self, key: &str) {
        if self.entries.remove(key).is_some() {
            self.stats.record_corruption();
            self.stats.set_total_entries(self.entries.len());
        }
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    /// Whether a key is physically present, expired or not.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns the current number of entries, including not-yet-evicted expired ones.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Rejects keys the store would refuse to hold.
pub(crate) fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidKey("key cannot be empty".to_string()));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(CacheError::InvalidKey(format!(
            "key exceeds maximum length of {} bytes",
            MAX_KEY_LENGTH
        )));
    }
    Ok(())
}
