//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use serde_json::Value;

// == Cache Entry ==
/// A single cached payload with its storage time and lifetime.
///
/// The payload is an owned JSON snapshot. Callers only ever receive clones
/// of it, so nothing outside the store can alter what later readers see.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The stored snapshot
    pub value: Value,
    /// Storage timestamp (Unix milliseconds)
    pub stored_at_ms: u64,
    /// Lifetime in milliseconds, always > 0
    pub ttl_ms: u64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new entry stored at `now_ms`.
    ///
    /// TTL validation happens in the store; this constructor trusts its input.
    pub fn new(value: Value, now_ms: u64, ttl_ms: u64) -> Self {
        Self {
            value,
            stored_at_ms: now_ms,
            ttl_ms,
        }
    }

    // == Expires At ==
    /// Timestamp at which the entry stops being valid.
    pub fn expires_at_ms(&self) -> u64 {
        self.stored_at_ms.saturating_add(self.ttl_ms)
    }

    // == Is Expired ==
    /// Checks if the entry has expired at `now_ms`.
    ///
    /// An entry is valid iff `now < stored_at + ttl`, so it is already
    /// expired at exactly `stored_at + ttl`.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at_ms()
    }

    // == Time To Live ==
    /// Returns remaining lifetime in milliseconds, 0 once expired.
    pub fn ttl_remaining_ms(&self, now_ms: u64) -> u64 {
        self.expires_at_ms().saturating_sub(now_ms)
    }
}
