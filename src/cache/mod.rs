//! Cache Module
//!
//! Provides the in-memory store, canonical key builder and prefix
//! invalidation used by every query domain.

mod clock;
mod entry;
mod invalidator;
mod key;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::CacheEntry;
pub use invalidator::PatternInvalidator;
pub use key::{build_key, key_prefix};
pub use stats::CacheStats;
pub use store::{CacheStore, SharedCache};
pub(crate) use store::validate_key;

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 1024;
