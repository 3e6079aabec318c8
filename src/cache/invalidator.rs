//! Pattern Invalidator Module
//!
//! Bulk prefix removal run after successful writes.

use tracing::{debug, info};

use crate::cache::SharedCache;

// == Pattern Invalidator ==
/// Removes every cache entry matching any of a set of key prefixes.
#[derive(Debug, Clone)]
pub struct PatternInvalidator {
    cache: SharedCache,
}

impl PatternInvalidator {
    pub fn new(cache: SharedCache) -> Self {
        Self { cache }
    }

    /// Invalidates all entries under `prefixes` in one critical section.
    ///
    /// Idempotent: prefixes with no matching entries are skipped silently.
    /// Returns the total number of entries removed.
    pub async fn invalidate(&self, prefixes: &[String]) -> usize {
        if prefixes.is_empty() {
            return 0;
        }

        let removed: usize = {
            let mut cache = self.cache.write().await;
            prefixes
                .iter()
                .map(|prefix| cache.invalidate_pattern(prefix))
                .sum()
        };

        if removed > 0 {
            info!(
                "Invalidated {} cache entries across {} prefixes",
                removed,
                prefixes.len()
            );
        } else {
            debug!("Invalidation matched no entries: {:?}", prefixes);
        }
        removed
    }
}
