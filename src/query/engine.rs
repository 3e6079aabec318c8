//! Query Engine Module
//!
//! Read-through caching and invalidate-after-write orchestration shared by
//! every domain.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::{build_key, key_prefix, validate_key, Clock, PatternInvalidator, SharedCache};
use crate::error::{CacheError, DataSourceError, Result};
use crate::query::{QueryResult, WriteResult};

/// Default bound on a single data source call.
pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(5);

// == Cached Query ==
/// Describes one cacheable read: where its keys live and how long they last.
///
/// `P` is the parameter type folded into the key, `T` the payload type.
#[derive(Debug)]
pub struct CachedQuery<P, T> {
    domain: &'static str,
    operation: &'static str,
    ttl: Duration,
    _marker: PhantomData<fn(&P) -> T>,
}

impl<P, T> Clone for CachedQuery<P, T> {
    fn clone(&self) -> Self {
        Self {
            domain: self.domain,
            operation: self.operation,
            ttl: self.ttl,
            _marker: PhantomData,
        }
    }
}

impl<P: Serialize, T> CachedQuery<P, T> {
    pub fn new(domain: &'static str, operation: &'static str, ttl: Duration) -> Self {
        Self {
            domain,
            operation,
            ttl,
            _marker: PhantomData,
        }
    }

    pub fn key(&self, tenant: &str, params: &P) -> Result<String> {
        build_key(self.domain, self.operation, tenant, params)
    }

    /// Prefix covering every cached call of this query for `tenant`.
    pub fn prefix(&self, tenant: &str) -> String {
        key_prefix(self.domain, self.operation, tenant)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn name(&self) -> String {
        format!("{}.{}", self.domain, self.operation)
    }
}

// == Query Engine ==
/// Shared cache, invalidator, clock and timeout used by the domain modules.
#[derive(Debug, Clone)]
pub struct QueryEngine {
    cache: SharedCache,
    invalidator: PatternInvalidator,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl QueryEngine {
    pub fn new(cache: SharedCache, clock: Arc<dyn Clock>, timeout: Duration) -> Self {
        Self {
            invalidator: PatternInvalidator::new(cache.clone()),
            cache,
            clock,
            timeout,
        }
    }

    pub fn cache(&self) -> &SharedCache {
        &self.cache
    }

    pub fn invalidator(&self) -> &PatternInvalidator {
        &self.invalidator
    }

    pub fn now_utc(&self) -> DateTime<Utc> {
        self.clock.now_utc()
    }

    // == Read ==
    /// Serves `query` for `tenant` from cache, or fetches and caches it.
    ///
    /// A cached payload that no longer deserializes into `T` is logged,
    /// discarded and refetched. Failed or timed-out fetches are never cached.
    /// A key the store cannot hold skips the cache and always fetches.
    /// A non-positive TTL fails before the data source is called.
    pub async fn read<P, T, F, Fut>(
        &self,
        query: &CachedQuery<P, T>,
        tenant: &str,
        params: &P,
        fetch: F,
    ) -> Result<QueryResult<T>>
    where
        P: Serialize,
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, DataSourceError>>,
    {
        let started = Instant::now();
        let ttl_ms = ttl_millis(query.ttl());
        if ttl_ms <= 0 {
            return Err(CacheError::InvalidTtl(ttl_ms));
        }

        let key = query.key(tenant, params)?;
        if let Err(err) = validate_key(&key) {
            warn!("{} for {} bypasses the cache: {}", query.name(), tenant, err);
            let data = self.fetch_uncached(query, tenant, fetch).await?;
            return Ok(QueryResult::miss(data, started.elapsed()));
        }

        let (cached, generation) = {
            let mut cache = self.cache.write().await;
            let cached = match cache.get(&key) {
                Some(value) => match serde_json::from_value::<T>(value) {
                    Ok(data) => Some(data),
                    Err(err) => {
                        warn!(
                            "CacheCorruptionWarning: discarding {} ({}), refetching",
                            key, err
                        );
                        cache.discard_corrupted(&key);
                        None
                    }
                },
                None => None,
            };
            (cached, cache.generation())
        };

        if let Some(data) = cached {
            let elapsed = started.elapsed();
            debug!("{} cache hit for {} in {:?}", query.name(), tenant, elapsed);
            return Ok(QueryResult::hit(data, elapsed));
        }

        let data = self.fetch_uncached(query, tenant, fetch).await?;

        let snapshot = serde_json::to_value(&data)?;
        let stored = {
            let mut cache = self.cache.write().await;
            cache.set_if_unchanged(key, snapshot, ttl_ms, generation)?
        };
        if !stored {
            debug!(
                "{} result for {} not cached: invalidated during fetch",
                query.name(),
                tenant
            );
        }

        let elapsed = started.elapsed();
        debug!("{} cache miss for {} in {:?}", query.name(), tenant, elapsed);
        Ok(QueryResult::miss(data, elapsed))
    }

    // == Write ==
    /// Persists a mutation, then invalidates what it made stale.
    ///
    /// `prefixes` receives the persisted entity and returns every key prefix
    /// that may now hold stale data. Invalidation finishes before this
    /// returns. On failure nothing is invalidated and a failed result is
    /// returned.
    pub async fn write<T, Fut, I>(&self, operation: &str, persist: Fut, prefixes: I) -> WriteResult<T>
    where
        Fut: Future<Output = std::result::Result<T, DataSourceError>>,
        I: FnOnce(&T) -> Vec<String>,
    {
        let started = Instant::now();

        match self.call_source(persist).await {
            Ok(entity) => {
                let prefixes = prefixes(&entity);
                let removed = self.invalidator.invalidate(&prefixes).await;
                debug!(
                    "{} succeeded in {:?}, invalidated {} entries",
                    operation,
                    started.elapsed(),
                    removed
                );
                WriteResult::ok(entity)
            }
            Err(err) => {
                warn!("{} failed, cache left untouched: {}", operation, err);
                WriteResult::failed(err.to_string())
            }
        }
    }

    async fn fetch_uncached<P, T, F, Fut>(
        &self,
        query: &CachedQuery<P, T>,
        tenant: &str,
        fetch: F,
    ) -> Result<T>
    where
        P: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, DataSourceError>>,
    {
        self.call_source(fetch()).await.map_err(|err| {
            warn!("{} failed for {}: {}", query.name(), tenant, err);
            CacheError::DataSource(err)
        })
    }

    async fn call_source<T, Fut>(&self, fut: Fut) -> std::result::Result<T, DataSourceError>
    where
        Fut: Future<Output = std::result::Result<T, DataSourceError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(DataSourceError::Timeout(self.timeout)),
        }
    }
}

fn ttl_millis(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX)
}
