//! Directory Module
//!
//! Wires one cache store, one engine and all domain query modules together.

use std::sync::Arc;

use crate::cache::{CacheStore, Clock, SharedCache, SystemClock};
use crate::config::Config;
use crate::domains::{
    ConsoleQueries, ConsoleSource, HoursQueries, HoursSource, MembershipQueries,
    MembershipSource, ScheduleQueries, ScheduleSource,
};
use crate::query::QueryEngine;

/// Every query module of the application over a single shared cache.
///
/// Build one per process (or per test); nothing here is global.
pub struct Directory {
    pub cache: SharedCache,
    pub engine: QueryEngine,
    pub schedule: ScheduleQueries,
    pub hours: HoursQueries,
    pub memberships: MembershipQueries,
    pub console: ConsoleQueries,
}

impl Directory {
    /// Builds the directory over a source implementing every domain trait.
    pub fn new<S>(config: &Config, source: Arc<S>) -> Self
    where
        S: ScheduleSource + HoursSource + MembershipSource + ConsoleSource + 'static,
    {
        Self::with_clock(config, source, Arc::new(SystemClock))
    }

    /// Same as [`Directory::new`] with an explicit clock for TTLs and "today".
    pub fn with_clock<S>(config: &Config, source: Arc<S>, clock: Arc<dyn Clock>) -> Self
    where
        S: ScheduleSource + HoursSource + MembershipSource + ConsoleSource + 'static,
    {
        let cache = CacheStore::with_clock(clock.clone()).into_shared();
        let engine = QueryEngine::new(cache.clone(), clock, config.source_timeout());

        Self {
            schedule: ScheduleQueries::new(engine.clone(), source.clone(), config.schedule_ttl()),
            hours: HoursQueries::new(engine.clone(), source.clone(), config.hours_ttl()),
            memberships: MembershipQueries::new(
                engine.clone(),
                source.clone(),
                config.membership_ttl(),
            ),
            console: ConsoleQueries::new(engine.clone(), source, config.console_ttl()),
            cache,
            engine,
        }
    }
}
