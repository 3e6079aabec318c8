//! Directory Cache - read-through query cache for a multi-tenant field-service directory
//!
//! Caches schedule, business hours, membership and CSR console reads with
//! per-domain TTLs, and invalidates by key prefix after successful writes.

pub mod api;
pub mod cache;
pub mod config;
pub mod directory;
pub mod domains;
pub mod error;
pub mod models;
pub mod query;
pub mod source;
pub mod tasks;

pub use api::AppState;
pub use cache::{CacheStore, SharedCache};
pub use config::Config;
pub use directory::Directory;
pub use error::{CacheError, DataSourceError, Result};
pub use query::{QueryEngine, QueryResult, WriteResult};
pub use tasks::spawn_sweeper_task;
