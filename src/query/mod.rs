//! Query Module
//!
//! Generic read-through / invalidate-after-write engine and the result
//! shapes handed back to callers.

mod engine;
mod result;

pub use engine::{CachedQuery, QueryEngine, DEFAULT_SOURCE_TIMEOUT};
pub use result::{Performance, QueryResult, WriteResult};
