//! Background Tasks Module
//!
//! Contains background tasks that run periodically alongside the cache.
//!
//! # Tasks
//! - Expiry sweep: removes expired entries so memory stays bounded between reads

mod sweeper;

pub use sweeper::spawn_sweeper_task;
