//! Data Source Implementations
//!
//! The domain traits live next to their query modules; this module holds
//! concrete sources.

pub mod memory;

pub use memory::InMemoryDirectory;
