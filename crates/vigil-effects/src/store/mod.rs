//! Persistence handlers.

pub mod memory;

pub use memory::{MemoryReleaseStore, StoreSnapshot};
