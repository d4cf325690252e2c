//! Database layer (in-memory).

pub mod memory;

pub use memory::{CleanupStats, DiscountUsageFilter, MemoryDb};
