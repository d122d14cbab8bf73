//! Replay cache used by the stores.
//!
//! A store keeps at most one computation per key: the [`CacheSlot`] maps
//! each key to its current [`SharedFetch`]. Cached loads join that
//! computation; forced loads replace it. There is no cross-store sharing.

pub mod shared;
pub mod slot;

pub use shared::{current_runtime, SharedFetch};
pub use slot::{CacheSlot, SlotLookup};

/// Hit/miss counters of one cache slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Loads answered by the existing computation.
    pub hits: u64,
    /// Loads that started a new computation.
    pub misses: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
