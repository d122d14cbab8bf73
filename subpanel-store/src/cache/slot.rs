//! Keyed cache slot holding the current shared fetch of each key.

use indexmap::IndexMap;
use std::hash::Hash;
use std::sync::Mutex;
use subpanel_core::{StoreError, SubpanelResult};
use tracing::trace;

use super::shared::SharedFetch;
use super::CacheStats;

struct SlotInner<K, T>
where
    T: Clone + Send + Sync + 'static,
{
    entries: IndexMap<K, SharedFetch<T>>,
    stats: CacheStats,
}

/// The "current pending or resolved computation" of one store, per key.
///
/// Each key maps to at most one [`SharedFetch`]. An entry is only replaced
/// on a forced reload or an explicit seed, so concurrent cached loads share
/// a single fetch and switching back to an earlier key reuses its result.
pub struct CacheSlot<K, T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Mutex<SlotInner<K, T>>,
}

/// Outcome of [`CacheSlot::get_or_start`].
pub struct SlotLookup<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fetch: SharedFetch<T>,
    pub hit: bool,
}

impl<K, T> CacheSlot<K, T>
where
    K: Hash + Eq + Clone,
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(SlotInner {
                entries: IndexMap::new(),
                stats: CacheStats::default(),
            }),
        }
    }

    /// Return the cached fetch for `key`, or start a new one with `start`.
    ///
    /// With `use_cache == false` a new fetch is always started and replaces
    /// the entry for `key`. `start` runs under the slot lock, so two
    /// concurrent callers can never both start a fetch for the same key.
    /// When `start` fails nothing is stored.
    pub fn get_or_start<F>(&self, key: &K, use_cache: bool, start: F) -> SubpanelResult<SlotLookup<T>>
    where
        F: FnOnce() -> SubpanelResult<SharedFetch<T>>,
    {
        let mut inner = self.inner.lock().map_err(|_| StoreError::LockPoisoned)?;

        if use_cache {
            if let Some(fetch) = inner.entries.get(key).cloned() {
                inner.stats.hits += 1;
                return Ok(SlotLookup { fetch, hit: true });
            }
        }

        let fetch = start()?;
        inner.stats.misses += 1;
        inner.entries.insert(key.clone(), fetch.clone());
        Ok(SlotLookup { fetch, hit: false })
    }

    /// Replace the entry for `key` with an already-known computation.
    pub fn seed(&self, key: K, fetch: SharedFetch<T>) -> SubpanelResult<()> {
        let mut inner = self.inner.lock().map_err(|_| StoreError::LockPoisoned)?;
        inner.entries.insert(key, fetch);
        Ok(())
    }

    /// Drop every entry. Subscribers already holding one keep their result.
    pub fn invalidate(&self) {
        match self.inner.lock() {
            Ok(mut inner) => inner.entries.clear(),
            Err(poisoned) => {
                trace!("Invalidating poisoned cache slot");
                poisoned.into_inner().entries.clear();
            }
        }
    }

    /// Whether an entry exists for `key`.
    pub fn contains(&self, key: &K) -> bool {
        self.inner
            .lock()
            .map(|inner| inner.entries.contains_key(key))
            .unwrap_or(false)
    }

    /// Number of keys with an entry.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .map(|inner| inner.entries.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.inner
            .lock()
            .map(|inner| inner.stats.clone())
            .unwrap_or_default()
    }
}

impl<K, T> Default for CacheSlot<K, T>
where
    K: Hash + Eq + Clone,
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
