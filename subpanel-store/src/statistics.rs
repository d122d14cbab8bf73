//! Single-value statistics store.
//!
//! Caches one statistic for one query descriptor. Cached loads share a
//! single in-flight fetch; the resolved value is replayed to late callers
//! without touching the transport again.

use futures_util::future::{self, BoxFuture, FutureExt};
use futures_util::stream::BoxStream;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use subpanel_core::{
    first_statistic, Statistic, StatisticsMap, StatisticsQuery, StatisticsQueryMap, StoreError,
    SubpanelResult, ViewContext,
};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::cache::{current_runtime, CacheSlot, CacheStats, SharedFetch};
use crate::state::{StateCell, StateStore};
use crate::transport::StatisticsTransport;

/// Pending result of a statistic load.
pub type StatisticFuture = BoxFuture<'static, SubpanelResult<Statistic>>;

/// Published state of one statistics store.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatisticsState {
    pub module: String,
    pub query: StatisticsQuery,
    pub statistic: Statistic,
    /// True only between a fetch being issued and its completion.
    pub loading: bool,
}

struct StatisticsInner {
    transport: Arc<dyn StatisticsTransport>,
    state: Arc<StateCell<StatisticsState>>,
    /// One computation per query key.
    cache: CacheSlot<String, StatisticsMap>,
}

/// Handle to a statistics store.
///
/// Cloning yields another handle to the same store; this is how layout
/// columns are bound to the store the panel created for them.
#[derive(Clone)]
pub struct SingleValueStatisticsStore {
    inner: Arc<StatisticsInner>,
}

impl SingleValueStatisticsStore {
    pub fn new(transport: Arc<dyn StatisticsTransport>) -> Self {
        Self {
            inner: Arc::new(StatisticsInner {
                transport,
                state: Arc::new(StateCell::new(StatisticsState::default())),
                cache: CacheSlot::new(),
            }),
        }
    }

    /// Set module and query, publishing the new state.
    ///
    /// Re-init replaces module and query but keeps the cache, so returning
    /// to a key loaded earlier reuses its computation. With `load == true`
    /// the cached load is started and returned.
    pub fn init(&self, module: &str, query: StatisticsQuery, load: bool) -> Option<StatisticFuture> {
        debug!(module, key = %query.key, load, "Initializing statistics store");
        self.inner.state.publish(|state| {
            state.module = module.to_string();
            state.query = query;
        });

        if !load {
            return None;
        }

        Some(self.load(true))
    }

    /// Load or reload the statistic.
    ///
    /// With `use_cache` the current computation for the query key is joined
    /// if one exists, pending or resolved, and its value is published again
    /// when it resolves. Otherwise a fetch is issued: `loading` goes true now
    /// and false when the fetch settles, whatever its outcome and whether or
    /// not anyone still awaits it.
    ///
    /// Outside a Tokio runtime a load that would fetch resolves to
    /// [`StoreError::NoRuntime`] and leaves state and cache untouched.
    pub fn load(&self, use_cache: bool) -> StatisticFuture {
        let inner = &self.inner;
        if inner.state.is_closed() {
            return future::ready(Err(StoreError::Closed { store: "statistics" }.into())).boxed();
        }

        let (module, query) = inner
            .state
            .with(|state| (state.module.clone(), state.query.clone()));
        let key = query.key.clone();

        let lookup = inner.cache.get_or_start(&key, use_cache, || {
            let handle = current_runtime()?;
            inner.state.publish(|state| state.loading = true);
            Ok(SharedFetch::spawn(
                &handle,
                fetch_statistic(
                    Arc::clone(&inner.transport),
                    Arc::clone(&inner.state),
                    module.clone(),
                    query,
                ),
            ))
        });

        let lookup = match lookup {
            Ok(lookup) => lookup,
            Err(e) => {
                warn!(module = %module, key = %key, error = %e, "Statistic load not started");
                return future::ready(Err(e)).boxed();
            }
        };

        if !lookup.hit {
            debug!(module = %module, key = %key, use_cache, "Statistic fetch issued");
            return lookup
                .fetch
                .join()
                .map(|result| result.map(|map| first_statistic(&map)))
                .boxed();
        }

        debug!(module = %module, key = %key, "Statistic cache hit");
        let state = Arc::clone(&inner.state);
        lookup
            .fetch
            .join()
            .map(move |result| -> SubpanelResult<Statistic> {
                let statistic = first_statistic(&result?);
                state.publish(|state| state.statistic = statistic.clone());
                Ok(statistic)
            })
            .boxed()
    }

    /// Override the loading flag.
    pub fn set_loading(&self, loading: bool) {
        self.inner.state.publish(|state| state.loading = loading);
    }

    /// Publish a statistic fetched elsewhere.
    ///
    /// With `cache` the value also replaces the cached computation for the
    /// current query key, so a following cached load returns it without a
    /// transport call.
    pub fn set_statistic(&self, key: &str, statistic: Statistic, cache: bool) -> SubpanelResult<()> {
        self.inner.state.publish(|state| {
            state.statistic = statistic.clone();
            state.loading = false;
        });

        if !cache {
            return Ok(());
        }

        let mut map = StatisticsMap::new();
        map.insert(key.to_string(), statistic);
        let tag = self.inner.state.with(|state| state.query.key.clone());
        self.inner.cache.seed(tag, SharedFetch::ready(map))
    }

    /// Copy of the current query descriptor.
    pub fn query(&self) -> StatisticsQuery {
        self.inner.state.with(|state| state.query.clone())
    }

    pub fn context(&self) -> ViewContext {
        self.inner.state.with(|state| state.query.context.clone())
    }

    /// Replace the record context of the query.
    pub fn set_context(&self, context: ViewContext) {
        self.inner.state.publish(|state| state.query.context = context);
    }

    pub fn module(&self) -> String {
        self.inner.state.with(|state| state.module.clone())
    }

    /// The last published statistic.
    pub fn statistic(&self) -> Statistic {
        self.inner.state.with(|state| state.statistic.clone())
    }

    pub fn loading(&self) -> bool {
        self.inner.state.with(|state| state.loading)
    }

    pub fn state(&self) -> StatisticsState {
        self.inner.state.get()
    }

    pub fn subscribe(&self) -> watch::Receiver<StatisticsState> {
        self.inner.state.subscribe()
    }

    /// Distinct statistic values, starting with the current one.
    pub fn statistic_changes(&self) -> BoxStream<'static, Statistic> {
        self.inner.state.select(|state| state.statistic.clone())
    }

    /// Distinct loading flags, starting with the current one.
    pub fn loading_changes(&self) -> BoxStream<'static, bool> {
        self.inner.state.select(|state| state.loading)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.inner.cache.stats()
    }

    pub fn is_cleared(&self) -> bool {
        self.inner.state.is_closed()
    }
}

impl StateStore for SingleValueStatisticsStore {
    fn clear(&self) {
        debug!(key = %self.query().key, "Clearing statistics store");
        self.inner.state.close();
        self.inner.cache.invalidate();
    }

    /// Nothing here outlives a session except the cache, so this is a full clear.
    fn clear_auth_based(&self) {
        self.clear();
    }
}

impl fmt::Debug for SingleValueStatisticsStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.get();
        f.debug_struct("SingleValueStatisticsStore")
            .field("module", &state.module)
            .field("key", &state.query.key)
            .field("loading", &state.loading)
            .finish_non_exhaustive()
    }
}

/// Handles compare by identity.
impl PartialEq for SingleValueStatisticsStore {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

async fn fetch_statistic(
    transport: Arc<dyn StatisticsTransport>,
    state: Arc<StateCell<StatisticsState>>,
    module: String,
    query: StatisticsQuery,
) -> SubpanelResult<StatisticsMap> {
    let key = query.key.clone();
    let mut queries = StatisticsQueryMap::new();
    queries.insert(key.clone(), query);

    let result = transport.fetch(&module, queries).await;
    match &result {
        Ok(map) => {
            let statistic = first_statistic(map);
            state.publish(|state| {
                state.statistic = statistic;
                state.loading = false;
            });
        }
        Err(e) => {
            warn!(module = %module, key = %key, error = %e, "Statistic fetch failed");
            state.publish(|state| state.loading = false);
        }
    }
    result
}
