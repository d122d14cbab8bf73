//! Record list store.
//!
//! [`RecordListStore`] is the contract the subpanel store composes against.
//! [`CachedRecordListStore`] implements it on top of a [`RecordListTransport`]
//! with the same keyed replay cache the statistics store uses.

use futures_util::future::{self, BoxFuture, FutureExt};
use futures_util::stream::BoxStream;
use std::fmt;
use std::sync::Arc;
use subpanel_core::{
    Pagination, RecordList, RecordListConfig, SearchCriteria, StoreError, SubpanelResult,
};
use tracing::{debug, warn};

use crate::cache::{current_runtime, CacheSlot, CacheStats, SharedFetch};
use crate::state::{StateCell, StateStore};
use crate::transport::RecordListTransport;

/// Pending result of a record list load.
pub type RecordListFuture = BoxFuture<'static, SubpanelResult<RecordList>>;

/// A cached, paginated record list.
pub trait RecordListStore: StateStore + Send + Sync {
    /// Set the module to list and how to page it.
    fn init(&self, module: &str, cache_disabled: bool, page_size_key: &str);

    /// Load the current page. See [`CachedRecordListStore::load`].
    fn load(&self, use_cache: bool) -> RecordListFuture;

    fn loading(&self) -> bool;

    /// Distinct loading flags, starting with the current one.
    fn loading_changes(&self) -> BoxStream<'static, bool>;

    fn criteria(&self) -> SearchCriteria;

    /// Replace the criteria. Resets to the first page.
    fn set_criteria(&self, criteria: SearchCriteria);

    /// Select a zero-based page.
    fn set_page(&self, page: u32);

    fn pagination(&self) -> Pagination;

    /// The last loaded page.
    fn records(&self) -> RecordList;
}

/// Published state of a record list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordListState {
    pub module: String,
    pub criteria: SearchCriteria,
    pub pagination: Pagination,
    pub records: RecordList,
    pub loading: bool,
    pub cache_disabled: bool,
}

/// What a cached page was fetched for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PageKey {
    module: String,
    criteria: SearchCriteria,
    page: u32,
    page_size: u32,
}

impl PageKey {
    fn of(state: &RecordListState) -> Self {
        Self {
            module: state.module.clone(),
            criteria: state.criteria.clone(),
            page: state.pagination.current_page,
            page_size: state.pagination.page_size,
        }
    }
}

struct RecordListInner {
    transport: Arc<dyn RecordListTransport>,
    config: RecordListConfig,
    state: Arc<StateCell<RecordListState>>,
    cache: CacheSlot<PageKey, RecordList>,
}

/// [`RecordListStore`] backed by a transport and a per-page replay cache.
#[derive(Clone)]
pub struct CachedRecordListStore {
    inner: Arc<RecordListInner>,
}

impl CachedRecordListStore {
    pub fn new(transport: Arc<dyn RecordListTransport>, config: RecordListConfig) -> Self {
        Self {
            inner: Arc::new(RecordListInner {
                transport,
                config,
                state: Arc::new(StateCell::new(RecordListState::default())),
                cache: CacheSlot::new(),
            }),
        }
    }

    pub fn state(&self) -> RecordListState {
        self.inner.state.get()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.inner.cache.stats()
    }
}

impl RecordListStore for CachedRecordListStore {
    fn init(&self, module: &str, cache_disabled: bool, page_size_key: &str) {
        let page_size = self.inner.config.page_size(page_size_key);
        debug!(module, cache_disabled, page_size, "Initializing record list store");
        self.inner.state.publish(|state| {
            state.module = module.to_string();
            state.cache_disabled = cache_disabled;
            state.pagination = Pagination::first_page(page_size);
        });
    }

    /// Load the current page.
    ///
    /// A cached load joins the computation for the same module, criteria and
    /// page. A store initialized with `cache_disabled` always fetches.
    fn load(&self, use_cache: bool) -> RecordListFuture {
        let inner = &self.inner;
        if inner.state.is_closed() {
            return future::ready(Err(StoreError::Closed { store: "record_list" }.into())).boxed();
        }

        let (key, cache_disabled) = inner
            .state
            .with(|state| (PageKey::of(state), state.cache_disabled));
        let use_cache = use_cache && !cache_disabled;

        let lookup = inner.cache.get_or_start(&key, use_cache, || {
            let handle = current_runtime()?;
            inner.state.publish(|state| state.loading = true);
            Ok(SharedFetch::spawn(
                &handle,
                fetch_page(Arc::clone(&inner.transport), Arc::clone(&inner.state), key.clone()),
            ))
        });

        let lookup = match lookup {
            Ok(lookup) => lookup,
            Err(e) => {
                warn!(module = %key.module, page = key.page, error = %e, "Record list load not started");
                return future::ready(Err(e)).boxed();
            }
        };

        debug!(module = %key.module, page = key.page, hit = lookup.hit, "Record list load");
        if !lookup.hit {
            return lookup.fetch.join().boxed();
        }

        // Returning to a cached page shows that page again.
        let state = Arc::clone(&inner.state);
        lookup
            .fetch
            .join()
            .map(move |result| -> SubpanelResult<RecordList> {
                let list = result?;
                state.publish(|state| {
                    state.pagination.total = list.pagination.total;
                    state.records = list.clone();
                });
                Ok(list)
            })
            .boxed()
    }

    fn loading(&self) -> bool {
        self.inner.state.with(|state| state.loading)
    }

    fn loading_changes(&self) -> BoxStream<'static, bool> {
        self.inner.state.select(|state| state.loading)
    }

    fn criteria(&self) -> SearchCriteria {
        self.inner.state.with(|state| state.criteria.clone())
    }

    fn set_criteria(&self, criteria: SearchCriteria) {
        self.inner.state.publish(|state| {
            state.criteria = criteria;
            state.pagination.current_page = 0;
        });
    }

    fn set_page(&self, page: u32) {
        self.inner
            .state
            .publish(|state| state.pagination.current_page = page);
    }

    fn pagination(&self) -> Pagination {
        self.inner.state.with(|state| state.pagination)
    }

    fn records(&self) -> RecordList {
        self.inner.state.with(|state| state.records.clone())
    }
}

impl StateStore for CachedRecordListStore {
    fn clear(&self) {
        debug!(module = %self.inner.state.with(|s| s.module.clone()), "Clearing record list store");
        self.inner.state.close();
        self.inner.cache.invalidate();
    }

    /// Drops the cached page; the state stays open for the next identity.
    fn clear_auth_based(&self) {
        self.inner.cache.invalidate();
        self.inner.state.publish(|state| {
            state.records = RecordList::default();
            state.loading = false;
        });
    }
}

impl fmt::Debug for CachedRecordListStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.get();
        f.debug_struct("CachedRecordListStore")
            .field("module", &state.module)
            .field("pagination", &state.pagination)
            .field("loading", &state.loading)
            .finish_non_exhaustive()
    }
}

async fn fetch_page(
    transport: Arc<dyn RecordListTransport>,
    state: Arc<StateCell<RecordListState>>,
    key: PageKey,
) -> SubpanelResult<RecordList> {
    let pagination = Pagination {
        page_size: key.page_size,
        current_page: key.page,
        total: 0,
    };

    let result = transport.fetch(&key.module, &key.criteria, pagination).await;
    match &result {
        Ok(list) => {
            let list = list.clone();
            state.publish(|state| {
                state.pagination.total = list.pagination.total;
                state.records = list;
                state.loading = false;
            });
        }
        Err(e) => {
            warn!(module = %key.module, page = key.page, error = %e, "Record list fetch failed");
            state.publish(|state| state.loading = false);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use subpanel_core::{Record, SUBPANEL_PAGE_SIZE_KEY};

    #[derive(Default)]
    struct PagingTransport {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RecordListTransport for PagingTransport {
        async fn fetch(
            &self,
            module: &str,
            _criteria: &SearchCriteria,
            pagination: Pagination,
        ) -> SubpanelResult<RecordList> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let records = (0..pagination.page_size)
                .map(|i| Record {
                    id: format!("{}-{}", pagination.current_page, i),
                    module: module.to_string(),
                    ..Default::default()
                })
                .collect();
            Ok(RecordList {
                records,
                pagination: Pagination { total: 42, ..pagination },
            })
        }
    }

    fn store(transport: &Arc<PagingTransport>) -> CachedRecordListStore {
        let transport: Arc<dyn RecordListTransport> = transport.clone();
        CachedRecordListStore::new(transport, RecordListConfig::default())
    }

    #[tokio::test]
    async fn test_init_resolves_page_size() {
        let transport = Arc::new(PagingTransport::default());
        let store = store(&transport);

        store.init("Contacts", false, SUBPANEL_PAGE_SIZE_KEY);
        assert_eq!(store.pagination(), Pagination::first_page(10));

        store.init("Contacts", false, "unknown_key");
        assert_eq!(store.pagination().page_size, 20);
    }

    #[tokio::test]
    async fn test_cached_load_reuses_page() {
        let transport = Arc::new(PagingTransport::default());
        let store = store(&transport);
        store.init("Contacts", false, SUBPANEL_PAGE_SIZE_KEY);

        let first = store.load(true).await.unwrap();
        let second = store.load(true).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.records.len(), 10);
        assert_eq!(store.pagination().total, 42);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cache_disabled_always_fetches() {
        let transport = Arc::new(PagingTransport::default());
        let store = store(&transport);
        store.init("Contacts", true, SUBPANEL_PAGE_SIZE_KEY);

        store.load(true).await.unwrap();
        store.load(true).await.unwrap();
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_page_and_criteria_changes_miss() {
        let transport = Arc::new(PagingTransport::default());
        let store = store(&transport);
        store.init("Contacts", false, SUBPANEL_PAGE_SIZE_KEY);
        store.load(true).await.unwrap();

        store.set_page(2);
        assert_eq!(store.load(true).await.unwrap().records[0].id, "2-0");

        store.set_criteria(SearchCriteria::subpanel("contacts", "Accounts", "a-1"));
        assert_eq!(store.pagination().current_page, 0);
        store.load(true).await.unwrap();

        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_returning_to_cached_page_republishes_it() {
        let transport = Arc::new(PagingTransport::default());
        let store = store(&transport);
        store.init("Contacts", false, SUBPANEL_PAGE_SIZE_KEY);
        let first = store.load(true).await.unwrap();

        store.set_page(1);
        store.load(true).await.unwrap();
        assert_eq!(store.records().records[0].id, "1-0");

        store.set_page(0);
        assert_eq!(store.load(true).await.unwrap(), first);
        assert_eq!(store.records(), first);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_load_outside_runtime_leaves_state_untouched() {
        let transport = Arc::new(PagingTransport::default());
        let store = store(&transport);
        store.init("Contacts", false, SUBPANEL_PAGE_SIZE_KEY);

        let result = store.load(true).now_or_never();
        assert_eq!(result, Some(Err(StoreError::NoRuntime.into())));
        assert!(!store.loading());

        let rt = tokio::runtime::Runtime::new().unwrap();
        let list = rt.block_on(store.load(true)).unwrap();
        assert_eq!(list.records.len(), 10);
        assert!(!store.loading());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_clear_auth_based_keeps_store_usable() {
        let transport = Arc::new(PagingTransport::default());
        let store = store(&transport);
        store.init("Contacts", false, SUBPANEL_PAGE_SIZE_KEY);
        store.load(true).await.unwrap();

        store.clear_auth_based();
        assert!(store.records().records.is_empty());
        store.load(true).await.unwrap();
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_clear_rejects_loads() {
        let transport = Arc::new(PagingTransport::default());
        let store = store(&transport);
        store.init("Contacts", false, SUBPANEL_PAGE_SIZE_KEY);

        store.clear();
        assert_eq!(
            store.load(true).await,
            Err(StoreError::Closed { store: "record_list" }.into())
        );
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }
}
