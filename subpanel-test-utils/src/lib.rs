//! Subpanel Test Utilities
//!
//! Shared test infrastructure for the subpanel workspace:
//! - Mock transports and label lookup
//! - Test fixtures for subpanel metadata and panel wiring
//! - Proptest generators for queries, statistics and layouts
//! - Custom assertions for store results

pub use subpanel_core::{
    InsightWidgetDefinition, Pagination, Record, RecordList, SearchCriteria, Statistic,
    StatisticsMap, StatisticsQuery, StatisticsQueryMap, StoreConfig, StoreError,
    SubpanelConfig, SubpanelDefinition, SubpanelError, SubpanelResult, TransportError,
    ViewContext,
};
pub use subpanel_store::{
    LanguageStore, RecordListTransport, StatisticsTransport, SubpanelStore,
    TransportRecordListStoreFactory, TransportStatisticsStoreFactory,
};

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Semaphore;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Install a test log subscriber honoring `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// MOCK COLLABORATORS
// ============================================================================

/// Statistics transport that counts calls and can fail or stall on demand.
///
/// Unless a response is configured, key `k` on call `n` resolves to a
/// statistic with id `"k-n"` and `{"value": n}`.
#[derive(Debug)]
pub struct MockStatisticsTransport {
    calls: AtomicUsize,
    requests: Mutex<Vec<(String, StatisticsQueryMap)>>,
    responses: Mutex<HashMap<String, Statistic>>,
    failing: Mutex<HashSet<String>>,
    held: AtomicBool,
    gate: Semaphore,
}

impl MockStatisticsTransport {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            responses: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            held: AtomicBool::new(false),
            gate: Semaphore::new(0),
        }
    }

    /// Always answer `key` with `statistic`.
    pub fn with_response(self, key: impl Into<String>, statistic: Statistic) -> Self {
        lock(&self.responses).insert(key.into(), statistic);
        self
    }

    /// Fail every request that includes `key`.
    pub fn fail_key(&self, key: impl Into<String>) {
        lock(&self.failing).insert(key.into());
    }

    pub fn recover_key(&self, key: &str) {
        lock(&self.failing).remove(key);
    }

    /// Make requests wait until [`release`](Self::release) is called.
    pub fn hold(&self) {
        self.held.store(true, Ordering::SeqCst);
    }

    /// Let `count` waiting (or future) requests through.
    pub fn release(&self, count: usize) {
        self.gate.add_permits(count);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every request received, in order.
    pub fn requests(&self) -> Vec<(String, StatisticsQueryMap)> {
        lock(&self.requests).clone()
    }
}

impl Default for MockStatisticsTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StatisticsTransport for MockStatisticsTransport {
    async fn fetch(&self, module: &str, queries: StatisticsQueryMap) -> SubpanelResult<StatisticsMap> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        lock(&self.requests).push((module.to_string(), queries.clone()));

        if self.held.load(Ordering::SeqCst) {
            if let Ok(permit) = self.gate.acquire().await {
                permit.forget();
            }
        }

        let failing = queries.keys().find(|key| lock(&self.failing).contains(*key));
        if let Some(key) = failing {
            return Err(TransportError::RequestFailed {
                module: module.to_string(),
                reason: format!("statistic {key} unavailable"),
            }
            .into());
        }

        let responses = lock(&self.responses);
        Ok(queries
            .keys()
            .map(|key| {
                let statistic = responses.get(key).cloned().unwrap_or_else(|| {
                    Statistic::new(format!("{key}-{call}"), Default::default()).with_value("value", call)
                });
                (key.clone(), statistic)
            })
            .collect())
    }
}

/// Record list transport serving `total` synthetic records.
#[derive(Debug)]
pub struct MockRecordListTransport {
    calls: AtomicUsize,
    total: u64,
    fail: AtomicBool,
    requests: Mutex<Vec<(String, SearchCriteria, Pagination)>>,
}

impl MockRecordListTransport {
    pub fn new(total: u64) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            total,
            fail: AtomicBool::new(false),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<(String, SearchCriteria, Pagination)> {
        lock(&self.requests).clone()
    }
}

impl Default for MockRecordListTransport {
    fn default() -> Self {
        Self::new(25)
    }
}

#[async_trait]
impl RecordListTransport for MockRecordListTransport {
    async fn fetch(
        &self,
        module: &str,
        criteria: &SearchCriteria,
        pagination: Pagination,
    ) -> SubpanelResult<RecordList> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.requests).push((module.to_string(), criteria.clone(), pagination));

        if self.fail.load(Ordering::SeqCst) {
            return Err(TransportError::Timeout {
                module: module.to_string(),
            }
            .into());
        }

        let start = pagination.offset().min(self.total);
        let end = (start + u64::from(pagination.page_size)).min(self.total);
        let records = (start..end)
            .map(|i| Record {
                id: format!("{}-{i}", module.to_lowercase()),
                module: module.to_string(),
                ..Default::default()
            })
            .collect();

        Ok(RecordList {
            records,
            pagination: Pagination {
                total: self.total,
                ..pagination
            },
        })
    }
}

/// Label lookup backed by in-memory tables.
#[derive(Debug, Clone, Default)]
pub struct MockLanguageStore {
    field_labels: HashMap<(String, String), String>,
    app_lists: HashMap<String, HashMap<String, String>>,
}

impl MockLanguageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field_label(mut self, module: &str, key: &str, label: &str) -> Self {
        self.field_labels
            .insert((module.to_string(), key.to_string()), label.to_string());
        self
    }

    pub fn with_app_list_string(mut self, list: &str, value: &str, label: &str) -> Self {
        self.app_lists
            .entry(list.to_string())
            .or_default()
            .insert(value.to_string(), label.to_string());
        self
    }
}

impl LanguageStore for MockLanguageStore {
    fn field_label(&self, key: &str, module: &str) -> Option<String> {
        self.field_labels
            .get(&(module.to_string(), key.to_string()))
            .cloned()
    }

    fn app_list_strings(&self, list: &str) -> Option<HashMap<String, String>> {
        self.app_lists.get(list).cloned()
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for subpanel types.

    use super::*;
    use proptest::prelude::*;
    use serde_json::{json, Value};

    pub fn arb_statistic_key() -> impl Strategy<Value = String> {
        "[a-z][a-z_]{0,15}"
    }

    pub fn arb_view_context() -> impl Strategy<Value = ViewContext> {
        ("[A-Z][a-z]{2,10}", "[a-f0-9]{8}").prop_map(|(module, id)| ViewContext::new(module, id))
    }

    pub fn arb_statistics_query() -> impl Strategy<Value = StatisticsQuery> {
        (
            arb_statistic_key(),
            arb_view_context(),
            prop::collection::btree_map("[a-z]{1,8}", "[a-z0-9]{0,8}", 0..4),
        )
            .prop_map(|(key, context, params)| StatisticsQuery {
                key,
                context,
                params,
            })
    }

    pub fn arb_statistic() -> impl Strategy<Value = Statistic> {
        ("[a-z0-9]{0,8}", any::<i64>())
            .prop_map(|(id, count)| Statistic::new(id, Default::default()).with_value("count", count))
    }

    /// A column value: usable keys, unusable keys, or no statistic at all.
    pub fn arb_layout_column() -> impl Strategy<Value = Value> {
        prop_oneof![
            3 => arb_statistic_key().prop_map(|key| json!({ "statistic": key })),
            1 => any::<i64>().prop_map(|n| json!({ "statistic": n })),
            1 => Just(json!({ "statistic": "" })),
            1 => Just(json!({ "statistic": true })),
            1 => Just(json!({ "labelKey": "LBL_TOTAL" })),
        ]
    }

    /// A widget layout with up to four rows of up to five columns.
    pub fn arb_layout() -> impl Strategy<Value = Value> {
        prop::collection::vec(prop::collection::vec(arb_layout_column(), 0..5), 0..4).prop_map(
            |rows| {
                let rows: Vec<Value> = rows.into_iter().map(|cols| json!({ "cols": cols })).collect();
                json!({ "rows": rows })
            },
        )
    }

    /// Any JSON value an author might put in `insightWidget.batch`.
    pub fn arb_batch_value() -> impl Strategy<Value = Option<Value>> {
        prop_oneof![
            Just(None),
            any::<bool>().prop_map(|b| Some(Value::Bool(b))),
            any::<i32>().prop_map(|n| Some(json!(n))),
            "[a-z]{0,5}".prop_map(|s| Some(Value::String(s))),
            Just(Some(Value::Null)),
        ]
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built metadata and panel wiring.

    use super::*;
    use serde_json::{json, Value};

    pub const PARENT_MODULE: &str = "Accounts";
    pub const PARENT_ID: &str = "acc-1";

    /// A subpanel definition declaring `layout` as its widget layout.
    pub fn subpanel_with_layout(name: &str, module: &str, layout: Value) -> SubpanelDefinition {
        let mut meta = SubpanelDefinition::new(name, module);
        meta.title_key = format!("LBL_{}", name.to_uppercase());
        meta.icon = module.to_lowercase();
        meta.insight_widget = Some(InsightWidgetDefinition {
            batch: None,
            options: Some(json!({ "insightWidget": layout })),
        });
        meta
    }

    /// One usable key next to a numeric one.
    pub fn open_deals_layout() -> Value {
        json!({
            "rows": [
                { "cols": [ { "statistic": "open_deals" }, { "statistic": 42 } ] }
            ]
        })
    }

    /// Two rows, three keys, `open_deals` declared twice.
    pub fn dashboard_layout() -> Value {
        json!({
            "rows": [
                { "cols": [ { "statistic": "open_deals" }, { "statistic": "won_deals" } ] },
                { "cols": [ { "statistic": "lost_deals" }, { "statistic": "open_deals", "icon": "money" } ] }
            ]
        })
    }

    pub fn opportunities_subpanel() -> SubpanelDefinition {
        subpanel_with_layout("opportunities", "Opportunities", open_deals_layout())
    }

    /// A subpanel without any widget layout.
    pub fn contacts_subpanel() -> SubpanelDefinition {
        SubpanelDefinition::new("contacts", "Contacts")
    }

    /// Mock collaborators plus the factories that wrap them.
    pub struct PanelHarness {
        pub statistics: Arc<MockStatisticsTransport>,
        pub records: Arc<MockRecordListTransport>,
        pub language: Arc<MockLanguageStore>,
        pub config: StoreConfig,
    }

    impl PanelHarness {
        pub fn new() -> Self {
            Self::with_statistics(MockStatisticsTransport::new())
        }

        pub fn with_statistics(statistics: MockStatisticsTransport) -> Self {
            Self {
                statistics: Arc::new(statistics),
                records: Arc::new(MockRecordListTransport::default()),
                language: Arc::new(MockLanguageStore::new()),
                config: StoreConfig::default(),
            }
        }

        pub fn with_language(mut self, language: MockLanguageStore) -> Self {
            self.language = Arc::new(language);
            self
        }

        pub fn with_config(mut self, config: StoreConfig) -> Self {
            self.config = config;
            self
        }

        /// A fresh, uninitialized panel.
        pub fn store(&self) -> SubpanelStore {
            let list_factory = TransportRecordListStoreFactory::new(
                self.records.clone(),
                self.config.record_list.clone(),
            );
            let statistics_factory = TransportStatisticsStoreFactory::new(self.statistics.clone());

            SubpanelStore::with_config(
                &list_factory,
                self.language.clone(),
                Arc::new(statistics_factory),
                self.config.subpanel.clone(),
            )
        }

        /// A panel initialized for `meta` under the default parent record.
        pub fn init(&self, meta: SubpanelDefinition) -> SubpanelStore {
            let mut store = self.store();
            store.init(PARENT_MODULE, PARENT_ID, meta);
            store
        }
    }

    impl Default for PanelHarness {
        fn default() -> Self {
            Self::new()
        }
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for store results.

    use super::*;

    #[track_caller]
    pub fn assert_transport_error<T: std::fmt::Debug>(result: &SubpanelResult<T>) {
        match result {
            Err(SubpanelError::Transport(_)) => {}
            other => panic!("Expected Transport error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_store_closed<T: std::fmt::Debug>(result: &SubpanelResult<T>) {
        match result {
            Err(SubpanelError::Store(StoreError::Closed { .. })) => {}
            other => panic!("Expected Closed store error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_unknown_statistic<T: std::fmt::Debug>(result: &SubpanelResult<T>, key: &str) {
        match result {
            Err(SubpanelError::Store(StoreError::UnknownStatistic { key: k })) if k == key => {}
            other => panic!("Expected UnknownStatistic({}), got: {:?}", key, other),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[tokio::test]
    async fn test_mock_statistics_default_response() {
        let transport = MockStatisticsTransport::new();
        let mut queries = StatisticsQueryMap::new();
        queries.insert(
            "open_deals".to_string(),
            StatisticsQuery::for_subpanel("open_deals", "Accounts", "a-1", "opportunities"),
        );

        let result = transport.fetch("Opportunities", queries).await.unwrap();
        assert_eq!(result["open_deals"].id, "open_deals-1");
        assert_eq!(transport.calls(), 1);
        assert_eq!(transport.requests()[0].0, "Opportunities");
    }

    #[tokio::test]
    async fn test_mock_statistics_failing_key() {
        let transport = MockStatisticsTransport::new();
        transport.fail_key("open_deals");
        let mut queries = StatisticsQueryMap::new();
        queries.insert(
            "open_deals".to_string(),
            StatisticsQuery::new("open_deals", ViewContext::default()),
        );

        let result = transport.fetch("Opportunities", queries).await;
        assertions::assert_transport_error(&result);
    }

    #[tokio::test]
    async fn test_mock_record_list_pages() {
        let transport = MockRecordListTransport::new(12);
        let page = Pagination {
            page_size: 10,
            current_page: 1,
            total: 0,
        };

        let list = transport
            .fetch("Contacts", &SearchCriteria::default(), page)
            .await
            .unwrap();
        assert_eq!(list.records.len(), 2);
        assert_eq!(list.records[0].id, "contacts-10");
        assert_eq!(list.pagination.total, 12);
    }

    #[test]
    fn test_mock_language_lookup() {
        let language = MockLanguageStore::new()
            .with_field_label("Accounts", "LBL_CONTACTS", "Contacts")
            .with_app_list_string("moduleList", "Cases", "Support Cases");

        assert_eq!(
            language.field_label("LBL_CONTACTS", "Accounts").as_deref(),
            Some("Contacts")
        );
        assert!(language.field_label("LBL_CONTACTS", "Leads").is_none());
        assert_eq!(language.app_list_strings("moduleList").unwrap()["Cases"], "Support Cases");
    }

    #[test]
    fn test_fixture_layout_is_reachable() {
        let meta = fixtures::opportunities_subpanel();
        assert!(meta.layout_value().is_some());
        assert!(fixtures::contacts_subpanel().layout_value().is_none());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn prop_generated_queries_are_well_formed(query in generators::arb_statistics_query()) {
            prop_assert!(!query.key.is_empty());
            prop_assert!(!query.context.module.is_empty());
        }
    }
}
