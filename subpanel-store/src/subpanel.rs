//! Subpanel store.
//!
//! Composes one record list with the statistics declared by the subpanel's
//! widget layout, and presents them to the view as a single unit.

use futures_util::future::{self, BoxFuture, FutureExt};
use futures_util::stream::BoxStream;
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;
use subpanel_core::{
    SearchCriteria, Statistic, StatisticsMap, StatisticsQuery, StatisticsQueryMap, StoreError,
    SubpanelConfig, SubpanelDefinition, SubpanelResult, WidgetLayout,
};
use tracing::{debug, trace};

use crate::factory::{RecordListStoreFactory, StatisticsStoreFactory};
use crate::language::{LanguageStore, MODULE_LIST};
use crate::record_list::{RecordListFuture, RecordListStore};
use crate::state::{StateCell, StateStore};
use crate::statistics::{SingleValueStatisticsStore, StatisticFuture};

/// Pending result of loading every statistic of a panel.
pub type StatisticsMapFuture = BoxFuture<'static, SubpanelResult<StatisticsMap>>;

/// Subpanel stores keyed by subpanel name.
pub type SubpanelStoreMap = IndexMap<String, SubpanelStore>;

/// Widget layout whose statistic columns carry their store.
pub type BoundWidgetLayout = WidgetLayout<SingleValueStatisticsStore>;

pub struct SubpanelStore {
    /// Whether the view shows this subpanel expanded.
    pub show: bool,
    parent_module: String,
    parent_id: String,
    record_list: Box<dyn RecordListStore>,
    statistics: IndexMap<String, SingleValueStatisticsStore>,
    metadata: StateCell<SubpanelDefinition>,
    widget_layout: BoundWidgetLayout,
    language: Arc<dyn LanguageStore>,
    statistics_factory: Arc<dyn StatisticsStoreFactory>,
    config: SubpanelConfig,
}

impl SubpanelStore {
    pub fn new(
        list_factory: &dyn RecordListStoreFactory,
        language: Arc<dyn LanguageStore>,
        statistics_factory: Arc<dyn StatisticsStoreFactory>,
    ) -> Self {
        Self::with_config(list_factory, language, statistics_factory, SubpanelConfig::default())
    }

    pub fn with_config(
        list_factory: &dyn RecordListStoreFactory,
        language: Arc<dyn LanguageStore>,
        statistics_factory: Arc<dyn StatisticsStoreFactory>,
        config: SubpanelConfig,
    ) -> Self {
        Self {
            show: false,
            parent_module: String::new(),
            parent_id: String::new(),
            record_list: list_factory.create(),
            statistics: IndexMap::new(),
            metadata: StateCell::new(SubpanelDefinition::default()),
            widget_layout: WidgetLayout::default(),
            language,
            statistics_factory,
            config,
        }
    }

    /// Bind the panel to a parent record and a subpanel definition.
    ///
    /// May be called again on navigation. Every call re-derives the record
    /// list criteria and replaces all statistics stores with fresh ones for
    /// the keys the current layout declares.
    pub fn init(&mut self, parent_module: &str, parent_id: &str, meta: SubpanelDefinition) {
        debug!(
            parent_module,
            parent_id,
            subpanel = %meta.name,
            module = %meta.module,
            "Initializing subpanel store"
        );

        self.parent_module = parent_module.to_string();
        self.parent_id = parent_id.to_string();
        self.metadata.publish(|current| *current = meta.clone());

        self.record_list
            .init(&meta.module, self.config.cache_disabled, &self.config.page_size_key);
        self.record_list
            .set_criteria(SearchCriteria::subpanel(&meta.name, parent_module, parent_id));

        self.init_statistics(&meta);
    }

    fn init_statistics(&mut self, meta: &SubpanelDefinition) {
        for (key, store) in self.statistics.drain(..) {
            trace!(key = %key, "Discarding statistics store");
            store.clear();
        }

        let layout: WidgetLayout = WidgetLayout::from_definition(meta);
        let scan = layout.scan();
        for skipped in &scan.skipped {
            debug!(
                row = skipped.row,
                col = skipped.col,
                value = %skipped.value,
                reason = ?skipped.reason,
                "Skipping layout column without a usable statistic key"
            );
        }

        for key in scan.unique_keys() {
            let store = self.statistics_factory.create();
            let query = StatisticsQuery::for_subpanel(key, &self.parent_module, &self.parent_id, &meta.name);
            // A load started here keeps running on its own; the caller asks
            // for results through `load_statistics`.
            let _ = store.init(&meta.module, query, self.config.load_statistics_on_init);
            debug!(key, module = %meta.module, "Created statistics store");
            self.statistics.insert(key.to_string(), store);
        }

        let statistics = &self.statistics;
        self.widget_layout = layout.bind(&scan.slots, |key| statistics.get(key).cloned());
    }

    /// Load the record list. Statistics load separately.
    pub fn load(&self, use_cache: bool) -> RecordListFuture {
        self.record_list.load(use_cache)
    }

    pub fn get_statistic(&self, key: &str) -> Option<&SingleValueStatisticsStore> {
        self.statistics.get(key)
    }

    /// Load one statistic; `None` if the panel has no such statistic.
    pub fn load_statistics(&self, key: &str, use_cache: bool) -> Option<StatisticFuture> {
        self.statistics.get(key).map(|store| store.load(use_cache))
    }

    /// Load every statistic at once.
    ///
    /// `None` when the panel has no statistics. Otherwise every child load
    /// starts now, and the result resolves once all of them have, keyed by
    /// statistic in layout order. The first failure fails the whole result.
    pub fn load_all_statistics(&self, use_cache: bool) -> Option<StatisticsMapFuture> {
        if self.statistics.is_empty() {
            return None;
        }

        let keys: Vec<String> = self.statistics.keys().cloned().collect();
        let loads: Vec<StatisticFuture> = self
            .statistics
            .values()
            .map(|store| store.load(use_cache))
            .collect();
        debug!(count = loads.len(), use_cache, "Loading all statistics");

        Some(
            future::try_join_all(loads)
                .map(move |result| {
                    result.map(|statistics| {
                        keys.into_iter()
                            .zip(statistics)
                            .collect::<IndexMap<String, Statistic>>()
                    })
                })
                .boxed(),
        )
    }

    /// Whether the view should fetch all statistics as one batch.
    pub fn should_batch_statistic(&self) -> bool {
        self.metadata.with(SubpanelDefinition::should_batch)
    }

    pub fn set_statistics_loading(&self, key: &str, loading: bool) {
        if let Some(store) = self.statistics.get(key) {
            store.set_loading(loading);
        }
    }

    pub fn set_all_statistics_loading(&self, loading: bool) {
        for store in self.statistics.values() {
            store.set_loading(loading);
        }
    }

    /// Hand a statistic fetched elsewhere to its store. Unknown keys are ignored.
    pub fn set_statistics(&self, key: &str, statistic: Statistic, cache: bool) -> SubpanelResult<()> {
        match self.statistics.get(key) {
            Some(store) => store.set_statistic(key, statistic, cache),
            None => Ok(()),
        }
    }

    pub fn get_statistic_query(&self, key: &str) -> SubpanelResult<StatisticsQuery> {
        self.statistics
            .get(key)
            .map(SingleValueStatisticsStore::query)
            .ok_or_else(|| {
                StoreError::UnknownStatistic {
                    key: key.to_string(),
                }
                .into()
            })
    }

    /// Queries of every statistic. Empty when the panel has none.
    pub fn get_all_statistic_query(&self) -> StatisticsQueryMap {
        self.statistics
            .iter()
            .map(|(key, store)| (key.clone(), store.query()))
            .collect()
    }

    /// The layout from the last `init`, with stores bound to its statistic columns.
    pub fn widget_layout(&self) -> &BoundWidgetLayout {
        &self.widget_layout
    }

    /// Display title: the field label, then the module list entry, then empty.
    pub fn title(&self) -> String {
        let title_key = self.metadata.with(|meta| meta.title_key.clone());

        self.language
            .field_label(&title_key, &self.parent_module)
            .filter(|label| !label.is_empty())
            .or_else(|| {
                self.language
                    .app_list_strings(MODULE_LIST)
                    .and_then(|list| list.get(&title_key).cloned())
            })
            .unwrap_or_default()
    }

    pub fn icon(&self) -> String {
        self.metadata.with(|meta| meta.icon.clone())
    }

    /// Loading flag of the record list.
    pub fn loading(&self) -> bool {
        self.record_list.loading()
    }

    pub fn loading_changes(&self) -> BoxStream<'static, bool> {
        self.record_list.loading_changes()
    }

    pub fn metadata(&self) -> SubpanelDefinition {
        self.metadata.get()
    }

    pub fn metadata_changes(&self) -> BoxStream<'static, SubpanelDefinition> {
        self.metadata.select(SubpanelDefinition::clone)
    }

    pub fn parent_module(&self) -> &str {
        &self.parent_module
    }

    pub fn parent_id(&self) -> &str {
        &self.parent_id
    }

    pub fn record_list(&self) -> &dyn RecordListStore {
        self.record_list.as_ref()
    }

    /// Registered statistics in layout order.
    pub fn statistics(&self) -> impl Iterator<Item = (&str, &SingleValueStatisticsStore)> {
        self.statistics.iter().map(|(key, store)| (key.as_str(), store))
    }

    /// Reset what depends on the signed-in user. Statistics keep their cache.
    pub fn clear_auth_based(&self) {
        self.record_list.clear_auth_based();
    }

    /// Tear down the panel and every store it owns.
    pub fn clear(self) {
        debug!(subpanel = %self.metadata.with(|meta| meta.name.clone()), "Clearing subpanel store");
        self.metadata.close();
        self.record_list.clear();
        for store in self.statistics.values() {
            store.clear();
        }
    }
}

impl fmt::Debug for SubpanelStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubpanelStore")
            .field("show", &self.show)
            .field("parent_module", &self.parent_module)
            .field("parent_id", &self.parent_id)
            .field("statistics", &self.statistics.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
