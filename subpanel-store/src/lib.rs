//! Subpanel Store - Reactive Cached Stores
//!
//! Per-widget state for record subpanels. A [`SubpanelStore`] owns one
//! record list and one [`SingleValueStatisticsStore`] per statistic its
//! widget layout declares. Stores publish their state through push-based
//! cells and share in-flight fetches through a replay cache.
//!
//! Fetches are spawned on the ambient Tokio runtime.

pub mod cache;
pub mod factory;
pub mod language;
pub mod record_list;
pub mod state;
pub mod statistics;
pub mod subpanel;
pub mod transport;

pub use cache::{CacheSlot, CacheStats, SharedFetch};
pub use factory::{
    RecordListStoreFactory, StatisticsStoreFactory, TransportRecordListStoreFactory,
    TransportStatisticsStoreFactory,
};
pub use language::{LanguageStore, MODULE_LIST};
pub use record_list::{CachedRecordListStore, RecordListFuture, RecordListState, RecordListStore};
pub use state::{StateCell, StateStore};
pub use statistics::{SingleValueStatisticsStore, StatisticFuture, StatisticsState};
pub use subpanel::{BoundWidgetLayout, StatisticsMapFuture, SubpanelStore, SubpanelStoreMap};
pub use transport::{RecordListTransport, StatisticsTransport};
