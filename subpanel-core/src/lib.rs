//! Subpanel Core - Data Types
//!
//! Pure data structures shared by the subpanel stores: query descriptors,
//! statistic payloads, record lists, subpanel metadata, widget layouts,
//! errors and configuration. No async and no store behavior lives here.

pub mod config;
pub mod error;
pub mod layout;
pub mod metadata;
pub mod query;
pub mod record;

pub use config::{ConfigError, RecordListConfig, StoreConfig, SubpanelConfig, SUBPANEL_PAGE_SIZE_KEY};
pub use error::{StoreError, SubpanelError, SubpanelResult, TransportError};
pub use layout::{
    LayoutScan, SkipReason, SkippedColumn, StatisticSlot, WidgetColumn, WidgetLayout, WidgetRow,
};
pub use metadata::{InsightWidgetDefinition, SubpanelDefinition};
pub use query::{
    first_statistic, Statistic, StatisticsMap, StatisticsQuery, StatisticsQueryMap, ViewContext,
};
pub use record::{Pagination, Record, RecordList, SearchCriteria, SearchPreset};

// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================
