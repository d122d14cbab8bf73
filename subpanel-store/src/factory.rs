//! Child store factories.
//!
//! The subpanel store never constructs its children directly. Every call to
//! `create` must return a fresh, unshared instance.

use std::sync::Arc;
use subpanel_core::RecordListConfig;

use crate::record_list::{CachedRecordListStore, RecordListStore};
use crate::statistics::SingleValueStatisticsStore;
use crate::transport::{RecordListTransport, StatisticsTransport};

pub trait RecordListStoreFactory: Send + Sync {
    fn create(&self) -> Box<dyn RecordListStore>;
}

pub trait StatisticsStoreFactory: Send + Sync {
    fn create(&self) -> SingleValueStatisticsStore;
}

/// Builds [`CachedRecordListStore`]s over one shared transport.
#[derive(Clone)]
pub struct TransportRecordListStoreFactory {
    transport: Arc<dyn RecordListTransport>,
    config: RecordListConfig,
}

impl TransportRecordListStoreFactory {
    pub fn new(transport: Arc<dyn RecordListTransport>, config: RecordListConfig) -> Self {
        Self { transport, config }
    }
}

impl RecordListStoreFactory for TransportRecordListStoreFactory {
    fn create(&self) -> Box<dyn RecordListStore> {
        Box::new(CachedRecordListStore::new(
            Arc::clone(&self.transport),
            self.config.clone(),
        ))
    }
}

/// Builds statistics stores over one shared transport.
#[derive(Clone)]
pub struct TransportStatisticsStoreFactory {
    transport: Arc<dyn StatisticsTransport>,
}

impl TransportStatisticsStoreFactory {
    pub fn new(transport: Arc<dyn StatisticsTransport>) -> Self {
        Self { transport }
    }
}

impl StatisticsStoreFactory for TransportStatisticsStoreFactory {
    fn create(&self) -> SingleValueStatisticsStore {
        SingleValueStatisticsStore::new(Arc::clone(&self.transport))
    }
}
