//! Fetch collaborators.
//!
//! The stores never talk to the network themselves. They are handed a
//! transport that performs the actual query; implementations must be safe
//! to share between stores.

use async_trait::async_trait;
use std::future::Future;
use subpanel_core::{
    Pagination, RecordList, SearchCriteria, StatisticsMap, StatisticsQueryMap, SubpanelResult,
};

/// Fetches statistics for a module.
///
/// Must resolve with the requested keys, or a subset of them when some have
/// no data.
#[async_trait]
pub trait StatisticsTransport: Send + Sync {
    async fn fetch(&self, module: &str, queries: StatisticsQueryMap) -> SubpanelResult<StatisticsMap>;
}

/// Any `Fn(module, queries) -> Future` closure is a statistics transport.
#[async_trait]
impl<F, Fut> StatisticsTransport for F
where
    F: Fn(String, StatisticsQueryMap) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = SubpanelResult<StatisticsMap>> + Send + 'static,
{
    async fn fetch(&self, module: &str, queries: StatisticsQueryMap) -> SubpanelResult<StatisticsMap> {
        (self)(module.to_string(), queries).await
    }
}

/// Fetches one page of records.
#[async_trait]
pub trait RecordListTransport: Send + Sync {
    async fn fetch(
        &self,
        module: &str,
        criteria: &SearchCriteria,
        pagination: Pagination,
    ) -> SubpanelResult<RecordList>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use subpanel_core::{Statistic, StatisticsQuery, SubpanelError, ViewContext};

    #[tokio::test]
    async fn test_closure_is_a_transport() {
        let transport = |module: String, queries: StatisticsQueryMap| async move {
            let mut map = StatisticsMap::new();
            for key in queries.keys() {
                map.insert(key.clone(), Statistic::new(format!("{module}:{key}"), Default::default()));
            }
            Ok::<_, SubpanelError>(map)
        };

        let mut queries = StatisticsQueryMap::new();
        queries.insert(
            "open_deals".to_string(),
            StatisticsQuery::new("open_deals", ViewContext::new("Accounts", "a-1")),
        );

        let result = StatisticsTransport::fetch(&transport, "Opportunities", queries)
            .await
            .unwrap();
        assert_eq!(result["open_deals"].id, "Opportunities:open_deals");
    }
}
