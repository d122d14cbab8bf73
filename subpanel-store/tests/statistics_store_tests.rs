//! Integration tests for the single-value statistics store.
//!
//! Covers fetch sharing, loading flag transitions, failure replay and
//! cache seeding against the mock transport.

use futures_util::{Stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use subpanel_store::{SingleValueStatisticsStore, StateStore, StatisticsTransport};
use subpanel_test_utils::assertions::{assert_store_closed, assert_transport_error};
use subpanel_test_utils::{init_tracing, MockStatisticsTransport, Statistic, StatisticsQuery};

fn store_with(transport: &Arc<MockStatisticsTransport>) -> SingleValueStatisticsStore {
    init_tracing();
    let transport: Arc<dyn StatisticsTransport> = transport.clone();
    let store = SingleValueStatisticsStore::new(transport);
    store.init(
        "Opportunities",
        StatisticsQuery::for_subpanel("open_deals", "Accounts", "acc-1", "opportunities"),
        false,
    );
    store
}

async fn next_loading(stream: &mut (impl Stream<Item = bool> + Unpin)) -> Option<bool> {
    tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .ok()
        .flatten()
}

// ============================================================================
// FETCH SHARING
// ============================================================================

#[tokio::test]
async fn test_concurrent_cached_loads_share_one_fetch() {
    let transport = Arc::new(MockStatisticsTransport::new());
    transport.hold();
    let store = store_with(&transport);

    let loads: Vec<_> = (0..5).map(|_| store.load(true)).collect();
    assert!(store.loading());

    transport.release(1);
    let results = futures_util::future::join_all(loads).await;

    let first = results[0].clone().unwrap();
    assert_eq!(first.id, "open_deals-1");
    assert!(results.iter().all(|r| r.as_ref() == Ok(&first)));
    assert_eq!(transport.calls(), 1);
    assert!(!store.loading());
}

#[tokio::test]
async fn test_late_subscriber_gets_replay() {
    let transport = Arc::new(MockStatisticsTransport::new());
    let store = store_with(&transport);

    let first = store.load(true).await.unwrap();
    let late = store.load(true).await.unwrap();

    assert_eq!(first, late);
    assert_eq!(transport.calls(), 1);
    assert_eq!(store.cache_stats().hits, 1);
}

#[tokio::test]
async fn test_request_carries_module_and_query() {
    let transport = Arc::new(MockStatisticsTransport::new());
    let store = store_with(&transport);

    store.load(true).await.unwrap();

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    let (module, queries) = &requests[0];
    assert_eq!(module, "Opportunities");
    assert_eq!(queries.len(), 1);
    assert_eq!(queries["open_deals"], store.query());
}

#[tokio::test]
async fn test_init_false_never_fetches() {
    let transport = Arc::new(MockStatisticsTransport::new());
    let store = store_with(&transport);

    assert!(!store.loading());
    tokio::task::yield_now().await;
    assert_eq!(transport.calls(), 0);
    assert!(store.statistic().is_empty());
}

// ============================================================================
// LOADING FLAG
// ============================================================================

#[tokio::test]
async fn test_loading_true_precedes_result() {
    let transport = Arc::new(MockStatisticsTransport::new());
    transport.hold();
    let store = store_with(&transport);
    let mut loading = store.loading_changes();
    let mut statistic = store.statistic_changes();

    assert_eq!(next_loading(&mut loading).await, Some(false));
    assert_eq!(statistic.next().await, Some(Statistic::empty()));

    let pending = store.load(true);
    assert_eq!(next_loading(&mut loading).await, Some(true));

    transport.release(1);
    let resolved = pending.await.unwrap();
    assert_eq!(next_loading(&mut loading).await, Some(false));
    assert_eq!(statistic.next().await, Some(resolved));
}

#[tokio::test]
async fn test_loading_clears_without_subscribers() {
    let transport = Arc::new(MockStatisticsTransport::new());
    transport.hold();
    let store = store_with(&transport);

    drop(store.load(false));
    assert!(store.loading());

    transport.release(1);
    let mut loading = store.loading_changes();
    assert_eq!(next_loading(&mut loading).await, Some(true));
    assert_eq!(next_loading(&mut loading).await, Some(false));
    assert_eq!(store.statistic().id, "open_deals-1");
}

#[tokio::test]
async fn test_overlapping_forced_loads_last_write_wins() {
    let transport = Arc::new(MockStatisticsTransport::new());
    transport.hold();
    let store = store_with(&transport);

    let first = store.load(false);
    let second = store.load(false);
    assert!(store.loading());

    transport.release(1);
    let first = first.await.unwrap();
    assert_eq!(first.id, "open_deals-1");
    assert_eq!(store.statistic(), first);
    assert!(!store.loading());

    transport.release(1);
    let second = second.await.unwrap();
    assert_eq!(second.id, "open_deals-2");
    assert_eq!(store.statistic(), second);

    // The cache holds the most recently issued computation.
    assert_eq!(store.load(true).await.unwrap(), second);
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn test_set_loading_overrides_flag() {
    let transport = Arc::new(MockStatisticsTransport::new());
    let store = store_with(&transport);

    store.set_loading(true);
    assert!(store.loading());
    store.set_loading(false);
    assert!(!store.loading());
    assert_eq!(transport.calls(), 0);
}

// ============================================================================
// FAILURES
// ============================================================================

#[tokio::test]
async fn test_failure_reaches_every_subscriber() {
    let transport = Arc::new(MockStatisticsTransport::new());
    transport.fail_key("open_deals");
    transport.hold();
    let store = store_with(&transport);

    let a = store.load(true);
    let b = store.load(true);
    transport.release(1);
    let (a, b) = tokio::join!(a, b);

    assert_transport_error(&a);
    assert_eq!(a, b);
    assert_eq!(transport.calls(), 1);
    assert!(!store.loading());
}

#[tokio::test]
async fn test_forced_reload_retries_after_failure() {
    let transport = Arc::new(MockStatisticsTransport::new());
    transport.fail_key("open_deals");
    let store = store_with(&transport);

    assert_transport_error(&store.load(true).await);

    transport.recover_key("open_deals");
    let retried = store.load(false).await.unwrap();
    assert_eq!(retried.id, "open_deals-2");
    assert_eq!(store.load(true).await.unwrap(), retried);
    assert_eq!(transport.calls(), 2);
}

// ============================================================================
// SEEDING AND QUERIES
// ============================================================================

#[tokio::test]
async fn test_seeded_statistic_served_without_transport() {
    let transport = Arc::new(MockStatisticsTransport::new());
    let store = store_with(&transport);
    let seeded = Statistic::new("s1", Default::default()).with_value("count", 5);

    store.set_statistic("open_deals", seeded.clone(), true).unwrap();

    assert_eq!(store.load(true).await.unwrap(), seeded);
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn test_forced_load_bypasses_seed() {
    let transport = Arc::new(MockStatisticsTransport::new());
    let store = store_with(&transport);
    store
        .set_statistic("open_deals", Statistic::new("s1", Default::default()), true)
        .unwrap();

    let fetched = store.load(false).await.unwrap();
    assert_eq!(fetched.id, "open_deals-1");
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn test_reinit_same_key_keeps_cache() {
    let transport = Arc::new(MockStatisticsTransport::new());
    let store = store_with(&transport);
    store.load(true).await.unwrap();

    let pending = store.init(
        "Opportunities",
        StatisticsQuery::for_subpanel("open_deals", "Accounts", "acc-2", "opportunities"),
        true,
    );
    pending.unwrap().await.unwrap();

    assert_eq!(transport.calls(), 1);
    assert_eq!(store.context().id, "acc-2");
}

#[tokio::test]
async fn test_switching_back_to_a_key_reuses_its_fetch() {
    let transport = Arc::new(MockStatisticsTransport::new());
    let store = store_with(&transport);
    let reinit = |key: &str| {
        let mut query = store.query();
        query.key = key.to_string();
        store.init("Opportunities", query, false);
    };

    let open = store.load(true).await.unwrap();
    reinit("won_deals");
    let won = store.load(true).await.unwrap();
    reinit("open_deals");
    let open_again = store.load(true).await.unwrap();
    reinit("won_deals");
    let won_again = store.load(true).await.unwrap();

    assert_eq!(open_again, open);
    assert_eq!(won_again, won);
    assert_eq!(store.statistic(), won);
    assert_eq!(transport.calls(), 2);
    assert_eq!(store.cache_stats().hits, 2);
}

#[tokio::test]
async fn test_cache_hit_republishes_cached_value() {
    let transport = Arc::new(MockStatisticsTransport::new());
    let store = store_with(&transport);
    let cached = store.load(true).await.unwrap();

    let pushed = Statistic::new("pushed", Default::default()).with_value("count", 1);
    store.set_statistic("open_deals", pushed.clone(), false).unwrap();
    assert_eq!(store.statistic(), pushed);

    assert_eq!(store.load(true).await.unwrap(), cached);
    assert_eq!(store.statistic(), cached);
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn test_query_mutation_does_not_leak() {
    let transport = Arc::new(MockStatisticsTransport::new());
    let store = store_with(&transport);

    let mut query = store.query();
    query.key.push_str("_changed");
    query.params.clear();

    assert_eq!(store.query().key, "open_deals");
    assert_eq!(store.query().params.len(), 1);
}

#[tokio::test]
async fn test_cleared_store_rejects_loads() {
    let transport = Arc::new(MockStatisticsTransport::new());
    let store = store_with(&transport);
    store.load(true).await.unwrap();

    store.clear_auth_based();

    assert_store_closed(&store.load(true).await);
    assert_eq!(transport.calls(), 1);
}
