//! Observation source: bulk fetches, keyword catalog queries, snapshot cache.

mod common;

use std::cell::Cell;
use std::time::Duration;

use common::{d, load_sample, offline_builder, sample_snapshot, write_ndjson_and_register};
use price_timeline::models::{LifecycleKind, Product, Snapshot};
use price_timeline::{
    ObservationSource, ProductFilter, Result, SnapshotCache, SnapshotRequest, TimelineError,
};

fn ids<'a>(ids: &'a [&'a str]) -> Option<&'a [&'a str]> {
    Some(ids)
}

// ---------------------------------------------------------------------------
// SnapshotRequest
// ---------------------------------------------------------------------------

#[test]
fn request_ids_are_sorted_and_deduplicated() {
    let a = SnapshotRequest::new(ids(&["p-002", "p-001", "p-002"]), None, Some(d(6)));
    let b = SnapshotRequest::new(ids(&["p-001", "p-002"]), None, Some(d(6)));
    assert_eq!(a, b);
    assert_eq!(a.product_ids, Some(vec!["p-001".to_string(), "p-002".to_string()]));
}

// ---------------------------------------------------------------------------
// DuckDbSource::products
// ---------------------------------------------------------------------------

#[test]
fn products_without_keywords_returns_catalog() {
    let (engine, _tmp) = common::setup_sample_engine();
    let products = engine.source().products(&ProductFilter::default()).unwrap();
    let ids: Vec<&str> = products.iter().map(|p| p.product_id.as_str()).collect();
    assert_eq!(ids, vec!["p-001", "p-002", "p-003"]);
    assert_eq!(products[0].name, "카누 디카페인 미니");
    assert_eq!(products[0].category.as_deref(), Some("디카페인캡슐"));
}

#[test]
fn products_keywords_and_across_fields() {
    let (engine, _tmp) = common::setup_sample_engine();
    let filter = ProductFilter::new(["카누", "디카페인"]);
    let products = engine.source().products(&filter).unwrap();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].product_id, "p-001");
}

#[test]
fn products_sql_filter_agrees_with_in_memory_filter() {
    let (engine, _tmp) = common::setup_sample_engine();
    let catalog = engine.catalog().unwrap();
    for keywords in [vec!["카누"], vec!["버츄오", "핑크"], vec!["네스프레소", "카누"], vec!["없는"]] {
        let filter = ProductFilter::new(keywords.clone());
        let from_sql: Vec<Product> = engine.source().products(&filter).unwrap();
        let in_memory: Vec<Product> = filter.apply(&catalog).into_iter().cloned().collect();
        assert_eq!(from_sql, in_memory, "{:?}", keywords);
    }
}

// ---------------------------------------------------------------------------
// DuckDbSource::fetch
// ---------------------------------------------------------------------------

#[test]
fn fetch_returns_rows_ordered_by_product_and_date() {
    let (engine, _tmp) = common::setup_sample_engine();
    let snapshot = engine
        .source()
        .fetch(&SnapshotRequest::all_until(Some(d(6))))
        .unwrap();
    assert_eq!(snapshot.observations, sample_snapshot().observations);
}

#[test]
fn fetch_filters_products_and_dates() {
    let (engine, _tmp) = common::setup_sample_engine();
    let request = SnapshotRequest::new(ids(&["p-002"]), Some(d(2)), Some(d(4)));
    let snapshot = engine.source().fetch(&request).unwrap();

    assert_eq!(snapshot.observations.len(), 3);
    assert!(snapshot.observations.iter().all(|o| o.product_id == "p-002"));
    assert!(snapshot.observations.iter().all(|o| !o.in_stock));
    assert_eq!(snapshot.observations[0].date, d(2));
}

#[test]
fn fetch_reads_nullable_columns() {
    let (engine, _tmp) = common::setup_sample_engine();
    let snapshot = engine
        .source()
        .fetch(&SnapshotRequest::new(ids(&["p-003"]), None, None))
        .unwrap();
    assert_eq!(snapshot.observations[0].capsule_count, None);
    assert_eq!(snapshot.observations[3].sale_price, Some(8000.0));
}

#[test]
fn fetch_derives_lifecycle_without_table() {
    let (engine, _tmp) = common::setup_sample_engine();
    let snapshot = engine
        .source()
        .fetch(&SnapshotRequest::all_until(Some(d(6))))
        .unwrap();
    let summary: Vec<_> = snapshot
        .lifecycle
        .iter()
        .map(|e| (e.product_id.as_str(), e.date, e.kind))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("p-002", d(2), LifecycleKind::OutOfStock),
            ("p-002", d(5), LifecycleKind::Restock),
            ("p-003", d(3), LifecycleKind::NewProduct),
        ]
    );
}

#[test]
fn derived_lifecycle_ignores_window_start() {
    let (engine, _tmp) = common::setup_sample_engine();
    // p-001 has existed since the 1st and p-002 is already out on the 3rd
    let snapshot = engine
        .source()
        .fetch(&SnapshotRequest::new(None::<&[&str]>, Some(d(3)), Some(d(6))))
        .unwrap();
    assert_eq!(snapshot.observations[0].date, d(3));
    let summary: Vec<_> = snapshot
        .lifecycle
        .iter()
        .map(|e| (e.product_id.as_str(), e.date, e.kind))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("p-002", d(5), LifecycleKind::Restock),
            ("p-003", d(3), LifecycleKind::NewProduct),
        ]
    );
}

#[test]
fn new_product_is_judged_against_whole_store() {
    let (engine, _tmp) = common::setup_sample_engine();
    // p-003 alone starts on the 3rd, but the store starts on the 1st
    let snapshot = engine
        .source()
        .fetch(&SnapshotRequest::new(ids(&["p-003"]), None, None))
        .unwrap();
    assert_eq!(snapshot.lifecycle.len(), 1);
    assert_eq!(snapshot.lifecycle[0].kind, LifecycleKind::NewProduct);
    assert_eq!(engine.source().dataset_start().unwrap(), Some(d(1)));
}

#[test]
fn fetch_reads_lifecycle_table_with_korean_labels() {
    let (engine, _tmp) = common::setup_sample_engine();
    write_ndjson_and_register(
        engine.connection(),
        "lifecycle_events",
        &[
            serde_json::json!({"product_id": "p-001", "date": "2026-01-04", "lifecycle_kind": "품절"}),
            serde_json::json!({"product_id": "p-001", "date": "2026-01-05", "lifecycle_kind": "재입고"}),
            serde_json::json!({"product_id": "p-001", "date": "2026-01-05", "lifecycle_kind": "???"}),
            serde_json::json!({"product_id": "p-002", "date": "2026-01-02", "lifecycle_kind": "OUT_OF_STOCK"}),
        ],
    );

    let snapshot = engine
        .source()
        .fetch(&SnapshotRequest::new(ids(&["p-001"]), None, None))
        .unwrap();
    let kinds: Vec<_> = snapshot.lifecycle.iter().map(|e| (e.date, e.kind)).collect();
    assert_eq!(
        kinds,
        vec![(d(4), LifecycleKind::OutOfStock), (d(5), LifecycleKind::Restock)]
    );
}

#[test]
fn missing_store_is_data_unavailable() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let engine = offline_builder(&tmp_dir).build().unwrap();

    let err = engine
        .source()
        .fetch(&SnapshotRequest::all_until(None))
        .unwrap_err();
    assert!(matches!(err, TimelineError::DataUnavailable(_)));

    let err = engine.source().products(&ProductFilter::default()).unwrap_err();
    assert!(matches!(err, TimelineError::DataUnavailable(_)));
}

#[test]
fn store_loaded_later_is_picked_up() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let engine = offline_builder(&tmp_dir).build().unwrap();
    assert!(engine.catalog().is_err());

    load_sample(engine.connection());
    assert_eq!(engine.catalog().unwrap().len(), 3);
}

// ---------------------------------------------------------------------------
// SnapshotCache
// ---------------------------------------------------------------------------

/// Source that counts fetches and serves the in-memory sample.
struct CountingSource {
    fetches: Cell<usize>,
}

impl ObservationSource for CountingSource {
    fn products(&self, filter: &ProductFilter) -> Result<Vec<Product>> {
        Ok(filter
            .apply(&common::sample_products())
            .into_iter()
            .cloned()
            .collect())
    }

    fn fetch(&self, _request: &SnapshotRequest) -> Result<Snapshot> {
        self.fetches.set(self.fetches.get() + 1);
        Ok(sample_snapshot())
    }
}

#[test]
fn snapshot_cache_reuses_fresh_entries() {
    let source = CountingSource { fetches: Cell::new(0) };
    let cache = SnapshotCache::new(Duration::from_secs(60));
    let request = SnapshotRequest::all_until(Some(d(6)));

    let first = cache.get_or_fetch(&source, &request).unwrap();
    let second = cache.get_or_fetch(&source, &request).unwrap();
    assert_eq!(source.fetches.get(), 1);
    assert_eq!(first, second);
    assert_eq!(cache.len(), 1);

    cache.get_or_fetch(&source, &SnapshotRequest::all_until(Some(d(5)))).unwrap();
    assert_eq!(source.fetches.get(), 2);
    assert_eq!(cache.len(), 2);
}

#[test]
fn snapshot_cache_refetches_after_ttl() {
    let source = CountingSource { fetches: Cell::new(0) };
    let cache = SnapshotCache::new(Duration::ZERO);
    let request = SnapshotRequest::all_until(Some(d(6)));

    cache.get_or_fetch(&source, &request).unwrap();
    std::thread::sleep(Duration::from_millis(5));
    cache.get_or_fetch(&source, &request).unwrap();
    assert_eq!(source.fetches.get(), 2);
}

#[test]
fn snapshot_cache_clear_empties() {
    let source = CountingSource { fetches: Cell::new(0) };
    let cache = SnapshotCache::new(Duration::from_secs(60));
    cache
        .get_or_fetch(&source, &SnapshotRequest::all_until(None))
        .unwrap();
    assert!(!cache.is_empty());
    cache.clear();
    assert!(cache.is_empty());
}
