//! Shared test fixtures for the price timeline integration tests.
//!
//! Three products observed over 2026-01-01..=2026-01-06:
//!
//! - `p-001` 카누 디카페인 미니: discounted on the 2nd and 3rd, unobserved on the 4th
//! - `p-002` 카누 마일드 로스트: out of stock on the 2nd..=4th, normal price raised on the 6th
//! - `p-003` 버츄오 팝 캔디 핑크: first seen on the 3rd (no capsule count), on sale on the 6th
//!
//! `setup_sample_engine()` loads them into an in-memory DuckDB via NDJSON
//! temp files; `sample_snapshot()` builds the same rows without a database.

#![allow(dead_code)]

use chrono::NaiveDate;
use price_timeline::models::{Observation, Product, Snapshot};
use price_timeline::{Connection, PriceTimeline, PriceTimelineBuilder};
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

/// 2026-01-`day`.
pub fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, day).unwrap()
}

/// The "today" every fixture-based question is asked on.
pub fn today() -> NaiveDate {
    d(6)
}

/// Offline builder whose export cache lives in the given temp directory.
pub fn offline_builder(tmp_dir: &tempfile::TempDir) -> PriceTimelineBuilder {
    PriceTimeline::builder()
        .cache_dir(tmp_dir.path())
        .offline(true)
        .snapshot_ttl(Duration::from_secs(30))
}

/// Create a `PriceTimeline` with the sample products and observations loaded.
///
/// Returns `(PriceTimeline, tempfile::TempDir)`. The caller must keep the
/// `TempDir` alive for the duration of the test so the cache directory is not
/// deleted prematurely.
pub fn setup_sample_engine() -> (PriceTimeline, tempfile::TempDir) {
    let tmp_dir = tempfile::tempdir().unwrap();
    let engine = offline_builder(&tmp_dir).build().unwrap();
    load_sample(engine.connection());
    (engine, tmp_dir)
}

/// Register the sample `products` and `observations` tables.
pub fn load_sample(conn: &Connection) {
    write_ndjson_and_register(conn, "products", &product_rows());
    write_ndjson_and_register(conn, "observations", &observation_rows());
}

fn product_rows() -> Vec<serde_json::Value> {
    vec![
        serde_json::json!({
            "product_id": "p-001",
            "product_name": "카누 디카페인 미니",
            "brand": "카누",
            "category": "디카페인캡슐"
        }),
        serde_json::json!({
            "product_id": "p-002",
            "product_name": "카누 마일드 로스트",
            "brand": "카누",
            "category": "아메리카노"
        }),
        serde_json::json!({
            "product_id": "p-003",
            "product_name": "버츄오 팝 캔디 핑크",
            "brand": "네스프레소",
            "category": "버츄오"
        }),
    ]
}

fn observation_rows() -> Vec<serde_json::Value> {
    sample_observations()
        .iter()
        .map(|o| serde_json::to_value(o).unwrap())
        .collect()
}

/// The sample catalog as model structs.
pub fn sample_products() -> Vec<Product> {
    vec![
        product("p-001", "카누 디카페인 미니", "카누", "디카페인캡슐"),
        product("p-002", "카누 마일드 로스트", "카누", "아메리카노"),
        product("p-003", "버츄오 팝 캔디 핑크", "네스프레소", "버츄오"),
    ]
}

pub fn product(id: &str, name: &str, brand: &str, category: &str) -> Product {
    Product {
        product_id: id.to_string(),
        name: name.to_string(),
        brand: Some(brand.to_string()),
        category: Some(category.to_string()),
    }
}

pub fn obs(
    product_id: &str,
    day: u32,
    normal: Option<f64>,
    sale: Option<f64>,
    capsules: Option<f64>,
    in_stock: bool,
) -> Observation {
    Observation {
        product_id: product_id.to_string(),
        date: d(day),
        normal_price: normal,
        sale_price: sale,
        capsule_count: capsules,
        in_stock,
    }
}

/// Sample observations ordered by `(product_id, date)`.
pub fn sample_observations() -> Vec<Observation> {
    vec![
        obs("p-001", 1, Some(1000.0), None, Some(10.0), true),
        obs("p-001", 2, Some(1000.0), Some(700.0), Some(10.0), true),
        obs("p-001", 3, Some(1000.0), Some(700.0), Some(10.0), true),
        obs("p-001", 5, Some(1000.0), None, Some(10.0), true),
        obs("p-001", 6, Some(1000.0), None, Some(10.0), true),
        obs("p-002", 1, Some(4000.0), None, Some(20.0), true),
        obs("p-002", 2, Some(4000.0), None, Some(20.0), false),
        obs("p-002", 3, Some(4000.0), None, Some(20.0), false),
        obs("p-002", 4, Some(4000.0), None, Some(20.0), false),
        obs("p-002", 5, Some(4000.0), None, Some(20.0), true),
        obs("p-002", 6, Some(4400.0), None, Some(20.0), true),
        obs("p-003", 3, Some(9000.0), None, None, true),
        obs("p-003", 4, Some(9000.0), None, Some(10.0), true),
        obs("p-003", 5, Some(9000.0), None, Some(10.0), true),
        obs("p-003", 6, Some(9000.0), Some(8000.0), Some(10.0), true),
    ]
}

/// Sample observations plus the lifecycle events derived from them.
pub fn sample_snapshot() -> Snapshot {
    let observations = sample_observations();
    let lifecycle = price_timeline::source::derive_all_lifecycle(&observations, Some(d(1)));
    Snapshot {
        observations,
        lifecycle,
    }
}

/// Helper: write rows as NDJSON to a temp file, then register the file
/// as a DuckDB table via `Connection::register_table_from_ndjson`.
pub fn write_ndjson_and_register(conn: &Connection, table_name: &str, rows: &[serde_json::Value]) {
    let mut file = NamedTempFile::new().unwrap();
    for row in rows {
        writeln!(file, "{}", serde_json::to_string(row).unwrap()).unwrap();
    }
    file.flush().unwrap();

    let path = file.path().to_str().unwrap();
    conn.register_table_from_ndjson(table_name, path).unwrap();
    // NamedTempFile is dropped here, but DuckDB has already read the data
    // into an in-memory table, so this is fine.
}
