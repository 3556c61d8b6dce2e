use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

pub const PRODUCTS_TABLE: &str = "products";
pub const OBSERVATIONS_TABLE: &str = "observations";
pub const LIFECYCLE_TABLE: &str = "lifecycle_events";

/// How long a fetched snapshot or downloaded export stays fresh.
pub const DEFAULT_SNAPSHOT_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Remote export file for each table, relative to the export base URL.
pub fn export_files() -> HashMap<&'static str, &'static str> {
    HashMap::from([
        (PRODUCTS_TABLE, "products.parquet"),
        (OBSERVATIONS_TABLE, "observations.parquet"),
        (LIFECYCLE_TABLE, "lifecycle_events.parquet"),
    ])
}

pub fn default_cache_dir() -> PathBuf {
    if let Some(cache) = dirs::cache_dir() {
        cache.join("price-timeline")
    } else {
        PathBuf::from(".price-timeline-cache")
    }
}
