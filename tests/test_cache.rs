//! Export cache: local paths, staleness, offline behavior, failed downloads.

use std::fs;
use std::time::Duration;

use price_timeline::{ExportCache, TimelineError};

fn cache_in(tmp_dir: &tempfile::TempDir, export_base: Option<&str>, offline: bool) -> ExportCache {
    ExportCache::new(
        Some(tmp_dir.path().to_path_buf()),
        export_base.map(str::to_string),
        offline,
        Duration::from_secs(60),
        Duration::from_secs(2),
    )
    .unwrap()
}

#[test]
fn new_creates_cache_directory() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let nested = tmp_dir.path().join("a").join("b");
    let cache = ExportCache::new(
        Some(nested.clone()),
        None,
        true,
        Duration::from_secs(60),
        Duration::from_secs(2),
    )
    .unwrap();
    assert!(nested.is_dir());
    assert_eq!(cache.cache_dir, nested);
}

#[test]
fn export_base_trailing_slash_is_trimmed() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let cache = cache_in(&tmp_dir, Some("https://example.com/exports/"), false);
    assert_eq!(cache.export_base.as_deref(), Some("https://example.com/exports"));
    assert!(cache.has_remote());
}

#[test]
fn local_path_per_table() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let cache = cache_in(&tmp_dir, None, true);
    assert_eq!(
        cache.local_path("observations").unwrap(),
        tmp_dir.path().join("observations.parquet")
    );
    assert!(matches!(
        cache.local_path("cards"),
        Err(TimelineError::NotFound(_))
    ));
}

#[test]
fn missing_file_is_stale_and_fresh_file_is_not() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let cache = cache_in(&tmp_dir, None, true);
    let path = cache.local_path("products").unwrap();
    assert!(cache.is_stale(&path));

    fs::write(&path, b"PAR1").unwrap();
    assert!(!cache.is_stale(&path));
}

#[test]
fn zero_ttl_makes_every_file_stale() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let cache = ExportCache::new(
        Some(tmp_dir.path().to_path_buf()),
        None,
        true,
        Duration::ZERO,
        Duration::from_secs(2),
    )
    .unwrap();
    let path = cache.local_path("products").unwrap();
    fs::write(&path, b"PAR1").unwrap();
    std::thread::sleep(Duration::from_millis(20));
    assert!(cache.is_stale(&path));
}

#[test]
fn offline_without_cached_file_is_not_found() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let mut cache = cache_in(&tmp_dir, Some("http://127.0.0.1:9"), true);
    let err = cache.ensure_export("observations").unwrap_err();
    assert!(matches!(err, TimelineError::NotFound(_)));
}

#[test]
fn offline_uses_cached_file_even_when_stale() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let mut cache = ExportCache::new(
        Some(tmp_dir.path().to_path_buf()),
        Some("http://127.0.0.1:9".to_string()),
        true,
        Duration::ZERO,
        Duration::from_secs(2),
    )
    .unwrap();
    let path = cache.local_path("observations").unwrap();
    fs::write(&path, b"PAR1").unwrap();

    assert_eq!(cache.ensure_export("observations").unwrap(), path);
}

#[test]
fn failed_download_is_data_unavailable() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let mut cache = cache_in(&tmp_dir, Some("http://127.0.0.1:9"), false);
    let err = cache.ensure_export("observations").unwrap_err();
    assert!(matches!(err, TimelineError::DataUnavailable(_)));

    // No partial file is left behind
    let leftovers: Vec<_> = fs::read_dir(tmp_dir.path()).unwrap().collect();
    assert!(leftovers.is_empty());
}

#[test]
fn clear_removes_cached_files() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let cache = cache_in(&tmp_dir, None, true);
    let path = cache.local_path("products").unwrap();
    fs::write(&path, b"PAR1").unwrap();

    cache.clear().unwrap();
    assert!(!path.exists());
    assert!(tmp_dir.path().is_dir());
}
