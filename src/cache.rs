//! TTL-aware download cache for remote table exports.
//!
//! The hosted store publishes each table as a parquet export. Files are
//! downloaded lazily on first access and re-downloaded once they are older
//! than the configured TTL. The source data is append-only, so age is the only
//! staleness signal.

use crate::config;
use crate::error::{Result, TimelineError};
use reqwest::blocking::Client;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

/// Downloads and caches table exports from the hosted store.
pub struct ExportCache {
    /// Directory where cached exports are stored.
    pub cache_dir: PathBuf,
    /// Base URL the exports are published under, if any.
    pub export_base: Option<String>,
    /// If true, never download (use cached files only, even when stale).
    pub offline: bool,
    ttl: Duration,
    timeout: Duration,
    client: Option<Client>,
}

impl ExportCache {
    /// Create a new export cache.
    ///
    /// If `cache_dir` is `None`, uses the platform-appropriate default cache directory.
    /// Creates the cache directory if it does not exist.
    pub fn new(
        cache_dir: Option<PathBuf>,
        export_base: Option<String>,
        offline: bool,
        ttl: Duration,
        timeout: Duration,
    ) -> Result<Self> {
        let dir = cache_dir.unwrap_or_else(config::default_cache_dir);
        fs::create_dir_all(&dir)?;
        Ok(Self {
            cache_dir: dir,
            export_base: export_base.map(|b| b.trim_end_matches('/').to_string()),
            offline,
            ttl,
            timeout,
            client: None,
        })
    }

    /// Lazy HTTP client, created on first use.
    fn client(&mut self) -> Result<Client> {
        if let Some(client) = &self.client {
            return Ok(client.clone());
        }
        let client = Client::builder()
            .timeout(self.timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        self.client = Some(client.clone());
        Ok(client)
    }

    /// Whether an export is configured for this cache at all.
    pub fn has_remote(&self) -> bool {
        self.export_base.is_some()
    }

    /// Local path for a table's export file.
    pub fn local_path(&self, table: &str) -> Result<PathBuf> {
        let files = config::export_files();
        let filename = files.get(table).ok_or_else(|| {
            TimelineError::NotFound(format!("Unknown export table: {}", table))
        })?;
        Ok(self.cache_dir.join(filename))
    }

    /// Check whether a cached file is missing or older than the TTL.
    ///
    /// A file whose modification time cannot be read counts as stale.
    pub fn is_stale(&self, path: &Path) -> bool {
        let modified = match fs::metadata(path).and_then(|m| m.modified()) {
            Ok(t) => t,
            Err(_) => return true,
        };
        match SystemTime::now().duration_since(modified) {
            Ok(age) => age > self.ttl,
            // mtime in the future: clock skew, treat as fresh
            Err(_) => false,
        }
    }

    /// Download a single export file.
    ///
    /// Downloads to a temp file first and renames on success, so an
    /// interrupted download never leaves a corrupt partial file behind.
    fn download_file(&mut self, url: &str, dest: &Path) -> Result<()> {
        info!(url, "downloading table export");

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp_dest = dest.with_extension(format!(
            "{}.tmp",
            dest.extension().and_then(|e| e.to_str()).unwrap_or("")
        ));

        let client = self.client()?;
        let result = (|| -> Result<()> {
            let resp = client.get(url).send()?.error_for_status()?;
            let bytes = resp.bytes()?;
            fs::write(&tmp_dest, &bytes)?;
            fs::rename(&tmp_dest, dest)?;
            Ok(())
        })();

        if result.is_err() {
            let _ = fs::remove_file(&tmp_dest);
        }

        result
    }

    /// Ensure a table export is cached locally and fresh, downloading if needed.
    ///
    /// # Returns
    ///
    /// Local filesystem path to the cached export.
    ///
    /// # Errors
    ///
    /// `NotFound` when offline (or no export is configured) and nothing is
    /// cached; `DataUnavailable` when the download itself fails.
    pub fn ensure_export(&mut self, table: &str) -> Result<PathBuf> {
        let local_path = self.local_path(table)?;

        if !self.is_stale(&local_path) {
            debug!(table, "export cache hit");
            return Ok(local_path);
        }

        let base = match (&self.export_base, self.offline) {
            (Some(base), false) => base.clone(),
            _ => {
                if local_path.exists() {
                    return Ok(local_path);
                }
                return Err(TimelineError::NotFound(format!(
                    "Export for '{}' not cached and downloads are disabled",
                    table
                )));
            }
        };

        let filename = config::export_files()
            .get(table)
            .copied()
            .unwrap_or_default();
        let url = format!("{}/{}", base, filename);
        if let Err(e) = self.download_file(&url, &local_path) {
            warn!(table, error = %e, "export download failed");
            return Err(TimelineError::DataUnavailable(format!(
                "could not download {}: {}",
                url, e
            )));
        }

        Ok(local_path)
    }

    /// Remove all cached exports and recreate the cache directory.
    pub fn clear(&self) -> Result<()> {
        if self.cache_dir.exists() {
            fs::remove_dir_all(&self.cache_dir)?;
            fs::create_dir_all(&self.cache_dir)?;
        }
        Ok(())
    }
}
