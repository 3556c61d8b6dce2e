//! Price event timeline engine.
//!
//! Turns a raw per-day price/stock observation stream into discrete events
//! (price changed, discount opened/closed, out of stock, restocked, launched),
//! rebuilds a chart-ready timeline that hides prices during stockouts, and
//! answers free-text questions about it with a deterministic rule classifier
//! and an optional fallback answerer.
//!
//! Observations live in DuckDB: tables registered from local files, an
//! attached database file, or parquet exports downloaded from the hosted
//! store and cached locally.
//!
//! # Quick start
//!
//! ```no_run
//! use chrono::NaiveDate;
//! use price_timeline::PriceTimeline;
//!
//! let engine = PriceTimeline::builder()
//!     .export_base("https://example.com/exports")
//!     .build()
//!     .unwrap();
//!
//! let from = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
//! let to = NaiveDate::from_ymd_opt(2026, 1, 31).unwrap();
//! let timeline = engine.timeline("p-001", from, to).unwrap();
//!
//! let answer = engine.ask("최근 한 달 할인 기간 알려줘", to).unwrap();
//! ```

#[cfg(feature = "async")]
pub mod async_client;
pub mod ask;
pub mod cache;
pub mod config;
pub mod connection;
pub mod engine;
pub mod error;
pub mod models;
pub mod source;
pub mod sql_builder;

#[cfg(feature = "async")]
pub use async_client::AsyncPriceTimeline;
pub use ask::{FallbackAnswerer, HttpFallback, Intent, ProductFilter, SharedAnswerer};
pub use cache::ExportCache;
pub use connection::Connection;
pub use error::{Result, TimelineError};
pub use source::{DuckDbSource, ObservationSource, SnapshotCache, SnapshotRequest};
pub use sql_builder::SqlBuilder;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tracing::info;

use models::{
    Answer, Delegation, DelegationReason, DiscountPeriod, LifecycleEvent, LifecycleMarker,
    Observation, PriceEvent, Product, Snapshot, Timeline,
};

// ---------------------------------------------------------------------------
// PriceTimelineBuilder
// ---------------------------------------------------------------------------

/// Builder for configuring and constructing a [`PriceTimeline`].
///
/// Use [`PriceTimeline::builder()`] to obtain a builder, chain configuration
/// methods, and call [`build()`](PriceTimelineBuilder::build).
pub struct PriceTimelineBuilder {
    database: Option<PathBuf>,
    cache_dir: Option<PathBuf>,
    export_base: Option<String>,
    offline: bool,
    timeout: Duration,
    snapshot_ttl: Duration,
    fallback: Option<SharedAnswerer>,
    fallback_endpoint: Option<String>,
}

impl Default for PriceTimelineBuilder {
    fn default() -> Self {
        Self {
            database: None,
            cache_dir: None,
            export_base: None,
            offline: false,
            timeout: config::DEFAULT_TIMEOUT,
            snapshot_ttl: config::DEFAULT_SNAPSHOT_TTL,
            fallback: None,
            fallback_endpoint: None,
        }
    }
}

impl PriceTimelineBuilder {
    /// Open a DuckDB database file instead of an in-memory database.
    ///
    /// Existing `products`, `observations` and `lifecycle_events` tables in
    /// the file are used as-is.
    pub fn database<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.database = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set a custom directory for downloaded exports.
    ///
    /// If not set, the platform cache directory is used (e.g.
    /// `~/.cache/price-timeline` on Linux).
    pub fn cache_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.cache_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Base URL the hosted store publishes its table exports under.
    pub fn export_base(mut self, url: &str) -> Self {
        self.export_base = Some(url.to_string());
        self
    }

    /// Never download exports; use whatever is cached, even if stale.
    pub fn offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    /// HTTP timeout for export downloads and the HTTP fallback.
    ///
    /// Defaults to 60 seconds.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// How long fetched snapshots and downloaded exports stay fresh.
    ///
    /// Defaults to 5 minutes.
    pub fn snapshot_ttl(mut self, ttl: Duration) -> Self {
        self.snapshot_ttl = ttl;
        self
    }

    /// Answerer for questions the rules cannot handle.
    pub fn fallback<F: FallbackAnswerer + Send + Sync + 'static>(mut self, answerer: F) -> Self {
        self.fallback = Some(Arc::new(answerer));
        self
    }

    /// Use an [`HttpFallback`] posting to `url`. Ignored if
    /// [`fallback`](Self::fallback) is also set.
    pub fn fallback_endpoint(mut self, url: &str) -> Self {
        self.fallback_endpoint = Some(url.to_string());
        self
    }

    /// Build the engine, opening DuckDB and preparing the export cache.
    ///
    /// Nothing is downloaded or queried eagerly; tables are resolved on
    /// first use.
    pub fn build(self) -> Result<PriceTimeline> {
        let cache = ExportCache::new(
            self.cache_dir,
            self.export_base,
            self.offline,
            self.snapshot_ttl,
            self.timeout,
        )?;
        let conn = match &self.database {
            Some(path) => Connection::open(path, cache)?,
            None => Connection::new(cache)?,
        };
        let fallback = match (self.fallback, self.fallback_endpoint) {
            (Some(f), _) => Some(f),
            (None, Some(url)) => {
                Some(Arc::new(HttpFallback::new(&url, self.timeout)?) as SharedAnswerer)
            }
            (None, None) => None,
        };
        Ok(PriceTimeline {
            conn,
            snapshots: SnapshotCache::new(self.snapshot_ttl),
            fallback,
        })
    }
}

// ---------------------------------------------------------------------------
// PriceTimeline
// ---------------------------------------------------------------------------

/// The main entry point: timelines, discount periods and question answering
/// over one observation store.
///
/// Every call is a fresh pure computation over a fetched snapshot; only the
/// snapshot fetch itself is cached (for the configured TTL).
pub struct PriceTimeline {
    conn: Connection,
    snapshots: SnapshotCache,
    fallback: Option<SharedAnswerer>,
}

impl PriceTimeline {
    /// Create a new builder for configuring the engine.
    pub fn builder() -> PriceTimelineBuilder {
        PriceTimelineBuilder::default()
    }

    /// The observation source over this engine's connection.
    pub fn source(&self) -> DuckDbSource<'_> {
        DuckDbSource::new(&self.conn)
    }

    /// Full history up to `to` for the given products, via the snapshot cache.
    pub fn snapshot(&self, product_ids: &[&str], to: NaiveDate) -> Result<Arc<Snapshot>> {
        let request = SnapshotRequest::new(Some(product_ids), None, Some(to));
        self.snapshots.get_or_fetch(&self.source(), &request)
    }

    /// Every catalog entry.
    pub fn catalog(&self) -> Result<Vec<Product>> {
        self.source().products(&ProductFilter::default())
    }

    // -- Events ------------------------------------------------------------

    /// De-duplicated price events for one product inside `[from, to]`.
    pub fn price_events(&self, product_id: &str, from: NaiveDate, to: NaiveDate) -> Result<Vec<PriceEvent>> {
        check_window(from, to)?;
        let snapshot = self.snapshot(&[product_id], to)?;
        let observations = observations_of(&snapshot, product_id);
        Ok(engine::derive_price_events(&observations)
            .into_iter()
            .filter(|e| e.date >= from)
            .collect())
    }

    /// Lifecycle events for one product inside `[from, to]`.
    pub fn lifecycle_events(
        &self,
        product_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<LifecycleEvent>> {
        check_window(from, to)?;
        let snapshot = self.snapshot(&[product_id], to)?;
        Ok(snapshot
            .lifecycle_for(product_id)
            .filter(|e| e.date >= from && e.date <= to)
            .cloned()
            .collect())
    }

    /// Discount periods for one product, aggregated over `[from, to]`.
    pub fn discount_periods(
        &self,
        product_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DiscountPeriod>> {
        check_window(from, to)?;
        let snapshot = self.snapshot(&[product_id], to)?;
        let daily = engine::daily_prices(&observations_of(&snapshot, product_id));
        Ok(engine::discount_periods_in(&daily, Some(from), Some(to)))
    }

    // -- Timelines ---------------------------------------------------------

    /// Gap-nulled display timeline for one product over `[from, to]`.
    pub fn timeline(&self, product_id: &str, from: NaiveDate, to: NaiveDate) -> Result<Timeline> {
        check_window(from, to)?;
        let snapshot = self.snapshot(&[product_id], to)?;
        Ok(timeline_of(&snapshot, product_id, from, to))
    }

    /// Timelines for several products from one bulk fetch.
    pub fn timelines(&self, product_ids: &[&str], from: NaiveDate, to: NaiveDate) -> Result<Vec<Timeline>> {
        check_window(from, to)?;
        let snapshot = self.snapshot(product_ids, to)?;
        Ok(product_ids
            .iter()
            .map(|id| timeline_of(&snapshot, id, from, to))
            .collect())
    }

    /// Lifecycle markers placed on the product's timeline.
    pub fn markers(&self, product_id: &str, from: NaiveDate, to: NaiveDate) -> Result<Vec<LifecycleMarker>> {
        check_window(from, to)?;
        let snapshot = self.snapshot(&[product_id], to)?;
        let timeline = timeline_of(&snapshot, product_id, from, to);
        let lifecycle: Vec<LifecycleEvent> = snapshot.lifecycle_for(product_id).cloned().collect();
        Ok(engine::resolve_markers(&timeline, &lifecycle))
    }

    // -- Questions ---------------------------------------------------------

    /// Classify a question without touching the store.
    pub fn classify(&self, question: &str) -> Intent {
        ask::classify(question)
    }

    /// Answer a question from the rules, or return the delegation the
    /// fallback answerer needs.
    ///
    /// `today` closes the window and anchors relative periods such as
    /// "최근 한 달". Only a store failure is an error.
    pub fn ask(&self, question: &str, today: NaiveDate) -> Result<Answer> {
        let parsed = ask::parse_question(question, today);
        info!(
            intent = %parsed.intent,
            since = ?parsed.since,
            keywords = ?parsed.filter.keywords,
            "question parsed"
        );

        let products = self.source().products(&parsed.filter)?;
        let ids: Vec<&str> = products.iter().map(|p| p.product_id.as_str()).collect();
        let snapshot = if ids.is_empty() {
            Arc::new(Snapshot::default())
        } else {
            self.snapshot(&ids, today)?
        };

        if parsed.intent != Intent::Unknown {
            let ctx = ask::RuleContext {
                products: &products,
                snapshot: &snapshot,
                filter: &parsed.filter,
                since: parsed.since,
                today,
            };
            if let Some(answer) = ask::execute(parsed.intent, &ctx) {
                return Ok(Answer::Rule(answer));
            }
        }

        let reason = if parsed.intent == Intent::Unknown {
            DelegationReason::UnknownIntent
        } else {
            DelegationReason::NoRows
        };
        info!(intent = %parsed.intent, ?reason, "delegating to fallback");

        Ok(Answer::Delegate(Delegation {
            question: question.to_string(),
            intent: parsed.intent,
            reason,
            since: parsed.since,
            keywords: parsed.filter.keywords.clone(),
            products,
            snapshot: clip_snapshot(&snapshot, parsed.since, today),
        }))
    }

    /// Like [`ask`](Self::ask), but resolves a delegation through the
    /// configured fallback answerer.
    ///
    /// Without an answerer the delegation is returned unchanged. A failing
    /// answerer yields [`TimelineError::Fallback`].
    pub fn ask_with_fallback(&self, question: &str, today: NaiveDate) -> Result<Answer> {
        let answer = self.ask(question, today)?;
        ask::resolve(answer, self.fallback.as_deref())
    }

    /// The configured fallback answerer, if any.
    pub fn fallback(&self) -> Option<SharedAnswerer> {
        self.fallback.clone()
    }

    // -- Maintenance -------------------------------------------------------

    /// Drop cached snapshots and re-resolve tables on next access.
    pub fn refresh(&self) {
        self.snapshots.clear();
        self.conn.reset_views();
        info!("snapshot cache cleared and views reset");
    }

    /// Return a reference to the underlying [`Connection`] for advanced usage.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Return the snapshot cache.
    pub fn snapshots(&self) -> &SnapshotCache {
        &self.snapshots
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn check_window(from: NaiveDate, to: NaiveDate) -> Result<()> {
    if from > to {
        return Err(TimelineError::InvalidArgument(format!(
            "window start {} is after window end {}",
            from, to
        )));
    }
    Ok(())
}

fn observations_of(snapshot: &Snapshot, product_id: &str) -> Vec<Observation> {
    snapshot.observations_for(product_id).cloned().collect()
}

fn timeline_of(snapshot: &Snapshot, product_id: &str, from: NaiveDate, to: NaiveDate) -> Timeline {
    let events = engine::derive_price_events(&observations_of(snapshot, product_id));
    let lifecycle: Vec<LifecycleEvent> = snapshot.lifecycle_for(product_id).cloned().collect();
    engine::merge_timeline(product_id, &events, &lifecycle, from, to)
}

/// The snapshot restricted to `[since, today]`, as handed to the fallback.
fn clip_snapshot(snapshot: &Snapshot, since: Option<NaiveDate>, today: NaiveDate) -> Snapshot {
    let keep = |date: NaiveDate| date <= today && since.map_or(true, |s| date >= s);
    Snapshot {
        observations: snapshot
            .observations
            .iter()
            .filter(|o| keep(o.date))
            .cloned()
            .collect(),
        lifecycle: snapshot
            .lifecycle
            .iter()
            .filter(|e| keep(e.date))
            .cloned()
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

impl fmt::Display for PriceTimeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let views = self.conn.views();
        let cache = self.conn.cache.borrow();
        write!(
            f,
            "PriceTimeline(cache_dir={}, views=[{}], offline={}, cached_snapshots={}, fallback={})",
            cache.cache_dir.display(),
            views.join(", "),
            cache.offline,
            self.snapshots.len(),
            self.fallback.is_some()
        )
    }
}
