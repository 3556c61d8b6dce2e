//! Observation Source: bulk fetches from the store plus a TTL snapshot cache.
//!
//! Every request is one query per table across all requested products.
//! Fetched snapshots are cached for a short TTL; the store is append-only,
//! so expiry is the only invalidation.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::ask::ProductFilter;
use crate::config;
use crate::connection::Connection;
use crate::engine;
use crate::error::{Result, TimelineError};
use crate::models::{LifecycleEvent, LifecycleKind, Observation, Product, Snapshot};
use crate::sql_builder::SqlBuilder;

// ---------------------------------------------------------------------------
// SnapshotRequest
// ---------------------------------------------------------------------------

/// Which products and which inclusive date range to fetch.
///
/// `product_ids: None` fetches every product. Ids are sorted and
/// de-duplicated so equal requests share a cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SnapshotRequest {
    pub product_ids: Option<Vec<String>>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl SnapshotRequest {
    pub fn new<S: AsRef<str>>(
        product_ids: Option<&[S]>,
        date_from: Option<NaiveDate>,
        date_to: Option<NaiveDate>,
    ) -> Self {
        let product_ids = product_ids.map(|ids| {
            let mut ids: Vec<String> = ids.iter().map(|s| s.as_ref().to_string()).collect();
            ids.sort();
            ids.dedup();
            ids
        });
        Self {
            product_ids,
            date_from,
            date_to,
        }
    }

    /// Every product, full history up to `date_to`.
    pub fn all_until(date_to: Option<NaiveDate>) -> Self {
        Self {
            product_ids: None,
            date_from: None,
            date_to,
        }
    }
}

// ---------------------------------------------------------------------------
// ObservationSource
// ---------------------------------------------------------------------------

/// A store of daily price/stock observations.
///
/// Implementations report a missing or failing store as
/// [`TimelineError::DataUnavailable`].
pub trait ObservationSource {
    /// Catalog entries matching the keyword filter, ordered by product id.
    fn products(&self, filter: &ProductFilter) -> Result<Vec<Product>>;

    /// Observations and lifecycle rows for the request, each ordered by
    /// `(product_id, date)`.
    fn fetch(&self, request: &SnapshotRequest) -> Result<Snapshot>;
}

/// Turn store-side failures into "data unavailable" for the caller.
fn unavailable(e: TimelineError) -> TimelineError {
    match e {
        TimelineError::DuckDb(e) => TimelineError::DataUnavailable(e.to_string()),
        TimelineError::Http(e) => TimelineError::DataUnavailable(e.to_string()),
        TimelineError::Io(e) => TimelineError::DataUnavailable(e.to_string()),
        TimelineError::NotFound(msg) => TimelineError::DataUnavailable(msg),
        other => other,
    }
}

#[derive(Deserialize)]
struct LifecycleRow {
    product_id: String,
    date: NaiveDate,
    lifecycle_kind: Option<String>,
}

// ---------------------------------------------------------------------------
// DuckDbSource
// ---------------------------------------------------------------------------

/// [`ObservationSource`] over the `products`, `observations` and optional
/// `lifecycle_events` tables of a [`Connection`].
pub struct DuckDbSource<'a> {
    conn: &'a Connection,
}

impl<'a> DuckDbSource<'a> {
    /// Create a new `DuckDbSource` bound to the given connection.
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Earliest observation date in the whole store.
    pub fn dataset_start(&self) -> Result<Option<NaiveDate>> {
        self.conn
            .ensure_views(&[config::OBSERVATIONS_TABLE])
            .map_err(unavailable)?;
        let value = self
            .conn
            .execute_scalar(
                &format!(
                    "SELECT CAST(MIN(date) AS VARCHAR) FROM {}",
                    config::OBSERVATIONS_TABLE
                ),
                &[],
            )
            .map_err(unavailable)?;
        Ok(value
            .and_then(|v| v.as_str().map(str::to_string))
            .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()))
    }

    fn fetch_observations(&self, request: &SnapshotRequest) -> Result<Vec<Observation>> {
        self.conn.ensure_views(&[config::OBSERVATIONS_TABLE])?;

        let mut qb = SqlBuilder::new(config::OBSERVATIONS_TABLE);
        qb.select(&[
            "CAST(product_id AS VARCHAR) AS product_id",
            "CAST(date AS VARCHAR) AS date",
            "CAST(normal_price AS DOUBLE) AS normal_price",
            "CAST(sale_price AS DOUBLE) AS sale_price",
            "CAST(capsule_count AS DOUBLE) AS capsule_count",
            "COALESCE(CAST(in_stock AS BOOLEAN), TRUE) AS in_stock",
        ]);
        Self::apply_request(&mut qb, request);

        let (sql, params) = qb.build();
        self.conn.execute_into(&sql, &params)
    }

    fn fetch_lifecycle(
        &self,
        request: &SnapshotRequest,
        observations: &[Observation],
    ) -> Result<Vec<LifecycleEvent>> {
        if !self.conn.try_ensure_view(config::LIFECYCLE_TABLE)? {
            debug!("no lifecycle table; deriving lifecycle events from observations");
            let start = self.dataset_start()?;
            let Some(from) = request.date_from else {
                return Ok(derive_all_lifecycle(observations, start));
            };
            // Derive from full history so the clip date is not mistaken for
            // a launch or a stockout.
            let history = self.fetch_observations(&SnapshotRequest {
                date_from: None,
                ..request.clone()
            })?;
            let mut events = derive_all_lifecycle(&history, start);
            events.retain(|e| e.date >= from);
            return Ok(events);
        }

        let mut qb = SqlBuilder::new(config::LIFECYCLE_TABLE);
        qb.select(&[
            "CAST(product_id AS VARCHAR) AS product_id",
            "CAST(date AS VARCHAR) AS date",
            "CAST(lifecycle_kind AS VARCHAR) AS lifecycle_kind",
        ]);
        Self::apply_request(&mut qb, request);

        let (sql, params) = qb.build();
        let rows: Vec<LifecycleRow> = self.conn.execute_into(&sql, &params)?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            let raw = row.lifecycle_kind.unwrap_or_default();
            match raw.parse::<LifecycleKind>() {
                Ok(kind) => events.push(LifecycleEvent {
                    product_id: row.product_id,
                    date: row.date,
                    kind,
                }),
                Err(e) => warn!(product_id = %row.product_id, date = %row.date, error = %e, "lifecycle row skipped"),
            }
        }
        Ok(events)
    }

    fn apply_request(qb: &mut SqlBuilder, request: &SnapshotRequest) {
        if let Some(ids) = &request.product_ids {
            let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
            qb.where_in("product_id", &refs);
        }
        let from = request.date_from.map(|d| d.to_string());
        let to = request.date_to.map(|d| d.to_string());
        qb.where_date_between("date", from.as_deref(), to.as_deref());
        qb.order_by(&["product_id ASC", "date ASC"]);
    }
}

impl ObservationSource for DuckDbSource<'_> {
    fn products(&self, filter: &ProductFilter) -> Result<Vec<Product>> {
        self.conn
            .ensure_views(&[config::PRODUCTS_TABLE])
            .map_err(unavailable)?;

        let mut qb = SqlBuilder::new(config::PRODUCTS_TABLE);
        qb.select(&[
            "CAST(product_id AS VARCHAR) AS product_id",
            "CAST(product_name AS VARCHAR) AS name",
            "CAST(brand AS VARCHAR) AS brand",
            "CAST(category AS VARCHAR) AS category",
        ]);
        for keyword in &filter.keywords {
            qb.where_contains_any(&["product_name", "brand", "category"], keyword);
        }
        qb.order_by(&["product_id ASC"]);

        let (sql, params) = qb.build();
        self.conn.execute_into(&sql, &params).map_err(unavailable)
    }

    fn fetch(&self, request: &SnapshotRequest) -> Result<Snapshot> {
        let observations = self.fetch_observations(request).map_err(unavailable)?;
        let lifecycle = self
            .fetch_lifecycle(request, &observations)
            .map_err(unavailable)?;
        debug!(
            observations = observations.len(),
            lifecycle = lifecycle.len(),
            "fetched snapshot"
        );
        Ok(Snapshot {
            observations,
            lifecycle,
        })
    }
}

/// Derive lifecycle events per product from `(product_id, date)`-ordered rows.
pub fn derive_all_lifecycle(observations: &[Observation], dataset_start: Option<NaiveDate>) -> Vec<LifecycleEvent> {
    let mut out = Vec::new();
    let mut start = 0;
    for i in 1..=observations.len() {
        if i == observations.len() || observations[i].product_id != observations[start].product_id {
            out.extend(engine::derive_lifecycle_events(&observations[start..i], dataset_start));
            start = i;
        }
    }
    out
}

// ---------------------------------------------------------------------------
// SnapshotCache
// ---------------------------------------------------------------------------

/// In-memory TTL cache of fetched snapshots, keyed by request.
pub struct SnapshotCache {
    ttl: Duration,
    entries: RefCell<HashMap<SnapshotRequest, (Instant, Arc<Snapshot>)>>,
}

impl SnapshotCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RefCell::new(HashMap::new()),
        }
    }

    /// Return the cached snapshot for `request`, fetching it on a miss or
    /// once the entry is older than the TTL. Expired entries are evicted.
    pub fn get_or_fetch<S: ObservationSource + ?Sized>(
        &self,
        source: &S,
        request: &SnapshotRequest,
    ) -> Result<Arc<Snapshot>> {
        let now = Instant::now();
        {
            let mut entries = self.entries.borrow_mut();
            entries.retain(|_, (fetched_at, _)| now.duration_since(*fetched_at) <= self.ttl);
            if let Some((_, snapshot)) = entries.get(request) {
                debug!(?request, "snapshot cache hit");
                return Ok(Arc::clone(snapshot));
            }
        }

        debug!(?request, "snapshot cache miss");
        let snapshot = Arc::new(source.fetch(request)?);
        self.entries
            .borrow_mut()
            .insert(request.clone(), (now, Arc::clone(&snapshot)));
        Ok(snapshot)
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}
