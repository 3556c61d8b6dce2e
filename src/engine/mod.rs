//! Pure event engine: observation rows in, events/periods/timelines out.
//!
//! Nothing in this module performs I/O or returns an error. Malformed but
//! present data (missing prices, zero capsule counts, unmatched stock events)
//! is absorbed locally.

pub mod deriver;
pub mod periods;
pub mod timeline;

pub use deriver::{daily_prices, derive_lifecycle_events, derive_price_events};
pub use periods::{discount_periods, discount_periods_in, group_by_gap, MAX_GAP_DAYS};
pub use timeline::{merge_timeline, resolve_markers, stockout_intervals, Stockout};

/// Unit prices are quotients of integer prices, so compare with a tolerance.
const PRICE_EPSILON: f64 = 1e-6;

pub(crate) fn same_price(a: f64, b: f64) -> bool {
    (a - b).abs() < PRICE_EPSILON
}
