//! Event Deriver: observation series to price and lifecycle events.

use chrono::NaiveDate;
use tracing::{debug, warn};

use super::same_price;
use crate::models::{LifecycleEvent, LifecycleKind, Observation, PriceEvent, PriceKind};

/// One price point per observed day with a resolvable unit price.
///
/// Rows must belong to one product and be in date order. Rows whose unit
/// price cannot be resolved (missing price, missing or zero capsule count)
/// are skipped. A row dated on or before an already emitted day is ignored,
/// so the output is strictly increasing in date.
pub fn daily_prices(observations: &[Observation]) -> Vec<PriceEvent> {
    let mut out: Vec<PriceEvent> = Vec::with_capacity(observations.len());

    for obs in observations {
        let Some(unit_price) = obs.unit_price() else {
            warn!(
                product_id = %obs.product_id,
                date = %obs.date,
                "unit price unresolvable; no price event for this day"
            );
            continue;
        };

        if let Some(last) = out.last() {
            if obs.date <= last.date {
                debug!(product_id = %obs.product_id, date = %obs.date, "out-of-order row skipped");
                continue;
            }
        }

        let kind = if obs.is_discounted() {
            PriceKind::Discount
        } else {
            PriceKind::Normal
        };

        out.push(PriceEvent {
            product_id: obs.product_id.clone(),
            date: obs.date,
            kind,
            unit_price,
        });
    }

    out
}

/// De-duplicated price events: a new event only when the kind or the unit
/// price differs from the last emitted event.
///
/// No two adjacent events share both kind and unit price, and running the
/// output through this de-duplication again changes nothing.
pub fn derive_price_events(observations: &[Observation]) -> Vec<PriceEvent> {
    dedup_price_events(daily_prices(observations))
}

pub(crate) fn dedup_price_events(daily: Vec<PriceEvent>) -> Vec<PriceEvent> {
    let mut out: Vec<PriceEvent> = Vec::new();
    for event in daily {
        let unchanged = out
            .last()
            .map(|last| last.kind == event.kind && same_price(last.unit_price, event.unit_price))
            .unwrap_or(false);
        if !unchanged {
            out.push(event);
        }
    }
    out
}

/// Lifecycle transitions for one product's observation series.
///
/// `dataset_start` is the earliest observation date across the whole store.
/// A product first seen after it gets a NEW_PRODUCT event on its first day.
/// Stock transitions alternate: OUT_OF_STOCK when a row goes from in stock
/// to out of stock (or the very first row is already out), RESTOCK on the way
/// back. Rows without a resolvable price still count.
pub fn derive_lifecycle_events(
    observations: &[Observation],
    dataset_start: Option<NaiveDate>,
) -> Vec<LifecycleEvent> {
    let mut out = Vec::new();
    let Some(first) = observations.first() else {
        return out;
    };

    if let Some(start) = dataset_start {
        if first.date > start {
            out.push(LifecycleEvent {
                product_id: first.product_id.clone(),
                date: first.date,
                kind: LifecycleKind::NewProduct,
            });
        }
    }

    let mut in_stock = true;
    let mut last_date: Option<NaiveDate> = None;
    for obs in observations {
        if last_date.is_some_and(|d| obs.date <= d) {
            continue;
        }
        last_date = Some(obs.date);

        if obs.in_stock == in_stock {
            continue;
        }
        in_stock = obs.in_stock;
        out.push(LifecycleEvent {
            product_id: obs.product_id.clone(),
            date: obs.date,
            kind: if in_stock {
                LifecycleKind::Restock
            } else {
                LifecycleKind::OutOfStock
            },
        });
    }

    out
}
