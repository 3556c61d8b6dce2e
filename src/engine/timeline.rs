//! Timeline Merger: overlay stock events on the price series.
//!
//! A product never shows a numeric price on a day it was out of stock.
//! Every OUT_OF_STOCK opens a stockout that the earliest later RESTOCK closes;
//! the stockout covers `[out, restock)`, or runs to the end of the window when
//! no RESTOCK follows.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{LifecycleEvent, LifecycleKind, LifecycleMarker, PriceEvent, Timeline, TimelinePoint};

/// A stockout interval clipped to the window. `end` is the exclusive
/// RESTOCK date, or `None` when the product stays out through the window end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stockout {
    pub start: NaiveDate,
    pub end: Option<NaiveDate>,
}

impl Stockout {
    pub fn covers(&self, date: NaiveDate) -> bool {
        date >= self.start && self.end.map_or(true, |end| date < end)
    }
}

/// Stockout intervals for one product inside `[from, to]`.
///
/// `lifecycle` may span dates before the window; they decide whether the
/// product was already out of stock when the window opens. A RESTOCK with no
/// earlier OUT_OF_STOCK at all means the product was out from before the
/// first observation, so the window start up to that RESTOCK is a stockout.
pub fn stockout_intervals(
    lifecycle: &[LifecycleEvent],
    from: NaiveDate,
    to: NaiveDate,
) -> Vec<Stockout> {
    let mut stock: Vec<&LifecycleEvent> = lifecycle
        .iter()
        .filter(|e| e.kind.is_stock_transition())
        .collect();
    stock.sort_by_key(|e| e.date);

    let first_restock_from = |date: NaiveDate, inclusive: bool| -> Option<NaiveDate> {
        stock
            .iter()
            .filter(|e| e.kind == LifecycleKind::Restock)
            .map(|e| e.date)
            .find(|d| if inclusive { *d >= date } else { *d > date })
    };
    let clip_end = |end: Option<NaiveDate>| end.filter(|d| *d <= to);

    let mut out = Vec::new();
    if from > to {
        return out;
    }

    let before_window = stock.iter().rev().find(|e| e.date < from);
    let carried_in = match before_window {
        Some(e) => e.kind == LifecycleKind::OutOfStock,
        None => stock
            .iter()
            .find(|e| e.date >= from)
            .is_some_and(|e| e.kind == LifecycleKind::Restock),
    };
    if carried_in {
        out.push(Stockout {
            start: from,
            end: clip_end(first_restock_from(from, true)),
        });
    }

    for event in stock
        .iter()
        .filter(|e| e.kind == LifecycleKind::OutOfStock && e.date >= from && e.date <= to)
    {
        out.push(Stockout {
            start: event.date,
            end: clip_end(first_restock_from(event.date, false)),
        });
    }

    out
}

/// Build the display timeline for one product over `[from, to]`.
///
/// Points are placed on every price event date in the window, on `from`
/// (carrying the price in effect before the window), on each OUT_OF_STOCK
/// date, and on each RESTOCK date (carrying the price in effect that day).
/// Points inside a stockout are nulled.
pub fn merge_timeline(
    product_id: &str,
    events: &[PriceEvent],
    lifecycle: &[LifecycleEvent],
    from: NaiveDate,
    to: NaiveDate,
) -> Timeline {
    let mut events: Vec<&PriceEvent> = events.iter().filter(|e| e.product_id == product_id).collect();
    events.sort_by_key(|e| e.date);
    let lifecycle: Vec<LifecycleEvent> = lifecycle
        .iter()
        .filter(|e| e.product_id == product_id)
        .cloned()
        .collect();

    let mut points: BTreeMap<NaiveDate, Option<f64>> = BTreeMap::new();

    if from <= to {
        for event in events.iter().filter(|e| e.date >= from && e.date <= to) {
            points.insert(event.date, Some(event.unit_price));
        }

        let price_as_of = |date: NaiveDate| {
            events
                .iter()
                .rev()
                .find(|e| e.date <= date)
                .map(|e| e.unit_price)
        };

        if let Some(price) = price_as_of(from) {
            points.entry(from).or_insert(Some(price));
        }

        for event in lifecycle.iter().filter(|e| e.date >= from && e.date <= to) {
            match event.kind {
                LifecycleKind::OutOfStock => {
                    points.entry(event.date).or_insert(None);
                }
                LifecycleKind::Restock => {
                    if let Some(price) = price_as_of(event.date) {
                        points.entry(event.date).or_insert(Some(price));
                    }
                }
                LifecycleKind::NewProduct => {}
            }
        }

        let stockouts = stockout_intervals(&lifecycle, from, to);
        for (date, price) in points.iter_mut() {
            if stockouts.iter().any(|s| s.covers(*date)) {
                *price = None;
            }
        }
    }

    Timeline {
        product_id: product_id.to_string(),
        date_from: from,
        date_to: to,
        points: points
            .into_iter()
            .map(|(date, unit_price)| TimelinePoint { date, unit_price })
            .collect(),
    }
}

/// Place lifecycle events inside the timeline window onto its price axis.
///
/// OUT_OF_STOCK takes the nearest earlier price, RESTOCK the same-day or
/// nearest later price, NEW_PRODUCT the nearest price either way (the earlier
/// one on a tie).
pub fn resolve_markers(timeline: &Timeline, lifecycle: &[LifecycleEvent]) -> Vec<LifecycleMarker> {
    let priced: Vec<(NaiveDate, f64)> = timeline
        .points
        .iter()
        .filter_map(|p| p.unit_price.map(|price| (p.date, price)))
        .collect();

    lifecycle
        .iter()
        .filter(|e| {
            e.product_id == timeline.product_id
                && e.date >= timeline.date_from
                && e.date <= timeline.date_to
        })
        .map(|event| {
            let backward = || priced.iter().rev().find(|(d, _)| *d <= event.date).copied();
            let forward = || priced.iter().find(|(d, _)| *d >= event.date).copied();
            let y = match event.kind {
                LifecycleKind::OutOfStock => backward().map(|(_, p)| p),
                LifecycleKind::Restock => forward().map(|(_, p)| p),
                LifecycleKind::NewProduct => match (backward(), forward()) {
                    (Some((bd, bp)), Some((fd, fp))) => {
                        let back_gap = (event.date - bd).num_days();
                        let fwd_gap = (fd - event.date).num_days();
                        Some(if back_gap <= fwd_gap { bp } else { fp })
                    }
                    (Some((_, p)), None) | (None, Some((_, p))) => Some(p),
                    (None, None) => None,
                },
            };
            LifecycleMarker {
                event: event.clone(),
                y,
            }
        })
        .collect()
}
