//! Period Aggregator: collapse consecutive flagged days into intervals.

use chrono::NaiveDate;

use crate::models::{DiscountPeriod, PriceEvent, PriceKind};

/// Largest day-gap that still continues a run. A gap of two days (one
/// unobserved day in between) starts a new period.
pub const MAX_GAP_DAYS: i64 = 1;

/// Split date-ordered events into runs wherever the gap to the predecessor
/// exceeds `max_gap_days` or the product changes.
pub fn group_by_gap(events: &[PriceEvent], max_gap_days: i64) -> Vec<&[PriceEvent]> {
    let mut groups = Vec::new();
    if events.is_empty() {
        return groups;
    }

    let mut start = 0;
    for i in 1..events.len() {
        let prev = &events[i - 1];
        let cur = &events[i];
        let gap = (cur.date - prev.date).num_days();
        if gap > max_gap_days || cur.product_id != prev.product_id {
            groups.push(&events[start..i]);
            start = i;
        }
    }
    groups.push(&events[start..]);
    groups
}

/// Aggregate DISCOUNT points into non-overlapping periods.
///
/// Input should be the per-day series from
/// [`daily_prices`](super::deriver::daily_prices); de-duplicated events would
/// shorten runs of unchanged discount days to their first day. NORMAL points
/// are ignored. Each period keeps the unit price of its first day rather than
/// an average over the run.
pub fn discount_periods(events: &[PriceEvent]) -> Vec<DiscountPeriod> {
    let mut discounts: Vec<PriceEvent> = events
        .iter()
        .filter(|e| e.kind == PriceKind::Discount)
        .cloned()
        .collect();
    discounts.sort_by(|a, b| {
        a.product_id
            .cmp(&b.product_id)
            .then_with(|| a.date.cmp(&b.date))
    });
    discounts.dedup_by(|b, a| a.product_id == b.product_id && a.date == b.date);

    group_by_gap(&discounts, MAX_GAP_DAYS)
        .into_iter()
        .filter_map(|group| {
            let first = group.first()?;
            let last = group.last()?;
            Some(DiscountPeriod {
                product_id: first.product_id.clone(),
                start_date: first.date,
                end_date: last.date,
                unit_price: first.unit_price,
            })
        })
        .collect()
}

/// [`discount_periods`] over only the points inside `[from, to]`.
///
/// Runs crossing a window edge are cut at the edge.
pub fn discount_periods_in(
    events: &[PriceEvent],
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Vec<DiscountPeriod> {
    let clipped: Vec<PriceEvent> = events
        .iter()
        .filter(|e| from.map_or(true, |f| e.date >= f) && to.map_or(true, |t| e.date <= t))
        .cloned()
        .collect();
    discount_periods(&clipped)
}
