//! Rule Executor: resolve a classified intent against the derived event set.
//!
//! Every branch first narrows the products by the keyword filter and the
//! dates by the extracted window; the intent logic only ever sees the
//! narrowed set. `None` means "no match" and hands the question to the
//! fallback answerer.

use std::collections::HashMap;

use chrono::NaiveDate;

use super::extract::ProductFilter;
use super::Intent;
use crate::engine::{self, same_price};
use crate::models::{
    Finding, LifecycleEvent, LifecycleKind, Observation, PriceEvent, PriceKind, Product, RuleAnswer,
    Snapshot,
};

/// Derived per-product data the branches work from.
struct History<'a> {
    product: &'a Product,
    observations: Vec<Observation>,
    /// Undeduplicated per-day prices up to `today`.
    daily: Vec<PriceEvent>,
    lifecycle: Vec<LifecycleEvent>,
}

/// Inputs for one rule evaluation.
pub struct RuleContext<'a> {
    pub products: &'a [Product],
    pub snapshot: &'a Snapshot,
    pub filter: &'a ProductFilter,
    /// Window start; `None` means no time restriction.
    pub since: Option<NaiveDate>,
    /// Window end, inclusive.
    pub today: NaiveDate,
}

impl<'a> RuleContext<'a> {
    fn in_window(&self, date: NaiveDate) -> bool {
        date <= self.today && self.since.map_or(true, |s| date >= s)
    }

    fn histories(&self) -> Vec<History<'a>> {
        let mut by_product: HashMap<&str, (Vec<Observation>, Vec<LifecycleEvent>)> = HashMap::new();
        for obs in self.snapshot.observations.iter().filter(|o| o.date <= self.today) {
            by_product
                .entry(obs.product_id.as_str())
                .or_default()
                .0
                .push(obs.clone());
        }
        for event in &self.snapshot.lifecycle {
            by_product
                .entry(event.product_id.as_str())
                .or_default()
                .1
                .push(event.clone());
        }

        self.products
            .iter()
            .filter(|p| self.filter.matches(p))
            .map(|product| {
                let (mut observations, mut lifecycle) = by_product
                    .remove(product.product_id.as_str())
                    .unwrap_or_default();
                observations.sort_by_key(|o| o.date);
                lifecycle.sort_by_key(|e| e.date);
                let daily = engine::daily_prices(&observations);
                History {
                    product,
                    observations,
                    daily,
                    lifecycle,
                }
            })
            .collect()
    }
}

/// Evaluate the rule for `intent`. Returns `None` for [`Intent::Unknown`],
/// for VOLATILITY without a window, and whenever the rule finds nothing.
pub fn execute(intent: Intent, ctx: &RuleContext<'_>) -> Option<RuleAnswer> {
    let histories = ctx.histories();
    let labels: HashMap<&str, String> = histories
        .iter()
        .map(|h| (h.product.product_id.as_str(), h.product.label()))
        .collect();

    let (findings, heading) = match intent {
        Intent::Discount => discounted(ctx, &histories),
        Intent::DiscountPeriod => discount_periods(ctx, &histories),
        Intent::PriceMin => price_extreme(ctx, &histories, true),
        Intent::PriceMax => price_extreme(ctx, &histories, false),
        Intent::Volatility => volatility(ctx, &histories)?,
        Intent::New => lifecycle(ctx, &histories, LifecycleKind::NewProduct),
        Intent::Out => lifecycle(ctx, &histories, LifecycleKind::OutOfStock),
        Intent::Restore => lifecycle(ctx, &histories, LifecycleKind::Restock),
        Intent::NormalChange => normal_changes(ctx, &histories),
        Intent::Unknown => return None,
    };

    if findings.is_empty() {
        return None;
    }

    let mut product_ids: Vec<String> = Vec::new();
    for finding in &findings {
        let id = finding.product_id();
        if !product_ids.iter().any(|p| p == id) {
            product_ids.push(id.to_string());
        }
    }

    let mut lines = vec![heading];
    lines.extend(findings.iter().map(|f| render(f, &labels)));

    Some(RuleAnswer {
        intent,
        text: lines.join("\n"),
        product_ids,
        findings,
    })
}

// ---------------------------------------------------------------------------
// Branches
// ---------------------------------------------------------------------------

fn window_label(ctx: &RuleContext<'_>) -> String {
    match ctx.since {
        Some(since) => format!("{} ~ {}", since, ctx.today),
        None => "전체 기간".to_string(),
    }
}

/// Without a window: products whose latest observation is discounted.
/// With a window: products with any discount day inside it (latest shown).
fn discounted(ctx: &RuleContext<'_>, histories: &[History<'_>]) -> (Vec<Finding>, String) {
    let mut findings = Vec::new();
    for h in histories {
        let hit = match ctx.since {
            None => h
                .observations
                .last()
                .filter(|o| o.is_discounted())
                .and_then(|o| o.unit_price().map(|p| (o, p))),
            Some(_) => h
                .observations
                .iter()
                .rev()
                .filter(|o| ctx.in_window(o.date) && o.is_discounted())
                .find_map(|o| o.unit_price().map(|p| (o, p))),
        };
        if let Some((obs, unit_price)) = hit {
            let normal_unit_price = match (obs.normal_price, obs.capsule_count) {
                (Some(n), Some(c)) if c > 0.0 => Some(n / c),
                _ => None,
            };
            findings.push(Finding::Discounted {
                product_id: h.product.product_id.clone(),
                date: obs.date,
                unit_price,
                normal_unit_price,
            });
        }
    }
    let heading = match ctx.since {
        None => format!("현재 할인 중인 제품 {}개", findings.len()),
        Some(_) => format!("{} 할인된 제품 {}개", window_label(ctx), findings.len()),
    };
    (findings, heading)
}

fn discount_periods(ctx: &RuleContext<'_>, histories: &[History<'_>]) -> (Vec<Finding>, String) {
    let mut findings = Vec::new();
    for h in histories {
        for period in engine::discount_periods_in(&h.daily, ctx.since, Some(ctx.today)) {
            let normal_unit_price = h
                .daily
                .iter()
                .rev()
                .find(|e| e.kind == PriceKind::Normal && e.date < period.start_date)
                .map(|e| e.unit_price);
            let discount_rate = normal_unit_price
                .filter(|n| *n > 0.0)
                .map(|n| (1.0 - period.unit_price / n) * 100.0);
            findings.push(Finding::DiscountPeriod {
                period,
                normal_unit_price,
                discount_rate,
            });
        }
    }
    let heading = format!("{} 할인 기간 {}건", window_label(ctx), findings.len());
    (findings, heading)
}

/// Latest in-window price per product, then every product sharing the
/// minimum (or maximum). The minimum also reports the latest run of
/// consecutive observed days held at that exact price.
fn price_extreme(
    ctx: &RuleContext<'_>,
    histories: &[History<'_>],
    lowest: bool,
) -> (Vec<Finding>, String) {
    let current: Vec<(&History<'_>, &PriceEvent)> = histories
        .iter()
        .filter_map(|h| {
            h.daily
                .iter()
                .rev()
                .find(|e| ctx.in_window(e.date))
                .map(|e| (h, e))
        })
        .collect();

    let target = current.iter().map(|(_, e)| e.unit_price).fold(None, |acc: Option<f64>, p| {
        Some(match acc {
            None => p,
            Some(a) if lowest => a.min(p),
            Some(a) => a.max(p),
        })
    });
    let Some(target) = target else {
        return (Vec::new(), String::new());
    };

    let findings: Vec<Finding> = current
        .iter()
        .filter(|(_, e)| same_price(e.unit_price, target))
        .map(|(h, e)| {
            let (observed_from, observed_to) = if lowest {
                // Latest unbroken run of observed days at the target price
                let run_start = h
                    .daily
                    .iter()
                    .rev()
                    .skip_while(|d| d.date > e.date)
                    .take_while(|d| ctx.in_window(d.date) && same_price(d.unit_price, target))
                    .last()
                    .map(|d| d.date);
                (run_start, Some(e.date))
            } else {
                (None, None)
            };
            Finding::Price {
                product_id: h.product.product_id.clone(),
                date: e.date,
                unit_price: e.unit_price,
                observed_from,
                observed_to,
            }
        })
        .collect();

    let heading = if lowest {
        format!("캡슐당 최저가 {}", format_price(target))
    } else {
        format!("캡슐당 최고가 {}", format_price(target))
    };
    (findings, heading)
}

/// Largest `max - min` unit price spread inside the window. Needs a window.
fn volatility(
    ctx: &RuleContext<'_>,
    histories: &[History<'_>],
) -> Option<(Vec<Finding>, String)> {
    ctx.since?;

    let mut best: Option<Finding> = None;
    let mut best_spread = f64::NEG_INFINITY;
    for h in histories {
        let prices: Vec<f64> = h
            .daily
            .iter()
            .filter(|e| ctx.in_window(e.date))
            .map(|e| e.unit_price)
            .collect();
        if prices.is_empty() {
            continue;
        }
        let min = prices.iter().copied().fold(f64::INFINITY, f64::min);
        let max = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let spread = max - min;
        if spread > best_spread {
            best_spread = spread;
            best = Some(Finding::Volatility {
                product_id: h.product.product_id.clone(),
                min_unit_price: min,
                max_unit_price: max,
                spread,
            });
        }
    }

    let heading = format!("{} 가격 변동폭이 가장 큰 제품", window_label(ctx));
    Some((best.into_iter().collect(), heading))
}

fn lifecycle(
    ctx: &RuleContext<'_>,
    histories: &[History<'_>],
    kind: LifecycleKind,
) -> (Vec<Finding>, String) {
    let mut events: Vec<&LifecycleEvent> = histories
        .iter()
        .flat_map(|h| h.lifecycle.iter())
        .filter(|e| e.kind == kind && ctx.in_window(e.date))
        .collect();
    events.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.product_id.cmp(&b.product_id)));

    let findings: Vec<Finding> = events
        .into_iter()
        .map(|e| Finding::Lifecycle { event: e.clone() })
        .collect();
    let what = match kind {
        LifecycleKind::NewProduct => "신제품",
        LifecycleKind::OutOfStock => "품절",
        LifecycleKind::Restock => "재입고",
    };
    let heading = format!("{} {} {}건", window_label(ctx), what, findings.len());
    (findings, heading)
}

/// NORMAL points whose price differs from the preceding NORMAL point.
/// The preceding point may lie before the window.
fn normal_changes(ctx: &RuleContext<'_>, histories: &[History<'_>]) -> (Vec<Finding>, String) {
    let mut findings = Vec::new();
    for h in histories {
        let mut previous: Option<f64> = None;
        for e in h.daily.iter().filter(|e| e.kind == PriceKind::Normal) {
            if let Some(prev) = previous {
                if !same_price(prev, e.unit_price) && ctx.in_window(e.date) {
                    findings.push(Finding::NormalChange {
                        product_id: h.product.product_id.clone(),
                        date: e.date,
                        previous_unit_price: prev,
                        unit_price: e.unit_price,
                    });
                }
            }
            previous = Some(e.unit_price);
        }
    }
    let heading = format!("{} 정상가 변경 {}건", window_label(ctx), findings.len());
    (findings, heading)
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Whole won when integral, one decimal otherwise.
pub fn format_price(price: f64) -> String {
    if (price - price.round()).abs() < 1e-9 {
        format!("{:.0}원", price)
    } else {
        format!("{:.1}원", price)
    }
}

fn render(finding: &Finding, labels: &HashMap<&str, String>) -> String {
    let label = labels
        .get(finding.product_id())
        .cloned()
        .unwrap_or_else(|| finding.product_id().to_string());
    match finding {
        Finding::Discounted {
            date,
            unit_price,
            normal_unit_price,
            ..
        } => match normal_unit_price {
            Some(n) => format!(
                "- {}: 캡슐당 {} (정상가 {}, {})",
                label,
                format_price(*unit_price),
                format_price(*n),
                date
            ),
            None => format!("- {}: 캡슐당 {} ({})", label, format_price(*unit_price), date),
        },
        Finding::DiscountPeriod {
            period,
            normal_unit_price,
            discount_rate,
        } => {
            let mut line = format!(
                "- {}: {} ~ {} ({}일), 캡슐당 {}",
                label,
                period.start_date,
                period.end_date,
                period.days(),
                format_price(period.unit_price)
            );
            if let (Some(n), Some(rate)) = (normal_unit_price, discount_rate) {
                line.push_str(&format!(", 정상가 {} 대비 {:.1}% 할인", format_price(*n), rate));
            }
            line
        }
        Finding::Price {
            date,
            observed_from,
            observed_to,
            ..
        } => match (observed_from, observed_to) {
            (Some(from), Some(to)) => format!("- {} ({} ~ {} 동안 이 가격)", label, from, to),
            _ => format!("- {} ({} 기준)", label, date),
        },
        Finding::Volatility {
            min_unit_price,
            max_unit_price,
            spread,
            ..
        } => format!(
            "- {}: 캡슐당 {} ~ {} (변동폭 {})",
            label,
            format_price(*min_unit_price),
            format_price(*max_unit_price),
            format_price(*spread)
        ),
        Finding::Lifecycle { event } => format!("- {} {}", event.date, label),
        Finding::NormalChange {
            date,
            previous_unit_price,
            unit_price,
            ..
        } => format!(
            "- {} {}: {} → {}",
            date,
            label,
            format_price(*previous_unit_price),
            format_price(*unit_price)
        ),
    }
}
