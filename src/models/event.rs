use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// PriceEvent — de-duplicated price state at unit granularity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriceKind {
    Normal,
    Discount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceEvent {
    pub product_id: String,
    pub date: NaiveDate,
    pub kind: PriceKind,
    pub unit_price: f64,
}

// ---------------------------------------------------------------------------
// LifecycleEvent — launch and stock transitions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleKind {
    NewProduct,
    OutOfStock,
    Restock,
}

impl LifecycleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleKind::NewProduct => "NEW_PRODUCT",
            LifecycleKind::OutOfStock => "OUT_OF_STOCK",
            LifecycleKind::Restock => "RESTOCK",
        }
    }

    /// Whether this kind takes part in the OUT_OF_STOCK/RESTOCK alternation.
    pub fn is_stock_transition(&self) -> bool {
        matches!(self, LifecycleKind::OutOfStock | LifecycleKind::Restock)
    }
}

impl fmt::Display for LifecycleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts the canonical names plus the Korean labels the ingester writes.
impl FromStr for LifecycleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NEW_PRODUCT" | "NEW" | "신제품" => Ok(LifecycleKind::NewProduct),
            "OUT_OF_STOCK" | "OUT" | "품절" => Ok(LifecycleKind::OutOfStock),
            "RESTOCK" | "RESTORE" | "재입고" => Ok(LifecycleKind::Restock),
            other => Err(format!("unknown lifecycle kind: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub product_id: String,
    pub date: NaiveDate,
    pub kind: LifecycleKind,
}

// ---------------------------------------------------------------------------
// DiscountPeriod — a gap-tolerant run of discount days
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscountPeriod {
    pub product_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Unit price on the first day of the run.
    pub unit_price: f64,
}

impl DiscountPeriod {
    /// Number of calendar days covered, inclusive of both ends.
    pub fn days(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }
}
