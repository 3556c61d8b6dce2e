use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::event::LifecycleEvent;

/// One chart point. `unit_price` is `None` while the product is out of stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelinePoint {
    pub date: NaiveDate,
    pub unit_price: Option<f64>,
}

/// Gap-nulled display series for one product over a window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub product_id: String,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub points: Vec<TimelinePoint>,
}

impl Timeline {
    /// Price shown on an exact point date, if that date has a point.
    pub fn price_on(&self, date: NaiveDate) -> Option<Option<f64>> {
        self.points
            .iter()
            .find(|p| p.date == date)
            .map(|p| p.unit_price)
    }
}

/// A lifecycle event placed onto a price chart.
///
/// `y` is the nearest non-null price, or `None` when the timeline has none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleMarker {
    pub event: LifecycleEvent,
    pub y: Option<f64>,
}
