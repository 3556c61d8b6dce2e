use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Observation — one scraped day of price/stock data for a product
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub product_id: String,
    pub date: NaiveDate,
    pub normal_price: Option<f64>,
    pub sale_price: Option<f64>,
    pub capsule_count: Option<f64>,
    pub in_stock: bool,
}

impl Observation {
    /// Whether this row is priced at a discount (sale strictly below normal).
    pub fn is_discounted(&self) -> bool {
        matches!(
            (self.sale_price, self.normal_price),
            (Some(sale), Some(normal)) if sale < normal
        )
    }

    /// The price that applied on this day: the sale price when discounted,
    /// otherwise the normal price.
    pub fn applicable_price(&self) -> Option<f64> {
        if self.is_discounted() {
            self.sale_price
        } else {
            self.normal_price
        }
    }

    /// Applicable price divided by capsule count.
    ///
    /// `None` when the price is missing or the capsule count is missing,
    /// zero, or negative.
    pub fn unit_price(&self) -> Option<f64> {
        let count = self.capsule_count.filter(|c| *c > 0.0)?;
        let price = self.applicable_price()?;
        Some(price / count)
    }
}

// ---------------------------------------------------------------------------
// Product — catalog entry used for keyword filtering
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub product_id: String,
    pub name: String,
    pub brand: Option<String>,
    pub category: Option<String>,
}

impl Product {
    /// The searchable text fields: name, brand, category.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str())
            .chain(self.brand.as_deref())
            .chain(self.category.as_deref())
    }

    /// Display label: `brand name` unless the name already carries the brand.
    pub fn label(&self) -> String {
        match &self.brand {
            Some(brand) if !self.name.contains(brand.as_str()) => {
                format!("{} {}", brand, self.name)
            }
            _ => self.name.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot — one bulk fetch from the observation store
// ---------------------------------------------------------------------------

/// Observations and lifecycle rows for a set of products, each ordered by
/// `(product_id, date)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub observations: Vec<Observation>,
    pub lifecycle: Vec<super::event::LifecycleEvent>,
}

impl Snapshot {
    /// Observations for one product, in date order.
    pub fn observations_for<'a>(&'a self, product_id: &'a str) -> impl Iterator<Item = &'a Observation> + 'a {
        self.observations
            .iter()
            .filter(move |o| o.product_id == product_id)
    }

    /// Lifecycle events for one product, in date order.
    pub fn lifecycle_for<'a>(
        &'a self,
        product_id: &'a str,
    ) -> impl Iterator<Item = &'a super::event::LifecycleEvent> + 'a {
        self.lifecycle
            .iter()
            .filter(move |e| e.product_id == product_id)
    }
}
