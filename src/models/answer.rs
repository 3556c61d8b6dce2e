use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::event::{DiscountPeriod, LifecycleEvent};
use super::observation::{Product, Snapshot};
use crate::ask::Intent;

// ---------------------------------------------------------------------------
// Finding — one structured row of a rule answer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Finding {
    Discounted {
        product_id: String,
        date: NaiveDate,
        unit_price: f64,
        normal_unit_price: Option<f64>,
    },
    DiscountPeriod {
        period: DiscountPeriod,
        /// Latest normal unit price strictly before the period started.
        normal_unit_price: Option<f64>,
        /// Percent off the normal price, when a normal price is known.
        discount_rate: Option<f64>,
    },
    Price {
        product_id: String,
        date: NaiveDate,
        unit_price: f64,
        /// Latest unbroken run of observed days at this exact unit price.
        observed_from: Option<NaiveDate>,
        observed_to: Option<NaiveDate>,
    },
    Volatility {
        product_id: String,
        min_unit_price: f64,
        max_unit_price: f64,
        spread: f64,
    },
    Lifecycle {
        event: LifecycleEvent,
    },
    NormalChange {
        product_id: String,
        date: NaiveDate,
        previous_unit_price: f64,
        unit_price: f64,
    },
}

impl Finding {
    pub fn product_id(&self) -> &str {
        match self {
            Finding::Discounted { product_id, .. }
            | Finding::Price { product_id, .. }
            | Finding::Volatility { product_id, .. }
            | Finding::NormalChange { product_id, .. } => product_id,
            Finding::DiscountPeriod { period, .. } => &period.product_id,
            Finding::Lifecycle { event } => &event.product_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Answers
// ---------------------------------------------------------------------------

/// A deterministic answer produced by the rule executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleAnswer {
    pub intent: Intent,
    pub text: String,
    /// Matching products, in first-seen order, for follow-up selection.
    pub product_ids: Vec<String>,
    pub findings: Vec<Finding>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelegationReason {
    /// No rule matched the question.
    UnknownIntent,
    /// A rule matched but its query returned nothing.
    NoRows,
}

/// Everything the fallback answerer needs: the question and the same
/// filtered dataset the rules saw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delegation {
    pub question: String,
    pub intent: Intent,
    pub reason: DelegationReason,
    pub since: Option<NaiveDate>,
    pub keywords: Vec<String>,
    pub products: Vec<Product>,
    pub snapshot: Snapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Answer {
    Rule(RuleAnswer),
    Delegate(Delegation),
    /// Text returned by the fallback answerer for a delegated question.
    Generated { question: String, text: String },
}

impl Answer {
    pub fn text(&self) -> Option<&str> {
        match self {
            Answer::Rule(r) => Some(&r.text),
            Answer::Generated { text, .. } => Some(text),
            Answer::Delegate(_) => None,
        }
    }

    pub fn is_delegated(&self) -> bool {
        matches!(self, Answer::Delegate(_))
    }
}
