//! Intent Classifier: free-text question to one of a closed set of intents.
//!
//! Rules are evaluated top to bottom and the first match wins, so the order
//! of [`RULES`] is the priority order. Matching ignores case and whitespace.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    Discount,
    DiscountPeriod,
    New,
    PriceMin,
    PriceMax,
    Volatility,
    Out,
    Restore,
    NormalChange,
    Unknown,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Discount => "DISCOUNT",
            Intent::DiscountPeriod => "DISCOUNT_PERIOD",
            Intent::New => "NEW",
            Intent::PriceMin => "PRICE_MIN",
            Intent::PriceMax => "PRICE_MAX",
            Intent::Volatility => "VOLATILITY",
            Intent::Out => "OUT",
            Intent::Restore => "RESTORE",
            Intent::NormalChange => "NORMAL_CHANGE",
            Intent::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classifier rule: every group must have at least one term present.
#[derive(Debug, Clone, Copy)]
pub struct IntentRule {
    pub intent: Intent,
    pub all_of: &'static [&'static [&'static str]],
}

impl IntentRule {
    /// Test the rule against text already passed through [`compact`].
    pub fn matches(&self, compacted: &str) -> bool {
        self.all_of
            .iter()
            .all(|group| group.iter().any(|term| compacted.contains(&compact(term))))
    }

    /// Every term this rule reacts to.
    pub fn terms(&self) -> impl Iterator<Item = &'static str> {
        self.all_of.iter().flat_map(|group| group.iter().copied())
    }
}

const DISCOUNT_TERMS: &[&str] = &["할인", "세일", "discount", "on sale"];

/// Ordered rule table. DISCOUNT_PERIOD precedes DISCOUNT and RESTORE
/// precedes OUT because their questions contain the later rule's terms.
pub const RULES: &[IntentRule] = &[
    IntentRule {
        intent: Intent::DiscountPeriod,
        all_of: &[
            DISCOUNT_TERMS,
            &["기간", "언제부터", "언제까지", "period", "how long"],
        ],
    },
    IntentRule {
        intent: Intent::Discount,
        all_of: &[DISCOUNT_TERMS],
    },
    IntentRule {
        intent: Intent::Restore,
        all_of: &[&["재입고", "다시 입고", "restock", "back in stock"]],
    },
    IntentRule {
        intent: Intent::Out,
        all_of: &[&["품절", "재고 없", "out of stock", "sold out"]],
    },
    IntentRule {
        intent: Intent::New,
        all_of: &[&["신제품", "신상", "새로 나온", "출시", "new product", "new release", "launch"]],
    },
    IntentRule {
        intent: Intent::PriceMin,
        all_of: &[&["최저가", "가장 싼", "제일 싼", "가장 저렴", "제일 저렴", "cheapest", "lowest"]],
    },
    IntentRule {
        intent: Intent::PriceMax,
        all_of: &[&["최고가", "가장 비싼", "제일 비싼", "most expensive", "highest"]],
    },
    IntentRule {
        intent: Intent::Volatility,
        all_of: &[&["변동폭", "가격 변동", "등락", "volatil", "fluctuat", "swing"]],
    },
    IntentRule {
        intent: Intent::NormalChange,
        all_of: &[&["정상가", "가격 변경", "가격 인상", "가격 인하", "price change", "normal price"]],
    },
];

/// Lowercase and drop all whitespace, so "가장 싼" matches "가장싼".
pub fn compact(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Classify a question. Total and deterministic: unmatched text is
/// [`Intent::Unknown`].
pub fn classify(question: &str) -> Intent {
    let text = compact(question);
    RULES
        .iter()
        .find(|rule| rule.matches(&text))
        .map(|rule| rule.intent)
        .unwrap_or(Intent::Unknown)
}
