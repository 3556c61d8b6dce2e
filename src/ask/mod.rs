//! Free-text questions over the derived event set.
//!
//! [`parse_question`] classifies the question and extracts its filters,
//! [`execute`] answers it from the rules, and a [`FallbackAnswerer`] takes
//! over when the rules have nothing to say.

pub mod executor;
pub mod extract;
pub mod fallback;
pub mod intent;

pub use executor::{execute, format_price, RuleContext};
pub use extract::{extract_keywords, extract_period, parse_question, ParsedQuestion, ProductFilter};
pub use fallback::{resolve, FallbackAnswerer, HttpFallback, SharedAnswerer};
pub use intent::{classify, Intent, IntentRule, RULES};
