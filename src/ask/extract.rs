//! Auxiliary extractors: time window and product keyword filters.
//!
//! Both run independently of the classified intent and never fail. A
//! question with no recognizable period yields `None` (no time restriction);
//! a question with no content words yields an empty filter (every product).
//! An unrecognized question gets empty filters, so the fallback sees the
//! whole catalog.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use super::intent::{compact, RULES};
use crate::models::Product;

/// Fixed period phrases and how many days back they reach.
///
/// Checked in order against the compacted question; the first hit wins.
pub const PERIOD_PHRASES: &[(&str, u64)] = &[
    ("최근 7일", 7),
    ("최근 일주일", 7),
    ("최근 1주", 7),
    ("최근 한 주", 7),
    ("지난 7일", 7),
    ("지난주", 7),
    ("last 7 days", 7),
    ("recent 7 days", 7),
    ("last week", 7),
    ("past week", 7),
    ("최근 한 달", 30),
    ("최근 1개월", 30),
    ("최근 30일", 30),
    ("지난달", 30),
    ("last 30 days", 30),
    ("last month", 30),
    ("recent month", 30),
    ("past month", 30),
    ("최근 3개월", 90),
    ("최근 석 달", 90),
    ("최근 분기", 90),
    ("최근 90일", 90),
    ("last 3 months", 90),
    ("last quarter", 90),
    ("recent quarter", 90),
    ("최근 1년", 365),
    ("최근 일년", 365),
    ("최근 12개월", 365),
    ("최근 365일", 365),
    ("last year", 365),
    ("recent year", 365),
    ("past year", 365),
];

/// Words that never narrow the product set.
const STOP_WORDS: &[&str] = &[
    "알려줘", "알려주세요", "알려", "보여줘", "보여주세요", "찾아줘", "뭐야", "뭐가", "뭐",
    "무엇", "어떤", "어느", "언제", "있어", "있나요", "있는", "있었던", "제품", "상품", "가격",
    "목록", "리스트", "중", "최근", "지난", "된", "것", "거", "좀", "해줘", "얼마", "얼마야",
    "기간", "전체", "모든", "요즘", "이번", "현재", "지금", "가장", "제일", "캡슐당", "원", "큰",
    "작은", "이후", "동안", "했던", "했나", "했어", "인", "는", "주", "일", "달", "년", "분기",
    "최저", "최고", "싼", "비싼", "저렴한", "변동", "변경", "변동이", "된거", "되었던", "정보",
    "중인", "인가요", "나요", "어때", "어땠어", "싶어", "궁금해", "되었나요", "됐어", "된지",
    "변경된", "변동된", "내역", "이력", "변화", "언제였어", "몇", "개", "한", "석", "지난주",
    "지난달",
    "what", "which", "show", "me", "the", "a", "an", "is", "are", "was", "were", "of", "in",
    "on", "for", "list", "products", "product", "price", "prices", "recent", "recently", "last",
    "past", "tell", "about", "with", "any", "please", "when", "did", "do", "does", "have",
    "has", "been", "per", "capsule", "capsules", "week", "month", "quarter", "year", "days",
    "day", "now", "currently", "all", "new", "biggest", "largest",
];

/// Trailing particles stripped from Korean tokens. Stripping only ever
/// shortens a token to a prefix, so it can widen a substring match but
/// never lose one.
const PARTICLES: &[&str] = &[
    "에서", "으로", "까지", "부터", "은", "는", "이", "가", "을", "를", "의", "도", "만", "로",
    "에", "랑", "과", "와",
];

/// Time-unit suffixes; a token that is digits plus one of these is a duration.
const TIME_UNITS: &[&str] = &[
    "일", "주", "주일", "개월", "달", "년", "day", "days", "week", "weeks", "month", "months",
    "year", "years",
];

/// Start of the requested window, `today` minus the matched phrase's days.
pub fn extract_period(question: &str, today: NaiveDate) -> Option<NaiveDate> {
    let text = compact(question);
    PERIOD_PHRASES
        .iter()
        .find(|(phrase, _)| text.contains(&compact(phrase)))
        .and_then(|(_, days)| today.checked_sub_days(Days::new(*days)))
}

/// AND-combined product keywords: the question's tokens minus stop-words,
/// intent trigger words, and duration words.
pub fn extract_keywords(question: &str) -> Vec<String> {
    let triggers: Vec<String> = RULES
        .iter()
        .flat_map(|r| r.terms())
        .map(compact)
        .collect();

    let mut out: Vec<String> = Vec::new();
    for raw in question.split(|c: char| !c.is_alphanumeric()) {
        let lowered = raw.to_lowercase();
        let token = strip_particle(&lowered);
        if token.is_empty()
            || STOP_WORDS.contains(&token.as_str())
            || STOP_WORDS.contains(&lowered.as_str())
            || is_duration(&token)
            || triggers.iter().any(|t| lowered.contains(t.as_str()))
        {
            continue;
        }
        if !out.contains(&token) {
            out.push(token);
        }
    }
    out
}

fn strip_particle(token: &str) -> String {
    let len = token.chars().count();
    for particle in PARTICLES {
        if let Some(stem) = token.strip_suffix(particle) {
            if len >= particle.chars().count() + 2 {
                return stem.to_string();
            }
        }
    }
    token.to_string()
}

fn is_duration(token: &str) -> bool {
    if matches!(token, "한달" | "일주일" | "석달" | "일년" | "한주") {
        return true;
    }
    let rest = token.trim_start_matches(|c: char| c.is_ascii_digit());
    rest.is_empty() || (rest.len() < token.len() && TIME_UNITS.contains(&rest))
}

// ---------------------------------------------------------------------------
// ProductFilter
// ---------------------------------------------------------------------------

/// Keyword filter: AND across tokens, OR across name/brand/category.
///
/// A product matches when every token is a case-insensitive substring of at
/// least one of its fields. An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductFilter {
    pub keywords: Vec<String>,
}

impl ProductFilter {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keywords: keywords.into_iter().map(|k| k.into().to_lowercase()).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    pub fn matches(&self, product: &Product) -> bool {
        let fields: Vec<String> = product.fields().map(str::to_lowercase).collect();
        self.keywords
            .iter()
            .all(|kw| fields.iter().any(|f| f.contains(&kw.to_lowercase())))
    }

    pub fn apply<'a>(&self, products: &'a [Product]) -> Vec<&'a Product> {
        products.iter().filter(|p| self.matches(p)).collect()
    }
}

// ---------------------------------------------------------------------------
// ParsedQuestion
// ---------------------------------------------------------------------------

/// Intent plus the intent-agnostic filters extracted from one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedQuestion {
    pub intent: super::Intent,
    pub since: Option<NaiveDate>,
    pub filter: ProductFilter,
}

/// Classify a question and run both extractors over it.
///
/// An [`Intent::Unknown`](super::Intent::Unknown) question skips extraction.
pub fn parse_question(question: &str, today: NaiveDate) -> ParsedQuestion {
    let intent = super::intent::classify(question);
    if intent == super::Intent::Unknown {
        return ParsedQuestion {
            intent,
            since: None,
            filter: ProductFilter::default(),
        };
    }
    ParsedQuestion {
        intent,
        since: extract_period(question, today),
        filter: ProductFilter::new(extract_keywords(question)),
    }
}
