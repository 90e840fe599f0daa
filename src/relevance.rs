//! Charity keyword matcher.
//!
//! Pure keyword presence, case-insensitive, on whole words or phrases. There
//! is no stop-word list: a false positive costs a reader a glance, a missed
//! fundraiser costs more.

use once_cell::sync::Lazy;
use regex::Regex;

static CHARITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(charity|charities|charitable|fund(?:\s*rais(?:ers?|ing))?|donations?|relief|mutual\s+aid|non[- ]?profits?|benefit)\b",
    )
    .unwrap()
});

/// Whether `text` mentions any charity term.
pub fn matches(text: &str) -> bool {
    CHARITY.is_match(text)
}

/// The first charity term found in `text`, as written there.
pub fn matched_term(text: &str) -> Option<&str> {
    CHARITY.find(text).map(|m| m.as_str())
}
