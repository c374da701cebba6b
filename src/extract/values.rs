//! Cell and token value parsing shared by the tiers.

use bigdecimal::BigDecimal;
use once_cell::sync::Lazy;
use regex::Regex;
use std::str::FromStr;

use crate::model::{Field, PartialRecord, Provenance};

static WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern compiles"));

static UPC_DIGITS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{8,14}\b").expect("UPC pattern compiles"));

static HTS_DIGITS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{8,12}\b").expect("HTS pattern compiles"));

static MONEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^-?\d{1,3}(?:,\d{3})*(?:\.\d+)?$|^-?\d+(?:\.\d+)?$").expect("money pattern compiles")
});

/// A whole number, optionally with thousands separators and a unit word.
static QUANTITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(-?(?:\d{1,3}(?:,\d{3})+|\d+))(?:\s*[A-Za-z]{1,6}\.?)?$")
        .expect("quantity pattern compiles")
});

static DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{1,4}[/\-.]\d{1,2}[/\-.]\d{1,4}$").expect("date pattern compiles")
});

/// Trim and collapse internal whitespace runs to a single space.
pub fn clean_ws(s: &str) -> String {
    WHITESPACE.replace_all(s.trim(), " ").into_owned()
}

/// `None` for blank strings, the cleaned string otherwise.
pub fn non_blank(s: &str) -> Option<String> {
    let cleaned = clean_ws(s);
    (!cleaned.is_empty()).then_some(cleaned)
}

/// Parse a monetary amount, ignoring `$`, `USD` and thousands separators.
pub fn parse_money(s: &str) -> Option<BigDecimal> {
    let stripped: String = s
        .replace("USD", "")
        .chars()
        .filter(|c| !matches!(c, '$' | ' ' | '\u{a0}'))
        .collect();
    if stripped.is_empty() || !MONEY.is_match(&stripped) {
        return None;
    }
    BigDecimal::from_str(&stripped.replace(',', "")).ok()
}

/// Parse a whole-number quantity such as `12`, `1,200` or `6 ea`.
///
/// Negative values are returned so callers can flag them. Fractions and
/// anything else that is not a single integer give `None`.
pub fn parse_quantity(s: &str) -> Option<i64> {
    let caps = QUANTITY.captures(s.trim())?;
    caps[1].replace(',', "").parse().ok()
}

/// First 8 to 14 digit run in `s`.
pub fn find_upc(s: &str) -> Option<String> {
    UPC_DIGITS.find(s).map(|m| m.as_str().to_string())
}

/// First 8 to 12 digit run in `s`.
pub fn find_hts(s: &str) -> Option<String> {
    HTS_DIGITS.find(s).map(|m| m.as_str().to_string())
}

/// Split a combined "brand description" cell: the first word is the brand.
pub fn split_brand_description(s: &str) -> (Option<String>, Option<String>) {
    let cleaned = clean_ws(s);
    match cleaned.split_once(' ') {
        Some((brand, desc)) => (Some(brand.to_string()), non_blank(desc)),
        None if cleaned.is_empty() => (None, None),
        None => (Some(cleaned), None),
    }
}

/// A summary value that passed its field's shape check.
#[derive(Debug, Clone, PartialEq)]
pub enum SummaryValue {
    Text(String),
    Amount(BigDecimal),
}

impl SummaryValue {
    /// Check `raw` (the text following a label) against `field`'s shape.
    ///
    /// Identifier and date fields take only the first word; names and terms
    /// take the whole phrase.
    pub fn accept(field: Field, raw: &str) -> Option<Self> {
        let raw = raw.trim_start_matches(|c: char| c == ':' || c == '#' || c.is_whitespace());
        let phrase = clean_ws(raw);
        let first = phrase.split(' ').next().unwrap_or("");

        match field {
            Field::PoNumber | Field::VendorNumber => {
                let id = first.trim_matches(|c: char| !c.is_alphanumeric());
                id.chars()
                    .any(|c| c.is_ascii_digit())
                    .then(|| SummaryValue::Text(id.to_string()))
            }
            Field::ShipDate => DATE
                .is_match(first)
                .then(|| SummaryValue::Text(first.to_string())),
            Field::VendorName => phrase
                .chars()
                .any(char::is_alphabetic)
                .then(|| SummaryValue::Text(phrase.clone())),
            Field::PaymentTerms => phrase
                .chars()
                .any(char::is_alphanumeric)
                .then(|| SummaryValue::Text(phrase.clone())),
            Field::TotalAmount => parse_money(&phrase)
                .or_else(|| parse_money(first))
                .map(SummaryValue::Amount),
            Field::Orders | Field::SizeBreakdowns => None,
        }
    }

    /// Store into `record` unless the field is already set.
    pub fn apply(self, field: Field, record: &mut PartialRecord, provenance: Provenance) -> bool {
        match self {
            SummaryValue::Text(text) => record.set_text(field, text, provenance),
            SummaryValue::Amount(amount) if field == Field::TotalAmount => {
                record.set_total_amount(amount, provenance)
            }
            SummaryValue::Amount(_) => false,
        }
    }
}
