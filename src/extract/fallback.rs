//! Regex tier: last-resort patterns over raw page text.
//!
//! Everything found here carries [`Tier::Regex`] provenance, whose
//! confidence sits below the default review threshold. When several matches
//! exist for a field the first in document order wins, except for the total,
//! which is taken from the last page that states one.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashSet;

use crate::model::{Field, LineItem, PagePrimitive, PartialRecord, Provenance, Tier};

use super::options::{ExtractOptions, UpcScheme};
use super::rows::{finish_rows, RowCells, RowDraft};
use super::sizes::SizeVocabulary;
use super::synonyms::ColumnKind;
use super::values::{clean_ws, parse_money};
use super::Extractor;

static PO_NUMBER: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?i)\bP\.?O\.?\s*(?:Number|No\.?)?\s*[#:]?\s*(\d{4,})",
        r"(?i)\bPurchase\s+Order\s*(?:Number|No\.?)?\s*[#:]?\s*(\d{4,})",
    ])
});

static VENDOR_NUMBER: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?i)\bVendor\s*#\s*:?\s*(\d+)",
        r"(?i)\bVendor\s*(?:No\.?|Number|ID)\s*:?\s*(\d+)",
    ])
});

static VENDOR_NAME: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[r"(?im)^[ \t]*(?:Vendor|Supplier)(?:[ \t]+Name)?[ \t]*:[ \t]*([A-Za-z][^\n]*?)[ \t]*$"])
});

static SHIP_DATE: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?i)SHIP\s*(?:COMPLETE\s*)?BY\s*DATE:?\s*([\d/\-]{6,10})",
        r"(?i)Ship\s*(?:By|Date):?\s*([\d/\-]{6,10})",
    ])
});

static PAYMENT_TERMS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?i)PAYMENT\s*TERMS:?[ \t]*([^\n]+)",
        r"(?i)\bTerms:?[ \t]*([^\n]+)",
    ])
});

static TOTAL: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[r"(?i)\bTotal\s*(?:Amount|Due)?\s*:?\s*\$?\s*(\d{1,3}(?:,\d{3})*\.\d{2})"])
});

/// A full line-item row: qty, sku, optional dev code, upc, optional hts,
/// brand+description, rate, amount. A dev code always has a letter, so a
/// UPC is never read as one.
static ITEM_ROW: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"\b(?P<qty>\d{1,4})\s+(?P<sku>[A-Z0-9-]{6,})\s+(?:(?P<dev>[A-Z0-9]*[A-Z][A-Z0-9]*)\s+)?",
        r"(?P<upc>\d{8,14})\s+(?:(?P<hts>\d{8,12})\s+)?",
        r"(?P<branddesc>[A-Za-z][A-Za-z0-9&'\- ]*?)\s+",
        r"\$?(?P<rate>\d{1,3}(?:,\d{3})*\.\d{2})\s+\$?(?P<amount>\d{1,3}(?:,\d{3})*\.\d{2})",
    ))
    .expect("item row pattern compiles")
});

static UPC_A: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{12}\b").expect("UPC-A pattern compiles"));

static GTIN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:\d{8}|\d{12,14})\b").expect("GTIN pattern compiles"));

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("summary pattern compiles"))
        .collect()
}

/// Pattern matching over each page's raw text.
pub struct RegexExtractor<'a> {
    sizes: &'a SizeVocabulary,
    upc_scheme: UpcScheme,
}

impl<'a> RegexExtractor<'a> {
    pub fn new(options: &'a ExtractOptions) -> Self {
        Self {
            sizes: &options.size_vocabulary,
            upc_scheme: options.upc_scheme,
        }
    }

    /// Full item rows from the whitespace-collapsed document text.
    fn item_rows(&self, text: &str) -> Vec<RowDraft> {
        ITEM_ROW
            .captures_iter(text)
            .filter_map(|caps| RowDraft::from_cells(&row_cells(&caps), self.sizes))
            .collect()
    }

    /// Standalone barcodes, when no full row could be read.
    fn bare_upcs(&self, pages: &[PagePrimitive]) -> Vec<LineItem> {
        let pattern: &Regex = match self.upc_scheme {
            UpcScheme::UpcA => &*UPC_A,
            UpcScheme::Gtin => &*GTIN,
        };

        let mut seen = HashSet::new();
        pages
            .iter()
            .flat_map(|page| pattern.find_iter(&page.text))
            .map(|m| m.as_str())
            .filter(|upc| seen.insert(*upc))
            .map(LineItem::with_upc)
            .collect()
    }
}

/// First capture of the first pattern that matches, trying each pattern over
/// the pages in order.
fn first_capture<'t>(
    patterns: &[Regex],
    mut pages: impl Iterator<Item = &'t PagePrimitive>,
) -> Option<String> {
    pages.find_map(|page| {
        patterns
            .iter()
            .filter_map(|re| re.captures(&page.text))
            .filter_map(|caps| caps.get(1))
            .min_by_key(|m| m.start())
            .map(|m| clean_ws(m.as_str()))
            .filter(|v| !v.is_empty())
    })
}

fn row_cells(caps: &Captures<'_>) -> RowCells {
    let mut cells = RowCells::new();
    for (name, kind) in [
        ("qty", ColumnKind::Quantity),
        ("sku", ColumnKind::ProductId),
        ("dev", ColumnKind::DevCode),
        ("upc", ColumnKind::Upc),
        ("hts", ColumnKind::HtsCode),
        ("branddesc", ColumnKind::BrandDescription),
        ("rate", ColumnKind::UnitPrice),
        ("amount", ColumnKind::LineTotal),
    ] {
        if let Some(m) = caps.name(name) {
            cells.insert(kind, m.as_str().to_string());
        }
    }
    cells
}

impl Extractor for RegexExtractor<'_> {
    fn tier(&self) -> Tier {
        Tier::Regex
    }

    fn extract(&self, pages: &[PagePrimitive], current: &PartialRecord) -> PartialRecord {
        let mut found = PartialRecord::new();
        let provenance = Provenance::from_tier(Tier::Regex);

        let text_fields: [(Field, &Lazy<Vec<Regex>>); 5] = [
            (Field::PoNumber, &PO_NUMBER),
            (Field::VendorNumber, &VENDOR_NUMBER),
            (Field::VendorName, &VENDOR_NAME),
            (Field::ShipDate, &SHIP_DATE),
            (Field::PaymentTerms, &PAYMENT_TERMS),
        ];
        for (field, patterns) in text_fields {
            if current.is_set(field) {
                continue;
            }
            if let Some(value) = first_capture(patterns, pages.iter()) {
                log::debug!("{} matched by pattern", field);
                found.set_text(field, value, provenance);
            }
        }

        if !current.is_set(Field::TotalAmount) {
            let total = first_capture(&TOTAL, pages.iter().rev()).and_then(|v| parse_money(&v));
            if let Some(total) = total {
                found.set_total_amount(total, provenance);
            }
        }

        if !current.is_set(Field::Orders) {
            let text = clean_ws(
                &pages
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<Vec<_>>()
                    .join(" "),
            );
            let (items, issues) = finish_rows(self.item_rows(&text));
            if items.is_empty() {
                let items = self.bare_upcs(pages);
                log::debug!("no full item rows; {} bare UPCs", items.len());
                found.set_orders(items, Vec::new(), provenance);
            } else {
                found.set_orders(items, issues, provenance);
            }
        }

        found
    }
}
