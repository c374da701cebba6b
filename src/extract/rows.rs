//! Turning column-addressed cell text into line items.
//!
//! Every tier ends up with the same thing for a row: some text per known
//! column. Parsing, size inference, de-duplication and row-level issues are
//! shared here so the tiers agree on what a row means.

use bigdecimal::Signed;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashSet};

use crate::model::{LineItem, ValidationIssue};

use super::sizes::SizeVocabulary;
use super::synonyms::ColumnKind;
use super::values::{
    clean_ws, find_hts, find_upc, non_blank, parse_money, parse_quantity, split_brand_description,
};

static FOOTER_ROW: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:sub\s*-?\s*total|grand\s+total|total|page\s+\d+|continued|carried\s+forward)\b")
        .expect("footer pattern compiles")
});

/// Cell text for one row, keyed by column.
pub type RowCells = BTreeMap<ColumnKind, String>;

/// A parsed row before its final position in the record is known.
#[derive(Debug, Clone, PartialEq)]
pub struct RowDraft {
    pub item: LineItem,
    /// (attribute, detail) pairs for values that were present but unusable
    pub problems: Vec<(&'static str, String)>,
}

impl RowDraft {
    /// Parse a row's cells. Returns `None` for rows with no content at all.
    pub fn from_cells(cells: &RowCells, sizes: &SizeVocabulary) -> Option<Self> {
        let text = |kind: ColumnKind| cells.get(&kind).map(|s| clean_ws(s)).unwrap_or_default();
        if cells.values().all(|v| v.trim().is_empty()) {
            return None;
        }

        let mut item = LineItem::default();
        let mut problems = Vec::new();

        item.product_id = non_blank(&text(ColumnKind::ProductId));
        item.dev_code = non_blank(&text(ColumnKind::DevCode));

        let upc_text = text(ColumnKind::Upc);
        item.upc = find_upc(&upc_text);
        if item.upc.is_none() && !upc_text.is_empty() {
            problems.push(("upc", format!("unreadable UPC '{}'", upc_text)));
        }
        item.hts_code = find_hts(&text(ColumnKind::HtsCode));

        match (cells.contains_key(&ColumnKind::Brand), cells.get(&ColumnKind::BrandDescription)) {
            (false, Some(combined)) => {
                let (brand, description) = split_brand_description(combined);
                item.brand = brand;
                item.description = description;
            }
            _ => {
                item.brand = non_blank(&text(ColumnKind::Brand));
                item.description = non_blank(&text(ColumnKind::Description))
                    .or_else(|| non_blank(&text(ColumnKind::BrandDescription)));
            }
        }

        let qty_text = text(ColumnKind::Quantity);
        match parse_quantity(&qty_text) {
            Some(q) if q < 0 => problems.push(("quantity", format!("negative quantity {}", q))),
            Some(q) => match u32::try_from(q) {
                Ok(q) => item.quantity = Some(q),
                Err(_) => problems.push(("quantity", format!("quantity {} out of range", q))),
            },
            None if !qty_text.is_empty() => {
                problems.push(("quantity", format!("unreadable quantity '{}'", qty_text)))
            }
            None => {}
        }

        for (kind, attr) in [
            (ColumnKind::UnitPrice, "unit_price"),
            (ColumnKind::LineTotal, "line_total"),
        ] {
            let raw = text(kind);
            let mut parsed = parse_money(&raw);
            match &parsed {
                None if !raw.is_empty() => {
                    problems.push((attr, format!("unreadable amount '{}'", raw)))
                }
                Some(amount) if amount.is_negative() => {
                    problems.push((attr, format!("negative amount {}", amount)));
                    parsed = None;
                }
                _ => {}
            }
            match kind {
                ColumnKind::UnitPrice => item.unit_price = parsed,
                _ => item.line_total = parsed,
            }
        }

        item.size = sizes.infer(item.description.as_deref(), item.product_id.as_deref());

        Some(Self { item, problems })
    }

    /// Whether the row carries an identifying key (product id and UPC).
    pub fn has_key(&self) -> bool {
        self.item.product_id.is_some() && self.item.has_upc()
    }
}

/// Subtotal, total, page-number and "continued" rows.
pub fn is_footer_row(text: &str) -> bool {
    FOOTER_ROW.is_match(text)
}

/// Drop repeated `product_id|upc` rows (first kept) and index the row issues.
///
/// Issue paths point at positions in the returned item list.
pub fn finish_rows(drafts: Vec<RowDraft>) -> (Vec<LineItem>, Vec<ValidationIssue>) {
    let mut seen = HashSet::new();
    let mut items = Vec::new();
    let mut issues = Vec::new();

    for draft in drafts {
        let key = draft.item.dedupe_key();
        if key != "|" && !seen.insert(key) {
            log::debug!("dropping repeated row {}", draft.item.dedupe_key());
            continue;
        }
        let idx = items.len();
        for (attr, detail) in draft.problems {
            issues.push(ValidationIssue::missing_field(
                format!("orders[{}].{}", idx, attr),
                detail,
            ));
        }
        items.push(draft.item);
    }

    (items, issues)
}
