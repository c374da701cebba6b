//! Versioned label and column-header synonym table.
//!
//! Both the position tier (field labels, column headers drawn as loose words)
//! and the table tier (header cells) consult the same table, so matching
//! policy lives here as data.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use unicode_normalization::UnicodeNormalization;

use crate::model::Field;

/// A line-item column recognized by header text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Quantity,
    ProductId,
    DevCode,
    Upc,
    HtsCode,
    Brand,
    Description,
    /// A single column holding brand followed by description
    BrandDescription,
    UnitPrice,
    LineTotal,
}

impl ColumnKind {
    pub const ALL: [ColumnKind; 10] = [
        ColumnKind::Quantity,
        ColumnKind::ProductId,
        ColumnKind::DevCode,
        ColumnKind::Upc,
        ColumnKind::HtsCode,
        ColumnKind::Brand,
        ColumnKind::Description,
        ColumnKind::BrandDescription,
        ColumnKind::UnitPrice,
        ColumnKind::LineTotal,
    ];

    /// Free-text columns, whose content can run across several words.
    pub fn is_text(&self) -> bool {
        matches!(
            self,
            ColumnKind::Brand | ColumnKind::Description | ColumnKind::BrandDescription
        )
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnKind::Quantity => "quantity",
            ColumnKind::ProductId => "product_id",
            ColumnKind::DevCode => "dev_code",
            ColumnKind::Upc => "upc",
            ColumnKind::HtsCode => "hts_code",
            ColumnKind::Brand => "brand",
            ColumnKind::Description => "description",
            ColumnKind::BrandDescription => "brand_description",
            ColumnKind::UnitPrice => "unit_price",
            ColumnKind::LineTotal => "line_total",
        };
        f.write_str(name)
    }
}

/// Field labels and column headers accepted for each schema element.
///
/// Entries are stored normalized (see [`normalize_label`]), including entries
/// loaded from configuration; the table is compared as a whole, so bump
/// `version` whenever entries change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynonymTable {
    pub version: u32,
    /// Summary field -> label spellings ("PO #", "Ship Date")
    #[serde(deserialize_with = "normalized_entries")]
    pub labels: BTreeMap<Field, Vec<String>>,
    /// Column -> header spellings ("UPC", "U.P.C.", "Barcode")
    #[serde(deserialize_with = "normalized_entries")]
    pub columns: BTreeMap<ColumnKind, Vec<String>>,
    /// Maximum edit distance for fuzzy matches (applies to entries of 5+ chars)
    pub max_edit_distance: usize,
}

impl Default for SynonymTable {
    fn default() -> Self {
        let labels: [(Field, &[&str]); 6] = [
            (
                Field::PoNumber,
                &[
                    "po",
                    "po #",
                    "po no",
                    "po number",
                    "purchase order",
                    "purchase order #",
                    "purchase order no",
                    "purchase order number",
                    "order #",
                    "order number",
                ],
            ),
            (
                Field::VendorName,
                &["vendor", "vendor name", "supplier", "supplier name", "sold by"],
            ),
            (
                Field::VendorNumber,
                &[
                    "vendor #",
                    "vendor no",
                    "vendor number",
                    "vendor id",
                    "supplier #",
                    "supplier no",
                ],
            ),
            (
                Field::ShipDate,
                &[
                    "ship date",
                    "ship by",
                    "ship by date",
                    "ship complete by",
                    "ship complete by date",
                    "delivery date",
                ],
            ),
            (Field::PaymentTerms, &["terms", "payment terms", "pay terms"]),
            (
                Field::TotalAmount,
                &[
                    "total",
                    "total amount",
                    "grand total",
                    "po total",
                    "order total",
                    "total due",
                ],
            ),
        ];

        let columns: [(ColumnKind, &[&str]); 10] = [
            (
                ColumnKind::Quantity,
                &["qty", "quantity", "qty ordered", "order qty", "ordered qty", "units"],
            ),
            (
                ColumnKind::ProductId,
                &[
                    "sku",
                    "item",
                    "item sku",
                    "item #",
                    "item no",
                    "item number",
                    "style",
                    "style #",
                    "style no",
                    "product id",
                ],
            ),
            (
                ColumnKind::DevCode,
                &["dev", "dev code", "dev #", "dev no", "devcode", "development code"],
            ),
            (
                ColumnKind::Upc,
                &["upc", "upc code", "upc #", "barcode", "bar code", "gtin", "ean"],
            ),
            (
                ColumnKind::HtsCode,
                &["hts", "hts code", "hts #", "hs code", "htscode", "tariff code"],
            ),
            (ColumnKind::Brand, &["brand", "brand name"]),
            (
                ColumnKind::Description,
                &[
                    "description",
                    "desc",
                    "item description",
                    "product description",
                    "ns description",
                ],
            ),
            (
                ColumnKind::BrandDescription,
                &["brand description", "brand desc", "brand and description"],
            ),
            (
                ColumnKind::UnitPrice,
                &["rate", "price", "unit price", "unit cost", "cost", "price each", "each"],
            ),
            (
                ColumnKind::LineTotal,
                &[
                    "amount",
                    "amt",
                    "total",
                    "line total",
                    "ext price",
                    "extended price",
                    "ext amount",
                    "extended",
                ],
            ),
        ];

        Self {
            version: 1,
            labels: labels
                .iter()
                .map(|(field, names)| (*field, normalize_all(names)))
                .collect(),
            columns: columns
                .iter()
                .map(|(kind, names)| (*kind, normalize_all(names)))
                .collect(),
            max_edit_distance: 1,
        }
    }
}

/// A synonym hit, and whether it matched exactly or only within the edit distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SynonymMatch<K> {
    pub key: K,
    pub exact: bool,
}

impl SynonymTable {
    /// The summary field a label names.
    pub fn match_label(&self, text: &str) -> Option<Field> {
        self.lookup_label(text).map(|m| m.key)
    }

    /// Like [`match_label`](Self::match_label), reporting whether the match was exact.
    pub fn lookup_label(&self, text: &str) -> Option<SynonymMatch<Field>> {
        let key = normalize_label(text);
        if key.is_empty() {
            return None;
        }
        best_match(&self.labels, &key, self.max_edit_distance)
    }

    /// The column a header cell names.
    ///
    /// Falls back to keyword containment ("Qty Ordered (ea)" is a quantity)
    /// when neither an exact nor a fuzzy match exists.
    pub fn match_column(&self, header: &str) -> Option<ColumnKind> {
        if let Some(m) = self.lookup_column(header) {
            return Some(m.key);
        }
        let key = normalize_label(header);
        if key.is_empty() {
            return None;
        }

        let words: Vec<&str> = key.split(' ').collect();
        self.columns
            .iter()
            .flat_map(|(kind, names)| names.iter().map(move |n| (*kind, n)))
            .filter(|(_, name)| name.len() >= 3 && !name.contains(' '))
            .find(|(_, name)| words.contains(&name.as_str()))
            .map(|(kind, _)| kind)
    }

    /// Exact or fuzzy column match, without the keyword fallback.
    pub fn lookup_column(&self, header: &str) -> Option<SynonymMatch<ColumnKind>> {
        let key = normalize_label(header);
        if key.is_empty() {
            return None;
        }
        best_match(&self.columns, &key, self.max_edit_distance)
    }

    /// Longest label entry, in words.
    pub fn max_label_words(&self) -> usize {
        self.labels
            .values()
            .flatten()
            .map(|l| l.split(' ').count())
            .max()
            .unwrap_or(1)
    }
}

/// Exact match first, then the closest entry within `max_distance` edits.
/// Ties go to the longer entry.
fn best_match<K: Copy>(
    table: &BTreeMap<K, Vec<String>>,
    key: &str,
    max_distance: usize,
) -> Option<SynonymMatch<K>> {
    let entries = || {
        table
            .iter()
            .flat_map(|(k, names)| names.iter().map(move |n| (*k, n.as_str())))
    };

    if let Some((k, _)) = entries().find(|(_, name)| *name == key) {
        return Some(SynonymMatch { key: k, exact: true });
    }
    if max_distance == 0 {
        return None;
    }

    entries()
        .filter(|(_, name)| name.chars().count() >= 5)
        .map(|(k, name)| (k, name, edit_distance(name, key)))
        .filter(|(_, _, d)| *d <= max_distance)
        .min_by(|a, b| a.2.cmp(&b.2).then(b.1.len().cmp(&a.1.len())))
        .map(|(k, _, _)| SynonymMatch { key: k, exact: false })
}

fn normalized_entries<'de, D, K>(deserializer: D) -> Result<BTreeMap<K, Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
    K: Deserialize<'de> + Ord,
{
    let raw = BTreeMap::<K, Vec<String>>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(key, names)| (key, names.iter().map(|n| normalize_label(n)).collect()))
        .collect())
}

fn normalize_all(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| normalize_label(n)).collect()
}

/// Normalize a label or header for comparison.
///
/// NFKC, lowercase, periods removed ("U.P.C." -> "upc"), `#` kept as its own
/// token, every other punctuation mark treated as a word break.
pub fn normalize_label(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.nfkc().flat_map(char::to_lowercase) {
        match c {
            '.' => {}
            '#' => out.push_str(" # "),
            c if c.is_alphanumeric() => out.push(c),
            _ => out.push(' '),
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Levenshtein distance over chars.
fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("U.P.C."), "upc");
        assert_eq!(normalize_label("PO#:"), "po #");
        assert_eq!(normalize_label("  Item_SKU "), "item sku");
        assert_eq!(normalize_label("Brand/Description"), "brand description");
        assert_eq!(normalize_label("ＵＰＣ"), "upc");
    }

    #[test]
    fn test_match_label() {
        let table = SynonymTable::default();
        assert_eq!(table.match_label("PO Number:"), Some(Field::PoNumber));
        assert_eq!(table.match_label("Vendor #"), Some(Field::VendorNumber));
        assert_eq!(table.match_label("Vendor:"), Some(Field::VendorName));
        assert_eq!(table.match_label("Ship Dat:"), Some(Field::ShipDate));
        assert_eq!(table.match_label("Payment Terms"), Some(Field::PaymentTerms));
        assert_eq!(table.match_label("Qty"), None);

        let hit = table.lookup_label("Ship Dat").unwrap();
        assert_eq!(hit.key, Field::ShipDate);
        assert!(!hit.exact);
        assert!(table.lookup_label("Ship Date").unwrap().exact);
    }

    #[test]
    fn test_match_column() {
        let table = SynonymTable::default();
        assert_eq!(table.match_column("U.P.C."), Some(ColumnKind::Upc));
        assert_eq!(table.match_column("Barcode"), Some(ColumnKind::Upc));
        assert_eq!(table.match_column("Item_SKU"), Some(ColumnKind::ProductId));
        assert_eq!(table.match_column("Unit Price"), Some(ColumnKind::UnitPrice));
        assert_eq!(table.match_column("Qty Ordered (ea)"), Some(ColumnKind::Quantity));
        assert_eq!(table.match_column("Descripton"), Some(ColumnKind::Description));
        assert_eq!(table.match_column("Notes"), None);
        assert_eq!(table.lookup_column("Qty SKU"), None);
    }

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        assert_eq!(edit_distance("upc", "upc"), 0);
        assert_eq!(edit_distance("", "abc"), 3);
    }

    #[test]
    fn test_serde_roundtrip_keeps_version() {
        let table = SynonymTable::default();
        let json = serde_json::to_string(&table).unwrap();
        let back: SynonymTable = serde_json::from_str(&json).unwrap();
        assert_eq!(back, table);
        assert_eq!(back.version, 1);
    }

    #[test]
    fn test_configured_entries_are_normalized() {
        let table: SynonymTable = serde_json::from_str(
            r#"{"labels": {"po_number": ["P.O. Ref"]}, "columns": {"upc": ["Bar-Code #"]}}"#,
        )
        .unwrap();
        assert_eq!(table.labels[&Field::PoNumber], vec!["po ref".to_string()]);

        let hit = table.lookup_label("P.O. Ref:").unwrap();
        assert_eq!(hit.key, Field::PoNumber);
        assert!(hit.exact);
        assert_eq!(table.match_column("BAR CODE #"), Some(ColumnKind::Upc));
        // Sections left out keep their defaults
        assert_eq!(table.max_edit_distance, 1);
    }
}
