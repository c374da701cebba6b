//! Size sheet: one row per product, quantities spread across size columns.
//!
//! A product is a line item's description with its trailing size removed, so
//! "Ruffle Shorts 3-6m" and "Ruffle Shorts 6-12m" land on the same row. Rows
//! keep first-seen order. Columns are the vocabulary's canonical labels
//! followed by any other sizes found, in first-seen order.
//!
//! When a size breakdown exists for an item's product id, its per-size
//! quantities are used instead of the item's single size and quantity.

use serde::Serialize;
use std::collections::HashMap;

use crate::extract::SizeVocabulary;
use crate::model::{DocumentRecord, LineItem, SizeBreakdown};

/// Size used for items whose size cannot be determined.
const UNSIZED: &str = "One size";

/// One product row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SizeSheetRow {
    pub product: String,
    /// SKU without its size code, from the first item that has one
    pub style: Option<String>,
    pub dev_code: Option<String>,
    pub hts_code: Option<String>,
    /// Quantity per size column, aligned with [`SizeSheet::sizes`]
    pub quantities: Vec<u64>,
    pub total: u64,
}

/// Product-by-size quantity matrix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SizeSheet {
    pub sizes: Vec<String>,
    pub rows: Vec<SizeSheetRow>,
}

impl SizeSheet {
    /// Fixed columns preceding the size columns.
    pub const LEADING_COLUMNS: [&'static str; 4] = ["Item SKU", "Dev Code", "HTS Code", "Product"];

    pub fn from_record(record: &DocumentRecord, vocabulary: &SizeVocabulary) -> Self {
        let breakdowns: HashMap<&str, &SizeBreakdown> = record
            .size_breakdowns
            .iter()
            .map(|b| (b.product_id.trim(), b))
            .collect();

        let mut builder = Builder::new(vocabulary);
        for item in &record.orders {
            let product = product_name(item, vocabulary);
            let breakdown = item
                .product_id
                .as_deref()
                .and_then(|id| breakdowns.get(id.trim()));

            match breakdown {
                Some(breakdown) => {
                    for size in &breakdown.sizes {
                        let label = vocabulary
                            .canonical(&size.label)
                            .unwrap_or(size.label.as_str());
                        builder.add(&product, item, label, u64::from(size.quantity));
                    }
                }
                None => {
                    let size = item
                        .size
                        .clone()
                        .or_else(|| vocabulary.infer(item.description.as_deref(), item.product_id.as_deref()));
                    let quantity = u64::from(item.quantity.unwrap_or(0));
                    builder.add(&product, item, size.as_deref().unwrap_or(UNSIZED), quantity);
                }
            }
        }
        builder.finish()
    }

    /// Column headers: fixed columns, sizes, then "Total".
    pub fn header(&self) -> Vec<String> {
        Self::LEADING_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .chain(self.sizes.iter().cloned())
            .chain(std::iter::once("Total".to_string()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Quantity of `size` on the row for `product`.
    pub fn quantity(&self, product: &str, size: &str) -> Option<u64> {
        let col = self.sizes.iter().position(|s| s == size)?;
        self.rows
            .iter()
            .find(|r| r.product == product)
            .and_then(|r| r.quantities.get(col).copied())
    }
}

/// Accumulates quantities keyed by product and size label.
struct Builder<'v> {
    vocabulary: &'v SizeVocabulary,
    rows: Vec<PendingRow>,
    index: HashMap<String, usize>,
    extra_sizes: Vec<String>,
}

struct PendingRow {
    product: String,
    style: Option<String>,
    dev_code: Option<String>,
    hts_code: Option<String>,
    quantities: HashMap<String, u64>,
}

impl<'v> Builder<'v> {
    fn new(vocabulary: &'v SizeVocabulary) -> Self {
        Self {
            vocabulary,
            rows: Vec::new(),
            index: HashMap::new(),
            extra_sizes: Vec::new(),
        }
    }

    fn add(&mut self, product: &str, item: &LineItem, size: &str, quantity: u64) {
        if self.vocabulary.order_index(size).is_none() && !self.extra_sizes.iter().any(|s| s == size) {
            self.extra_sizes.push(size.to_string());
        }

        let idx = match self.index.get(product) {
            Some(idx) => *idx,
            None => {
                self.rows.push(PendingRow {
                    product: product.to_string(),
                    style: None,
                    dev_code: None,
                    hts_code: None,
                    quantities: HashMap::new(),
                });
                self.index.insert(product.to_string(), self.rows.len() - 1);
                self.rows.len() - 1
            }
        };

        let vocabulary = self.vocabulary;
        let row = &mut self.rows[idx];
        if row.style.is_none() {
            row.style = item
                .product_id
                .as_deref()
                .map(|sku| vocabulary.style_of(sku).to_string());
        }
        if row.dev_code.is_none() {
            row.dev_code = item.dev_code.clone();
        }
        if row.hts_code.is_none() {
            row.hts_code = item.hts_code.clone();
        }
        *row.quantities.entry(size.to_string()).or_insert(0) += quantity;
    }

    fn finish(self) -> SizeSheet {
        let sizes: Vec<String> = self
            .vocabulary
            .labels
            .iter()
            .cloned()
            .chain(self.extra_sizes)
            .collect();

        let rows = self
            .rows
            .into_iter()
            .map(|row| {
                let quantities: Vec<u64> = sizes
                    .iter()
                    .map(|s| row.quantities.get(s).copied().unwrap_or(0))
                    .collect();
                SizeSheetRow {
                    product: row.product,
                    style: row.style,
                    dev_code: row.dev_code,
                    hts_code: row.hts_code,
                    total: quantities.iter().sum(),
                    quantities,
                }
            })
            .collect();

        SizeSheet { sizes, rows }
    }
}

/// Description without its trailing size, falling back to the style.
fn product_name(item: &LineItem, vocabulary: &SizeVocabulary) -> String {
    if let Some(description) = item.description.as_deref().filter(|d| !d.trim().is_empty()) {
        return vocabulary.split_description(description).0.to_string();
    }
    item.product_id
        .as_deref()
        .map(|sku| vocabulary.style_of(sku).to_string())
        .or_else(|| item.upc.clone())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Summary;
    use std::collections::BTreeMap;

    fn item(sku: &str, desc: &str, qty: u32) -> LineItem {
        LineItem {
            product_id: Some(sku.into()),
            description: Some(desc.into()),
            dev_code: Some("DV01".into()),
            quantity: Some(qty),
            ..Default::default()
        }
    }

    fn record(orders: Vec<LineItem>, sizes: Vec<SizeBreakdown>) -> DocumentRecord {
        DocumentRecord::new(
            Summary {
                po_number: "1".into(),
                ..Default::default()
            },
            orders,
            sizes,
            BTreeMap::new(),
            vec![],
            1.0,
        )
    }

    #[test]
    fn test_groups_by_product() {
        let vocab = SizeVocabulary::default();
        let sheet = SizeSheet::from_record(
            &record(
                vec![
                    item("ABC-0306M", "Ruffle Shorts 3-6m", 6),
                    item("XYZ-2T000", "Kids Tee", 4),
                    item("ABC-0612M", "Ruffle Shorts 6-12m", 12),
                    item("ABC-0306M", "Ruffle Shorts 3-6m", 2),
                ],
                vec![],
            ),
            &vocab,
        );

        assert_eq!(sheet.rows.len(), 2);
        let first = &sheet.rows[0];
        assert_eq!(first.product, "Ruffle Shorts");
        assert_eq!(first.style.as_deref(), Some("ABC"));
        assert_eq!(first.total, 20);
        assert_eq!(sheet.quantity("Ruffle Shorts", "3-6m"), Some(8));
        assert_eq!(sheet.quantity("Ruffle Shorts", "6-12m"), Some(12));
        // Size from the SKU code
        assert_eq!(sheet.quantity("Kids Tee", "2T"), Some(4));
        assert_eq!(sheet.sizes, vocab.labels);
    }

    #[test]
    fn test_breakdown_and_extras() {
        let vocab = SizeVocabulary::default();
        let sheet = SizeSheet::from_record(
            &record(
                vec![item("ABC-100", "Swim Trunks", 10), item("ABC-200", "Mystery Item", 3)],
                vec![SizeBreakdown::new("ABC-100")
                    .with_size("small", 4)
                    .with_size("14/16", 6)],
            ),
            &vocab,
        );

        assert_eq!(sheet.quantity("Swim Trunks", "S"), Some(4));
        assert_eq!(sheet.quantity("Swim Trunks", "14/16"), Some(6));
        assert_eq!(sheet.quantity("Mystery Item", UNSIZED), Some(3));
        assert_eq!(sheet.sizes.last().map(String::as_str), Some("14/16"));

        let header = sheet.header();
        assert_eq!(header[0], "Item SKU");
        assert_eq!(header.last().map(String::as_str), Some("Total"));
        assert_eq!(header.len(), 4 + sheet.sizes.len() + 1);
    }

    #[test]
    fn test_empty_record() {
        let sheet = SizeSheet::from_record(&record(vec![], vec![]), &SizeVocabulary::default());
        assert!(sheet.is_empty());
    }
}
