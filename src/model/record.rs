//! The purchase-order record and its partial, in-progress form.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Deref;

use super::{Field, LineItem, Provenance, QaReport, SizeBreakdown, ValidationIssue};

/// Date formats seen in the "ship by" field of vendor documents.
const SHIP_DATE_FORMATS: [&str; 5] = ["%m/%d/%Y", "%m-%d-%Y", "%Y-%m-%d", "%m/%d/%y", "%m-%d-%y"];

/// Header metadata of a purchase order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// PO number, the document's unique key
    pub po_number: String,
    pub vendor_name: Option<String>,
    pub vendor_number: Option<String>,
    /// Ship date exactly as printed
    pub ship_date: Option<String>,
    pub payment_terms: Option<String>,
    pub total_amount: Option<BigDecimal>,
    /// Number of pages in the source PDF
    pub page_count: u32,
    /// Source filename, metadata only
    pub source_filename: Option<String>,
}

impl Summary {
    /// Parse the printed ship date, trying the common US and ISO layouts.
    pub fn ship_date_parsed(&self) -> Option<NaiveDate> {
        let raw = self.ship_date.as_deref()?.trim();
        SHIP_DATE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
    }
}

/// A record under construction: only the fields some tier has found are set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialRecord {
    pub po_number: Option<String>,
    pub vendor_name: Option<String>,
    pub vendor_number: Option<String>,
    pub ship_date: Option<String>,
    pub payment_terms: Option<String>,
    pub total_amount: Option<BigDecimal>,
    pub orders: Vec<LineItem>,
    pub size_breakdowns: Vec<SizeBreakdown>,
    pub provenance: BTreeMap<Field, Provenance>,
    /// Row-level findings that travel with `orders`
    pub order_issues: Vec<ValidationIssue>,
    /// Row-level findings that travel with `size_breakdowns`
    pub size_issues: Vec<ValidationIssue>,
}

impl PartialRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `field` already holds a value.
    pub fn is_set(&self, field: Field) -> bool {
        match field {
            Field::PoNumber => self.po_number.is_some(),
            Field::VendorName => self.vendor_name.is_some(),
            Field::VendorNumber => self.vendor_number.is_some(),
            Field::ShipDate => self.ship_date.is_some(),
            Field::PaymentTerms => self.payment_terms.is_some(),
            Field::TotalAmount => self.total_amount.is_some(),
            Field::Orders => !self.orders.is_empty(),
            Field::SizeBreakdowns => !self.size_breakdowns.is_empty(),
        }
    }

    /// Whether `field` satisfies a "required" constraint.
    ///
    /// Orders count only when at least one line item carries a UPC.
    pub fn satisfies(&self, field: Field) -> bool {
        match field {
            Field::Orders => self.orders.iter().any(LineItem::has_upc),
            other => self.is_set(other),
        }
    }

    /// Unset fields among `fields`.
    pub fn unset<'a>(&'a self, fields: impl IntoIterator<Item = &'a Field> + 'a) -> Vec<Field> {
        fields
            .into_iter()
            .copied()
            .filter(|f| !self.is_set(*f))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        Field::ALL.iter().all(|f| !self.is_set(*f))
    }

    pub fn text(&self, field: Field) -> Option<&str> {
        match field {
            Field::PoNumber => self.po_number.as_deref(),
            Field::VendorName => self.vendor_name.as_deref(),
            Field::VendorNumber => self.vendor_number.as_deref(),
            Field::ShipDate => self.ship_date.as_deref(),
            Field::PaymentTerms => self.payment_terms.as_deref(),
            _ => None,
        }
    }

    fn text_slot(&mut self, field: Field) -> Option<&mut Option<String>> {
        match field {
            Field::PoNumber => Some(&mut self.po_number),
            Field::VendorName => Some(&mut self.vendor_name),
            Field::VendorNumber => Some(&mut self.vendor_number),
            Field::ShipDate => Some(&mut self.ship_date),
            Field::PaymentTerms => Some(&mut self.payment_terms),
            _ => None,
        }
    }

    /// Set a text field unless it already has a value. Returns whether it was set.
    pub fn set_text(&mut self, field: Field, value: impl Into<String>, provenance: Provenance) -> bool {
        let value = value.into();
        let Some(slot) = self.text_slot(field) else {
            return false;
        };
        if slot.is_some() || value.trim().is_empty() {
            return false;
        }
        *slot = Some(value);
        self.provenance.insert(field, provenance);
        true
    }

    pub fn set_total_amount(&mut self, amount: BigDecimal, provenance: Provenance) -> bool {
        if self.total_amount.is_some() {
            return false;
        }
        self.total_amount = Some(amount);
        self.provenance.insert(Field::TotalAmount, provenance);
        true
    }

    /// Set the line items together with the row-level issues found while reading them.
    pub fn set_orders(
        &mut self,
        orders: Vec<LineItem>,
        issues: Vec<ValidationIssue>,
        provenance: Provenance,
    ) -> bool {
        if self.is_set(Field::Orders) || orders.is_empty() {
            return false;
        }
        self.orders = orders;
        self.order_issues = issues;
        self.provenance.insert(Field::Orders, provenance);
        true
    }

    pub fn set_size_breakdowns(
        &mut self,
        breakdowns: Vec<SizeBreakdown>,
        issues: Vec<ValidationIssue>,
        provenance: Provenance,
    ) -> bool {
        if self.is_set(Field::SizeBreakdowns) || breakdowns.is_empty() {
            return false;
        }
        self.size_breakdowns = breakdowns;
        self.size_issues = issues;
        self.provenance.insert(Field::SizeBreakdowns, provenance);
        true
    }

    /// Take every field `found` has that `self` lacks. Fields already set are
    /// never touched. Returns the fields that were filled.
    pub fn fill_from(&mut self, mut found: PartialRecord) -> Vec<Field> {
        let mut filled = Vec::new();

        for field in Field::ALL {
            if self.is_set(field) || !found.is_set(field) {
                continue;
            }
            match field {
                Field::TotalAmount => self.total_amount = found.total_amount.take(),
                Field::Orders => {
                    self.orders = std::mem::take(&mut found.orders);
                    self.order_issues = std::mem::take(&mut found.order_issues);
                }
                Field::SizeBreakdowns => {
                    self.size_breakdowns = std::mem::take(&mut found.size_breakdowns);
                    self.size_issues = std::mem::take(&mut found.size_issues);
                }
                text_field => {
                    let value = found.text_slot(text_field).and_then(Option::take);
                    if let Some(slot) = self.text_slot(text_field) {
                        *slot = value;
                    }
                }
            }
            if let Some(provenance) = found.provenance.get(&field) {
                self.provenance.insert(field, *provenance);
            }
            filled.push(field);
        }

        filled
    }
}

/// A fully merged purchase-order record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RecordData")]
pub struct DocumentRecord {
    pub summary: Summary,
    /// Line items in page/table order
    pub orders: Vec<LineItem>,
    pub size_breakdowns: Vec<SizeBreakdown>,
    pub field_provenance: BTreeMap<Field, Provenance>,
    /// QA flags, in the order they were raised
    pub qa_flags: Vec<ValidationIssue>,
    /// Minimum confidence across the required fields
    pub confidence: f32,
    #[serde(skip)]
    product_index: BTreeMap<String, usize>,
}

impl DocumentRecord {
    pub fn new(
        summary: Summary,
        orders: Vec<LineItem>,
        size_breakdowns: Vec<SizeBreakdown>,
        field_provenance: BTreeMap<Field, Provenance>,
        qa_flags: Vec<ValidationIssue>,
        confidence: f32,
    ) -> Self {
        let product_index = index_products(&orders);
        Self {
            summary,
            orders,
            size_breakdowns,
            field_provenance,
            qa_flags,
            confidence,
            product_index,
        }
    }

    /// The line item a size breakdown refers to, with its position.
    pub fn line_item_for(&self, product_id: &str) -> Option<(usize, &LineItem)> {
        let idx = *self.product_index.get(product_id.trim())?;
        self.orders.get(idx).map(|item| (idx, item))
    }

    pub fn provenance(&self, field: Field) -> Option<&Provenance> {
        self.field_provenance.get(&field)
    }

    /// Add a QA flag unless an identical one is already present.
    pub fn flag(&mut self, issue: ValidationIssue) {
        if !self.qa_flags.contains(&issue) {
            self.qa_flags.push(issue);
        }
    }

    /// Whether any flag already concerns `path`.
    pub fn is_flagged(&self, path: &str) -> bool {
        self.qa_flags.iter().any(|i| i.concerns(path))
    }

    pub fn report(&self) -> QaReport {
        QaReport::from_issues(&self.qa_flags)
    }
}

/// Map product id to the first line item carrying it.
fn index_products(orders: &[LineItem]) -> BTreeMap<String, usize> {
    let mut index = BTreeMap::new();
    for (idx, item) in orders.iter().enumerate() {
        if let Some(id) = item.product_id.as_deref() {
            index.entry(id.trim().to_string()).or_insert(idx);
        }
    }
    index
}

/// Serialized shape of [`DocumentRecord`]; the product index is rebuilt on load.
#[derive(Deserialize)]
struct RecordData {
    summary: Summary,
    orders: Vec<LineItem>,
    size_breakdowns: Vec<SizeBreakdown>,
    field_provenance: BTreeMap<Field, Provenance>,
    qa_flags: Vec<ValidationIssue>,
    confidence: f32,
}

impl From<RecordData> for DocumentRecord {
    fn from(data: RecordData) -> Self {
        DocumentRecord::new(
            data.summary,
            data.orders,
            data.size_breakdowns,
            data.field_provenance,
            data.qa_flags,
            data.confidence,
        )
    }
}

/// A record that has been through the validator.
///
/// Only shared access is offered; the record can be taken out by value for
/// hand-off but not modified in place.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValidatedRecord(DocumentRecord);

impl ValidatedRecord {
    pub(crate) fn new(record: DocumentRecord) -> Self {
        Self(record)
    }

    pub fn record(&self) -> &DocumentRecord {
        &self.0
    }

    pub fn qa_flags(&self) -> &[ValidationIssue] {
        &self.0.qa_flags
    }

    pub fn into_inner(self) -> DocumentRecord {
        self.0
    }
}

impl Deref for ValidatedRecord {
    type Target = DocumentRecord;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Tier;
    use chrono::Datelike;

    #[test]
    fn test_set_text_first_wins() {
        let mut partial = PartialRecord::new();
        assert!(partial.set_text(Field::PoNumber, "12345", Provenance::from_tier(Tier::Regex)));
        assert!(!partial.set_text(Field::PoNumber, "99999", Provenance::from_tier(Tier::Regex)));
        assert_eq!(partial.po_number.as_deref(), Some("12345"));
        assert!(!partial.set_text(Field::VendorName, "  ", Provenance::from_tier(Tier::Regex)));
        assert!(!partial.set_text(Field::Orders, "x", Provenance::from_tier(Tier::Regex)));
    }

    #[test]
    fn test_fill_from_never_overwrites() {
        let mut acc = PartialRecord::new();
        acc.set_text(Field::PoNumber, "11111", Provenance::from_tier(Tier::Position));

        let mut found = PartialRecord::new();
        found.set_text(Field::PoNumber, "22222", Provenance::from_tier(Tier::Table));
        found.set_text(Field::ShipDate, "01/02/2025", Provenance::from_tier(Tier::Table));
        found.set_orders(
            vec![LineItem::with_upc("036000291452")],
            vec![],
            Provenance::from_tier(Tier::Table),
        );

        let filled = acc.fill_from(found);
        assert_eq!(filled, vec![Field::ShipDate, Field::Orders]);
        assert_eq!(acc.po_number.as_deref(), Some("11111"));
        assert_eq!(acc.provenance[&Field::PoNumber].tier, Tier::Position);
        assert_eq!(acc.provenance[&Field::ShipDate].tier, Tier::Table);
        assert!(acc.satisfies(Field::Orders));
    }

    #[test]
    fn test_orders_without_upc_do_not_satisfy() {
        let mut partial = PartialRecord::new();
        partial.set_orders(
            vec![LineItem {
                product_id: Some("A".into()),
                ..Default::default()
            }],
            vec![],
            Provenance::from_tier(Tier::Table),
        );
        assert!(partial.is_set(Field::Orders));
        assert!(!partial.satisfies(Field::Orders));
    }

    #[test]
    fn test_ship_date_parsed() {
        let summary = Summary {
            ship_date: Some("03/15/2025".into()),
            ..Default::default()
        };
        let date = summary.ship_date_parsed().unwrap();
        assert_eq!((date.year(), date.month(), date.day()), (2025, 3, 15));

        let summary = Summary {
            ship_date: Some("2025-03-15".into()),
            ..Default::default()
        };
        assert!(summary.ship_date_parsed().is_some());

        let summary = Summary {
            ship_date: Some("ASAP".into()),
            ..Default::default()
        };
        assert!(summary.ship_date_parsed().is_none());
    }

    #[test]
    fn test_product_index_and_serde() {
        let orders = vec![
            LineItem {
                product_id: Some("A-1".into()),
                quantity: Some(10),
                ..Default::default()
            },
            LineItem {
                product_id: Some("B-2".into()),
                ..Default::default()
            },
        ];
        let record = DocumentRecord::new(
            Summary {
                po_number: "12345".into(),
                ..Default::default()
            },
            orders,
            vec![SizeBreakdown::new("B-2").with_size("S", 1)],
            BTreeMap::new(),
            vec![],
            0.9,
        );
        assert_eq!(record.line_item_for("B-2").map(|(i, _)| i), Some(1));
        assert!(record.line_item_for("C-3").is_none());

        let json = serde_json::to_string(&record).unwrap();
        let back: DocumentRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
        assert_eq!(back.line_item_for("A-1").map(|(i, _)| i), Some(0));
    }

    #[test]
    fn test_flag_dedupes() {
        let mut record = DocumentRecord::new(
            Summary::default(),
            vec![],
            vec![],
            BTreeMap::new(),
            vec![],
            1.0,
        );
        record.flag(ValidationIssue::missing_field("summary.ship_date", "not found"));
        record.flag(ValidationIssue::missing_field("summary.ship_date", "not found"));
        assert_eq!(record.qa_flags.len(), 1);
        assert!(record.is_flagged("summary.ship_date"));
    }
}
