//! Record validation.
//!
//! Checks run over a merged [`DocumentRecord`] and only ever add QA flags.
//! No value is corrected or removed, and no check can fail the document.

mod upc;

pub use upc::{check as check_upc, check_digit, UpcCheck};

use bigdecimal::BigDecimal;

use crate::extract::{ExtractOptions, UpcScheme};
use crate::model::{
    round_money, DocumentRecord, Field, LineItem, Tier, ValidatedRecord, ValidationIssue,
};

/// Runs checksum, arithmetic, completeness and confidence checks.
#[derive(Debug, Clone, PartialEq)]
pub struct Validator {
    confidence_threshold: f32,
    tolerance: BigDecimal,
    upc_scheme: UpcScheme,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(&ExtractOptions::default())
    }
}

impl Validator {
    pub fn new(options: &ExtractOptions) -> Self {
        Self {
            confidence_threshold: options.confidence_threshold,
            tolerance: BigDecimal::from(options.tolerance_cents) / BigDecimal::from(100),
            upc_scheme: options.upc_scheme,
        }
    }

    /// Annotate `record` with every finding and seal it.
    pub fn validate(&self, mut record: DocumentRecord) -> ValidatedRecord {
        let before = record.qa_flags.len();

        self.check_upcs(&mut record);
        self.check_line_totals(&mut record);
        self.check_size_sums(&mut record);
        self.check_grand_total(&mut record);
        self.check_completeness(&mut record);
        self.check_confidence(&mut record);

        log::debug!(
            "validator added {} flags to PO {}",
            record.qa_flags.len() - before,
            record.summary.po_number
        );
        ValidatedRecord::new(record)
    }

    fn check_upcs(&self, record: &mut DocumentRecord) {
        let mut issues = Vec::new();
        for (i, item) in record.orders.iter().enumerate() {
            let Some(upc) = item.upc.as_deref() else {
                continue;
            };
            let detail = match check_upc(upc, self.upc_scheme) {
                UpcCheck::Valid => continue,
                UpcCheck::BadLength(len) => format!("UPC {} has {} digits", upc, len),
                UpcCheck::NotNumeric => format!("UPC {} is not numeric", upc),
                UpcCheck::Mismatch { expected, found } => format!(
                    "UPC {} check digit is {}, expected {}",
                    upc, found, expected
                ),
            };
            issues.push(ValidationIssue::checksum_failed(format!("orders[{}].upc", i), detail));
        }
        flag_all(record, issues);
    }

    fn check_line_totals(&self, record: &mut DocumentRecord) {
        let mut issues = Vec::new();
        for (i, item) in record.orders.iter().enumerate() {
            let (Some(expected), Some(total)) = (item.expected_total(), item.line_total.as_ref())
            else {
                continue;
            };
            if !self.within_tolerance(&expected, &round_money(total)) {
                issues.push(ValidationIssue::arithmetic_mismatch(
                    format!("orders[{}].line_total", i),
                    format!(
                        "{} x {} = {}, but the line total is {}",
                        item.quantity.unwrap_or_default(),
                        item.unit_price.as_ref().map(round_money).unwrap_or_default(),
                        expected,
                        round_money(total)
                    ),
                ));
            }
        }
        flag_all(record, issues);
    }

    fn check_size_sums(&self, record: &mut DocumentRecord) {
        let mut issues = Vec::new();
        for (i, breakdown) in record.size_breakdowns.iter().enumerate() {
            let path = format!("size_breakdowns[{}]", i);
            match record.line_item_for(&breakdown.product_id) {
                None => issues.push(ValidationIssue::missing_field(
                    path,
                    format!("no line item with product id {}", breakdown.product_id),
                )),
                Some((idx, LineItem { quantity: Some(qty), .. })) => {
                    let sum = breakdown.total();
                    if sum != u64::from(*qty) {
                        issues.push(ValidationIssue::arithmetic_mismatch(
                            path,
                            format!(
                                "sizes sum to {}, but orders[{}] has quantity {}",
                                sum, idx, qty
                            ),
                        ));
                    }
                }
                // No parent quantity to compare against; flagged on the line item
                Some(_) => {}
            }
        }
        flag_all(record, issues);
    }

    /// Sum of line totals against the stated order total, when every line
    /// has a readable total.
    fn check_grand_total(&self, record: &mut DocumentRecord) {
        let Some(stated) = record.summary.total_amount.as_ref() else {
            return;
        };
        if record.orders.is_empty() {
            return;
        }
        let totals: Option<Vec<&BigDecimal>> =
            record.orders.iter().map(|i| i.line_total.as_ref()).collect();
        let Some(totals) = totals else {
            return;
        };

        let sum = round_money(&totals.into_iter().sum::<BigDecimal>());
        let stated = round_money(stated);
        if !self.within_tolerance(&sum, &stated) {
            let issue = ValidationIssue::arithmetic_mismatch(
                Field::TotalAmount.path(),
                format!("line totals sum to {}, but the order total is {}", sum, stated),
            );
            record.flag(issue);
        }
    }

    /// Missing optional header fields and incomplete line items.
    fn check_completeness(&self, record: &mut DocumentRecord) {
        let mut issues = Vec::new();

        let summary = &record.summary;
        let header = [
            (Field::VendorName, summary.vendor_name.is_some()),
            (Field::VendorNumber, summary.vendor_number.is_some()),
            (Field::ShipDate, summary.ship_date.is_some()),
            (Field::PaymentTerms, summary.payment_terms.is_some()),
            (Field::TotalAmount, summary.total_amount.is_some()),
        ];
        for (field, present) in header {
            if !present {
                issues.push(ValidationIssue::missing_field(
                    field.path(),
                    format!("{} not found", field),
                ));
            }
        }

        for (i, item) in record.orders.iter().enumerate() {
            match item.quantity {
                None => issues.push(missing(i, "quantity", "no quantity")),
                Some(0) => issues.push(missing(i, "quantity", "quantity is zero")),
                Some(_) => {}
            }
            if !item.has_upc() {
                issues.push(missing(i, "upc", "no UPC"));
            }
            if item.unit_price.is_none() {
                issues.push(missing(i, "unit_price", "no unit price"));
            }
            if item.line_total.is_none() {
                issues.push(missing(i, "line_total", "no line total"));
            }
        }

        for issue in issues {
            if !record.is_flagged(&issue.path) {
                record.flag(issue);
            }
        }
    }

    /// Regex-tier values are always flagged, whatever the configured threshold.
    fn check_confidence(&self, record: &mut DocumentRecord) {
        let issues: Vec<ValidationIssue> = record
            .field_provenance
            .iter()
            .filter(|(_, p)| p.tier == Tier::Regex || p.confidence < self.confidence_threshold)
            .map(|(field, p)| {
                ValidationIssue::low_confidence(
                    field.path(),
                    format!("{} found by {} tier at confidence {:.2}", field, p.tier, p.confidence),
                )
            })
            .collect();
        flag_all(record, issues);
    }

    fn within_tolerance(&self, a: &BigDecimal, b: &BigDecimal) -> bool {
        (a - b).abs() <= self.tolerance
    }
}

fn missing(index: usize, attr: &str, detail: &str) -> ValidationIssue {
    ValidationIssue::missing_field(format!("orders[{}].{}", index, attr), detail)
}

fn flag_all(record: &mut DocumentRecord, issues: Vec<ValidationIssue>) {
    for issue in issues {
        record.flag(issue);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{IssueKind, Provenance, SizeBreakdown, Summary, Tier};
    use std::collections::BTreeMap;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn item(upc: &str, qty: u32, price: &str, total: &str) -> LineItem {
        LineItem {
            product_id: Some("ABC-100".into()),
            upc: Some(upc.into()),
            quantity: Some(qty),
            unit_price: Some(dec(price)),
            line_total: Some(dec(total)),
            ..Default::default()
        }
    }

    fn record(orders: Vec<LineItem>, sizes: Vec<SizeBreakdown>) -> DocumentRecord {
        let summary = Summary {
            po_number: "4500123".into(),
            vendor_name: Some("Acme".into()),
            vendor_number: Some("77".into()),
            ship_date: Some("03/15/2025".into()),
            payment_terms: Some("Net 30".into()),
            ..Default::default()
        };
        DocumentRecord::new(summary, orders, sizes, BTreeMap::new(), vec![], 0.9)
    }

    fn kinds(record: &ValidatedRecord, kind: IssueKind) -> Vec<&str> {
        record
            .qa_flags()
            .iter()
            .filter(|i| i.kind == kind)
            .map(|i| i.path.as_str())
            .collect()
    }

    #[test]
    fn test_checksum() {
        let validated = Validator::default().validate(record(
            vec![
                item("036000291452", 10, "2.50", "25.00"),
                item("036000291453", 10, "2.50", "25.00"),
            ],
            vec![],
        ));
        assert_eq!(kinds(&validated, IssueKind::ChecksumFailed), vec!["orders[1].upc"]);
    }

    #[test]
    fn test_line_arithmetic() {
        let validated = Validator::default().validate(record(
            vec![
                item("036000291452", 10, "2.50", "25.00"),
                item("036000291452", 10, "2.50", "24.00"),
            ],
            vec![],
        ));
        assert_eq!(
            kinds(&validated, IssueKind::ArithmeticMismatch),
            vec!["orders[1].line_total"]
        );
    }

    #[test]
    fn test_tolerance_cents() {
        let options = ExtractOptions::new().with_tolerance_cents(1);
        let validated = Validator::new(&options)
            .validate(record(vec![item("036000291452", 3, "0.33", "1.00")], vec![]));
        assert!(kinds(&validated, IssueKind::ArithmeticMismatch).is_empty());
    }

    #[test]
    fn test_size_sums() {
        let sizes = |m| {
            SizeBreakdown::new("ABC-100")
                .with_size("S", 2)
                .with_size("M", m)
                .with_size("L", 5)
        };
        let ok = Validator::default()
            .validate(record(vec![item("036000291452", 10, "2.50", "25.00")], vec![sizes(3)]));
        assert!(kinds(&ok, IssueKind::ArithmeticMismatch).is_empty());

        let bad = Validator::default()
            .validate(record(vec![item("036000291452", 10, "2.50", "25.00")], vec![sizes(2)]));
        assert_eq!(
            kinds(&bad, IssueKind::ArithmeticMismatch),
            vec!["size_breakdowns[0]"]
        );

        let orphan = Validator::default().validate(record(
            vec![item("036000291452", 10, "2.50", "25.00")],
            vec![SizeBreakdown::new("ZZZ").with_size("S", 1)],
        ));
        assert!(kinds(&orphan, IssueKind::MissingField).contains(&"size_breakdowns[0]"));
    }

    #[test]
    fn test_grand_total() {
        let mut rec = record(
            vec![
                item("036000291452", 10, "2.50", "25.00"),
                item("012345678905", 4, "3.00", "12.00"),
            ],
            vec![],
        );
        rec.summary.total_amount = Some(dec("40.00"));
        let validated = Validator::default().validate(rec);
        assert_eq!(
            kinds(&validated, IssueKind::ArithmeticMismatch),
            vec!["summary.total_amount"]
        );
    }

    #[test]
    fn test_completeness_not_duplicated() {
        let mut rec = record(
            vec![LineItem {
                upc: Some("036000291452".into()),
                quantity: Some(0),
                ..Default::default()
            }],
            vec![],
        );
        rec.qa_flags
            .push(ValidationIssue::missing_field("orders[0].unit_price", "unreadable amount"));
        let validated = Validator::default().validate(rec);

        let missing = kinds(&validated, IssueKind::MissingField);
        assert_eq!(
            missing,
            vec![
                "orders[0].unit_price",
                "summary.total_amount",
                "orders[0].quantity",
                "orders[0].line_total",
            ]
        );
    }

    #[test]
    fn test_low_confidence() {
        let mut provenance = BTreeMap::new();
        provenance.insert(Field::PoNumber, Provenance::from_tier(Tier::Regex));
        provenance.insert(Field::Orders, Provenance::from_tier(Tier::Table));
        let rec = DocumentRecord::new(
            Summary {
                po_number: "4500123".into(),
                ..Default::default()
            },
            vec![],
            vec![],
            provenance,
            vec![],
            0.4,
        );
        let validated = Validator::default().validate(rec);
        assert_eq!(
            kinds(&validated, IssueKind::LowConfidence),
            vec!["summary.po_number"]
        );
    }

    #[test]
    fn test_regex_values_flagged_under_any_threshold() {
        let mut provenance = BTreeMap::new();
        provenance.insert(Field::PoNumber, Provenance::from_tier(Tier::Regex));
        provenance.insert(Field::Orders, Provenance::new(Tier::Table, 0.3));
        let rec = DocumentRecord::new(
            Summary {
                po_number: "4500123".into(),
                ..Default::default()
            },
            vec![],
            vec![],
            provenance,
            vec![],
            0.3,
        );
        let options = ExtractOptions::new().with_confidence_threshold(0.1);
        let validated = Validator::new(&options).validate(rec);
        assert_eq!(
            kinds(&validated, IssueKind::LowConfidence),
            vec!["summary.po_number"]
        );
    }
}
