//! End-to-end extraction over synthetic page primitives.

use poextract::extract::{PositionExtractor, RegexExtractor, TableExtractor};
use poextract::{
    extract_pages, Coordinator, Error, ExtractOptions, Extractor, Field, IssueKind, PagePrimitive,
    PageTable, PartialRecord, Tier, ValidatedRecord, WordToken,
};

/// A line of words at `top`, each given with its left edge.
fn line(top: f32, words: &[(f32, &str)]) -> Vec<WordToken> {
    words
        .iter()
        .map(|(x0, text)| {
            let width = text.chars().count() as f32 * 5.0;
            WordToken::new(*text, *x0, top, x0 + width, top + 10.0)
        })
        .collect()
}

/// A page laid out with labels and an item grid, readable by the position tier.
fn positioned_page() -> PagePrimitive {
    let mut words = Vec::new();
    words.extend(line(40.0, &[(40.0, "PO"), (55.0, "Number:"), (100.0, "4500123")]));
    words.extend(line(40.0, &[(300.0, "Ship"), (322.0, "Date:"), (352.0, "03/15/2025")]));
    words.extend(line(
        120.0,
        &[
            (30.0, "Qty"),
            (70.0, "SKU"),
            (150.0, "UPC"),
            (280.0, "Description"),
            (450.0, "Rate"),
            (520.0, "Amount"),
        ],
    ));
    words.extend(line(
        140.0,
        &[
            (30.0, "10"),
            (70.0, "ABC-100"),
            (130.0, "036000291452"),
            (225.0, "Ruffle"),
            (258.0, "Shorts"),
            (445.0, "2.50"),
            (515.0, "25.00"),
        ],
    ));
    PagePrimitive::new(0).with_words(words)
}

fn orders_table(rows: &[[&str; 6]]) -> PageTable {
    let header = ["Qty", "Item SKU", "UPC", "Description", "Unit Price", "Amount"];
    PageTable::from_strings(std::iter::once(header).chain(rows.iter().copied()))
}

fn extract(pages: &[PagePrimitive]) -> poextract::Result<ValidatedRecord> {
    extract_pages(pages, ExtractOptions::default())
}

fn issues_of(record: &ValidatedRecord, kind: IssueKind) -> Vec<String> {
    record
        .qa_flags()
        .iter()
        .filter(|i| i.kind == kind)
        .map(|i| i.path.clone())
        .collect()
}

#[test]
fn test_later_tiers_never_overwrite() {
    let page = positioned_page()
        .with_table(orders_table(&[[
            "3", "ZZZ-999", "012345678905", "Other Item", "1.00", "3.00",
        ]]))
        .with_table(PageTable::from_strings([["Style", "S", "M", "L"], ["ABC-100", "2", "3", "5"]]))
        .with_text("PO 99999\nShip Date: 01/01/2030");
    let pages = [page];

    let options = ExtractOptions::default();
    let position = PositionExtractor::new(&options).extract(&pages, &PartialRecord::new());
    assert_eq!(position.po_number.as_deref(), Some("4500123"));

    let merged = Coordinator::new(options.clone()).merge(&pages);
    for field in Field::ALL {
        if position.is_set(field) && field.is_summary() {
            assert_eq!(merged.text(field), position.text(field), "{} changed", field);
            assert_eq!(merged.provenance[&field].tier, Tier::Position);
        }
    }
    assert_eq!(merged.orders, position.orders);

    // Table tier still supplies what position could not
    assert_eq!(merged.provenance[&Field::SizeBreakdowns].tier, Tier::Table);

    // Feeding a later tier the merged state leaves every set field alone
    for tier in [
        &TableExtractor::new(&options) as &dyn Extractor,
        &RegexExtractor::new(&options),
    ] {
        let mut again = merged.clone();
        let filled = again.fill_from(tier.extract(&pages, &merged));
        assert!(filled.is_empty(), "{} filled {:?}", tier.tier(), filled);
        assert_eq!(again, merged);
    }
}

#[test]
fn test_idempotent() {
    let page = positioned_page()
        .with_table(PageTable::from_strings([["Style", "S", "M", "L"], ["ABC-100", "2", "3", "5"]]))
        .with_text("Vendor: Acme Kids\nTotal $25.00");
    let pages = [page];

    let first = extract(&pages).unwrap();
    let second = extract(&pages).unwrap();
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn test_checksum_property() {
    let page = PagePrimitive::new(0)
        .with_table(orders_table(&[
            ["10", "ABC-100", "036000291452", "Ruffle Shorts", "2.50", "25.00"],
            ["10", "ABC-101", "036000291453", "Ruffle Shorts", "2.50", "25.00"],
        ]))
        .with_text("PO 4500123");
    let record = extract(&[page]).unwrap();

    assert_eq!(issues_of(&record, IssueKind::ChecksumFailed), vec!["orders[1].upc"]);
}

#[test]
fn test_arithmetic_property() {
    let page = PagePrimitive::new(0)
        .with_table(orders_table(&[
            ["10", "ABC-100", "036000291452", "Ruffle Shorts", "2.50", "25.00"],
            ["10", "ABC-200", "012345678905", "Kids Tee", "2.50", "24.00"],
        ]))
        .with_text("PO 4500123");
    let record = extract(&[page]).unwrap();

    assert_eq!(
        issues_of(&record, IssueKind::ArithmeticMismatch),
        vec!["orders[1].line_total"]
    );
}

#[test]
fn test_regex_fallback_completes_record() {
    let page = PagePrimitive::new(0).with_text(
        "ACME KIDS WHOLESALE\nPurchase Order 4500123\nPlease ship item 036000291452 promptly.",
    );
    let record = extract(&[page]).unwrap();

    assert_eq!(record.summary.po_number, "4500123");
    assert_eq!(record.orders.len(), 1);
    assert_eq!(record.orders[0].upc.as_deref(), Some("036000291452"));

    for field in [Field::PoNumber, Field::Orders] {
        let provenance = record.provenance(field).unwrap();
        assert_eq!(provenance.tier, Tier::Regex);
        assert!(provenance.confidence < 0.5);
    }
    assert!(record.confidence < 0.5);
    let low = issues_of(&record, IssueKind::LowConfidence);
    assert!(low.contains(&"summary.po_number".to_string()));
    assert!(low.contains(&"orders".to_string()));
}

#[test]
fn test_missing_po_number_is_fatal() {
    let page = PagePrimitive::new(0)
        .with_table(orders_table(&[[
            "10", "ABC-100", "036000291452", "Ruffle Shorts", "2.50", "25.00",
        ]]))
        .with_text("Thank you for your business");

    let err = extract(&[page]).unwrap_err();
    assert!(!err.is_unreadable());
    match &err {
        Error::ExtractionIncomplete { missing } => assert!(missing.contains(&Field::PoNumber)),
        other => panic!("unexpected error: {}", other),
    }
    assert!(err.to_string().contains("PO number"));
}

#[test]
fn test_size_sum_property() {
    let run = |medium: &str| {
        let page = PagePrimitive::new(0)
            .with_table(orders_table(&[[
                "10", "ABC-100", "036000291452", "Ruffle Shorts", "2.50", "25.00",
            ]]))
            .with_table(PageTable::from_strings([
                ["Style", "S", "M", "L"],
                ["ABC-100", "2", medium, "5"],
            ]))
            .with_text("PO 4500123");
        extract(&[page]).unwrap()
    };

    let balanced = run("3");
    assert_eq!(balanced.size_breakdowns[0].total(), 10);
    assert!(issues_of(&balanced, IssueKind::ArithmeticMismatch).is_empty());

    let short = run("2");
    assert_eq!(
        issues_of(&short, IssueKind::ArithmeticMismatch),
        vec!["size_breakdowns[0]"]
    );
}

#[test]
fn test_documents_share_no_state() {
    let coordinator = Coordinator::default();
    let a = [positioned_page()];
    let b = [PagePrimitive::new(0).with_text("PO 7777777 UPC 012345678905")];

    let (ra, rb) = std::thread::scope(|s| {
        let ha = s.spawn(|| coordinator.extract_pages(&a, Some("a.pdf")));
        let hb = s.spawn(|| coordinator.extract_pages(&b, Some("b.pdf")));
        (ha.join().unwrap().unwrap(), hb.join().unwrap().unwrap())
    });

    assert_eq!(ra.summary.po_number, "4500123");
    assert_eq!(rb.summary.po_number, "7777777");
    assert_eq!(ra, coordinator.extract_pages(&a, Some("a.pdf")).unwrap());
}
