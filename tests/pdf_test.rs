//! Extraction from small PDFs built in-process.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use tempfile::TempDir;

use poextract::{
    extract_bytes, extract_file, extract_many, Error, ExtractOptions, PdfParser, PoExtract,
    Tier, UnreadableReason,
};

/// Build a one-font PDF; each page is a list of `(x, y, text)` lines.
fn build_pdf(pages: &[Vec<(f32, f32, &str)>]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids = Vec::new();
    for lines in pages {
        let mut operations = Vec::new();
        for (x, y, text) in lines {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tf", vec!["F1".into(), 10.into()]));
            operations.push(Operation::new("Td", vec![(*x).into(), (*y).into()]));
            operations.push(Operation::new("Tj", vec![Object::string_literal(*text)]));
            operations.push(Operation::new("ET", vec![]));
        }
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        kids.push(Object::from(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

fn purchase_order() -> Vec<u8> {
    build_pdf(&[
        vec![
            (50.0, 740.0, "PO # 4500123"),
            (50.0, 700.0, "Vendor: Acme Kids Inc"),
            (
                50.0,
                600.0,
                "10 ABC-0612M 036000291452 Acme Ruffle Shorts 2.50 25.00",
            ),
        ],
        vec![(50.0, 700.0, "Total $25.00")],
    ])
}

#[test]
fn test_pages_decode() {
    let parser = PdfParser::from_bytes(&purchase_order()).unwrap();
    assert_eq!(parser.page_count(), 2);

    let pages = parser.pages().unwrap();
    assert_eq!(pages.len(), 2);
    assert!(pages[0].text.contains("4500123"));
    assert!(pages[0].words.iter().any(|w| w.text == "036000291452"));
    // Top-left origin: the PO line sits above the item line
    let po = pages[0].words.iter().find(|w| w.text == "4500123").unwrap();
    let upc = pages[0].words.iter().find(|w| w.text == "036000291452").unwrap();
    assert!(po.bbox.top < upc.bbox.top);
}

#[test]
fn test_extract_bytes() {
    let record = extract_bytes(&purchase_order()).unwrap();

    assert_eq!(record.summary.po_number, "4500123");
    assert_eq!(record.summary.page_count, 2);
    assert_eq!(record.orders.len(), 1);

    let item = &record.orders[0];
    assert_eq!(item.upc.as_deref(), Some("036000291452"));
    assert_eq!(item.quantity, Some(10));
    assert_eq!(item.size.as_deref(), Some("6-12m"));
    assert!(record
        .provenance(poextract::Field::Orders)
        .is_some_and(|p| p.tier == Tier::Regex));
    assert!(record.report().ok);
}

#[test]
fn test_extract_file_records_name() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("po-4500123.pdf");
    std::fs::write(&path, purchase_order()).unwrap();

    let record = extract_file(&path).unwrap();
    assert_eq!(record.summary.source_filename.as_deref(), Some("po-4500123.pdf"));

    let result = PoExtract::new().lenient().extract_file(&path).unwrap();
    assert_eq!(result.record().summary.po_number, "4500123");
    assert!(result.to_report().starts_with("PO 4500123"));
    assert!(!result.size_sheet().is_empty());
}

#[test]
fn test_extract_many() {
    let dir = TempDir::new().unwrap();
    let good = dir.path().join("good.pdf");
    let blank = dir.path().join("blank.pdf");
    std::fs::write(&good, purchase_order()).unwrap();
    std::fs::write(&blank, build_pdf(&[vec![(50.0, 700.0, "Nothing to see")]])).unwrap();

    let results = extract_many(&[&good, &blank], &ExtractOptions::default());
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].as_ref().unwrap().summary.po_number, "4500123");
    assert!(matches!(
        results[1],
        Err(Error::ExtractionIncomplete { .. })
    ));
}

#[test]
fn test_no_pages_is_unreadable() {
    let bytes = build_pdf(&[]);
    assert!(matches!(
        extract_bytes(&bytes),
        Err(Error::UnreadablePdf(UnreadableReason::EmptyDocument))
    ));
}

#[test]
fn test_not_a_pdf() {
    assert!(matches!(
        extract_bytes(b"PK\x03\x04 this is a zip"),
        Err(Error::UnreadablePdf(UnreadableReason::NotPdf))
    ));
}

#[cfg(feature = "async")]
#[tokio::test]
async fn test_extract_file_async() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("po.pdf");
    std::fs::write(&path, purchase_order()).unwrap();

    let record = poextract::extract_file_async(&path, ExtractOptions::default())
        .await
        .unwrap();
    assert_eq!(record.summary.po_number, "4500123");
}
