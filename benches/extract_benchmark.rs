//! Benchmarks for purchase-order extraction.
//!
//! Run with: cargo bench
//!
//! Pages are built in memory so the numbers cover the tiers and the
//! validator, not PDF decoding.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use poextract::{Coordinator, PagePrimitive, PageTable, WordToken};

/// A line item table with `rows` rows plus a size grid for every style.
fn create_test_pages(page_count: usize, rows: usize) -> Vec<PagePrimitive> {
    (0..page_count)
        .map(|index| {
            let mut orders = vec![vec![
                "Qty".to_string(),
                "Item SKU".to_string(),
                "UPC".to_string(),
                "Description".to_string(),
                "Unit Price".to_string(),
                "Amount".to_string(),
            ]];
            let mut sizes = vec![vec!["Style", "S", "M", "L"]
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>()];
            for row in 0..rows {
                let style = format!("ST-{}{:03}", index, row);
                orders.push(vec![
                    "10".to_string(),
                    style.clone(),
                    "036000291452".to_string(),
                    format!("Kids Tee {}", row),
                    "2.50".to_string(),
                    "25.00".to_string(),
                ]);
                sizes.push(vec![style, "2".into(), "3".into(), "5".into()]);
            }

            let words = vec![
                WordToken::new("PO", 40.0, 40.0, 50.0, 50.0),
                WordToken::new("Number:", 55.0, 40.0, 90.0, 50.0),
                WordToken::new("4500123", 100.0, 40.0, 135.0, 50.0),
            ];

            PagePrimitive::new(index)
                .with_words(words)
                .with_table(PageTable::from_strings(orders))
                .with_table(PageTable::from_strings(sizes))
                .with_text("Vendor: Acme Kids\nPayment Terms: Net 30")
        })
        .collect()
}

/// Benchmark the full tier cascade plus validation.
fn bench_extract_pages(c: &mut Criterion) {
    let coordinator = Coordinator::default();
    let mut group = c.benchmark_group("extract_pages");

    for (page_count, rows) in [(1, 10), (5, 20), (10, 50)] {
        let pages = create_test_pages(page_count, rows);

        group.bench_function(format!("{}_pages_{}_rows", page_count, rows), |b| {
            b.iter(|| coordinator.extract_pages(black_box(&pages), None));
        });
    }

    group.finish();
}

/// Benchmark merging alone, without validation.
fn bench_merge(c: &mut Criterion) {
    let coordinator = Coordinator::default();
    let pages = create_test_pages(5, 20);

    c.bench_function("merge_5_pages", |b| {
        b.iter(|| coordinator.merge(black_box(&pages)));
    });
}

/// Benchmark the UPC check digit.
fn bench_upc_check(c: &mut Criterion) {
    c.bench_function("upc_check_digit", |b| {
        b.iter(|| poextract::validate::check_upc(black_box("036000291452"), poextract::UpcScheme::UpcA));
    });
}

criterion_group!(benches, bench_extract_pages, bench_merge, bench_upc_check);
criterion_main!(benches);
