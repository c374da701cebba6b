//! Plain-text QA report.

use std::fmt::Write;

use crate::model::{DocumentRecord, Field, Severity};

/// Render a human-readable review report for a record.
pub fn to_report(record: &DocumentRecord) -> String {
    let mut out = String::new();
    let summary = &record.summary;
    let report = record.report();

    let source = summary.source_filename.as_deref().unwrap_or("<bytes>");
    let _ = writeln!(
        out,
        "PO {} ({}, {} page{})",
        summary.po_number,
        source,
        summary.page_count,
        if summary.page_count == 1 { "" } else { "s" }
    );
    if let Some(vendor) = summary.vendor_name.as_deref() {
        let _ = writeln!(out, "Vendor: {}", vendor);
    }
    let _ = writeln!(
        out,
        "Line items: {}, size rows: {}",
        record.orders.len(),
        record.size_breakdowns.len()
    );
    let _ = writeln!(out, "Confidence: {:.2}", record.confidence);

    let status = if report.ok { "OK" } else { "NEEDS REVIEW" };
    let _ = writeln!(
        out,
        "Status: {} ({} errors, {} warnings)",
        status, report.errors, report.warnings
    );
    for line in &report.summary {
        let _ = writeln!(out, "  - {}", line);
    }

    let provenance: Vec<String> = Field::ALL
        .iter()
        .filter_map(|f| {
            record
                .provenance(*f)
                .map(|p| format!("{} {} {:.2}", f, p.tier, p.confidence))
        })
        .collect();
    if !provenance.is_empty() {
        out.push_str("\nSources:\n");
        for line in provenance {
            let _ = writeln!(out, "  {}", line);
        }
    }

    if !record.qa_flags.is_empty() {
        out.push_str("\nIssues:\n");
        // Errors first, each group in the order raised
        for severity in [Severity::Error, Severity::Warning] {
            for issue in record.qa_flags.iter().filter(|i| i.severity == severity) {
                let _ = writeln!(out, "  {}", issue);
            }
        }
    }

    out
}
