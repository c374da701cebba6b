//! JSON rendering of extracted records.

use serde::Serialize;

use crate::model::{DocumentRecord, QaReport};

use super::size_sheet::SizeSheet;

/// JSON output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonFormat {
    /// Pretty-printed JSON with indentation
    #[default]
    Pretty,
    /// Compact JSON without extra whitespace
    Compact,
}

/// Serialize a record as handed to the spreadsheet writer.
pub fn to_json(record: &DocumentRecord, format: JsonFormat) -> serde_json::Result<String> {
    write(record, format)
}

/// Record plus its derived views, for writers that do not rebuild them.
#[derive(Debug, Serialize)]
struct Bundle<'a> {
    #[serde(flatten)]
    record: &'a DocumentRecord,
    report: QaReport,
    size_sheet: &'a SizeSheet,
}

/// Serialize a record together with its QA report and size sheet.
pub fn to_json_bundle(
    record: &DocumentRecord,
    size_sheet: &SizeSheet,
    format: JsonFormat,
) -> serde_json::Result<String> {
    let bundle = Bundle {
        record,
        report: record.report(),
        size_sheet,
    };
    write(&bundle, format)
}

fn write<T: Serialize + ?Sized>(value: &T, format: JsonFormat) -> serde_json::Result<String> {
    match format {
        JsonFormat::Pretty => serde_json::to_string_pretty(value),
        JsonFormat::Compact => serde_json::to_string(value),
    }
}
