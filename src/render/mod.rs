//! Output views of a validated record: JSON, a QA report and the size sheet.
//!
//! Spreadsheet layout and styling belong to the writer consuming these.

mod json;
mod report;
mod size_sheet;

pub use json::{to_json, to_json_bundle, JsonFormat};
pub use report::to_report;
pub use size_sheet::{SizeSheet, SizeSheetRow};
