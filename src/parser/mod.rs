//! Page primitive adapter: PDF bytes in, positioned words, tables and text out.

mod backend;
mod layout;
mod options;
mod pdf_parser;
mod table_detector;

pub use backend::PageSource;
pub use layout::{spans_to_words, LayoutAnalyzer, TextSpan};
pub use options::{ErrorMode, ParseOptions};
pub use pdf_parser::PdfParser;
pub use table_detector::{TableDetector, TableDetectorConfig, TableRowData};
