//! # poextract
//!
//! Purchase-order extraction and validation for vendor PDF documents.
//!
//! Vendor POs do not share a layout: some print header fields next to labels,
//! some expose real tables, some are little more than loose text. poextract
//! decodes each page into positioned words, detected tables and raw text, then
//! runs three extraction tiers in a fixed order:
//!
//! 1. **Position**: labels and column headers located by geometry
//! 2. **Table**: detected tables classified as order or size tables
//! 3. **Regex**: patterns over the raw text, as a last resort
//!
//! A later tier only fills fields the earlier ones left unset. The merged
//! record is then validated (UPC check digits, line and grand-total
//! arithmetic, size sums, completeness, confidence) and every finding is
//! attached as a QA flag rather than treated as an error.
//!
//! ## Quick Start
//!
//! ```no_run
//! use poextract::{extract_file, render};
//!
//! fn main() -> poextract::Result<()> {
//!     let record = extract_file("po.pdf")?;
//!
//!     println!("PO {}: {} line items", record.summary.po_number, record.orders.len());
//!     println!("{}", render::to_report(&record));
//!     Ok(())
//! }
//! ```
//!
//! ## Errors
//!
//! Only two failures reach the caller: [`Error::UnreadablePdf`] when the input
//! cannot be decoded, and [`Error::ExtractionIncomplete`] when a required
//! field (by default the PO number and at least one line item with a UPC) is
//! missing after every tier ran.
//!
//! ## Features
//!
//! - **Layered extraction** with per-field provenance and confidence
//! - **Configurable** synonyms, size vocabulary, tolerances and UPC scheme
//! - **Exact money arithmetic** via `BigDecimal`
//! - **Parallel batches** with Rayon, one pipeline per document
//! - **Async file input** behind the `async` feature

pub mod detect;
pub mod error;
pub mod extract;
pub mod model;
pub mod parser;
pub mod render;
pub mod validate;

// Re-export commonly used types
pub use detect::{detect_format_from_bytes, detect_format_from_path, is_pdf, PdfFormat};
pub use error::{Error, Result, UnreadableReason};
pub use extract::{
    Coordinator, ExtractOptions, Extractor, LayoutTolerances, SizeVocabulary, Stage,
    SynonymTable, UpcScheme,
};
pub use model::{
    DocumentRecord, Field, IssueKind, LineItem, PagePrimitive, PageTable, PartialRecord,
    Provenance, QaReport, Severity, SizeBreakdown, Summary, Tier, ValidatedRecord,
    ValidationIssue, WordToken,
};
pub use parser::{PageSource, ParseOptions, PdfParser};
pub use render::{JsonFormat, SizeSheet};
pub use validate::{UpcCheck, Validator};

use rayon::prelude::*;
use std::io::Read;
use std::path::Path;

/// Extract a purchase order from a PDF file with default options.
///
/// The file name is recorded as the record's source filename.
///
/// # Example
///
/// ```no_run
/// use poextract::extract_file;
///
/// let record = extract_file("po.pdf").unwrap();
/// println!("{} flags", record.qa_flags().len());
/// ```
pub fn extract_file<P: AsRef<Path>>(path: P) -> Result<ValidatedRecord> {
    extract_file_with_options(path, ExtractOptions::default())
}

/// Extract a purchase order from a PDF file with custom options.
///
/// # Example
///
/// ```no_run
/// use poextract::{extract_file_with_options, ExtractOptions, UpcScheme};
///
/// let options = ExtractOptions::new()
///     .with_upc_scheme(UpcScheme::Gtin)
///     .with_tolerance_cents(1)
///     .lenient();
/// let record = extract_file_with_options("po.pdf", options).unwrap();
/// ```
pub fn extract_file_with_options<P: AsRef<Path>>(
    path: P,
    options: ExtractOptions,
) -> Result<ValidatedRecord> {
    let path = path.as_ref();
    let parser = PdfParser::open_with_options(path, options.parse_options())?;
    Coordinator::new(options).extract(&parser, source_name(path).as_deref())
}

/// Extract a purchase order from PDF bytes.
pub fn extract_bytes(data: &[u8]) -> Result<ValidatedRecord> {
    extract_bytes_with_options(data, ExtractOptions::default())
}

/// Extract a purchase order from PDF bytes with custom options.
pub fn extract_bytes_with_options(data: &[u8], options: ExtractOptions) -> Result<ValidatedRecord> {
    let parser = PdfParser::from_bytes_with_options(data, options.parse_options())?;
    Coordinator::new(options).extract(&parser, None)
}

/// Extract a purchase order from a reader.
///
/// # Example
///
/// ```no_run
/// use poextract::extract_reader;
/// use std::fs::File;
///
/// let file = File::open("po.pdf").unwrap();
/// let record = extract_reader(file).unwrap();
/// ```
pub fn extract_reader<R: Read>(reader: R) -> Result<ValidatedRecord> {
    extract_reader_with_options(reader, ExtractOptions::default())
}

/// Extract a purchase order from a reader with custom options.
pub fn extract_reader_with_options<R: Read>(
    reader: R,
    options: ExtractOptions,
) -> Result<ValidatedRecord> {
    let parser = PdfParser::from_reader_with_options(reader, options.parse_options())?;
    Coordinator::new(options).extract(&parser, None)
}

/// Extract from pages that were decoded elsewhere.
pub fn extract_pages(
    pages: &[PagePrimitive],
    options: ExtractOptions,
) -> Result<ValidatedRecord> {
    Coordinator::new(options).extract_pages(pages, None)
}

/// Extract several files in parallel.
///
/// Each document gets its own pipeline; results come back in input order.
///
/// # Example
///
/// ```no_run
/// use poextract::{extract_many, ExtractOptions};
///
/// let results = extract_many(&["a.pdf", "b.pdf"], &ExtractOptions::default());
/// for result in results {
///     match result {
///         Ok(record) => println!("PO {}", record.summary.po_number),
///         Err(e) => eprintln!("{}", e),
///     }
/// }
/// ```
pub fn extract_many<P>(paths: &[P], options: &ExtractOptions) -> Vec<Result<ValidatedRecord>>
where
    P: AsRef<Path> + Sync,
{
    let coordinator = Coordinator::new(options.clone());
    let parse_options = options.parse_options();

    paths
        .par_iter()
        .map(|path| {
            let path = path.as_ref();
            let parser = PdfParser::open_with_options(path, parse_options.clone())?;
            coordinator.extract(&parser, source_name(path).as_deref())
        })
        .collect()
}

/// Extract a purchase order from a PDF file without blocking the runtime.
///
/// The file is read asynchronously; decoding and extraction run on the
/// blocking pool.
#[cfg(feature = "async")]
pub async fn extract_file_async<P: AsRef<Path>>(
    path: P,
    options: ExtractOptions,
) -> Result<ValidatedRecord> {
    let path = path.as_ref();
    let data = tokio::fs::read(path).await?;
    let name = source_name(path);

    tokio::task::spawn_blocking(move || {
        let parser = PdfParser::from_bytes_with_options(&data, options.parse_options())?;
        Coordinator::new(options).extract(&parser, name.as_deref())
    })
    .await
    .map_err(std::io::Error::other)?
}

fn source_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

/// Builder for extracting purchase orders.
///
/// # Example
///
/// ```no_run
/// use poextract::{PoExtract, UpcScheme};
///
/// let result = PoExtract::new()
///     .with_upc_scheme(UpcScheme::Gtin)
///     .with_tolerance_cents(1)
///     .lenient()
///     .extract_file("po.pdf")?;
/// println!("{}", result.to_report());
/// # Ok::<(), poextract::Error>(())
/// ```
pub struct PoExtract {
    options: ExtractOptions,
    source_name: Option<String>,
}

impl PoExtract {
    /// Create a new builder with default options.
    pub fn new() -> Self {
        Self {
            options: ExtractOptions::default(),
            source_name: None,
        }
    }

    /// Replace all options.
    pub fn with_options(mut self, options: ExtractOptions) -> Self {
        self.options = options;
        self
    }

    /// Skip pages that fail to decode.
    pub fn lenient(mut self) -> Self {
        self.options = self.options.lenient();
        self
    }

    /// Set document password.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.options = self.options.with_password(password);
        self
    }

    pub fn with_upc_scheme(mut self, scheme: UpcScheme) -> Self {
        self.options = self.options.with_upc_scheme(scheme);
        self
    }

    pub fn with_tolerance_cents(mut self, cents: u32) -> Self {
        self.options = self.options.with_tolerance_cents(cents);
        self
    }

    pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
        self.options = self.options.with_confidence_threshold(threshold);
        self
    }

    /// Set the required fields. The PO number stays required.
    pub fn with_required_fields(mut self, fields: impl IntoIterator<Item = Field>) -> Self {
        self.options = self.options.with_required_fields(fields);
        self
    }

    /// Source filename recorded for byte input.
    pub fn with_source_name(mut self, name: impl Into<String>) -> Self {
        self.source_name = Some(name.into());
        self
    }

    /// Extract from a PDF file.
    pub fn extract_file<P: AsRef<Path>>(self, path: P) -> Result<ExtractResult> {
        let path = path.as_ref();
        let parser = PdfParser::open_with_options(path, self.options.parse_options())?;
        let name = self.source_name.clone().or_else(|| source_name(path));
        self.finish(&parser, name)
    }

    /// Extract from PDF bytes.
    pub fn extract_bytes(self, data: &[u8]) -> Result<ExtractResult> {
        let parser = PdfParser::from_bytes_with_options(data, self.options.parse_options())?;
        let name = self.source_name.clone();
        self.finish(&parser, name)
    }

    fn finish(self, parser: &PdfParser, name: Option<String>) -> Result<ExtractResult> {
        let vocabulary = self.options.size_vocabulary.clone();
        let record = Coordinator::new(self.options).extract(parser, name.as_deref())?;
        Ok(ExtractResult { record, vocabulary })
    }
}

impl Default for PoExtract {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a successful extraction.
pub struct ExtractResult {
    /// The validated record
    pub record: ValidatedRecord,
    vocabulary: SizeVocabulary,
}

impl ExtractResult {
    /// Serialize the record.
    pub fn to_json(&self, format: JsonFormat) -> serde_json::Result<String> {
        render::to_json(&self.record, format)
    }

    /// Serialize the record with its QA report and size sheet.
    pub fn to_json_bundle(&self, format: JsonFormat) -> serde_json::Result<String> {
        render::to_json_bundle(&self.record, &self.size_sheet(), format)
    }

    /// Plain-text QA report.
    pub fn to_report(&self) -> String {
        render::to_report(&self.record)
    }

    /// Product-by-size view of the line items.
    pub fn size_sheet(&self) -> SizeSheet {
        SizeSheet::from_record(&self.record, &self.vocabulary)
    }

    /// Aggregated QA findings.
    pub fn report(&self) -> QaReport {
        self.record.report()
    }

    /// Get the record.
    pub fn record(&self) -> &DocumentRecord {
        self.record.record()
    }
}
