//! PDF page adapter using lopdf.

use std::io::Read;
use std::path::Path;

use lopdf::Document as LopdfDocument;

use crate::detect::{detect_format_from_bytes, detect_format_from_path};
use crate::error::{Result, UnreadableReason};
use crate::model::{PagePrimitive, WordToken};

use super::layout::{spans_to_words, LayoutAnalyzer};
use super::options::{ErrorMode, ParseOptions};
use super::table_detector::TableDetector;

/// Words whose vertical centers differ by less than this share a text line.
const TEXT_LINE_TOLERANCE: f32 = 3.0;

/// Decodes a PDF into per-page primitives.
pub struct PdfParser {
    doc: LopdfDocument,
    options: ParseOptions,
}

impl PdfParser {
    /// Open a PDF file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_options(path, ParseOptions::default())
    }

    /// Open a PDF file with custom options.
    pub fn open_with_options<P: AsRef<Path>>(path: P, options: ParseOptions) -> Result<Self> {
        let path = path.as_ref();
        detect_format_from_path(path)?;
        let doc = LopdfDocument::load(path).map_err(UnreadableReason::from)?;
        Self::from_document(doc, options)
    }

    /// Parse a PDF from bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::from_bytes_with_options(data, ParseOptions::default())
    }

    /// Parse a PDF from bytes with custom options.
    pub fn from_bytes_with_options(data: &[u8], options: ParseOptions) -> Result<Self> {
        detect_format_from_bytes(data)?;
        let doc = LopdfDocument::load_mem(data).map_err(UnreadableReason::from)?;
        Self::from_document(doc, options)
    }

    /// Parse a PDF from a reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Self::from_reader_with_options(reader, ParseOptions::default())
    }

    /// Parse a PDF from a reader with custom options.
    pub fn from_reader_with_options<R: Read>(mut reader: R, options: ParseOptions) -> Result<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::from_bytes_with_options(&data, options)
    }

    fn from_document(mut doc: LopdfDocument, options: ParseOptions) -> Result<Self> {
        if doc.is_encrypted() {
            match options.password.as_deref() {
                Some(password) => doc
                    .decrypt(password)
                    .map_err(|_| UnreadableReason::InvalidPassword)?,
                // Owner-only protection opens with the empty user password
                None => doc.decrypt("").map_err(|_| UnreadableReason::Encrypted)?,
            }
        }

        if doc.get_pages().is_empty() {
            return Err(UnreadableReason::EmptyDocument.into());
        }

        Ok(Self { doc, options })
    }

    /// Decode every page, in document order.
    ///
    /// In lenient mode a page that fails to decode comes back blank so page
    /// indices stay stable.
    pub fn pages(&self) -> Result<Vec<PagePrimitive>> {
        let page_numbers: Vec<u32> = self.doc.get_pages().keys().copied().collect();
        let mut pages = Vec::with_capacity(page_numbers.len());

        for (index, page_num) in page_numbers.into_iter().enumerate() {
            match self.parse_page(index, page_num) {
                Ok(page) => pages.push(page),
                Err(e) if self.options.error_mode == ErrorMode::Lenient => {
                    log::warn!("Failed to decode page {}: {}", page_num, e);
                    pages.push(PagePrimitive::new(index));
                }
                Err(e) => return Err(e),
            }
        }

        Ok(pages)
    }

    /// Decode a single page (1-based page number) as page `index`.
    fn parse_page(&self, index: usize, page_num: u32) -> Result<PagePrimitive> {
        let (width, height) = self.get_page_dimensions(page_num);

        let spans = LayoutAnalyzer::new(&self.doc).extract_page_spans(page_num)?;
        let words = spans_to_words(&spans, height);
        let tables = TableDetector::with_config(self.options.tables.clone()).detect(&spans);

        let text = if words.is_empty() {
            // Fall back to lopdf's own text extraction
            self.doc.extract_text(&[page_num]).unwrap_or_default()
        } else {
            text_from_words(&words)
        };

        log::debug!(
            "page {}: {} words, {} tables",
            page_num,
            words.len(),
            tables.len()
        );

        Ok(PagePrimitive {
            index,
            width,
            height,
            words,
            tables,
            text,
        })
    }

    /// Page size from the MediaBox, US Letter when absent.
    fn get_page_dimensions(&self, page_num: u32) -> (f32, f32) {
        let pages = self.doc.get_pages();
        let media_box = pages
            .get(&page_num)
            .and_then(|id| self.doc.get_dictionary(*id).ok())
            .and_then(|dict| dict.get(b"MediaBox").ok())
            .and_then(|obj| obj.as_array().ok());

        match media_box {
            Some(array) if array.len() >= 4 => {
                let coord = |i: usize, default: f32| array[i].as_float().unwrap_or(default);
                let width = coord(2, 612.0) - coord(0, 0.0);
                let height = coord(3, 792.0) - coord(1, 0.0);
                (width, height)
            }
            _ => (612.0, 792.0),
        }
    }

    /// Get the number of pages.
    pub fn page_count(&self) -> u32 {
        self.doc.get_pages().len() as u32
    }

    /// Get PDF version.
    pub fn version(&self) -> String {
        self.doc.version.to_string()
    }
}

/// Rebuild line-oriented page text from positioned words.
fn text_from_words(words: &[WordToken]) -> String {
    let mut lines: Vec<(f32, Vec<&WordToken>)> = Vec::new();
    for word in words {
        let center = word.bbox.center_y();
        match lines
            .iter_mut()
            .find(|(y, _)| (center - *y).abs() <= TEXT_LINE_TOLERANCE)
        {
            Some((_, line)) => line.push(word),
            None => lines.push((center, vec![word])),
        }
    }

    lines.sort_by(|a, b| a.0.total_cmp(&b.0));
    lines
        .into_iter()
        .map(|(_, mut line)| {
            line.sort_by(|a, b| a.bbox.x0.total_cmp(&b.bbox.x0));
            line.iter()
                .map(|w| w.text.as_str())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}
