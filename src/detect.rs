//! PDF header sniffing before any decoding is attempted.

use crate::error::{Result, UnreadableReason};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// PDF header information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfFormat {
    /// PDF version (e.g., "1.7", "2.0")
    pub version: String,
    /// Offset of the `%PDF-` marker from the start of the input
    pub header_offset: usize,
}

impl std::fmt::Display for PdfFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PDF {}", self.version)
    }
}

/// PDF magic bytes: %PDF-
const PDF_MAGIC: &[u8] = b"%PDF-";
const PDF_MAGIC_LEN: usize = 5;
const VERSION_LEN: usize = 3; // e.g., "1.7"

/// Readers accept junk (mail headers, BOMs) before the marker within this window.
const HEADER_WINDOW: usize = 1024;

/// Sniff the PDF header of a file.
///
/// ```no_run
/// use poextract::detect::detect_format_from_path;
///
/// let format = detect_format_from_path("po.pdf").unwrap();
/// println!("PDF version: {}", format.version);
/// ```
pub fn detect_format_from_path<P: AsRef<Path>>(path: P) -> Result<PdfFormat> {
    let file = File::open(path)?;
    let mut header = Vec::with_capacity(HEADER_WINDOW);
    BufReader::new(file)
        .take(HEADER_WINDOW as u64)
        .read_to_end(&mut header)?;
    detect_format_from_bytes(&header)
}

/// Sniff the PDF header at the start of `data`.
///
/// Fails with [`UnreadableReason::NotPdf`] when no `%PDF-` marker appears in
/// the first kilobyte, and [`UnreadableReason::UnsupportedVersion`] when the
/// version is not of the form `d.d`.
pub fn detect_format_from_bytes(data: &[u8]) -> Result<PdfFormat> {
    let window = &data[..data.len().min(HEADER_WINDOW)];
    let header_offset = window
        .windows(PDF_MAGIC_LEN)
        .position(|w| w == PDF_MAGIC)
        .ok_or(UnreadableReason::NotPdf)?;

    let start = header_offset + PDF_MAGIC_LEN;
    let version_bytes = data
        .get(start..start + VERSION_LEN)
        .ok_or(UnreadableReason::NotPdf)?;
    let version = String::from_utf8_lossy(version_bytes).to_string();

    if !is_valid_version(&version) {
        return Err(UnreadableReason::UnsupportedVersion(version).into());
    }

    Ok(PdfFormat {
        version,
        header_offset,
    })
}

fn is_valid_version(version: &str) -> bool {
    let bytes = version.as_bytes();
    bytes.len() == 3
        && matches!(bytes[0], b'1' | b'2')
        && bytes[1] == b'.'
        && bytes[2].is_ascii_digit()
}

/// Check if a file starts like a PDF.
pub fn is_pdf<P: AsRef<Path>>(path: P) -> bool {
    detect_format_from_path(path).is_ok()
}

/// Check if bytes start like a PDF.
pub fn is_pdf_bytes(data: &[u8]) -> bool {
    detect_format_from_bytes(data).is_ok()
}
