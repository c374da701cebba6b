//! Error types for poextract.
//!
//! Only two failure kinds ever reach a caller: the input could not be decoded
//! as a PDF, or the required purchase-order fields were still missing after
//! every extraction tier ran. Everything else (a tier finding nothing, a bad
//! check digit, a total that does not add up) is data on the record.

use std::collections::BTreeSet;
use std::io;
use thiserror::Error;

use crate::model::Field;

/// Result type alias for poextract operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal errors surfaced by the extraction core.
#[derive(Error, Debug)]
pub enum Error {
    /// The input could not be decoded into page primitives.
    #[error("Unreadable PDF: {0}")]
    UnreadablePdf(#[from] UnreadableReason),

    /// Required fields were still unset after all tiers ran.
    #[error("Extraction incomplete: missing {}", join_fields(.missing))]
    ExtractionIncomplete {
        /// The required fields no tier could supply.
        missing: BTreeSet<Field>,
    },
}

/// Why a PDF could not be read.
#[derive(Error, Debug)]
pub enum UnreadableReason {
    /// The bytes do not start with a PDF header.
    #[error("not a valid PDF")]
    NotPdf,

    /// The PDF header carries a version string we do not recognize.
    #[error("unsupported PDF version {0}")]
    UnsupportedVersion(String),

    /// The document is encrypted and no password was supplied.
    #[error("document is encrypted")]
    Encrypted,

    /// The supplied password did not decrypt the document.
    #[error("invalid password")]
    InvalidPassword,

    /// The PDF structure is corrupted or a page could not be decoded.
    #[error("corrupted PDF structure: {0}")]
    Corrupted(String),

    /// The document has zero pages.
    #[error("document has no pages")]
    EmptyDocument,

    /// I/O error while reading the source.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Fields reported missing, empty for unreadable input.
    pub fn missing_fields(&self) -> Option<&BTreeSet<Field>> {
        match self {
            Error::ExtractionIncomplete { missing } => Some(missing),
            Error::UnreadablePdf(_) => None,
        }
    }

    /// Whether the failure was caused by the input file rather than its content.
    pub fn is_unreadable(&self) -> bool {
        matches!(self, Error::UnreadablePdf(_))
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::UnreadablePdf(UnreadableReason::Io(err))
    }
}

impl From<lopdf::Error> for UnreadableReason {
    fn from(err: lopdf::Error) -> Self {
        match err {
            lopdf::Error::IO(e) => UnreadableReason::Io(e),
            lopdf::Error::Decryption(_) => UnreadableReason::Encrypted,
            _ => UnreadableReason::Corrupted(err.to_string()),
        }
    }
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        Error::UnreadablePdf(err.into())
    }
}

fn join_fields(fields: &BTreeSet<Field>) -> String {
    fields
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::UnreadablePdf(UnreadableReason::Encrypted);
        assert_eq!(err.to_string(), "Unreadable PDF: document is encrypted");

        let missing: BTreeSet<Field> = [Field::PoNumber, Field::Orders].into_iter().collect();
        let err = Error::ExtractionIncomplete { missing };
        assert_eq!(
            err.to_string(),
            "Extraction incomplete: missing PO number, line item UPC"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::UnreadablePdf(UnreadableReason::Io(_))));
        assert!(err.is_unreadable());
        assert!(err.missing_fields().is_none());
    }
}
