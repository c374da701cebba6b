//! Page source abstraction.
//!
//! The extraction tiers only ever see [`PagePrimitive`]s. Anything able to
//! produce them (a decoded PDF, or primitives built by hand) can feed the
//! coordinator without exposing the concrete PDF library.

use crate::error::{Result, UnreadableReason};
use crate::model::PagePrimitive;

use super::pdf_parser::PdfParser;

/// A source of decoded pages.
pub trait PageSource {
    /// Decode all pages in stable document order.
    fn page_primitives(&self) -> Result<Vec<PagePrimitive>>;
}

impl PageSource for PdfParser {
    fn page_primitives(&self) -> Result<Vec<PagePrimitive>> {
        self.pages()
    }
}

/// Pre-decoded pages. An empty slice is an empty document.
impl PageSource for [PagePrimitive] {
    fn page_primitives(&self) -> Result<Vec<PagePrimitive>> {
        if self.is_empty() {
            return Err(UnreadableReason::EmptyDocument.into());
        }
        Ok(self.to_vec())
    }
}

impl PageSource for Vec<PagePrimitive> {
    fn page_primitives(&self) -> Result<Vec<PagePrimitive>> {
        self.as_slice().page_primitives()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_slice_source() {
        let pages = vec![PagePrimitive::new(0).with_text("PO 12345")];
        assert_eq!(pages.page_primitives().unwrap().len(), 1);
    }

    #[test]
    fn test_empty_source_is_empty_document() {
        let pages: Vec<PagePrimitive> = Vec::new();
        assert!(matches!(
            pages.page_primitives(),
            Err(Error::UnreadablePdf(UnreadableReason::EmptyDocument))
        ));
    }
}
