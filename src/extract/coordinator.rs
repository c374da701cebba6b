//! Extraction coordinator.
//!
//! Drives one document through a fixed sequence of stages:
//!
//! ```text
//! NotStarted -> PositionTier -> TableTier -> RegexTier -> Merged -> Validated -> Done
//! ```
//!
//! Every tier runs exactly once, whatever the previous tier found. Results
//! are folded with [`PartialRecord::fill_from`], so a later tier only fills
//! gaps. Once merged, the required fields are checked and the record is
//! handed to the [`Validator`].

use std::collections::BTreeSet;
use std::fmt;

use crate::error::{Error, Result, UnreadableReason};
use crate::model::{DocumentRecord, Field, PagePrimitive, PartialRecord, Summary, Tier, ValidatedRecord};
use crate::parser::PageSource;
use crate::validate::Validator;

use super::fallback::RegexExtractor;
use super::options::ExtractOptions;
use super::position::PositionExtractor;
use super::table::TableExtractor;
use super::Extractor;

/// Where a document is in the extraction pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    NotStarted,
    PositionTier,
    TableTier,
    RegexTier,
    Merged,
    Validated,
    Done,
}

impl Stage {
    /// The stage that follows this one. There is no way back.
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::NotStarted => Some(Stage::PositionTier),
            Stage::PositionTier => Some(Stage::TableTier),
            Stage::TableTier => Some(Stage::RegexTier),
            Stage::RegexTier => Some(Stage::Merged),
            Stage::Merged => Some(Stage::Validated),
            Stage::Validated => Some(Stage::Done),
            Stage::Done => None,
        }
    }

    /// The tier run in this stage, if any.
    pub fn tier(self) -> Option<Tier> {
        match self {
            Stage::PositionTier => Some(Tier::Position),
            Stage::TableTier => Some(Tier::Table),
            Stage::RegexTier => Some(Tier::Regex),
            _ => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::NotStarted => "not started",
            Stage::PositionTier => "position tier",
            Stage::TableTier => "table tier",
            Stage::RegexTier => "regex tier",
            Stage::Merged => "merged",
            Stage::Validated => "validated",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Per-document stage tracker. Only moves forward.
#[derive(Debug)]
struct Pipeline {
    stage: Stage,
}

impl Pipeline {
    fn new() -> Self {
        Self {
            stage: Stage::NotStarted,
        }
    }

    fn advance(&mut self) -> Stage {
        if let Some(next) = self.stage.next() {
            log::debug!("stage {} -> {}", self.stage, next);
            self.stage = next;
        }
        self.stage
    }
}

/// Runs the three tiers over a document's pages and validates the result.
///
/// A coordinator holds only its options and can be shared across threads;
/// each call builds its own pipeline state.
#[derive(Debug, Clone)]
pub struct Coordinator {
    options: ExtractOptions,
    validator: Validator,
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new(ExtractOptions::default())
    }
}

impl Coordinator {
    pub fn new(options: ExtractOptions) -> Self {
        let validator = Validator::new(&options);
        Self { options, validator }
    }

    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Run every tier in order and fold their findings.
    ///
    /// Never fails; fields no tier found stay unset.
    pub fn merge(&self, pages: &[PagePrimitive]) -> PartialRecord {
        self.run_tiers(pages, &mut Pipeline::new())
    }

    fn run_tiers(&self, pages: &[PagePrimitive], pipeline: &mut Pipeline) -> PartialRecord {
        let position = PositionExtractor::new(&self.options);
        let table = TableExtractor::new(&self.options);
        let regex = RegexExtractor::new(&self.options);
        let tiers: [&dyn Extractor; 3] = [&position, &table, &regex];

        let mut merged = PartialRecord::new();
        for tier in tiers {
            let stage = pipeline.advance();
            debug_assert_eq!(stage.tier(), Some(tier.tier()));

            let found = tier.extract(pages, &merged);
            let filled = merged.fill_from(found);
            if filled.is_empty() {
                log::debug!("{} tier filled nothing", tier.tier());
            } else {
                let names: Vec<String> = filled.iter().map(|f| f.to_string()).collect();
                log::debug!("{} tier filled {}", tier.tier(), names.join(", "));
            }
        }
        pipeline.advance();
        merged
    }

    /// Extract and validate a record from decoded pages.
    pub fn extract_pages(
        &self,
        pages: &[PagePrimitive],
        source_filename: Option<&str>,
    ) -> Result<ValidatedRecord> {
        if pages.is_empty() {
            return Err(UnreadableReason::EmptyDocument.into());
        }

        let mut pipeline = Pipeline::new();
        let merged = self.run_tiers(pages, &mut pipeline);

        let required = self.options.effective_required();
        let missing: BTreeSet<Field> = required
            .iter()
            .copied()
            .filter(|f| !merged.satisfies(*f))
            .collect();
        if !missing.is_empty() {
            log::info!(
                "extraction incomplete for {}: {} required fields missing",
                source_filename.unwrap_or("document"),
                missing.len()
            );
            return Err(Error::ExtractionIncomplete { missing });
        }

        let confidence = required
            .iter()
            .filter_map(|f| merged.provenance.get(f))
            .map(|p| p.confidence)
            .fold(1.0_f32, f32::min);

        let record = assemble(merged, pages.len(), source_filename, confidence);
        let validated = self.validator.validate(record);
        pipeline.advance();

        log::info!(
            "PO {}: {} line items, {} size rows, {} QA flags, confidence {:.2}",
            validated.summary.po_number,
            validated.orders.len(),
            validated.size_breakdowns.len(),
            validated.qa_flags.len(),
            validated.confidence
        );
        pipeline.advance();
        Ok(validated)
    }

    /// Decode `source` and extract a record from it.
    pub fn extract<S>(&self, source: &S, source_filename: Option<&str>) -> Result<ValidatedRecord>
    where
        S: PageSource + ?Sized,
    {
        let pages = source.page_primitives()?;
        self.extract_pages(&pages, source_filename)
    }
}

/// Turn a merged partial record into a document record.
fn assemble(
    merged: PartialRecord,
    page_count: usize,
    source_filename: Option<&str>,
    confidence: f32,
) -> DocumentRecord {
    let PartialRecord {
        po_number,
        vendor_name,
        vendor_number,
        ship_date,
        payment_terms,
        total_amount,
        orders,
        size_breakdowns,
        provenance,
        order_issues,
        size_issues,
    } = merged;

    let summary = Summary {
        po_number: po_number.unwrap_or_default(),
        vendor_name,
        vendor_number,
        ship_date,
        payment_terms,
        total_amount,
        page_count: u32::try_from(page_count).unwrap_or(u32::MAX),
        source_filename: source_filename.map(str::to_string),
    };

    let mut qa_flags = order_issues;
    qa_flags.extend(size_issues);

    DocumentRecord::new(summary, orders, size_breakdowns, provenance, qa_flags, confidence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{IssueKind, PageTable};

    fn orders_page() -> PagePrimitive {
        let table = PageTable::from_strings(vec![
            vec!["Qty", "Item SKU", "UPC", "Description", "Unit Price", "Amount"],
            vec!["10", "ABC-100", "036000291452", "Ruffle Shorts", "2.50", "25.00"],
            vec!["4", "ABC-200", "012345678905", "Kids Tee", "3.00", "12.00"],
        ]);
        PagePrimitive::new(0)
            .with_table(table)
            .with_text("Purchase Order # 4500123\nTotal $37.00")
    }

    #[test]
    fn test_stage_sequence() {
        let mut stage = Stage::NotStarted;
        let mut seen = vec![stage];
        while let Some(next) = stage.next() {
            assert!(next > stage);
            seen.push(next);
            stage = next;
        }
        assert_eq!(seen.len(), 7);
        assert_eq!(stage, Stage::Done);
        assert_eq!(Stage::TableTier.tier(), Some(Tier::Table));
        assert_eq!(Stage::Merged.tier(), None);
    }

    #[test]
    fn test_pipeline_stops_at_done() {
        let mut pipeline = Pipeline::new();
        for _ in 0..10 {
            pipeline.advance();
        }
        assert_eq!(pipeline.stage, Stage::Done);
    }

    #[test]
    fn test_extract_pages() {
        let coordinator = Coordinator::default();
        let record = coordinator
            .extract_pages(&[orders_page()], Some("po.pdf"))
            .unwrap();

        assert_eq!(record.summary.po_number, "4500123");
        assert_eq!(record.summary.page_count, 1);
        assert_eq!(record.summary.source_filename.as_deref(), Some("po.pdf"));
        assert_eq!(record.orders.len(), 2);
        assert_eq!(record.provenance(Field::Orders).map(|p| p.tier), Some(Tier::Table));
        assert_eq!(record.provenance(Field::PoNumber).map(|p| p.tier), Some(Tier::Regex));

        // Regex-sourced PO number drags the document confidence down
        assert_eq!(record.confidence, Tier::Regex.base_confidence());
        assert!(record
            .qa_flags()
            .iter()
            .any(|i| i.kind == IssueKind::LowConfidence && i.path == "summary.po_number"));
        assert!(!record
            .qa_flags()
            .iter()
            .any(|i| i.kind == IssueKind::ArithmeticMismatch));
    }

    #[test]
    fn test_missing_po_number() {
        let page = PagePrimitive::new(0).with_text("UPC 036000291452");
        let err = Coordinator::default().extract_pages(&[page], None).unwrap_err();
        let missing = err.missing_fields().unwrap();
        assert!(missing.contains(&Field::PoNumber));
        assert!(!missing.contains(&Field::Orders));
    }

    #[test]
    fn test_missing_upc() {
        let page = PagePrimitive::new(0).with_text("PO 4500123\nno items here");
        let err = Coordinator::default().extract_pages(&[page], None).unwrap_err();
        assert_eq!(
            err.missing_fields().map(|m| m.iter().copied().collect::<Vec<_>>()),
            Some(vec![Field::Orders])
        );
    }

    #[test]
    fn test_required_fields_configurable() {
        let options = ExtractOptions::new().with_required_fields([Field::PoNumber]);
        let page = PagePrimitive::new(0).with_text("PO 4500123");
        let record = Coordinator::new(options).extract_pages(&[page], None).unwrap();
        assert!(record.orders.is_empty());
    }

    #[test]
    fn test_empty_document() {
        let err = Coordinator::default().extract_pages(&[], None).unwrap_err();
        assert!(err.is_unreadable());

        let pages: Vec<PagePrimitive> = Vec::new();
        assert!(Coordinator::default().extract(&pages, None).unwrap_err().is_unreadable());
    }

    #[test]
    fn test_merge_is_deterministic() {
        let coordinator = Coordinator::default();
        let pages = [orders_page()];
        assert_eq!(coordinator.merge(&pages), coordinator.merge(&pages));
    }
}
