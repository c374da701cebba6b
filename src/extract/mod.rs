//! Field extraction: the three tiers and the coordinator that folds them.
//!
//! Each tier reads the decoded pages and returns a [`PartialRecord`] holding
//! only what it found. The coordinator runs them in [`Tier::ORDER`] and
//! merges with [`PartialRecord::fill_from`], so a value set by an earlier
//! tier is never replaced by a later one.

mod coordinator;
mod fallback;
mod options;
mod position;
mod rows;
mod sizes;
mod synonyms;
mod table;
mod values;

pub use coordinator::{Coordinator, Stage};
pub use fallback::RegexExtractor;
pub use options::{ExtractOptions, LayoutTolerances, UpcScheme};
pub use position::PositionExtractor;
pub use rows::{finish_rows, is_footer_row, RowCells, RowDraft};
pub use sizes::SizeVocabulary;
pub use synonyms::{normalize_label, ColumnKind, SynonymMatch, SynonymTable};
pub use table::TableExtractor;
pub use values::{parse_money, parse_quantity};

use crate::model::{PagePrimitive, PartialRecord, Provenance, Tier};

/// Confidence taken off a tier's base when a label matched only fuzzily.
const FUZZY_LABEL_PENALTY: f32 = 0.15;

/// Provenance for a value found next to a label.
fn label_provenance(tier: Tier, exact: bool) -> Provenance {
    if exact {
        Provenance::from_tier(tier)
    } else {
        Provenance::new(tier, tier.base_confidence() - FUZZY_LABEL_PENALTY)
    }
}

/// One extraction strategy.
///
/// Implementations never fail: a field they cannot find is simply left
/// unset in the returned record.
pub trait Extractor: Send + Sync {
    /// Which tier this is, for provenance.
    fn tier(&self) -> Tier;

    /// Extract what this tier can from `pages`.
    ///
    /// `current` is the merged result of the tiers that already ran. It may
    /// be used to skip work for fields that are already set; whatever is
    /// returned for those fields is discarded by the merge.
    fn extract(&self, pages: &[PagePrimitive], current: &PartialRecord) -> PartialRecord;
}
