//! Extraction options.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::model::Field;
use crate::parser::{ErrorMode, ParseOptions, TableDetectorConfig};

use super::sizes::SizeVocabulary;
use super::synonyms::SynonymTable;

/// Which barcode lengths are accepted and check-digit validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpcScheme {
    /// 12-digit UPC-A
    #[default]
    UpcA,
    /// GTIN family: GTIN-8, UPC-A (12), EAN-13, GTIN-14
    Gtin,
}

impl UpcScheme {
    pub fn accepts_len(&self, len: usize) -> bool {
        match self {
            UpcScheme::UpcA => len == 12,
            UpcScheme::Gtin => matches!(len, 8 | 12 | 13 | 14),
        }
    }
}

/// Geometry thresholds for the position tier, in points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutTolerances {
    /// Vertical-center distance under which item words share a band
    pub line_tolerance: f32,
    /// Vertical-center distance used when searching for the header band
    pub header_tolerance: f32,
    /// How many bands from the top of a page may hold the header
    pub header_search_bands: usize,
    /// Largest gap between a label and a value to its right
    pub max_horizontal_gap: f32,
    /// Largest gap between a label and a value below it
    pub max_vertical_gap: f32,
    /// Largest gap between words of one value phrase
    pub word_gap: f32,
    /// Extent of the outermost column ranges beyond their header center
    pub edge_column_margin: f32,
    /// Width of the buckets word starts are snapped into when an item grid
    /// has no header
    pub column_bucket: f32,
    /// Bands that must share a word start before it counts as a column
    pub min_item_bands: usize,
}

impl Default for LayoutTolerances {
    fn default() -> Self {
        Self {
            line_tolerance: 5.5,
            header_tolerance: 4.0,
            header_search_bands: 12,
            max_horizontal_gap: 150.0,
            max_vertical_gap: 18.0,
            word_gap: 12.0,
            edge_column_margin: 70.0,
            column_bucket: 5.0,
            min_item_bands: 2,
        }
    }
}

/// Options for the extraction coordinator and validator.
///
/// Passed in at construction; nothing is read from global state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractOptions {
    /// Fields whose absence after all tiers fails the document
    pub required_fields: BTreeSet<Field>,
    /// Provenance confidence below this is flagged for review
    pub confidence_threshold: f32,
    /// Allowed difference in cents for arithmetic checks (0 = exact)
    pub tolerance_cents: u32,
    pub upc_scheme: UpcScheme,
    pub synonyms: SynonymTable,
    pub size_vocabulary: SizeVocabulary,
    pub layout: LayoutTolerances,
    /// Stream-mode table detection used by the page adapter
    pub tables: TableDetectorConfig,
    /// Password for encrypted documents
    pub password: Option<String>,
    /// Decode what can be decoded instead of failing on a bad page
    pub lenient: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            required_fields: [Field::PoNumber, Field::Orders].into_iter().collect(),
            confidence_threshold: 0.5,
            tolerance_cents: 0,
            upc_scheme: UpcScheme::default(),
            synonyms: SynonymTable::default(),
            size_vocabulary: SizeVocabulary::default(),
            layout: LayoutTolerances::default(),
            tables: TableDetectorConfig::default(),
            password: None,
            lenient: false,
        }
    }
}

impl ExtractOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load options from JSON; missing keys take their defaults.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Replace the required field set. The PO number is always required.
    pub fn with_required_fields(mut self, fields: impl IntoIterator<Item = Field>) -> Self {
        self.required_fields = fields.into_iter().collect();
        self
    }

    pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn with_tolerance_cents(mut self, cents: u32) -> Self {
        self.tolerance_cents = cents;
        self
    }

    pub fn with_upc_scheme(mut self, scheme: UpcScheme) -> Self {
        self.upc_scheme = scheme;
        self
    }

    pub fn with_synonyms(mut self, synonyms: SynonymTable) -> Self {
        self.synonyms = synonyms;
        self
    }

    pub fn with_size_vocabulary(mut self, vocabulary: SizeVocabulary) -> Self {
        self.size_vocabulary = vocabulary;
        self
    }

    pub fn with_layout(mut self, layout: LayoutTolerances) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn lenient(mut self) -> Self {
        self.lenient = true;
        self
    }

    /// Required fields as enforced: the configured set plus the PO number.
    pub fn effective_required(&self) -> BTreeSet<Field> {
        let mut required = self.required_fields.clone();
        required.insert(Field::PoNumber);
        required
    }

    /// Options for the page adapter.
    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            error_mode: if self.lenient {
                ErrorMode::Lenient
            } else {
                ErrorMode::Strict
            },
            password: self.password.clone(),
            tables: self.tables.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ExtractOptions::default();
        assert_eq!(options.confidence_threshold, 0.5);
        assert_eq!(options.tolerance_cents, 0);
        assert_eq!(options.upc_scheme, UpcScheme::UpcA);
        assert!(options.required_fields.contains(&Field::Orders));
    }

    #[test]
    fn test_po_number_always_required() {
        let options = ExtractOptions::new().with_required_fields([Field::ShipDate]);
        let required = options.effective_required();
        assert!(required.contains(&Field::PoNumber));
        assert!(required.contains(&Field::ShipDate));
        assert!(!required.contains(&Field::Orders));
    }

    #[test]
    fn test_from_json_partial() {
        let options =
            ExtractOptions::from_json(r#"{"tolerance_cents": 1, "upc_scheme": "gtin"}"#).unwrap();
        assert_eq!(options.tolerance_cents, 1);
        assert_eq!(options.upc_scheme, UpcScheme::Gtin);
        assert_eq!(options.confidence_threshold, 0.5);
        assert_eq!(options.synonyms, SynonymTable::default());
    }

    #[test]
    fn test_from_json_custom_synonyms() {
        let options =
            ExtractOptions::from_json(r#"{"synonyms": {"labels": {"po_number": ["P.O. Ref"]}}}"#)
                .unwrap();
        assert_eq!(options.synonyms.match_label("P.O. Ref"), Some(Field::PoNumber));
        assert_eq!(options.synonyms.match_label("p.o. ref #"), None);
    }

    #[test]
    fn test_parse_options() {
        let parse = ExtractOptions::new().lenient().with_password("pw").parse_options();
        assert_eq!(parse.error_mode, ErrorMode::Lenient);
        assert_eq!(parse.password.as_deref(), Some("pw"));
    }

    #[test]
    fn test_upc_scheme_lengths() {
        assert!(UpcScheme::UpcA.accepts_len(12));
        assert!(!UpcScheme::UpcA.accepts_len(13));
        assert!(UpcScheme::Gtin.accepts_len(13));
        assert!(UpcScheme::Gtin.accepts_len(8));
    }
}
