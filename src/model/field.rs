//! Field names and provenance.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A top-level field of a purchase-order record.
///
/// Line items and size breakdowns are single fields: a tier either supplies
/// the whole collection or nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    PoNumber,
    VendorName,
    VendorNumber,
    ShipDate,
    PaymentTerms,
    TotalAmount,
    Orders,
    SizeBreakdowns,
}

impl Field {
    /// Every field in record order.
    pub const ALL: [Field; 8] = [
        Field::PoNumber,
        Field::VendorName,
        Field::VendorNumber,
        Field::ShipDate,
        Field::PaymentTerms,
        Field::TotalAmount,
        Field::Orders,
        Field::SizeBreakdowns,
    ];

    /// Header fields located by label.
    pub const SUMMARY: [Field; 6] = [
        Field::PoNumber,
        Field::VendorName,
        Field::VendorNumber,
        Field::ShipDate,
        Field::PaymentTerms,
        Field::TotalAmount,
    ];

    /// Record path used in validation issues.
    pub fn path(&self) -> &'static str {
        match self {
            Field::PoNumber => "summary.po_number",
            Field::VendorName => "summary.vendor_name",
            Field::VendorNumber => "summary.vendor_number",
            Field::ShipDate => "summary.ship_date",
            Field::PaymentTerms => "summary.payment_terms",
            Field::TotalAmount => "summary.total_amount",
            Field::Orders => "orders",
            Field::SizeBreakdowns => "size_breakdowns",
        }
    }

    pub fn is_summary(&self) -> bool {
        !matches!(self, Field::Orders | Field::SizeBreakdowns)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::PoNumber => "PO number",
            Field::VendorName => "vendor name",
            Field::VendorNumber => "vendor number",
            Field::ShipDate => "ship date",
            Field::PaymentTerms => "payment terms",
            Field::TotalAmount => "total amount",
            Field::Orders => "line item UPC",
            Field::SizeBreakdowns => "size breakdowns",
        };
        f.write_str(name)
    }
}

/// An extraction strategy, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Position,
    Table,
    Regex,
}

impl Tier {
    /// Tiers in the order the coordinator runs them.
    pub const ORDER: [Tier; 3] = [Tier::Position, Tier::Table, Tier::Regex];

    /// Confidence assigned to a value this tier found by its primary rule.
    ///
    /// Regex values sit below the default review threshold of 0.5, and the
    /// validator flags them under any threshold.
    pub fn base_confidence(&self) -> f32 {
        match self {
            Tier::Position => 0.9,
            Tier::Table => 0.8,
            Tier::Regex => 0.4,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Tier::Position => "position",
            Tier::Table => "table",
            Tier::Regex => "regex",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which tier produced a field and how much it is trusted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub tier: Tier,
    /// Confidence in `[0, 1]`
    pub confidence: f32,
}

impl Provenance {
    /// Provenance at the tier's base confidence.
    pub fn from_tier(tier: Tier) -> Self {
        Self {
            tier,
            confidence: tier.base_confidence(),
        }
    }

    /// Provenance with an explicit confidence, clamped to `[0, 1]`.
    pub fn new(tier: Tier, confidence: f32) -> Self {
        Self {
            tier,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}
