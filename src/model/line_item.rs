//! Line items and per-size quantity breakdowns.

use bigdecimal::{BigDecimal, RoundingMode};
use serde::{Deserialize, Serialize};

/// One ordered product row.
///
/// Every attribute is optional because tiers only fill what they can read;
/// an unset value is never defaulted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// Product / style identifier (item SKU)
    pub product_id: Option<String>,
    /// UPC barcode digits
    pub upc: Option<String>,
    pub description: Option<String>,
    pub brand: Option<String>,
    /// Vendor development code
    pub dev_code: Option<String>,
    /// Harmonized tariff code
    pub hts_code: Option<String>,
    /// Canonical size label inferred from the description or SKU suffix
    pub size: Option<String>,
    pub quantity: Option<u32>,
    pub unit_price: Option<BigDecimal>,
    pub line_total: Option<BigDecimal>,
}

impl LineItem {
    /// A line item known only by its UPC.
    pub fn with_upc(upc: impl Into<String>) -> Self {
        Self {
            upc: Some(upc.into()),
            ..Default::default()
        }
    }

    /// Key used to drop repeated rows: `product_id|upc`.
    pub fn dedupe_key(&self) -> String {
        format!(
            "{}|{}",
            self.product_id.as_deref().unwrap_or("").trim(),
            self.upc.as_deref().unwrap_or("").trim()
        )
    }

    /// `quantity * unit_price` rounded to cents, when both are known.
    pub fn expected_total(&self) -> Option<BigDecimal> {
        let qty = self.quantity?;
        let price = self.unit_price.as_ref()?;
        Some(round_money(&(BigDecimal::from(qty) * price)))
    }

    pub fn has_upc(&self) -> bool {
        self.upc.as_deref().is_some_and(|u| !u.trim().is_empty())
    }
}

/// Round a monetary amount to two decimal places, half away from zero.
pub fn round_money(value: &BigDecimal) -> BigDecimal {
    value.with_scale_round(2, RoundingMode::HalfUp)
}

/// Quantity ordered for one size label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeQuantity {
    pub label: String,
    pub quantity: u32,
}

/// Size-by-size quantities for one product.
///
/// `product_id` is a key into the record's line items, not an owned link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeBreakdown {
    pub product_id: String,
    /// Sizes in table column order
    pub sizes: Vec<SizeQuantity>,
}

impl SizeBreakdown {
    pub fn new(product_id: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
            sizes: Vec::new(),
        }
    }

    /// Add a size, accumulating if the label is already present.
    pub fn add(&mut self, label: impl Into<String>, quantity: u32) {
        let label = label.into();
        match self.sizes.iter_mut().find(|s| s.label == label) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(quantity),
            None => self.sizes.push(SizeQuantity { label, quantity }),
        }
    }

    pub fn with_size(mut self, label: impl Into<String>, quantity: u32) -> Self {
        self.add(label, quantity);
        self
    }

    /// Sum of all size quantities.
    pub fn total(&self) -> u64 {
        self.sizes.iter().map(|s| u64::from(s.quantity)).sum()
    }

    pub fn quantity_for(&self, label: &str) -> Option<u32> {
        self.sizes
            .iter()
            .find(|s| s.label == label)
            .map(|s| s.quantity)
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn test_expected_total() {
        let item = LineItem {
            quantity: Some(10),
            unit_price: Some(dec("2.50")),
            ..Default::default()
        };
        assert_eq!(item.expected_total(), Some(dec("25.00")));

        let item = LineItem {
            quantity: Some(3),
            unit_price: Some(dec("0.335")),
            ..Default::default()
        };
        assert_eq!(item.expected_total(), Some(dec("1.01")));

        assert_eq!(LineItem::with_upc("036000291452").expected_total(), None);
    }

    #[test]
    fn test_dedupe_key() {
        let item = LineItem {
            product_id: Some("ABC-123".into()),
            upc: Some("036000291452".into()),
            ..Default::default()
        };
        assert_eq!(item.dedupe_key(), "ABC-123|036000291452");
        assert_eq!(LineItem::default().dedupe_key(), "|");
    }

    #[test]
    fn test_size_breakdown_total() {
        let sizes = SizeBreakdown::new("ABC")
            .with_size("S", 2)
            .with_size("M", 3)
            .with_size("L", 5)
            .with_size("M", 1);
        assert_eq!(sizes.total(), 11);
        assert_eq!(sizes.quantity_for("M"), Some(4));
        assert_eq!(sizes.sizes.len(), 3);
        assert_eq!(sizes.quantity_for("XL"), None);
    }
}
