//! UPC / GTIN check digits.

use crate::extract::UpcScheme;

/// Outcome of checking one barcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpcCheck {
    Valid,
    /// Length not accepted by the scheme
    BadLength(usize),
    /// Contains something other than ASCII digits
    NotNumeric,
    /// The final digit does not match the computed one
    Mismatch { expected: u8, found: u8 },
}

impl UpcCheck {
    pub fn is_valid(&self) -> bool {
        matches!(self, UpcCheck::Valid)
    }
}

/// Mod-10 check digit for the digits preceding it.
///
/// Weights alternate 3, 1 starting from the digit nearest the check digit,
/// which for a 12-digit UPC-A is the same as weighting odd positions by 3.
pub fn check_digit(body: &[u8]) -> u8 {
    let sum: u32 = body
        .iter()
        .rev()
        .enumerate()
        .map(|(i, d)| u32::from(*d) * if i % 2 == 0 { 3 } else { 1 })
        .sum();
    ((10 - sum % 10) % 10) as u8
}

/// Validate a barcode under `scheme`.
pub fn check(upc: &str, scheme: UpcScheme) -> UpcCheck {
    let upc = upc.trim();
    if !upc.chars().all(|c| c.is_ascii_digit()) || upc.is_empty() {
        return UpcCheck::NotNumeric;
    }
    if !scheme.accepts_len(upc.len()) {
        return UpcCheck::BadLength(upc.len());
    }

    let digits: Vec<u8> = upc.bytes().map(|b| b - b'0').collect();
    let (body, last) = digits.split_at(digits.len() - 1);
    let expected = check_digit(body);
    if expected == last[0] {
        UpcCheck::Valid
    } else {
        UpcCheck::Mismatch {
            expected,
            found: last[0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upc_a() {
        assert_eq!(check("036000291452", UpcScheme::UpcA), UpcCheck::Valid);
        assert_eq!(
            check("036000291453", UpcScheme::UpcA),
            UpcCheck::Mismatch {
                expected: 2,
                found: 3
            }
        );
        assert_eq!(check("012345678905", UpcScheme::UpcA), UpcCheck::Valid);
    }

    #[test]
    fn test_lengths_by_scheme() {
        // EAN-13
        assert_eq!(check("4006381333931", UpcScheme::UpcA), UpcCheck::BadLength(13));
        assert_eq!(check("4006381333931", UpcScheme::Gtin), UpcCheck::Valid);
        // GTIN-8
        assert_eq!(check("96385074", UpcScheme::Gtin), UpcCheck::Valid);
    }

    #[test]
    fn test_not_numeric() {
        assert_eq!(check("03600029145X", UpcScheme::UpcA), UpcCheck::NotNumeric);
        assert_eq!(check("", UpcScheme::UpcA), UpcCheck::NotNumeric);
    }
}
