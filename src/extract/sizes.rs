//! Size vocabulary: canonical size labels, their spellings and SKU size codes.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Longest trailing size phrase considered, in words ("extra extra large").
const MAX_SIZE_WORDS: usize = 4;

/// Known size labels and how they appear in vendor documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizeVocabulary {
    pub version: u32,
    /// Canonical labels in size-sheet column order
    pub labels: Vec<String>,
    /// Normalized spelling -> canonical label
    #[serde(deserialize_with = "normalized_aliases")]
    pub aliases: BTreeMap<String, String>,
    /// Size code at the end of an item SKU -> canonical label
    #[serde(deserialize_with = "uppercase_suffixes")]
    pub sku_suffixes: BTreeMap<String, String>,
}

impl Default for SizeVocabulary {
    fn default() -> Self {
        let labels = [
            "One size", "SS", "S", "M", "L", "XL", "XXL", "0-3m", "3-6m", "6-12m", "12-18m",
            "18-24m", "2T", "3T", "4T", "5", "6", "7", "8", "10", "0-2T", "2T-4T", "2T-5",
            "0-6m", "12-24m",
        ];
        let aliases = [
            ("os", "One size"),
            ("xs", "SS"),
            ("x-s", "SS"),
            ("extrasmall", "SS"),
            ("xtrasmall", "SS"),
            ("exsmall", "SS"),
            ("sm", "S"),
            ("small", "S"),
            ("med", "M"),
            ("medium", "M"),
            ("lg", "L"),
            ("large", "L"),
            ("x-l", "XL"),
            ("extralarge", "XL"),
            ("xtralarge", "XL"),
            ("2xl", "XXL"),
            ("xx-l", "XXL"),
            ("doublexl", "XXL"),
            ("extraextralarge", "XXL"),
        ];
        let sku_suffixes = [
            ("03M00", "0-3m"),
            ("0306M", "3-6m"),
            ("0612M", "6-12m"),
            ("1218M", "12-18m"),
            ("1824M", "18-24m"),
            ("2T000", "2T"),
            ("3T000", "3T"),
            ("4T000", "4T"),
            ("5K000", "5"),
            ("6K000", "6"),
            ("7K000", "7"),
            ("8K000", "8"),
            ("K0000", "10"),
        ];

        Self {
            version: 1,
            labels: labels.iter().map(|s| s.to_string()).collect(),
            aliases: aliases
                .iter()
                .map(|(a, c)| (a.to_string(), c.to_string()))
                .collect(),
            sku_suffixes: sku_suffixes
                .iter()
                .map(|(s, c)| (s.to_string(), c.to_string()))
                .collect(),
        }
    }
}

impl SizeVocabulary {
    /// Canonical label for a size spelling, if it is one.
    pub fn canonical(&self, token: &str) -> Option<&str> {
        let key = normalize_size(token);
        if key.is_empty() {
            return None;
        }
        if let Some(label) = self.labels.iter().find(|l| normalize_size(l) == key) {
            return Some(label.as_str());
        }
        self.aliases.get(&key).map(String::as_str)
    }

    /// Position of a canonical label in sheet order.
    pub fn order_index(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    /// Split a trailing size off a description.
    ///
    /// Returns the description without the size (and its separator) plus the
    /// canonical size, or the description unchanged and `None`.
    pub fn split_description<'a>(&self, description: &'a str) -> (&'a str, Option<&str>) {
        let trimmed = description.trim();
        let word_starts: Vec<usize> = word_starts(trimmed);

        for n in (1..=MAX_SIZE_WORDS.min(word_starts.len())).rev() {
            let start = word_starts[word_starts.len() - n];
            let candidate = trimmed[start..].trim_matches(|c| c == '(' || c == ')');
            if let Some(size) = self.canonical(candidate) {
                let product = trimmed[..start]
                    .trim_end_matches(|c: char| c.is_whitespace() || is_dash(c) || c == '(');
                // A bare size is a size, not a product with a size
                if product.is_empty() {
                    continue;
                }
                return (product, Some(size));
            }
        }

        (trimmed, None)
    }

    /// Size from a SKU's trailing size code (`ABC-0612M` -> `6-12m`).
    pub fn from_sku(&self, sku: &str) -> Option<&str> {
        let sku = sku.trim().to_uppercase();
        self.sku_suffixes
            .iter()
            .find(|(suffix, _)| sku.ends_with(suffix.as_str()))
            .map(|(_, size)| size.as_str())
    }

    /// The style part of a SKU, with any trailing size code removed.
    pub fn style_of<'a>(&self, sku: &'a str) -> &'a str {
        let sku = sku.trim();
        let upper = sku.to_uppercase();
        let Some(suffix) = self
            .sku_suffixes
            .keys()
            .find(|suffix| upper.ends_with(suffix.as_str()) && upper.len() > suffix.len())
        else {
            return sku;
        };
        match sku.get(..sku.len() - suffix.len()) {
            Some(style) => style.trim_end_matches(|c: char| is_dash(c) || c.is_whitespace()),
            None => sku,
        }
    }

    /// Infer a size from the description first, then the SKU.
    pub fn infer(&self, description: Option<&str>, sku: Option<&str>) -> Option<String> {
        description
            .and_then(|d| self.split_description(d).1)
            .or_else(|| sku.and_then(|s| self.from_sku(s)))
            .map(str::to_string)
    }
}

fn normalized_aliases<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, String>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(alias, label)| (normalize_size(&alias), label))
        .collect())
}

fn uppercase_suffixes<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, String>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(suffix, label)| (suffix.trim().to_uppercase(), label))
        .collect())
}

/// Lowercase, drop whitespace and parentheses, unify dashes.
fn normalize_size(token: &str) -> String {
    token
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '(' && *c != ')')
        .map(|c| if is_dash(c) { '-' } else { c })
        .flat_map(char::to_lowercase)
        .collect()
}

fn is_dash(c: char) -> bool {
    matches!(c, '-' | '\u{2013}' | '\u{2014}')
}

/// Byte offsets where whitespace-separated words begin.
fn word_starts(s: &str) -> Vec<usize> {
    let mut starts = Vec::new();
    let mut prev_space = true;
    for (idx, c) in s.char_indices() {
        if !c.is_whitespace() && prev_space {
            starts.push(idx);
        }
        prev_space = c.is_whitespace();
    }
    starts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_spellings() {
        let vocab = SizeVocabulary::default();
        assert_eq!(vocab.canonical("small"), Some("S"));
        assert_eq!(vocab.canonical("6 - 12 M"), Some("6-12m"));
        assert_eq!(vocab.canonical("(3-6m)"), Some("3-6m"));
        assert_eq!(vocab.canonical("2t"), Some("2T"));
        assert_eq!(vocab.canonical("One Size"), Some("One size"));
        assert_eq!(vocab.canonical("Tee"), None);
    }

    #[test]
    fn test_split_description() {
        let vocab = SizeVocabulary::default();
        assert_eq!(
            vocab.split_description("Pink Ruffle Trim Woven Shorts - 6-12m"),
            ("Pink Ruffle Trim Woven Shorts", Some("6-12m"))
        );
        assert_eq!(
            vocab.split_description("Boys Swim Trunks (3-6m)"),
            ("Boys Swim Trunks", Some("3-6m"))
        );
        assert_eq!(
            vocab.split_description("Kids Tee Extra Large"),
            ("Kids Tee", Some("XL"))
        );
        assert_eq!(vocab.split_description("Kids Tee"), ("Kids Tee", None));
        assert_eq!(vocab.split_description("M"), ("M", None));
    }

    #[test]
    fn test_from_sku() {
        let vocab = SizeVocabulary::default();
        assert_eq!(vocab.from_sku("ABC-0612M"), Some("6-12m"));
        assert_eq!(vocab.from_sku("abc-k0000"), Some("10"));
        assert_eq!(vocab.from_sku("ABC-123"), None);
    }

    #[test]
    fn test_style_of() {
        let vocab = SizeVocabulary::default();
        assert_eq!(vocab.style_of("ABC-0612M"), "ABC");
        assert_eq!(vocab.style_of("ABC-123"), "ABC-123");
        assert_eq!(vocab.style_of("0612M"), "0612M");
    }

    #[test]
    fn test_configured_spellings_are_normalized() {
        let vocab: SizeVocabulary = serde_json::from_str(
            r#"{"labels": ["S", "M"], "aliases": {"Petite (S)": "S"}, "sku_suffixes": {"-med": "M"}}"#,
        )
        .unwrap();
        assert_eq!(vocab.canonical("petite s"), Some("S"));
        assert_eq!(vocab.from_sku("ABC-MED"), Some("M"));
    }

    #[test]
    fn test_infer_prefers_description() {
        let vocab = SizeVocabulary::default();
        assert_eq!(
            vocab.infer(Some("Kids Tee 4T"), Some("ABC-0612M")),
            Some("4T".to_string())
        );
        assert_eq!(
            vocab.infer(Some("Kids Tee"), Some("ABC-0612M")),
            Some("6-12m".to_string())
        );
        assert_eq!(vocab.infer(None, None), None);
    }
}
