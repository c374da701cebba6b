//! Validation issues (QA flags) attached to a record.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// What kind of inconsistency was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// A UPC failed its check digit.
    ChecksumFailed,
    /// A total did not match the quantities and prices it is made of.
    ArithmeticMismatch,
    /// A value is absent or could not be parsed.
    MissingField,
    /// A value came from a low-trust tier.
    LowConfidence,
}

impl IssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueKind::ChecksumFailed => "checksum_failed",
            IssueKind::ArithmeticMismatch => "arithmetic_mismatch",
            IssueKind::MissingField => "missing_field",
            IssueKind::LowConfidence => "low_confidence",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How seriously a downstream consumer should take an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

/// A non-fatal, field-addressable finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    /// Record path, e.g. `orders[2].upc` or `summary.total_amount`
    pub path: String,
    pub severity: Severity,
    /// Human-readable explanation
    pub detail: String,
}

impl ValidationIssue {
    pub fn new(
        kind: IssueKind,
        path: impl Into<String>,
        severity: Severity,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            path: path.into(),
            severity,
            detail: detail.into(),
        }
    }

    pub fn checksum_failed(path: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(IssueKind::ChecksumFailed, path, Severity::Warning, detail)
    }

    pub fn arithmetic_mismatch(path: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(IssueKind::ArithmeticMismatch, path, Severity::Error, detail)
    }

    pub fn missing_field(path: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(IssueKind::MissingField, path, Severity::Warning, detail)
    }

    pub fn low_confidence(path: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(IssueKind::LowConfidence, path, Severity::Warning, detail)
    }

    /// Whether this issue concerns `path` or something beneath it.
    pub fn concerns(&self, path: &str) -> bool {
        self.path == path
            || self
                .path
                .strip_prefix(path)
                .is_some_and(|rest| rest.starts_with('.') || rest.starts_with('['))
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} at {}: {}",
            self.severity, self.kind, self.path, self.detail
        )
    }
}

/// Aggregated view of a record's issues.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaReport {
    /// True when no issue of error severity was found
    pub ok: bool,
    pub errors: usize,
    pub warnings: usize,
    /// One line per issue kind, e.g. "2 line items fail UPC check digit"
    pub summary: Vec<String>,
}

impl QaReport {
    /// Summarize issues by kind.
    pub fn from_issues(issues: &[ValidationIssue]) -> Self {
        let errors = issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .count();
        let warnings = issues.len() - errors;

        let mut by_kind: BTreeMap<IssueKind, usize> = BTreeMap::new();
        for issue in issues {
            *by_kind.entry(issue.kind).or_insert(0) += 1;
        }

        let summary = by_kind
            .into_iter()
            .map(|(kind, count)| {
                let noun = if count == 1 { "value" } else { "values" };
                match kind {
                    IssueKind::ChecksumFailed => format!("{} UPC {} fail check digit", count, noun),
                    IssueKind::ArithmeticMismatch => {
                        format!("{} {} where totals do not add up", count, noun)
                    }
                    IssueKind::MissingField => format!("{} missing or unparseable {}", count, noun),
                    IssueKind::LowConfidence => {
                        format!("{} low-confidence {} need review", count, noun)
                    }
                }
            })
            .collect();

        Self {
            ok: errors == 0,
            errors,
            warnings,
            summary,
        }
    }
}
