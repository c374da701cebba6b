//! Decoding options for the page adapter.

use serde::{Deserialize, Serialize};

use super::table_detector::TableDetectorConfig;

/// Options for decoding a PDF into page primitives.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    /// Error handling mode
    pub error_mode: ErrorMode,

    /// Password for encrypted documents
    pub password: Option<String>,

    /// Stream-mode table detection settings
    pub tables: TableDetectorConfig,
}

impl ParseOptions {
    /// Create new parse options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set error mode.
    pub fn with_error_mode(mut self, mode: ErrorMode) -> Self {
        self.error_mode = mode;
        self
    }

    /// Enable lenient mode (pages that fail to decode come back blank).
    pub fn lenient(mut self) -> Self {
        self.error_mode = ErrorMode::Lenient;
        self
    }

    /// Set password for encrypted documents.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_tables(mut self, tables: TableDetectorConfig) -> Self {
        self.tables = tables;
        self
    }
}

/// Error handling mode during decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorMode {
    /// Fail on any page error
    #[default]
    Strict,
    /// Skip undecodable pages and continue
    Lenient,
}
