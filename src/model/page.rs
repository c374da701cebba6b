//! Page primitives: the decoded form of one PDF page handed to the tiers.
//!
//! Coordinates use a top-left origin with `y` growing downward, so a token's
//! `top` is smaller than its `bottom` and "below" means a larger `top`.

use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in page coordinates (points).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge
    pub x0: f32,
    /// Top edge
    pub top: f32,
    /// Right edge
    pub x1: f32,
    /// Bottom edge
    pub bottom: f32,
}

impl BoundingBox {
    /// Create a bounding box from its edges.
    pub fn new(x0: f32, top: f32, x1: f32, bottom: f32) -> Self {
        Self {
            x0,
            top,
            x1,
            bottom,
        }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    /// Horizontal center.
    pub fn center_x(&self) -> f32 {
        (self.x0 + self.x1) / 2.0
    }

    /// Vertical center, used to decide whether tokens share a text line.
    pub fn center_y(&self) -> f32 {
        (self.top + self.bottom) / 2.0
    }

    /// Whether the horizontal extents of the two boxes overlap.
    pub fn overlaps_horizontally(&self, other: &BoundingBox) -> bool {
        self.x0 <= other.x1 && other.x0 <= self.x1
    }

    /// Smallest box containing both.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            x0: self.x0.min(other.x0),
            top: self.top.min(other.top),
            x1: self.x1.max(other.x1),
            bottom: self.bottom.max(other.bottom),
        }
    }
}

/// A positioned word.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordToken {
    /// The word text (never contains whitespace)
    pub text: String,
    /// Where the word sits on the page
    pub bbox: BoundingBox,
}

impl WordToken {
    /// Create a word token from its text and edges.
    pub fn new(text: impl Into<String>, x0: f32, top: f32, x1: f32, bottom: f32) -> Self {
        Self {
            text: text.into(),
            bbox: BoundingBox::new(x0, top, x1, bottom),
        }
    }
}

/// A table detected on a page: a grid of optional cell strings.
///
/// `None` means the cell position exists in the grid but holds no text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageTable {
    /// Rows of cells, top to bottom
    pub rows: Vec<Vec<Option<String>>>,
}

impl PageTable {
    /// Create a table from rows of cells.
    pub fn new(rows: Vec<Vec<Option<String>>>) -> Self {
        Self { rows }
    }

    /// Build a table from plain strings, mapping blank strings to `None`.
    pub fn from_strings<R, C>(rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: AsRef<str>,
    {
        let rows = rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|cell| {
                        let cell = cell.as_ref().trim();
                        (!cell.is_empty()).then(|| cell.to_string())
                    })
                    .collect()
            })
            .collect();
        Self { rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Widest row length.
    pub fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Cell text, `None` when out of range or empty.
    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .and_then(|c| c.as_deref())
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Everything the tiers know about one page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PagePrimitive {
    /// Page index (0-based, stable document order)
    pub index: usize,
    /// Page width in points
    pub width: f32,
    /// Page height in points
    pub height: f32,
    /// Positioned words in reading order
    pub words: Vec<WordToken>,
    /// Detected tables
    pub tables: Vec<PageTable>,
    /// Raw page text
    pub text: String,
}

impl PagePrimitive {
    /// Create an empty US Letter page.
    pub fn new(index: usize) -> Self {
        Self {
            index,
            width: 612.0,
            height: 792.0,
            ..Default::default()
        }
    }

    pub fn with_words(mut self, words: Vec<WordToken>) -> Self {
        self.words = words;
        self
    }

    pub fn with_table(mut self, table: PageTable) -> Self {
        self.tables.push(table);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Whether the page carries no usable primitives at all.
    pub fn is_blank(&self) -> bool {
        self.words.is_empty() && self.tables.is_empty() && self.text.trim().is_empty()
    }
}
