//! Table detection using text position analysis (stream mode).
//!
//! Purchase orders rarely draw ruling lines around their grids, so tables are
//! found from text alignment alone: spans are grouped into rows, recurring
//! left edges become column boundaries, and runs of rows that align with those
//! boundaries become a table.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::model::PageTable;

use super::layout::TextSpan;

/// A row of text spans sharing a baseline.
#[derive(Debug, Clone)]
pub struct TableRowData {
    /// Average baseline of the row (PDF coords)
    pub y: f32,
    /// Spans in this row, sorted by X
    pub spans: Vec<TextSpan>,
}

/// Table detector configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableDetectorConfig {
    /// Minimum number of rows to consider as table
    pub min_rows: usize,
    /// Minimum number of columns to consider as table
    pub min_columns: usize,
    /// Maximum number of columns (above this, likely word-level splitting)
    pub max_columns: usize,
    /// Y tolerance for grouping spans into rows (fraction of font size)
    pub y_tolerance_factor: f32,
    /// Minimum column alignment ratio (0.0-1.0)
    pub min_alignment_ratio: f32,
    /// Minimum gap between columns (points)
    pub min_column_gap: f32,
    /// Width of the buckets left edges are snapped into (points)
    pub bucket_size: f32,
}

impl Default for TableDetectorConfig {
    fn default() -> Self {
        Self {
            min_rows: 2,
            min_columns: 3,
            max_columns: 14,
            y_tolerance_factor: 0.4,
            min_alignment_ratio: 0.3,
            min_column_gap: 15.0,
            bucket_size: 5.0,
        }
    }
}

/// Detects tables in a list of text spans.
#[derive(Debug, Clone, Default)]
pub struct TableDetector {
    config: TableDetectorConfig,
}

impl TableDetector {
    /// Create a new table detector with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new table detector with custom configuration.
    pub fn with_config(config: TableDetectorConfig) -> Self {
        Self { config }
    }

    /// Detect tables in the given spans, top to bottom.
    pub fn detect(&self, spans: &[TextSpan]) -> Vec<PageTable> {
        if spans.len() < self.config.min_rows * self.config.min_columns {
            log::debug!("TableDetector: not enough spans ({})", spans.len());
            return vec![];
        }

        let rows = self.group_into_rows(spans);
        if rows.len() < self.config.min_rows {
            return vec![];
        }

        let columns = self.detect_columns(&rows);
        log::debug!(
            "TableDetector: {} rows, columns at {:?}",
            rows.len(),
            columns
        );
        if columns.len() < self.config.min_columns {
            return vec![];
        }

        let mut tables = Vec::new();
        for (start, end) in self.find_table_regions(&rows, &columns) {
            let region = &rows[start..=end];

            // Re-detect columns for this specific region
            let region_columns = self.detect_columns(region);
            if region_columns.len() < self.config.min_columns {
                continue;
            }
            if region_columns.len() > self.config.max_columns {
                log::debug!(
                    "TableDetector: skipping region, too many columns ({} > {})",
                    region_columns.len(),
                    self.config.max_columns
                );
                continue;
            }

            tables.push(self.to_page_table(region, &region_columns));
        }

        log::debug!("TableDetector: found {} tables", tables.len());
        tables
    }

    /// Group spans into rows by baseline.
    fn group_into_rows(&self, spans: &[TextSpan]) -> Vec<TableRowData> {
        // Top of page first (descending PDF y), then left to right
        let mut sorted = spans.to_vec();
        sorted.sort_by(|a, b| b.y.total_cmp(&a.y).then(a.x.total_cmp(&b.x)));

        let mut rows: Vec<TableRowData> = Vec::new();
        let mut current: Vec<TextSpan> = Vec::new();
        let mut current_y: Option<f32> = None;

        for span in sorted {
            let tolerance = span.font_size * self.config.y_tolerance_factor;
            match current_y {
                Some(y) if (span.y - y).abs() <= tolerance => current.push(span),
                _ => {
                    if !current.is_empty() {
                        rows.push(make_row(std::mem::take(&mut current)));
                    }
                    current_y = Some(span.y);
                    current.push(span);
                }
            }
        }
        if !current.is_empty() {
            rows.push(make_row(current));
        }

        rows
    }

    /// Detect column boundaries from recurring left edges.
    ///
    /// Rows with two or more spans are the evidence; when too few exist every
    /// row is counted instead.
    fn detect_columns(&self, rows: &[TableRowData]) -> Vec<f32> {
        let multi_span_rows: Vec<&TableRowData> =
            rows.iter().filter(|r| r.spans.len() >= 2).collect();
        let evidence: Vec<&TableRowData> = if multi_span_rows.len() >= self.config.min_rows {
            multi_span_rows
        } else {
            rows.iter().collect()
        };
        if evidence.is_empty() {
            return vec![];
        }

        let bucket_size = self.config.bucket_size;
        let mut edge_counts: HashMap<i32, usize> = HashMap::new();
        for row in &evidence {
            // Count each bucket once per row
            let buckets: HashSet<i32> = row
                .spans
                .iter()
                .map(|s| (s.x / bucket_size).round() as i32)
                .collect();
            for bucket in buckets {
                *edge_counts.entry(bucket).or_insert(0) += 1;
            }
        }

        let min_occurrences =
            ((evidence.len() as f32 * self.config.min_alignment_ratio) as usize).max(2);

        let mut edges: Vec<f32> = edge_counts
            .iter()
            .filter(|(_, count)| **count >= min_occurrences)
            .map(|(bucket, _)| *bucket as f32 * bucket_size)
            .collect();
        edges.sort_by(f32::total_cmp);

        let mut merged: Vec<f32> = Vec::new();
        for edge in edges {
            match merged.last() {
                Some(last) if edge - last < self.config.min_column_gap => {}
                _ => merged.push(edge),
            }
        }
        merged
    }

    /// Find contiguous row regions that align with the columns.
    fn find_table_regions(&self, rows: &[TableRowData], columns: &[f32]) -> Vec<(usize, usize)> {
        let mut regions = Vec::new();
        let mut start: Option<usize> = None;

        for (i, row) in rows.iter().enumerate() {
            if self.alignment_score(row, columns) >= self.config.min_alignment_ratio {
                start.get_or_insert(i);
                continue;
            }
            if let Some(s) = start.take() {
                if i - s >= self.config.min_rows {
                    regions.push((s, i - 1));
                }
            }
        }
        if let Some(s) = start {
            if rows.len() - s >= self.config.min_rows {
                regions.push((s, rows.len() - 1));
            }
        }

        regions
    }

    /// Fraction of a row's spans that start on a column edge.
    fn alignment_score(&self, row: &TableRowData, columns: &[f32]) -> f32 {
        if row.spans.is_empty() || columns.is_empty() {
            return 0.0;
        }
        let tolerance = self.config.bucket_size;
        let aligned = row
            .spans
            .iter()
            .filter(|span| columns.iter().any(|col| (span.x - col).abs() <= tolerance))
            .count();
        aligned as f32 / row.spans.len() as f32
    }

    /// Lay a region's spans out on the column grid.
    fn to_page_table(&self, rows: &[TableRowData], columns: &[f32]) -> PageTable {
        let right_x = rows
            .iter()
            .flat_map(|r| r.spans.iter())
            .map(TextSpan::right)
            .fold(0.0_f32, f32::max);

        let grid = rows
            .iter()
            .map(|row| {
                let mut cells: Vec<Option<String>> = vec![None; columns.len()];
                for span in &row.spans {
                    let text = span.text.trim();
                    if text.is_empty() {
                        continue;
                    }
                    let col = find_column_for_span(span.x, columns, right_x);
                    match &mut cells[col] {
                        Some(existing) => {
                            existing.push(' ');
                            existing.push_str(text);
                        }
                        slot @ None => *slot = Some(text.to_string()),
                    }
                }
                cells
            })
            .collect();

        PageTable::new(grid)
    }
}

fn make_row(mut spans: Vec<TextSpan>) -> TableRowData {
    spans.sort_by(|a, b| a.x.total_cmp(&b.x));
    let y = spans.iter().map(|s| s.y).sum::<f32>() / spans.len() as f32;
    TableRowData { y, spans }
}

/// Find which column a span belongs to based on its X position.
fn find_column_for_span(span_x: f32, columns: &[f32], right_x: f32) -> usize {
    // Spans may start slightly before their column edge
    for (i, &col_start) in columns.iter().enumerate() {
        let col_end = columns.get(i + 1).copied().unwrap_or(right_x + 100.0);
        if span_x >= col_start - 10.0 && span_x < col_end - 10.0 {
            return i;
        }
    }

    columns
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| (span_x - **a).abs().total_cmp(&(span_x - **b).abs()))
        .map(|(i, _)| i)
        .unwrap_or(0)
}
