//! Position tier: fields reconstructed from word geometry.
//!
//! Summary fields are found by locating a label among the words of a line
//! and taking the nearest phrase to its right, or directly below it. Line
//! items are found by locating the column header band, deriving a horizontal
//! range per column from the header positions and clustering the words below
//! into row bands. A grid printed without a header gets its columns from
//! word starts that recur across the bands holding a UPC.

use std::collections::{BTreeMap, BTreeSet};

use crate::model::{BoundingBox, Field, PagePrimitive, PartialRecord, Provenance, Tier, WordToken};

use super::options::{ExtractOptions, LayoutTolerances};
use super::rows::{finish_rows, is_footer_row, RowCells, RowDraft};
use super::sizes::SizeVocabulary;
use super::synonyms::{ColumnKind, SynonymTable};
use super::values::{parse_money, parse_quantity, SummaryValue};
use super::{label_provenance, Extractor};

/// Words sharing a vertical center, left to right.
type Band<'a> = Vec<&'a WordToken>;

/// Extracts summary fields and line items from positioned words.
pub struct PositionExtractor<'a> {
    synonyms: &'a SynonymTable,
    sizes: &'a SizeVocabulary,
    layout: &'a LayoutTolerances,
}

impl<'a> PositionExtractor<'a> {
    pub fn new(options: &'a ExtractOptions) -> Self {
        Self {
            synonyms: &options.synonyms,
            sizes: &options.size_vocabulary,
            layout: &options.layout,
        }
    }

    /// Line items from every page, plus the vertical extent of the item
    /// region on each page so label search can skip it.
    fn extract_items(&self, pages: &[PagePrimitive]) -> (Vec<RowDraft>, Vec<Option<(f32, f32)>>) {
        let mut drafts = Vec::new();
        let mut regions = Vec::with_capacity(pages.len());
        let mut carried: Option<Vec<ColumnRange>> = None;

        for page in pages {
            let header = self.find_header(&page.words);
            let (columns, header_box, below) = match header {
                Some((cells, bbox)) => {
                    let columns = column_ranges(&cells, self.layout.edge_column_margin);
                    log::debug!(
                        "page {}: item header with {} columns at y={:.1}",
                        page.index,
                        columns.len(),
                        bbox.top
                    );
                    carried = Some(columns.clone());
                    (columns, Some(bbox), bbox.bottom)
                }
                None => {
                    let inferred = match &carried {
                        Some(columns) => Some((columns.clone(), f32::NEG_INFINITY)),
                        None => self.infer_columns(page),
                    };
                    match inferred {
                        Some((columns, below)) => (columns, None, below),
                        None => {
                            regions.push(None);
                            continue;
                        }
                    }
                }
            };

            let before = drafts.len();
            let extent = self.read_rows(page, &columns, below, &mut drafts);
            log::debug!("page {}: {} item rows", page.index, drafts.len() - before);

            regions.push(match (header_box, extent) {
                (Some(h), Some((_, bottom))) => Some((h.top, bottom)),
                (Some(h), None) => Some((h.top, h.bottom)),
                (None, extent) => extent,
            });
        }

        (drafts, regions)
    }

    /// The first band near the top of the page that names the quantity,
    /// product id and UPC columns and at least one money column.
    fn find_header(&self, words: &[WordToken]) -> Option<(Vec<HeaderCell>, BoundingBox)> {
        let bands = group_bands(words, self.layout.header_tolerance);
        bands
            .iter()
            .take(self.layout.header_search_bands)
            .find_map(|band| {
                let cells = self.header_cells(band);
                let has = |kind| cells.iter().any(|c| c.kind == kind);
                let complete = has(ColumnKind::Quantity)
                    && has(ColumnKind::ProductId)
                    && has(ColumnKind::Upc)
                    && (has(ColumnKind::UnitPrice) || has(ColumnKind::LineTotal));
                complete.then(|| (cells, band_box(band)))
            })
    }

    /// Columns for an item grid without a header row.
    ///
    /// Word starts are bucketed across the bands that hold a bare barcode;
    /// starts shared by at least `min_item_bands` bands become columns, typed
    /// by the text the bands put under them. Returns the columns and the top
    /// of the first item band.
    fn infer_columns(&self, page: &PagePrimitive) -> Option<(Vec<ColumnRange>, f32)> {
        let bands = group_bands(&page.words, self.layout.line_tolerance);
        let item_bands: Vec<&Band<'_>> = bands
            .iter()
            .filter(|band| band.iter().any(|w| is_code(&w.text)))
            .collect();
        let min_bands = self.layout.min_item_bands.max(2);
        if item_bands.len() < min_bands {
            return None;
        }

        let bucket = self.layout.column_bucket.max(1.0);
        let mut start_counts: BTreeMap<i32, usize> = BTreeMap::new();
        for band in &item_bands {
            // Count each bucket once per band
            let buckets: BTreeSet<i32> = band
                .iter()
                .map(|w| (w.bbox.x0 / bucket).round() as i32)
                .collect();
            for b in buckets {
                *start_counts.entry(b).or_insert(0) += 1;
            }
        }

        let mut starts: Vec<f32> = Vec::new();
        for (b, count) in start_counts {
            if count < min_bands {
                continue;
            }
            let x = b as f32 * bucket;
            match starts.last() {
                Some(last) if x - last <= self.layout.word_gap => {}
                _ => starts.push(x),
            }
        }

        let ranges: Vec<(f32, f32)> = starts
            .iter()
            .enumerate()
            .map(|(i, x)| {
                let right = starts.get(i + 1).map_or(f32::INFINITY, |next| next - bucket);
                (x - bucket, right)
            })
            .collect();
        let samples: Vec<Vec<String>> = ranges
            .iter()
            .map(|(left, right)| {
                item_bands
                    .iter()
                    .filter_map(|band| {
                        let text = band
                            .iter()
                            .filter(|w| (*left..*right).contains(&w.bbox.center_x()))
                            .map(|w| w.text.as_str())
                            .collect::<Vec<_>>()
                            .join(" ");
                        (!text.is_empty()).then_some(text)
                    })
                    .collect()
            })
            .collect();

        let kinds = kinds_by_content(&samples);
        let has = |kind| kinds.contains(&Some(kind));
        let priced = has(ColumnKind::Quantity) || has(ColumnKind::LineTotal);
        if !has(ColumnKind::Upc) || !priced {
            log::debug!("page {}: no typed item columns without a header", page.index);
            return None;
        }

        let columns: Vec<ColumnRange> = ranges
            .into_iter()
            .zip(kinds)
            .filter_map(|((left, right), kind)| kind.map(|kind| ColumnRange { kind, left, right }))
            .collect();
        let top = band_box(item_bands[0]).top;
        log::debug!(
            "page {}: {} item columns inferred from {} bands",
            page.index,
            columns.len(),
            item_bands.len()
        );
        Some((columns, top))
    }

    /// Column headers in a band. Two adjacent words are tried as one header
    /// ("Unit Price") before each word on its own.
    fn header_cells(&self, band: &[&WordToken]) -> Vec<HeaderCell> {
        let mut cells: Vec<HeaderCell> = Vec::new();
        let push = |cells: &mut Vec<HeaderCell>, kind, bbox: BoundingBox| {
            if !cells.iter().any(|c| c.kind == kind) {
                cells.push(HeaderCell { kind, bbox });
            }
        };

        let mut i = 0;
        while i < band.len() {
            let word = band[i];
            if let Some(next) = band.get(i + 1) {
                if next.bbox.x0 - word.bbox.x1 <= self.layout.word_gap {
                    let pair = format!("{} {}", word.text, next.text);
                    if let Some(m) = self.synonyms.lookup_column(&pair) {
                        push(&mut cells, m.key, word.bbox.union(&next.bbox));
                        i += 2;
                        continue;
                    }
                }
            }
            if let Some(kind) = self.synonyms.match_column(&word.text) {
                push(&mut cells, kind, word.bbox);
            }
            i += 1;
        }

        cells
    }

    /// Read item rows below `below`. Returns the vertical extent of the rows read.
    fn read_rows(
        &self,
        page: &PagePrimitive,
        columns: &[ColumnRange],
        below: f32,
        drafts: &mut Vec<RowDraft>,
    ) -> Option<(f32, f32)> {
        let words = page.words.iter().filter(|w| w.bbox.center_y() > below);
        let bands = group_bands(words, self.layout.line_tolerance);

        let page_start = drafts.len();
        let mut extent: Option<(f32, f32)> = None;

        for band in &bands {
            let bbox = band_box(band);
            if is_footer_row(&band_text(band)) {
                log::debug!("page {}: footer row ends the item table", page.index);
                break;
            }

            let cells = assign_cells(band, columns);
            let Some(draft) = RowDraft::from_cells(&cells, self.sizes) else {
                continue;
            };

            if draft.has_key() {
                drafts.push(draft);
                extent = Some(extent.map_or((bbox.top, bbox.bottom), |(top, _)| (top, bbox.bottom)));
                continue;
            }

            // Continuation line: description text under the previous row
            let text = continuation_text(&cells);
            let near = extent.is_some_and(|(_, bottom)| bbox.top - bottom <= self.layout.max_vertical_gap);
            match (text, drafts.len() > page_start && near) {
                (Some(text), true) => {
                    if let Some(prev) = drafts.last_mut() {
                        let item = &mut prev.item;
                        item.description = Some(match item.description.take() {
                            Some(desc) => format!("{} {}", desc, text),
                            None => text,
                        });
                        item.size = self
                            .sizes
                            .infer(item.description.as_deref(), item.product_id.as_deref());
                    }
                    extent = extent.map(|(top, _)| (top, bbox.bottom));
                }
                _ => log::debug!("page {}: skipping band without item key", page.index),
            }
        }

        extent
    }

    /// Labelled summary values on one page, skipping the item region.
    fn page_summary(
        &self,
        page: &PagePrimitive,
        region: Option<(f32, f32)>,
    ) -> Vec<(Field, SummaryValue, Provenance)> {
        let outside = |w: &&WordToken| {
            region.map_or(true, |(top, bottom)| {
                let cy = w.bbox.center_y();
                cy < top || cy > bottom
            })
        };
        let lines = group_bands(page.words.iter().filter(outside), self.layout.header_tolerance);

        let mut found = Vec::new();
        for (idx, line) in lines.iter().enumerate() {
            let hits = self.find_labels(line);
            let starts: Vec<usize> = hits.iter().map(|h| h.start).collect();

            for hit in &hits {
                let value = hit
                    .inline
                    .as_deref()
                    .and_then(|v| SummaryValue::accept(hit.field, v))
                    .or_else(|| {
                        self.value_right(line, hit, &starts)
                            .and_then(|v| SummaryValue::accept(hit.field, &v))
                    })
                    .or_else(|| {
                        self.value_below(&lines[idx + 1..], hit)
                            .and_then(|v| SummaryValue::accept(hit.field, &v))
                    });

                if let Some(value) = value {
                    log::debug!("page {}: {} found by label", page.index, hit.field);
                    found.push((hit.field, value, label_provenance(Tier::Position, hit.exact)));
                }
            }
        }

        found
    }

    /// Labels in a line, longest match first at each position.
    fn find_labels(&self, line: &[&WordToken]) -> Vec<LabelHit> {
        let max_words = self.synonyms.max_label_words();
        let mut hits = Vec::new();
        let mut i = 0;

        'words: while i < line.len() {
            let longest = max_words.min(line.len() - i);
            for n in (1..=longest).rev() {
                let window = &line[i..i + n];
                let contiguous = window
                    .windows(2)
                    .all(|pair| pair[1].bbox.x0 - pair[0].bbox.x1 <= self.layout.word_gap);
                if !contiguous {
                    continue;
                }

                let joined = window.iter().map(|w| w.text.as_str()).collect::<Vec<_>>().join(" ");
                let split = joined
                    .split_once(':')
                    .map(|(label, rest)| (label.to_string(), rest.trim().to_string()));
                let (label, inline) = match split {
                    // Only the last word may carry the colon ("PO Number:12345")
                    Some((label, rest)) if !window[..n - 1].iter().any(|w| w.text.contains(':')) => {
                        (label, (!rest.is_empty()).then_some(rest))
                    }
                    Some(_) => continue,
                    None => (joined, None),
                };

                if let Some(m) = self.synonyms.lookup_label(&label) {
                    let bbox = window
                        .iter()
                        .skip(1)
                        .fold(window[0].bbox, |acc, w| acc.union(&w.bbox));
                    hits.push(LabelHit {
                        field: m.key,
                        exact: m.exact,
                        start: i,
                        end: i + n,
                        bbox,
                        inline,
                    });
                    i += n;
                    continue 'words;
                }
            }
            i += 1;
        }

        hits
    }

    /// Phrase to the right of a label on the same line.
    fn value_right(&self, line: &[&WordToken], hit: &LabelHit, label_starts: &[usize]) -> Option<String> {
        let first = line.get(hit.end)?;
        if label_starts.contains(&hit.end)
            || first.bbox.x0 - hit.bbox.x1 > self.layout.max_horizontal_gap
        {
            return None;
        }
        Some(self.phrase(line, hit.end, label_starts))
    }

    /// Phrase starting under a label, in the first line below it.
    fn value_below(&self, lines_below: &[Band<'_>], hit: &LabelHit) -> Option<String> {
        let line = lines_below.first()?;
        if band_box(line).top - hit.bbox.bottom > self.layout.max_vertical_gap {
            return None;
        }
        let start = line.iter().position(|w| {
            w.bbox.x1 >= hit.bbox.x0 - self.layout.word_gap
                && w.bbox.x0 <= hit.bbox.x1 + self.layout.word_gap
        })?;
        // Labels on the line below are values of nothing
        let starts: Vec<usize> = self.find_labels(line).iter().map(|h| h.start).collect();
        if starts.contains(&start) {
            return None;
        }
        Some(self.phrase(line, start, &starts))
    }

    /// Words from `start` while the gaps stay small, stopping at a label.
    fn phrase(&self, line: &[&WordToken], start: usize, label_starts: &[usize]) -> String {
        let mut words = vec![line[start].text.as_str()];
        for j in start + 1..line.len() {
            if label_starts.contains(&j) || line[j].bbox.x0 - line[j - 1].bbox.x1 > self.layout.word_gap {
                break;
            }
            words.push(line[j].text.as_str());
        }
        words.join(" ")
    }
}

impl Extractor for PositionExtractor<'_> {
    fn tier(&self) -> Tier {
        Tier::Position
    }

    fn extract(&self, pages: &[PagePrimitive], current: &PartialRecord) -> PartialRecord {
        let mut found = PartialRecord::new();
        let (drafts, regions) = self.extract_items(pages);

        if !current.is_set(Field::Orders) {
            let (items, issues) = finish_rows(drafts);
            found.set_orders(items, issues, Provenance::from_tier(Tier::Position));
        }

        if Field::SUMMARY.iter().any(|f| !current.is_set(*f)) {
            let mut totals = Vec::with_capacity(pages.len());
            for (page, region) in pages.iter().zip(&regions) {
                let mut page_totals = Vec::new();
                for (field, value, provenance) in self.page_summary(page, *region) {
                    if field == Field::TotalAmount {
                        page_totals.push((value, provenance));
                    } else {
                        value.apply(field, &mut found, provenance);
                    }
                }
                totals.push(page_totals);
            }
            // The grand total sits at the end of the document
            for (value, provenance) in totals.into_iter().rev().flatten() {
                value.apply(Field::TotalAmount, &mut found, provenance);
            }
        }

        found
    }
}

/// A column header word (or pair) and where it sits.
#[derive(Debug, Clone, Copy)]
struct HeaderCell {
    kind: ColumnKind,
    bbox: BoundingBox,
}

/// Horizontal range owned by a column.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ColumnRange {
    kind: ColumnKind,
    left: f32,
    right: f32,
}

#[derive(Debug, Clone)]
struct LabelHit {
    field: Field,
    exact: bool,
    /// First word index of the label within its line
    start: usize,
    /// One past the last word index
    end: usize,
    bbox: BoundingBox,
    /// Value glued to the label by a colon
    inline: Option<String>,
}

/// Column ranges from header positions.
///
/// Neighbouring value columns split at the midpoint of their header
/// centers. A free-text column owns everything between its neighbours'
/// header edges, since descriptions start left of and run past their header.
fn column_ranges(cells: &[HeaderCell], margin: f32) -> Vec<ColumnRange> {
    let mut cells = cells.to_vec();
    cells.sort_by(|a, b| a.bbox.x0.total_cmp(&b.bbox.x0));

    let boundary = |a: &HeaderCell, b: &HeaderCell| {
        if a.kind.is_text() {
            b.bbox.x0
        } else if b.kind.is_text() {
            a.bbox.x1
        } else {
            (a.bbox.center_x() + b.bbox.center_x()) / 2.0
        }
    };

    cells
        .iter()
        .enumerate()
        .map(|(i, cell)| {
            let left = match i {
                0 if cell.kind.is_text() => cell.bbox.x0 - margin,
                0 => cell.bbox.center_x() - margin,
                _ => boundary(&cells[i - 1], cell),
            };
            let right = match cells.get(i + 1) {
                Some(next) => boundary(cell, next),
                None if cell.kind.is_text() => cell.bbox.x1 + margin,
                None => cell.bbox.center_x() + margin,
            };
            ColumnRange {
                kind: cell.kind,
                left,
                right,
            }
        })
        .collect()
}

/// Distribute a band's words over the columns by horizontal center.
fn assign_cells(band: &[&WordToken], columns: &[ColumnRange]) -> RowCells {
    let mut parts: BTreeMap<ColumnKind, Vec<&str>> = BTreeMap::new();
    for word in band {
        let cx = word.bbox.center_x();
        if let Some(col) = columns.iter().find(|c| cx >= c.left && cx < c.right) {
            parts.entry(col.kind).or_default().push(word.text.as_str());
        }
    }

    parts
        .into_iter()
        .map(|(kind, words)| {
            let sep = match kind {
                ColumnKind::ProductId
                | ColumnKind::DevCode
                | ColumnKind::UnitPrice
                | ColumnKind::LineTotal => "",
                _ => " ",
            };
            (kind, words.join(sep))
        })
        .collect()
}

/// A bare 8 to 14 digit barcode.
fn is_code(text: &str) -> bool {
    (8..=14).contains(&text.len()) && text.chars().all(|c| c.is_ascii_digit())
}

/// A single-token code holding a digit, such as a SKU or dev code.
fn is_identifier(text: &str) -> bool {
    !text.contains(' ')
        && text.chars().any(|c| c.is_ascii_digit())
        && text.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '/')
}

/// Column roles from sample cell text, left to right.
///
/// The first barcode column is the UPC and a second one the HTS code. The
/// rightmost money column is the line total and the one before it the unit
/// price. Codes become product id then dev code. With several text columns
/// a leading single-word one is the brand.
fn kinds_by_content(samples: &[Vec<String>]) -> Vec<Option<ColumnKind>> {
    let mut kinds: Vec<Option<ColumnKind>> = samples
        .iter()
        .map(|cells| {
            let all = |check: &dyn Fn(&str) -> bool| {
                !cells.is_empty() && cells.iter().all(|c| check(c.as_str()))
            };
            if all(&is_code) {
                Some(ColumnKind::Upc)
            } else if all(&|c| {
                !c.contains('.') && parse_quantity(c).is_some_and(|q| (0..10_000).contains(&q))
            }) {
                Some(ColumnKind::Quantity)
            } else if all(&|c| c.contains('.') && parse_money(c).is_some()) {
                Some(ColumnKind::LineTotal)
            } else if all(&is_identifier) {
                Some(ColumnKind::ProductId)
            } else if cells.is_empty() {
                None
            } else {
                Some(ColumnKind::Description)
            }
        })
        .collect();

    let mut seen: Vec<ColumnKind> = Vec::new();
    for kind in kinds.iter_mut() {
        let Some(current) = *kind else {
            continue;
        };
        let repeat = seen.contains(&current);
        *kind = match current {
            ColumnKind::Upc if repeat => {
                (!seen.contains(&ColumnKind::HtsCode)).then_some(ColumnKind::HtsCode)
            }
            ColumnKind::ProductId if repeat => {
                (!seen.contains(&ColumnKind::DevCode)).then_some(ColumnKind::DevCode)
            }
            ColumnKind::Quantity if repeat => None,
            _ => Some(current),
        };
        if let Some(k) = *kind {
            seen.push(k);
        }
    }

    let money: Vec<usize> = (0..kinds.len())
        .filter(|&i| kinds[i] == Some(ColumnKind::LineTotal))
        .collect();
    if let Some((_, rest)) = money.split_last() {
        for (n, &i) in rest.iter().rev().enumerate() {
            kinds[i] = (n == 0).then_some(ColumnKind::UnitPrice);
        }
    }

    let text: Vec<usize> = (0..kinds.len())
        .filter(|&i| kinds[i] == Some(ColumnKind::Description))
        .collect();
    if let [first, _, ..] = text.as_slice() {
        if samples[*first].iter().all(|c| !c.contains(' ')) {
            kinds[*first] = Some(ColumnKind::Brand);
        }
    }

    kinds
}

fn continuation_text(cells: &RowCells) -> Option<String> {
    let text: Vec<&str> = cells
        .iter()
        .filter(|(kind, text)| kind.is_text() && !text.trim().is_empty())
        .map(|(_, text)| text.trim())
        .collect();
    (!text.is_empty()).then(|| text.join(" "))
}

/// Cluster words into bands whose vertical centers lie within `tolerance`
/// of the band's first word.
fn group_bands<'a>(words: impl IntoIterator<Item = &'a WordToken>, tolerance: f32) -> Vec<Band<'a>> {
    let mut sorted: Vec<&WordToken> = words.into_iter().collect();
    sorted.sort_by(|a, b| {
        a.bbox
            .center_y()
            .total_cmp(&b.bbox.center_y())
            .then(a.bbox.x0.total_cmp(&b.bbox.x0))
    });

    let mut bands: Vec<Band<'a>> = Vec::new();
    let mut anchor = f32::NEG_INFINITY;
    for word in sorted {
        let cy = word.bbox.center_y();
        match bands.last_mut() {
            Some(band) if cy - anchor <= tolerance => band.push(word),
            _ => {
                anchor = cy;
                bands.push(vec![word]);
            }
        }
    }

    for band in &mut bands {
        band.sort_by(|a, b| a.bbox.x0.total_cmp(&b.bbox.x0));
    }
    bands
}

fn band_box(band: &[&WordToken]) -> BoundingBox {
    band.iter()
        .skip(1)
        .fold(band[0].bbox, |acc, w| acc.union(&w.bbox))
}

fn band_text(band: &[&WordToken]) -> String {
    band.iter().map(|w| w.text.as_str()).collect::<Vec<_>>().join(" ")
}
