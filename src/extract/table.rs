//! Table tier: fields from detected table grids.

use crate::model::{
    Field, PagePrimitive, PageTable, PartialRecord, Provenance, SizeBreakdown, Tier,
    ValidationIssue,
};

use super::options::ExtractOptions;
use super::rows::{finish_rows, is_footer_row, RowCells, RowDraft};
use super::sizes::SizeVocabulary;
use super::synonyms::{ColumnKind, SynonymTable};
use super::values::{clean_ws, non_blank, parse_quantity, SummaryValue};
use super::{label_provenance, Extractor};

/// Rows searched for a header at the top of a table.
const HEADER_SEARCH_ROWS: usize = 5;

/// What a table holds, decided by its header row.
#[derive(Debug, Clone, PartialEq)]
enum TableKind {
    Orders {
        header_row: usize,
        columns: Vec<Option<ColumnKind>>,
    },
    Sizes(SizeLayout),
    Other,
}

/// Column roles of a size table.
#[derive(Debug, Clone, PartialEq)]
struct SizeLayout {
    header_row: usize,
    product_col: usize,
    total_col: Option<usize>,
    /// (column, canonical size label)
    size_cols: Vec<(usize, String)>,
}

/// Extracts line items, size breakdowns and labelled summary cells from tables.
pub struct TableExtractor<'a> {
    synonyms: &'a SynonymTable,
    sizes: &'a SizeVocabulary,
}

impl<'a> TableExtractor<'a> {
    pub fn new(options: &'a ExtractOptions) -> Self {
        Self {
            synonyms: &options.synonyms,
            sizes: &options.size_vocabulary,
        }
    }

    fn classify(&self, table: &PageTable) -> TableKind {
        let width = table.column_count();

        for row in 0..table.row_count().min(HEADER_SEARCH_ROWS) {
            let cells: Vec<Option<&str>> = (0..width).map(|c| table.cell(row, c)).collect();
            let non_empty = cells.iter().flatten().count();
            if non_empty < 2 {
                continue;
            }

            let columns: Vec<Option<ColumnKind>> = cells
                .iter()
                .map(|cell| cell.and_then(|text| self.synonyms.match_column(text)))
                .collect();
            let matched = columns.iter().flatten().count();
            let position = |kind| columns.iter().position(|c| *c == Some(kind));

            if position(ColumnKind::Upc).is_some() && matched * 2 >= non_empty {
                return TableKind::Orders {
                    header_row: row,
                    columns,
                };
            }

            let size_cols: Vec<(usize, String)> = cells
                .iter()
                .enumerate()
                .filter(|(c, _)| columns[*c].is_none())
                .filter_map(|(c, cell)| {
                    cell.and_then(|text| self.sizes.canonical(text))
                        .map(|label| (c, label.to_string()))
                })
                .collect();
            let product_col =
                position(ColumnKind::ProductId).or_else(|| position(ColumnKind::Description));

            if let Some(product_col) = product_col {
                if size_cols.len() >= 2 && size_cols.len() > matched {
                    return TableKind::Sizes(SizeLayout {
                        header_row: row,
                        product_col,
                        total_col: position(ColumnKind::LineTotal),
                        size_cols,
                    });
                }
            }
        }

        TableKind::Other
    }

    /// Line-item drafts from an orders table.
    fn order_rows(&self, table: &PageTable, header_row: usize, columns: &[Option<ColumnKind>]) -> Vec<RowDraft> {
        let mut drafts: Vec<RowDraft> = Vec::new();

        for (r, row) in table.rows.iter().enumerate().skip(header_row + 1) {
            if self.repeats_header(row, columns) {
                continue;
            }

            let mut cells = RowCells::new();
            for (c, kind) in columns.iter().enumerate() {
                let (Some(kind), Some(text)) = (kind, row.get(c).and_then(|v| v.as_deref())) else {
                    continue;
                };
                cells
                    .entry(*kind)
                    .and_modify(|existing| {
                        existing.push(' ');
                        existing.push_str(text);
                    })
                    .or_insert_with(|| text.to_string());
            }

            let Some(draft) = RowDraft::from_cells(&cells, self.sizes) else {
                continue;
            };

            let first_cell = row.iter().flatten().next().map(String::as_str).unwrap_or("");
            if is_footer_row(first_cell) && !draft.item.has_upc() {
                log::debug!("table row {}: discarding footer row", r);
                continue;
            }

            if draft.item.product_id.is_none() && !draft.item.has_upc() {
                // Wrapped description cell continuing the row above
                let text = [ColumnKind::Brand, ColumnKind::Description, ColumnKind::BrandDescription]
                    .iter()
                    .filter_map(|k| cells.get(k).and_then(|t| non_blank(t)))
                    .collect::<Vec<_>>()
                    .join(" ");
                match drafts.last_mut() {
                    Some(prev) if !text.is_empty() => {
                        let item = &mut prev.item;
                        item.description = Some(match item.description.take() {
                            Some(desc) => format!("{} {}", desc, text),
                            None => text,
                        });
                        item.size = self
                            .sizes
                            .infer(item.description.as_deref(), item.product_id.as_deref());
                    }
                    _ => log::debug!("table row {}: no product id or UPC", r),
                }
                continue;
            }

            drafts.push(draft);
        }

        drafts
    }

    /// A header row repeated inside the table body (page breaks).
    fn repeats_header(&self, row: &[Option<String>], columns: &[Option<ColumnKind>]) -> bool {
        let repeated = columns
            .iter()
            .zip(row)
            .filter(|(kind, cell)| {
                kind.is_some()
                    && cell.as_deref().and_then(|t| self.synonyms.match_column(t)) == **kind
            })
            .count();
        repeated >= 2
    }

    /// A size-table row that restates the header: the product cell repeats
    /// the header's, or every size cell spells its own column's label.
    fn repeats_size_header(&self, table: &PageTable, layout: &SizeLayout, row: usize) -> bool {
        let product = table.cell(row, layout.product_col).map(clean_ws);
        let header = table.cell(layout.header_row, layout.product_col).map(clean_ws);
        if let (Some(product), Some(header)) = (product, header) {
            if !product.is_empty() && product.to_lowercase() == header.to_lowercase() {
                return true;
            }
        }

        let cells: Vec<(&str, &str)> = layout
            .size_cols
            .iter()
            .filter_map(|(c, label)| table.cell(row, *c).map(|text| (text.trim(), label.as_str())))
            .filter(|(text, _)| !text.is_empty())
            .collect();
        // Bare numbers are quantities even under numeric size columns
        !cells.is_empty()
            && cells.iter().any(|(text, _)| !text.chars().all(|ch| ch.is_ascii_digit()))
            && cells
                .iter()
                .all(|(text, label)| self.sizes.canonical(text) == Some(*label))
    }

    /// Size breakdowns from a size table, appended to `out`.
    ///
    /// Issue paths index into `out`, which is shared by every size table of
    /// the document.
    fn size_rows(
        &self,
        table: &PageTable,
        layout: &SizeLayout,
        out: &mut Vec<SizeBreakdown>,
        issues: &mut Vec<ValidationIssue>,
    ) {
        for r in layout.header_row + 1..table.row_count() {
            let Some(product_id) = table.cell(r, layout.product_col).map(clean_ws) else {
                continue;
            };
            if is_footer_row(&product_id) {
                continue;
            }
            if self.repeats_size_header(table, layout, r) {
                log::debug!("table row {}: repeated size header", r);
                continue;
            }
            if out.iter().any(|b| b.product_id == product_id) {
                log::debug!("table row {}: repeated size row for {}", r, product_id);
                continue;
            }

            let idx = out.len();
            let path = format!("size_breakdowns[{}]", idx);
            let mut breakdown = SizeBreakdown::new(product_id);
            let mut row_issues = Vec::new();

            for (c, label) in &layout.size_cols {
                let Some(text) = table.cell(r, *c) else {
                    continue;
                };
                match parse_quantity(text).map(u32::try_from) {
                    Some(Ok(0)) => {}
                    Some(Ok(qty)) => breakdown.add(label.as_str(), qty),
                    _ => row_issues.push(ValidationIssue::missing_field(
                        path.as_str(),
                        format!("size {}: unreadable quantity '{}'", label, text),
                    )),
                }
            }

            if let Some(total) = layout
                .total_col
                .and_then(|c| table.cell(r, c))
                .and_then(parse_quantity)
            {
                if row_issues.is_empty() && total != breakdown.total() as i64 {
                    row_issues.push(ValidationIssue::arithmetic_mismatch(
                        path.as_str(),
                        format!("sizes sum to {} but the row total is {}", breakdown.total(), total),
                    ));
                }
            }

            if breakdown.is_empty() && row_issues.is_empty() {
                continue;
            }
            out.push(breakdown);
            issues.extend(row_issues);
        }
    }

    /// Label/value pairs from cells of tables that hold neither items nor sizes.
    ///
    /// A label cell takes its value after a colon in the same cell, from the
    /// next non-empty cell to its right, or from the cell below.
    fn summary_cells(&self, table: &PageTable) -> Vec<(Field, SummaryValue, Provenance)> {
        let mut found = Vec::new();

        for (r, row) in table.rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                let Some(text) = cell.as_deref() else {
                    continue;
                };

                let (label, inline) = match text.split_once(':') {
                    Some((label, rest)) => (label, non_blank(rest)),
                    None => (text, None),
                };
                let Some(hit) = self.synonyms.lookup_label(label) else {
                    continue;
                };

                let value = match inline {
                    Some(value) => SummaryValue::accept(hit.key, &value),
                    None => row
                        .iter()
                        .skip(c + 1)
                        .flatten()
                        .find(|v| !v.trim().is_empty())
                        .and_then(|v| SummaryValue::accept(hit.key, v))
                        .or_else(|| {
                            table
                                .cell(r + 1, c)
                                .and_then(|v| SummaryValue::accept(hit.key, v))
                        }),
                };

                if let Some(value) = value {
                    found.push((hit.key, value, label_provenance(Tier::Table, hit.exact)));
                }
            }
        }

        found
    }
}

impl Extractor for TableExtractor<'_> {
    fn tier(&self) -> Tier {
        Tier::Table
    }

    fn extract(&self, pages: &[PagePrimitive], _current: &PartialRecord) -> PartialRecord {
        let mut found = PartialRecord::new();
        let mut drafts = Vec::new();
        let mut breakdowns = Vec::new();
        let mut size_issues = Vec::new();
        let mut page_summaries = Vec::with_capacity(pages.len());

        for page in pages {
            let mut summary = Vec::new();
            for (t, table) in page.tables.iter().enumerate() {
                match self.classify(table) {
                    TableKind::Orders {
                        header_row,
                        columns,
                    } => {
                        log::debug!("page {} table {}: orders table", page.index, t);
                        drafts.extend(self.order_rows(table, header_row, &columns));
                    }
                    TableKind::Sizes(layout) => {
                        log::debug!(
                            "page {} table {}: size table with {} sizes",
                            page.index,
                            t,
                            layout.size_cols.len()
                        );
                        self.size_rows(table, &layout, &mut breakdowns, &mut size_issues);
                    }
                    TableKind::Other => summary.extend(self.summary_cells(table)),
                }
            }
            page_summaries.push(summary);
        }

        let (items, order_issues) = finish_rows(drafts);
        found.set_orders(items, order_issues, Provenance::from_tier(Tier::Table));
        found.set_size_breakdowns(breakdowns, size_issues, Provenance::from_tier(Tier::Table));

        for (field, value, provenance) in page_summaries.iter().flatten().cloned() {
            if field != Field::TotalAmount {
                value.apply(field, &mut found, provenance);
            }
        }
        for (field, value, provenance) in page_summaries.into_iter().rev().flatten() {
            if field == Field::TotalAmount {
                value.apply(field, &mut found, provenance);
            }
        }

        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::IssueKind;
    use bigdecimal::BigDecimal;
    use std::str::FromStr;

    fn run(pages: &[PagePrimitive]) -> PartialRecord {
        let options = ExtractOptions::default();
        TableExtractor::new(&options).extract(pages, &PartialRecord::new())
    }

    fn orders_table() -> PageTable {
        PageTable::from_strings(vec![
            vec!["Qty", "Item SKU", "U.P.C.", "Description", "Unit Price", "Amount"],
            vec!["10", "ABC-100", "036000291452", "Ruffle Shorts 3-6m", "$2.50", "$25.00"],
            vec!["", "", "", "Pink", "", ""],
            vec!["Qty", "Item SKU", "UPC", "Description", "Unit Price", "Amount"],
            vec!["2", "ABC-101", "012345678905", "Kids Tee", "oops", "8.00"],
            vec!["10", "ABC-100", "036000291452", "Ruffle Shorts 3-6m", "$2.50", "$25.00"],
            vec!["Subtotal", "", "", "", "", "33.00"],
        ])
    }

    #[test]
    fn test_orders_table() {
        let found = run(&[PagePrimitive::new(0).with_table(orders_table())]);
        assert_eq!(found.orders.len(), 2);

        let first = &found.orders[0];
        assert_eq!(first.product_id.as_deref(), Some("ABC-100"));
        assert_eq!(first.description.as_deref(), Some("Ruffle Shorts 3-6m Pink"));
        assert_eq!(first.unit_price, BigDecimal::from_str("2.50").ok());
        assert_eq!(found.provenance[&Field::Orders].tier, Tier::Table);

        assert_eq!(found.orders[1].unit_price, None);
        assert_eq!(found.order_issues.len(), 1);
        assert_eq!(found.order_issues[0].path, "orders[1].unit_price");
        assert_eq!(found.order_issues[0].kind, IssueKind::MissingField);
    }

    #[test]
    fn test_size_table() {
        let table = PageTable::from_strings(vec![
            vec!["Style", "S", "M", "L", "Total"],
            vec!["ABC-100", "2", "3", "5", "10"],
            vec!["ABC-200", "1", "x", "", ""],
            vec!["ABC-300", "1", "1", "1", "4"],
        ]);
        let found = run(&[PagePrimitive::new(0).with_table(table)]);

        assert_eq!(found.size_breakdowns.len(), 3);
        let first = &found.size_breakdowns[0];
        assert_eq!(first.quantity_for("M"), Some(3));
        assert_eq!(first.total(), 10);

        assert_eq!(found.size_issues.len(), 2);
        assert_eq!(found.size_issues[0].path, "size_breakdowns[1]");
        assert_eq!(found.size_issues[0].kind, IssueKind::MissingField);
        assert_eq!(found.size_issues[1].path, "size_breakdowns[2]");
        assert_eq!(found.size_issues[1].kind, IssueKind::ArithmeticMismatch);
    }

    #[test]
    fn test_size_table_skips_repeated_header() {
        let table = PageTable::from_strings(vec![
            vec!["Style", "S", "M", "L"],
            vec!["ABC-100", "2", "3", "5"],
            vec!["Style", "S", "M", "L"],
            vec!["", "Small", "Med", "Large"],
            vec!["ABC-200", "1", "1", "1"],
        ]);
        let found = run(&[PagePrimitive::new(0).with_table(table)]);

        let products: Vec<_> = found.size_breakdowns.iter().map(|b| b.product_id.as_str()).collect();
        assert_eq!(products, vec!["ABC-100", "ABC-200"]);
        assert!(found.size_issues.is_empty());
    }

    #[test]
    fn test_summary_cells() {
        let header = PageTable::from_strings(vec![
            vec!["PO #", "4500123", "Ship Date", "03/15/2025"],
            vec!["Vendor: Acme Kids", "", "Terms", ""],
            vec!["", "", "Net 30", ""],
        ]);
        let totals = PageTable::from_strings(vec![vec!["Grand Total", "$1,250.00"]]);
        let found = run(&[
            PagePrimitive::new(0).with_table(header),
            PagePrimitive::new(1).with_table(totals),
        ]);

        assert_eq!(found.po_number.as_deref(), Some("4500123"));
        assert_eq!(found.ship_date.as_deref(), Some("03/15/2025"));
        assert_eq!(found.vendor_name.as_deref(), Some("Acme Kids"));
        assert_eq!(found.payment_terms.as_deref(), Some("Net 30"));
        assert_eq!(found.total_amount, BigDecimal::from_str("1250.00").ok());
        assert_eq!(found.provenance[&Field::TotalAmount].confidence, 0.8);
    }

    #[test]
    fn test_unclassified_table_ignored_for_items() {
        let table = PageTable::from_strings(vec![vec!["Notes", "Remarks"], vec!["fragile", "x"]]);
        let found = run(&[PagePrimitive::new(0).with_table(table)]);
        assert!(found.is_empty());
    }
}
