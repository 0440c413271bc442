//! Row expansion engine
//!
//! Each worksheet goes through three passes:
//!
//! 1. **Classification** - every row is scanned for `[[key...]]` markers and
//!    rows bound to exactly one array key become expansion directives. Merge
//!    ranges are captured here, before anything moves.
//! 2. **Expansion** - directives are applied from the bottom of the sheet up,
//!    so inserting and deleting rows never shifts a directive still pending.
//!    Each template row is replaced by one row per array element.
//! 3. **Root scope** - every remaining string cell gets `{{path}}` markers
//!    resolved against the data root.
//!
//! Arrays are bound and type-checked for the whole sheet before the first
//! structural change, so a failing sheet is left untouched.

use super::markers::{classify_row, substitute_array_items, substitute_scalars, RowBinding};
use crate::error::{SheetfillError, SheetfillResult};
use crate::excel::cell_ref::{merge_range_includes_row, MergeRange};
use crate::excel::document::{CellValue, WorksheetDocument};
use crate::excel::formula_rewriter::rewrite_row_references;
use crate::types::Value;
use serde::Serialize;
use tracing::{debug, info};

/// A template row bound to an array key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpansionDirective {
    pub row: u32,
    pub array_key: String,
}

/// One template row that was replaced by array rows
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpandedRow {
    pub row: u32,
    pub array_key: String,
    pub rows_written: usize,
}

/// What happened to one worksheet
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SheetReport {
    pub sheet: String,
    pub expanded: Vec<ExpandedRow>,
    /// Directives whose array key is absent from the data; their rows are kept as-is
    pub skipped: Vec<ExpansionDirective>,
}

impl SheetReport {
    pub fn rows_written(&self) -> usize {
        self.expanded.iter().map(|row| row.rows_written).sum()
    }
}

/// Pass 1: bind each row that carries array-item markers to its array key.
///
/// Directives come back in ascending row order. A row that mixes two array
/// keys fails the whole sheet.
pub fn classify_rows<W: WorksheetDocument + ?Sized>(
    sheet: &W,
) -> SheetfillResult<Vec<ExpansionDirective>> {
    let mut directives = Vec::new();

    for row in sheet.row_numbers() {
        let cells = sheet.row_cells(row);
        let texts = cells.iter().filter_map(|(_, cell)| cell.value.as_str());

        match classify_row(texts) {
            RowBinding::Unbound => {}
            RowBinding::Bound(array_key) => directives.push(ExpansionDirective { row, array_key }),
            RowBinding::Mixed { first, second } => {
                return Err(SheetfillError::MixedArrayKeys {
                    sheet: sheet.name().to_string(),
                    row,
                    first,
                    second,
                });
            }
        }
    }

    Ok(directives)
}

/// Expands array rows and resolves markers in one worksheet at a time
pub struct RowExpander<'a> {
    data: &'a Value,
}

impl<'a> RowExpander<'a> {
    pub fn new(data: &'a Value) -> Self {
        Self { data }
    }

    /// Run all three passes over `sheet`
    pub fn expand<W: WorksheetDocument + ?Sized>(
        &self,
        sheet: &mut W,
    ) -> SheetfillResult<SheetReport> {
        let directives = classify_rows(sheet)?;
        let merges = sheet.merges();

        let mut report = SheetReport {
            sheet: sheet.name().to_string(),
            ..SheetReport::default()
        };

        let mut bound = Vec::with_capacity(directives.len());
        for directive in directives.into_iter().rev() {
            match self.data.get(&directive.array_key) {
                None => {
                    debug!(
                        sheet = %report.sheet,
                        row = directive.row,
                        key = %directive.array_key,
                        "array key absent, leaving template row untouched"
                    );
                    report.skipped.push(directive);
                }
                Some(Value::Sequence(items)) => bound.push((directive, items.as_slice())),
                Some(other) => {
                    return Err(SheetfillError::ArrayTypeMismatch {
                        sheet: report.sheet,
                        row: directive.row,
                        key: directive.array_key,
                        actual: other.type_name().to_string(),
                    });
                }
            }
        }

        // Bottom-up: `bound` is already in descending row order.
        for (directive, items) in bound {
            self.expand_row(sheet, &directive, items, &merges);
            debug!(
                sheet = %report.sheet,
                row = directive.row,
                key = %directive.array_key,
                rows = items.len(),
                "expanded template row"
            );
            report.expanded.push(ExpandedRow {
                row: directive.row,
                array_key: directive.array_key,
                rows_written: items.len(),
            });
        }

        self.interpolate_root_scope(sheet);

        if !report.expanded.is_empty() || !report.skipped.is_empty() {
            info!(
                sheet = %report.sheet,
                expanded = report.expanded.len(),
                skipped = report.skipped.len(),
                rows_written = report.rows_written(),
                "worksheet interpolated"
            );
        }

        Ok(report)
    }

    /// Pass 2 for one directive: replace the template row with one row per item
    fn expand_row<W: WorksheetDocument + ?Sized>(
        &self,
        sheet: &mut W,
        directive: &ExpansionDirective,
        items: &[Value],
        merges: &[String],
    ) {
        let template_row = directive.row;
        let template = sheet.row_cells(template_row);
        let template_merges: Vec<MergeRange> = merges
            .iter()
            .filter(|range| merge_range_includes_row(range, template_row))
            .filter_map(|range| MergeRange::parse(range))
            .collect();

        sheet.delete_row(template_row);

        // All rows are opened before any replica merge is registered, so an
        // insert never stretches a replica.
        for offset in 0..items.len() {
            sheet.insert_row(template_row + offset as u32);
        }

        for (offset, item) in items.iter().enumerate() {
            let new_row = template_row + offset as u32;

            for (column, cell) in &template {
                let value = match &cell.value {
                    CellValue::Formula(formula) => CellValue::Formula(rewrite_row_references(
                        formula,
                        template_row,
                        new_row,
                    )),
                    CellValue::String(text) => {
                        let text = substitute_array_items(text, &directive.array_key, item);
                        CellValue::String(substitute_scalars(&text, self.data))
                    }
                    other => other.clone(),
                };
                sheet.set_cell_value(new_row, *column, value);
                sheet.set_cell_presentation(new_row, *column, cell.presentation.clone());
            }

            for range in &template_merges {
                if let Some(shifted) = range.shifted(offset as i64) {
                    sheet.add_merge(&shifted.to_string());
                }
            }
        }
    }

    /// Pass 3: resolve `{{path}}` markers in every string cell
    fn interpolate_root_scope<W: WorksheetDocument + ?Sized>(&self, sheet: &mut W) {
        for row in sheet.row_numbers() {
            for (column, cell) in sheet.row_cells(row) {
                let CellValue::String(text) = &cell.value else {
                    continue;
                };
                let replaced = substitute_scalars(text, self.data);
                if replaced != *text {
                    sheet.set_cell_value(row, column, CellValue::String(replaced));
                }
            }
        }
    }
}
