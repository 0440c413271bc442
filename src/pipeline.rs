//! Interpolation pipeline: load template → expand every worksheet → serialize

use crate::core::{RowExpander, SheetReport};
use crate::error::SheetfillResult;
use crate::excel::{load_workbook, save_workbook, Workbook};
use crate::types::Value;
use serde::Serialize;
use tracing::debug;

/// Per-worksheet summary of one interpolation run
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ExpansionReport {
    pub sheets: Vec<SheetReport>,
}

impl ExpansionReport {
    /// Template rows replaced by array rows, across all worksheets
    pub fn rows_expanded(&self) -> usize {
        self.sheets.iter().map(|sheet| sheet.expanded.len()).sum()
    }

    /// Rows produced by expansion, across all worksheets
    pub fn rows_written(&self) -> usize {
        self.sheets.iter().map(SheetReport::rows_written).sum()
    }

    /// Template rows left untouched because their array was absent
    pub fn rows_skipped(&self) -> usize {
        self.sheets.iter().map(|sheet| sheet.skipped.len()).sum()
    }
}

/// Fill an .xlsx template with `data` and return the resulting .xlsx bytes.
///
/// Example:
/// - Template: `A1 = "Hello {{user.name}}"`
/// - Data: `{"user": {"name": "Ana"}}`
/// - Output: `A1 = "Hello Ana"`
pub fn interpolate(template: &[u8], data: &Value) -> SheetfillResult<Vec<u8>> {
    let (bytes, _) = interpolate_with_report(template, data)?;
    Ok(bytes)
}

/// Same as [`interpolate`], also returning what was expanded
pub fn interpolate_with_report(
    template: &[u8],
    data: &Value,
) -> SheetfillResult<(Vec<u8>, ExpansionReport)> {
    let mut workbook = load_workbook(template)?;
    let report = interpolate_workbook(&mut workbook, data)?;
    let bytes = save_workbook(&workbook)?;
    Ok((bytes, report))
}

/// Run the expansion engine over every worksheet of an already-loaded workbook.
///
/// Worksheets are processed in order on a working copy; `workbook` is only
/// replaced once every worksheet succeeded, so an error leaves it untouched.
pub fn interpolate_workbook(workbook: &mut Workbook, data: &Value) -> SheetfillResult<ExpansionReport> {
    let expander = RowExpander::new(data);
    let mut working = workbook.clone();
    let mut report = ExpansionReport::default();

    for sheet in working.worksheets_mut() {
        report.sheets.push(expander.expand(sheet)?);
    }

    debug!(
        sheets = report.sheets.len(),
        rows_expanded = report.rows_expanded(),
        rows_written = report.rows_written(),
        rows_skipped = report.rows_skipped(),
        "interpolation finished"
    );

    *workbook = working;
    Ok(report)
}
