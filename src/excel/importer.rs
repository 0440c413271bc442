//! Excel importer implementation - .xlsx bytes → in-memory workbook

use super::dates::{from_excel_serial, parse_iso_datetime};
use super::document::{CellValue, Workbook, Worksheet};
use super::package::{read_presentation, SheetPresentation};
use crate::error::{SheetfillError, SheetfillResult};
use crate::excel::cell_ref::MergeRange;
use calamine::{Data, Range, Reader, SheetType, Xlsx};
use std::io::Cursor;
use tracing::{debug, warn};

/// Reads a template workbook.
///
/// calamine supplies cell values, formulas and merged regions. Cell formats,
/// data validations and column widths come from the package XML.
pub struct ExcelImporter<'a> {
    bytes: &'a [u8],
}

impl<'a> ExcelImporter<'a> {
    /// Create a new Excel importer over an in-memory .xlsx file
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    /// Import every worksheet, in workbook order
    pub fn import(&self) -> SheetfillResult<Workbook> {
        let mut xlsx: Xlsx<_> = Xlsx::new(Cursor::new(self.bytes))
            .map_err(|e| SheetfillError::Import(format!("Failed to open Excel file: {}", e)))?;
        xlsx.load_merged_regions().map_err(|e| {
            SheetfillError::Import(format!("Failed to load merged regions: {}", e))
        })?;

        let sheet_names: Vec<String> = xlsx
            .sheets_metadata()
            .iter()
            .filter(|sheet| sheet.typ == SheetType::WorkSheet)
            .map(|sheet| sheet.name.clone())
            .collect();

        let mut presentation = read_presentation(self.bytes)?;

        let mut workbook = Workbook::new();
        for sheet_name in sheet_names {
            let worksheet = workbook.add_worksheet(sheet_name.as_str());
            Self::process_sheet(&mut xlsx, &sheet_name, worksheet)?;
            if let Some(sheet_presentation) = presentation.remove(&sheet_name) {
                Self::apply_presentation(sheet_presentation, worksheet);
            }
        }

        Ok(workbook)
    }

    /// Load values, formulas and merges of a single worksheet
    fn process_sheet(
        xlsx: &mut Xlsx<Cursor<&[u8]>>,
        sheet_name: &str,
        worksheet: &mut Worksheet,
    ) -> SheetfillResult<()> {
        let values = xlsx.worksheet_range(sheet_name).map_err(|e| {
            SheetfillError::Import(format!("Failed to read worksheet '{}': {}", sheet_name, e))
        })?;
        Self::load_values(&values, worksheet);

        // Formula text wins over the cached value
        match xlsx.worksheet_formula(sheet_name) {
            Ok(formulas) => Self::load_formulas(&formulas, worksheet),
            Err(e) => warn!(sheet = sheet_name, error = %e, "could not read formulas"),
        }

        if let Some(merges) = xlsx.worksheet_merge_cells(sheet_name) {
            let merges = merges.map_err(|e| {
                SheetfillError::Import(format!(
                    "Failed to read merged cells of '{}': {}",
                    sheet_name, e
                ))
            })?;
            for region in merges {
                worksheet.push_merge(MergeRange::new(
                    region.start.0 + 1,
                    region.start.1 + 1,
                    region.end.0 + 1,
                    region.end.1 + 1,
                ));
            }
        }

        debug!(
            sheet = sheet_name,
            rows = worksheet.last_row(),
            merges = worksheet.merge_ranges().len(),
            "imported worksheet"
        );
        Ok(())
    }

    fn apply_presentation(presentation: SheetPresentation, worksheet: &mut Worksheet) {
        for ((row, col), cell_presentation) in presentation.cells {
            worksheet.cell_mut(row, col).presentation = cell_presentation;
        }
        for (col, width) in presentation.column_widths {
            worksheet.set_column_width(col, width);
        }
    }

    fn load_values(range: &Range<Data>, worksheet: &mut Worksheet) {
        let Some((start_row, start_col)) = range.start() else {
            return;
        };
        for (row, col, data) in range.cells() {
            let row = start_row + row as u32 + 1;
            let col = start_col + col as u32 + 1;
            if let Some(value) = Self::convert_cell(data) {
                worksheet.set_value(row, col, value);
            }
        }
    }

    fn load_formulas(range: &Range<String>, worksheet: &mut Worksheet) {
        let Some((start_row, start_col)) = range.start() else {
            return;
        };
        for (row, col, formula) in range.cells() {
            if formula.is_empty() {
                continue;
            }
            let row = start_row + row as u32 + 1;
            let col = start_col + col as u32 + 1;
            worksheet.set_value(row, col, CellValue::formula(formula));
        }
    }

    /// Convert a calamine cell; `None` for empty cells
    fn convert_cell(data: &Data) -> Option<CellValue> {
        let value = match data {
            Data::Empty => return None,
            Data::String(s) => CellValue::String(s.clone()),
            Data::Float(f) => CellValue::Number(*f),
            Data::Int(i) => CellValue::Number(*i as f64),
            Data::Bool(b) => CellValue::Bool(*b),
            Data::DateTime(dt) => {
                let serial = dt.as_f64();
                match from_excel_serial(serial) {
                    Some(datetime) if !dt.is_duration() => CellValue::DateTime(datetime),
                    _ => CellValue::Number(serial),
                }
            }
            Data::DateTimeIso(s) => parse_iso_datetime(s)
                .map(CellValue::DateTime)
                .unwrap_or_else(|| CellValue::String(s.clone())),
            Data::DurationIso(s) => CellValue::String(s.clone()),
            Data::Error(e) => CellValue::String(e.to_string()),
        };
        Some(value)
    }
}

/// Load a workbook from .xlsx bytes
pub fn load_workbook(bytes: &[u8]) -> SheetfillResult<Workbook> {
    ExcelImporter::new(bytes).import()
}
