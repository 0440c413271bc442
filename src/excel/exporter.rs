//! Excel exporter implementation - in-memory workbook → .xlsx bytes

use super::dates::to_excel_serial;
use super::document::{
    BorderStyle, Cell, CellStyle, CellValue, DataValidation, HorizontalAlign, NumberRule,
    Presentation, ValidationRule, Workbook, Worksheet, WorksheetDocument,
};
use crate::error::{SheetfillError, SheetfillResult};
use crate::excel::cell_ref::MergeRange;
use rust_xlsxwriter::{
    Color, DataValidation as XlsxValidation, DataValidationRule, Format, FormatAlign,
    FormatBorder, FormatUnderline, Formula,
};
use tracing::{debug, warn};

/// Number format applied to date cells that carry no explicit one
const DATE_FORMAT: &str = "yyyy-mm-dd";
const DATETIME_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";

/// Serializes a [`Workbook`] with rust_xlsxwriter
pub struct ExcelExporter<'a> {
    workbook: &'a Workbook,
}

impl<'a> ExcelExporter<'a> {
    /// Create a new Excel exporter
    pub fn new(workbook: &'a Workbook) -> Self {
        Self { workbook }
    }

    /// Export the workbook to .xlsx bytes
    pub fn export_to_buffer(&self) -> SheetfillResult<Vec<u8>> {
        let mut out = self.build()?;
        out.save_to_buffer()
            .map_err(|e| SheetfillError::Export(format!("Failed to serialize workbook: {}", e)))
    }

    fn build(&self) -> SheetfillResult<rust_xlsxwriter::Workbook> {
        let mut out = rust_xlsxwriter::Workbook::new();
        for sheet in self.workbook.worksheets() {
            Self::export_sheet(&mut out, sheet)?;
        }
        Ok(out)
    }

    /// Export a single worksheet
    fn export_sheet(out: &mut rust_xlsxwriter::Workbook, sheet: &Worksheet) -> SheetfillResult<()> {
        let ws = out.add_worksheet();
        ws.set_name(sheet.name()).map_err(|e| {
            SheetfillError::Export(format!("Failed to set worksheet name '{}': {}", sheet.name(), e))
        })?;

        for (&column, &width) in sheet.column_widths() {
            ws.set_column_width(col_index(column)?, width).map_err(|e| {
                SheetfillError::Export(format!("Failed to set width of column {}: {}", column, e))
            })?;
        }

        // Merges go first: merge_range writes its own placeholder into the
        // anchor cell, which the cell pass below then overwrites.
        let mut written: Vec<MergeRange> = Vec::new();
        for merge in sheet.merge_ranges() {
            if let Some(existing) = written.iter().find(|m| m.overlaps(merge)) {
                warn!(
                    sheet = sheet.name(),
                    range = %merge,
                    overlaps = %existing,
                    "skipping overlapping merge"
                );
                continue;
            }
            let format = sheet
                .cell(merge.start_row, merge.start_col)
                .map(|cell| build_format(&cell.presentation, &cell.value))
                .unwrap_or_else(Format::new);
            ws.merge_range(
                row_index(merge.start_row)?,
                col_index(merge.start_col)?,
                row_index(merge.end_row)?,
                col_index(merge.end_col)?,
                "",
                &format,
            )
            .map_err(|e| SheetfillError::Export(format!("merge_range {} failed: {}", merge, e)))?;
            written.push(*merge);
        }

        for (row, col, cell) in sheet.cells() {
            write_cell(ws, row_index(row)?, col_index(col)?, cell)?;
            if let Some(validation) = &cell.presentation.validation {
                let rule = build_validation(validation)?;
                ws.add_data_validation(
                    row_index(row)?,
                    col_index(col)?,
                    row_index(row)?,
                    col_index(col)?,
                    &rule,
                )
                .map_err(|e| {
                    SheetfillError::Export(format!("add_data_validation failed: {}", e))
                })?;
            }
        }

        debug!(
            sheet = sheet.name(),
            merges = written.len(),
            "exported worksheet"
        );
        Ok(())
    }
}

/// Serialize `workbook` into .xlsx bytes
pub fn save_workbook(workbook: &Workbook) -> SheetfillResult<Vec<u8>> {
    ExcelExporter::new(workbook).export_to_buffer()
}

fn row_index(row: u32) -> SheetfillResult<u32> {
    row.checked_sub(1)
        .ok_or_else(|| SheetfillError::Export("Row numbers start at 1".to_string()))
}

fn col_index(column: u32) -> SheetfillResult<u16> {
    column
        .checked_sub(1)
        .and_then(|c| u16::try_from(c).ok())
        .ok_or_else(|| SheetfillError::Export(format!("Column {} is out of range", column)))
}

fn write_cell(
    ws: &mut rust_xlsxwriter::Worksheet,
    row: u32,
    col: u16,
    cell: &Cell,
) -> SheetfillResult<()> {
    let format = build_format(&cell.presentation, &cell.value);
    let result = match &cell.value {
        CellValue::Empty if cell.presentation.is_default() => return Ok(()),
        CellValue::Empty => ws.write_blank(row, col, &format),
        CellValue::String(s) => ws.write_string_with_format(row, col, s, &format),
        CellValue::Number(n) => ws.write_number_with_format(row, col, *n, &format),
        CellValue::Bool(b) => ws.write_boolean_with_format(row, col, *b, &format),
        CellValue::DateTime(dt) => {
            ws.write_number_with_format(row, col, to_excel_serial(dt), &format)
        }
        CellValue::Formula(f) => {
            ws.write_formula_with_format(row, col, Formula::new(format!("={}", f)), &format)
        }
    };
    result.map(|_| ()).map_err(|e| {
        SheetfillError::Export(format!(
            "Failed to write cell at row {}, column {}: {}",
            row + 1,
            col + 1,
            e
        ))
    })
}

/// Build the cell format from its style and protection flags
fn build_format(presentation: &Presentation, value: &CellValue) -> Format {
    let mut f = Format::new();

    if let Some(style) = &presentation.style {
        f = apply_style(f, style);
    }

    let has_num_format = presentation
        .style
        .as_ref()
        .is_some_and(|s| s.num_format.is_some());
    if let (CellValue::DateTime(dt), false) = (value, has_num_format) {
        f = if dt.time() == chrono::NaiveTime::MIN {
            f.set_num_format(DATE_FORMAT)
        } else {
            f.set_num_format(DATETIME_FORMAT)
        };
    }

    if let Some(protection) = presentation.protection {
        if !protection.locked {
            f = f.set_unlocked();
        }
        if protection.hidden {
            f = f.set_hidden();
        }
    }

    f
}

fn apply_style(mut f: Format, style: &CellStyle) -> Format {
    if style.bold {
        f = f.set_bold();
    }
    if style.italic {
        f = f.set_italic();
    }
    if style.underline {
        f = f.set_underline(FormatUnderline::Single);
    }
    if let Some(name) = &style.font_name {
        f = f.set_font_name(name);
    }
    if let Some(size) = style.font_size {
        f = f.set_font_size(size);
    }
    if let Some(color) = style.font_color {
        f = f.set_font_color(Color::RGB(color));
    }
    if let Some(color) = style.fill_color {
        f = f.set_background_color(Color::RGB(color));
    }
    if let Some(num_format) = &style.num_format {
        f = f.set_num_format(num_format);
    }
    if let Some(align) = style.align {
        f = f.set_align(match align {
            HorizontalAlign::Left => FormatAlign::Left,
            HorizontalAlign::Center => FormatAlign::Center,
            HorizontalAlign::Right => FormatAlign::Right,
        });
    }
    if style.wrap_text {
        f = f.set_text_wrap();
    }
    if let Some(border) = style.border {
        f = f.set_border(match border {
            BorderStyle::Thin => FormatBorder::Thin,
            BorderStyle::Medium => FormatBorder::Medium,
            BorderStyle::Thick => FormatBorder::Thick,
        });
    }
    f
}

fn build_validation(validation: &DataValidation) -> SheetfillResult<XlsxValidation> {
    let mut v = XlsxValidation::new();
    v = match &validation.rule {
        ValidationRule::List(choices) => v.allow_list_strings(choices.as_slice()).map_err(|e| {
            SheetfillError::Export(format!("Invalid list validation: {}", e))
        })?,
        ValidationRule::ListSource(source) => {
            v.allow_list_formula(Formula::new(format!("={}", source)))
        }
        ValidationRule::WholeNumber(rule) => v.allow_whole_number(number_rule(*rule)),
        ValidationRule::Decimal(rule) => v.allow_decimal_number(number_rule(*rule)),
        ValidationRule::Custom(formula) => v.allow_custom(Formula::new(format!("={}", formula))),
    };
    if !validation.ignore_blank {
        v = v.ignore_blank(false);
    }
    if let Some(message) = &validation.error_message {
        v = v.set_error_message(message).map_err(|e| {
            SheetfillError::Export(format!("Invalid validation message: {}", e))
        })?;
    }
    Ok(v)
}

fn number_rule<T: rust_xlsxwriter::IntoDataValidationValue>(rule: NumberRule<T>) -> DataValidationRule<T> {
    match rule {
        NumberRule::Between(min, max) => DataValidationRule::Between(min, max),
        NumberRule::NotBetween(min, max) => DataValidationRule::NotBetween(min, max),
        NumberRule::EqualTo(value) => DataValidationRule::EqualTo(value),
        NumberRule::NotEqualTo(value) => DataValidationRule::NotEqualTo(value),
        NumberRule::GreaterThan(value) => DataValidationRule::GreaterThan(value),
        NumberRule::GreaterThanOrEqualTo(value) => DataValidationRule::GreaterThanOrEqualTo(value),
        NumberRule::LessThan(value) => DataValidationRule::LessThan(value),
        NumberRule::LessThanOrEqualTo(value) => DataValidationRule::LessThanOrEqualTo(value),
    }
}
