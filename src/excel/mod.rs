//! Excel workbook module
//!
//! This module provides the spreadsheet side of interpolation:
//! - Document: in-memory worksheets the expansion engine edits
//! - Import: .xlsx bytes → workbook (calamine for values, package XML for
//!   formats, validations and column widths)
//! - Export: workbook → .xlsx bytes (rust_xlsxwriter)
//! - Formula rewriting and A1 reference helpers

pub mod cell_ref;
pub mod dates;
pub mod document;
mod exporter;
pub mod formula_rewriter;
mod importer;
mod package;

pub use cell_ref::{column_letters, column_number, CellRef, MergeRange};
pub use document::{
    BorderStyle, Cell, CellStyle, CellValue, DataValidation, HorizontalAlign, NumberRule,
    Presentation, Protection, ValidationRule, Workbook, Worksheet, WorksheetDocument,
};
pub use exporter::{save_workbook, ExcelExporter};
pub use formula_rewriter::rewrite_row_references;
pub use importer::{load_workbook, ExcelImporter};
