//! In-memory workbook document
//!
//! The row expansion engine talks to worksheets only through
//! [`WorksheetDocument`]; [`Worksheet`] is the implementation the importer
//! produces and the exporter serializes.

use super::cell_ref::{CellRef, MergeRange};
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use tracing::warn;

//==============================================================================
// Cell model
//==============================================================================

/// Value stored in a cell
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    String(String),
    Number(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
    /// Formula text without the leading `=`
    Formula(String),
}

impl CellValue {
    pub fn formula(text: impl AsRef<str>) -> Self {
        let text = text.as_ref();
        CellValue::Formula(text.strip_prefix('=').unwrap_or(text).to_string())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_formula(&self) -> Option<&str> {
        match self {
            CellValue::Formula(f) => Some(f),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::String(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::String(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

impl From<NaiveDateTime> for CellValue {
    fn from(dt: NaiveDateTime) -> Self {
        CellValue::DateTime(dt)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HorizontalAlign {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorderStyle {
    Thin,
    Medium,
    Thick,
}

/// Font, fill, alignment and number format of a cell
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CellStyle {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub font_name: Option<String>,
    pub font_size: Option<f64>,
    /// RGB, e.g. `0xFF0000`
    pub font_color: Option<u32>,
    pub fill_color: Option<u32>,
    pub num_format: Option<String>,
    pub align: Option<HorizontalAlign>,
    pub wrap_text: bool,
    pub border: Option<BorderStyle>,
}

/// Comparison a numeric validation applies
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumberRule<T> {
    Between(T, T),
    NotBetween(T, T),
    EqualTo(T),
    NotEqualTo(T),
    GreaterThan(T),
    GreaterThanOrEqualTo(T),
    LessThan(T),
    LessThanOrEqualTo(T),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationRule {
    /// Drop-down of fixed choices
    List(Vec<String>),
    /// Drop-down fed by a range or formula, without the leading `=`
    ListSource(String),
    WholeNumber(NumberRule<i32>),
    Decimal(NumberRule<f64>),
    /// Custom formula, without the leading `=`
    Custom(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataValidation {
    pub rule: ValidationRule,
    pub ignore_blank: bool,
    pub error_message: Option<String>,
}

impl DataValidation {
    pub fn new(rule: ValidationRule) -> Self {
        Self {
            rule,
            ignore_blank: true,
            error_message: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Protection {
    pub locked: bool,
    pub hidden: bool,
}

impl Default for Protection {
    fn default() -> Self {
        Self {
            locked: true,
            hidden: false,
        }
    }
}

/// Everything about a cell except its value. Follows the cell's position when
/// rows are cloned.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Presentation {
    pub style: Option<CellStyle>,
    pub validation: Option<DataValidation>,
    pub protection: Option<Protection>,
}

impl Presentation {
    pub fn is_default(&self) -> bool {
        self.style.is_none() && self.validation.is_none() && self.protection.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cell {
    pub value: CellValue,
    pub presentation: Presentation,
}

impl Cell {
    pub fn new(value: impl Into<CellValue>) -> Self {
        Self {
            value: value.into(),
            presentation: Presentation::default(),
        }
    }
}

//==============================================================================
// Document capability
//==============================================================================

/// Operations the row expansion engine needs from a worksheet.
///
/// Rows and columns are 1-based. Merge ranges travel as A1 range strings
/// (`"A2:C2"`).
pub trait WorksheetDocument {
    fn name(&self) -> &str;

    /// Numbers of rows that hold at least one cell, ascending
    fn row_numbers(&self) -> Vec<u32>;

    /// Cells of `row` as `(column, cell)` pairs, ascending by column
    fn row_cells(&self, row: u32) -> Vec<(u32, Cell)>;

    fn set_cell_value(&mut self, row: u32, column: u32, value: CellValue);

    fn set_cell_presentation(&mut self, row: u32, column: u32, presentation: Presentation);

    /// Remove `row`, shifting every later row up by one
    fn delete_row(&mut self, row: u32);

    /// Open an empty row at `row`, shifting it and every later row down by one
    fn insert_row(&mut self, row: u32);

    fn merges(&self) -> Vec<String>;

    fn add_merge(&mut self, range: &str);
}

//==============================================================================
// Worksheet / Workbook
//==============================================================================

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Worksheet {
    name: String,
    rows: BTreeMap<u32, BTreeMap<u32, Cell>>,
    merges: Vec<MergeRange>,
    /// Column number to width in characters
    column_widths: BTreeMap<u32, f64>,
}

impl Worksheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn cell(&self, row: u32, column: u32) -> Option<&Cell> {
        self.rows.get(&row).and_then(|cells| cells.get(&column))
    }

    pub fn cell_mut(&mut self, row: u32, column: u32) -> &mut Cell {
        self.rows
            .entry(row)
            .or_default()
            .entry(column)
            .or_default()
    }

    /// Value at an A1 reference such as `"B3"`
    pub fn value_at(&self, reference: &str) -> Option<&CellValue> {
        let cell_ref = CellRef::parse(reference)?;
        self.cell(cell_ref.row, cell_ref.column).map(|cell| &cell.value)
    }

    pub fn set_value(&mut self, row: u32, column: u32, value: impl Into<CellValue>) -> &mut Cell {
        let cell = self.cell_mut(row, column);
        cell.value = value.into();
        cell
    }

    /// Set a value by A1 reference; references that do not parse are ignored
    pub fn set(&mut self, reference: &str, value: impl Into<CellValue>) -> Option<&mut Cell> {
        let cell_ref = CellRef::parse(reference)?;
        Some(self.set_value(cell_ref.row, cell_ref.column, value))
    }

    pub fn merge_ranges(&self) -> &[MergeRange] {
        &self.merges
    }

    pub fn push_merge(&mut self, range: MergeRange) {
        if range.is_single_cell() || self.merges.contains(&range) {
            return;
        }
        self.merges.push(range);
    }

    pub fn set_column_width(&mut self, column: u32, width: f64) {
        self.column_widths.insert(column, width);
    }

    pub fn column_widths(&self) -> &BTreeMap<u32, f64> {
        &self.column_widths
    }

    /// Highest row number holding a cell, 0 for an empty sheet
    pub fn last_row(&self) -> u32 {
        self.rows.keys().next_back().copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.values().all(BTreeMap::is_empty)
    }

    /// Iterate `(row, column, cell)` in row-major order
    pub fn cells(&self) -> impl Iterator<Item = (u32, u32, &Cell)> {
        self.rows
            .iter()
            .flat_map(|(&row, cells)| cells.iter().map(move |(&col, cell)| (row, col, cell)))
    }
}

impl WorksheetDocument for Worksheet {
    fn name(&self) -> &str {
        &self.name
    }

    fn row_numbers(&self) -> Vec<u32> {
        self.rows
            .iter()
            .filter(|(_, cells)| !cells.is_empty())
            .map(|(&row, _)| row)
            .collect()
    }

    fn row_cells(&self, row: u32) -> Vec<(u32, Cell)> {
        self.rows
            .get(&row)
            .map(|cells| cells.iter().map(|(&col, cell)| (col, cell.clone())).collect())
            .unwrap_or_default()
    }

    fn set_cell_value(&mut self, row: u32, column: u32, value: CellValue) {
        self.cell_mut(row, column).value = value;
    }

    fn set_cell_presentation(&mut self, row: u32, column: u32, presentation: Presentation) {
        self.cell_mut(row, column).presentation = presentation;
    }

    fn delete_row(&mut self, row: u32) {
        let rows = std::mem::take(&mut self.rows);
        self.rows = rows
            .into_iter()
            .filter(|(n, _)| *n != row)
            .map(|(n, cells)| if n > row { (n - 1, cells) } else { (n, cells) })
            .collect();

        let merges = std::mem::take(&mut self.merges);
        self.merges = merges
            .into_iter()
            .filter_map(|m| {
                if m.end_row < row {
                    Some(m)
                } else if m.start_row > row {
                    m.shifted(-1)
                } else if m.start_row == m.end_row {
                    None
                } else {
                    let shrunk = MergeRange {
                        end_row: m.end_row - 1,
                        ..m
                    };
                    (!shrunk.is_single_cell()).then_some(shrunk)
                }
            })
            .collect();
    }

    fn insert_row(&mut self, row: u32) {
        let rows = std::mem::take(&mut self.rows);
        self.rows = rows
            .into_iter()
            .map(|(n, cells)| if n >= row { (n + 1, cells) } else { (n, cells) })
            .collect();

        for m in &mut self.merges {
            if m.start_row >= row {
                m.start_row += 1;
                m.end_row += 1;
            } else if m.end_row >= row {
                m.end_row += 1;
            }
        }
    }

    fn merges(&self) -> Vec<String> {
        self.merges.iter().map(MergeRange::to_string).collect()
    }

    fn add_merge(&mut self, range: &str) {
        match MergeRange::parse(range) {
            Some(parsed) => self.push_merge(parsed),
            None => warn!(sheet = %self.name, range, "ignoring unparseable merge range"),
        }
    }
}

/// Ordered collection of worksheets
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Workbook {
    worksheets: Vec<Worksheet>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_worksheet(&mut self, name: impl Into<String>) -> &mut Worksheet {
        self.worksheets.push(Worksheet::new(name));
        let last = self.worksheets.len() - 1;
        &mut self.worksheets[last]
    }

    pub fn worksheets(&self) -> &[Worksheet] {
        &self.worksheets
    }

    pub fn worksheets_mut(&mut self) -> &mut [Worksheet] {
        &mut self.worksheets
    }

    pub fn worksheet(&self, name: &str) -> Option<&Worksheet> {
        self.worksheets.iter().find(|ws| ws.name == name)
    }
}
