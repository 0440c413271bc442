//! End-to-end interpolation tests
//!
//! Templates are written with rust_xlsxwriter, filled through `interpolate`,
//! and read back with calamine, so every test crosses the real .xlsx codec.

use calamine::{Data, Range, Reader, Xlsx};
use pretty_assertions::assert_eq;
use royalbit_sheetfill::excel::{load_workbook, Protection, ValidationRule};
use royalbit_sheetfill::{interpolate, interpolate_with_report, SheetfillError, Value};
use rust_xlsxwriter::{DataValidation, Format, Formula, Workbook};
use std::io::Cursor;

// ═══════════════════════════════════════════════════════════════════════════
// HELPERS
// ═══════════════════════════════════════════════════════════════════════════

/// Build a single-sheet template from `(row, col, text)` triples (0-based)
fn template(cells: &[(u32, u16, &str)]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Sheet1").unwrap();
    for (row, col, text) in cells {
        worksheet.write_string(*row, *col, *text).unwrap();
    }
    workbook.save_to_buffer().unwrap()
}

fn data(json: &str) -> Value {
    Value::from_json_str(json).unwrap()
}

fn open(bytes: &[u8]) -> Xlsx<Cursor<&[u8]>> {
    Xlsx::new(Cursor::new(bytes)).unwrap()
}

fn values(bytes: &[u8], sheet: &str) -> Range<Data> {
    open(bytes).worksheet_range(sheet).unwrap()
}

fn formulas(bytes: &[u8], sheet: &str) -> Range<String> {
    open(bytes).worksheet_formula(sheet).unwrap()
}

/// Text of an A1 cell, empty when the cell is blank or missing
fn text(range: &Range<Data>, reference: &str) -> String {
    let (row, col) = position(reference);
    range
        .get_value((row, col))
        .map(|value| value.to_string())
        .unwrap_or_default()
}

fn formula(range: &Range<String>, reference: &str) -> String {
    let (row, col) = position(reference);
    range.get_value((row, col)).cloned().unwrap_or_default()
}

fn position(reference: &str) -> (u32, u32) {
    let cell = royalbit_sheetfill::excel::CellRef::parse(reference).unwrap();
    (cell.row - 1, cell.column - 1)
}

// ═══════════════════════════════════════════════════════════════════════════
// SCALAR MARKERS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_scalar_marker_resolves() {
    let bytes = template(&[(0, 0, "Hello {{user.name}}")]);
    let out = interpolate(&bytes, &data(r#"{"user":{"name":"Ana"}}"#)).unwrap();

    assert_eq!(text(&values(&out, "Sheet1"), "A1"), "Hello Ana");
}

#[test]
fn test_null_renders_empty() {
    let bytes = template(&[(0, 0, "Name: {{user.name}}")]);
    let out = interpolate(&bytes, &data(r#"{"user":{"name":null}}"#)).unwrap();

    assert_eq!(text(&values(&out, "Sheet1"), "A1"), "Name: ");
}

#[test]
fn test_missing_path_kept_verbatim() {
    let bytes = template(&[(0, 0, "Hello {{profile.name}}"), (1, 0, "{{ spaced }}")]);
    let out = interpolate(&bytes, &data("{}")).unwrap();

    let sheet = values(&out, "Sheet1");
    assert_eq!(text(&sheet, "A1"), "Hello {{profile.name}}");
    assert_eq!(text(&sheet, "A2"), "{{ spaced }}");
}

#[test]
fn test_numbers_and_indexes_render() {
    let bytes = template(&[(0, 0, "{{total}} / {{tags.1}} / {{ok}}")]);
    let out = interpolate(&bytes, &data(r#"{"total":120.5,"tags":["a","b"],"ok":true}"#)).unwrap();

    assert_eq!(text(&values(&out, "Sheet1"), "A1"), "120.5 / b / true");
}

// ═══════════════════════════════════════════════════════════════════════════
// ROW EXPANSION
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_array_row_expands_per_item() {
    let bytes = template(&[
        (0, 0, "Order"),
        (1, 0, "ID: [[items.id]]"),
        (1, 1, "Qty: [[items.qty]]"),
        (2, 0, "Total"),
    ]);
    let out = interpolate(
        &bytes,
        &data(r#"{"items":[{"id":"001","qty":2},{"id":"002","qty":1}]}"#),
    )
    .unwrap();

    let sheet = values(&out, "Sheet1");
    assert_eq!(text(&sheet, "A1"), "Order");
    assert_eq!(text(&sheet, "A2"), "ID: 001");
    assert_eq!(text(&sheet, "B2"), "Qty: 2");
    assert_eq!(text(&sheet, "A3"), "ID: 002");
    assert_eq!(text(&sheet, "B3"), "Qty: 1");
    assert_eq!(text(&sheet, "A4"), "Total");
}

#[test]
fn test_array_row_also_resolves_root_markers() {
    let bytes = template(&[(0, 0, "[[items.name]] ({{currency}})")]);
    let out = interpolate(
        &bytes,
        &data(r#"{"currency":"EUR","items":[{"name":"bolt"},{"name":"nut"}]}"#),
    )
    .unwrap();

    let sheet = values(&out, "Sheet1");
    assert_eq!(text(&sheet, "A1"), "bolt (EUR)");
    assert_eq!(text(&sheet, "A2"), "nut (EUR)");
}

#[test]
fn test_empty_array_deletes_template_row() {
    let bytes = template(&[(0, 0, "Header"), (1, 0, "[[items.id]]"), (2, 0, "Footer")]);
    let out = interpolate(&bytes, &data(r#"{"items":[]}"#)).unwrap();

    let sheet = values(&out, "Sheet1");
    assert_eq!(text(&sheet, "A1"), "Header");
    assert_eq!(text(&sheet, "A2"), "Footer");
    assert_eq!(text(&sheet, "A3"), "");
}

#[test]
fn test_absent_array_leaves_row_untouched() {
    let bytes = template(&[(0, 0, "{{title}}"), (1, 0, "[[items.id]]")]);
    let out = interpolate(&bytes, &data(r#"{"title":"Report"}"#)).unwrap();

    let sheet = values(&out, "Sheet1");
    assert_eq!(text(&sheet, "A1"), "Report");
    assert_eq!(text(&sheet, "A2"), "[[items.id]]");
}

#[test]
fn test_several_array_rows_in_one_sheet() {
    let bytes = template(&[
        (0, 0, "Items"),
        (1, 0, "[[items.id]]"),
        (2, 0, "Payments"),
        (3, 0, "[[payments.id]]"),
        (4, 0, "End"),
    ]);
    let (out, report) = interpolate_with_report(
        &bytes,
        &data(
            r#"{"items":[{"id":"a"},{"id":"b"},{"id":"c"}],
                "payments":[{"id":"x"},{"id":"y"}]}"#,
        ),
    )
    .unwrap();

    let sheet = values(&out, "Sheet1");
    let column: Vec<String> = (1..=8).map(|row| text(&sheet, &format!("A{}", row))).collect();
    assert_eq!(
        column,
        vec!["Items", "a", "b", "c", "Payments", "x", "y", "End"]
    );
    assert_eq!(report.rows_expanded(), 2);
    assert_eq!(report.rows_written(), 5);
}

#[test]
fn test_bare_array_key_renders_scalar_items() {
    let bytes = template(&[(0, 0, "Tag: [[tags]]")]);
    let out = interpolate(&bytes, &data(r#"{"tags":["red","blue"]}"#)).unwrap();

    let sheet = values(&out, "Sheet1");
    assert_eq!(text(&sheet, "A1"), "Tag: red");
    assert_eq!(text(&sheet, "A2"), "Tag: blue");
}

// ═══════════════════════════════════════════════════════════════════════════
// FORMULAS AND MERGES
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_formulas_follow_their_row() {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Sheet1").unwrap();
    worksheet.write_string(0, 0, "Item").unwrap();
    worksheet.write_string(1, 0, "[[items.name]]").unwrap();
    worksheet.write_number(1, 1, 2.0).unwrap();
    worksheet.write_number(1, 2, 3.0).unwrap();
    worksheet.write_formula(1, 3, Formula::new("=B2*C2")).unwrap();
    worksheet.write_formula(1, 4, Formula::new("=B2*$C$9")).unwrap();
    let bytes = workbook.save_to_buffer().unwrap();

    let out = interpolate(
        &bytes,
        &data(r#"{"items":[{"name":"a"},{"name":"b"},{"name":"c"}]}"#),
    )
    .unwrap();

    let sheet = formulas(&out, "Sheet1");
    assert_eq!(formula(&sheet, "D2"), "B2*C2");
    assert_eq!(formula(&sheet, "D3"), "B3*C3");
    assert_eq!(formula(&sheet, "D4"), "B4*C4");
    assert_eq!(formula(&sheet, "E4"), "B4*$C$9");

    let sheet = values(&out, "Sheet1");
    assert_eq!(text(&sheet, "B4"), "2");
}

#[test]
fn test_merges_replicated_on_each_row() {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Sheet1").unwrap();
    worksheet
        .merge_range(0, 0, 0, 2, "{{title}}", &Format::new())
        .unwrap();
    worksheet
        .merge_range(1, 0, 1, 1, "[[items.name]]", &Format::new())
        .unwrap();
    let bytes = workbook.save_to_buffer().unwrap();

    let out = interpolate(
        &bytes,
        &data(r#"{"title":"Parts","items":[{"name":"a"},{"name":"b"}]}"#),
    )
    .unwrap();

    let filled = load_workbook(&out).unwrap();
    let sheet = filled.worksheet("Sheet1").unwrap();
    let mut merges: Vec<String> = sheet.merge_ranges().iter().map(|m| m.to_string()).collect();
    merges.sort();
    assert_eq!(merges, vec!["A1:C1", "A2:B2", "A3:B3"]);

    let values = values(&out, "Sheet1");
    assert_eq!(text(&values, "A1"), "Parts");
    assert_eq!(text(&values, "A2"), "a");
    assert_eq!(text(&values, "A3"), "b");
}

// ═══════════════════════════════════════════════════════════════════════════
// PRESENTATION
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_formats_validations_and_widths_survive_expansion() {
    let money = Format::new().set_bold().set_num_format("$#,##0.00");
    let unlocked = Format::new().set_unlocked();
    let quantities = DataValidation::new()
        .allow_list_strings(&["1", "2", "5"])
        .unwrap();

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Sheet1").unwrap();
    worksheet.set_column_width(0, 40).unwrap();
    worksheet
        .write_string_with_format(0, 0, "Invoice {{number}}", &money)
        .unwrap();
    worksheet
        .write_string_with_format(1, 0, "[[items.name]]", &money)
        .unwrap();
    worksheet.write_string(1, 1, "[[items.qty]]").unwrap();
    worksheet.add_data_validation(1, 1, 1, 1, &quantities).unwrap();
    worksheet
        .write_string_with_format(1, 2, "[[items.note]]", &unlocked)
        .unwrap();
    worksheet
        .write_string_with_format(2, 0, "Total", &money)
        .unwrap();
    let bytes = workbook.save_to_buffer().unwrap();

    let out = interpolate(
        &bytes,
        &data(
            r#"{"number":"F-7","items":[
                {"name":"Bolt","qty":"5","note":""},
                {"name":"Nut","qty":"2","note":"spare"},
                {"name":"Washer","qty":"1","note":""}]}"#,
        ),
    )
    .unwrap();

    let filled = load_workbook(&out).unwrap();
    let sheet = filled.worksheet("Sheet1").unwrap();
    let choices = ValidationRule::List(vec!["1".to_string(), "2".to_string(), "5".to_string()]);

    for row in 1..=5 {
        let style = sheet
            .cell(row, 1)
            .and_then(|cell| cell.presentation.style.clone())
            .unwrap_or_else(|| panic!("row {row} lost its format"));
        assert!(style.bold);
        assert_eq!(style.num_format.as_deref(), Some("$#,##0.00"));
    }
    for row in 2..=4 {
        let cell = |col| sheet.cell(row, col).unwrap();
        assert_eq!(
            cell(2).presentation.validation.as_ref().map(|v| &v.rule),
            Some(&choices)
        );
        assert_eq!(
            cell(3).presentation.protection,
            Some(Protection {
                locked: false,
                hidden: false
            })
        );
    }
    assert!(sheet
        .cell(5, 2)
        .map_or(true, |cell| cell.presentation.validation.is_none()));
    assert_eq!(sheet.column_widths().get(&1), Some(&40.0));

    let range = values(&out, "Sheet1");
    assert_eq!(text(&range, "A1"), "Invoice F-7");
    assert_eq!(text(&range, "A3"), "Nut");
    assert_eq!(text(&range, "B4"), "1");
    assert_eq!(text(&range, "A5"), "Total");
}

// ═══════════════════════════════════════════════════════════════════════════
// MULTIPLE WORKSHEETS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_sheets_processed_in_order_and_plain_sheets_unchanged() {
    let mut workbook = Workbook::new();
    let cover = workbook.add_worksheet();
    cover.set_name("Cover").unwrap();
    cover.write_string(0, 0, "{{title}}").unwrap();
    let notes = workbook.add_worksheet();
    notes.set_name("Notes").unwrap();
    notes.write_string(0, 0, "plain text").unwrap();
    notes.write_number(1, 0, 42.0).unwrap();
    let bytes = workbook.save_to_buffer().unwrap();

    let out = interpolate(&bytes, &data(r#"{"title":"Q3"}"#)).unwrap();

    assert_eq!(open(&out).sheet_names(), vec!["Cover", "Notes"]);
    assert_eq!(text(&values(&out, "Cover"), "A1"), "Q3");
    let notes = values(&out, "Notes");
    assert_eq!(text(&notes, "A1"), "plain text");
    assert_eq!(notes.get_value((1, 0)), Some(&Data::Float(42.0)));
}

// ═══════════════════════════════════════════════════════════════════════════
// ERRORS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_mixed_array_keys_fail() {
    let bytes = template(&[(1, 0, "[[items.id]]"), (1, 1, "[[payments.id]]")]);
    let err = interpolate(&bytes, &data(r#"{"items":[],"payments":[]}"#)).unwrap_err();

    match &err {
        SheetfillError::MixedArrayKeys { sheet, row, .. } => {
            assert_eq!(sheet, "Sheet1");
            assert_eq!(*row, 2);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    let message = err.to_string();
    assert!(message.contains("items"));
    assert!(message.contains("payments"));
}

#[test]
fn test_non_array_value_fails() {
    let bytes = template(&[(0, 0, "x"), (2, 0, "[[items.id]]")]);
    let err = interpolate(&bytes, &data(r#"{"items":{"id":1}}"#)).unwrap_err();

    assert_eq!(
        err.to_string(),
        "[[items.*]] requires \"items\" to be an array in worksheet \"Sheet1\", row 3. Received: object"
    );
}

#[test]
fn test_null_array_fails() {
    let bytes = template(&[(0, 0, "[[items.id]]")]);
    let err = interpolate(&bytes, &data(r#"{"items":null}"#)).unwrap_err();

    assert!(matches!(
        err,
        SheetfillError::ArrayTypeMismatch { ref actual, .. } if actual == "null"
    ));
}

#[test]
fn test_invalid_template_fails() {
    let err = interpolate(b"PK not really a zip", &data("{}")).unwrap_err();
    assert!(matches!(err, SheetfillError::Import(_)));
}
