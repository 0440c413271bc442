//! Cell presentation read straight from the .xlsx package
//!
//! calamine exposes values, formulas and merges but not formatting. This
//! module opens the package with `zip`, walks `xl/styles.xml` and each
//! worksheet part with `quick-xml`, and maps cell formats, data validations
//! and column widths onto [`Presentation`].

use super::cell_ref::{CellRef, MergeRange};
use super::document::{
    BorderStyle, CellStyle, DataValidation, HorizontalAlign, NumberRule, Presentation,
    Protection, ValidationRule,
};
use crate::error::{SheetfillError, SheetfillResult};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader as XmlReader;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;
use std::io::{Cursor, Read};
use tracing::{debug, warn};
use zip::ZipArchive;

/// Validation ranges larger than this are not spread onto cells
const MAX_VALIDATION_CELLS: u64 = 10_000;

/// Last column of an Excel worksheet
const MAX_COLUMN: u32 = 16_384;

/// Presentation of one worksheet as stored in its package part
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SheetPresentation {
    /// `(row, column)` to the cell's non-default presentation
    pub cells: BTreeMap<(u32, u32), Presentation>,
    /// Column number to width in characters
    pub column_widths: BTreeMap<u32, f64>,
}

/// Read the presentation of every worksheet in the package, keyed by sheet name
pub fn read_presentation(bytes: &[u8]) -> SheetfillResult<HashMap<String, SheetPresentation>> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| import_error("package", e))?;

    let Some(workbook_xml) = read_part(&mut archive, "xl/workbook.xml")? else {
        return Ok(HashMap::new());
    };
    let relationships = match read_part(&mut archive, "xl/_rels/workbook.xml.rels")? {
        Some(xml) => parse_relationships(&xml)?,
        None => HashMap::new(),
    };
    let styles = match read_part(&mut archive, "xl/styles.xml")? {
        Some(xml) => StyleTable::parse(&xml)?,
        None => StyleTable::default(),
    };

    let mut sheets = HashMap::new();
    for (name, rel_id) in parse_sheet_list(&workbook_xml)? {
        let Some(target) = relationships.get(&rel_id) else {
            warn!(sheet = %name, rel_id = %rel_id, "no relationship for worksheet");
            continue;
        };
        let path = part_path(target);
        let Some(xml) = read_part(&mut archive, &path)? else {
            warn!(sheet = %name, path = %path, "worksheet part missing from package");
            continue;
        };

        let presentation = parse_sheet(&xml, &styles)?;
        debug!(
            sheet = %name,
            cells = presentation.cells.len(),
            columns = presentation.column_widths.len(),
            "read worksheet presentation"
        );
        sheets.insert(name, presentation);
    }

    Ok(sheets)
}

fn import_error(context: &str, e: impl Display) -> SheetfillError {
    SheetfillError::Import(format!("Failed to read {}: {}", context, e))
}

fn read_part(
    archive: &mut ZipArchive<Cursor<&[u8]>>,
    path: &str,
) -> SheetfillResult<Option<String>> {
    let mut file = match archive.by_name(path) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(import_error(path, e)),
    };
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    Ok(Some(content))
}

/// Relationship targets are relative to `xl/` unless they are absolute
fn part_path(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target),
    }
}

//==============================================================================
// XML helpers
//==============================================================================

/// Attributes of one element, keyed by local name
struct Attrs(HashMap<Vec<u8>, String>);

impl Attrs {
    fn of(element: &BytesStart<'_>) -> SheetfillResult<Self> {
        let mut map = HashMap::new();
        for attr in element.attributes() {
            let attr = attr.map_err(|e| import_error("XML attribute", e))?;
            let value = attr
                .unescape_value()
                .map_err(|e| import_error("XML attribute", e))?;
            map.insert(attr.key.local_name().as_ref().to_vec(), value.into_owned());
        }
        Ok(Self(map))
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key.as_bytes()).map(String::as_str)
    }

    fn number<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| v.trim().parse().ok())
    }

    /// OOXML boolean attribute, `default` when absent
    fn flag(&self, key: &str, default: bool) -> bool {
        self.get(key)
            .map_or(default, |v| v == "1" || v.eq_ignore_ascii_case("true"))
    }

    /// Toggle elements such as `<b/>` are on unless `val` turns them off
    fn toggle(&self) -> bool {
        !matches!(self.get("val"), Some("0") | Some("false") | Some("none"))
    }

    /// `rgb="FFRRGGBB"` as `0xRRGGBB`; theme and indexed colors are ignored
    fn rgb(&self) -> Option<u32> {
        let argb = self.get("rgb")?;
        let rgb = argb.get(argb.len().checked_sub(6)?..)?;
        u32::from_str_radix(rgb, 16).ok()
    }
}

fn xml_reader(xml: &str) -> XmlReader<&[u8]> {
    let mut reader = XmlReader::from_str(xml);
    reader.config_mut().trim_text(true);
    reader
}

fn parse_sheet_list(xml: &str) -> SheetfillResult<Vec<(String, String)>> {
    let mut reader = xml_reader(xml);
    let mut buf = Vec::new();
    let mut sheets = Vec::new();

    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| import_error("xl/workbook.xml", e))?
        {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                let attrs = Attrs::of(&e)?;
                if let (Some(name), Some(id)) = (attrs.get("name"), attrs.get("id")) {
                    sheets.push((name.to_string(), id.to_string()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(sheets)
}

fn parse_relationships(xml: &str) -> SheetfillResult<HashMap<String, String>> {
    let mut reader = xml_reader(xml);
    let mut buf = Vec::new();
    let mut relationships = HashMap::new();

    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| import_error("workbook relationships", e))?
        {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                let attrs = Attrs::of(&e)?;
                if let (Some(id), Some(target)) = (attrs.get("Id"), attrs.get("Target")) {
                    relationships.insert(id.to_string(), target.to_string());
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(relationships)
}

//==============================================================================
// styles.xml
//==============================================================================

#[derive(Debug, Clone, PartialEq, Default)]
struct FontSpec {
    bold: bool,
    italic: bool,
    underline: bool,
    name: Option<String>,
    size: Option<f64>,
    color: Option<u32>,
}

/// One `<xf>` of `<cellXfs>`, with indexes into the other tables
#[derive(Debug, Clone, Default)]
struct FormatSpec {
    num_fmt_id: u32,
    font_id: usize,
    fill_id: usize,
    border_id: usize,
    align: Option<HorizontalAlign>,
    wrap_text: bool,
    protection: Option<Protection>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StyleSection {
    Outside,
    Fonts,
    Fills,
    Borders,
    CellFormats,
}

#[derive(Debug, Default)]
struct StyleTable {
    num_formats: HashMap<u32, String>,
    fonts: Vec<FontSpec>,
    fills: Vec<Option<u32>>,
    borders: Vec<Option<BorderStyle>>,
    /// Resolved `<cellXfs>`, indexed by a cell's `s` attribute
    cell_formats: Vec<Presentation>,
}

impl StyleTable {
    fn parse(xml: &str) -> SheetfillResult<Self> {
        let mut reader = xml_reader(xml);
        let mut buf = Vec::new();
        let mut table = StyleTable::default();
        let mut formats: Vec<FormatSpec> = Vec::new();
        let mut section = StyleSection::Outside;
        let mut solid_fill = false;

        loop {
            buf.clear();
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|e| import_error("xl/styles.xml", e))?;
            let (element, opens) = match event {
                Event::Start(e) => (e, true),
                Event::Empty(e) => (e, false),
                Event::End(e) => {
                    if matches!(
                        e.local_name().as_ref(),
                        b"fonts" | b"fills" | b"borders" | b"cellXfs"
                    ) {
                        section = StyleSection::Outside;
                    }
                    continue;
                }
                Event::Eof => break,
                _ => continue,
            };

            let attrs = Attrs::of(&element)?;
            match (section, element.local_name().as_ref()) {
                (_, b"numFmt") => {
                    if let (Some(id), Some(code)) =
                        (attrs.number("numFmtId"), attrs.get("formatCode"))
                    {
                        table.num_formats.insert(id, code.to_string());
                    }
                }
                (_, b"fonts") if opens => section = StyleSection::Fonts,
                (_, b"fills") if opens => section = StyleSection::Fills,
                (_, b"borders") if opens => section = StyleSection::Borders,
                (_, b"cellXfs") if opens => section = StyleSection::CellFormats,

                (StyleSection::Fonts, b"font") => table.fonts.push(FontSpec::default()),
                (StyleSection::Fonts, tag) => {
                    if let Some(font) = table.fonts.last_mut() {
                        match tag {
                            b"b" => font.bold = attrs.toggle(),
                            b"i" => font.italic = attrs.toggle(),
                            b"u" => font.underline = attrs.toggle(),
                            b"sz" => font.size = attrs.number("val"),
                            b"name" => font.name = attrs.get("val").map(str::to_string),
                            b"color" => font.color = attrs.rgb(),
                            _ => {}
                        }
                    }
                }

                (StyleSection::Fills, b"fill") => table.fills.push(None),
                (StyleSection::Fills, b"patternFill") => {
                    solid_fill = attrs.get("patternType") == Some("solid");
                }
                (StyleSection::Fills, b"fgColor") if solid_fill => {
                    if let Some(fill) = table.fills.last_mut() {
                        *fill = attrs.rgb();
                    }
                }

                (StyleSection::Borders, b"border") => table.borders.push(None),
                (StyleSection::Borders, b"left" | b"right" | b"top" | b"bottom") => {
                    let style = attrs.get("style").and_then(border_style);
                    if let (Some(border), Some(style)) = (table.borders.last_mut(), style) {
                        border.get_or_insert(style);
                    }
                }

                (StyleSection::CellFormats, b"xf") => formats.push(FormatSpec {
                    num_fmt_id: attrs.number("numFmtId").unwrap_or(0),
                    font_id: attrs.number("fontId").unwrap_or(0),
                    fill_id: attrs.number("fillId").unwrap_or(0),
                    border_id: attrs.number("borderId").unwrap_or(0),
                    ..FormatSpec::default()
                }),
                (StyleSection::CellFormats, b"alignment") => {
                    if let Some(format) = formats.last_mut() {
                        format.align = match attrs.get("horizontal") {
                            Some("left") => Some(HorizontalAlign::Left),
                            Some("center") => Some(HorizontalAlign::Center),
                            Some("right") => Some(HorizontalAlign::Right),
                            _ => None,
                        };
                        format.wrap_text = attrs.flag("wrapText", false);
                    }
                }
                (StyleSection::CellFormats, b"protection") => {
                    if let Some(format) = formats.last_mut() {
                        format.protection = Some(Protection {
                            locked: attrs.flag("locked", true),
                            hidden: attrs.flag("hidden", false),
                        });
                    }
                }
                _ => {}
            }
        }

        table.cell_formats = formats.iter().map(|format| table.resolve(format)).collect();
        Ok(table)
    }

    /// Presentation of one cell format. Font properties equal to the
    /// workbook's default font are left unset.
    fn resolve(&self, format: &FormatSpec) -> Presentation {
        let default_font = self.fonts.first().cloned().unwrap_or_default();
        let font = self.fonts.get(format.font_id).cloned().unwrap_or_default();

        let style = CellStyle {
            bold: font.bold,
            italic: font.italic,
            underline: font.underline,
            font_name: font.name.filter(|name| Some(name) != default_font.name.as_ref()),
            font_size: font.size.filter(|size| Some(*size) != default_font.size),
            font_color: font.color.filter(|color| Some(*color) != default_font.color),
            fill_color: self.fills.get(format.fill_id).copied().flatten(),
            num_format: self.number_format(format.num_fmt_id),
            align: format.align,
            wrap_text: format.wrap_text,
            border: self.borders.get(format.border_id).copied().flatten(),
        };

        Presentation {
            style: (style != CellStyle::default()).then_some(style),
            validation: None,
            protection: format.protection.filter(|p| *p != Protection::default()),
        }
    }

    fn number_format(&self, id: u32) -> Option<String> {
        if id == 0 {
            return None;
        }
        self.num_formats
            .get(&id)
            .cloned()
            .or_else(|| builtin_number_format(id).map(str::to_string))
    }

    fn cell_format(&self, index: usize) -> Option<&Presentation> {
        self.cell_formats.get(index)
    }
}

fn border_style(style: &str) -> Option<BorderStyle> {
    match style {
        "none" => None,
        "medium" | "mediumDashed" | "mediumDashDot" | "mediumDashDotDot" => {
            Some(BorderStyle::Medium)
        }
        "thick" | "double" => Some(BorderStyle::Thick),
        _ => Some(BorderStyle::Thin),
    }
}

/// Number formats Excel knows by id without writing them to styles.xml
fn builtin_number_format(id: u32) -> Option<&'static str> {
    let code = match id {
        1 => "0",
        2 => "0.00",
        3 => "#,##0",
        4 => "#,##0.00",
        9 => "0%",
        10 => "0.00%",
        11 => "0.00E+00",
        12 => "# ?/?",
        13 => "# ??/??",
        14 => "mm-dd-yy",
        15 => "d-mmm-yy",
        16 => "d-mmm",
        17 => "mmm-yy",
        18 => "h:mm AM/PM",
        19 => "h:mm:ss AM/PM",
        20 => "h:mm",
        21 => "h:mm:ss",
        22 => "m/d/yy h:mm",
        37 => "#,##0 ;(#,##0)",
        38 => "#,##0 ;[Red](#,##0)",
        39 => "#,##0.00;(#,##0.00)",
        40 => "#,##0.00;[Red](#,##0.00)",
        45 => "mm:ss",
        46 => "[h]:mm:ss",
        47 => "mm:ss.0",
        48 => "##0.0E+0",
        49 => "@",
        _ => return None,
    };
    Some(code)
}

//==============================================================================
// Worksheet parts
//==============================================================================

/// Stored column widths carry 5 pixels of padding at 7 pixels per character
fn character_width(stored: f64) -> f64 {
    let pixels = (stored * 7.0).round();
    if pixels >= 12.0 {
        (pixels - 5.0) / 7.0
    } else {
        pixels / 12.0
    }
}

#[derive(Debug, Clone, Copy)]
enum FormulaSlot {
    First,
    Second,
}

/// A `<dataValidation>` being read
struct PendingValidation {
    attrs: Attrs,
    formula1: Option<String>,
    formula2: Option<String>,
}

fn parse_sheet(xml: &str, styles: &StyleTable) -> SheetfillResult<SheetPresentation> {
    let mut reader = xml_reader(xml);
    let mut buf = Vec::new();
    let mut sheet = SheetPresentation::default();
    let mut pending: Option<PendingValidation> = None;
    let mut slot: Option<FormulaSlot> = None;

    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| import_error("worksheet", e))?
        {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"col" => {
                let attrs = Attrs::of(&e)?;
                if let (Some(min), Some(max), Some(width)) = (
                    attrs.number::<u32>("min"),
                    attrs.number::<u32>("max"),
                    attrs.number::<f64>("width"),
                ) {
                    for column in min.max(1)..=max.min(MAX_COLUMN) {
                        sheet.column_widths.insert(column, character_width(width));
                    }
                }
            }
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"c" => {
                let attrs = Attrs::of(&e)?;
                let position = attrs.get("r").and_then(CellRef::parse);
                let format = attrs
                    .number::<usize>("s")
                    .and_then(|index| styles.cell_format(index));
                if let (Some(cell_ref), Some(format)) = (position, format) {
                    if !format.is_default() {
                        sheet
                            .cells
                            .insert((cell_ref.row, cell_ref.column), format.clone());
                    }
                }
            }
            Event::Start(e) if e.local_name().as_ref() == b"dataValidation" => {
                pending = Some(PendingValidation {
                    attrs: Attrs::of(&e)?,
                    formula1: None,
                    formula2: None,
                });
            }
            Event::Start(e) if pending.is_some() => {
                slot = match e.local_name().as_ref() {
                    b"formula1" => Some(FormulaSlot::First),
                    b"formula2" => Some(FormulaSlot::Second),
                    _ => None,
                };
            }
            Event::Text(t) => {
                if let (Some(validation), Some(slot)) = (pending.as_mut(), slot) {
                    let text = t
                        .unescape()
                        .map_err(|e| import_error("data validation", e))?
                        .into_owned();
                    match slot {
                        FormulaSlot::First => validation.formula1 = Some(text),
                        FormulaSlot::Second => validation.formula2 = Some(text),
                    }
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"formula1" | b"formula2" => slot = None,
                b"dataValidation" => {
                    if let Some(validation) = pending.take() {
                        apply_validation(&mut sheet, validation);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(sheet)
}

/// Spread a validation over the cells of its `sqref`
fn apply_validation(sheet: &mut SheetPresentation, pending: PendingValidation) {
    let sqref = pending.attrs.get("sqref").unwrap_or_default().to_string();
    let Some(validation) = build_validation(&pending) else {
        warn!(
            sqref = %sqref,
            kind = pending.attrs.get("type").unwrap_or("none"),
            "unsupported data validation dropped"
        );
        return;
    };

    for area in sqref.split_whitespace() {
        let range = if area.contains(':') {
            MergeRange::parse(area)
        } else {
            CellRef::parse(area).map(|c| MergeRange::new(c.row, c.column, c.row, c.column))
        };
        let Some(range) = range else {
            warn!(area, "unparseable data validation range");
            continue;
        };

        let cells = u64::from(range.end_row - range.start_row + 1)
            * u64::from(range.end_col - range.start_col + 1);
        if cells > MAX_VALIDATION_CELLS {
            warn!(area, cells, "data validation range too large, dropped");
            continue;
        }

        for row in range.start_row..=range.end_row {
            for column in range.start_col..=range.end_col {
                sheet.cells.entry((row, column)).or_default().validation =
                    Some(validation.clone());
            }
        }
    }
}

fn build_validation(pending: &PendingValidation) -> Option<DataValidation> {
    let attrs = &pending.attrs;
    let formula1 = pending.formula1.as_deref().map(strip_equals);
    let formula2 = pending.formula2.as_deref().map(strip_equals);

    let rule = match attrs.get("type")? {
        "list" => list_rule(formula1?),
        "whole" => ValidationRule::WholeNumber(number_rule(
            attrs.get("operator"),
            formula1?,
            formula2,
        )?),
        "decimal" => ValidationRule::Decimal(number_rule(
            attrs.get("operator"),
            formula1?,
            formula2,
        )?),
        "custom" => ValidationRule::Custom(formula1?.to_string()),
        _ => return None,
    };

    Some(DataValidation {
        rule,
        ignore_blank: attrs.flag("allowBlank", false),
        error_message: attrs.get("error").map(str::to_string),
    })
}

fn strip_equals(formula: &str) -> &str {
    let trimmed = formula.trim();
    trimmed.strip_prefix('=').unwrap_or(trimmed)
}

/// `"a,b,c"` is a literal choice list; anything else is a source range
fn list_rule(formula: &str) -> ValidationRule {
    match formula
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    {
        Some(choices) => ValidationRule::List(
            choices
                .replace("\"\"", "\"")
                .split(',')
                .map(str::to_string)
                .collect(),
        ),
        None => ValidationRule::ListSource(formula.to_string()),
    }
}

fn number_rule<T: std::str::FromStr + Copy>(
    operator: Option<&str>,
    formula1: &str,
    formula2: Option<&str>,
) -> Option<NumberRule<T>> {
    let first: T = formula1.parse().ok()?;
    let second = || formula2.and_then(|f| f.parse::<T>().ok());
    let rule = match operator.unwrap_or("between") {
        "between" => NumberRule::Between(first, second()?),
        "notBetween" => NumberRule::NotBetween(first, second()?),
        "equal" => NumberRule::EqualTo(first),
        "notEqual" => NumberRule::NotEqualTo(first),
        "greaterThan" => NumberRule::GreaterThan(first),
        "greaterThanOrEqual" => NumberRule::GreaterThanOrEqualTo(first),
        "lessThan" => NumberRule::LessThan(first),
        "lessThanOrEqual" => NumberRule::LessThanOrEqualTo(first),
        _ => return None,
    };
    Some(rule)
}
