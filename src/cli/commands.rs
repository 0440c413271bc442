use crate::core::markers::parse_markers;
use crate::core::{classify_rows, ExpansionDirective, MarkerKind};
use crate::error::{SheetfillError, SheetfillResult};
use crate::excel::{column_letters, load_workbook, Workbook, WorksheetDocument};
use crate::pipeline::{interpolate_with_report, ExpansionReport};
use crate::types::Value;
use colored::Colorize;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Data file formats accepted by `fill`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DataFormat {
    Json,
    Yaml,
    /// Unknown extension: JSON first, then YAML
    Sniff,
}

impl DataFormat {
    fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("json") => DataFormat::Json,
            Some("yaml") | Some("yml") => DataFormat::Yaml,
            _ => DataFormat::Sniff,
        }
    }
}

/// Read the data context from a JSON or YAML file
pub fn load_data(path: &Path) -> SheetfillResult<Value> {
    let content = fs::read_to_string(path)?;
    let parsed = match DataFormat::from_path(path) {
        DataFormat::Json => Value::from_json_str(&content),
        DataFormat::Yaml => Value::from_yaml_str(&content),
        DataFormat::Sniff => {
            Value::from_json_str(&content).or_else(|_| Value::from_yaml_str(&content))
        }
    };
    parsed.map_err(|e| {
        SheetfillError::Data(format!("Failed to parse data file '{}': {}", path.display(), e))
    })
}

/// Execute the fill command
pub fn fill(template: PathBuf, data: PathBuf, output: PathBuf, verbose: bool) -> SheetfillResult<()> {
    println!("{}", "📄 Sheetfill - Filling template".bold().green());
    println!("   Template: {}", template.display());
    println!("   Data:     {}", data.display());
    println!("   Output:   {}\n", output.display());

    if verbose {
        println!("{}", "📖 Reading data file...".cyan());
    }
    let context = load_data(&data)?;

    if verbose {
        println!("{}", "📖 Reading template...".cyan());
    }
    let template_bytes = fs::read(&template)?;

    if verbose {
        println!("{}", "🧩 Expanding rows and resolving markers...".cyan());
    }
    let (filled, report) = match interpolate_with_report(&template_bytes, &context) {
        Ok(result) => result,
        Err(e) => {
            if let Some((sheet, row)) = e.location() {
                println!(
                    "{}",
                    format!("❌ Template error in worksheet '{}' at row {}", sheet, row)
                        .bold()
                        .red()
                );
            }
            return Err(e);
        }
    };

    if verbose {
        print_sheet_details(&report);
        println!("{}", "💾 Writing workbook...".cyan());
    }
    fs::write(&output, filled)?;

    println!("{}", "✅ Fill Complete!".bold().green());
    println!("   Worksheets:    {}", report.sheets.len());
    println!("   Rows expanded: {}", report.rows_expanded());
    println!("   Rows written:  {}", report.rows_written());
    if report.rows_skipped() > 0 {
        println!(
            "   {}",
            format!(
                "⚠️  {} template rows kept as-is (array not in data)",
                report.rows_skipped()
            )
            .yellow()
        );
    }
    println!("   Excel file: {}\n", output.display());

    Ok(())
}

fn print_sheet_details(report: &ExpansionReport) {
    for sheet in &report.sheets {
        println!("   📊 Worksheet: {}", sheet.sheet.bright_blue().bold());
        for row in &sheet.expanded {
            println!(
                "      row {} → {} rows from {}",
                row.row,
                row.rows_written,
                row.array_key.cyan()
            );
        }
        for directive in &sheet.skipped {
            println!(
                "      row {} kept ({} not in data)",
                directive.row,
                directive.array_key.yellow()
            );
        }
    }
    println!();
}

//==============================================================================
// inspect
//==============================================================================

/// A marker found in a template cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarkerEntry {
    pub cell: String,
    pub kind: &'static str,
    pub path: String,
    pub raw: String,
}

/// Markers and expansion directives of one worksheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SheetInspection {
    pub sheet: String,
    pub markers: Vec<MarkerEntry>,
    pub directives: Vec<ExpansionDirective>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Everything `inspect` knows about a template
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TemplateInspection {
    pub sheets: Vec<SheetInspection>,
}

impl TemplateInspection {
    /// Scan every worksheet without modifying it
    pub fn from_workbook(workbook: &Workbook) -> Self {
        let sheets = workbook
            .worksheets()
            .iter()
            .map(|sheet| {
                let markers = sheet
                    .cells()
                    .filter_map(|(row, col, cell)| {
                        cell.value.as_str().map(|text| (row, col, text))
                    })
                    .flat_map(|(row, col, text)| {
                        parse_markers(text).into_iter().map(move |marker| MarkerEntry {
                            cell: format!("{}{}", column_letters(col), row),
                            kind: match marker.kind {
                                MarkerKind::Scalar => "scalar",
                                MarkerKind::ArrayItem => "array",
                            },
                            path: marker.path,
                            raw: marker.raw,
                        })
                    })
                    .collect();

                let (directives, error) = match classify_rows(sheet) {
                    Ok(directives) => (directives, None),
                    Err(e) => (Vec::new(), Some(e.to_string())),
                };

                SheetInspection {
                    sheet: sheet.name().to_string(),
                    markers,
                    directives,
                    error,
                }
            })
            .collect();

        Self { sheets }
    }

    pub fn has_errors(&self) -> bool {
        self.sheets.iter().any(|sheet| sheet.error.is_some())
    }
}

/// Execute the inspect command
pub fn inspect(template: PathBuf, json: bool) -> SheetfillResult<()> {
    let bytes = fs::read(&template)?;
    let workbook = load_workbook(&bytes)?;
    let inspection = TemplateInspection::from_workbook(&workbook);

    if json {
        println!("{}", serde_json::to_string_pretty(&inspection)?);
    } else {
        print_inspection(&template, &inspection);
    }

    // Surface the first failing worksheet as the exit status
    if inspection.has_errors() {
        for sheet in workbook.worksheets() {
            classify_rows(sheet)?;
        }
    }

    Ok(())
}

fn print_inspection(template: &Path, inspection: &TemplateInspection) {
    println!("{}", "🔍 Sheetfill - Template Inspection".bold().green());
    println!("   Template: {}\n", template.display());

    for sheet in &inspection.sheets {
        println!("   📊 Worksheet: {}", sheet.sheet.bright_blue().bold());

        if sheet.markers.is_empty() {
            println!("      (no markers)");
        }
        for marker in &sheet.markers {
            let kind = match marker.kind {
                "array" => marker.kind.cyan(),
                _ => marker.kind.normal(),
            };
            println!("      {:<6} {:<7} {}", marker.cell, kind, marker.raw);
        }

        for directive in &sheet.directives {
            println!(
                "      {} row {} expands over {}",
                "↳".cyan(),
                directive.row,
                directive.array_key.bright_yellow()
            );
        }

        if let Some(error) = &sheet.error {
            println!("      {}", format!("❌ {}", error).bold().red());
        }
        println!();
    }
}

#[cfg(test)]
#[path = "commands_tests.rs"]
mod tests;
