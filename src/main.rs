use clap::{Parser, Subcommand};
use royalbit_sheetfill::cli;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sheetfill")]
#[command(about = "Fill .xlsx templates with {{markers}} and [[array]] rows from JSON/YAML data.")]
#[command(long_about = "Sheetfill - Spreadsheet template interpolation

Turns an .xlsx template plus a JSON/YAML data file into a filled workbook.
Styles, data validation, protection and merges follow the rows they sit on.

MARKERS:
  {{user.name}}     Replaced with the value at that path in the data
  [[items.qty]]     Row is repeated once per element of 'items'
  {{missing.key}}   Left as-is when the path is not in the data

COMMANDS:
  fill      - Fill a template with data and write the result
  inspect   - List the markers and row expansions a template contains

EXAMPLES:
  sheetfill fill invoice.xlsx order.json -o invoice-42.xlsx
  sheetfill fill report.xlsx data.yaml -o out.xlsx --verbose
  sheetfill inspect invoice.xlsx --json

Set RUST_LOG=royalbit_sheetfill=debug for a trace of every expanded row.")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(long_about = "Fill a template workbook with data.

Every worksheet is processed in order:
  1. Rows carrying [[key.path]] markers are bound to the array 'key'
  2. Each bound row is replaced by one row per array element
     (formulas on the row are rewritten to point at the new row)
  3. {{path}} markers in every remaining cell are resolved

A row mixing two array keys, or an array key whose data is not a list,
aborts the run and no output file is written.

DATA FORMATS:
  .json         JSON
  .yaml / .yml  YAML
  other         JSON, then YAML

EXAMPLES:
  sheetfill fill invoice.xlsx order.json -o invoice-42.xlsx
  SHEETFILL_OUTPUT=out.xlsx sheetfill fill invoice.xlsx order.yaml")]
    /// Fill a template with JSON/YAML data
    Fill {
        /// Path to the template workbook (.xlsx)
        template: PathBuf,

        /// Path to the data file (.json, .yaml, .yml)
        data: PathBuf,

        /// Output workbook path
        #[arg(short, long, env = "SHEETFILL_OUTPUT")]
        output: PathBuf,

        /// Show each worksheet's expanded rows
        #[arg(short, long)]
        verbose: bool,
    },

    #[command(long_about = "Inspect a template without filling it.

Lists every {{scalar}} and [[array]] marker per worksheet and cell, and the
rows that would be expanded. Exits with an error if a row mixes two array
keys.

EXAMPLES:
  sheetfill inspect invoice.xlsx
  sheetfill inspect invoice.xlsx --json > markers.json")]
    /// List markers and row expansions in a template
    Inspect {
        /// Path to the template workbook (.xlsx)
        template: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "royalbit_sheetfill=warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Fill {
            template,
            data,
            output,
            verbose,
        } => cli::fill(template, data, output, verbose)?,

        Commands::Inspect { template, json } => cli::inspect(template, json)?,
    }

    Ok(())
}
