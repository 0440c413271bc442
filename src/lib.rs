//! Sheetfill - spreadsheet template interpolation
//!
//! This library fills .xlsx templates from a JSON/YAML data tree.
//!
//! # Features
//!
//! - `{{path.to.value}}` markers resolved against the data root
//! - Rows carrying `[[items.field]]` markers replicated once per array element
//! - Formula row references rewritten to point at each replicated row
//! - Cell style, data validation, protection and merges carried onto new rows
//! - Unresolved markers left verbatim so templates can be filled in stages
//!
//! # Example
//!
//! ```no_run
//! use royalbit_sheetfill::{interpolate, Value};
//!
//! let template = std::fs::read("invoice-template.xlsx")?;
//! let data = Value::from_json_str(r#"{"user": {"name": "Ana"}, "items": []}"#)?;
//!
//! let filled = interpolate(&template, &data)?;
//! std::fs::write("invoice.xlsx", filled)?;
//! # Ok::<(), royalbit_sheetfill::error::SheetfillError>(())
//! ```

pub mod cli;
pub mod core;
pub mod error;
pub mod excel;
pub mod pipeline;
pub mod types;

// Re-export commonly used types
pub use error::{SheetfillError, SheetfillResult};
pub use pipeline::{interpolate, interpolate_with_report, interpolate_workbook, ExpansionReport};
pub use types::Value;
