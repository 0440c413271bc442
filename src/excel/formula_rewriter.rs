//! Row-relative reference rewriting for cloned template rows
//!
//! When a template row is copied to a new position, references that point at
//! the template row itself (`B2*C2` on row 2) must follow the copy (`B5*C5` on
//! row 5). References to any other row, absolute rows (`B$2`), references
//! qualified by a sheet name (`Data!B2`) and text inside string literals are
//! left alone.

use regex::{Captures, Regex};
use std::sync::LazyLock;

static REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""(?:[^"]|"")*"|(\$?)([A-Z]{1,3})(\d+)"#).expect("cell reference pattern")
});

/// Rewrite references to `from_row` so they point at `to_row`
///
/// Example:
/// - Input: `=B2*C2`, from 2 to 5
/// - Output: `=B5*C5`
pub fn rewrite_row_references(formula: &str, from_row: u32, to_row: u32) -> String {
    if from_row == to_row {
        return formula.to_string();
    }

    REFERENCE
        .replace_all(formula, |caps: &Captures| {
            let whole = &caps[0];
            let (Some(full), Some(letters), Some(digits)) =
                (caps.get(0), caps.get(2), caps.get(3))
            else {
                // String literal
                return whole.to_string();
            };

            let standalone =
                boundary_before(formula, full.start()) && boundary_after(formula, full.end());
            if !standalone || digits.as_str().parse::<u32>().ok() != Some(from_row) {
                return whole.to_string();
            }

            format!("{}{}{}", &caps[1], letters.as_str(), to_row)
        })
        .into_owned()
}

fn boundary_before(formula: &str, start: usize) -> bool {
    match formula[..start].chars().next_back() {
        None => true,
        Some(c) => !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '$' | '!')),
    }
}

fn boundary_after(formula: &str, end: usize) -> bool {
    match formula[end..].chars().next() {
        None => true,
        Some(c) => !(c.is_ascii_alphanumeric() || matches!(c, '_' | '(' | '!')),
    }
}
