//! Marker grammar: `{{path}}` scalar markers and `[[key.path]]` array-item markers.
//!
//! Scanning is a single forward pass per marker kind. Replaced text is never
//! re-scanned within the same pass, and a marker that cannot be resolved is
//! written back exactly as it appeared in the template.

use super::path_resolver::resolve;
use crate::types::Value;
use regex::{Captures, Regex};
use std::ops::Range;
use std::sync::LazyLock;

static SCALAR_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([^}]+)\}\}").expect("scalar marker pattern"));

static ARRAY_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\[\s*([^\].]+)(?:\.([^\]]+))?\]\]").expect("array marker pattern")
});

static ANY_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([^}]+)\}\}|\[\[\s*([^\].]+)(?:\.([^\]]+))?\]\]")
        .expect("marker pattern")
});

/// Which scope a marker resolves against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerKind {
    /// `{{path}}`, resolved against the data context root
    Scalar,
    /// `[[key.path]]`, resolved against one element of the array under `key`
    ArrayItem,
}

/// One marker occurrence inside a cell's text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    pub kind: MarkerKind,
    /// Dotted path with surrounding whitespace removed. For array-item markers
    /// this includes the array key as its first segment.
    pub path: String,
    /// Literal text matched, delimiters included
    pub raw: String,
    /// Byte range of `raw` in the scanned text
    pub span: Range<usize>,
}

impl Marker {
    /// Array key of an array-item marker
    pub fn array_key(&self) -> Option<&str> {
        match self.kind {
            MarkerKind::ArrayItem => Some(self.path.split('.').next().unwrap_or(&self.path)),
            MarkerKind::Scalar => None,
        }
    }

    /// Property path below the array key, if any (`[[items.qty]]` -> `qty`)
    pub fn property_path(&self) -> Option<&str> {
        match self.kind {
            MarkerKind::ArrayItem => self.path.split_once('.').map(|(_, rest)| rest),
            MarkerKind::Scalar => None,
        }
    }
}

/// List every marker in `text`, in order of appearance
pub fn parse_markers(text: &str) -> Vec<Marker> {
    ANY_MARKER
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let (kind, path) = if let Some(path) = caps.get(1) {
                (MarkerKind::Scalar, path.as_str().trim().to_string())
            } else {
                let key = caps.get(2)?.as_str().trim();
                let path = match caps.get(3) {
                    Some(prop) => format!("{}.{}", key, prop.as_str().trim()),
                    None => key.to_string(),
                };
                (MarkerKind::ArrayItem, path)
            };
            Some(Marker {
                kind,
                path,
                raw: whole.as_str().to_string(),
                span: whole.range(),
            })
        })
        .collect()
}

/// Outcome of classifying one row's cells
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowBinding {
    /// No array-item markers in the row
    Unbound,
    /// Every array-item marker in the row uses this key
    Bound(String),
    /// The row references two different array keys
    Mixed { first: String, second: String },
}

/// Classify a row from the text of its cells, in column order.
///
/// `first` is the key seen first when scanning left to right; `second` is the
/// first key that differs from it.
pub fn classify_row<'a, I>(texts: I) -> RowBinding
where
    I: IntoIterator<Item = &'a str>,
{
    let mut bound: Option<String> = None;
    for text in texts {
        for caps in ARRAY_MARKER.captures_iter(text) {
            let Some(key) = caps.get(1).map(|key| key.as_str().trim()) else {
                continue;
            };
            match &bound {
                None => bound = Some(key.to_string()),
                Some(first) if first != key => {
                    return RowBinding::Mixed {
                        first: first.clone(),
                        second: key.to_string(),
                    };
                }
                Some(_) => {}
            }
        }
    }
    match bound {
        Some(key) => RowBinding::Bound(key),
        None => RowBinding::Unbound,
    }
}

/// Replace `[[array_key.path]]` markers with values from `item`.
///
/// Markers bound to a different key, and markers whose path does not resolve
/// within `item`, are left as they were. A bare `[[array_key]]` renders the
/// item itself when it is a scalar.
pub fn substitute_array_items(text: &str, array_key: &str, item: &Value) -> String {
    if !text.contains("[[") {
        return text.to_string();
    }
    ARRAY_MARKER
        .replace_all(text, |caps: &Captures| {
            let raw = &caps[0];
            let key = caps[1].trim();
            if key != array_key {
                return raw.to_string();
            }
            let resolved = match caps.get(2) {
                Some(prop) => resolve(item, prop.as_str().trim()),
                None => match item {
                    Value::Sequence(_) | Value::Mapping(_) => None,
                    scalar => Some(scalar),
                },
            };
            match resolved {
                Some(value) => value.render(),
                None => raw.to_string(),
            }
        })
        .into_owned()
}

/// Replace `{{path}}` markers with values resolved from `root`.
///
/// Unresolvable paths keep the marker text; values that resolve to null
/// render as the empty string.
pub fn substitute_scalars(text: &str, root: &Value) -> String {
    if !text.contains("{{") {
        return text.to_string();
    }
    SCALAR_MARKER
        .replace_all(text, |caps: &Captures| match resolve(root, caps[1].trim()) {
            Some(value) => value.render(),
            None => caps[0].to_string(),
        })
        .into_owned()
}
