//! A1-style cell references and merge ranges

use std::fmt;

/// Convert a 1-based column number to Excel column letters
///
/// Examples:
/// - 1 → A
/// - 26 → Z
/// - 27 → AA
pub fn column_letters(column: u32) -> String {
    let mut result = String::new();
    let mut idx = column.saturating_sub(1);

    loop {
        let remainder = idx % 26;
        result.insert(0, (b'A' + remainder as u8) as char);
        if idx < 26 {
            break;
        }
        idx = idx / 26 - 1;
    }

    result
}

/// Convert Excel column letters to a 1-based column number (A → 1, AA → 27)
pub fn column_number(letters: &str) -> Option<u32> {
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }
    letters.chars().try_fold(0u32, |acc, ch| {
        ch.is_ascii_uppercase()
            .then(|| acc * 26 + (ch as u32 - 'A' as u32 + 1))
    })
}

/// A single cell reference such as `B7` or `$B7`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRef {
    pub row: u32,
    pub column: u32,
}

impl CellRef {
    pub fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }

    /// Parse `[$]<letters>[$]<digits>`; anything else is `None`
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.strip_prefix('$').unwrap_or(text);
        let split = text.find(|c: char| !c.is_ascii_uppercase())?;
        let (letters, rest) = text.split_at(split);
        let digits = rest.strip_prefix('$').unwrap_or(rest);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let row: u32 = digits.parse().ok()?;
        if row == 0 {
            return None;
        }
        Some(Self {
            row,
            column: column_number(letters)?,
        })
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_letters(self.column), self.row)
    }
}

/// Rectangular merged region, 1-based and inclusive on both corners
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MergeRange {
    pub start_row: u32,
    pub start_col: u32,
    pub end_row: u32,
    pub end_col: u32,
}

impl MergeRange {
    pub fn new(start_row: u32, start_col: u32, end_row: u32, end_col: u32) -> Self {
        Self {
            start_row: start_row.min(end_row),
            start_col: start_col.min(end_col),
            end_row: start_row.max(end_row),
            end_col: start_col.max(end_col),
        }
    }

    /// Parse `"<cellRef>:<cellRef>"`. Malformed input yields `None`.
    pub fn parse(range: &str) -> Option<Self> {
        let (start, end) = range.trim().split_once(':')?;
        let start = CellRef::parse(start)?;
        let end = CellRef::parse(end)?;
        Some(Self::new(start.row, start.column, end.row, end.column))
    }

    pub fn includes_row(&self, row: u32) -> bool {
        self.start_row <= row && row <= self.end_row
    }

    /// Same column span, moved down (or up) by `offset` rows.
    ///
    /// `None` if the move would push the range above row 1.
    pub fn shifted(&self, offset: i64) -> Option<Self> {
        let start_row = u32::try_from(i64::from(self.start_row) + offset).ok()?;
        let end_row = u32::try_from(i64::from(self.end_row) + offset).ok()?;
        if start_row == 0 {
            return None;
        }
        Some(Self {
            start_row,
            end_row,
            ..*self
        })
    }

    pub fn overlaps(&self, other: &MergeRange) -> bool {
        self.start_row <= other.end_row
            && other.start_row <= self.end_row
            && self.start_col <= other.end_col
            && other.start_col <= self.end_col
    }

    /// A merge of a single cell is meaningless to Excel
    pub fn is_single_cell(&self) -> bool {
        self.start_row == self.end_row && self.start_col == self.end_col
    }
}

impl fmt::Display for MergeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}",
            CellRef::new(self.start_row, self.start_col),
            CellRef::new(self.end_row, self.end_col)
        )
    }
}

/// True if `range` parses and covers `row`
pub fn merge_range_includes_row(range: &str, row: u32) -> bool {
    MergeRange::parse(range).is_some_and(|parsed| parsed.includes_row(row))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_letters() {
        assert_eq!(column_letters(1), "A");
        assert_eq!(column_letters(2), "B");
        assert_eq!(column_letters(26), "Z");
        assert_eq!(column_letters(27), "AA");
        assert_eq!(column_letters(52), "AZ");
        assert_eq!(column_letters(53), "BA");
        assert_eq!(column_letters(702), "ZZ");
        assert_eq!(column_letters(703), "AAA");
    }

    #[test]
    fn test_column_number() {
        assert_eq!(column_number("A"), Some(1));
        assert_eq!(column_number("Z"), Some(26));
        assert_eq!(column_number("AA"), Some(27));
        assert_eq!(column_number("AAA"), Some(703));
        assert_eq!(column_number(""), None);
        assert_eq!(column_number("a"), None);
        assert_eq!(column_number("A1"), None);
    }

    #[test]
    fn test_cell_ref_parse() {
        assert_eq!(CellRef::parse("B7"), Some(CellRef::new(7, 2)));
        assert_eq!(CellRef::parse("$B7"), Some(CellRef::new(7, 2)));
        assert_eq!(CellRef::parse("$B$7"), Some(CellRef::new(7, 2)));
        assert_eq!(CellRef::parse("AA10"), Some(CellRef::new(10, 27)));
        assert_eq!(CellRef::parse("B"), None);
        assert_eq!(CellRef::parse("7"), None);
        assert_eq!(CellRef::parse("B0"), None);
        assert_eq!(CellRef::parse("b7"), None);
        assert_eq!(CellRef::parse("B7x"), None);
    }

    #[test]
    fn test_merge_range_parse_and_display() {
        let range = MergeRange::parse("A2:C3").unwrap();
        assert_eq!(range, MergeRange::new(2, 1, 3, 3));
        assert_eq!(range.to_string(), "A2:C3");

        let absolute = MergeRange::parse("$A$2:$C$2").unwrap();
        assert_eq!(absolute.to_string(), "A2:C2");
    }

    #[test]
    fn test_merge_range_malformed() {
        assert_eq!(MergeRange::parse("A2"), None);
        assert_eq!(MergeRange::parse("A2:"), None);
        assert_eq!(MergeRange::parse("nonsense"), None);
        assert_eq!(MergeRange::parse("A:C"), None);
    }

    #[test]
    fn test_merge_range_includes_row() {
        let range = MergeRange::parse("B2:D4").unwrap();
        assert!(!range.includes_row(1));
        assert!(range.includes_row(2));
        assert!(range.includes_row(3));
        assert!(range.includes_row(4));
        assert!(!range.includes_row(5));

        assert!(merge_range_includes_row("A2:C2", 2));
        assert!(!merge_range_includes_row("garbage", 2));
    }

    #[test]
    fn test_merge_range_shifted() {
        let range = MergeRange::parse("A2:C2").unwrap();
        assert_eq!(range.shifted(3).unwrap().to_string(), "A5:C5");
        assert_eq!(range.shifted(-1).unwrap().to_string(), "A1:C1");
        assert_eq!(range.shifted(-2), None);
    }

    #[test]
    fn test_merge_range_overlaps() {
        let a = MergeRange::parse("A1:B2").unwrap();
        let b = MergeRange::parse("B2:C3").unwrap();
        let c = MergeRange::parse("C1:D1").unwrap();
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert!(MergeRange::parse("A1:A1").unwrap().is_single_cell());
    }
}
