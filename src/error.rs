use thiserror::Error;

pub type SheetfillResult<T> = Result<T, SheetfillError>;

#[derive(Error, Debug)]
pub enum SheetfillError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Mixed array keys in worksheet \"{sheet}\", row {row}: {first} vs {second}")]
    MixedArrayKeys {
        sheet: String,
        row: u32,
        first: String,
        second: String,
    },

    #[error(
        "[[{key}.*]] requires \"{key}\" to be an array in worksheet \"{sheet}\", row {row}. Received: {actual}"
    )]
    ArrayTypeMismatch {
        sheet: String,
        row: u32,
        key: String,
        actual: String,
    },

    #[error("Import error: {0}")]
    Import(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Data error: {0}")]
    Data(String),
}

impl SheetfillError {
    /// Worksheet and row of a template/data mismatch, if this error is one
    pub fn location(&self) -> Option<(&str, u32)> {
        match self {
            SheetfillError::MixedArrayKeys { sheet, row, .. }
            | SheetfillError::ArrayTypeMismatch { sheet, row, .. } => Some((sheet.as_str(), *row)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixed_array_keys_message() {
        let err = SheetfillError::MixedArrayKeys {
            sheet: "Sheet1".to_string(),
            row: 2,
            first: "items".to_string(),
            second: "payments".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Mixed array keys in worksheet \"Sheet1\", row 2: items vs payments"
        );
        assert_eq!(err.location(), Some(("Sheet1", 2)));
    }

    #[test]
    fn test_array_type_mismatch_message() {
        let err = SheetfillError::ArrayTypeMismatch {
            sheet: "Sheet1".to_string(),
            row: 2,
            key: "user".to_string(),
            actual: "object".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "[[user.*]] requires \"user\" to be an array in worksheet \"Sheet1\", row 2. Received: object"
        );
    }

    #[test]
    fn test_location_absent_for_codec_errors() {
        let err = SheetfillError::Import("bad zip".to_string());
        assert!(err.location().is_none());
        assert_eq!(err.to_string(), "Import error: bad zip");
    }
}
