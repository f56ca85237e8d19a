//! Helpers for legacy column values

use chrono::NaiveDate;
use pmig_core::MappingError;

/// Trimmed text, `None` when absent or blank
pub(crate) fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// Single-letter flag column
pub(crate) fn yes_no(field: &str, value: &str) -> Result<bool, MappingError> {
    match value.trim().to_ascii_uppercase().as_str() {
        "Y" => Ok(true),
        "N" => Ok(false),
        _ => Err(MappingError::invalid_enum(field, value)),
    }
}

/// ISO-8601 calendar date column
pub(crate) fn iso_date(field: &str, value: &str) -> Result<NaiveDate, MappingError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| MappingError::malformed(field, value, "a YYYY-MM-DD date"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_text_is_none() {
        assert_eq!(non_blank(Some("  ")), None);
        assert_eq!(non_blank(None), None);
        assert_eq!(non_blank(Some(" Rex ")), Some("Rex".to_string()));
    }

    #[test]
    fn flags_are_case_insensitive() {
        assert_eq!(yes_no("spayed", "y"), Ok(true));
        assert_eq!(yes_no("spayed", "N "), Ok(false));
        assert!(yes_no("spayed", "maybe").is_err());
    }

    #[test]
    fn dates_must_be_iso() {
        assert_eq!(
            iso_date("issued_on", "2024-02-29"),
            Ok(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())
        );
        let err = iso_date("issued_on", "02/29/2024").unwrap_err();
        assert_eq!(err.field, "issued_on");
    }
}
