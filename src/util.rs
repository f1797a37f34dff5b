use serde::{de::Error as _, Deserialize, Deserializer, Serializer};
use time::{format_description::FormatItem, macros::format_description, Date, OffsetDateTime};

use crate::error::{LedgerError, LedgerResult};

/// Calendar dates are stored and printed as `YYYY-MM-DD`.
pub const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Day-first format used when showing dates to people.
pub const DISPLAY_DATE_FORMAT: &[FormatItem<'static>] =
    format_description!("[day]/[month]/[year]");

pub fn serialize_date<S>(x: &Date, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let text = x.format(DATE_FORMAT).map_err(serde::ser::Error::custom)?;
    s.serialize_str(&text)
}

pub fn deserialize_date<'de, D>(d: D) -> Result<Date, D::Error>
where
    D: Deserializer<'de>,
{
    let x = String::deserialize(d)?;
    parse_date(&x).map_err(D::Error::custom)
}

pub fn parse_date(text: &str) -> Result<Date, time::error::Parse> {
    Date::parse(text.trim(), DATE_FORMAT)
}

pub fn display_date(date: &Date) -> String {
    date.format(DISPLAY_DATE_FORMAT)
        .unwrap_or_else(|_| date.to_string())
}

pub fn today() -> Date {
    OffsetDateTime::now_utc().date()
}

/// Trims a required text field, rejecting blank input.
pub fn required(field: &str, value: &str) -> LedgerResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(LedgerError::Validation(format!("{} must not be empty", field)))
    } else {
        Ok(trimmed.to_owned())
    }
}

/// Trims an optional text field, mapping blank input to `None`.
pub fn optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::*;

    #[test]
    fn test_dates() {
        assert_eq!(parse_date("2026-10-20").unwrap(), date!(2026 - 10 - 20));
        assert_eq!(parse_date(" 2026-01-02 ").unwrap(), date!(2026 - 01 - 02));
        assert!(parse_date("20/10/2026").is_err());
        assert_eq!(display_date(&date!(2026 - 03 - 07)), "07/03/2026");
    }

    #[test]
    fn test_required() {
        assert_eq!(required("driver", "  Ana ").unwrap(), "Ana");
        assert!(required("driver", "   ").unwrap_err().is_validation());
        assert_eq!(optional(Some("  ")), None);
        assert_eq!(optional(Some(" x ")), Some("x".to_owned()));
        assert_eq!(optional(None), None);
    }
}
