//! Cell parsing for dates and numbers. Unparseable values become `None`.

use chrono::NaiveDate;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Parses a registry date.
///
/// Accepts `YYYY-MM-DD`, `YYYY/MM/DD`, `YYYYMMDD`, `MM/DD/YYYY`, and
/// date-times in any of those forms (the time part is dropped).
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    let date_part = trimmed
        .split(['T', ' '])
        .next()
        .unwrap_or(trimmed);

    if date_part.len() == 8 && date_part.bytes().all(|b| b.is_ascii_digit()) {
        return NaiveDate::parse_from_str(date_part, "%Y%m%d").ok();
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(date_part, format).ok())
}

/// Parses a finite decimal number.
pub fn parse_number(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parses a calendar year, tolerating a decimal rendering such as `1980.0`.
pub fn parse_year(value: &str) -> Option<i32> {
    let number = parse_number(value)?;
    let year = number.trunc();
    if (f64::from(i32::MIN)..=f64::from(i32::MAX)).contains(&year) {
        Some(year as i32)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date("2024-03-05"), Some(date(2024, 3, 5)));
        assert_eq!(parse_date("2024/03/05"), Some(date(2024, 3, 5)));
        assert_eq!(parse_date("20240305"), Some(date(2024, 3, 5)));
        assert_eq!(parse_date("03/05/2024"), Some(date(2024, 3, 5)));
        assert_eq!(parse_date(" 2024-03-05 "), Some(date(2024, 3, 5)));
    }

    #[test]
    fn test_parse_date_keeps_date_of_datetime() {
        assert_eq!(parse_date("2024-03-05T14:30:00"), Some(date(2024, 3, 5)));
        assert_eq!(parse_date("2024-03-05 14:30"), Some(date(2024, 3, 5)));
    }

    #[test]
    fn test_parse_date_invalid() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date("2024-02-30"), None);
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("45.5"), Some(45.5));
        assert_eq!(parse_number(" -3 "), Some(-3.0));
        assert_eq!(parse_number("1e3"), Some(1000.0));
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_number("n/a"), None);
        assert_eq!(parse_number(""), None);
    }

    #[test]
    fn test_parse_year() {
        assert_eq!(parse_year("1980"), Some(1980));
        assert_eq!(parse_year("1980.0"), Some(1980));
        assert_eq!(parse_year("unknown"), None);
    }
}
