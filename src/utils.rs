use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use std::str::FromStr;

/// Accepted posting-date formats, Turkish day-first forms before the
/// slash and ISO fallbacks. Tried in order; first hit wins.
const DATE_FORMATS: [&str; 6] = [
    "%d.%m.%Y",
    "%d.%m.%y",
    "%d/%m/%Y",
    "%Y-%m-%d",
    "%d-%m-%Y",
    "%Y%m%d",
];

/// Parses a date against the known vendor formats.
pub fn parse_flexible_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    // Some exports append a time component; the date part is all we keep.
    let date_part = s.split_whitespace().next().unwrap_or(s);
    let date_part = date_part.split('T').next().unwrap_or(date_part);

    // %Y accepts two-digit years as the literal year 24; such input belongs
    // to the %y format further down the list, so implausible years are
    // rejected and the scan continues.
    DATE_FORMATS
        .iter()
        .filter_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
        .find(|d| d.year() >= 1900)
}

/// Parses a decimal accepting both Turkish ("1.234,56") and invariant
/// ("1,234.56" / "1234.56") conventions.
pub fn parse_flexible_decimal(raw: &str) -> Option<Decimal> {
    let compact: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}')
        .collect();
    if compact.is_empty() {
        return None;
    }

    let (negative, digits) = match compact.strip_prefix('-') {
        Some(rest) => (true, rest.to_string()),
        None => match (compact.strip_prefix('('), compact.strip_suffix(')')) {
            (Some(_), Some(_)) => (true, compact[1..compact.len() - 1].to_string()),
            _ => (false, compact.clone()),
        },
    };

    let comma = digits.rfind(',');
    let dot = digits.rfind('.');
    let normalized = match (comma, dot) {
        // Turkish: dot thousands, comma decimal.
        (Some(c), Some(d)) if c > d => digits.replace('.', "").replace(',', "."),
        // Invariant with comma thousands.
        (Some(_), Some(_)) => digits.replace(',', ""),
        // Lone comma is a Turkish decimal separator.
        (Some(_), None) => digits.replace(',', "."),
        _ => digits,
    };

    let value = Decimal::from_str(&normalized).ok()?;
    Some(if negative { -value } else { value })
}

/// Calendar bounds of a year, the usual trial-balance window.
pub fn year_window(year: i32) -> (NaiveDate, NaiveDate) {
    (
        NaiveDate::from_ymd_opt(year, 1, 1).expect("valid jan 1"),
        NaiveDate::from_ymd_opt(year, 12, 31).expect("valid dec 31"),
    )
}

/// Year-month key of a date, used for storage-period bucketing.
pub fn period_of(date: NaiveDate) -> (i32, u32) {
    (date.year(), date.month())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_flexible_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        for raw in ["31.01.2024", "31/01/2024", "2024-01-31", "31-01-2024", "20240131"] {
            assert_eq!(parse_flexible_date(raw), Some(expected), "failed for {raw}");
        }
        assert_eq!(parse_flexible_date("31.01.24"), Some(expected));
    }

    #[test]
    fn test_parse_flexible_date_with_time_component() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!(parse_flexible_date("05.03.2024 14:30"), Some(expected));
        assert_eq!(parse_flexible_date("2024-03-05T00:00:00"), Some(expected));
    }

    #[test]
    fn test_parse_flexible_date_rejects_garbage() {
        assert_eq!(parse_flexible_date(""), None);
        assert_eq!(parse_flexible_date("TOPLAM"), None);
        assert_eq!(parse_flexible_date("32.13.2024"), None);
    }

    #[test]
    fn test_parse_flexible_decimal_turkish() {
        assert_eq!(parse_flexible_decimal("1.234,56"), Some(dec!(1234.56)));
        assert_eq!(parse_flexible_decimal("500,00"), Some(dec!(500.00)));
        assert_eq!(parse_flexible_decimal("-1.000,25"), Some(dec!(-1000.25)));
    }

    #[test]
    fn test_parse_flexible_decimal_invariant() {
        assert_eq!(parse_flexible_decimal("1234.56"), Some(dec!(1234.56)));
        assert_eq!(parse_flexible_decimal("1,234.56"), Some(dec!(1234.56)));
        assert_eq!(parse_flexible_decimal("0"), Some(Decimal::ZERO));
    }

    #[test]
    fn test_parse_flexible_decimal_parenthesized_negative() {
        assert_eq!(parse_flexible_decimal("(250,00)"), Some(dec!(-250.00)));
    }

    #[test]
    fn test_parse_flexible_decimal_rejects_garbage() {
        assert_eq!(parse_flexible_decimal(""), None);
        assert_eq!(parse_flexible_decimal("abc"), None);
    }

    #[test]
    fn test_year_window() {
        let (start, end) = year_window(2024);
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
    }
}
