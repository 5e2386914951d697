//! Cell-to-date and cell-to-price conversion.
//!
//! Both parsers are total: anything they cannot make sense of is `None`, and
//! the extractor drops the row.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use lazy_static::lazy_static;
use regex::Regex;

use crate::workbook::CellValue;

lazy_static! {
    static ref PRICE_REGEX: Regex = Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)$").unwrap();
    static ref THOUSANDS_REGEX: Regex = Regex::new(r"^[+-]?\d{1,3}(,\d{3})+(\.\d*)?$").unwrap();
}

/// Text date layouts tried in order. Month-first slashes come last so that
/// unambiguous layouts win.
const DATE_FORMATS: [&str; 7] = [
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d-%b-%Y",
    "%d %b %Y",
    "%b %d, %Y",
    "%d.%m.%Y",
    "%m/%d/%Y",
];

const DATETIME_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Largest serial Excel can represent (9999-12-31).
const MAX_EXCEL_SERIAL: f64 = 2_958_465.0;

/// Convert an Excel serial day number (1900 date system) to a calendar date.
///
/// Serial 1 is 1900-01-01 and serial 60 (Excel's phantom 1900-02-29) has no
/// date. The fractional time-of-day part is ignored.
///
/// # Examples
/// ```
/// use chrono::NaiveDate;
/// use price_dashboard::values::excel_serial_to_date;
///
/// assert_eq!(excel_serial_to_date(45292.0), NaiveDate::from_ymd_opt(2024, 1, 1));
/// assert_eq!(excel_serial_to_date(-3.0), None);
/// ```
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 || serial > MAX_EXCEL_SERIAL {
        return None;
    }
    let days = serial.floor() as i64;
    // Serial 60 is the 1900-02-29 that never existed
    let epoch = match days {
        60 => return None,
        d if d < 60 => NaiveDate::from_ymd_opt(1899, 12, 31)?,
        _ => NaiveDate::from_ymd_opt(1899, 12, 30)?,
    };
    epoch.checked_add_signed(Duration::days(days))
}

/// Parse a date cell.
///
/// # Arguments
/// * `cell` - Any cell value
///
/// # Returns
/// * `Option<NaiveDate>` - The calendar date, or `None` if the cell is empty or not a date
pub fn parse_date(cell: &CellValue) -> Option<NaiveDate> {
    match cell {
        CellValue::Date(d) => Some(*d),
        CellValue::Number(n) => excel_serial_to_date(*n),
        CellValue::Text(s) => parse_date_text(s),
        CellValue::Empty => None,
    }
}

fn parse_date_text(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
                .map(|dt| dt.date())
        })
}

/// Parse a price cell, tolerating thousands separators in text.
///
/// # Examples
/// ```
/// use price_dashboard::values::parse_price;
/// use price_dashboard::workbook::CellValue;
///
/// assert_eq!(parse_price(&CellValue::Text("1,234.50".into())), Some(1234.5));
/// assert_eq!(parse_price(&CellValue::Number(545.0)), Some(545.0));
/// assert_eq!(parse_price(&CellValue::Text("n/a".into())), None);
/// ```
pub fn parse_price(cell: &CellValue) -> Option<f64> {
    match cell {
        CellValue::Number(n) if n.is_finite() => Some(*n),
        CellValue::Text(s) => parse_price_text(s),
        _ => None,
    }
}

fn parse_price_text(text: &str) -> Option<f64> {
    let text = text.trim();
    let plain = if THOUSANDS_REGEX.is_match(text) {
        text.replace(',', "")
    } else if PRICE_REGEX.is_match(text) {
        text.to_string()
    } else {
        return None;
    };

    plain.parse::<f64>().ok().filter(|v| v.is_finite())
}
