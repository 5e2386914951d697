#![cfg(not(tarpaulin_include))]

use chrono::NaiveDate;
use rust_xlsxwriter::{Workbook, Worksheet, XlsxError};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::extractor::{DEFAULT_MARKER, DEFAULT_SHEET_NAME};
use crate::series::SeriesMap;

/// Column limit of an Excel worksheet.
const MAX_COLUMNS: usize = 16_384;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("could not write workbook: {0}")]
    Xlsx(#[from] XlsxError),
    #[error("too many products for one sheet ({0})")]
    TooManyColumns(usize),
}

/// Convert merged series to CSV format
///
/// One row per date seen in any series, ascending, and one column per product
/// in name order. A product without an observation on a date leaves the field
/// empty. Names containing commas, quotes or newlines are quoted.
///
/// # Arguments
/// * `series` - Reference to the merged series
///
/// # Returns
/// * `String` - CSV content
///
/// # Examples
/// ```
/// use chrono::NaiveDate;
/// use price_dashboard::export::to_csv;
/// use price_dashboard::series::{Series, SeriesMap};
///
/// let mut a = Series::new();
/// a.push(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), 527.5);
/// let mut map = SeriesMap::new();
/// map.insert("HRC, Italy".to_string(), a);
///
/// assert_eq!(to_csv(&map), "Date,\"HRC, Italy\"\n2024-01-01,527.5\n");
/// ```
pub fn to_csv(series: &SeriesMap) -> String {
    let table = by_date(series);
    let mut csv_content = String::from("Date");

    for name in series.keys() {
        csv_content.push(',');
        csv_content.push_str(&escape_csv(name));
    }
    csv_content.push('\n');

    for (date, row) in &table {
        csv_content.push_str(&date.format("%Y-%m-%d").to_string());
        for price in row {
            csv_content.push(',');
            if let Some(price) = price {
                csv_content.push_str(&price.to_string());
            }
        }
        csv_content.push('\n');
    }

    csv_content
}

fn escape_csv(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Date -> one optional price per product, products in name order.
fn by_date(series: &SeriesMap) -> BTreeMap<NaiveDate, Vec<Option<f64>>> {
    let dates: BTreeSet<NaiveDate> = series
        .values()
        .flat_map(|s| s.points().iter().map(|p| p.date))
        .collect();

    let mut table: BTreeMap<NaiveDate, Vec<Option<f64>>> = dates
        .into_iter()
        .map(|date| (date, vec![None; series.len()]))
        .collect();

    for (col, s) in series.values().enumerate() {
        for p in s.points() {
            if let Some(row) = table.get_mut(&p.date) {
                row[col] = Some(p.price);
            }
        }
    }

    table
}

/// Convert merged series to XLSX in the "Price Series" layout
///
/// Row 0 carries each product name above its column group, row 1 is the
/// `Dates` marker row with `Low`/`High`/`Avg` headers, and each following row
/// holds an ISO date and the product's price in its `Avg` column. Low and High
/// are left blank. Extracting the result with the default layout gives back
/// the same series.
///
/// # Arguments
/// * `series` - Reference to the merged series
///
/// # Returns
/// * `Result<Vec<u8>, ExportError>` - XLSX file content as bytes or an error
pub fn to_xlsx(series: &SeriesMap) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    let mut worksheet = Worksheet::new();
    worksheet.set_name(DEFAULT_SHEET_NAME)?;

    if 1 + series.len() * 3 > MAX_COLUMNS {
        return Err(ExportError::TooManyColumns(series.len()));
    }

    worksheet.write_string(1, 0, DEFAULT_MARKER)?;
    for (idx, name) in series.keys().enumerate() {
        let first = group_column(idx);
        worksheet.write_string(0, first, name.as_str())?;
        worksheet.write_string(1, first, "Low")?;
        worksheet.write_string(1, first + 1, "High")?;
        worksheet.write_string(1, first + 2, "Avg")?;
    }

    for (offset, (date, row)) in by_date(series).iter().enumerate() {
        let r = 2 + offset as u32;
        worksheet.write_string(r, 0, &date.format("%Y-%m-%d").to_string())?;
        for (idx, price) in row.iter().enumerate() {
            if let Some(price) = price {
                worksheet.write_number(r, group_column(idx) + 2, *price)?;
            }
        }
    }

    workbook.push_worksheet(worksheet);
    let buffer = workbook.save_to_buffer()?;

    Ok(buffer)
}

fn group_column(idx: usize) -> u16 {
    (1 + idx * 3) as u16
}
