//! Spreadsheet layout to named price series.
//!
//! The vendor export this reads looks like this (`R` is the marker row):
//!
//! ```text
//!          col 0    col 1   col 2   col 3   col 4   col 5   col 6
//! R-1               HRC Italy               Scrap E3
//! R        Dates    Low     High    Avg     Low     High    Avg
//! R+1      date     ..      ..      price   ..      ..      price
//! ```
//!
//! Everything layout specific sits behind [`SeriesExtractor`], so a different
//! export format only needs another implementation of that trait.

use crate::series::{Series, SeriesMap};
use crate::values::{parse_date, parse_price};
use crate::workbook::SheetGrid;

pub const DEFAULT_SHEET_NAME: &str = "Price Series";
pub const DEFAULT_MARKER: &str = "Dates";

/// Turns a workbook into named series.
///
/// Implementations never fail: a workbook they cannot interpret yields an
/// empty map.
pub trait SeriesExtractor {
    /// Name of the sheet the extractor expects to read.
    fn sheet_name(&self) -> &str;

    fn extract(&self, workbook: &SheetGrid) -> SeriesMap;
}

/// The fixed "Price Series" layout: a marker row in column 0, product labels
/// on the row above it, and repeating (Low, High, Avg) column groups.
#[derive(Clone, Debug)]
pub struct PriceSeriesLayout {
    sheet_name: String,
    marker: String,
    group_width: usize,
    value_offset: usize,
}

impl Default for PriceSeriesLayout {
    fn default() -> Self {
        PriceSeriesLayout {
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
            marker: DEFAULT_MARKER.to_string(),
            group_width: 3,
            value_offset: 2,
        }
    }
}

impl PriceSeriesLayout {
    pub fn new(sheet_name: impl Into<String>, marker: impl Into<String>) -> Self {
        PriceSeriesLayout {
            sheet_name: sheet_name.into(),
            marker: marker.into(),
            ..Default::default()
        }
    }

    /// Change the column grouping. `value_offset` is the position of the
    /// price column inside a group and must be smaller than `group_width`.
    pub fn with_groups(mut self, group_width: usize, value_offset: usize) -> Self {
        self.group_width = group_width.max(1);
        self.value_offset = value_offset.min(self.group_width - 1);
        self
    }

    /// Row whose first cell reads exactly the marker (after trimming).
    pub fn find_marker_row(&self, workbook: &SheetGrid) -> Option<usize> {
        (0..workbook.height()).find(|&row| {
            workbook
                .cell(row, 0)
                .as_label()
                .is_some_and(|label| label == self.marker)
        })
    }

    /// First non-blank label at or above `row` in `col`.
    fn resolve_name(workbook: &SheetGrid, row: usize, col: usize) -> Option<String> {
        (0..=row)
            .rev()
            .find_map(|r| workbook.cell(r, col).as_label())
    }

    /// First column of every complete group, left to right.
    fn group_starts(&self, width: usize) -> impl Iterator<Item = usize> + '_ {
        (1..width)
            .step_by(self.group_width)
            .take_while(move |&start| start + self.group_width <= width)
    }

    fn extract_group(&self, workbook: &SheetGrid, marker_row: usize, start: usize) -> Series {
        let price_col = start + self.value_offset;
        let mut series = Series::new();

        for row in marker_row + 1..workbook.height() {
            let date = parse_date(workbook.cell(row, 0));
            let price = parse_price(workbook.cell(row, price_col));
            if let (Some(date), Some(price)) = (date, price) {
                series.push(date, price);
            }
        }

        series
    }
}

impl SeriesExtractor for PriceSeriesLayout {
    fn sheet_name(&self) -> &str {
        &self.sheet_name
    }

    fn extract(&self, workbook: &SheetGrid) -> SeriesMap {
        let mut result = SeriesMap::new();

        let Some(marker_row) = self.find_marker_row(workbook) else {
            log::debug!("no '{}' marker row in sheet '{}'", self.marker, workbook.sheet_name);
            return result;
        };

        for start in self.group_starts(workbook.width()) {
            let name = match marker_row.checked_sub(1) {
                Some(label_row) => Self::resolve_name(workbook, label_row, start),
                None => None,
            };
            let Some(name) = name else {
                log::debug!("skipping unnamed column group at column {}", start);
                continue;
            };

            let series = self.extract_group(workbook, marker_row, start);
            if series.is_empty() {
                log::debug!("'{}' has no valid rows", name);
                continue;
            }

            if result.insert(name.clone(), series).is_some() {
                log::debug!("'{}' appears twice, keeping the later group", name);
            }
        }

        result
    }
}
